//! Sync subcommand: pulls the remote catalog into the local cache.

use clap::Subcommand;
use campuscal_core::sync::DomainOutcome;
use campuscal_core::SyncResult;

use super::{coordinator, runtime, CmdResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Sync organizations, channels and subscriptions
    Run {
        /// Sync even if the cache is still fresh
        #[arg(long)]
        force: bool,
    },
    /// Show the outcome of the last sync
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SyncAction) -> CmdResult {
    let sync = coordinator()?;
    match action {
        SyncAction::Run { force } => {
            if !force && !sync.should_sync() {
                println!("cache is fresh; use --force to sync anyway");
                return Ok(());
            }
            let result = runtime()?.block_on(sync.sync_all());
            println!("{result}");
            if let SyncResult::Error { message } = result {
                return Err(message.into());
            }
        }
        SyncAction::Status { json } => {
            let state = sync.state();
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
                return Ok(());
            }

            let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
                t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
            };
            println!("last sync:    {}", fmt_time(state.last_sync_at));
            println!("last attempt: {}", fmt_time(state.last_attempt_at));
            println!("stale:        {}", sync.should_sync());
            for (domain, outcome) in &state.outcomes {
                match outcome {
                    DomainOutcome::Synced { count } => println!("  {domain}: {count} rows"),
                    DomainOutcome::Failed { error } => println!("  {domain}: FAILED ({error})"),
                }
            }
            if !state.orphaned_subscriptions.is_empty() {
                println!(
                    "no longer reported by the remote: {}",
                    state.orphaned_subscriptions.join(", ")
                );
            }
        }
    }
    Ok(())
}
