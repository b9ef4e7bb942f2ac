use clap::Subcommand;

use super::{coordinator, open_database, runtime, CmdResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List cached organizations
    Organizations {
        #[arg(long)]
        json: bool,
    },
    /// List cached channels
    Channels {
        /// Only channels of this organization
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List cached subscriptions
    Subscriptions {
        #[arg(long)]
        json: bool,
    },
    /// Subscribe to a channel
    Subscribe { channel_id: String },
    /// Unsubscribe from a channel
    Unsubscribe { channel_id: String },
}

pub fn run(action: CatalogAction) -> CmdResult {
    match action {
        CatalogAction::Organizations { json } => {
            let orgs = open_database()?.list_organizations()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&orgs)?);
            } else {
                for org in &orgs {
                    println!("{}  {}", org.id, org.name);
                }
            }
        }
        CatalogAction::Channels { organization, json } => {
            let mut channels = open_database()?.list_channels()?;
            if let Some(org) = organization {
                channels.retain(|c| c.organization_id == org);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&channels)?);
            } else {
                for channel in &channels {
                    println!("{}  {} (org {})", channel.id, channel.name, channel.organization_id);
                }
            }
        }
        CatalogAction::Subscriptions { json } => {
            let db = open_database()?;
            let subs = db.list_subscriptions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&subs)?);
            } else {
                let channels = db.list_channels()?;
                for sub in &subs {
                    let name = channels
                        .iter()
                        .find(|c| c.id == sub.channel_id)
                        .map(|c| c.name.as_str())
                        .unwrap_or("<not cached>");
                    println!("{}  {}  {}", sub.channel_id, name, sub.created_at.date_naive());
                }
            }
        }
        CatalogAction::Subscribe { channel_id } => {
            let sync = coordinator()?;
            let sub = runtime()?.block_on(sync.subscribe(&channel_id))?;
            println!("subscribed to {} ({})", sub.channel_id, sub.id);
        }
        CatalogAction::Unsubscribe { channel_id } => {
            let sync = coordinator()?;
            runtime()?.block_on(sync.unsubscribe(&channel_id))?;
            println!("unsubscribed from {channel_id}");
        }
    }
    Ok(())
}
