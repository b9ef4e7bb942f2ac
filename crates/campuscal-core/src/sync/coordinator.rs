//! Orchestrates the catalog sync.
//!
//! `sync_all` pulls every domain of the [`SyncPlan`] from the remote
//! catalog and upserts it into the local cache. Domains are isolated: one
//! failing domain is recorded and the rest still run. Each domain runs
//! under its own deadline and the whole call under an overall budget.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::plan::SyncPlan;
use super::types::{DomainOutcome, SyncDomain, SyncError, SyncResult, SyncState};
use crate::auth::AuthTokenGuard;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, CoreError, RemoteError};
use crate::remote::{RemoteCatalog, Subscription};
use crate::storage::{Database, SyncConfig};

pub struct SyncCoordinator<R> {
    remote: R,
    db: Arc<Database>,
    auth: Arc<AuthTokenGuard>,
    clock: Arc<dyn Clock>,
    plan: SyncPlan,
    config: SyncConfig,
    state: Mutex<SyncState>,
}

impl<R: RemoteCatalog> SyncCoordinator<R> {
    pub fn new(remote: R, db: Arc<Database>, auth: Arc<AuthTokenGuard>, config: SyncConfig) -> Self {
        Self::with_clock(remote, db, auth, config, Arc::new(SystemClock))
    }

    /// Restores the persisted [`SyncState`]; an unreadable state starts fresh.
    pub fn with_clock(
        remote: R,
        db: Arc<Database>,
        auth: Arc<AuthTokenGuard>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = load_state(&db);
        Self {
            remote,
            db,
            auth,
            clock,
            plan: SyncPlan::standard(),
            config,
            state: Mutex::new(state),
        }
    }

    pub fn with_plan(mut self, plan: SyncPlan) -> Self {
        self.plan = plan;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SyncState {
        self.lock_state().clone()
    }

    pub fn plan(&self) -> &SyncPlan {
        &self.plan
    }

    /// True when nothing was synced yet or the last sync is older than
    /// `stale_after`.
    pub fn should_sync(&self) -> bool {
        match self.lock_state().last_sync_at {
            None => true,
            Some(at) => self.clock.now() > at + self.config.stale_after(),
        }
    }

    /// Sync every domain in plan order. Never fails; problems are reported
    /// through the returned [`SyncResult`].
    pub async fn sync_all(&self) -> SyncResult {
        if !self.auth.is_authenticated() {
            warn!("sync skipped: not authenticated");
            return SyncResult::Error {
                message: AuthError::NotAuthenticated.to_string(),
            };
        }

        let started = Instant::now();
        let budget = self.config.total_budget();
        let mut outcomes = BTreeMap::new();
        let mut errors = Vec::new();

        for &domain in self.plan.order() {
            let remaining = budget.saturating_sub(started.elapsed());
            let result = if remaining.is_zero() {
                Err(SyncError::BudgetExhausted)
            } else {
                let limit = self.config.domain_timeout().min(remaining);
                match tokio::time::timeout(limit, self.sync_domain(domain)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout { limit }),
                }
            };

            let outcome = match result {
                Ok(count) => {
                    info!(%domain, count, "domain synced");
                    DomainOutcome::Synced { count }
                }
                Err(e) => {
                    let error = format!("{domain}: {e}");
                    warn!("{error}");
                    errors.push(error.clone());
                    DomainOutcome::Failed { error }
                }
            };
            outcomes.insert(domain.name().to_string(), outcome);
        }

        let total = self.plan.len();
        let synced = total - errors.len();
        let result = if errors.is_empty() {
            SyncResult::Success {
                message: format!("synced {total} domains"),
            }
        } else if synced > 0 {
            SyncResult::PartialSuccess {
                message: format!("synced {synced} of {total} domains"),
                errors,
            }
        } else {
            SyncResult::Error {
                message: errors.join("; "),
            }
        };

        self.record_attempt(outcomes, !matches!(result, SyncResult::Error { .. }));
        info!(result = %result.message(), "sync finished");
        result
    }

    /// Fetch one domain and upsert it into the cache. Returns the row count.
    pub async fn sync_domain(&self, domain: SyncDomain) -> Result<usize, SyncError> {
        debug!(%domain, "syncing domain");
        match domain {
            SyncDomain::Organizations => {
                let page = self.remote.list_organizations().await?;
                Ok(self.db.upsert_organizations(&page.items)?)
            }
            SyncDomain::Channels => {
                let page = self.remote.list_channels().await?;
                Ok(self.db.upsert_channels(&page.items)?)
            }
            SyncDomain::Subscriptions => {
                let user = self
                    .auth
                    .current_user()
                    .ok_or(RemoteError::NotAuthenticated)?;
                let page = self.remote.list_subscriptions(&user.id).await?;
                let count = self.db.upsert_subscriptions(&page.items)?;
                let orphans = self.find_orphans(&user.id, &page.items)?;
                self.lock_state().orphaned_subscriptions = orphans;
                Ok(count)
            }
        }
    }

    /// Cached subscriptions of `user_id` that the remote no longer reports.
    /// They are kept and reported.
    fn find_orphans(&self, user_id: &str, reported: &[Subscription]) -> Result<Vec<String>, SyncError> {
        let reported: HashSet<&str> = reported.iter().map(|s| s.id.as_str()).collect();
        let orphans: Vec<String> = self
            .db
            .list_subscriptions()?
            .into_iter()
            .filter(|s| s.user_id == user_id && !reported.contains(s.id.as_str()))
            .map(|s| s.id)
            .collect();
        if !orphans.is_empty() {
            warn!(
                count = orphans.len(),
                subscriptions = ?orphans,
                "cached subscriptions no longer reported by the remote"
            );
        }
        Ok(orphans)
    }

    fn record_attempt(&self, outcomes: BTreeMap<String, DomainOutcome>, succeeded: bool) {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.lock_state();
            state.last_attempt_at = Some(now);
            if succeeded {
                state.last_sync_at = Some(now);
            }
            state.outcomes = outcomes;
            state.clone()
        };

        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self.db.kv_set(SyncState::KV_KEY, &json) {
                    warn!("failed to persist sync state: {e}");
                }
            }
            Err(e) => warn!("failed to encode sync state: {e}"),
        }
    }

    /// Subscribe the current user to `channel_id` and cache the result.
    pub async fn subscribe(&self, channel_id: &str) -> Result<Subscription, CoreError> {
        let user = self.auth.current_user().ok_or(AuthError::NotAuthenticated)?;
        let subscription = self.remote.subscribe(&user.id, channel_id).await?;
        self.db.upsert(&subscription)?;
        info!(channel = channel_id, "subscribed");
        Ok(subscription)
    }

    /// Unsubscribe the current user from `channel_id`.
    ///
    /// Returns whether a cached subscription was removed.
    pub async fn unsubscribe(&self, channel_id: &str) -> Result<bool, CoreError> {
        let user = self.auth.current_user().ok_or(AuthError::NotAuthenticated)?;
        self.remote.unsubscribe(&user.id, channel_id).await?;
        let removed = self.db.delete_subscription_for_channel(&user.id, channel_id)?;
        info!(channel = channel_id, removed, "unsubscribed");
        Ok(removed)
    }
}

fn load_state(db: &Database) -> SyncState {
    match db.kv_get(SyncState::KV_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("discarding unreadable sync state: {e}");
            SyncState::default()
        }),
        Ok(None) => SyncState::default(),
        Err(e) => {
            warn!("failed to load sync state: {e}");
            SyncState::default()
        }
    }
}
