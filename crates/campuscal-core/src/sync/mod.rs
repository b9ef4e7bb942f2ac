//! Remote catalog synchronization.
//!
//! Pulls organizations, channels and the current user's subscriptions into
//! the local cache, in dependency order, one isolated domain at a time.

pub mod coordinator;
pub mod plan;
pub mod types;


pub use coordinator::SyncCoordinator;
pub use plan::SyncPlan;
pub use types::{DomainOutcome, SyncDomain, SyncError, SyncPlanError, SyncResult, SyncState};
