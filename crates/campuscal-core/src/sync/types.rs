//! Core types for catalog synchronization.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, RemoteError};

/// One independently synced slice of the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDomain {
    Organizations,
    Channels,
    Subscriptions,
}

impl SyncDomain {
    pub const ALL: [SyncDomain; 3] = [
        SyncDomain::Organizations,
        SyncDomain::Channels,
        SyncDomain::Subscriptions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SyncDomain::Organizations => "organizations",
            SyncDomain::Channels => "channels",
            SyncDomain::Subscriptions => "subscriptions",
        }
    }

    /// Domains whose data must be cached before this one is useful.
    pub fn dependencies(self) -> &'static [SyncDomain] {
        match self {
            SyncDomain::Organizations => &[],
            SyncDomain::Channels => &[SyncDomain::Organizations],
            SyncDomain::Subscriptions => &[SyncDomain::Channels],
        }
    }
}

impl fmt::Display for SyncDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregated outcome of a `sync_all` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResult {
    Success { message: String },
    PartialSuccess { message: String, errors: Vec<String> },
    Error { message: String },
}

impl SyncResult {
    pub fn message(&self) -> &str {
        match self {
            SyncResult::Success { message }
            | SyncResult::PartialSuccess { message, .. }
            | SyncResult::Error { message } => message,
        }
    }

    /// Per-domain error strings; empty on success.
    pub fn errors(&self) -> &[String] {
        match self {
            SyncResult::PartialSuccess { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncResult::Success { .. })
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResult::Success { message } => write!(f, "ok: {message}"),
            SyncResult::PartialSuccess { message, errors } => {
                write!(f, "partial: {message}")?;
                for e in errors {
                    write!(f, "\n  - {e}")?;
                }
                Ok(())
            }
            SyncResult::Error { message } => write!(f, "failed: {message}"),
        }
    }
}

/// What happened to a single domain during the last completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DomainOutcome {
    Synced { count: usize },
    Failed { error: String },
}

/// Persisted sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last attempt that ended in success or partial success.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Last completed attempt, whatever its result.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Keyed by [`SyncDomain::name`].
    #[serde(default)]
    pub outcomes: BTreeMap<String, DomainOutcome>,
    /// Cached subscription ids the remote stopped reporting at the last
    /// subscriptions sync. They stay in the cache.
    #[serde(default)]
    pub orphaned_subscriptions: Vec<String>,
}

impl SyncState {
    pub(crate) const KV_KEY: &'static str = "sync.state";
}

fn format_limit(limit: &Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}

/// Failure of a single domain sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("cache write failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("timed out after {}", format_limit(.limit))]
    Timeout { limit: Duration },

    #[error("skipped, sync budget exhausted")]
    BudgetExhausted,
}

/// Invalid dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncPlanError {
    #[error("dependency cycle between: {0:?}")]
    Cycle(Vec<SyncDomain>),

    #[error("{domain} depends on {dependency}, which is not in the plan")]
    UnknownDependency {
        domain: SyncDomain,
        dependency: SyncDomain,
    },

    #[error("{0} declared twice")]
    Duplicate(SyncDomain),
}
