//! # campuscal core library
//!
//! Business logic for campuscal, a campus calendar that combines
//! institutional, subscribed and personal events in one month view.
//! The CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Calendar**: Month grid generation and per-day occurrence resolution.
//!   Pure and synchronous.
//! - **Storage**: SQLite cache of the remote catalog and of events, plus
//!   TOML configuration
//! - **Remote**: Catalog client (organizations, channels, subscriptions)
//! - **Sync**: Dependency-ordered pull of the remote catalog into the cache
//! - **Auth**: Bearer credential guard with an observable state signal
//!
//! ## Key Components
//!
//! - [`generate`]: Month grid for a year and month
//! - [`resolve`]: Day-to-occurrence map for a month
//! - [`SyncCoordinator`]: Catalog sync orchestration
//! - [`AuthTokenGuard`]: Credential validity and `Authorization` header
//! - [`Database`]: Local cache
//! - [`Config`]: Application configuration management

pub mod auth;
pub mod calendar;
pub mod clock;
pub mod error;
pub mod remote;
pub mod storage;
pub mod sync;

pub use auth::{AuthState, AuthToken, AuthTokenGuard, KeyringTokenStore, TokenStore, UserIdentity};
pub use calendar::{
    generate, ingest_all, resolve, shape_on, Event, EventRecord, EventSchedule, EventType,
    MonthGrid, MonthOccurrences, OccurrenceRecord, Shape,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, CalendarError, ConfigError, CoreError, DatabaseError, RemoteError};
pub use remote::{Channel, HttpCatalog, Organization, RemoteCatalog, Subscription};
pub use storage::{Config, Database};
pub use sync::{SyncCoordinator, SyncDomain, SyncResult, SyncState};
