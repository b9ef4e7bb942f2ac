//! Month grids and event occurrence resolution.
//!
//! Everything here is synchronous and free of shared state, so several
//! months can be generated or resolved in parallel.

pub mod event;
pub mod grid;
pub mod occurrence;

pub use event::{ingest_all, CanonicalRange, Event, EventRecord, EventSchedule, EventType};
pub use grid::{days_in_month, first_day, generate, last_day, MonthGrid, Week, DAYS_PER_WEEK};
pub use occurrence::{resolve, shape_on, MonthOccurrences, OccurrenceRecord, Shape};
