//! Calendar events and ingestion into canonical date ranges.
//!
//! Stored events come in two shapes: an explicit inclusive date range, or a
//! legacy "whole month" marker that only carries a month index. Ingestion
//! turns both into an [`Event`] with a [`CanonicalRange`]; nothing past
//! ingestion ever sees the legacy form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::grid::{days_in_month, first_day};
use crate::error::CalendarError;

/// Event category. Declaration order is not the display order, see [`EventType::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Institutional,
    Subscribed,
    Personal,
    Hidden,
}

impl EventType {
    /// Sort rank when several events share a day. Lower wins.
    pub fn rank(self) -> u8 {
        match self {
            EventType::Institutional | EventType::Subscribed => 0,
            EventType::Personal => 1,
            EventType::Hidden => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Institutional => "institutional",
            EventType::Subscribed => "subscribed",
            EventType::Personal => "personal",
            EventType::Hidden => "hidden",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "institutional" => Ok(EventType::Institutional),
            "subscribed" => Ok(EventType::Subscribed),
            "personal" => Ok(EventType::Personal),
            "hidden" => Ok(EventType::Hidden),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// How a stored event is placed on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSchedule {
    /// Inclusive date range.
    Dated { start: NaiveDate, end: NaiveDate },
    /// Legacy form: the whole of `month` (1-12) in whichever year is displayed.
    LegacyMonth { month: u32 },
}

impl EventSchedule {
    /// Build a schedule from the raw optional columns.
    ///
    /// Explicit dates win over the legacy month index. A single explicit
    /// date makes a one-day event.
    ///
    /// # Errors
    /// `InvalidEvent` when start is after end, when there is neither a date
    /// nor a month index, or when the month index is out of range.
    pub fn from_parts(
        id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        month_index: Option<u32>,
    ) -> Result<Self, CalendarError> {
        let invalid = |reason: String| CalendarError::InvalidEvent {
            id: id.to_string(),
            reason,
        };

        match (start, end, month_index) {
            (Some(start), Some(end), _) => {
                if start > end {
                    return Err(invalid(format!("start {start} is after end {end}")));
                }
                Ok(EventSchedule::Dated { start, end })
            }
            (Some(day), None, _) | (None, Some(day), _) => Ok(EventSchedule::Dated {
                start: day,
                end: day,
            }),
            (None, None, Some(month)) if (1..=12).contains(&month) => {
                Ok(EventSchedule::LegacyMonth { month })
            }
            (None, None, Some(month)) => Err(invalid(format!("month index {month} is not 1-12"))),
            (None, None, None) => Err(invalid("no dates and no month index".to_string())),
        }
    }
}

/// Resolved inclusive `[start, end]` of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl CanonicalRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if start > end {
            return Err(CalendarError::InvalidDate(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.start <= last && first <= self.end
    }
}

/// An event as stored in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub schedule: EventSchedule,
    pub visible: bool,
    pub event_type: EventType,
    /// Source channel for subscribed events.
    #[serde(default)]
    pub channel_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        schedule: EventSchedule,
        event_type: EventType,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            location: None,
            schedule,
            visible: true,
            event_type,
            channel_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Resolve this record against the year being displayed.
    ///
    /// # Errors
    /// `InvalidEvent` if a dated range is inverted or a legacy month is out
    /// of range (records deserialized from older rows skip `from_parts`).
    pub fn ingest(&self, year: i32) -> Result<Event, CalendarError> {
        let range = match self.schedule {
            EventSchedule::Dated { start, end } => {
                CanonicalRange::new(start, end).map_err(|e| CalendarError::InvalidEvent {
                    id: self.id.clone(),
                    reason: e.to_string(),
                })?
            }
            EventSchedule::LegacyMonth { month } => {
                let invalid = |e: CalendarError| CalendarError::InvalidEvent {
                    id: self.id.clone(),
                    reason: e.to_string(),
                };
                let first = first_day(year, month).map_err(invalid)?;
                let last_day = days_in_month(year, month).map_err(invalid)?;
                let last = first
                    .with_day(last_day)
                    .ok_or_else(|| invalid(CalendarError::InvalidDate(format!("{year}-{month}"))))?;
                CanonicalRange { start: first, end: last }
            }
        };

        Ok(Event {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            range,
            visible: self.visible,
            event_type: self.event_type,
            channel_id: self.channel_id.clone(),
        })
    }
}

/// An event with its canonical range, ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub range: CanonicalRange,
    pub visible: bool,
    pub event_type: EventType,
    pub channel_id: Option<String>,
}

/// Ingest every record for `year`, failing on the first invalid one.
pub fn ingest_all(records: &[EventRecord], year: i32) -> Result<Vec<Event>, CalendarError> {
    records.iter().map(|r| r.ingest(year)).collect()
}
