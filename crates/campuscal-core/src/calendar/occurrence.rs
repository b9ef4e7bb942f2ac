//! Per-day event occurrences for a displayed month.
//!
//! [`resolve`] maps each day of a month to the events covering it: one
//! primary event, the remaining ones in display order, and the visual shape
//! of the primary event on that day. The function is pure; calling it again
//! with the same input gives an identical map.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::event::{CanonicalRange, Event};
use super::grid::{first_day, last_day};
use crate::error::CalendarError;

/// How an event's span looks on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Start,
    Middle,
    End,
    Full,
}

/// Events covering a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceRecord {
    pub primary: Event,
    pub additional: Vec<Event>,
    pub shape: Shape,
}

impl OccurrenceRecord {
    /// Primary first, then additional, in display order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        std::iter::once(&self.primary).chain(self.additional.iter())
    }
}

/// Day of month to occurrence. Days without events have no entry.
pub type MonthOccurrences = BTreeMap<u32, OccurrenceRecord>;

/// Shape of `range` on `date` when the month `first..=last` is displayed.
///
/// Start and end only count when they fall inside the displayed month, so an
/// event that begins before the month and ends after it is `Middle` throughout.
pub fn shape_on(range: &CanonicalRange, date: NaiveDate, first: NaiveDate, last: NaiveDate) -> Shape {
    if range.is_single_day() {
        return Shape::Full;
    }
    let in_month = |d: NaiveDate| first <= d && d <= last;

    if date == range.start() && in_month(range.start()) {
        Shape::Start
    } else if date == range.end() && in_month(range.end()) {
        Shape::End
    } else {
        Shape::Middle
    }
}

/// Resolve visible events onto the days of `year`/`month`.
///
/// # Errors
/// `InvalidMonth` when `month` is outside 1-12.
pub fn resolve(events: &[Event], year: i32, month: u32) -> Result<MonthOccurrences, CalendarError> {
    let first = first_day(year, month)?;
    let last = last_day(year, month)?;

    let candidates: Vec<&Event> = events
        .iter()
        .filter(|e| e.visible && e.range.overlaps(first, last))
        .collect();

    let mut occurrences = MonthOccurrences::new();

    for date in first.iter_days().take_while(|d| *d <= last) {
        let mut today: Vec<&Event> = candidates
            .iter()
            .copied()
            .filter(|e| e.range.contains(date))
            .collect();

        if today.is_empty() {
            continue;
        }

        // Stable: equal keys keep input order.
        today.sort_by_key(|e| (e.event_type.rank(), e.range.start()));

        let primary = today[0];
        let shape = shape_on(&primary.range, date, first, last);
        let record = OccurrenceRecord {
            primary: primary.clone(),
            additional: today[1..].iter().map(|e| (*e).clone()).collect(),
            shape,
        };

        occurrences.insert(date.day(), record);
    }

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::event::{EventRecord, EventSchedule, EventType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(id: &str, start: NaiveDate, end: NaiveDate, event_type: EventType) -> Event {
        EventRecord::new(id, id, EventSchedule::Dated { start, end }, event_type)
            .ingest(start.year())
            .unwrap()
    }

    #[test]
    fn shape_on_uses_displayed_month_bounds() {
        let ev = event("fair", date(2025, 2, 27), date(2025, 3, 2), EventType::Institutional);
        let (first, last) = (date(2025, 3, 1), date(2025, 3, 31));
        assert_eq!(shape_on(&ev.range, date(2025, 3, 1), first, last), Shape::Middle);
        assert_eq!(shape_on(&ev.range, date(2025, 3, 2), first, last), Shape::End);

        let (first, last) = (date(2025, 2, 1), date(2025, 2, 28));
        assert_eq!(shape_on(&ev.range, date(2025, 2, 27), first, last), Shape::Start);
    }

    #[test]
    fn multi_day_event_has_start_middle_end() {
        let events = vec![event(
            "trip",
            date(2025, 1, 10),
            date(2025, 1, 12),
            EventType::Personal,
        )];
        let resolved = resolve(&events, 2025, 1).unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[&10].shape, Shape::Start);
        assert_eq!(resolved[&11].shape, Shape::Middle);
        assert_eq!(resolved[&12].shape, Shape::End);
    }

    #[test]
    fn single_day_event_is_full_on_that_day_only() {
        let events = vec![event(
            "talk",
            date(2025, 3, 5),
            date(2025, 3, 5),
            EventType::Institutional,
        )];
        let resolved = resolve(&events, 2025, 3).unwrap();

        assert_eq!(resolved.keys().copied().collect::<Vec<_>>(), vec![5]);
        assert_eq!(resolved[&5].shape, Shape::Full);
        assert!(resolved[&5].additional.is_empty());
    }

    #[test]
    fn subscribed_beats_personal_regardless_of_input_order() {
        let subscribed = event("club", date(2025, 4, 2), date(2025, 4, 2), EventType::Subscribed);
        let personal = event("dentist", date(2025, 4, 2), date(2025, 4, 2), EventType::Personal);

        for pool in [
            vec![subscribed.clone(), personal.clone()],
            vec![personal.clone(), subscribed.clone()],
        ] {
            let resolved = resolve(&pool, 2025, 4).unwrap();
            assert_eq!(resolved[&2].primary.id, "club");
            assert_eq!(resolved[&2].additional.len(), 1);
            assert_eq!(resolved[&2].additional[0].id, "dentist");
        }
    }

    #[test]
    fn equal_rank_orders_by_start_date() {
        let later = event("later", date(2025, 5, 10), date(2025, 5, 12), EventType::Personal);
        let earlier = event("earlier", date(2025, 5, 8), date(2025, 5, 11), EventType::Personal);
        let resolved = resolve(&[later, earlier], 2025, 5).unwrap();

        assert_eq!(resolved[&10].primary.id, "earlier");
        assert_eq!(resolved[&10].shape, Shape::Middle);
        assert_eq!(resolved[&10].additional[0].id, "later");
    }

    #[test]
    fn ties_keep_input_order() {
        let a = event("a", date(2025, 6, 1), date(2025, 6, 1), EventType::Institutional);
        let b = event("b", date(2025, 6, 1), date(2025, 6, 1), EventType::Subscribed);
        let resolved = resolve(&[b.clone(), a.clone()], 2025, 6).unwrap();
        assert_eq!(resolved[&1].primary.id, "b");
        assert_eq!(resolved[&1].additional[0].id, "a");
    }

    #[test]
    fn hidden_type_ranks_last() {
        let hidden = event("h", date(2025, 6, 3), date(2025, 6, 3), EventType::Hidden);
        let personal = event("p", date(2025, 6, 3), date(2025, 6, 3), EventType::Personal);
        let resolved = resolve(&[hidden, personal], 2025, 6).unwrap();
        assert_eq!(resolved[&3].primary.id, "p");
    }

    #[test]
    fn invisible_events_never_appear() {
        let mut secret = event("secret", date(2025, 7, 1), date(2025, 7, 31), EventType::Institutional);
        secret.visible = false;
        let shown = event("shown", date(2025, 7, 15), date(2025, 7, 15), EventType::Personal);

        let resolved = resolve(&[secret, shown], 2025, 7).unwrap();
        assert_eq!(resolved.len(), 1);
        for record in resolved.values() {
            assert!(record.events().all(|e| e.id != "secret"));
        }
    }

    #[test]
    fn event_spanning_whole_month_is_middle_everywhere() {
        let semester = event("semester", date(2025, 8, 20), date(2025, 10, 5), EventType::Institutional);
        let resolved = resolve(&[semester], 2025, 9).unwrap();

        assert_eq!(resolved.len(), 30);
        assert!(resolved.values().all(|r| r.shape == Shape::Middle));
    }

    #[test]
    fn clipped_range_keeps_in_month_endpoint() {
        let conference = event("conf", date(2025, 1, 30), date(2025, 2, 2), EventType::Subscribed);

        let jan = resolve(std::slice::from_ref(&conference), 2025, 1).unwrap();
        assert_eq!(jan[&30].shape, Shape::Start);
        assert_eq!(jan[&31].shape, Shape::Middle);

        let feb = resolve(&[conference], 2025, 2).unwrap();
        assert_eq!(feb[&1].shape, Shape::Middle);
        assert_eq!(feb[&2].shape, Shape::End);
    }

    #[test]
    fn legacy_month_event_covers_every_day() {
        let record = EventRecord::new(
            "exams",
            "Exam period",
            EventSchedule::LegacyMonth { month: 6 },
            EventType::Institutional,
        );
        let events = vec![record.ingest(2025).unwrap()];
        let resolved = resolve(&events, 2025, 6).unwrap();

        assert_eq!(resolved.len(), 30);
        assert_eq!(resolved[&1].shape, Shape::Start);
        assert_eq!(resolved[&15].shape, Shape::Middle);
        assert_eq!(resolved[&30].shape, Shape::End);
    }

    #[test]
    fn repeated_resolution_is_identical() {
        let events = vec![
            event("a", date(2025, 1, 10), date(2025, 1, 12), EventType::Personal),
            event("b", date(2025, 1, 11), date(2025, 1, 11), EventType::Subscribed),
            event("c", date(2025, 1, 11), date(2025, 1, 20), EventType::Personal),
        ];

        let first = resolve(&events, 2025, 1).unwrap();
        let second = resolve(&events, 2025, 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn resolve_rejects_invalid_month() {
        assert_eq!(resolve(&[], 2025, 13), Err(CalendarError::InvalidMonth { month: 13 }));
    }

    #[test]
    fn empty_pool_yields_empty_map() {
        assert!(resolve(&[], 2025, 2).unwrap().is_empty());
    }
}
