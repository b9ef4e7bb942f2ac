use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use campuscal_core::calendar::EventSchedule;
use campuscal_core::{Config, EventRecord, EventType};

use super::{open_database, CmdResult};

#[derive(Subcommand)]
pub enum EventAction {
    /// Add a local event
    Add {
        #[arg(long)]
        title: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Whole-month event in every year, used when no dates are given
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// institutional, subscribed, personal or hidden
        #[arg(long, default_value = "personal")]
        kind: EventType,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// List events
    List {
        /// Include hidden events
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one event as JSON
    Show { id: String },
    /// Hide an event from the month view
    Hide {
        id: String,
        /// Make it visible again
        #[arg(long)]
        undo: bool,
    },
    /// Delete an event
    Delete { id: String },
}

fn describe_schedule(schedule: &EventSchedule) -> String {
    match schedule {
        EventSchedule::Dated { start, end } if start == end => start.to_string(),
        EventSchedule::Dated { start, end } => format!("{start} .. {end}"),
        EventSchedule::LegacyMonth { month } => format!("all of month {month}"),
    }
}

pub fn run(action: EventAction) -> CmdResult {
    let db = open_database()?;
    match action {
        EventAction::Add {
            title,
            start,
            end,
            month,
            kind,
            description,
            location,
        } => {
            let id = uuid::Uuid::new_v4().to_string();
            let schedule = EventSchedule::from_parts(&id, start, end, month)?;
            let mut record = EventRecord::new(id, title, schedule, kind);
            record.description = description.unwrap_or_default();
            record.location = location;
            record.updated_at = Utc::now();
            db.upsert_event(&record)?;
            println!("Event created: {}", record.id);
        }
        EventAction::List { all, json } => {
            let show_hidden = all || Config::load_or_default().calendar.list_hidden;
            let mut events = db.list_events()?;
            events.retain(|e| show_hidden || e.visible);
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }
            for e in &events {
                let hidden = if e.visible { "" } else { " (hidden)" };
                println!(
                    "{}  {:<14} {:<24} {}{hidden}",
                    e.id,
                    e.event_type,
                    describe_schedule(&e.schedule),
                    e.title
                );
            }
        }
        EventAction::Show { id } => match db.get_event(&id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => return Err(format!("event not found: {id}").into()),
        },
        EventAction::Hide { id, undo } => {
            if !db.set_event_visible(&id, undo)? {
                return Err(format!("event not found: {id}").into());
            }
            println!("{}", if undo { "event visible" } else { "event hidden" });
        }
        EventAction::Delete { id } => {
            if !db.delete_event(&id)? {
                return Err(format!("event not found: {id}").into());
            }
            println!("Event deleted: {id}");
        }
    }
    Ok(())
}
