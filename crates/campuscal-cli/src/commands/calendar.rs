//! Month view.

use chrono::{Datelike, Local, NaiveDate};
use clap::Subcommand;
use campuscal_core::calendar::{MonthGrid, MonthOccurrences, Shape};
use campuscal_core::{generate, ingest_all, resolve};

use super::{open_database, CmdResult};

#[derive(Subcommand)]
pub enum CalendarAction {
    /// Print a month grid with the events of each day
    Month {
        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Month 1-12 (defaults to the current month)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Print occurrences as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: CalendarAction) -> CmdResult {
    match action {
        CalendarAction::Month { year, month, json } => {
            let today = Local::now().date_naive();
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month());

            let records = open_database()?.list_events()?;
            let events = ingest_all(&records, year)?;
            let grid = generate(year, month)?;
            let occurrences = resolve(&events, year, month)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&occurrences)?);
            } else {
                print!("{}", render_month(&grid, &occurrences));
            }
        }
    }
    Ok(())
}

fn shape_label(shape: Shape) -> &'static str {
    match shape {
        Shape::Start => "start",
        Shape::Middle => "cont.",
        Shape::End => "end",
        Shape::Full => "all day",
    }
}

/// Grid with `*` on days that have events, followed by a per-day listing.
fn render_month(grid: &MonthGrid, occurrences: &MonthOccurrences) -> String {
    let mut out = String::new();
    let title = NaiveDate::from_ymd_opt(grid.year(), grid.month(), 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_default();
    out.push_str(&format!("{title:^28}\n"));
    out.push_str(" Su  Mo  Tu  We  Th  Fr  Sa\n");

    for week in grid.weeks() {
        for &day in week {
            if day == 0 {
                out.push_str("    ");
            } else {
                let mark = if occurrences.contains_key(&day) { '*' } else { ' ' };
                out.push_str(&format!("{day:>3}{mark}"));
            }
        }
        out.push('\n');
    }

    if !occurrences.is_empty() {
        out.push('\n');
    }
    for (day, record) in occurrences {
        out.push_str(&format!(
            "{day:>3}  {} [{}, {}]",
            record.primary.title,
            record.primary.event_type,
            shape_label(record.shape)
        ));
        if !record.additional.is_empty() {
            let others: Vec<&str> = record.additional.iter().map(|e| e.title.as_str()).collect();
            out.push_str(&format!(" +{}: {}", others.len(), others.join(", ")));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuscal_core::{EventRecord, EventSchedule, EventType};

    #[test]
    fn renders_grid_and_listing() {
        let record = EventRecord::new(
            "lab",
            "Lab week",
            EventSchedule::Dated {
                start: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            },
            EventType::Personal,
        );
        let events = ingest_all(&[record], 2025).unwrap();
        let grid = generate(2025, 1).unwrap();
        let occurrences = resolve(&events, 2025, 1).unwrap();

        let text = render_month(&grid, &occurrences);
        assert!(text.contains("January 2025"));
        // January 1st 2025 is a Wednesday.
        assert!(text.lines().nth(2).unwrap().starts_with("              1 "));
        assert!(text.contains(" 10*"));
        assert!(text.contains(" 10  Lab week [personal, start]"));
        assert!(text.contains(" 12  Lab week [personal, end]"));
        assert!(!text.contains(" 13*"));
    }
}
