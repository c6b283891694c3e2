use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use collabsync_store::Direction;
use collabsync_types::time;

use crate::config;

pub struct EventsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub search: Option<String>,
    pub direction: Direction,
    pub limit: usize,
    pub db: Option<PathBuf>,
}

pub fn run_events(query: EventsQuery) -> Result<()> {
    let store = config::open_store(query.db.as_deref())?;
    let lower = parse_bound(query.from.as_deref())?;
    let upper = parse_bound(query.to.as_deref())?;

    let page = store.events_by_start(
        lower,
        upper,
        query.direction,
        0,
        query.limit,
        query.search.as_deref(),
    )?;
    for event in &page.items {
        let organizer = event.organizer_name.as_deref().unwrap_or("?");
        let flags = match (event.is_all_day, event.is_cancelled) {
            (_, true) => " [cancelled]",
            (true, false) => " [all day]",
            (false, false) => "",
        };
        println!(
            "{} .. {}  {}{flags}",
            time::to_store(event.start),
            time::to_store(event.end),
            event.subject
        );
        let attendees = store.attendees(&event.id)?;
        println!("    organizer: {organizer}, {} attendee(s)", attendees.len());
    }
    if page.items.is_empty() {
        println!("(no events)");
    }
    if page.has_more {
        println!("... more; raise --limit to see the rest");
    }
    Ok(())
}

fn parse_bound(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(raw) => match time::parse(raw) {
            Some(ts) => Ok(Some(ts)),
            None => bail!("could not parse '{raw}' as an RFC 3339 time"),
        },
    }
}
