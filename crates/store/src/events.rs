//! Calendar event rows and their owned attendees.
//!
//! An event upsert replaces its attendee set in the same transaction, so a
//! reader never observes an event paired with another snapshot's attendees.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, Attendee, BodyKind, Event};
use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::query::paginate;
use crate::{Direction, Page, Store};

const EVENT_COLUMNS: &str =
    "id, created_at, modified_at, organizer_name, organizer_mail, start_at, end_at, \
     subject, body, body_kind, is_all_day, is_cancelled, web_link, search_text";

impl Store {
    /// Upsert a batch of events, replacing each event's attendees, in one
    /// transaction spanning both tables.
    pub fn put_events(&self, events: &[Event]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for event in events {
            upsert_event(&tx, event)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn event(&self, id: &str) -> Result<Option<Event>> {
        let mut event = match self
            .conn()
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                row_to_event,
            )
            .optional()?
        {
            Some(event) => event,
            None => return Ok(None),
        };
        event.attendees = self.attendees(id)?;
        Ok(Some(event))
    }

    pub fn attendees(&self, event_id: &str) -> Result<Vec<Attendee>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT event_id, is_organizer, name, mail, participation, response \
             FROM attendees WHERE event_id = ?1 ORDER BY is_organizer DESC, mail ASC",
        )?;
        let rows = stmt.query_map(params![event_id], |row| {
            Ok(Attendee {
                event_id: row.get(0)?,
                is_organizer: row.get(1)?,
                name: row.get(2)?,
                mail: row.get(3)?,
                participation: row.get(4)?,
                response: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn event_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM events")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_events(&self) -> Result<bool> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) > 0 FROM events", [], |r| r.get(0))?)
    }

    /// Delete events not in `keep`, cascading attendees, in one transaction.
    pub fn delete_events_absent(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM events")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for id in &stale {
            tx.execute("DELETE FROM attendees WHERE event_id = ?1", params![id])?;
            tx.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Events with a start time inside `[lower, upper]`, over the (start_at)
    /// index, with an optional in-memory free-text predicate. Attendees are
    /// not joined eagerly; fetch them per event when needed.
    pub fn events_by_start(
        &self,
        lower: Option<DateTime<Utc>>,
        upper: Option<DateTime<Utc>>,
        direction: Direction,
        offset: usize,
        limit: usize,
        search: Option<&str>,
    ) -> Result<Page<Event>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut idx = 1u32;
        if let Some(lower) = lower {
            sql.push_str(&format!(" AND start_at >= ?{idx}"));
            params_vec.push(Box::new(time::to_store(lower)));
            idx += 1;
        }
        if let Some(upper) = upper {
            sql.push_str(&format!(" AND start_at <= ?{idx}"));
            params_vec.push(Box::new(time::to_store(upper)));
        }
        sql.push_str(&format!(" ORDER BY start_at {}", direction.sql()));

        let needle = search.map(str::to_lowercase);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_event)?;
        paginate(
            rows,
            |event: &Event| match needle.as_deref() {
                None => true,
                Some(needle) => match event.search_text.as_deref() {
                    Some(s) => s.contains(needle),
                    None => {
                        event.subject.to_lowercase().contains(needle)
                            || event.body.to_lowercase().contains(needle)
                    }
                },
            },
            offset,
            limit,
        )
    }
}

fn upsert_event(tx: &Transaction<'_>, event: &Event) -> Result<()> {
    let touched =
        time::to_store_opt(time::touched(event.created_at, event.modified_at, None));
    tx.execute(
        "INSERT INTO events \
         (id, created_at, modified_at, organizer_name, organizer_mail, start_at, end_at, \
          subject, body, body_kind, is_all_day, is_cancelled, web_link, search_text, touched_at) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15) \
         ON CONFLICT(id) DO UPDATE SET \
          created_at=excluded.created_at, modified_at=excluded.modified_at, \
          organizer_name=excluded.organizer_name, organizer_mail=excluded.organizer_mail, \
          start_at=excluded.start_at, end_at=excluded.end_at, subject=excluded.subject, \
          body=excluded.body, body_kind=excluded.body_kind, \
          is_all_day=excluded.is_all_day, is_cancelled=excluded.is_cancelled, \
          web_link=excluded.web_link, search_text=excluded.search_text, \
          touched_at=excluded.touched_at",
        params![
            event.id,
            time::to_store_opt(event.created_at),
            time::to_store_opt(event.modified_at),
            event.organizer_name,
            event.organizer_mail,
            time::to_store(event.start),
            time::to_store(event.end),
            event.subject,
            event.body,
            event.body_kind.as_str(),
            event.is_all_day,
            event.is_cancelled,
            event.web_link,
            event.compute_search_text(),
            touched,
        ],
    )?;
    tx.execute("DELETE FROM attendees WHERE event_id = ?1", params![event.id])?;
    for attendee in &event.attendees {
        tx.execute(
            "INSERT INTO attendees (event_id, is_organizer, name, mail, participation, response) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id,
                attendee.is_organizer,
                attendee.name,
                attendee.mail,
                attendee.participation,
                attendee.response
            ],
        )?;
    }
    Ok(())
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let body_kind: String = row.get(9)?;
    Ok(Event {
        id: row.get(0)?,
        created_at: time::from_store(row.get(1)?),
        modified_at: time::from_store(row.get(2)?),
        organizer_name: row.get(3)?,
        organizer_mail: row.get(4)?,
        start: time::from_store(row.get(5)?).unwrap_or_default(),
        end: time::from_store(row.get(6)?).unwrap_or_default(),
        subject: row.get(7)?,
        body: row.get(8)?,
        body_kind: BodyKind::parse(&body_kind),
        is_all_day: row.get(10)?,
        is_cancelled: row.get(11)?,
        web_link: row.get(12)?,
        search_text: row.get(13)?,
        attendees: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{attendee, event, test_store};

    #[test]
    fn upsert_replaces_the_attendee_set() {
        let store = test_store();
        let mut ev = event("e1", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z");
        ev.attendees = vec![attendee("e1", "old@example.com")];
        store.put_events(&[ev.clone()]).unwrap();

        ev.attendees = vec![
            attendee("e1", "a@example.com"),
            attendee("e1", "b@example.com"),
        ];
        store.put_events(&[ev]).unwrap();

        let mails: Vec<String> = store
            .attendees("e1")
            .unwrap()
            .into_iter()
            .filter_map(|a| a.mail)
            .collect();
        assert_eq!(mails, vec!["a@example.com".to_string(), "b@example.com".to_string()]);
    }

    #[test]
    fn deleting_events_drops_attendees() {
        let store = test_store();
        let mut ev = event("e1", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z");
        ev.attendees = vec![attendee("e1", "a@example.com")];
        store.put_events(&[ev]).unwrap();

        assert_eq!(store.delete_events_absent(&HashSet::new()).unwrap(), 1);
        assert!(store.event("e1").unwrap().is_none());
        assert!(store.attendees("e1").unwrap().is_empty());
    }

    #[test]
    fn start_range_and_search() {
        let store = test_store();
        let mut early = event("e1", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z");
        early.subject = "Design review".into();
        let mut late = event("e2", "2024-07-01T09:00:00Z", "2024-07-01T10:00:00Z");
        late.subject = "Retro".into();
        store.put_events(&[early, late]).unwrap();

        let page = store
            .events_by_start(
                time::parse("2024-06-15T00:00:00Z"),
                None,
                Direction::Asc,
                0,
                10,
                None,
            )
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "e2");

        let page = store
            .events_by_start(None, None, Direction::Asc, 0, 10, Some("design"))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "e1");
    }
}
