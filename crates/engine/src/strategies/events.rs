//! Calendar event sync. Attendees are owned sub-records mapped inline and
//! replaced with their event, so no separate cascade exists.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::Store;
use collabsync_types::{Attendee, BodyKind, Event, EntityKind};
use serde_json::Value;
use tracing::warn;

use super::{nested_str, run_full, str_field, ts_field, SyncStrategy};
use crate::{FetchStats, SyncContext, SyncError, SyncMode};

pub struct EventSync;

const EVENTS_PATH: &str = "/me/events";
const BOOKKEEPING_KEY: &str = "events";

impl EventSync {
    fn map(value: &Value) -> Option<Event> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping event record without id");
            return None;
        };
        let Some(start) = nested_str(value, &["start", "dateTime"])
            .and_then(collabsync_types::time::parse)
        else {
            warn!("dropping event {id}: no usable start time");
            return None;
        };
        let end = nested_str(value, &["end", "dateTime"])
            .and_then(collabsync_types::time::parse)
            .unwrap_or(start);

        let organizer_name = nested_str(value, &["organizer", "emailAddress", "name"]);
        let organizer_mail = nested_str(value, &["organizer", "emailAddress", "address"]);

        let attendees = value
            .get("attendees")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|a| Self::map_attendee(id, a, organizer_mail))
                    .collect()
            })
            .unwrap_or_default();

        Some(Event {
            id: id.to_string(),
            created_at: ts_field(value, "createdDateTime"),
            modified_at: ts_field(value, "lastModifiedDateTime"),
            organizer_name: organizer_name.map(str::to_string),
            organizer_mail: organizer_mail.map(str::to_string),
            start,
            end,
            subject: str_field(value, "subject").unwrap_or_default().to_string(),
            body: nested_str(value, &["body", "content"]).unwrap_or_default().to_string(),
            body_kind: BodyKind::parse(
                nested_str(value, &["body", "contentType"]).unwrap_or("text"),
            ),
            is_all_day: value.get("isAllDay").and_then(Value::as_bool).unwrap_or(false),
            is_cancelled: value.get("isCancelled").and_then(Value::as_bool).unwrap_or(false),
            web_link: str_field(value, "webLink").unwrap_or_default().to_string(),
            search_text: None,
            attendees,
        })
    }

    fn map_attendee(event_id: &str, value: &Value, organizer_mail: Option<&str>) -> Option<Attendee> {
        let name = nested_str(value, &["emailAddress", "name"]);
        let mail = nested_str(value, &["emailAddress", "address"]);
        if name.is_none() && mail.is_none() {
            return None;
        }
        Some(Attendee {
            event_id: event_id.to_string(),
            is_organizer: mail.is_some() && mail == organizer_mail,
            name: name.map(str::to_string),
            mail: mail.map(str::to_string),
            participation: str_field(value, "type").unwrap_or_default().to_string(),
            response: nested_str(value, &["status", "response"])
                .unwrap_or_default()
                .to_string(),
        })
    }
}

impl<R: Remote> SyncStrategy<R> for EventSync {
    fn kind(&self) -> EntityKind {
        EntityKind::Event
    }

    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>> {
        store.last_synced(BOOKKEEPING_KEY)
    }

    fn mark_synced(
        &self,
        store: &Store,
        at: DateTime<Utc>,
        _mode: SyncMode,
    ) -> anyhow::Result<()> {
        store.set_last_synced(BOOKKEEPING_KEY, at)
    }

    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool> {
        store.has_events()
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        run_full(
            cx,
            EVENTS_PATH,
            "calendar events",
            |event: &Event| &event.id,
            |value, _| Self::map(value),
            |store, events| store.put_events(events),
            |store, seen| store.delete_events_absent(seen),
        )
        .await
    }
}
