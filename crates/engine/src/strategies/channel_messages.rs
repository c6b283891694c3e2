//! Channel message sync: full with reconciliation, or delta against the
//! remote change feed with tombstone handling.

use chrono::{DateTime, Utc};
use collabsync_remote::{PageCursor, Remote};
use collabsync_store::{NameDirectory, Store};
use collabsync_types::{text, time, BodyKind, ChannelMessage, EntityKind};
use serde_json::Value;
use tracing::{debug, warn};

use super::{nested_str, run_full, str_field, ts_field, SyncStrategy};
use crate::{FetchStats, SyncContext, SyncError, SyncMode};

pub struct ChannelMessageSync {
    team_id: String,
    channel_id: String,
}

impl ChannelMessageSync {
    pub fn new(team_id: &str, channel_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    fn messages_path(&self) -> String {
        format!("/teams/{}/channels/{}/messages", self.team_id, self.channel_id)
    }

    fn delta_path(&self, since: DateTime<Utc>) -> String {
        format!("{}/delta?since={}", self.messages_path(), time::to_store(since))
    }

    /// Map one remote message record and opportunistically feed the author's
    /// display name into the directory.
    fn map(&self, value: &Value, directory: &mut NameDirectory) -> Option<ChannelMessage> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping message record without id (channel {})", self.channel_id);
            return None;
        };
        let created_at = ts_field(value, "createdDateTime");
        let modified_at = ts_field(value, "lastModifiedDateTime");
        let deleted_at = ts_field(value, "deletedDateTime");
        if created_at.is_none() && modified_at.is_none() && deleted_at.is_none() {
            warn!("dropping message {id}: no usable timestamp");
            return None;
        }

        let author_id = nested_str(value, &["from", "user", "id"]).unwrap_or_default();
        if let Some(author_name) = nested_str(value, &["from", "user", "displayName"]) {
            if !author_id.is_empty() {
                let observed = modified_at.or(created_at).unwrap_or_default();
                directory.update(author_id, author_name, observed);
            }
        }

        Some(ChannelMessage {
            id: id.to_string(),
            channel_id: self.channel_id.clone(),
            reply_to_id: str_field(value, "replyToId").unwrap_or_default().to_string(),
            created_at,
            modified_at,
            deleted_at,
            author_id: author_id.to_string(),
            subject: text::normalize_subject(str_field(value, "subject")),
            body: nested_str(value, &["body", "content"]).unwrap_or_default().to_string(),
            body_kind: BodyKind::parse(
                nested_str(value, &["body", "contentType"]).unwrap_or("text"),
            ),
            search_text: None,
            touched_at: None,
        })
    }
}

impl<R: Remote> SyncStrategy<R> for ChannelMessageSync {
    fn kind(&self) -> EntityKind {
        EntityKind::ChannelMessage
    }

    fn supports_delta(&self) -> bool {
        true
    }

    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>> {
        // A full sync advances the delta stamp too, so this is the most
        // recent successful sync of either mode.
        Ok(store.channel(&self.channel_id)?.and_then(|c| c.delta_synced_at))
    }

    fn mark_synced(&self, store: &Store, at: DateTime<Utc>, mode: SyncMode) -> anyhow::Result<()> {
        match mode {
            SyncMode::Full => store.set_channel_full_synced(&self.channel_id, at),
            SyncMode::Delta => store.set_channel_delta_synced(&self.channel_id, at),
        }
    }

    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool> {
        store.has_channel_messages(&self.channel_id)
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        let path = self.messages_path();
        let label = format!("messages of channel {}", self.channel_id);
        run_full(
            cx,
            &path,
            &label,
            |message: &ChannelMessage| &message.id,
            |value, directory| self.map(value, directory),
            |store, messages| store.put_channel_messages(messages),
            |store, seen| store.delete_channel_messages_absent(&self.channel_id, seen),
        )
        .await
    }

    /// Change-feed fetch. Each batch applies its upserts and its tombstoned
    /// deletions in one transaction; absence reconciliation does not apply.
    async fn fetch_delta(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        let since = <Self as SyncStrategy<R>>::last_synced(self, cx.store)?
            .unwrap_or_default();
        let path = self.delta_path(since);
        let mut cursor = PageCursor::new(cx.remote, &path);
        let mut stats = FetchStats::default();
        let mut page_no = 0usize;

        while let Some(page) = cursor.advance(cx.cancel).await? {
            page_no += 1;
            let mut upserts = Vec::new();
            let mut removed: Vec<String> = Vec::new();
            for value in &page.value {
                if value.get("@removed").is_some() {
                    if let Some(id) = str_field(value, "id") {
                        removed.push(id.to_string());
                    }
                    continue;
                }
                if let Some(message) = self.map(value, cx.directory) {
                    upserts.push(message);
                }
            }
            stats.fetched += upserts.len();
            stats.deleted += removed.len();
            cx.store.apply_channel_message_delta(&upserts, &removed)?;
            (cx.progress)(&format!(
                "delta for channel {}: page {page_no}, count={}",
                self.channel_id, stats.fetched
            ));
        }
        debug!(
            "channel {} delta: {} upserts, {} tombstones",
            self.channel_id, stats.fetched, stats.deleted
        );
        Ok(stats)
    }
}
