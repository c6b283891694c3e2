//! Chat message sync for one chat. Full-only: the remote exposes no change
//! feed for personal chats.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::{NameDirectory, Store};
use collabsync_types::{BodyKind, ChatMessage, EntityKind};
use serde_json::Value;
use tracing::warn;

use super::{nested_str, run_full, str_field, ts_field, SyncStrategy};
use crate::{FetchStats, SyncContext, SyncError, SyncMode};

pub struct ChatMessageSync {
    chat_id: String,
}

impl ChatMessageSync {
    pub fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
        }
    }

    fn map(&self, value: &Value, directory: &mut NameDirectory) -> Option<ChatMessage> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping chat message record without id (chat {})", self.chat_id);
            return None;
        };
        let created_at = ts_field(value, "createdDateTime");
        let modified_at = ts_field(value, "lastModifiedDateTime");
        let deleted_at = ts_field(value, "deletedDateTime");
        if created_at.is_none() && modified_at.is_none() && deleted_at.is_none() {
            warn!("dropping chat message {id}: no usable timestamp");
            return None;
        }

        let author_id = nested_str(value, &["from", "user", "id"]).unwrap_or_default();
        if let Some(author_name) = nested_str(value, &["from", "user", "displayName"]) {
            if !author_id.is_empty() {
                let observed = modified_at.or(created_at).unwrap_or_default();
                directory.update(author_id, author_name, observed);
            }
        }

        Some(ChatMessage {
            id: id.to_string(),
            chat_id: self.chat_id.clone(),
            created_at,
            modified_at,
            deleted_at,
            author_id: author_id.to_string(),
            body: nested_str(value, &["body", "content"]).unwrap_or_default().to_string(),
            body_kind: BodyKind::parse(
                nested_str(value, &["body", "contentType"]).unwrap_or("text"),
            ),
            search_text: None,
            touched_at: None,
        })
    }
}

impl<R: Remote> SyncStrategy<R> for ChatMessageSync {
    fn kind(&self) -> EntityKind {
        EntityKind::ChatMessage
    }

    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(store.chat(&self.chat_id)?.and_then(|c| c.messages_synced_at))
    }

    fn mark_synced(
        &self,
        store: &Store,
        at: DateTime<Utc>,
        _mode: SyncMode,
    ) -> anyhow::Result<()> {
        store.set_chat_messages_synced(&self.chat_id, at)
    }

    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool> {
        store.has_chat_messages(&self.chat_id)
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        let path = format!("/chats/{}/messages", self.chat_id);
        let label = format!("messages of chat {}", self.chat_id);
        run_full(
            cx,
            &path,
            &label,
            |message: &ChatMessage| &message.id,
            |value, directory| self.map(value, directory),
            |store, messages| store.put_chat_messages(messages),
            |store, seen| store.delete_chat_messages_absent(&self.chat_id, seen),
        )
        .await
    }
}
