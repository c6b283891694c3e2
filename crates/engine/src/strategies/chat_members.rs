//! Chat membership sync for one chat.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::{NameDirectory, Store};
use collabsync_types::{ChatMember, EntityKind};
use serde_json::Value;
use tracing::warn;

use super::{run_full, str_field, SyncStrategy};
use crate::{FetchStats, SyncContext, SyncError, SyncMode};

pub struct ChatMemberSync {
    chat_id: String,
}

impl ChatMemberSync {
    pub fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
        }
    }

    fn map(&self, value: &Value, directory: &mut NameDirectory) -> Option<ChatMember> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping member record without id (chat {})", self.chat_id);
            return None;
        };
        let user_id = str_field(value, "userId").unwrap_or_default();
        let display_name = str_field(value, "displayName");
        if let (false, Some(name)) = (user_id.is_empty(), display_name) {
            // Membership records carry no timestamp of their own; the
            // observation time is this sync.
            directory.update(user_id, name, Utc::now());
        }
        Some(ChatMember {
            id: id.to_string(),
            chat_id: self.chat_id.clone(),
            user_id: user_id.to_string(),
            display_name: display_name.map(str::to_string),
        })
    }
}

impl<R: Remote> SyncStrategy<R> for ChatMemberSync {
    fn kind(&self) -> EntityKind {
        EntityKind::ChatMember
    }

    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(store.chat(&self.chat_id)?.and_then(|c| c.members_synced_at))
    }

    fn mark_synced(
        &self,
        store: &Store,
        at: DateTime<Utc>,
        _mode: SyncMode,
    ) -> anyhow::Result<()> {
        store.set_chat_members_synced(&self.chat_id, at)
    }

    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool> {
        store.has_chat_members(&self.chat_id)
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        let path = format!("/chats/{}/members", self.chat_id);
        let label = format!("members of chat {}", self.chat_id);
        run_full(
            cx,
            &path,
            &label,
            |member: &ChatMember| &member.id,
            |value, directory| self.map(value, directory),
            |store, members| store.put_chat_members(members),
            |store, seen| store.delete_chat_members_absent(&self.chat_id, seen),
        )
        .await
    }
}
