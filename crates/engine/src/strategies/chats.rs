//! Chat list sync, cascading into each chat's members and messages.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::Store;
use collabsync_types::{Chat, EntityKind};
use serde_json::Value;
use tracing::warn;

use super::{opt_string, run_full, str_field, ts_field, ChatMemberSync, ChatMessageSync, SyncStrategy};
use crate::{orchestrator, FetchStats, SyncContext, SyncError, SyncMode, SyncOutcome};

pub struct ChatSync;

const CHATS_PATH: &str = "/me/chats";
const BOOKKEEPING_KEY: &str = "chats";

impl ChatSync {
    fn map(value: &Value) -> Option<Chat> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping chat record without id");
            return None;
        };
        Some(Chat {
            id: id.to_string(),
            topic: opt_string(value, "topic"),
            chat_type: str_field(value, "chatType").unwrap_or_default().to_string(),
            created_at: ts_field(value, "createdDateTime"),
            modified_at: ts_field(value, "lastUpdatedDateTime"),
            members_synced_at: None,
            messages_synced_at: None,
        })
    }
}

impl<R: Remote> SyncStrategy<R> for ChatSync {
    fn kind(&self) -> EntityKind {
        EntityKind::Chat
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
        store.has_chats()
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        run_full(
            cx,
            CHATS_PATH,
            "chat list",
            |chat: &Chat| &chat.id,
            |value, _| Self::map(value),
            |store, chats| store.put_chats(chats),
            |store, seen| store.delete_chats_absent(seen),
        )
        .await
    }

    async fn cascade(&self, cx: &mut SyncContext<'_, R>) -> Result<(), SyncError> {
        let chats = cx.store.chats()?;
        for chat in chats {
            let members = ChatMemberSync::new(&chat.id);
            let report = orchestrator::sync(&members, cx, false).await;
            match report.outcome {
                SyncOutcome::Committed => {}
                SyncOutcome::Cancelled => return Err(SyncError::Cancelled),
                SyncOutcome::Failed { .. } => {
                    return Err(SyncError::Cascade(EntityKind::ChatMember))
                }
            }

            let messages = ChatMessageSync::new(&chat.id);
            let report = orchestrator::sync(&messages, cx, false).await;
            match report.outcome {
                SyncOutcome::Committed => {}
                SyncOutcome::Cancelled => return Err(SyncError::Cancelled),
                SyncOutcome::Failed { .. } => {
                    return Err(SyncError::Cascade(EntityKind::ChatMessage))
                }
            }
        }
        Ok(())
    }
}
