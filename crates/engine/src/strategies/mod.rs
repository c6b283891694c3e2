//! One sync strategy per entity type.
//!
//! A strategy owns the remote→local record mapping, the full-fetch (and,
//! where the remote exposes a change feed, delta-fetch) procedure, its
//! reconciliation policy, and the cascade into owned children. The
//! orchestrator stays generic over this trait.

mod channel_messages;
mod channels;
mod chat_members;
mod chat_messages;
mod chats;
mod events;
mod teams;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use collabsync_remote::{PageCursor, Remote};
use collabsync_store::{NameDirectory, Store};
use collabsync_types::{time, EntityKind};
use serde_json::Value;

use crate::{FetchStats, SyncError, SyncContext, SyncMode};

pub use channel_messages::ChannelMessageSync;
pub use channels::ChannelSync;
pub use chat_members::ChatMemberSync;
pub use chat_messages::ChatMessageSync;
pub use chats::ChatSync;
pub use events::EventSync;
pub use teams::TeamSync;

#[allow(async_fn_in_trait)]
pub trait SyncStrategy<R: Remote> {
    fn kind(&self) -> EntityKind;

    /// Whether the remote exposes a change feed for this entity type. When
    /// false the orchestrator always chooses a full sync.
    fn supports_delta(&self) -> bool {
        false
    }

    /// The last successful sync stamp, wherever it lives (shared
    /// bookkeeping table or a parent row).
    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Advance the stamp. Called exactly once, on commit.
    fn mark_synced(&self, store: &Store, at: DateTime<Utc>, mode: SyncMode)
        -> anyhow::Result<()>;

    /// Whether any previous snapshot exists locally; decides how hard a
    /// fetch failure is.
    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool>;

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError>;

    /// Delta fetch; strategies without a change feed fall back to full.
    async fn fetch_delta(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        self.fetch_full(cx).await
    }

    /// Synchronize owned children of every local parent record.
    async fn cascade(&self, _cx: &mut SyncContext<'_, R>) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Shared full-sync procedure: page through the whole remote collection,
/// map and upsert per page, and only after complete, uncancelled consumption
/// delete the local ids missing from the fetched set.
pub(crate) async fn run_full<R, T, FMap, FPut, FDel>(
    cx: &mut SyncContext<'_, R>,
    path: &str,
    label: &str,
    id_of: fn(&T) -> &str,
    mut map: FMap,
    put: FPut,
    delete_absent: FDel,
) -> Result<FetchStats, SyncError>
where
    R: Remote,
    T: Send,
    FMap: FnMut(&Value, &mut NameDirectory) -> Option<T> + Send,
    FPut: Fn(&Store, &[T]) -> anyhow::Result<()> + Send,
    FDel: Fn(&Store, &HashSet<String>) -> anyhow::Result<usize> + Send,
{
    let mut cursor = PageCursor::new(cx.remote, path);
    let mut seen: HashSet<String> = HashSet::new();
    let mut fetched = 0usize;
    let mut page_no = 0usize;

    while let Some(page) = cursor.advance(cx.cancel).await? {
        page_no += 1;
        let mut records = Vec::with_capacity(page.value.len());
        for value in &page.value {
            if let Some(record) = map(value, cx.directory) {
                records.push(record);
            }
        }
        for record in &records {
            seen.insert(id_of(record).to_string());
        }
        fetched += records.len();
        put(cx.store, &records)?;
        (cx.progress)(&format!("syncing {label}: page {page_no}, count={fetched}"));
    }

    // Reached only when the entire collection was consumed: partial failure
    // must never delete records that simply weren't fetched yet.
    let deleted = delete_absent(cx.store, &seen)?;
    Ok(FetchStats { fetched, deleted })
}

// ─── Remote payload accessors ────────────────────────────────────────────────

pub(crate) fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn opt_string(value: &Value, key: &str) -> Option<String> {
    str_field(value, key)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

pub(crate) fn ts_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    str_field(value, key).and_then(time::parse)
}

/// `value.a.b.c` as a string.
pub(crate) fn nested_str<'v>(value: &'v Value, path: &[&str]) -> Option<&'v str> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str()
}
