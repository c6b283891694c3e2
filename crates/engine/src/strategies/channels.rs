//! Channel list sync for one team, cascading into per-channel messages.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::Store;
use collabsync_types::{Channel, EntityKind};
use serde_json::Value;
use tracing::warn;

use super::{opt_string, run_full, str_field, ChannelMessageSync, SyncStrategy};
use crate::{orchestrator, FetchStats, SyncContext, SyncError, SyncMode};

pub struct ChannelSync {
    team_id: String,
}

impl ChannelSync {
    pub fn new(team_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
        }
    }

    fn map(&self, value: &Value) -> Option<Channel> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping channel record without id (team {})", self.team_id);
            return None;
        };
        let Some(display_name) = str_field(value, "displayName") else {
            warn!("dropping channel {id}: no displayName");
            return None;
        };
        Some(Channel {
            id: id.to_string(),
            team_id: self.team_id.clone(),
            display_name: display_name.to_string(),
            description: opt_string(value, "description"),
            web_url: str_field(value, "webUrl").unwrap_or_default().to_string(),
            delta_synced_at: None,
            full_synced_at: None,
        })
    }
}

impl<R: Remote> SyncStrategy<R> for ChannelSync {
    fn kind(&self) -> EntityKind {
        EntityKind::Channel
    }

    fn last_synced(&self, store: &Store) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(store.team(&self.team_id)?.and_then(|t| t.channels_synced_at))
    }

    fn mark_synced(
        &self,
        store: &Store,
        at: DateTime<Utc>,
        _mode: SyncMode,
    ) -> anyhow::Result<()> {
        store.set_team_channels_synced(&self.team_id, at)
    }

    fn has_local_data(&self, store: &Store) -> anyhow::Result<bool> {
        store.has_channels_of_team(&self.team_id)
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        let path = format!("/teams/{}/channels", self.team_id);
        let label = format!("channel list of team {}", self.team_id);
        run_full(
            cx,
            &path,
            &label,
            |channel: &Channel| &channel.id,
            |value, _| self.map(value),
            |store, channels| store.put_channels(channels),
            |store, seen| store.delete_channels_absent(&self.team_id, seen),
        )
        .await
    }

    async fn cascade(&self, cx: &mut SyncContext<'_, R>) -> Result<(), SyncError> {
        let channels = cx.store.channels_of_team(&self.team_id)?;
        for channel in channels {
            let child = ChannelMessageSync::new(&self.team_id, &channel.id);
            let report = orchestrator::sync(&child, cx, false).await;
            match report.outcome {
                crate::SyncOutcome::Committed => {}
                crate::SyncOutcome::Cancelled => return Err(SyncError::Cancelled),
                crate::SyncOutcome::Failed { .. } => {
                    return Err(SyncError::Cascade(EntityKind::ChannelMessage))
                }
            }
        }
        Ok(())
    }
}
