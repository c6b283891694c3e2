//! Team list sync, cascading into each team's channel list.

use chrono::{DateTime, Utc};
use collabsync_remote::Remote;
use collabsync_store::Store;
use collabsync_types::{EntityKind, Team};
use serde_json::Value;
use tracing::warn;

use super::{opt_string, run_full, str_field, ChannelSync, SyncStrategy};
use crate::{orchestrator, FetchStats, SyncContext, SyncError, SyncMode};

pub struct TeamSync;

const TEAMS_PATH: &str = "/me/joinedTeams";
const BOOKKEEPING_KEY: &str = "teams";

impl TeamSync {
    fn map(value: &Value) -> Option<Team> {
        let Some(id) = str_field(value, "id").filter(|s| !s.is_empty()) else {
            warn!("dropping team record without id");
            return None;
        };
        let Some(display_name) = str_field(value, "displayName") else {
            warn!("dropping team {id}: no displayName");
            return None;
        };
        Some(Team {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: opt_string(value, "description"),
            web_url: opt_string(value, "webUrl"),
            channels_synced_at: None,
        })
    }
}

impl<R: Remote> SyncStrategy<R> for TeamSync {
    fn kind(&self) -> EntityKind {
        EntityKind::Team
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
        store.has_teams()
    }

    async fn fetch_full(&self, cx: &mut SyncContext<'_, R>) -> Result<FetchStats, SyncError> {
        run_full(
            cx,
            TEAMS_PATH,
            "team list",
            |team: &Team| &team.id,
            |value, _| Self::map(value),
            |store, teams| store.put_teams(teams),
            |store, seen| store.delete_teams_absent(seen),
        )
        .await
    }

    async fn cascade(&self, cx: &mut SyncContext<'_, R>) -> Result<(), SyncError> {
        let teams = cx.store.teams()?;
        for team in teams {
            let child = ChannelSync::new(&team.id);
            let report = orchestrator::sync(&child, cx, true).await;
            match report.outcome {
                crate::SyncOutcome::Committed => {}
                crate::SyncOutcome::Cancelled => return Err(SyncError::Cancelled),
                crate::SyncOutcome::Failed { .. } => {
                    return Err(SyncError::Cascade(EntityKind::Channel))
                }
            }
        }
        Ok(())
    }
}
