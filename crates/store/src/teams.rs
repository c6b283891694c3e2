//! Team rows.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, Team};
use rusqlite::{params, OptionalExtension, Row};

use crate::Store;

impl Store {
    /// Upsert a batch of teams in one transaction. Sync stamps are preserved
    /// across upserts; only the remote-sourced columns are overwritten.
    pub fn put_teams(&self, teams: &[Team]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for team in teams {
            tx.execute(
                "INSERT INTO teams (id, display_name, description, web_url) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET \
                  display_name=excluded.display_name, \
                  description=excluded.description, \
                  web_url=excluded.web_url",
                params![team.id, team.display_name, team.description, team.web_url],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn team(&self, id: &str) -> Result<Option<Team>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, display_name, description, web_url, channels_synced_at \
                 FROM teams WHERE id = ?1",
                params![id],
                row_to_team,
            )
            .optional()?)
    }

    /// All teams, ordered by display name.
    pub fn teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, description, web_url, channels_synced_at \
             FROM teams ORDER BY display_name ASC",
        )?;
        let rows = stmt.query_map([], row_to_team)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn team_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM teams")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_teams(&self) -> Result<bool> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) > 0 FROM teams", [], |r| r.get(0))?)
    }

    /// Delete every team not in `keep`, cascading its channels and their
    /// messages in the same transaction. Returns the number of teams removed.
    pub fn delete_teams_absent(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM teams")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for team_id in &stale {
            tx.execute(
                "DELETE FROM channel_messages WHERE channel_id IN \
                 (SELECT id FROM channels WHERE team_id = ?1)",
                params![team_id],
            )?;
            tx.execute("DELETE FROM channels WHERE team_id = ?1", params![team_id])?;
            tx.execute("DELETE FROM teams WHERE id = ?1", params![team_id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    pub fn set_team_channels_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE teams SET channels_synced_at = ?2 WHERE id = ?1",
            params![id, time::to_store(at)],
        )?;
        Ok(())
    }
}

fn row_to_team(row: &Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        display_name: row.get(1)?,
        description: row.get(2)?,
        web_url: row.get(3)?,
        channels_synced_at: time::from_store(row.get(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{team, test_store};

    #[test]
    fn upsert_preserves_sync_stamp() {
        let store = test_store();
        store.put_teams(&[team("t1", "Engineering")]).unwrap();
        let at = time::parse("2024-04-01T00:00:00Z").unwrap();
        store.set_team_channels_synced("t1", at).unwrap();

        // A re-sync overwrites the remote columns only.
        store.put_teams(&[team("t1", "Engineering (renamed)")]).unwrap();
        let got = store.team("t1").unwrap().unwrap();
        assert_eq!(got.display_name, "Engineering (renamed)");
        assert_eq!(got.channels_synced_at, Some(at));
    }

    #[test]
    fn absent_teams_are_deleted_with_their_channels() {
        let store = test_store();
        store.put_teams(&[team("t1", "A"), team("t2", "B")]).unwrap();
        store
            .put_channels(&[crate::test_support::channel("c1", "t2", "General")])
            .unwrap();

        let keep: HashSet<String> = ["t1".to_string()].into();
        let removed = store.delete_teams_absent(&keep).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.team_ids().unwrap(), vec!["t1".to_string()]);
        assert!(store.channel("c1").unwrap().is_none());
    }
}
