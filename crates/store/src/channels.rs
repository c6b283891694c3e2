//! Channel rows (children of teams).

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, Channel};
use rusqlite::{params, OptionalExtension, Row};

use crate::Store;

const CHANNEL_COLUMNS: &str =
    "id, team_id, display_name, description, web_url, delta_synced_at, full_synced_at";

impl Store {
    pub fn put_channels(&self, channels: &[Channel]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for channel in channels {
            tx.execute(
                "INSERT INTO channels (id, team_id, display_name, description, web_url) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET \
                  team_id=excluded.team_id, \
                  display_name=excluded.display_name, \
                  description=excluded.description, \
                  web_url=excluded.web_url",
                params![
                    channel.id,
                    channel.team_id,
                    channel.display_name,
                    channel.description,
                    channel.web_url
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn channel(&self, id: &str) -> Result<Option<Channel>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                params![id],
                row_to_channel,
            )
            .optional()?)
    }

    /// Channels of one team, ordered by display name (the (team_id,
    /// display_name) index ordering).
    pub fn channels_of_team(&self, team_id: &str) -> Result<Vec<Channel>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels \
             WHERE team_id = ?1 ORDER BY display_name ASC"
        ))?;
        let rows = stmt.query_map(params![team_id], row_to_channel)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn channel_ids_of_team(&self, team_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM channels WHERE team_id = ?1")?;
        let rows = stmt.query_map(params![team_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_channels_of_team(&self, team_id: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) > 0 FROM channels WHERE team_id = ?1",
            params![team_id],
            |r| r.get(0),
        )?)
    }

    /// Delete the team's channels not in `keep`, cascading their messages in
    /// the same transaction.
    pub fn delete_channels_absent(&self, team_id: &str, keep: &HashSet<String>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM channels WHERE team_id = ?1")?;
            let rows = stmt.query_map(params![team_id], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for channel_id in &stale {
            tx.execute(
                "DELETE FROM channel_messages WHERE channel_id = ?1",
                params![channel_id],
            )?;
            tx.execute("DELETE FROM channels WHERE id = ?1", params![channel_id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    pub fn set_channel_delta_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE channels SET delta_synced_at = ?2 WHERE id = ?1",
            params![id, time::to_store(at)],
        )?;
        Ok(())
    }

    /// A completed full message sync resets the delta cursor too: the next
    /// delta picks up from the full snapshot, not from before it.
    pub fn set_channel_full_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE channels SET full_synced_at = ?2, delta_synced_at = ?2 WHERE id = ?1",
            params![id, time::to_store(at)],
        )?;
        Ok(())
    }
}

fn row_to_channel(row: &Row) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        team_id: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        web_url: row.get(4)?,
        delta_synced_at: time::from_store(row.get(5)?),
        full_synced_at: time::from_store(row.get(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{channel, test_store};

    #[test]
    fn channels_list_in_name_order() {
        let store = test_store();
        store
            .put_channels(&[
                channel("c2", "t1", "Random"),
                channel("c1", "t1", "General"),
                channel("c3", "t2", "Other team"),
            ])
            .unwrap();
        let names: Vec<String> = store
            .channels_of_team("t1")
            .unwrap()
            .into_iter()
            .map(|c| c.display_name)
            .collect();
        assert_eq!(names, vec!["General".to_string(), "Random".to_string()]);
    }

    #[test]
    fn full_sync_stamp_advances_delta_stamp() {
        let store = test_store();
        store.put_channels(&[channel("c1", "t1", "General")]).unwrap();
        let at = time::parse("2024-04-02T12:00:00Z").unwrap();
        store.set_channel_full_synced("c1", at).unwrap();
        let got = store.channel("c1").unwrap().unwrap();
        assert_eq!(got.full_synced_at, Some(at));
        assert_eq!(got.delta_synced_at, Some(at));
    }
}
