//! Last-successful-sync bookkeeping, persisted independently of the entity
//! tables so a data wipe and a bookkeeping wipe stay separable.

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::time;
use rusqlite::{params, OptionalExtension};

use crate::Store;

impl Store {
    /// Last successful sync for `key`, or `None` when never synced or the
    /// stored value does not parse (both force a full sync upstream).
    pub fn last_synced(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT synced_at FROM bookkeeping WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(time::from_store(raw))
    }

    pub fn set_last_synced(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO bookkeeping (key, synced_at) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET synced_at=excluded.synced_at",
            params![key, time::to_store(at)],
        )?;
        Ok(())
    }

    /// All bookkeeping rows, for status display.
    pub fn bookkeeping(&self) -> Result<Vec<(String, Option<DateTime<Utc>>)>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT key, synced_at FROM bookkeeping ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let raw: Option<String> = row.get(1)?;
            Ok((key, time::from_store(raw)))
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}
