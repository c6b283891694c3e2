//! Write-back cache mapping opaque user ids to display names.
//!
//! Populated opportunistically while mapping remote message and membership
//! records; name resolution happens at read time, never as an eager join.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, DirectoryEntry};
use rusqlite::params;
use tracing::debug;

use crate::Store;

#[derive(Debug, Clone)]
struct CachedName {
    display_name: String,
    updated_at: DateTime<Utc>,
    dirty: bool,
}

/// In-memory user directory with last-writer-wins-by-timestamp merges and a
/// dirty counter so persisting an unchanged cache costs nothing.
#[derive(Debug, Default)]
pub struct NameDirectory {
    entries: HashMap<String, CachedName>,
    dirty_count: usize,
}

impl NameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted directory.
    pub fn load(store: &Store) -> Result<Self> {
        let mut directory = Self::new();
        for entry in store.directory_entries()? {
            directory.entries.insert(
                entry.id,
                CachedName {
                    display_name: entry.display_name,
                    updated_at: entry.updated_at,
                    dirty: false,
                },
            );
        }
        Ok(directory)
    }

    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty_count
    }

    /// Record an observation of `id` carrying `name` at `observed_at`.
    ///
    /// Absent entries insert unconditionally. Existing entries are
    /// overwritten only when the observation is strictly newer AND the name
    /// actually differs, so repeated identical observations never mark the
    /// cache dirty.
    pub fn update(&mut self, id: &str, name: &str, observed_at: DateTime<Utc>) {
        if name.is_empty() {
            return;
        }
        match self.entries.get_mut(id) {
            None => {
                self.entries.insert(
                    id.to_string(),
                    CachedName {
                        display_name: name.to_string(),
                        updated_at: observed_at,
                        dirty: true,
                    },
                );
                self.dirty_count += 1;
            }
            Some(entry) => {
                if observed_at > entry.updated_at && entry.display_name != name {
                    entry.display_name = name.to_string();
                    entry.updated_at = observed_at;
                    if !entry.dirty {
                        entry.dirty = true;
                        self.dirty_count += 1;
                    }
                }
            }
        }
    }

    /// Write dirty entries back to the store. No-op when nothing changed.
    pub fn persist(&mut self, store: &Store) -> Result<()> {
        if self.dirty_count == 0 {
            return Ok(());
        }
        let dirty: Vec<DirectoryEntry> = self
            .entries
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(id, e)| DirectoryEntry {
                id: id.clone(),
                display_name: e.display_name.clone(),
                updated_at: e.updated_at,
            })
            .collect();
        debug!("persisting {} directory entries", dirty.len());
        store.put_directory_entries(&dirty)?;
        for entry in self.entries.values_mut() {
            entry.dirty = false;
        }
        self.dirty_count = 0;
        Ok(())
    }
}

impl Store {
    pub fn directory_entries(&self) -> Result<Vec<DirectoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, display_name, updated_at FROM directory")?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(2)?;
            Ok(DirectoryEntry {
                id: row.get(0)?,
                display_name: row.get(1)?,
                updated_at: time::parse(&raw).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn put_directory_entries(&self, entries: &[DirectoryEntry]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for entry in entries {
            tx.execute(
                "INSERT INTO directory (id, display_name, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(id) DO UPDATE SET \
                  display_name=excluded.display_name, updated_at=excluded.updated_at",
                params![entry.id, entry.display_name, time::to_store(entry.updated_at)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
