//! Local entity store: one SQLite database holding the mirrored collaboration
//! data, its compound secondary indexes, the sync bookkeeping table, and the
//! user directory.
//!
//! Thread-safe: wraps the connection in a Mutex so it can be shared via
//! `Arc<Store>`. All multi-row writes run inside a transaction; the
//! reconciliation paths (`delete_*_absent`) cascade owned child rows in the
//! same transaction as the parent deletes.

pub mod migrations;

mod bookkeeping;
mod channel_messages;
mod channels;
mod chat_messages;
mod chats;
mod directory;
mod events;
mod query;
mod teams;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::Connection;

pub use directory::NameDirectory;
pub use query::{Direction, MessageFilter, Page};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at the default path,
    /// `~/.local/share/collabsync/mirror.db`.
    pub fn open() -> Result<Self> {
        let path = default_db_path()?;
        Self::open_path(&path)
    }

    /// Open (or create) the store at a specific path and bring the schema up
    /// to date.
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migrations::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}

fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("collabsync")
        .join("mirror.db"))
}
