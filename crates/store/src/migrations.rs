//! Named schema migrations, applied in order and recorded in a migrations
//! table so each runs exactly once per database.

use anyhow::{Context, Result};
use collabsync_types::{text, time, BodyKind};
use rusqlite::{params, Connection};
use tracing::info;

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

pub const MIGRATIONS: &[Migration] = &[
    ("0001_schema", SCHEMA_0001),
    ("0002_message_indexes", INDEXES_0002),
];

const SCHEMA_0001: &str = "
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    description TEXT,
    web_url TEXT,
    channels_synced_at TEXT
);
CREATE TABLE IF NOT EXISTS channels (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    description TEXT,
    web_url TEXT NOT NULL DEFAULT '',
    delta_synced_at TEXT,
    full_synced_at TEXT
);
CREATE TABLE IF NOT EXISTS channel_messages (
    id TEXT PRIMARY KEY,
    channel_id TEXT NOT NULL,
    reply_to_id TEXT NOT NULL DEFAULT '',
    created_at TEXT,
    modified_at TEXT,
    deleted_at TEXT,
    author_id TEXT NOT NULL DEFAULT '',
    subject TEXT,
    body TEXT NOT NULL DEFAULT '',
    body_kind TEXT NOT NULL DEFAULT 'text',
    search_text TEXT,
    touched_at TEXT
);
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    topic TEXT,
    chat_type TEXT NOT NULL DEFAULT '',
    created_at TEXT,
    modified_at TEXT,
    members_synced_at TEXT,
    messages_synced_at TEXT
);
CREATE TABLE IF NOT EXISTS chat_members (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    user_id TEXT NOT NULL DEFAULT '',
    display_name TEXT
);
CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    created_at TEXT,
    modified_at TEXT,
    deleted_at TEXT,
    author_id TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    body_kind TEXT NOT NULL DEFAULT 'text',
    search_text TEXT,
    touched_at TEXT
);
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    created_at TEXT,
    modified_at TEXT,
    organizer_name TEXT,
    organizer_mail TEXT,
    start_at TEXT NOT NULL,
    end_at TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    body_kind TEXT NOT NULL DEFAULT 'text',
    is_all_day INTEGER NOT NULL DEFAULT 0,
    is_cancelled INTEGER NOT NULL DEFAULT 0,
    web_link TEXT NOT NULL DEFAULT '',
    search_text TEXT,
    touched_at TEXT
);
CREATE TABLE IF NOT EXISTS attendees (
    event_id TEXT NOT NULL,
    is_organizer INTEGER NOT NULL DEFAULT 0,
    name TEXT,
    mail TEXT,
    participation TEXT NOT NULL DEFAULT '',
    response TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS directory (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS bookkeeping (
    key TEXT PRIMARY KEY,
    synced_at TEXT NOT NULL
);
";

/// Compound indexes backing the supported range orderings. Applying this
/// migration also recomputes the derived message columns so rows written
/// under an older schema index correctly.
const INDEXES_0002: &str = "
CREATE INDEX IF NOT EXISTS idx_channels_team_name ON channels(team_id, display_name);
CREATE INDEX IF NOT EXISTS idx_channel_messages_touched ON channel_messages(channel_id, touched_at, subject);
CREATE INDEX IF NOT EXISTS idx_channel_messages_created ON channel_messages(channel_id, created_at);
CREATE INDEX IF NOT EXISTS idx_chat_members_chat ON chat_members(chat_id);
CREATE INDEX IF NOT EXISTS idx_chat_messages_touched ON chat_messages(chat_id, touched_at);
CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_at);
CREATE INDEX IF NOT EXISTS idx_attendees_event ON attendees(event_id);
";

/// Apply all unapplied migrations, in order, each in its own transaction.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }
        conn.execute_batch("BEGIN")?;
        let result = (|| -> Result<()> {
            conn.execute_batch(sql)
                .with_context(|| format!("migration {name}"))?;
            if *name == "0002_message_indexes" {
                let rewritten = recompute_derived(conn)?;
                if rewritten > 0 {
                    info!("recomputed derived columns for {rewritten} message rows");
                }
            }
            conn.execute(
                "INSERT INTO schema_migrations (name) VALUES (?1)",
                params![name],
            )?;
            Ok(())
        })();
        match result {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
        info!("applied migration {name}");
    }
    Ok(())
}

/// Recompute `touched_at` and `search_text` for every message row from their
/// source columns. Idempotent: rows already carrying the derived values are
/// rewritten to the same bytes.
pub fn recompute_derived(conn: &Connection) -> Result<usize> {
    let mut rewritten = 0;
    for table in ["channel_messages", "chat_messages"] {
        let has_subject = table == "channel_messages";
        let select = if has_subject {
            format!(
                "SELECT id, created_at, modified_at, deleted_at, subject, body, body_kind \
                 FROM {table}"
            )
        } else {
            format!(
                "SELECT id, created_at, modified_at, deleted_at, NULL, body, body_kind \
                 FROM {table}"
            )
        };
        let mut stmt = conn.prepare(&select)?;
        let rows: Vec<(String, Option<String>, Option<String>)> = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let created = time::from_store(row.get(1)?);
                let modified = time::from_store(row.get(2)?);
                let deleted = time::from_store(row.get(3)?);
                let subject: Option<String> = row.get(4)?;
                let body: String = row.get(5)?;
                let body_kind: String = row.get(6)?;
                let touched = time::to_store_opt(time::touched(created, modified, deleted));
                let search =
                    text::search_text(subject.as_deref(), &body, BodyKind::parse(&body_kind));
                Ok((id, touched, search))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let update = format!("UPDATE {table} SET touched_at = ?2, search_text = ?3 WHERE id = ?1");
        for (id, touched, search) in rows {
            conn.execute(&update, params![id, touched, search])?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}
