//! Chat rows and chat membership (children of chats).

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, Chat, ChatMember};
use rusqlite::{params, OptionalExtension, Row};

use crate::Store;

const CHAT_COLUMNS: &str =
    "id, topic, chat_type, created_at, modified_at, members_synced_at, messages_synced_at";

impl Store {
    pub fn put_chats(&self, chats: &[Chat]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for chat in chats {
            tx.execute(
                "INSERT INTO chats (id, topic, chat_type, created_at, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET \
                  topic=excluded.topic, chat_type=excluded.chat_type, \
                  created_at=excluded.created_at, modified_at=excluded.modified_at",
                params![
                    chat.id,
                    chat.topic,
                    chat.chat_type,
                    time::to_store_opt(chat.created_at),
                    time::to_store_opt(chat.modified_at),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn chat(&self, id: &str) -> Result<Option<Chat>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id],
                row_to_chat,
            )
            .optional()?)
    }

    /// All chats, most recently modified first.
    pub fn chats(&self) -> Result<Vec<Chat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY modified_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_chat)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn chat_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM chats")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_chats(&self) -> Result<bool> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) > 0 FROM chats", [], |r| r.get(0))?)
    }

    /// Delete chats not in `keep`, cascading members and messages.
    pub fn delete_chats_absent(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM chats")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for chat_id in &stale {
            tx.execute("DELETE FROM chat_messages WHERE chat_id = ?1", params![chat_id])?;
            tx.execute("DELETE FROM chat_members WHERE chat_id = ?1", params![chat_id])?;
            tx.execute("DELETE FROM chats WHERE id = ?1", params![chat_id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    pub fn set_chat_members_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE chats SET members_synced_at = ?2 WHERE id = ?1",
            params![id, time::to_store(at)],
        )?;
        Ok(())
    }

    pub fn set_chat_messages_synced(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE chats SET messages_synced_at = ?2 WHERE id = ?1",
            params![id, time::to_store(at)],
        )?;
        Ok(())
    }

    // ── Members ────────────────────────────────────────────────────────

    pub fn put_chat_members(&self, members: &[ChatMember]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for member in members {
            tx.execute(
                "INSERT INTO chat_members (id, chat_id, user_id, display_name) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET \
                  chat_id=excluded.chat_id, user_id=excluded.user_id, \
                  display_name=excluded.display_name",
                params![member.id, member.chat_id, member.user_id, member.display_name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn chat_members(&self, chat_id: &str) -> Result<Vec<ChatMember>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, user_id, display_name FROM chat_members \
             WHERE chat_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], |row| {
            Ok(ChatMember {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                user_id: row.get(2)?,
                display_name: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn chat_member_ids(&self, chat_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM chat_members WHERE chat_id = ?1")?;
        let rows = stmt.query_map(params![chat_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_chat_members(&self, chat_id: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) > 0 FROM chat_members WHERE chat_id = ?1",
            params![chat_id],
            |r| r.get(0),
        )?)
    }

    pub fn delete_chat_members_absent(
        &self,
        chat_id: &str,
        keep: &HashSet<String>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM chat_members WHERE chat_id = ?1")?;
            let rows = stmt.query_map(params![chat_id], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for id in &stale {
            tx.execute("DELETE FROM chat_members WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }
}

fn row_to_chat(row: &Row) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        topic: row.get(1)?,
        chat_type: row.get(2)?,
        created_at: time::from_store(row.get(3)?),
        modified_at: time::from_store(row.get(4)?),
        members_synced_at: time::from_store(row.get(5)?),
        messages_synced_at: time::from_store(row.get(6)?),
    })
}
