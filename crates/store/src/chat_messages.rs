//! Chat message rows (children of chats). Same derived-column policy as
//! channel messages, without subject or reply threading.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, BodyKind, ChatMessage};
use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::query::paginate;
use crate::{Direction, MessageFilter, Page, Store};

const MESSAGE_COLUMNS: &str =
    "id, chat_id, created_at, modified_at, deleted_at, author_id, body, body_kind, \
     search_text, touched_at";

impl Store {
    pub fn put_chat_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for message in messages {
            upsert_chat_message(&tx, message)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn chat_message(&self, id: &str) -> Result<Option<ChatMessage>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()?)
    }

    pub fn chat_message_ids(&self, chat_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM chat_messages WHERE chat_id = ?1")?;
        let rows = stmt.query_map(params![chat_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_chat_messages(&self, chat_id: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) > 0 FROM chat_messages WHERE chat_id = ?1",
            params![chat_id],
            |r| r.get(0),
        )?)
    }

    pub fn delete_chat_messages_absent(
        &self,
        chat_id: &str,
        keep: &HashSet<String>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM chat_messages WHERE chat_id = ?1")?;
            let rows = stmt.query_map(params![chat_id], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for id in &stale {
            tx.execute("DELETE FROM chat_messages WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Messages of one chat over the (chat_id, touched_at) index.
    pub fn chat_messages_by_touched(
        &self,
        chat_id: &str,
        lower: Option<DateTime<Utc>>,
        upper: Option<DateTime<Utc>>,
        direction: Direction,
        offset: usize,
        limit: usize,
        filter: &MessageFilter,
    ) -> Result<Page<ChatMessage>> {
        let mut sql = format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE chat_id = ?1");
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(chat_id.to_string())];
        let mut idx = 2u32;
        if let Some(lower) = lower {
            sql.push_str(&format!(" AND touched_at >= ?{idx}"));
            params_vec.push(Box::new(time::to_store(lower)));
            idx += 1;
        }
        if let Some(upper) = upper {
            sql.push_str(&format!(" AND touched_at <= ?{idx}"));
            params_vec.push(Box::new(time::to_store(upper)));
        }
        sql.push_str(&format!(" ORDER BY touched_at {}", direction.sql()));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_message)?;
        paginate(
            rows,
            |m: &ChatMessage| filter.matches(&m.author_id, m.search_text.as_deref(), &m.body),
            offset,
            limit,
        )
    }
}

fn upsert_chat_message(tx: &Transaction<'_>, message: &ChatMessage) -> Result<()> {
    let touched = time::to_store_opt(message.compute_touched());
    let search = message.compute_search_text();
    tx.execute(
        "INSERT INTO chat_messages \
         (id, chat_id, created_at, modified_at, deleted_at, author_id, body, \
          body_kind, search_text, touched_at) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10) \
         ON CONFLICT(id) DO UPDATE SET \
          chat_id=excluded.chat_id, created_at=excluded.created_at, \
          modified_at=excluded.modified_at, deleted_at=excluded.deleted_at, \
          author_id=excluded.author_id, body=excluded.body, \
          body_kind=excluded.body_kind, search_text=excluded.search_text, \
          touched_at=excluded.touched_at",
        params![
            message.id,
            message.chat_id,
            time::to_store_opt(message.created_at),
            time::to_store_opt(message.modified_at),
            time::to_store_opt(message.deleted_at),
            message.author_id,
            message.body,
            message.body_kind.as_str(),
            search,
            touched,
        ],
    )?;
    Ok(())
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    let body_kind: String = row.get(7)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        created_at: time::from_store(row.get(2)?),
        modified_at: time::from_store(row.get(3)?),
        deleted_at: time::from_store(row.get(4)?),
        author_id: row.get(5)?,
        body: row.get(6)?,
        body_kind: BodyKind::parse(&body_kind),
        search_text: row.get(8)?,
        touched_at: time::from_store(row.get(9)?),
    })
}
