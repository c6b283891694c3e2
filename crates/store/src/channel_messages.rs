//! Channel message rows and their range queries.
//!
//! The derived columns (`touched_at`, `search_text`) are recomputed from
//! their source fields on every write; the values on an incoming struct are
//! ignored.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use collabsync_types::{time, BodyKind, ChannelMessage};
use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::query::paginate;
use crate::{Direction, MessageFilter, Page, Store};

const MESSAGE_COLUMNS: &str = "id, channel_id, reply_to_id, created_at, modified_at, deleted_at, \
     author_id, subject, body, body_kind, search_text, touched_at";

impl Store {
    /// Upsert one page of channel messages in a single transaction.
    pub fn put_channel_messages(&self, messages: &[ChannelMessage]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for message in messages {
            upsert_channel_message(&tx, message)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Apply one delta batch atomically: upserts plus tombstoned deletions.
    pub fn apply_channel_message_delta(
        &self,
        upserts: &[ChannelMessage],
        removed_ids: &[String],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for message in upserts {
            upsert_channel_message(&tx, message)?;
        }
        for id in removed_ids {
            tx.execute("DELETE FROM channel_messages WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn channel_message(&self, id: &str) -> Result<Option<ChannelMessage>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM channel_messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()?)
    }

    pub fn channel_message_ids(&self, channel_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM channel_messages WHERE channel_id = ?1")?;
        let rows = stmt.query_map(params![channel_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn has_channel_messages(&self, channel_id: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) > 0 FROM channel_messages WHERE channel_id = ?1",
            params![channel_id],
            |r| r.get(0),
        )?)
    }

    /// Delete this channel's messages not in `keep`. One transaction.
    pub fn delete_channel_messages_absent(
        &self,
        channel_id: &str,
        keep: &HashSet<String>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM channel_messages WHERE channel_id = ?1")?;
            let rows = stmt.query_map(params![channel_id], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok())
                .filter(|id| !keep.contains(id))
                .collect()
        };
        for id in &stale {
            tx.execute("DELETE FROM channel_messages WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Messages of one channel over the (channel_id, touched_at, subject)
    /// index, optionally bounded by touched time, with in-memory filters.
    pub fn channel_messages_by_touched(
        &self,
        channel_id: &str,
        lower: Option<DateTime<Utc>>,
        upper: Option<DateTime<Utc>>,
        direction: Direction,
        offset: usize,
        limit: usize,
        filter: &MessageFilter,
    ) -> Result<Page<ChannelMessage>> {
        let mut sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM channel_messages WHERE channel_id = ?1"
        );
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(channel_id.to_string())];
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
        sql.push_str(&format!(
            " ORDER BY touched_at {dir}, subject {dir}",
            dir = direction.sql()
        ));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_message)?;
        paginate(
            rows,
            |m: &ChannelMessage| {
                filter.matches(&m.author_id, m.search_text.as_deref(), &m.body)
            },
            offset,
            limit,
        )
    }
}

fn upsert_channel_message(tx: &Transaction<'_>, message: &ChannelMessage) -> Result<()> {
    let touched = time::to_store_opt(message.compute_touched());
    let search = message.compute_search_text();
    tx.execute(
        "INSERT INTO channel_messages \
         (id, channel_id, reply_to_id, created_at, modified_at, deleted_at, \
          author_id, subject, body, body_kind, search_text, touched_at) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12) \
         ON CONFLICT(id) DO UPDATE SET \
          channel_id=excluded.channel_id, reply_to_id=excluded.reply_to_id, \
          created_at=excluded.created_at, modified_at=excluded.modified_at, \
          deleted_at=excluded.deleted_at, author_id=excluded.author_id, \
          subject=excluded.subject, body=excluded.body, \
          body_kind=excluded.body_kind, search_text=excluded.search_text, \
          touched_at=excluded.touched_at",
        params![
            message.id,
            message.channel_id,
            message.reply_to_id,
            time::to_store_opt(message.created_at),
            time::to_store_opt(message.modified_at),
            time::to_store_opt(message.deleted_at),
            message.author_id,
            message.subject,
            message.body,
            message.body_kind.as_str(),
            search,
            touched,
        ],
    )?;
    Ok(())
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChannelMessage> {
    let body_kind: String = row.get(9)?;
    Ok(ChannelMessage {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        reply_to_id: row.get(2)?,
        created_at: time::from_store(row.get(3)?),
        modified_at: time::from_store(row.get(4)?),
        deleted_at: time::from_store(row.get(5)?),
        author_id: row.get(6)?,
        subject: row.get(7)?,
        body: row.get(8)?,
        body_kind: BodyKind::parse(&body_kind),
        search_text: row.get(10)?,
        touched_at: time::from_store(row.get(11)?),
    })
}
