use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use collabsync_store::{Direction, MessageFilter, NameDirectory};
use collabsync_types::time;

use crate::config;

pub struct MessagesQuery {
    pub id: String,
    pub chat: bool,
    pub since: Option<String>,
    pub until: Option<String>,
    pub authors: Vec<String>,
    pub search: Option<String>,
    pub direction: Direction,
    pub limit: usize,
    pub offset: usize,
    pub db: Option<PathBuf>,
}

pub fn run_messages(query: MessagesQuery) -> Result<()> {
    let store = config::open_store(query.db.as_deref())?;
    let names = NameDirectory::load(&store)?;
    let lower = parse_bound(query.since.as_deref())?;
    let upper = parse_bound(query.until.as_deref())?;
    let filter = MessageFilter {
        authors: if query.authors.is_empty() {
            None
        } else {
            Some(query.authors.iter().cloned().collect::<HashSet<_>>())
        },
        search: query.search.clone(),
    };

    if query.chat {
        let page = store.chat_messages_by_touched(
            &query.id,
            lower,
            upper,
            query.direction,
            query.offset,
            query.limit,
            &filter,
        )?;
        for m in &page.items {
            print_line(m.touched_at, &m.author_id, None, &m.body, &names);
        }
        finish(page.items.len(), page.has_more, query.offset, query.limit);
    } else {
        let page = store.channel_messages_by_touched(
            &query.id,
            lower,
            upper,
            query.direction,
            query.offset,
            query.limit,
            &filter,
        )?;
        for m in &page.items {
            print_line(m.touched_at, &m.author_id, m.subject.as_deref(), &m.body, &names);
        }
        finish(page.items.len(), page.has_more, query.offset, query.limit);
    }
    Ok(())
}

fn parse_bound(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(raw) => match time::parse(raw) {
            Some(ts) => Ok(Some(ts)),
            None => bail!("could not parse '{raw}' as an RFC 3339 time"),
        },
    }
}

fn print_line(
    touched: Option<DateTime<Utc>>,
    author_id: &str,
    subject: Option<&str>,
    body: &str,
    names: &NameDirectory,
) {
    let stamp = touched.map(time::to_store).unwrap_or_else(|| "-".to_string());
    let author = names.resolve(author_id).unwrap_or(author_id);
    match subject {
        Some(subject) => println!("{stamp}  {author}: [{subject}] {}", preview(body)),
        None => println!("{stamp}  {author}: {}", preview(body)),
    }
}

fn preview(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 80 {
        let cut: String = flat.chars().take(79).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

fn finish(shown: usize, has_more: bool, offset: usize, limit: usize) {
    if shown == 0 {
        println!("(no messages)");
    }
    if has_more {
        println!("... more; rerun with --offset {}", offset + limit);
    }
}
