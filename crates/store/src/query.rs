//! Range-query plumbing shared by the per-entity accessors.

use std::collections::HashSet;

use anyhow::Result;

/// Scan direction over an ordered index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One page of a range query. `has_more` is derived by over-fetching one row;
/// callers must never assume an exact-limit page is final.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// In-memory predicates applied while walking an already-range-narrowed
/// cursor. These are deliberately not extra indexes: author sets and free
/// text restrict within the scan instead of multiplying orderings.
#[derive(Debug, Default, Clone)]
pub struct MessageFilter {
    /// Restrict to these author ids, when present.
    pub authors: Option<HashSet<String>>,
    /// Case-insensitive substring over the search column (falling back to
    /// the raw body when no search text is stored).
    pub search: Option<String>,
}

impl MessageFilter {
    pub fn is_empty(&self) -> bool {
        self.authors.is_none() && self.search.is_none()
    }

    pub(crate) fn matches(&self, author_id: &str, search_text: Option<&str>, body: &str) -> bool {
        if let Some(ref authors) = self.authors {
            if !authors.contains(author_id) {
                return false;
            }
        }
        if let Some(ref needle) = self.search {
            let needle = needle.to_lowercase();
            let haystack = match search_text {
                Some(s) => s.contains(&needle),
                None => body.to_lowercase().contains(&needle),
            };
            if !haystack {
                return false;
            }
        }
        true
    }
}

/// Walk an ordered row iterator applying `keep`, skip `offset` surviving
/// rows, and collect `limit`+1 to decide `has_more`.
pub(crate) fn paginate<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    mut keep: impl FnMut(&T) -> bool,
    offset: usize,
    limit: usize,
) -> Result<Page<T>> {
    let mut skipped = 0usize;
    let mut items = Vec::with_capacity(limit.min(256));
    for row in rows {
        let row = row?;
        if !keep(&row) {
            continue;
        }
        if skipped < offset {
            skipped += 1;
            continue;
        }
        items.push(row);
        if items.len() > limit {
            break;
        }
    }
    let has_more = items.len() > limit;
    if has_more {
        items.pop();
    }
    Ok(Page { items, has_more })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> impl Iterator<Item = rusqlite::Result<usize>> {
        (0..n).map(Ok)
    }

    #[test]
    fn paginate_pops_the_overfetched_row() {
        let page = paginate(rows(5), |_| true, 0, 2).unwrap();
        assert_eq!(page.items, vec![0, 1]);
        assert!(page.has_more);

        let page = paginate(rows(5), |_| true, 4, 2).unwrap();
        assert_eq!(page.items, vec![4]);
        assert!(!page.has_more);

        // Exact-limit tail page.
        let page = paginate(rows(4), |_| true, 2, 2).unwrap();
        assert_eq!(page.items, vec![2, 3]);
        assert!(!page.has_more);
    }

    #[test]
    fn predicate_applies_before_offset_accounting() {
        // Keep evens: 0 2 4 6 8; offset 1 limit 2 -> [2, 4], more.
        let page = paginate(rows(10), |n| n % 2 == 0, 1, 2).unwrap();
        assert_eq!(page.items, vec![2, 4]);
        assert!(page.has_more);
    }

    #[test]
    fn chained_pages_equal_one_scan() {
        let full: Vec<usize> = (0..23).filter(|n| n % 3 != 0).collect();
        for limit in [1, 2, 5, 50] {
            let mut collected = Vec::new();
            let mut offset = 0;
            loop {
                let page = paginate(rows(23), |n| n % 3 != 0, offset, limit).unwrap();
                offset += page.items.len();
                let more = page.has_more;
                collected.extend(page.items);
                if !more {
                    break;
                }
            }
            assert_eq!(collected, full, "limit {limit}");
        }
    }
}
