//! Page-by-page iteration over one remote collection.

use crate::{CancelToken, FetchError, PageCollection, Remote};

/// Walks a paginated remote collection in the remote's page order.
///
/// The cancel token is checked before each fetch, never mid-fetch. An empty
/// page with a continuation link does not end iteration; only a missing link
/// does.
pub struct PageCursor<'a, R: Remote> {
    remote: &'a R,
    next: Option<String>,
}

impl<'a, R: Remote> PageCursor<'a, R> {
    pub fn new(remote: &'a R, first_path: &str) -> Self {
        Self {
            remote,
            next: Some(first_path.to_string()),
        }
    }

    /// Fetch the next page, or `Ok(None)` once the collection is exhausted.
    pub async fn advance(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Option<PageCollection>, FetchError> {
        if self.next.is_none() {
            return Ok(None);
        }
        cancel.check()?;
        let path = self.next.take().unwrap_or_default();
        let page = self.remote.get(&path).await?;
        self.next = page.next_link.clone();
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRemote {
        pages: Mutex<HashMap<String, PageCollection>>,
    }

    impl FakeRemote {
        fn new(pages: Vec<(&str, PageCollection)>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
            }
        }
    }

    impl Remote for FakeRemote {
        async fn get(&self, path: &str) -> Result<PageCollection, FetchError> {
            self.pages
                .lock()
                .unwrap()
                .remove(path)
                .ok_or_else(|| FetchError::Transport(format!("no page for {path}")))
        }
    }

    #[tokio::test]
    async fn walks_pages_in_remote_order() {
        let remote = FakeRemote::new(vec![
            ("/items", PageCollection::new(vec![json!({"id": "a"})], Some("/items?page=2"))),
            ("/items?page=2", PageCollection::new(vec![json!({"id": "b"})], None)),
        ]);
        let mut cursor = PageCursor::new(&remote, "/items");
        let cancel = CancelToken::new();

        let first = cursor.advance(&cancel).await.unwrap().unwrap();
        assert_eq!(first.value.len(), 1);
        let second = cursor.advance(&cancel).await.unwrap().unwrap();
        assert_eq!(second.value[0]["id"], "b");
        assert!(cursor.advance(&cancel).await.unwrap().is_none());
        // Exhausted cursors stay exhausted.
        assert!(cursor.advance(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_first_page_still_follows_continuation() {
        let remote = FakeRemote::new(vec![
            ("/items", PageCollection::new(vec![], Some("/items?page=2"))),
            ("/items?page=2", PageCollection::new(vec![json!({"id": "x"})], None)),
        ]);
        let mut cursor = PageCursor::new(&remote, "/items");
        let cancel = CancelToken::new();

        let first = cursor.advance(&cancel).await.unwrap().unwrap();
        assert!(first.value.is_empty());
        let second = cursor.advance(&cancel).await.unwrap().unwrap();
        assert_eq!(second.value.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_the_fetch() {
        let remote = FakeRemote::new(vec![(
            "/items",
            PageCollection::new(vec![json!({"id": "a"})], None),
        )]);
        let mut cursor = PageCursor::new(&remote, "/items");
        let cancel = CancelToken::new();
        cancel.cancel();

        match cursor.advance(&cancel).await {
            Err(FetchError::Cancelled) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
        // The page was never consumed.
        assert_eq!(remote.pages.lock().unwrap().len(), 1);
    }
}
