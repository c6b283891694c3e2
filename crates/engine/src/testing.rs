//! Scripted in-memory [`Remote`] for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use collabsync_remote::{FetchError, PageCollection, Remote};
use serde_json::Value;

enum Scripted {
    Page(PageCollection),
    Fail(String),
}

/// Serves pre-scripted pages keyed by request path. Pages are repeatable
/// (the same path always yields the same page), which keeps idempotence
/// tests honest; failures are repeatable too. Every GET is recorded.
#[derive(Default)]
pub struct ScriptedRemote {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one page at `path`. `next` becomes the page's continuation
    /// link and should itself be routed.
    pub fn page(self, path: &str, values: Vec<Value>, next: Option<&str>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Page(PageCollection::new(values, next)));
        self
    }

    /// Script a transport failure at `path`.
    pub fn failure(self, path: &str, message: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    /// Paths requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Remote for ScriptedRemote {
    async fn get(&self, path: &str) -> Result<PageCollection, FetchError> {
        self.calls.lock().unwrap().push(path.to_string());
        match self.routes.lock().unwrap().get(path) {
            Some(Scripted::Page(page)) => Ok(page.clone()),
            Some(Scripted::Fail(message)) => Err(FetchError::Transport(message.clone())),
            None => Err(FetchError::Status {
                status: 404,
                body: format!("no scripted page for {path}"),
            }),
        }
    }
}
