//! The sync engine: per-entity-type strategies driven by a small
//! orchestrator that decides full-vs-delta, reconciles deletions, and
//! cascades into owned child collections.

pub mod error;
pub mod orchestrator;
pub mod strategies;

pub mod testing;

use collabsync_remote::{CancelToken, Remote};
use collabsync_store::{NameDirectory, Store};

pub use error::{FetchStats, SyncError, SyncMode, SyncOutcome, SyncReport};
pub use orchestrator::{sync, sync_all};
pub use strategies::SyncStrategy;

/// Everything a sync pass needs, constructed by the caller and passed down
/// explicitly. No global state.
pub struct SyncContext<'a, R: Remote> {
    pub remote: &'a R,
    pub store: &'a Store,
    pub directory: &'a mut NameDirectory,
    pub cancel: &'a CancelToken,
    /// Invoked at least once per phase and once per fetched page.
    pub progress: &'a (dyn Fn(&str) + Sync),
}

/// A progress sink that drops everything, for callers that do not care.
pub fn no_progress(_: &str) {}
