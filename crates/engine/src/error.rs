//! Sync error kinds and the per-attempt report.

use collabsync_remote::FetchError;
use collabsync_types::EntityKind;
use thiserror::Error;

/// Fatal failure modes of one sync attempt. Record-local mapping problems
/// are not here: they are logged and the record dropped, by design.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Cooperative cancellation. Bookkeeping untouched, committed
    /// transactions stay.
    #[error("sync cancelled")]
    Cancelled,
    /// The remote fetch failed mid-iteration.
    #[error("remote fetch failed: {0}")]
    Fetch(#[source] FetchError),
    /// A store transaction failed during upsert or reconciliation.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
    /// A child entity type's sync failed after the parent committed.
    #[error("cascaded {0} sync failed")]
    Cascade(EntityKind),
}

impl From<FetchError> for SyncError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Cancelled => SyncError::Cancelled,
            other => SyncError::Fetch(other),
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::Store(e)
    }
}

/// How a sync attempt fetched its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Delta,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SyncMode::Full => "full",
            SyncMode::Delta => "delta",
        })
    }
}

/// Terminal state of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fetch, reconciliation, and cascade all succeeded; bookkeeping
    /// advanced.
    Committed,
    /// Cooperatively stopped; bookkeeping untouched.
    Cancelled,
    /// Fetch, store, or cascade failure; bookkeeping untouched.
    /// `no_local_data` flags the hard case where no previous snapshot
    /// exists to fall back on.
    Failed { no_local_data: bool },
}

impl SyncOutcome {
    pub fn is_committed(self) -> bool {
        matches!(self, SyncOutcome::Committed)
    }
}

/// Counters from one fetch pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStats {
    pub fetched: usize,
    pub deleted: usize,
}

/// What one orchestrated sync attempt did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub kind: EntityKind,
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
    pub fetched: usize,
    pub deleted: usize,
    /// Human-readable failure description, when not committed.
    pub error: Option<String>,
}
