//! Drives one strategy through Deciding → Fetching → Reconciling →
//! Cascading → Committed | Failed | Cancelled.
//!
//! Bookkeeping advances exactly once, on commit, after cascade success; any
//! earlier failure or cancellation leaves it untouched so the next attempt
//! re-derives the same full-vs-delta decision. A cascade failure fails the
//! whole attempt even though the parent rows are already committed — until
//! the next successful cascade, parents may be locally fresher than their
//! children.

use chrono::{DateTime, Duration, Utc};
use collabsync_remote::Remote;
use tracing::{info, warn};

use crate::strategies::{ChatSync, EventSync, TeamSync};
use crate::{SyncContext, SyncError, SyncMode, SyncOutcome, SyncReport, SyncStrategy};

/// How far back the remote change feed reliably reaches (observed ~7
/// months), and the margin subtracted before trusting it.
pub const DELTA_RETENTION_DAYS: i64 = 210;
pub const RETENTION_SAFETY_DAYS: i64 = 14;

/// Full when the stamp is absent/invalid, delta is unsupported, or the
/// stamp has aged past the retention window; delta otherwise.
pub(crate) fn decide(
    supports_delta: bool,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SyncMode {
    if !supports_delta {
        return SyncMode::Full;
    }
    let Some(last) = last else {
        return SyncMode::Full;
    };
    let window = Duration::days(DELTA_RETENTION_DAYS - RETENTION_SAFETY_DAYS);
    if now.signed_duration_since(last) > window {
        SyncMode::Full
    } else {
        SyncMode::Delta
    }
}

/// Run one sync attempt for `strategy`, cascading into owned children when
/// `with_children` is set. Failures are folded into the report rather than
/// returned, so one entity type's failure never aborts a caller's schedule.
pub async fn sync<R, S>(
    strategy: &S,
    cx: &mut SyncContext<'_, R>,
    with_children: bool,
) -> SyncReport
where
    R: Remote,
    S: SyncStrategy<R>,
{
    let kind = strategy.kind();
    let now = Utc::now();

    // Deciding
    let last = match strategy.last_synced(cx.store) {
        Ok(last) => last,
        Err(e) => return failed(strategy, cx, SyncMode::Full, SyncError::Store(e), 0, 0),
    };
    let mode = decide(strategy.supports_delta(), last, now);
    (cx.progress)(&format!("syncing {kind} ({mode})"));

    // Fetching + Reconciling
    let result = match mode {
        SyncMode::Full => strategy.fetch_full(cx).await,
        SyncMode::Delta => strategy.fetch_delta(cx).await,
    };
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => return failed(strategy, cx, mode, e, 0, 0),
    };

    // Cascading
    if with_children {
        if let Err(e) = strategy.cascade(cx).await {
            return failed(strategy, cx, mode, e, stats.fetched, stats.deleted);
        }
    }

    // Committed: flush the directory, then advance bookkeeping — the only
    // point at which "last sync" moves.
    if let Err(e) = cx.directory.persist(cx.store) {
        return failed(strategy, cx, mode, SyncError::Store(e), stats.fetched, stats.deleted);
    }
    if let Err(e) = strategy.mark_synced(cx.store, now, mode) {
        return failed(strategy, cx, mode, SyncError::Store(e), stats.fetched, stats.deleted);
    }

    info!(
        "synced {kind} ({mode}): {} fetched, {} deleted",
        stats.fetched, stats.deleted
    );
    SyncReport {
        kind,
        mode,
        outcome: SyncOutcome::Committed,
        fetched: stats.fetched,
        deleted: stats.deleted,
        error: None,
    }
}

/// Sync every top-level entity type, each with its own independent state
/// machine: one failing does not stop the rest.
pub async fn sync_all<R: Remote>(
    cx: &mut SyncContext<'_, R>,
    with_children: bool,
) -> Vec<SyncReport> {
    let mut reports = Vec::with_capacity(3);
    reports.push(sync(&TeamSync, cx, with_children).await);
    reports.push(sync(&ChatSync, cx, with_children).await);
    reports.push(sync(&EventSync, cx, with_children).await);
    reports
}

fn failed<R, S>(
    strategy: &S,
    cx: &SyncContext<'_, R>,
    mode: SyncMode,
    error: SyncError,
    fetched: usize,
    deleted: usize,
) -> SyncReport
where
    R: Remote,
    S: SyncStrategy<R>,
{
    let kind = strategy.kind();
    let outcome = match &error {
        SyncError::Cancelled => {
            info!("sync of {kind} cancelled");
            SyncOutcome::Cancelled
        }
        SyncError::Fetch(_) => {
            // Without a previous snapshot the caller has nothing to show;
            // with one, last-known-good data stays usable.
            let no_local_data = !strategy.has_local_data(cx.store).unwrap_or(false);
            warn!("sync of {kind} failed: {error}");
            SyncOutcome::Failed { no_local_data }
        }
        SyncError::Store(_) | SyncError::Cascade(_) => {
            warn!("sync of {kind} failed: {error}");
            SyncOutcome::Failed { no_local_data: false }
        }
    };
    SyncReport {
        kind,
        mode,
        outcome,
        fetched,
        deleted,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        collabsync_types::time::parse(s).unwrap()
    }

    #[test]
    fn full_when_delta_unsupported_or_stamp_missing() {
        let now = ts("2024-06-01T00:00:00Z");
        assert_eq!(decide(false, Some(now), now), SyncMode::Full);
        assert_eq!(decide(true, None, now), SyncMode::Full);
    }

    #[test]
    fn delta_inside_the_retention_window() {
        let now = ts("2024-06-01T00:00:00Z");
        let recent = ts("2024-05-01T00:00:00Z");
        assert_eq!(decide(true, Some(recent), now), SyncMode::Delta);
    }

    #[test]
    fn full_once_the_stamp_ages_past_the_window() {
        let now = ts("2024-12-01T00:00:00Z");
        // 196 days is the effective window; 300 days is well past it.
        let stale = now - Duration::days(300);
        assert_eq!(decide(true, Some(stale), now), SyncMode::Full);
        let edge = now - Duration::days(DELTA_RETENTION_DAYS - RETENTION_SAFETY_DAYS - 1);
        assert_eq!(decide(true, Some(edge), now), SyncMode::Delta);
    }
}
