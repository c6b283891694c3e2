use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use collabsync_engine::strategies::{ChatSync, EventSync, TeamSync};
use collabsync_engine::{sync, sync_all, SyncContext, SyncOutcome, SyncReport};
use collabsync_remote::{CancelToken, HttpRemote};
use collabsync_store::NameDirectory;

use crate::config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run_sync(target: &str, with_children: bool, db: Option<&Path>) -> Result<()> {
    let cfg = config::load_config()?;
    if cfg.remote.base_url.trim().is_empty() {
        bail!("no remote base URL configured; run `collabsync config --base-url <URL>`");
    }
    if cfg.remote.token.trim().is_empty() {
        bail!("no token configured; run `collabsync config --token <TOKEN>`");
    }
    let remote = HttpRemote::new(&cfg.remote.base_url, &cfg.remote.token, REQUEST_TIMEOUT)
        .context("Failed to build the HTTP client")?;
    let store = config::open_store(db)?;
    let mut directory = NameDirectory::load(&store)?;

    // Ctrl-C flips the cancel flag; the sync stops at the next page
    // boundary and keeps everything committed so far.
    let cancel = CancelToken::new();
    let ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current page...");
            ctrlc.cancel();
        }
    });

    let progress = |message: &str| println!("  {message}");
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &progress,
    };

    let reports = match target {
        "all" => sync_all(&mut cx, with_children).await,
        "teams" => vec![sync(&TeamSync, &mut cx, with_children).await],
        "chats" => vec![sync(&ChatSync, &mut cx, with_children).await],
        "events" => vec![sync(&EventSync, &mut cx, with_children).await],
        other => bail!("unknown sync target '{other}' (expected teams, chats, events, or all)"),
    };

    println!();
    let mut any_failed = false;
    for report in &reports {
        print_report(report);
        if matches!(report.outcome, SyncOutcome::Failed { .. }) {
            any_failed = true;
        }
    }
    if any_failed {
        bail!("one or more collections failed to sync");
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let verdict = match report.outcome {
        SyncOutcome::Committed => "ok".to_string(),
        SyncOutcome::Cancelled => "cancelled".to_string(),
        SyncOutcome::Failed { no_local_data: true } => "FAILED (no local data)".to_string(),
        SyncOutcome::Failed { no_local_data: false } => "FAILED".to_string(),
    };
    println!(
        "{:<16} {:<6} {:<22} fetched={} deleted={}",
        report.kind, report.mode, verdict, report.fetched, report.deleted
    );
    if let Some(error) = &report.error {
        println!("  {error}");
    }
}
