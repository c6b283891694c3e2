//! End-to-end sync scenarios against a scripted remote and an in-memory
//! store.

use chrono::{Duration, Utc};
use collabsync_engine::strategies::{ChannelMessageSync, TeamSync};
use collabsync_engine::testing::ScriptedRemote;
use collabsync_engine::{no_progress, sync, sync_all, SyncContext, SyncMode, SyncOutcome};
use collabsync_remote::CancelToken;
use collabsync_store::{Direction, MessageFilter, NameDirectory, Store};
use collabsync_types::{time, BodyKind, Channel, ChannelMessage, Team};
use serde_json::{json, Value};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn seeded_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    store
        .put_teams(&[Team {
            id: "t1".into(),
            display_name: "Platform".into(),
            description: None,
            web_url: None,
            channels_synced_at: None,
        }])
        .unwrap();
    store
        .put_channels(&[
            local_channel("c1"),
            local_channel("c2"),
        ])
        .unwrap();
    store
}

fn local_channel(id: &str) -> Channel {
    Channel {
        id: id.into(),
        team_id: "t1".into(),
        display_name: format!("channel {id}"),
        description: None,
        web_url: String::new(),
        delta_synced_at: None,
        full_synced_at: None,
    }
}

fn local_message(id: &str, channel_id: &str, created: &str) -> ChannelMessage {
    ChannelMessage {
        id: id.into(),
        channel_id: channel_id.into(),
        reply_to_id: String::new(),
        created_at: time::parse(created),
        modified_at: None,
        deleted_at: None,
        author_id: "u0".into(),
        subject: None,
        body: "stale".into(),
        body_kind: BodyKind::Text,
        search_text: None,
        touched_at: None,
    }
}

fn message_json(id: &str, created: &str, subject: &str, body: &str) -> Value {
    json!({
        "id": id,
        "createdDateTime": created,
        "from": {"user": {"id": "u1", "displayName": "Alice Harper"}},
        "subject": subject,
        "body": {"content": body, "contentType": "text"},
    })
}

const C1_MESSAGES: &str = "/teams/t1/channels/c1/messages";

// ─── Full sync ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_sync_walks_every_page_and_orders_by_recency() {
    let store = seeded_store();
    // Three pages of sizes [2, 2, 1]; two messages carry an empty subject.
    let remote = ScriptedRemote::new()
        .page(
            C1_MESSAGES,
            vec![
                message_json("m1", "2024-03-01T09:00:00Z", "kickoff", "first"),
                message_json("m2", "2024-03-02T09:00:00Z", "standup", "second"),
            ],
            Some("/page2"),
        )
        .page(
            "/page2",
            vec![
                message_json("m3", "2024-03-03T09:00:00Z", "retro", "third"),
                message_json("m4", "2024-03-04T09:00:00Z", "", "fourth"),
            ],
            Some("/page3"),
        )
        .page(
            "/page3",
            vec![message_json("m5", "2024-03-05T09:00:00Z", "", "fifth")],
            None,
        )
        .page(
            "/teams/t1/channels/c2/messages",
            vec![message_json("n1", "2024-03-06T09:00:00Z", "other", "elsewhere")],
            None,
        );
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&ChannelMessageSync::new("t1", "c1"), &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Committed);
    assert_eq!(report.mode, SyncMode::Full);
    assert_eq!(report.fetched, 5);
    let report = sync(&ChannelMessageSync::new("t1", "c2"), &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Committed);

    // Newest first, empty subjects normalized to null but never excluded.
    let page = store
        .channel_messages_by_touched(
            "c1",
            None,
            None,
            Direction::Desc,
            0,
            10,
            &MessageFilter::default(),
        )
        .unwrap();
    let ids: Vec<&str> = page.items.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m5", "m4", "m3", "m2", "m1"]);
    assert!(!page.has_more);
    assert_eq!(page.items[0].subject, None);
    assert_eq!(page.items[2].subject.as_deref(), Some("retro"));
    assert_eq!(page.items[0].touched_at, time::parse("2024-03-05T09:00:00Z"));
    assert!(page.items.iter().all(|m| m.channel_id == "c1"));

    // Commit advanced both channel stamps and flushed the author's name.
    let channel = store.channel("c1").unwrap().unwrap();
    assert!(channel.full_synced_at.is_some());
    assert!(channel.delta_synced_at.is_some());
    let names = NameDirectory::load(&store).unwrap();
    assert_eq!(names.resolve("u1"), Some("Alice Harper"));
}

#[tokio::test]
async fn full_sync_twice_yields_the_same_rows() {
    let store = seeded_store();
    let remote = ScriptedRemote::new()
        .page(
            C1_MESSAGES,
            vec![
                message_json("m1", "2024-03-01T09:00:00Z", "kickoff", "first"),
                message_json("m2", "2024-03-02T09:00:00Z", "", "second"),
            ],
            None,
        )
        .page("/teams/t1/channels/c2/messages", vec![], None);
    let cancel = CancelToken::new();
    let strategy = ChannelMessageSync::new("t1", "c1");

    let mut directory = NameDirectory::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };
    assert!(sync(&strategy, &mut cx, false).await.outcome.is_committed());
    let first = store
        .channel_messages_by_touched(
            "c1",
            None,
            None,
            Direction::Desc,
            0,
            10,
            &MessageFilter::default(),
        )
        .unwrap()
        .items;

    // Age the stamp past the retention window so the next attempt is a full
    // sync again rather than a delta.
    store
        .set_channel_delta_synced("c1", Utc::now() - Duration::days(300))
        .unwrap();
    let mut directory = NameDirectory::load(&store).unwrap();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };
    let report = sync(&strategy, &mut cx, false).await;
    assert_eq!(report.mode, SyncMode::Full);
    assert!(report.outcome.is_committed());

    let second = store
        .channel_messages_by_touched(
            "c1",
            None,
            None,
            Direction::Desc,
            0,
            10,
            &MessageFilter::default(),
        )
        .unwrap()
        .items;
    assert_eq!(first, second);
}

#[tokio::test]
async fn full_sync_deletes_rows_the_remote_no_longer_has() {
    let store = seeded_store();
    store
        .put_channel_messages(&[
            local_message("m1", "c1", "2024-01-01T00:00:00Z"),
            local_message("m2", "c1", "2024-01-02T00:00:00Z"),
            local_message("m3", "c1", "2024-01-03T00:00:00Z"),
        ])
        .unwrap();
    let remote = ScriptedRemote::new().page(
        C1_MESSAGES,
        vec![
            message_json("m1", "2024-03-01T09:00:00Z", "kept", "still here"),
            message_json("m3", "2024-03-03T09:00:00Z", "kept", "still here"),
        ],
        None,
    );
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&ChannelMessageSync::new("t1", "c1"), &mut cx, false).await;
    assert!(report.outcome.is_committed());
    assert_eq!(report.deleted, 1);
    assert_eq!(
        store.channel_message_ids("c1").unwrap(),
        vec!["m1".to_string(), "m3".to_string()]
    );
}

#[tokio::test]
async fn team_deletion_cascades_through_channels_to_messages() {
    let store = seeded_store();
    store
        .put_channel_messages(&[local_message("m1", "c1", "2024-01-01T00:00:00Z")])
        .unwrap();
    // The remote only knows a different team now.
    let remote = ScriptedRemote::new()
        .page(
            "/me/joinedTeams",
            vec![json!({"id": "t2", "displayName": "Design"})],
            None,
        )
        .page("/teams/t2/channels", vec![], None);
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&TeamSync, &mut cx, true).await;
    assert!(report.outcome.is_committed());
    assert_eq!(report.deleted, 1);
    assert!(store.team("t1").unwrap().is_none());
    assert!(store.channel("c1").unwrap().is_none());
    assert!(store.channel_message("m1").unwrap().is_none());
    assert!(store.team("t2").unwrap().is_some());
    assert!(store.last_synced("teams").unwrap().is_some());
}

// ─── Failure and cancellation ────────────────────────────────────────────────

#[tokio::test]
async fn mid_sync_failure_keeps_fetched_pages_and_deletes_nothing() {
    let store = seeded_store();
    store
        .put_channel_messages(&[local_message("stale", "c1", "2024-01-01T00:00:00Z")])
        .unwrap();
    let remote = ScriptedRemote::new()
        .page(
            C1_MESSAGES,
            vec![
                message_json("m1", "2024-03-01T09:00:00Z", "a", "one"),
                message_json("m2", "2024-03-02T09:00:00Z", "b", "two"),
            ],
            Some("/page2"),
        )
        .failure("/page2", "connection reset");
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&ChannelMessageSync::new("t1", "c1"), &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Failed { no_local_data: false });
    assert!(report.error.is_some());

    // Page one committed, the unfetched remainder untouched, and absence
    // reconciliation never ran.
    assert!(store.channel_message("m1").unwrap().is_some());
    assert!(store.channel_message("m2").unwrap().is_some());
    assert!(store.channel_message("stale").unwrap().is_some());
    assert!(store.channel("c1").unwrap().unwrap().delta_synced_at.is_none());
}

#[tokio::test]
async fn fetch_failure_without_a_snapshot_is_flagged() {
    let store = Store::open_in_memory().unwrap();
    let remote = ScriptedRemote::new().failure("/me/joinedTeams", "offline");
    let cancel = CancelToken::new();

    let mut directory = NameDirectory::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };
    let report = sync(&TeamSync, &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Failed { no_local_data: true });

    // With a previous snapshot the same failure is soft.
    store
        .put_teams(&[Team {
            id: "t1".into(),
            display_name: "Platform".into(),
            description: None,
            web_url: None,
            channels_synced_at: None,
        }])
        .unwrap();
    let mut directory = NameDirectory::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };
    let report = sync(&TeamSync, &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Failed { no_local_data: false });
}

#[tokio::test]
async fn cancellation_between_pages_keeps_committed_work() {
    let store = seeded_store();
    store
        .put_channel_messages(&[local_message("stale", "c1", "2024-01-01T00:00:00Z")])
        .unwrap();
    let remote = ScriptedRemote::new()
        .page(
            C1_MESSAGES,
            vec![message_json("m1", "2024-03-01T09:00:00Z", "a", "one")],
            Some("/page2"),
        )
        .page(
            "/page2",
            vec![message_json("m2", "2024-03-02T09:00:00Z", "b", "two")],
            None,
        );
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let progress = move |message: &str| {
        if message.contains("page 1") {
            trigger.cancel();
        }
    };
    let mut directory = NameDirectory::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &progress,
    };

    let report = sync(&ChannelMessageSync::new("t1", "c1"), &mut cx, false).await;
    assert_eq!(report.outcome, SyncOutcome::Cancelled);

    // The first page stays, the second was never requested, no deletions,
    // and the stamp did not move.
    assert!(store.channel_message("m1").unwrap().is_some());
    assert!(store.channel_message("m2").unwrap().is_none());
    assert!(store.channel_message("stale").unwrap().is_some());
    assert!(!remote.calls().iter().any(|p| p == "/page2"));
    assert!(store.channel("c1").unwrap().unwrap().delta_synced_at.is_none());
}

#[tokio::test]
async fn cascade_failure_leaves_parent_bookkeeping_untouched() {
    let store = Store::open_in_memory().unwrap();
    let remote = ScriptedRemote::new()
        .page(
            "/me/joinedTeams",
            vec![json!({"id": "t1", "displayName": "Platform"})],
            None,
        )
        .failure("/teams/t1/channels", "gateway timeout");
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&TeamSync, &mut cx, true).await;
    assert!(matches!(report.outcome, SyncOutcome::Failed { .. }));
    // The parent rows committed before the cascade failed, but "last sync"
    // only moves on a fully successful attempt.
    assert!(store.team("t1").unwrap().is_some());
    assert!(store.last_synced("teams").unwrap().is_none());
}

// ─── Delta sync ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn delta_sync_applies_upserts_and_tombstones() {
    let store = seeded_store();
    store
        .put_channel_messages(&[
            local_message("m0", "c1", "2024-01-01T00:00:00Z"),
            local_message("m1", "c1", "2024-01-02T00:00:00Z"),
            local_message("m2", "c1", "2024-01-03T00:00:00Z"),
        ])
        .unwrap();
    let since = Utc::now() - Duration::days(10);
    store.set_channel_delta_synced("c1", since).unwrap();

    let delta_path = format!("{C1_MESSAGES}/delta?since={}", time::to_store(since));
    let remote = ScriptedRemote::new().page(
        &delta_path,
        vec![
            message_json("m1", "2024-03-01T09:00:00Z", "edited", "fresh body"),
            json!({"id": "m2", "@removed": {"reason": "deleted"}}),
            message_json("m3", "2024-03-02T09:00:00Z", "new", "brand new"),
        ],
        None,
    );
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let report = sync(&ChannelMessageSync::new("t1", "c1"), &mut cx, false).await;
    assert_eq!(report.mode, SyncMode::Delta);
    assert!(report.outcome.is_committed());
    assert_eq!(report.fetched, 2);
    assert_eq!(report.deleted, 1);

    let m1 = store.channel_message("m1").unwrap().unwrap();
    assert_eq!(m1.body, "fresh body");
    assert_eq!(m1.subject.as_deref(), Some("edited"));
    assert_eq!(m1.touched_at, time::parse("2024-03-01T09:00:00Z"));
    assert!(store.channel_message("m2").unwrap().is_none());
    assert!(store.channel_message("m3").unwrap().is_some());
    // A delta batch never reconciles by absence.
    assert!(store.channel_message("m0").unwrap().is_some());
    // The stamp advanced to the attempt, not to the tombstoned past.
    let stamp = store.channel("c1").unwrap().unwrap().delta_synced_at.unwrap();
    assert!(stamp > since);
}

// ─── Top-level isolation ─────────────────────────────────────────────────────

#[tokio::test]
async fn one_entity_type_failing_does_not_stop_the_others() {
    let store = Store::open_in_memory().unwrap();
    let remote = ScriptedRemote::new()
        .failure("/me/joinedTeams", "offline")
        .page(
            "/me/chats",
            vec![json!({
                "id": "chat1",
                "topic": "Lunch",
                "chatType": "group",
                "createdDateTime": "2024-02-01T12:00:00Z",
            })],
            None,
        )
        .page(
            "/chats/chat1/members",
            vec![json!({"id": "mem1", "userId": "u2", "displayName": "Bo Lindqvist"})],
            None,
        )
        .page("/chats/chat1/messages", vec![], None)
        .page(
            "/me/events",
            vec![json!({
                "id": "e1",
                "subject": "Planning",
                "start": {"dateTime": "2024-04-01T10:00:00Z"},
                "end": {"dateTime": "2024-04-01T11:00:00Z"},
                "organizer": {"emailAddress": {"name": "Bo Lindqvist", "address": "bo@example.com"}},
                "attendees": [
                    {
                        "emailAddress": {"name": "Bo Lindqvist", "address": "bo@example.com"},
                        "type": "required",
                        "status": {"response": "accepted"},
                    },
                    {
                        "emailAddress": {"name": "Ada", "address": "ada@example.com"},
                        "type": "optional",
                        "status": {"response": "none"},
                    },
                ],
                "body": {"content": "quarterly planning", "contentType": "text"},
            })],
            None,
        );
    let mut directory = NameDirectory::new();
    let cancel = CancelToken::new();
    let mut cx = SyncContext {
        remote: &remote,
        store: &store,
        directory: &mut directory,
        cancel: &cancel,
        progress: &no_progress,
    };

    let reports = sync_all(&mut cx, true).await;
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0].outcome, SyncOutcome::Failed { .. }));
    assert!(reports[1].outcome.is_committed());
    assert!(reports[2].outcome.is_committed());

    assert_eq!(store.chat_member_ids("chat1").unwrap(), vec!["mem1".to_string()]);
    let event = store.event("e1").unwrap().unwrap();
    assert_eq!(event.attendees.len(), 2);
    assert!(event.attendees[0].is_organizer);
    assert!(!event.attendees[1].is_organizer);
    assert!(store.last_synced("teams").unwrap().is_none());
    assert!(store.last_synced("chats").unwrap().is_some());
    assert!(store.last_synced("events").unwrap().is_some());
    // Membership observations land in the directory on commit.
    let names = NameDirectory::load(&store).unwrap();
    assert_eq!(names.resolve("u2"), Some("Bo Lindqvist"));
}
