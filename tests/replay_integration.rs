//! Integration tests for replaying persisted sessions

use game_replay::abstractions::{MockKeyStore, MockTransport};
use game_replay::config::RecorderSettings;
use game_replay::error::Error;
use game_replay::replay::{load_artifact, ReplayEngine, ReplayOptions};
use game_replay::session::{ArtifactWriter, ChannelLayout, Recorder, RecorderPolicy, SessionListener};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn engine(transport: &Arc<MockTransport>, key_store: &Arc<MockKeyStore>) -> ReplayEngine {
    ReplayEngine::new(transport.clone(), key_store.clone(), "state", "turn")
}

fn options(skip: usize, limit: usize, delay_ms: u64) -> ReplayOptions {
    ReplayOptions {
        send_initial_state: false,
        skip,
        limit,
        delay: Duration::from_millis(delay_ms),
    }
}

/// Write an artifact with `n` turns and updates
fn write_artifact(dir: &TempDir, n: usize) -> PathBuf {
    let turns: Vec<String> = (1..=n).map(|i| format!("t{i}")).collect();
    let updates: Vec<String> = (1..=n).map(|i| format!("u{i}")).collect();
    let keys: Vec<serde_json::Value> = (1..=n).map(|i| json!({ "step": i.to_string() })).collect();
    let artifact = json!({
        "botId": "bot",
        "replayId": "A",
        "gameStart": { "game_start": { "replay_id": "A" } },
        "KEYS": keys,
        "turn": turns,
        "gameUpdate": updates,
    });
    let path = dir.path().join("bot-A.json");
    std::fs::write(&path, serde_json::to_string_pretty(&artifact).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_skip_and_limit_publish_one_event() {
    let dir = TempDir::new().unwrap();
    let path = write_artifact(&dir, 3);
    let record = load_artifact(&path, "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let key_store = Arc::new(MockKeyStore::new());
    let summary = engine(&transport, &key_store)
        .run(&record, &options(1, 1, 100))
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(transport.published_on("bot-turn").await, ["t2"]);
    assert_eq!(transport.published_on("bot-gameUpdate").await, ["u2"]);
    assert_eq!(transport.get_published().await.len(), 2);

    let writes = key_store.get_writes().await;
    assert_eq!(writes, [("bot-A".to_string(), json!({ "step": "2" }))]);
    assert_eq!(transport.quit_count().await, 1);
}

#[tokio::test]
async fn test_skip_past_end_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 3), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let summary = engine(&transport, &Arc::new(MockKeyStore::new()))
        .run(&record, &options(5, 1, 0))
        .await
        .unwrap();

    assert!(summary.skipped_all);
    assert_eq!(summary.sent, 0);
    assert!(transport.get_published().await.is_empty());
    assert_eq!(transport.quit_count().await, 1);
}

#[tokio::test]
async fn test_limit_is_clamped_to_remaining_events() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 3), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let summary = engine(&transport, &Arc::new(MockKeyStore::new()))
        .run(&record, &options(1, 10, 0))
        .await
        .unwrap();

    assert!(summary.clamped);
    assert_eq!(summary.sent, 2);
    assert_eq!(transport.published_on("bot-turn").await, ["t2", "t3"]);
}

#[tokio::test]
async fn test_initial_state_is_published_first() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 2), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let summary = engine(&transport, &Arc::new(MockKeyStore::new()))
        .run(
            &record,
            &ReplayOptions {
                send_initial_state: true,
                ..options(0, 0, 0)
            },
        )
        .await
        .unwrap();

    assert!(summary.initial_state_sent);
    assert_eq!(summary.sent, 2);
    let published = transport.get_published().await;
    assert_eq!(published[0].channel, "bot-state");
    let start: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
    assert_eq!(start["game_start"]["replay_id"], "A");
}

#[tokio::test]
async fn test_events_are_paced_by_delay() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 3), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let started = Instant::now();
    engine(&transport, &Arc::new(MockKeyStore::new()))
        .run(&record, &options(0, 3, 50))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(90));
    let turns: Vec<Instant> = transport
        .get_published()
        .await
        .into_iter()
        .filter(|m| m.channel == "bot-turn")
        .map(|m| m.at)
        .collect();
    assert_eq!(turns.len(), 3);
    for pair in turns.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(45));
    }
}

#[tokio::test]
async fn test_failed_publish_is_counted_and_replay_continues() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 2), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    transport.fail_channel("bot-gameUpdate").await;
    let summary = engine(&transport, &Arc::new(MockKeyStore::new()))
        .run(&record, &options(0, 2, 0))
        .await
        .unwrap();

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed_publishes, 2);
    assert_eq!(transport.published_on("bot-turn").await, ["t1", "t2"]);
}

#[tokio::test]
async fn test_interrupt_stops_between_events() {
    let dir = TempDir::new().unwrap();
    let record = load_artifact(&write_artifact(&dir, 3), "turn").await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let summary = engine(&transport, &Arc::new(MockKeyStore::new()))
        .run_until(
            &record,
            &options(0, 3, 1000),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.sent, 1);
    assert_eq!(transport.quit_count().await, 1);
}

#[tokio::test]
async fn test_corrupt_artifacts_are_rejected() {
    let dir = TempDir::new().unwrap();

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    let err = load_artifact(&garbage, "turn").await.unwrap_err();
    assert!(matches!(err, Error::CorruptArtifact { .. }));
    assert!(err.is_fatal());

    let no_turns = dir.path().join("no-turns.json");
    std::fs::write(&no_turns, r#"{"botId":"bot","replayId":"A"}"#).unwrap();
    assert!(matches!(
        load_artifact(&no_turns, "turn").await,
        Err(Error::CorruptArtifact { .. })
    ));

    let missing = dir.path().join("missing.json");
    assert!(load_artifact(&missing, "turn").await.is_err());
}

#[tokio::test]
async fn test_saved_session_replays_in_recorded_order() {
    let dir = TempDir::new().unwrap();
    let settings = RecorderSettings {
        grace_period: Duration::from_millis(10),
        ..RecorderSettings::default()
    };

    let inbound = Arc::new(MockTransport::new());
    inbound.push_inbound("bot-state", r#"{"game_start":{"replay_id":"A"}}"#);
    for i in 0..4 {
        inbound.push_inbound("bot-turn", &format!("turn-{i}"));
        inbound.push_inbound("bot-gameUpdate", &format!("update-{i}"));
    }
    inbound.push_inbound("bot-state", r#"{"game_won":{}}"#);
    inbound.close_inbound();

    let layout = ChannelLayout::new("bot", &settings);
    let summary = SessionListener::new(
        inbound,
        Arc::new(MockKeyStore::new()),
        Recorder::new(layout, RecorderPolicy::from(&settings)),
        ArtifactWriter::new(dir.path()),
    )
    .run(std::future::pending())
    .await
    .unwrap();

    let record = load_artifact(&summary.saved[0], "turn").await.unwrap();
    let outbound = Arc::new(MockTransport::new());
    engine(&outbound, &Arc::new(MockKeyStore::new()))
        .run(&record, &options(0, 0, 5))
        .await
        .unwrap();

    assert_eq!(
        outbound.published_on("bot-turn").await,
        ["turn-0", "turn-1", "turn-2", "turn-3"]
    );
    assert_eq!(
        outbound.published_on("bot-gameUpdate").await,
        ["update-0", "update-1", "update-2", "update-3"]
    );
}
