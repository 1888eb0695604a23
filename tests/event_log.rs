//! Integration tests for the append-only event log.

use mini_cbt::events::EventLog;
use tempfile::TempDir;

fn tmp() -> TempDir {
    TempDir::new().unwrap()
}

#[tokio::test]
async fn one_file_per_user_case_pair() {
    let dir = tmp();
    let log = EventLog::new(dir.path());

    log.log_event(1, "case-a", 1, "x", "A", true).await.unwrap();
    log.log_event(1, "case-b", 1, "x", "A", true).await.unwrap();
    log.log_event(2, "case-a", 1, "x", "A", true).await.unwrap();

    assert!(dir.path().join("session_1_case-a.jsonl").exists());
    assert!(dir.path().join("session_1_case-b.jsonl").exists());
    assert!(dir.path().join("session_2_case-a.jsonl").exists());
}

#[tokio::test]
async fn appends_never_rewrite_prior_lines() {
    let dir = tmp();
    let log = EventLog::new(dir.path());

    log.log_event(5, "c", 1, "first line", "A", true).await.unwrap();
    let after_one = tokio::fs::read_to_string(log.file_path(5, "c")).await.unwrap();

    log.log_event(5, "c", 2, "second line", "B", false).await.unwrap();
    let after_two = tokio::fs::read_to_string(log.file_path(5, "c")).await.unwrap();

    assert!(after_two.starts_with(&after_one));
    assert_eq!(after_two.lines().count(), 2);
}

#[tokio::test]
async fn each_line_is_independent_json() {
    let dir = tmp();
    let log = EventLog::new(dir.path());
    for step in 1..=3 {
        log.log_event(9, "ind", step, "line", "C", false).await.unwrap();
    }

    let raw = tokio::fs::read_to_string(log.file_path(9, "ind")).await.unwrap();
    for line in raw.lines() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["user_id"], 9);
        assert_eq!(v["case_id"], "ind");
    }
}

#[tokio::test]
async fn timestamp_has_expected_shape() {
    let dir = tmp();
    let log = EventLog::new(dir.path());
    log.log_event(3, "ts", 1, "c", "A", true).await.unwrap();

    let records = log.load(3, "ts").await.unwrap();
    let ts = &records[0].ts;
    // "YYYY-MM-DD HH:MM:SS"
    assert_eq!(ts.len(), 19);
    assert_eq!(&ts[4..5], "-");
    assert_eq!(&ts[10..11], " ");
    assert_eq!(&ts[13..14], ":");
}

#[tokio::test]
async fn write_failure_propagates() {
    let dir = tmp();
    // Root path is an existing *file*, so the directory cannot be created.
    let blocker = dir.path().join("not-a-dir");
    tokio::fs::write(&blocker, b"x").await.unwrap();

    let log = EventLog::new(&blocker);
    let err = log.log_event(1, "c", 1, "x", "A", true).await.unwrap_err();
    assert!(err.to_string().contains("event log"));
}
