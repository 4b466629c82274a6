//! Append-only log conformance tests.
//!
//! Verifies that log entries are appended contiguously, read back in
//! sequence order, and that gaps or rewrites are rejected.

use std::future::Future;

use super::{make_log_entry, make_stage_visit, seed_submission, TestResult};
use crate::{StorageError, SubmissionStorage};

pub(super) async fn run_log_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "log",
            "append_then_read_in_order",
            append_then_read_in_order(factory).await,
        ),
        TestResult::from_result(
            "log",
            "append_across_snapshots_continues_sequence",
            append_across_snapshots_continues_sequence(factory).await,
        ),
        TestResult::from_result(
            "log",
            "append_with_gap_returns_log_conflict",
            append_with_gap_returns_log_conflict(factory).await,
        ),
        TestResult::from_result(
            "log",
            "rewrite_of_existing_sequence_rejected",
            rewrite_of_existing_sequence_rejected(factory).await,
        ),
        TestResult::from_result(
            "log",
            "append_to_missing_submission_fails",
            append_to_missing_submission_fails(factory).await,
        ),
        TestResult::from_result(
            "log",
            "stage_visit_upsert_replaces",
            stage_visit_upsert_replaces(factory).await,
        ),
    ]
}

async fn append_then_read_in_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let entries = vec![
        make_log_entry("sub-1", 0, "ENTER"),
        make_log_entry("sub-1", 1, "SUBMIT"),
        make_log_entry("sub-1", 2, "CHECK"),
    ];
    s.append_log_entries(&mut snap, "sub-1", entries)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    let kinds: Vec<&str> = log.iter().map(|e| e.kind.as_str()).collect();
    if kinds != ["ENTER", "SUBMIT", "CHECK"] {
        return Err(format!("unexpected log order {:?}", kinds));
    }
    if log.iter().enumerate().any(|(i, e)| e.sequence != i as u64) {
        return Err("sequence numbers are not contiguous".to_string());
    }
    Ok(())
}

async fn append_across_snapshots_continues_sequence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    for (seq, kind) in [(0, "ENTER"), (1, "HINT")] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.append_log_entries(&mut snap, "sub-1", vec![make_log_entry("sub-1", seq, kind)])
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    if log.len() != 2 || log[1].kind != "HINT" {
        return Err(format!("expected [ENTER, HINT], got {:?}", log));
    }
    Ok(())
}

async fn append_with_gap_returns_log_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .append_log_entries(&mut snap, "sub-1", vec![make_log_entry("sub-1", 3, "ENTER")])
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::LogConflict {
            expected_sequence: 0,
            got_sequence: 3,
            ..
        }) => Ok(()),
        other => Err(format!("expected LogConflict(0, 3), got {:?}", other)),
    }
}

async fn rewrite_of_existing_sequence_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_log_entries(&mut snap, "sub-1", vec![make_log_entry("sub-1", 0, "ENTER")])
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .append_log_entries(&mut snap, "sub-1", vec![make_log_entry("sub-1", 0, "SKIP")])
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if !matches!(result, Err(StorageError::LogConflict { .. })) {
        return Err(format!("expected LogConflict, got {:?}", result));
    }

    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    if log.len() != 1 || log[0].kind != "ENTER" {
        return Err(format!("stored log was modified: {:?}", log));
    }
    Ok(())
}

async fn append_to_missing_submission_fails<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .append_log_entries(&mut snap, "ghost", vec![make_log_entry("ghost", 0, "ENTER")])
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::SubmissionNotFound { .. }) => Ok(()),
        other => Err(format!("expected SubmissionNotFound, got {:?}", other)),
    }
}

async fn stage_visit_upsert_replaces<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.upsert_stage_visit(&mut snap, make_stage_visit("sub-1", 2, 10))
        .await
        .map_err(|e| e.to_string())?;
    s.upsert_stage_visit(&mut snap, make_stage_visit("sub-1", 1, 10))
        .await
        .map_err(|e| e.to_string())?;
    let mut replaced = make_stage_visit("sub-1", 2, 10);
    replaced.payload = serde_json::json!({ "attempt_count": 2 });
    s.upsert_stage_visit(&mut snap, replaced)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let visits = s.get_stage_visits("sub-1").await.map_err(|e| e.to_string())?;
    let ids: Vec<u64> = visits.iter().map(|v| v.visit_id).collect();
    if ids != [1, 2] {
        return Err(format!("expected visits [1, 2], got {:?}", ids));
    }
    if visits[1].payload["attempt_count"] != 2 {
        return Err(format!("upsert did not replace payload: {}", visits[1].payload));
    }
    Ok(())
}
