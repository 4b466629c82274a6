//! Version validation (OCC) conformance tests.

use std::future::Future;

use super::{make_log_entry, seed_submission, TestResult};
use crate::{StorageError, SubmissionStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "version_increments_sequentially",
            version_increments_sequentially(factory).await,
        ),
        TestResult::from_result(
            "version",
            "update_with_wrong_version_returns_conflict",
            update_with_wrong_version_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "version",
            "interleaved_snapshots_second_commit_conflicts",
            interleaved_snapshots_second_commit_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "interleaved_log_appends_second_commit_conflicts",
            interleaved_log_appends_second_commit_conflicts(factory).await,
        ),
    ]
}

async fn bump<S: SubmissionStorage>(s: &S, expected: i64) -> Result<i64, StorageError> {
    let mut snap = s.begin_snapshot().await?;
    let record = s.get_submission_for_update(&mut snap, "sub-1").await?;
    let version = s.update_submission(&mut snap, expected, record).await?;
    s.commit_snapshot(snap).await?;
    Ok(version)
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    for expected in 0..3 {
        let new_version = bump(&s, expected).await.map_err(|e| e.to_string())?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected version {}, got {}",
                expected + 1,
                new_version
            ));
        }
    }
    let stored = s.get_submission("sub-1").await.map_err(|e| e.to_string())?;
    if stored.version != 3 {
        return Err(format!("expected stored version 3, got {}", stored.version));
    }
    Ok(())
}

async fn update_with_wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    match bump(&s, 5).await {
        Err(StorageError::ConcurrentConflict {
            expected_version: 5,
            ..
        }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

async fn interleaved_snapshots_second_commit_conflicts<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;

    let record = s
        .get_submission_for_update(&mut first, "sub-1")
        .await
        .map_err(|e| e.to_string())?;
    s.update_submission(&mut first, 0, record)
        .await
        .map_err(|e| e.to_string())?;

    let record = s
        .get_submission_for_update(&mut second, "sub-1")
        .await
        .map_err(|e| e.to_string())?;
    s.update_submission(&mut second, 0, record)
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    let result = s.commit_snapshot(second).await;
    if result.is_ok() {
        return Err("second interleaved commit succeeded".to_string());
    }

    let stored = s.get_submission("sub-1").await.map_err(|e| e.to_string())?;
    if stored.version != 1 {
        return Err(format!("expected version 1, got {}", stored.version));
    }
    Ok(())
}

async fn interleaved_log_appends_second_commit_conflicts<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_log_entries(&mut first, "sub-1", vec![make_log_entry("sub-1", 0, "ENTER")])
        .await
        .map_err(|e| e.to_string())?;
    s.append_log_entries(&mut second, "sub-1", vec![make_log_entry("sub-1", 0, "EXIT")])
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    if s.commit_snapshot(second).await.is_ok() {
        return Err("second interleaved append committed".to_string());
    }

    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    if log.len() != 1 || log[0].kind != "ENTER" {
        return Err(format!("unexpected log after conflict: {:?}", log));
    }
    Ok(())
}
