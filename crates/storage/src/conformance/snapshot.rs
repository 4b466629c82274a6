//! Snapshot cases: readers only ever see committed state, and an aborted
//! save leaves no trace in headers, logs or visits.

use std::future::Future;

use super::{make_log_entry, make_stage_visit, make_submission, seed_submission, TestResult};
use crate::{StorageError, SubmissionStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_submission_invisible",
            uncommitted_submission_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "abort_discards_insert",
            abort_discards_insert(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "abort_discards_log_and_visits",
            abort_discards_log_and_visits(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_its_own_writes",
            snapshot_reads_its_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "commit_is_all_or_nothing",
            commit_is_all_or_nothing(factory).await,
        ),
    ]
}

async fn uncommitted_submission_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_submission(&mut snap, make_submission("sub-1", "exercise-1"))
        .await
        .map_err(|e| e.to_string())?;

    let visible = s.get_submission("sub-1").await;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    match visible {
        Err(StorageError::SubmissionNotFound { .. }) => {}
        other => return Err(format!("uncommitted insert was visible: {:?}", other)),
    }
    s.get_submission("sub-1")
        .await
        .map(|_| ())
        .map_err(|e| format!("committed insert not visible: {}", e))
}

async fn abort_discards_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_submission(&mut snap, make_submission("sub-1", "exercise-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match s.get_submission("sub-1").await {
        Err(StorageError::SubmissionNotFound { .. }) => Ok(()),
        other => Err(format!("aborted insert was visible: {:?}", other)),
    }
}

async fn abort_discards_log_and_visits<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.upsert_stage_visit(&mut snap, make_stage_visit("sub-1", 1, 10))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    let visits = s.get_stage_visits("sub-1").await.map_err(|e| e.to_string())?;
    if !log.is_empty() || !visits.is_empty() {
        return Err("aborted log entries or visits were persisted".to_string());
    }
    Ok(())
}

async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut record = s
        .get_submission_for_update(&mut snap, "sub-1")
        .await
        .map_err(|e| e.to_string())?;
    record.result_points = 75;
    s.update_submission(&mut snap, 0, record)
        .await
        .map_err(|e| e.to_string())?;
    let reread = s
        .get_submission_for_update(&mut snap, "sub-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if reread.result_points != 75 || reread.version != 1 {
        return Err(format!(
            "snapshot did not see its own update: points {} version {}",
            reread.result_points, reread.version
        ));
    }
    Ok(())
}

async fn commit_is_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut record = s
        .get_submission_for_update(&mut snap, "sub-1")
        .await
        .map_err(|e| e.to_string())?;
    record.is_completed = true;
    s.update_submission(&mut snap, 0, record)
        .await
        .map_err(|e| e.to_string())?;
    s.append_log_entries(
        &mut snap,
        "sub-1",
        vec![
            make_log_entry("sub-1", 0, "ENTER"),
            make_log_entry("sub-1", 1, "END"),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;
    s.upsert_stage_visit(&mut snap, make_stage_visit("sub-1", 1, 10))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let record = s.get_submission("sub-1").await.map_err(|e| e.to_string())?;
    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    let visits = s.get_stage_visits("sub-1").await.map_err(|e| e.to_string())?;
    if !record.is_completed || log.len() != 2 || visits.len() != 1 {
        return Err(format!(
            "partial commit: completed={} log={} visits={}",
            record.is_completed,
            log.len(),
            visits.len()
        ));
    }
    Ok(())
}
