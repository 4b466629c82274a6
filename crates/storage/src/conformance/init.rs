//! Submission initialization conformance tests.

use std::future::Future;

use super::{make_submission, seed_submission, TestResult};
use crate::{StorageError, SubmissionStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "insert_creates_submission_at_version_0",
            insert_creates_submission_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "insert_ignores_supplied_version",
            insert_ignores_supplied_version(factory).await,
        ),
        TestResult::from_result(
            "init",
            "duplicate_insert_returns_already_exists",
            duplicate_insert_returns_already_exists(factory).await,
        ),
        TestResult::from_result(
            "init",
            "missing_submission_returns_not_found",
            missing_submission_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "init",
            "new_submission_has_empty_log",
            new_submission_has_empty_log(factory).await,
        ),
        TestResult::from_result(
            "init",
            "list_filters_by_exercise",
            list_filters_by_exercise(factory).await,
        ),
    ]
}

async fn insert_creates_submission_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;
    let record = s.get_submission("sub-1").await.map_err(|e| e.to_string())?;
    if record.version != 0 {
        return Err(format!("expected version 0, got {}", record.version));
    }
    if record.exercise_id != "exercise-1" {
        return Err(format!("unexpected exercise id '{}'", record.exercise_id));
    }
    Ok(())
}

async fn insert_ignores_supplied_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut record = make_submission("sub-1", "exercise-1");
    record.version = 42;
    s.insert_submission(&mut snap, record)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let stored = s.get_submission("sub-1").await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    Ok(())
}

async fn duplicate_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_submission(&mut snap, make_submission("sub-1", "exercise-1"))
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::AlreadyExists { submission_id }) if submission_id == "sub-1" => Ok(()),
        other => Err(format!("expected AlreadyExists, got {:?}", other)),
    }
}

async fn missing_submission_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_submission("nope").await {
        Err(StorageError::SubmissionNotFound { .. }) => {}
        other => return Err(format!("get_submission: expected NotFound, got {:?}", other)),
    }
    match s.get_log("nope").await {
        Err(StorageError::SubmissionNotFound { .. }) => {}
        other => return Err(format!("get_log: expected NotFound, got {:?}", other)),
    }

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_submission_for_update(&mut snap, "nope").await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::SubmissionNotFound { .. }) => Ok(()),
        other => Err(format!(
            "get_submission_for_update: expected NotFound, got {:?}",
            other
        )),
    }
}

async fn new_submission_has_empty_log<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_submission(&s, "sub-1").await?;
    let log = s.get_log("sub-1").await.map_err(|e| e.to_string())?;
    let visits = s.get_stage_visits("sub-1").await.map_err(|e| e.to_string())?;
    if !log.is_empty() || !visits.is_empty() {
        return Err(format!(
            "expected empty log and visits, got {} entries and {} visits",
            log.len(),
            visits.len()
        ));
    }
    Ok(())
}

async fn list_filters_by_exercise<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (id, exercise) in [("a", "ex-1"), ("b", "ex-2"), ("c", "ex-1")] {
        s.insert_submission(&mut snap, make_submission(id, exercise))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let all = s.list_submissions(None).await.map_err(|e| e.to_string())?;
    if all.len() != 3 {
        return Err(format!("expected 3 submissions, got {}", all.len()));
    }
    let filtered = s
        .list_submissions(Some("ex-1"))
        .await
        .map_err(|e| e.to_string())?;
    if filtered.len() != 2 || filtered.iter().any(|r| r.exercise_id != "ex-1") {
        return Err(format!("filter returned {:?}", filtered));
    }
    Ok(())
}
