//! Saving and loading submissions through a [`SubmissionStorage`] backend.
//!
//! A save writes the submission header, only the log entries appended since
//! the last save, and every stage visit, all inside one storage snapshot.
//! The header update is version checked, so two players saving the same
//! submission concurrently cannot both succeed.

use std::collections::BTreeMap;

use assess_storage::{LogEntryRecord, StageVisitRecord, StorageError, SubmissionRecord, SubmissionStorage};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::log::{LogEntry, SubmissionLog};
use crate::types::{StageVisit, Submission, VariableStore};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("could not encode or decode submission data: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("could not format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("stored submission is corrupt: {0}")]
    Corrupt(String),
}

impl PersistError {
    /// True if the save lost a race against another writer; reload and
    /// retry the operation.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PersistError::Storage(
                StorageError::ConcurrentConflict { .. } | StorageError::LogConflict { .. }
            )
        )
    }
}

/// Persist `submission`, then record the new storage version on it.
///
/// On any error the snapshot is aborted and the submission is left as it
/// was.
pub async fn save_submission<S: SubmissionStorage>(
    storage: &S,
    submission: &mut Submission,
) -> Result<(), PersistError> {
    let mut snapshot = storage.begin_snapshot().await?;

    let version = match write_submission(storage, &mut snapshot, submission).await {
        Ok(version) => version,
        Err(e) => {
            if let Err(abort) = storage.abort_snapshot(snapshot).await {
                warn!(submission = %submission.id, error = %abort, "abort after failed save failed");
            }
            return Err(e);
        }
    };
    storage.commit_snapshot(snapshot).await?;

    debug!(
        submission = %submission.id,
        version,
        log_entries = submission.log.len() - submission.stored_log_len,
        "submission saved"
    );
    submission.version = Some(version);
    submission.stored_log_len = submission.log.len();
    Ok(())
}

async fn write_submission<S: SubmissionStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    submission: &Submission,
) -> Result<i64, PersistError> {
    let record = SubmissionRecord {
        submission_id: submission.id.clone(),
        exercise_id: submission.exercise_id.clone(),
        version: submission.version.unwrap_or(0),
        is_completed: submission.is_completed,
        has_internal_errors: submission.has_internal_errors,
        has_pending_stage_checks: submission.has_pending_stage_checks,
        result_points: submission.result_points,
        variables: serde_json::to_value(&submission.variables)?,
        updated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
    };

    let version = match submission.version {
        None => {
            storage.insert_submission(snapshot, record).await?;
            0
        }
        Some(expected) => {
            storage
                .get_submission_for_update(snapshot, &submission.id)
                .await?;
            storage.update_submission(snapshot, expected, record).await?
        }
    };

    let new_entries = submission
        .log
        .entries()
        .get(submission.stored_log_len..)
        .ok_or_else(|| {
            PersistError::Corrupt(format!(
                "{} entries marked as stored but the log has {}",
                submission.stored_log_len,
                submission.log.len()
            ))
        })?
        .iter()
        .map(|entry| log_entry_record(&submission.id, entry))
        .collect::<Result<Vec<_>, _>>()?;
    if !new_entries.is_empty() {
        storage
            .append_log_entries(snapshot, &submission.id, new_entries)
            .await?;
    }

    for visit in submission.visits.values() {
        storage
            .upsert_stage_visit(
                snapshot,
                StageVisitRecord {
                    submission_id: submission.id.clone(),
                    visit_id: visit.id.0,
                    stage_id: visit.stage_id.0,
                    payload: serde_json::to_value(visit)?,
                },
            )
            .await?;
    }

    Ok(version)
}

fn log_entry_record(submission_id: &str, entry: &LogEntry) -> Result<LogEntryRecord, PersistError> {
    Ok(LogEntryRecord {
        submission_id: submission_id.to_string(),
        sequence: entry.sequence,
        kind: entry.kind().as_str().to_string(),
        visit_id: entry.event.visit().map(|v| v.0),
        recorded_at: entry.timestamp.format(&Rfc3339)?,
        payload: serde_json::to_value(entry)?,
    })
}

/// Rebuild a submission from committed storage state.
pub async fn load_submission<S: SubmissionStorage>(
    storage: &S,
    submission_id: &str,
) -> Result<Submission, PersistError> {
    let record = storage.get_submission(submission_id).await?;
    let log_records = storage.get_log(submission_id).await?;
    let visit_records = storage.get_stage_visits(submission_id).await?;

    let entries = log_records
        .into_iter()
        .map(|r| serde_json::from_value::<LogEntry>(r.payload))
        .collect::<Result<Vec<_>, _>>()?;
    let log = SubmissionLog::from_entries(entries).map_err(PersistError::Corrupt)?;

    let mut visits = BTreeMap::new();
    for r in visit_records {
        let visit: StageVisit = serde_json::from_value(r.payload)?;
        if visit.id.0 != r.visit_id || visit.stage_id.0 != r.stage_id {
            return Err(PersistError::Corrupt(format!(
                "stage visit record {} does not match its payload",
                r.visit_id
            )));
        }
        visits.insert(visit.id, visit);
    }

    let variables: VariableStore = serde_json::from_value(record.variables)?;
    let stored_log_len = log.len();

    Ok(Submission {
        id: record.submission_id,
        exercise_id: record.exercise_id,
        log,
        visits,
        variables,
        is_completed: record.is_completed,
        has_internal_errors: record.has_internal_errors,
        has_pending_stage_checks: record.has_pending_stage_checks,
        result_points: record.result_points,
        version: Some(record.version),
        stored_log_len,
    })
}
