use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{LogEntryRecord, StageVisitRecord, SubmissionRecord};

/// The storage trait for submission persistence backends.
///
/// A `SubmissionStorage` implementation provides durable, transactional
/// storage for submission headers, their append-only event logs, and their
/// stage visits.
///
/// ## Snapshots
///
/// Writes go through a `Snapshot`, the backend's unit of atomicity. A
/// save opens one with `begin_snapshot`, stages its writes through
/// `&mut snapshot`, and hands it back to either `commit_snapshot` or
/// `abort_snapshot`; both consume it. Writes of a snapshot that is dropped
/// without a commit never become visible.
///
/// ## Append-only log
///
/// `append_log_entries` only ever extends a submission's log. The first
/// appended entry must carry the sequence number equal to the current log
/// length, otherwise the call fails with `StorageError::LogConflict`.
/// There is no operation that rewrites or removes log entries.
///
/// ## Versions
///
/// Every header update names the version it was read at. If another
/// writer got there first, `update_submission` (or the commit) fails with
/// `StorageError::ConcurrentConflict` and the caller reloads.
#[async_trait]
pub trait SubmissionStorage: Send + Sync + 'static {
    /// Backend-specific transaction handle.
    type Snapshot: Send;

    // ── Snapshots ───────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Make the staged writes durable, or fail with a conflict.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Drop the staged writes.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Writes ──────────────────────────────────────────────

    /// Insert a new submission header. The stored version is always 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_submission(
        &self,
        snapshot: &mut Self::Snapshot,
        record: SubmissionRecord,
    ) -> Result<(), StorageError>;

    /// Read a submission header for update.
    ///
    /// Returns `Err(StorageError::SubmissionNotFound)` if it does not exist.
    async fn get_submission_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        submission_id: &str,
    ) -> Result<SubmissionRecord, StorageError>;

    /// Replace a submission header read at `expected_version` and return
    /// the version it is stored at now.
    async fn update_submission(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        record: SubmissionRecord,
    ) -> Result<i64, StorageError>;

    /// Append entries to the end of a submission's log.
    async fn append_log_entries(
        &self,
        snapshot: &mut Self::Snapshot,
        submission_id: &str,
        entries: Vec<LogEntryRecord>,
    ) -> Result<(), StorageError>;

    /// Insert or replace a stage visit.
    async fn upsert_stage_visit(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StageVisitRecord,
    ) -> Result<(), StorageError>;

    // ── Reads (committed state) ─────────────────────────────

    /// Read a submission header.
    async fn get_submission(&self, submission_id: &str) -> Result<SubmissionRecord, StorageError>;

    /// Read the full log of a submission in sequence order.
    ///
    /// A submission without entries yields an empty list.
    async fn get_log(&self, submission_id: &str) -> Result<Vec<LogEntryRecord>, StorageError>;

    /// Read all stage visits of a submission ordered by visit id.
    async fn get_stage_visits(
        &self,
        submission_id: &str,
    ) -> Result<Vec<StageVisitRecord>, StorageError>;

    /// List submission headers, optionally filtered by exercise.
    async fn list_submissions(
        &self,
        exercise_id: Option<&str>,
    ) -> Result<Vec<SubmissionRecord>, StorageError>;
}
