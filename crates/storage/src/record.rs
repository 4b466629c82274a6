use serde::{Deserialize, Serialize};

/// The persisted header of a submission aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: String,
    pub exercise_id: String,
    /// OCC counter, 0 on insert and incremented by every update.
    pub version: i64,
    pub is_completed: bool,
    pub has_internal_errors: bool,
    pub has_pending_stage_checks: bool,
    pub result_points: u32,
    /// Current variable store, serialized by the player.
    pub variables: serde_json::Value,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// One append-only log entry.
///
/// Entries are immutable once stored; `sequence` is the ordering key and
/// starts at 0 for every submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntryRecord {
    pub submission_id: String,
    pub sequence: u64,
    /// Entry type tag (e.g. `"ENTER"`, `"CHECK"`).
    pub kind: String,
    pub visit_id: Option<u64>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
    /// Full entry as serialized by the player.
    pub payload: serde_json::Value,
}

/// A stage visit belonging to a submission. Visits are upserted, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVisitRecord {
    pub submission_id: String,
    pub visit_id: u64,
    pub stage_id: u64,
    pub payload: serde_json::Value,
}
