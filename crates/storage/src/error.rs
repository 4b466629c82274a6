/// All errors that can be returned by a SubmissionStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction modified
    /// the submission concurrently. The expected version was not found.
    #[error("concurrent conflict on submission {submission_id}: expected version {expected_version}")]
    ConcurrentConflict {
        submission_id: String,
        expected_version: i64,
    },

    /// No submission record with the given id.
    #[error("submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: String },

    /// A submission record with this id already exists.
    #[error("submission already exists: {submission_id}")]
    AlreadyExists { submission_id: String },

    /// Log entries must be appended contiguously at the end of the stored log.
    #[error(
        "log append conflict on submission {submission_id}: expected sequence {expected_sequence}, got {got_sequence}"
    )]
    LogConflict {
        submission_id: String,
        expected_sequence: u64,
        got_sequence: u64,
    },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
