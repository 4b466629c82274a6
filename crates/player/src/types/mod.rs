//! Exercise graph, submission aggregate, and runtime value types.
//!
//! Exercise types are built from the interchange bundle (or
//! programmatically) and validated once. Submission types are mutated only
//! by the progression engine in [`crate::progression`].

pub mod exercise;
pub mod submission;
pub mod values;

use std::fmt;

pub use exercise::{
    Exercise, Stage, StageHint, StageId, StageUpdates, Transition, TransitionTarget, UpdateHook,
    VariableDeclaration, VariableUpdate,
};
pub use submission::{
    CheckResult, GivenHint, ManualResult, StageVisit, Submission, SubmissionState, VisitId,
};
pub use values::{Value, VariableStore};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors returned to the caller of the player.
///
/// Evaluation and grading failures are never reported here; they become
/// submission state (`has_internal_errors` plus a FAIL log entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// The exercise definition is inconsistent (authoring defect).
    InvalidExercise { message: String },
    /// A stage id referenced at runtime is not part of the exercise.
    UnknownStage { stage_id: StageId },
    /// The visit does not belong to the submission.
    UnknownVisit { visit: VisitId },
    /// The visit is not the open visit of the submission, or was already
    /// submitted or skipped.
    VisitClosed { visit: VisitId },
    /// The visit is not part of the current submission path.
    VisitNotInPath { visit: VisitId },
    /// The stage does not allow skipping.
    SkipNotAllowed { stage_id: StageId },
    /// Restarting stages is disabled and the submission is not errored.
    EraseNotAllowed { visit: VisitId },
    /// The submission has internal errors and only accepts erase.
    SubmissionErrored { submission_id: String },
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::InvalidExercise { message } => {
                write!(f, "invalid exercise: {}", message)
            }
            PlayerError::UnknownStage { stage_id } => {
                write!(f, "unknown stage: {}", stage_id)
            }
            PlayerError::UnknownVisit { visit } => {
                write!(f, "unknown stage visit: {}", visit)
            }
            PlayerError::VisitClosed { visit } => {
                write!(f, "stage visit {} is not open for input", visit)
            }
            PlayerError::VisitNotInPath { visit } => {
                write!(f, "stage visit {} is not on the submission path", visit)
            }
            PlayerError::SkipNotAllowed { stage_id } => {
                write!(f, "stage {} does not allow to skip", stage_id)
            }
            PlayerError::EraseNotAllowed { visit } => {
                write!(f, "restarting stage visit {} is not allowed", visit)
            }
            PlayerError::SubmissionErrored { submission_id } => {
                write!(
                    f,
                    "submission {} has internal errors and must be erased first",
                    submission_id
                )
            }
        }
    }
}

impl std::error::Error for PlayerError {}
