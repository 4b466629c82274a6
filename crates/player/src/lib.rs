//! assess-player -- progression and scoring engine for exercise submissions.
//!
//! An exercise is a directed graph of stages. A learner's submission walks
//! that graph: each stage visit is entered, answered (submitted or
//! skipped), graded, and left through a transition chosen by guard
//! expressions over exercise variables. Every step is appended to the
//! submission's log, and the graded path and total score are re-derived
//! from that log after each operation.
//!
//! Expression evaluation and stage-type specific grading are external
//! seams ([`Evaluator`], [`StageHandler`]); persistence goes through the
//! `assess-storage` crate ([`persist`]).

pub mod config;
pub mod evaluator;
pub mod handler;
pub mod log;
pub mod path;
pub mod persist;
pub mod progression;
pub mod scoring;
pub mod suffix;
pub mod types;
pub mod variables;

pub use config::{read_player_settings, PlayerSettings, SettingsError};
pub use evaluator::{EvaluationContext, Evaluator, EvaluatorError, StaticEvaluator};
pub use handler::{Grading, HandlerError, StageHandler, StageHandlerRegistry};
pub use log::{LogEntry, LogEntryKind, LogEvent, SubmissionLog};
pub use path::generate_submission_path;
pub use persist::{load_submission, save_submission, PersistError};
pub use progression::{ExercisePlayer, PathScore};
pub use scoring::{EffectivePoints, HintMalusType};
pub use suffix::SuffixWeights;
pub use types::{
    CheckResult, Exercise, ManualResult, PlayerError, Stage, StageId, StageVisit, Submission,
    SubmissionState, Transition, TransitionTarget, Value, VariableStore, VisitId,
};
