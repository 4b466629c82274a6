//! Stage-type dispatch.
//!
//! Every stage type (multiple choice, fill-in, code execution, ...) plugs
//! into the player through a [`StageHandler`]. Handlers are looked up by the
//! stage's `kind` tag in a [`StageHandlerRegistry`] built once by the host
//! and passed to the player by reference.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::evaluator::{EvaluationContext, Evaluator, EvaluatorError};
use crate::types::{CheckResult, Stage, StageVisit, Submission, Transition, VariableStore};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors raised by a stage handler. The player records them as internal
/// errors of the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The stage's type-specific configuration is unusable.
    InvalidConfig(String),
    /// Grading could not be performed.
    Grading(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::InvalidConfig(msg) => write!(f, "invalid stage configuration: {}", msg),
            HandlerError::Grading(msg) => write!(f, "grading failed: {}", msg),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Outcome of starting to grade a submitted visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grading {
    /// The result is available immediately.
    Completed(CheckResult),
    /// Grading runs elsewhere; the result arrives later through
    /// `ExercisePlayer::add_result`.
    Deferred,
}

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// Capabilities every stage type provides to the player.
pub trait StageHandler: Send + Sync {
    /// The stage `kind` tag this handler serves.
    fn kind(&self) -> &str;

    /// Stage-specific preparation of a freshly created visit, before it is
    /// entered. An error aborts the expansion.
    fn prepare_visit(
        &self,
        _stage: &Stage,
        _visit: &mut StageVisit,
        _submission: &Submission,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Begin grading the submitted input of `visit`.
    fn start_grading(
        &self,
        stage: &Stage,
        visit: &mut StageVisit,
        context: &EvaluationContext,
        evaluator: &dyn Evaluator,
    ) -> Result<Grading, HandlerError>;

    /// Stage-type specific eligibility of a conditional transition. The
    /// guard expression is checked separately by the player.
    fn evaluate_custom_transition(
        &self,
        _stage: &Stage,
        _visit: &StageVisit,
        transition: &Transition,
        context: &EvaluationContext,
        evaluator: &dyn Evaluator,
    ) -> Result<bool, EvaluatorError> {
        evaluator.evaluate_condition(transition.stage_expression.as_deref(), context)
    }

    /// Refresh pending, error, and point state of a visit from its results.
    fn update_status(&self, _stage: &Stage, visit: &mut StageVisit) {
        update_status_from_latest_result(visit);
    }

    /// Copy stage-specific state into a repeated or restarted visit.
    fn carry_over(&self, from: &StageVisit, to: &mut StageVisit) {
        to.input = from.input.clone();
    }

    /// Learner input exposed to expressions as `[input=...]`.
    fn input_variables(&self, _visit: &StageVisit) -> VariableStore {
        VariableStore::new()
    }

    /// Extra stage-specific `[meta=...]` variables.
    fn meta_variables(&self, _visit: &StageVisit) -> VariableStore {
        VariableStore::new()
    }
}

/// Default status rule: a visit without results is pending; otherwise the
/// latest result decides the points, and an error result marks the visit.
pub fn update_status_from_latest_result(visit: &mut StageVisit) {
    match visit.results.last() {
        None => {
            visit.has_pending_checks = true;
            visit.points = 0;
        }
        Some(result) => {
            visit.has_pending_checks = false;
            if result.is_error {
                visit.has_internal_errors = true;
                visit.points = 0;
            } else {
                visit.points = result.points.min(100);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Maps stage `kind` tags to their handlers.
#[derive(Clone, Default)]
pub struct StageHandlerRegistry {
    handlers: HashMap<String, Arc<dyn StageHandler>>,
}

impl StageHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own `kind`, returning the handler it
    /// replaced.
    pub fn register<H: StageHandler + 'static>(&mut self, handler: H) -> Option<Arc<dyn StageHandler>> {
        let kind = handler.kind().to_string();
        self.handlers.insert(kind, Arc::new(handler))
    }

    pub fn with_handler<H: StageHandler + 'static>(mut self, handler: H) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&dyn StageHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for StageHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
