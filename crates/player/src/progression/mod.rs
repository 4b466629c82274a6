//! Submission progression engine.
//!
//! [`ExercisePlayer`] drives one submission through the exercise graph:
//! initialization, submit, skip, hints, repeat, erase and grading results.
//! Every operation mutates the submission in place and appends to its log.
//!
//! Failures of evaluation and of stage handlers never escape as `Err`; they
//! become submission state (`has_internal_errors` plus a FAIL log entry)
//! and halt progression until the learner erases back. `Err` is reserved
//! for caller misuse, authorization and configuration errors, and is always
//! returned before the submission is touched.

use tracing::{debug, error, info, warn};

use crate::config::PlayerSettings;
use crate::evaluator::{EvaluationContext, Evaluator, EvaluatorError};
use crate::handler::{Grading, StageHandler, StageHandlerRegistry};
use crate::log::{LogEntryKind, LogEvent};
use crate::path::{generate_submission_path, is_stage_already_expanded};
use crate::scoring::{compute_total, ScoredVisit};
use crate::types::{
    CheckResult, Exercise, GivenHint, ManualResult, PlayerError, Stage, StageId, StageVisit,
    Submission, Transition, TransitionTarget, UpdateHook, VisitId,
};
use crate::variables::{apply_updates, initialize_variables, prepare_context};

// ──────────────────────────────────────────────
// Path scoring
// ──────────────────────────────────────────────

/// Outcome of one scoring pass over the submission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathScore {
    /// Some visit on the path has internal errors.
    pub has_internal_errors: bool,
    /// Some visit on the path awaits grading and its stage must wait.
    pub has_pending_checks: bool,
    pub points: u32,
}

// ──────────────────────────────────────────────
// Player
// ──────────────────────────────────────────────

/// Progression engine for submissions of one exercise.
///
/// Cheap to construct; holds only borrowed collaborators.
pub struct ExercisePlayer<'a> {
    exercise: &'a Exercise,
    handlers: &'a StageHandlerRegistry,
    evaluator: &'a dyn Evaluator,
    settings: &'a PlayerSettings,
}

impl<'a> ExercisePlayer<'a> {
    pub fn new(
        exercise: &'a Exercise,
        handlers: &'a StageHandlerRegistry,
        evaluator: &'a dyn Evaluator,
        settings: &'a PlayerSettings,
    ) -> Self {
        ExercisePlayer {
            exercise,
            handlers,
            evaluator,
            settings,
        }
    }

    pub fn exercise(&self) -> &'a Exercise {
        self.exercise
    }

    // ── Operations ────────────────────────────────

    /// Initialize exercise variables and enter the start stage.
    ///
    /// Does nothing for a submission that already has log entries or
    /// internal errors.
    pub fn init_submission(&self, submission: &mut Submission) -> Result<(), PlayerError> {
        if !submission.log.is_empty() || submission.has_internal_errors {
            return Ok(());
        }

        match initialize_variables(&self.exercise.variables, self.evaluator) {
            Ok(values) => {
                submission.variables.merge(&values);
                self.expand(submission, Some(self.exercise.start_stage), None)?;
            }
            Err(e) => {
                self.record_failure(
                    submission,
                    None,
                    format!("Initialization failed for exercise due to {}", e),
                );
            }
        }

        self.update_total_result(submission)
    }

    /// Submit learner input for the open visit and start grading it.
    pub fn submit(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
        input: serde_json::Value,
    ) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        self.check_open(submission, visit_id)?;
        self.check_not_errored(submission)?;

        let Some(handler) = self.handler_or_fail(submission, stage) else {
            return self.update_total_result(submission);
        };

        merge_input(&mut visit_mut(submission, visit_id)?.input, input);
        submission.log.append(LogEvent::Submit { visit: visit_id });
        debug!(submission = %submission.id, stage = %stage.id, visit = %visit_id, "submit");

        let mut context = self.context(submission, visit_id, handler, false)?;
        if !apply_updates(
            submission,
            visit_id,
            stage,
            UpdateHook::BeforeCheck,
            &mut context,
            self.evaluator,
        ) {
            return self.update_total_result(submission);
        }

        let context = self.context(submission, visit_id, handler, false)?;
        let grading = {
            let visit = visit_mut(submission, visit_id)?;
            handler.start_grading(stage, visit, &context, self.evaluator)
        };

        match grading {
            Ok(Grading::Completed(result)) => {
                self.attach_result(submission, stage, handler, visit_id, result)?;
            }
            Ok(Grading::Deferred) => {
                debug!(submission = %submission.id, visit = %visit_id, "grading deferred");
                handler.update_status(stage, visit_mut(submission, visit_id)?);
                self.expand_after_submit(submission, visit_id)?;
            }
            Err(e) => {
                self.record_failure(
                    submission,
                    Some(visit_id),
                    format!("Grading of stage {} failed: {}", stage.id, e),
                );
                visit_mut(submission, visit_id)?.has_internal_errors = true;
            }
        }

        self.update_total_result(submission)
    }

    /// Skip the open visit.
    ///
    /// Stages that do not allow skipping reject the request before any
    /// other check.
    pub fn skip(&self, submission: &mut Submission, visit_id: VisitId) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        if !stage.allow_skip {
            return Err(PlayerError::SkipNotAllowed { stage_id: stage.id });
        }
        self.check_open(submission, visit_id)?;
        self.check_not_errored(submission)?;

        submission.log.append(LogEvent::Skip { visit: visit_id });
        debug!(submission = %submission.id, stage = %stage.id, visit = %visit_id, "skip");

        let handler = self.handlers.get(&stage.kind);
        let context = self.context_with(submission, visit_id, handler, false)?;
        let message = self
            .evaluator
            .resolve_placeholders(&stage.skip_message, &context);
        let result = CheckResult::new(0, message);

        let visit = visit_mut(submission, visit_id)?;
        visit.results.clear();
        visit.results.push(result.clone());
        visit.has_internal_errors = false;
        visit.has_pending_checks = false;
        visit.points = 0;
        submission.log.append(LogEvent::Check {
            visit: visit_id,
            result,
        });

        self.expand_after_skip(submission, stage, visit_id)?;
        self.update_total_result(submission)
    }

    /// Give the next hint of the visit's stage.
    ///
    /// Returns `false` without touching the submission when the stage has
    /// no hints left.
    pub fn request_hint(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
    ) -> Result<bool, PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        let given = submission
            .visit(visit_id)
            .map(|v| v.hints.len())
            .ok_or(PlayerError::UnknownVisit { visit: visit_id })?;
        let Some(hint) = stage.hints.get(given) else {
            return Ok(false);
        };

        let handler = self.handlers.get(&stage.kind);
        let context = self.context_with(submission, visit_id, handler, true)?;
        let text = self.evaluator.resolve_placeholders(&hint.text, &context);

        visit_mut(submission, visit_id)?.hints.push(GivenHint {
            text: text.clone(),
            malus: hint.malus,
        });
        submission.log.append(LogEvent::Hint {
            visit: visit_id,
            text: format!("{} {{index={}}}", text, given),
        });
        debug!(submission = %submission.id, visit = %visit_id, hint = given, "hint given");

        self.update_total_result(submission)?;
        Ok(true)
    }

    /// Go back to `visit_id`: drop it and everything after it from the path
    /// and enter its stage afresh.
    ///
    /// Allowed when stage restarts are enabled, or always for errored
    /// submissions.
    pub fn erase(&self, submission: &mut Submission, visit_id: VisitId) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        if !self.settings.allow_stage_restart && !submission.has_internal_errors {
            return Err(PlayerError::EraseNotAllowed { visit: visit_id });
        }
        if !generate_submission_path(&submission.log).contains(&visit_id) {
            return Err(PlayerError::VisitNotInPath { visit: visit_id });
        }

        submission.log.append(LogEvent::Erase { visit: visit_id });
        submission.is_completed = false;
        let snapshot = submission
            .visit(visit_id)
            .map(|v| v.variables.snapshot())
            .ok_or(PlayerError::UnknownVisit { visit: visit_id })?;
        submission.variables.restore(&snapshot);
        submission.has_internal_errors = false;
        info!(submission = %submission.id, stage = %stage.id, visit = %visit_id, "visit erased");

        self.expand(submission, Some(stage.id), Some(visit_id))?;
        self.update_total_result(submission)
    }

    /// Record that the learner left the visit. No state changes.
    pub fn exit(&self, submission: &mut Submission, visit_id: VisitId) -> Result<(), PlayerError> {
        if submission.visit(visit_id).is_none() {
            return Err(PlayerError::UnknownVisit { visit: visit_id });
        }
        submission.log.append(LogEvent::Exit { visit: visit_id });
        Ok(())
    }

    /// Attach a grading result to a visit. This is also the entry point for
    /// results of deferred grading.
    ///
    /// Expansion happens at most once per visit; a late or repeated result
    /// is recorded but never enters another stage.
    pub fn add_result(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
        result: CheckResult,
    ) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        let Some(handler) = self.handler_or_fail(submission, stage) else {
            return self.update_total_result(submission);
        };
        self.attach_result(submission, stage, handler, visit_id, result)?;
        self.update_total_result(submission)
    }

    /// Set or clear the manual override of a visit's points.
    pub fn update_manual_result(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
        manual_result: Option<ManualResult>,
    ) -> Result<(), PlayerError> {
        let mode = self.exercise.hint_malus;
        let visit = visit_mut(submission, visit_id)?;
        let old_points = visit.effective_points(mode).points();
        visit.manual_result = manual_result;
        let new_points = visit.effective_points(mode).points();

        if old_points != new_points {
            info!(
                submission = %submission.id,
                visit = %visit_id,
                old_points,
                new_points,
                "manual result changed points"
            );
            self.update_total_result(submission)?;
        }
        Ok(())
    }

    // ── Expansion ─────────────────────────────────

    /// Enter `target`, or complete the submission when `target` is `None`.
    ///
    /// With `copy_from` the new visit continues that visit: hints and
    /// stage-specific state are carried over and the attempt count grows.
    pub fn expand(
        &self,
        submission: &mut Submission,
        target: Option<StageId>,
        copy_from: Option<VisitId>,
    ) -> Result<(), PlayerError> {
        let Some(stage_id) = target else {
            submission.is_completed = true;
            submission.log.append(LogEvent::End);
            info!(submission = %submission.id, "submission completed");
            return self.update_total_result(submission);
        };

        let stage = self.exercise.require_stage(stage_id)?;
        let Some(handler) = self.handler_or_fail(submission, stage) else {
            return Ok(());
        };

        let visit_id = submission.allocate_visit_id();
        let mut visit = StageVisit::new(visit_id, stage_id);

        let mut context = prepare_context(
            submission,
            Some(&visit),
            Some(handler),
            self.exercise.hint_malus,
            false,
        );
        apply_updates(
            submission,
            visit_id,
            stage,
            UpdateHook::OnEnter,
            &mut context,
            self.evaluator,
        );

        visit.variables = submission.variables.snapshot();
        if let Err(e) = handler.prepare_visit(stage, &mut visit, submission) {
            self.record_failure(
                submission,
                Some(visit_id),
                format!("Preparation of stage {} failed: {}", stage.id, e),
            );
        }

        if submission.has_internal_errors {
            submission.visits.insert(visit_id, visit);
            return Ok(());
        }

        match copy_from {
            Some(previous_id) => {
                let previous = submission
                    .visit(previous_id)
                    .ok_or(PlayerError::UnknownVisit { visit: previous_id })?;
                visit.hints = previous.hints.clone();
                handler.carry_over(previous, &mut visit);
                visit.attempt_count = previous.attempt_count + 1;
            }
            None => visit.attempt_count = 1,
        }

        debug!(
            submission = %submission.id,
            stage = %stage_id,
            visit = %visit_id,
            attempt = visit.attempt_count,
            "stage entered"
        );
        submission.visits.insert(visit_id, visit);
        submission.log.append(LogEvent::Enter { visit: visit_id });
        Ok(())
    }

    /// Move on from a graded visit.
    ///
    /// Does nothing while the visit awaits a result its stage must wait
    /// for, when the submission is errored, or when the visit was already
    /// left.
    pub fn expand_after_submit(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
    ) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        let pending = submission
            .visit(visit_id)
            .is_some_and(|v| v.has_pending_checks);
        if (pending && stage.must_wait_for_pending_jobs)
            || submission.has_internal_errors
            || is_stage_already_expanded(submission, visit_id)
        {
            return Ok(());
        }

        let Some(handler) = self.handler_or_fail(submission, stage) else {
            return Ok(());
        };

        let transition = match self.find_stage_transition(submission, stage, handler, visit_id)? {
            Ok(transition) => transition,
            Err(e) => {
                self.record_failure(
                    submission,
                    Some(visit_id),
                    format!("Evaluation of stage transitions failed: {}", e),
                );
                return Ok(());
            }
        };

        if transition.is_repeat() {
            return self.handle_repeat_transition(submission, visit_id);
        }

        let mut context = self.context(submission, visit_id, handler, false)?;
        if apply_updates(
            submission,
            visit_id,
            stage,
            UpdateHook::OnNormalExit,
            &mut context,
            self.evaluator,
        ) {
            self.follow(submission, transition, visit_id)?;
        }
        Ok(())
    }

    fn expand_after_skip(
        &self,
        submission: &mut Submission,
        stage: &'a Stage,
        visit_id: VisitId,
    ) -> Result<(), PlayerError> {
        let transition = match self.find_skip_transition(submission, stage, visit_id)? {
            Ok(transition) => transition,
            Err(e) => {
                self.record_failure(
                    submission,
                    Some(visit_id),
                    format!("Evaluation of skip transitions failed: {}", e),
                );
                return Ok(());
            }
        };

        if transition.is_repeat() {
            return self.handle_repeat_transition(submission, visit_id);
        }

        let handler = self.handlers.get(&stage.kind);
        let mut context = self.context_with(submission, visit_id, handler, false)?;
        if apply_updates(
            submission,
            visit_id,
            stage,
            UpdateHook::OnSkip,
            &mut context,
            self.evaluator,
        ) {
            self.follow(submission, transition, visit_id)?;
        }
        Ok(())
    }

    /// Log the repeat, run on-repeat updates and enter the same stage again.
    pub fn handle_repeat_transition(
        &self,
        submission: &mut Submission,
        visit_id: VisitId,
    ) -> Result<(), PlayerError> {
        let stage = self.stage_of(submission, visit_id)?;
        submission.log.append(LogEvent::Repeat { visit: visit_id });
        debug!(submission = %submission.id, stage = %stage.id, visit = %visit_id, "repeat");

        let handler = self.handlers.get(&stage.kind);
        let mut context = self.context_with(submission, visit_id, handler, false)?;
        if !apply_updates(
            submission,
            visit_id,
            stage,
            UpdateHook::OnRepeat,
            &mut context,
            self.evaluator,
        ) {
            return Ok(());
        }

        self.expand(submission, Some(stage.id), Some(visit_id))
    }

    fn follow(
        &self,
        submission: &mut Submission,
        transition: &Transition,
        visit_id: VisitId,
    ) -> Result<(), PlayerError> {
        match transition.target {
            TransitionTarget::Stage(next) => self.expand(submission, Some(next), None),
            TransitionTarget::End => self.expand(submission, None, None),
            TransitionTarget::Repeat => self.handle_repeat_transition(submission, visit_id),
        }
    }

    // ── Transition resolution ─────────────────────

    /// First stage transition the handler and the guard both accept, else
    /// the default transition.
    fn find_stage_transition(
        &self,
        submission: &Submission,
        stage: &'a Stage,
        handler: &dyn StageHandler,
        visit_id: VisitId,
    ) -> Result<Result<&'a Transition, EvaluatorError>, PlayerError> {
        if stage.stage_transitions.is_empty() {
            return Ok(Ok(&stage.default_transition));
        }

        let visit = submission
            .visit(visit_id)
            .ok_or(PlayerError::UnknownVisit { visit: visit_id })?;
        let context = self.context(submission, visit_id, handler, false)?;
        Ok(self.first_eligible(stage, &stage.stage_transitions, |t| {
            Ok(handler.evaluate_custom_transition(stage, visit, t, &context, self.evaluator)?
                && self
                    .evaluator
                    .evaluate_condition(t.condition.as_deref(), &context)?)
        }))
    }

    /// First skip transition whose guard holds, else the default transition.
    fn find_skip_transition(
        &self,
        submission: &Submission,
        stage: &'a Stage,
        visit_id: VisitId,
    ) -> Result<Result<&'a Transition, EvaluatorError>, PlayerError> {
        if stage.skip_transitions.is_empty() {
            return Ok(Ok(&stage.default_transition));
        }

        let handler = self.handlers.get(&stage.kind);
        let context = self.context_with(submission, visit_id, handler, false)?;
        Ok(self.first_eligible(stage, &stage.skip_transitions, |t| {
            self.evaluator
                .evaluate_condition(t.condition.as_deref(), &context)
        }))
    }

    fn first_eligible<F>(
        &self,
        stage: &'a Stage,
        candidates: &'a [Transition],
        mut eligible: F,
    ) -> Result<&'a Transition, EvaluatorError>
    where
        F: FnMut(&Transition) -> Result<bool, EvaluatorError>,
    {
        for transition in candidates {
            if eligible(transition)? {
                return Ok(transition);
            }
        }
        Ok(&stage.default_transition)
    }

    // ── Results and scoring ───────────────────────

    fn attach_result(
        &self,
        submission: &mut Submission,
        stage: &'a Stage,
        handler: &dyn StageHandler,
        visit_id: VisitId,
        mut result: CheckResult,
    ) -> Result<(), PlayerError> {
        let context = self.context(submission, visit_id, handler, false)?;
        result.public_comment = self
            .evaluator
            .resolve_placeholders(&result.public_comment, &context);

        let visit = visit_mut(submission, visit_id)?;
        visit.results.push(result.clone());
        handler.update_status(stage, visit);
        let graded = !visit.has_pending_checks && !visit.has_internal_errors;
        submission.log.append(LogEvent::Check {
            visit: visit_id,
            result,
        });

        if graded {
            let mut context = self.context(submission, visit_id, handler, false)?;
            apply_updates(
                submission,
                visit_id,
                stage,
                UpdateHook::AfterCheck,
                &mut context,
                self.evaluator,
            );
        }

        self.update_total_result(submission)?;
        if submission.has_internal_errors {
            return Ok(());
        }
        self.expand_after_submit(submission, visit_id)
    }

    /// Score the current path without touching the submission.
    pub fn score_path(&self, submission: &Submission) -> Result<PathScore, PlayerError> {
        let path = generate_submission_path(&submission.log);
        let mode = self.exercise.hint_malus;

        let mut score = PathScore {
            has_internal_errors: false,
            has_pending_checks: false,
            points: 0,
        };
        let mut scored = Vec::with_capacity(path.len());
        let mut last_stage: Option<&Stage> = None;

        for visit_id in &path {
            let visit = submission
                .visit(*visit_id)
                .ok_or(PlayerError::UnknownVisit { visit: *visit_id })?;
            let stage = self.exercise.require_stage(visit.stage_id)?;

            score.has_internal_errors |= visit.has_internal_errors;
            score.has_pending_checks |= visit.has_pending_checks && stage.must_wait_for_pending_jobs;
            scored.push(ScoredVisit {
                weight: stage.weight,
                points: visit.effective_points(mode),
            });
            last_stage = Some(stage);
        }

        let remaining = match last_stage {
            Some(stage) if !submission.is_completed => self
                .exercise
                .suffix_weights()
                .get(stage.id)
                .map(|suffix| suffix.saturating_sub(stage.weight))
                .unwrap_or(0),
            _ => 0,
        };
        score.points = compute_total(&scored, remaining);
        Ok(score)
    }

    /// Propagate path state into the submission flags and refresh the
    /// cached total. The total is kept while errors or pending checks are
    /// present.
    pub fn update_total_result(&self, submission: &mut Submission) -> Result<(), PlayerError> {
        let score = self.score_path(submission)?;

        submission.has_internal_errors |= score.has_internal_errors;
        submission.has_pending_stage_checks = score.has_pending_checks;
        if submission.has_internal_errors || submission.has_pending_stage_checks {
            return Ok(());
        }

        if submission.result_points != score.points {
            debug!(
                submission = %submission.id,
                old = submission.result_points,
                new = score.points,
                "total result changed"
            );
            submission.result_points = score.points;
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────

    /// Visits that currently count toward grading, in order.
    pub fn submission_path(&self, submission: &Submission) -> Vec<VisitId> {
        generate_submission_path(&submission.log)
    }

    /// Freshly computed total of the current path, regardless of pending
    /// checks or errors.
    pub fn total_score(&self, submission: &Submission) -> Result<u32, PlayerError> {
        Ok(self.score_path(submission)?.points)
    }

    /// True if the learner has not interacted yet: no submit, skip or hint.
    pub fn is_unprocessed(&self, submission: &Submission) -> bool {
        ![LogEntryKind::Submit, LogEntryKind::Skip, LogEntryKind::Hint]
            .into_iter()
            .any(|kind| submission.log.contains_kind(kind))
    }

    // ── Helpers ───────────────────────────────────

    fn stage_of(&self, submission: &Submission, visit_id: VisitId) -> Result<&'a Stage, PlayerError> {
        let visit = submission
            .visit(visit_id)
            .ok_or(PlayerError::UnknownVisit { visit: visit_id })?;
        self.exercise.require_stage(visit.stage_id)
    }

    /// The visit must be the open one and not yet submitted or skipped.
    fn check_open(&self, submission: &Submission, visit_id: VisitId) -> Result<(), PlayerError> {
        let is_current = submission.current_visit().map(|v| v.id) == Some(visit_id);
        let answered = submission.log.count_for_visit(visit_id, LogEntryKind::Submit) > 0
            || submission.log.count_for_visit(visit_id, LogEntryKind::Skip) > 0;
        if !is_current || answered {
            return Err(PlayerError::VisitClosed { visit: visit_id });
        }
        Ok(())
    }

    fn check_not_errored(&self, submission: &Submission) -> Result<(), PlayerError> {
        if submission.has_internal_errors {
            return Err(PlayerError::SubmissionErrored {
                submission_id: submission.id.clone(),
            });
        }
        Ok(())
    }

    /// Resolve the stage's handler, recording a failure when none is
    /// registered.
    fn handler_or_fail(&self, submission: &mut Submission, stage: &Stage) -> Option<&'a dyn StageHandler> {
        let handler = self.handlers.get(&stage.kind);
        if handler.is_none() {
            error!(
                submission = %submission.id,
                stage = %stage.id,
                kind = %stage.kind,
                "no stage handler registered"
            );
            submission.log.append(LogEvent::Fail {
                visit: None,
                message: format!("No stage handler registered for stage type '{}'", stage.kind),
            });
            submission.has_internal_errors = true;
        }
        handler
    }

    fn record_failure(&self, submission: &mut Submission, visit: Option<VisitId>, message: String) {
        warn!(
            submission = %submission.id,
            visit = ?visit.map(|v| v.0),
            message = %message,
            "internal failure recorded"
        );
        submission.log.append(LogEvent::Fail { visit, message });
        submission.has_internal_errors = true;
    }

    fn context(
        &self,
        submission: &Submission,
        visit_id: VisitId,
        handler: &dyn StageHandler,
        use_visit_snapshot: bool,
    ) -> Result<EvaluationContext, PlayerError> {
        self.context_with(submission, visit_id, Some(handler), use_visit_snapshot)
    }

    fn context_with(
        &self,
        submission: &Submission,
        visit_id: VisitId,
        handler: Option<&dyn StageHandler>,
        use_visit_snapshot: bool,
    ) -> Result<EvaluationContext, PlayerError> {
        let visit = submission
            .visit(visit_id)
            .ok_or(PlayerError::UnknownVisit { visit: visit_id })?;
        Ok(prepare_context(
            submission,
            Some(visit),
            handler,
            self.exercise.hint_malus,
            use_visit_snapshot,
        ))
    }
}

fn visit_mut(submission: &mut Submission, visit_id: VisitId) -> Result<&mut StageVisit, PlayerError> {
    submission
        .visit_mut(visit_id)
        .ok_or(PlayerError::UnknownVisit { visit: visit_id })
}

/// Object inputs are merged key by key; anything else replaces.
fn merge_input(current: &mut serde_json::Value, input: serde_json::Value) {
    match (current, input) {
        (serde_json::Value::Object(current), serde_json::Value::Object(input)) => {
            current.extend(input);
        }
        (current, input) => *current = input,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests;
