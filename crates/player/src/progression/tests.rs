use super::*;
use crate::evaluator::StaticEvaluator;
use crate::handler::HandlerError;
use crate::scoring::HintMalusType;
use crate::types::{StageHint, SubmissionState, Value, VariableDeclaration, VariableUpdate};
use serde_json::json;

// ──────────────────────────────────────
// Test handlers
// ──────────────────────────────────────

/// Grades immediately with the `points` field of the input.
struct PointsHandler;

impl StageHandler for PointsHandler {
    fn kind(&self) -> &str {
        "mc"
    }

    fn start_grading(
        &self,
        _stage: &Stage,
        visit: &mut StageVisit,
        _context: &EvaluationContext,
        _evaluator: &dyn Evaluator,
    ) -> Result<Grading, HandlerError> {
        let points = visit
            .input
            .get("points")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| HandlerError::Grading("input has no points".into()))?;
        Ok(Grading::Completed(CheckResult::new(
            points as u32,
            "attempt [meta=stageCurrentAttempt]",
        )))
    }

    fn input_variables(&self, visit: &StageVisit) -> crate::types::VariableStore {
        visit
            .input
            .get("points")
            .and_then(serde_json::Value::as_i64)
            .map(|p| ("points".to_string(), Value::Int(p)))
            .into_iter()
            .collect()
    }
}

/// Hands grading off; results arrive through `add_result`.
struct DeferredHandler;

impl StageHandler for DeferredHandler {
    fn kind(&self) -> &str {
        "code"
    }

    fn start_grading(
        &self,
        _stage: &Stage,
        _visit: &mut StageVisit,
        _context: &EvaluationContext,
        _evaluator: &dyn Evaluator,
    ) -> Result<Grading, HandlerError> {
        Ok(Grading::Deferred)
    }
}

struct BrokenHandler;

impl StageHandler for BrokenHandler {
    fn kind(&self) -> &str {
        "broken"
    }

    fn start_grading(
        &self,
        _stage: &Stage,
        _visit: &mut StageVisit,
        _context: &EvaluationContext,
        _evaluator: &dyn Evaluator,
    ) -> Result<Grading, HandlerError> {
        Err(HandlerError::Grading("checker unreachable".into()))
    }
}

// ──────────────────────────────────────
// Fixture
// ──────────────────────────────────────

struct Fixture {
    exercise: Exercise,
    handlers: StageHandlerRegistry,
    evaluator: StaticEvaluator,
    settings: PlayerSettings,
}

impl Fixture {
    fn new(exercise: Exercise) -> Self {
        Fixture {
            exercise,
            handlers: StageHandlerRegistry::new()
                .with_handler(PointsHandler)
                .with_handler(DeferredHandler)
                .with_handler(BrokenHandler),
            evaluator: StaticEvaluator::new(),
            settings: PlayerSettings::default(),
        }
    }

    fn with_evaluator(mut self, evaluator: StaticEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    fn without_restart(mut self) -> Self {
        self.settings.allow_stage_restart = false;
        self
    }

    fn player(&self) -> ExercisePlayer<'_> {
        ExercisePlayer::new(&self.exercise, &self.handlers, &self.evaluator, &self.settings)
    }

    fn started(&self) -> Submission {
        let mut submission = Submission::new("sub-1", self.exercise.id.clone());
        self.player().init_submission(&mut submission).unwrap();
        submission
    }
}

fn stage(id: u64, kind: &str, weight: u32, default: Transition) -> Stage {
    Stage::new(StageId(id), kind, weight, default)
}

fn exercise(stages: Vec<Stage>) -> Exercise {
    Exercise::new("ex-1", StageId(1), stages).unwrap()
}

fn two_stage_linear() -> Exercise {
    exercise(vec![
        stage(1, "mc", 10, Transition::to_stage(StageId(2))),
        stage(2, "mc", 10, Transition::end()),
    ])
}

fn points(p: u64) -> serde_json::Value {
    json!({ "points": p })
}

fn kinds(submission: &Submission) -> Vec<LogEntryKind> {
    submission.log().iter().map(|e| e.kind()).collect()
}

fn current(submission: &Submission) -> VisitId {
    submission.current_visit().unwrap().id
}

fn increment(
    var: &'static str,
) -> impl Fn(&EvaluationContext) -> Result<Value, EvaluatorError> + Send + Sync + 'static {
    move |ctx| match ctx.exercise.get(var) {
        Some(Value::Int(n)) => Ok(Value::Int(n + 1)),
        _ => Err(EvaluatorError::Failed {
            expression: format!("[var={}] + 1", var),
            message: format!("{} is not an integer", var),
        }),
    }
}

// ──────────────────────────────────────
// Linear progression and scoring
// ──────────────────────────────────────

#[test]
fn linear_flow_completes_with_weighted_average() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();

    assert_eq!(kinds(&sub), vec![LogEntryKind::Enter]);
    assert!(player.is_unprocessed(&sub));
    assert_eq!(sub.result_points(), 0);

    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    let v2 = current(&sub);
    assert_ne!(v1, v2);
    assert_eq!(player.submission_path(&sub), vec![v1, v2]);
    assert_eq!(sub.result_points(), 50);

    player.submit(&mut sub, v2, points(0)).unwrap();
    assert!(sub.is_completed());
    assert_eq!(sub.state(), SubmissionState::Completed);
    assert_eq!(sub.result_points(), 50);
    assert_eq!(
        kinds(&sub),
        vec![
            LogEntryKind::Enter,
            LogEntryKind::Submit,
            LogEntryKind::Check,
            LogEntryKind::Enter,
            LogEntryKind::Submit,
            LogEntryKind::Check,
            LogEntryKind::End,
        ]
    );
    assert!(!player.is_unprocessed(&sub));
    assert!(sub.current_visit().is_none());
}

#[test]
fn incomplete_submission_counts_remaining_suffix_weight() {
    let fx = Fixture::new(exercise(vec![
        stage(1, "mc", 10, Transition::to_stage(StageId(2))),
        stage(2, "mc", 30, Transition::end()),
    ]));
    let player = fx.player();
    let mut sub = fx.started();

    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    assert_eq!(sub.result_points(), 25);
    assert_eq!(player.total_score(&sub).unwrap(), 25);
}

#[test]
fn feedback_placeholders_are_resolved() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(70)).unwrap();
    assert_eq!(sub.visit(v1).unwrap().results[0].public_comment, "attempt 1");
    assert_eq!(sub.visit(v1).unwrap().points, 70);
}

#[test]
fn submitting_a_closed_visit_is_rejected() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    let len = sub.log().len();

    assert_eq!(
        player.submit(&mut sub, v1, points(100)),
        Err(PlayerError::VisitClosed { visit: v1 })
    );
    assert_eq!(
        player.submit(&mut sub, VisitId(99), points(100)),
        Err(PlayerError::UnknownVisit { visit: VisitId(99) })
    );
    assert_eq!(sub.log().len(), len);
}

#[test]
fn non_boolean_guard_is_an_evaluation_failure() {
    let mut first = stage(1, "mc", 10, Transition::to_stage(StageId(2)));
    first
        .stage_transitions
        .push(Transition::to_stage(StageId(2)).when("[input=points]"));
    let fx = Fixture::new(exercise(vec![first, stage(2, "mc", 10, Transition::end())]));
    let player = fx.player();
    let mut sub = fx.started();

    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    assert!(sub.has_internal_errors());
    assert_eq!(sub.log().last_entered_visit(), Some(v1));
    let fail = sub.log().entries().last().unwrap();
    assert_eq!(fail.kind(), LogEntryKind::Fail);
    assert!(fail
        .event
        .text()
        .unwrap()
        .starts_with("Evaluation of stage transitions failed: "));
}

#[test]
fn custom_transition_selected_by_guard() {
    let mut first = stage(1, "mc", 10, Transition::to_stage(StageId(2)));
    first
        .stage_transitions
        .push(Transition::to_stage(StageId(3)).when("full_marks"));
    let fx = Fixture::new(exercise(vec![
        first,
        stage(2, "mc", 10, Transition::end()),
        stage(3, "mc", 10, Transition::end()),
    ]))
    .with_evaluator(StaticEvaluator::new().with_fn("full_marks", |ctx| {
        Ok(Value::Bool(ctx.input.get("points") == Some(&Value::Int(100))))
    }));
    let player = fx.player();

    let mut full = fx.started();
    let v1 = current(&full);
    player.submit(&mut full, v1, points(100)).unwrap();
    assert_eq!(full.current_visit().unwrap().stage_id, StageId(3));

    let mut partial = fx.started();
    let v1 = current(&partial);
    player.submit(&mut partial, v1, points(60)).unwrap();
    assert_eq!(partial.current_visit().unwrap().stage_id, StageId(2));
}

// ──────────────────────────────────────
// Repeat and hints
// ──────────────────────────────────────

#[test]
fn repeat_replaces_visit_and_carries_hints() {
    let mut only = stage(1, "mc", 10, Transition::end());
    only.stage_transitions.push(Transition::repeat().when("retry"));
    only.hints.push(StageHint {
        text: "Think of [var=x]".into(),
        malus: 10,
    });
    let exercise = exercise(vec![only])
        .with_variables(vec![VariableDeclaration {
            name: "x".into(),
            initialization: "5".into(),
        }])
        .with_hint_malus(Some(HintMalusType::CutActual));
    let fx = Fixture::new(exercise).with_evaluator(StaticEvaluator::new().with_fn("retry", |ctx| {
        Ok(Value::Bool(
            ctx.meta.get("stageCurrentAttempt") == Some(&Value::Int(1)),
        ))
    }));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    assert!(player.request_hint(&mut sub, v1).unwrap());
    assert_eq!(sub.visit(v1).unwrap().hints[0].text, "Think of 5");
    assert_eq!(
        sub.log().entries().last().unwrap().event.text().as_deref(),
        Some("Think of 5 {index=0}")
    );
    assert!(!player.request_hint(&mut sub, v1).unwrap());
    assert!(!player.is_unprocessed(&sub));

    player.submit(&mut sub, v1, points(40)).unwrap();
    let v2 = current(&sub);
    assert_ne!(v1, v2);
    assert_eq!(sub.log().count_for_visit(v1, LogEntryKind::Repeat), 1);
    assert_eq!(player.submission_path(&sub), vec![v2]);

    let repeated = sub.visit(v2).unwrap();
    assert_eq!(repeated.attempt_count, 2);
    assert_eq!(repeated.hints.len(), 1);
    assert_eq!(repeated.input, points(40));

    player.submit(&mut sub, v2, points(90)).unwrap();
    assert!(sub.is_completed());
    assert_eq!(sub.visit(v2).unwrap().results[0].public_comment, "attempt 2");
    // 90 points reduced by the carried 10% hint malus
    assert_eq!(sub.result_points(), 81);

    assert_eq!(
        player.erase(&mut sub, v1),
        Err(PlayerError::VisitNotInPath { visit: v1 })
    );
}

#[test]
fn huge_hint_maluses_saturate_to_zero_points() {
    let mut only = stage(1, "mc", 10, Transition::end());
    for text in ["first", "second"] {
        only.hints.push(StageHint {
            text: text.into(),
            malus: 3_000_000_000,
        });
    }
    let exercise = exercise(vec![only]).with_hint_malus(Some(HintMalusType::CutActual));
    let fx = Fixture::new(exercise);
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    assert!(player.request_hint(&mut sub, v1).unwrap());
    assert!(player.request_hint(&mut sub, v1).unwrap());
    assert_eq!(sub.visit(v1).unwrap().cumulative_malus(), u32::MAX);

    player.submit(&mut sub, v1, points(100)).unwrap();
    assert!(sub.is_completed());
    assert_eq!(sub.visit(v1).unwrap().points, 100);
    assert_eq!(
        sub.visit(v1)
            .unwrap()
            .points_with_hint_malus(Some(HintMalusType::CutActual)),
        0
    );
    assert_eq!(sub.result_points(), 0);
}

#[test]
fn hint_request_without_hints_is_a_no_op() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);
    assert!(!player.request_hint(&mut sub, v1).unwrap());
    assert_eq!(sub.log().len(), 1);
    assert!(player.is_unprocessed(&sub));
}

// ──────────────────────────────────────
// Variable updates
// ──────────────────────────────────────

#[test]
fn before_check_failure_halts_without_grading() {
    let mut first = stage(1, "mc", 10, Transition::to_stage(StageId(2)));
    first
        .updates
        .before_check
        .push(VariableUpdate::new("y", "explode"));
    let fx = Fixture::new(exercise(vec![first, stage(2, "mc", 10, Transition::end())]))
        .with_evaluator(StaticEvaluator::new().with_failure("explode", "division by zero"))
        .without_restart();
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.submit(&mut sub, v1, points(100)).unwrap();
    assert!(sub.has_internal_errors());
    assert_eq!(sub.state(), SubmissionState::Errored);
    assert_eq!(
        kinds(&sub),
        vec![LogEntryKind::Enter, LogEntryKind::Submit, LogEntryKind::Fail]
    );
    assert!(sub.visit(v1).unwrap().results.is_empty());

    // Skip permission is checked before the error state.
    assert_eq!(
        player.skip(&mut sub, v1),
        Err(PlayerError::SkipNotAllowed { stage_id: StageId(1) })
    );

    // Errored submissions may always be erased back.
    player.erase(&mut sub, v1).unwrap();
    assert!(!sub.has_internal_errors());
    let v2 = current(&sub);
    assert_eq!(sub.visit(v2).unwrap().stage_id, StageId(1));
    assert_eq!(sub.visit(v2).unwrap().attempt_count, 2);
    assert_eq!(player.submission_path(&sub), vec![v2]);
}

#[test]
fn exit_updates_feed_next_stage_snapshot_and_erase_restores_them() {
    let mut first = stage(1, "mc", 10, Transition::to_stage(StageId(2)));
    first
        .updates
        .on_normal_exit
        .push(VariableUpdate::new("x", "[var=x] + 1"));
    let mut second = stage(2, "mc", 10, Transition::end());
    second
        .updates
        .on_enter
        .push(VariableUpdate::new("entered", "true"));
    let exercise = exercise(vec![first, second]).with_variables(vec![VariableDeclaration {
        name: "x".into(),
        initialization: "0".into(),
    }]);
    let fx = Fixture::new(exercise)
        .with_evaluator(StaticEvaluator::new().with_fn("[var=x] + 1", increment("x")));
    let player = fx.player();
    let mut sub = fx.started();

    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    let v2 = current(&sub);
    let snapshot = &sub.visit(v2).unwrap().variables;
    assert_eq!(snapshot.get("x"), Some(&Value::Int(1)));
    assert_eq!(snapshot.get("entered"), Some(&Value::Bool(true)));
    assert_eq!(sub.log().count_for_visit(v1, LogEntryKind::VarUpdate), 1);
    assert_eq!(sub.log().count_for_visit(v2, LogEntryKind::VarUpdate), 1);

    player.submit(&mut sub, v2, points(100)).unwrap();
    assert!(sub.is_completed());
    assert_eq!(sub.result_points(), 100);

    player.erase(&mut sub, v1).unwrap();
    assert!(!sub.is_completed());
    assert_eq!(sub.variables().get("x"), Some(&Value::Int(0)));
    assert!(!sub.variables().contains("entered"));
    let v3 = current(&sub);
    assert_eq!(player.submission_path(&sub), vec![v3]);
    assert_eq!(sub.visit(v3).unwrap().attempt_count, 2);
    assert_eq!(sub.result_points(), 0);
}

#[test]
fn on_enter_failure_leaves_visit_unentered() {
    let mut first = stage(1, "mc", 10, Transition::end());
    first.updates.on_enter.push(VariableUpdate::new("x", "nope"));
    let fx = Fixture::new(exercise(vec![first]))
        .with_evaluator(StaticEvaluator::new().with_failure("nope", "unknown variable"));
    let sub = fx.started();

    assert!(sub.has_internal_errors());
    assert_eq!(sub.log().last_entered_visit(), None);
    assert_eq!(sub.visits().count(), 1);
    assert!(fx.player().submission_path(&sub).is_empty());
}

// ──────────────────────────────────────
// Skip
// ──────────────────────────────────────

fn skippable_exercise() -> Exercise {
    let mut first = stage(1, "mc", 10, Transition::to_stage(StageId(2)));
    first.allow_skip = true;
    first.skip_message = "Skipped with x=[var=x]".into();
    first
        .skip_transitions
        .push(Transition::to_stage(StageId(3)).when("go_three"));
    first.updates.on_skip.push(VariableUpdate::new("x", "7"));
    exercise(vec![
        first,
        stage(2, "mc", 10, Transition::end()),
        stage(3, "mc", 10, Transition::end()),
    ])
    .with_variables(vec![VariableDeclaration {
        name: "x".into(),
        initialization: "1".into(),
    }])
}

#[test]
fn skip_uses_skip_transitions_and_zero_result() {
    let fx = Fixture::new(skippable_exercise())
        .with_evaluator(StaticEvaluator::new().with_value("go_three", true));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.skip(&mut sub, v1).unwrap();
    let skipped = sub.visit(v1).unwrap();
    assert_eq!(skipped.results.len(), 1);
    assert_eq!(skipped.results[0].points, 0);
    assert_eq!(skipped.results[0].public_comment, "Skipped with x=1");
    assert_eq!(sub.variables().get("x"), Some(&Value::Int(7)));

    let v2 = current(&sub);
    assert_eq!(sub.visit(v2).unwrap().stage_id, StageId(3));
    assert_eq!(player.submission_path(&sub), vec![v1, v2]);
    assert_eq!(
        kinds(&sub),
        vec![
            LogEntryKind::Enter,
            LogEntryKind::Skip,
            LogEntryKind::Check,
            LogEntryKind::VarUpdate,
            LogEntryKind::Enter,
        ]
    );

    assert_eq!(
        player.skip(&mut sub, v1),
        Err(PlayerError::VisitClosed { visit: v1 })
    );
}

#[test]
fn skip_rejected_when_stage_disallows_it() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    assert_eq!(
        player.skip(&mut sub, v1),
        Err(PlayerError::SkipNotAllowed { stage_id: StageId(1) })
    );
    assert_eq!(sub.log().len(), 1);

    // Also when the visit is closed.
    player.submit(&mut sub, v1, points(10)).unwrap();
    assert_eq!(
        player.skip(&mut sub, v1),
        Err(PlayerError::SkipNotAllowed { stage_id: StageId(1) })
    );

    // And once the submission is completed.
    let v2 = current(&sub);
    player.submit(&mut sub, v2, points(10)).unwrap();
    assert!(sub.is_completed());
    assert_eq!(
        player.skip(&mut sub, v2),
        Err(PlayerError::SkipNotAllowed { stage_id: StageId(2) })
    );
}

#[test]
fn skip_transition_failure_is_recorded() {
    let fx = Fixture::new(skippable_exercise())
        .with_evaluator(StaticEvaluator::new().with_failure("go_three", "bad guard"));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.skip(&mut sub, v1).unwrap();
    assert!(sub.has_internal_errors());
    assert_eq!(sub.log().count_for_visit(v1, LogEntryKind::Fail), 1);
    assert_eq!(sub.log().last_entered_visit(), Some(v1));
    let fail = sub.log().entries().last().unwrap();
    assert!(fail
        .event
        .text()
        .unwrap()
        .starts_with("Evaluation of skip transitions failed: "));
    // x untouched: on-skip updates never ran
    assert_eq!(sub.variables().get("x"), Some(&Value::Int(1)));
}

// ──────────────────────────────────────
// Deferred grading
// ──────────────────────────────────────

#[test]
fn deferred_grading_waits_then_expands_once() {
    let fx = Fixture::new(exercise(vec![
        stage(1, "code", 10, Transition::to_stage(StageId(2))),
        stage(2, "mc", 10, Transition::end()),
    ]));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.submit(&mut sub, v1, json!({ "source": "print(1)" })).unwrap();
    assert!(sub.has_pending_stage_checks());
    assert!(sub.visit(v1).unwrap().has_pending_checks);
    assert_eq!(sub.log().last_entered_visit(), Some(v1));

    player
        .add_result(&mut sub, v1, CheckResult::new(100, "passed on attempt [meta=stageCurrentAttempt]"))
        .unwrap();
    assert!(!sub.has_pending_stage_checks());
    assert_eq!(sub.visit(v1).unwrap().results[0].public_comment, "passed on attempt 1");
    let v2 = current(&sub);
    assert_ne!(v1, v2);
    assert_eq!(sub.result_points(), 50);

    // A late duplicate result is recorded but does not expand again.
    player
        .add_result(&mut sub, v1, CheckResult::new(40, "rerun"))
        .unwrap();
    assert_eq!(sub.log().count_for_visit(v1, LogEntryKind::Check), 2);
    assert_eq!(
        sub.log().iter().filter(|e| e.kind() == LogEntryKind::Enter).count(),
        2
    );
    assert_eq!(current(&sub), v2);
    assert_eq!(sub.result_points(), 20);
}

#[test]
fn non_blocking_stage_expands_before_result() {
    let mut first = stage(1, "code", 10, Transition::to_stage(StageId(2)));
    first.must_wait_for_pending_jobs = false;
    let fx = Fixture::new(exercise(vec![first, stage(2, "mc", 10, Transition::end())]));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.submit(&mut sub, v1, json!({})).unwrap();
    assert!(!sub.has_pending_stage_checks());
    let v2 = current(&sub);
    assert_eq!(player.submission_path(&sub), vec![v1, v2]);

    // An error result for the earlier visit still poisons the submission.
    player
        .add_result(&mut sub, v1, CheckResult::error("runner crashed"))
        .unwrap();
    assert!(sub.has_internal_errors());
    assert_eq!(current(&sub), v2);
    assert_eq!(
        player.submit(&mut sub, v2, points(100)),
        Err(PlayerError::SubmissionErrored {
            submission_id: "sub-1".into()
        })
    );
}

#[test]
fn grading_error_marks_visit() {
    let fx = Fixture::new(exercise(vec![stage(1, "broken", 10, Transition::end())]));
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.submit(&mut sub, v1, json!({})).unwrap();
    assert!(sub.visit(v1).unwrap().has_internal_errors);
    assert!(sub.has_internal_errors());
    assert_eq!(sub.log().count_for_visit(v1, LogEntryKind::Fail), 1);
    assert!(!sub.is_completed());
}

// ──────────────────────────────────────
// Erase authorization
// ──────────────────────────────────────

#[test]
fn erase_requires_restart_permission_unless_errored() {
    let fx = Fixture::new(two_stage_linear()).without_restart();
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    let len = sub.log().len();

    assert_eq!(
        player.erase(&mut sub, v1),
        Err(PlayerError::EraseNotAllowed { visit: v1 })
    );
    assert_eq!(sub.log().len(), len);
}

// ──────────────────────────────────────
// Initialization failures
// ──────────────────────────────────────

#[test]
fn failed_initialization_enters_nothing() {
    let exercise = two_stage_linear().with_variables(vec![
        VariableDeclaration {
            name: "a".into(),
            initialization: "1".into(),
        },
        VariableDeclaration {
            name: "z".into(),
            initialization: "boom".into(),
        },
    ]);
    let fx = Fixture::new(exercise)
        .with_evaluator(StaticEvaluator::new().with_failure("boom", "undefined function"));
    let player = fx.player();
    let mut sub = fx.started();

    assert!(sub.has_internal_errors());
    assert!(sub.variables().is_empty());
    assert_eq!(sub.log().len(), 1);
    let entry = &sub.log().entries()[0];
    assert_eq!(entry.event.visit(), None);
    assert!(entry
        .event
        .text()
        .unwrap()
        .starts_with("Initialization failed for exercise due to "));

    player.init_submission(&mut sub).unwrap();
    assert_eq!(sub.log().len(), 1);
}

#[test]
fn missing_stage_handler_is_recorded() {
    let fx = Fixture::new(exercise(vec![stage(1, "essay", 10, Transition::end())]));
    let sub = fx.started();

    assert!(sub.has_internal_errors());
    assert_eq!(kinds(&sub), vec![LogEntryKind::Fail]);
    assert!(sub.log().entries()[0].event.text().unwrap().contains("essay"));
    assert_eq!(sub.visits().count(), 0);
}

#[test]
fn unknown_stage_in_path_is_a_configuration_error() {
    let fx = Fixture::new(two_stage_linear());
    let mut sub = fx.started();
    let v1 = current(&sub);
    fx.player().submit(&mut sub, v1, points(100)).unwrap();

    let shrunk = Fixture::new(exercise(vec![stage(1, "mc", 10, Transition::end())]));
    assert_eq!(
        shrunk.player().total_score(&sub),
        Err(PlayerError::UnknownStage { stage_id: StageId(2) })
    );
}

// ──────────────────────────────────────
// Manual results and exit
// ──────────────────────────────────────

#[test]
fn manual_result_overrides_automatic_points() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);
    player.submit(&mut sub, v1, points(100)).unwrap();
    let v2 = current(&sub);
    player.submit(&mut sub, v2, points(0)).unwrap();
    assert_eq!(sub.result_points(), 50);

    player
        .update_manual_result(
            &mut sub,
            v2,
            Some(ManualResult {
                points: 100,
                comment: Some("fair enough".into()),
            }),
        )
        .unwrap();
    assert_eq!(sub.result_points(), 100);

    player.update_manual_result(&mut sub, v2, None).unwrap();
    assert_eq!(sub.result_points(), 50);

    assert_eq!(
        player.update_manual_result(&mut sub, VisitId(42), None),
        Err(PlayerError::UnknownVisit { visit: VisitId(42) })
    );
}

#[test]
fn exit_only_logs() {
    let fx = Fixture::new(two_stage_linear());
    let player = fx.player();
    let mut sub = fx.started();
    let v1 = current(&sub);

    player.exit(&mut sub, v1).unwrap();
    assert_eq!(kinds(&sub), vec![LogEntryKind::Enter, LogEntryKind::Exit]);
    assert_eq!(current(&sub), v1);
    assert!(player.is_unprocessed(&sub));
}
