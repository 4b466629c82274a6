//! Variable update pipeline.
//!
//! Builds evaluation contexts for a submission and applies the update
//! statements a stage declares for each lifecycle hook.

use tracing::warn;

use crate::evaluator::{EvaluationContext, Evaluator, EvaluatorError};
use crate::handler::StageHandler;
use crate::log::LogEvent;
use crate::scoring::HintMalusType;
use crate::types::{
    Stage, StageVisit, Submission, UpdateHook, Value, VariableDeclaration, VariableStore, VisitId,
};

/// Assemble the variables visible to an evaluation.
///
/// Exercise variables come from the submission's current store, or from the
/// visit's entry snapshot when `use_visit_snapshot` is set. Input and extra
/// meta variables come from the stage handler. When a visit is given the
/// meta variables `stageHints`, `stageCurrentResult` and
/// `stageCurrentAttempt` are always present.
pub fn prepare_context(
    submission: &Submission,
    visit: Option<&StageVisit>,
    handler: Option<&dyn StageHandler>,
    hint_malus: Option<HintMalusType>,
    use_visit_snapshot: bool,
) -> EvaluationContext {
    let mut context = EvaluationContext::default();

    context.exercise = match (visit, use_visit_snapshot) {
        (Some(visit), true) => visit.variables.snapshot(),
        _ => submission.variables().snapshot(),
    };

    if let Some(visit) = visit {
        if let Some(handler) = handler {
            context.input = handler.input_variables(visit);
            context.meta = handler.meta_variables(visit);
        }
        context
            .meta
            .set("stageHints", Value::Int(visit.hints.len() as i64));
        context.meta.set(
            "stageCurrentResult",
            Value::Int(i64::from(visit.points_with_hint_malus(hint_malus))),
        );
        context.meta.set(
            "stageCurrentAttempt",
            Value::Int(i64::from(visit.attempt_count)),
        );
    }

    context
}

/// Apply the updates `stage` declares for `hook`, in order.
///
/// Each successful update is written to the submission, mirrored into
/// `context` so later statements see it, and logged as a VAR_UPDATE. The
/// first failure logs one FAIL entry, marks the submission as errored and
/// stops the batch; updates already applied stay applied.
///
/// Returns `false` if an update failed.
pub fn apply_updates(
    submission: &mut Submission,
    visit: VisitId,
    stage: &Stage,
    hook: UpdateHook,
    context: &mut EvaluationContext,
    evaluator: &dyn Evaluator,
) -> bool {
    for update in stage.updates.for_hook(hook) {
        match evaluator.evaluate(&update.expression, context) {
            Ok(value) => {
                context.exercise.set(update.variable.clone(), value.clone());
                submission.variables.set(update.variable.clone(), value.clone());
                submission.log.append(LogEvent::VarUpdate {
                    visit,
                    variable: update.variable.clone(),
                    value,
                });
            }
            Err(e) => {
                warn!(
                    submission = %submission.id,
                    stage = %stage.id,
                    visit = %visit,
                    hook = %hook,
                    variable = %update.variable,
                    error = %e,
                    "variable update failed"
                );
                submission.log.append(LogEvent::Fail {
                    visit: Some(visit),
                    message: format!(
                        "Update failed for variables with message '{}' (variable '{}' in stage {})",
                        e, update.variable, stage.id
                    ),
                });
                submission.has_internal_errors = true;
                return false;
            }
        }
    }
    true
}

/// Evaluate the exercise's variable declarations in order.
///
/// Later declarations see the values of earlier ones. Nothing is returned
/// unless every declaration evaluated.
pub fn initialize_variables(
    declarations: &[VariableDeclaration],
    evaluator: &dyn Evaluator,
) -> Result<VariableStore, EvaluatorError> {
    let mut context = EvaluationContext::default();
    for declaration in declarations {
        let value = evaluator.evaluate(&declaration.initialization, &context)?;
        context.exercise.set(declaration.name.clone(), value);
    }
    Ok(context.exercise)
}
