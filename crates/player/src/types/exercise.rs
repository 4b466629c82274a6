//! Exercise graph: stages, transitions, update hooks, hints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::PlayerError;
use crate::scoring::HintMalusType;
use crate::suffix::SuffixWeights;

/// Stable numeric stage identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub u64);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ──────────────────────────────────────────────
// Transitions
// ──────────────────────────────────────────────

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget {
    Stage(StageId),
    /// End of exercise.
    End,
    /// Fresh visit of the same stage, carrying hints and attempt count.
    Repeat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: TransitionTarget,
    /// Guard expression; absent or blank means always true.
    pub condition: Option<String>,
    /// Stage-type specific eligibility expression.
    pub stage_expression: Option<String>,
}

impl Transition {
    pub fn to(target: TransitionTarget) -> Self {
        Transition {
            target,
            condition: None,
            stage_expression: None,
        }
    }

    pub fn to_stage(stage_id: StageId) -> Self {
        Self::to(TransitionTarget::Stage(stage_id))
    }

    pub fn end() -> Self {
        Self::to(TransitionTarget::End)
    }

    pub fn repeat() -> Self {
        Self::to(TransitionTarget::Repeat)
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_stage_expression(mut self, expression: impl Into<String>) -> Self {
        self.stage_expression = Some(expression.into());
        self
    }

    pub fn is_repeat(&self) -> bool {
        self.target == TransitionTarget::Repeat
    }
}

// ──────────────────────────────────────────────
// Variable updates
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableUpdate {
    pub variable: String,
    pub expression: String,
}

impl VariableUpdate {
    pub fn new(variable: impl Into<String>, expression: impl Into<String>) -> Self {
        VariableUpdate {
            variable: variable.into(),
            expression: expression.into(),
        }
    }
}

/// Declared exercise variable with its initialization expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub name: String,
    pub initialization: String,
}

/// Lifecycle points at which a stage runs variable updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateHook {
    OnEnter,
    BeforeCheck,
    AfterCheck,
    OnNormalExit,
    OnSkip,
    OnRepeat,
}

impl UpdateHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateHook::OnEnter => "on-enter",
            UpdateHook::BeforeCheck => "before-check",
            UpdateHook::AfterCheck => "after-check",
            UpdateHook::OnNormalExit => "on-normal-exit",
            UpdateHook::OnSkip => "on-skip",
            UpdateHook::OnRepeat => "on-repeat",
        }
    }
}

impl fmt::Display for UpdateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageUpdates {
    pub on_enter: Vec<VariableUpdate>,
    pub before_check: Vec<VariableUpdate>,
    pub after_check: Vec<VariableUpdate>,
    pub on_normal_exit: Vec<VariableUpdate>,
    pub on_skip: Vec<VariableUpdate>,
    pub on_repeat: Vec<VariableUpdate>,
}

impl StageUpdates {
    pub fn for_hook(&self, hook: UpdateHook) -> &[VariableUpdate] {
        match hook {
            UpdateHook::OnEnter => &self.on_enter,
            UpdateHook::BeforeCheck => &self.before_check,
            UpdateHook::AfterCheck => &self.after_check,
            UpdateHook::OnNormalExit => &self.on_normal_exit,
            UpdateHook::OnSkip => &self.on_skip,
            UpdateHook::OnRepeat => &self.on_repeat,
        }
    }

    pub fn for_hook_mut(&mut self, hook: UpdateHook) -> &mut Vec<VariableUpdate> {
        match hook {
            UpdateHook::OnEnter => &mut self.on_enter,
            UpdateHook::BeforeCheck => &mut self.before_check,
            UpdateHook::AfterCheck => &mut self.after_check,
            UpdateHook::OnNormalExit => &mut self.on_normal_exit,
            UpdateHook::OnSkip => &mut self.on_skip,
            UpdateHook::OnRepeat => &mut self.on_repeat,
        }
    }
}

// ──────────────────────────────────────────────
// Stage
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHint {
    pub text: String,
    pub malus: u32,
}

/// A node of the exercise graph.
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,
    /// Stage type tag, resolved through the handler registry.
    pub kind: String,
    pub weight: u32,
    pub order_index: i32,
    pub default_transition: Transition,
    pub stage_transitions: Vec<Transition>,
    pub skip_transitions: Vec<Transition>,
    pub updates: StageUpdates,
    pub allow_skip: bool,
    pub skip_message: String,
    pub must_wait_for_pending_jobs: bool,
    pub hints: Vec<StageHint>,
    /// Stage-type specific payload, interpreted by the handler.
    pub config: serde_json::Value,
}

impl Stage {
    /// A stage with no conditional transitions, updates, or hints.
    pub fn new(id: StageId, kind: impl Into<String>, weight: u32, default_transition: Transition) -> Self {
        Stage {
            id,
            kind: kind.into(),
            weight,
            order_index: 0,
            default_transition,
            stage_transitions: Vec::new(),
            skip_transitions: Vec::new(),
            updates: StageUpdates::default(),
            allow_skip: false,
            skip_message: String::new(),
            must_wait_for_pending_jobs: true,
            hints: Vec::new(),
            config: serde_json::Value::Null,
        }
    }

    /// All transitions, default first.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        std::iter::once(&self.default_transition)
            .chain(self.stage_transitions.iter())
            .chain(self.skip_transitions.iter())
    }

    /// True if some transition ends the exercise.
    pub fn is_end_stage(&self) -> bool {
        self.transitions()
            .any(|t| t.target == TransitionTarget::End)
    }

    /// True if some transition leads to `target`.
    pub fn leads_to(&self, target: StageId) -> bool {
        self.transitions()
            .any(|t| t.target == TransitionTarget::Stage(target))
    }
}

// ──────────────────────────────────────────────
// Exercise
// ──────────────────────────────────────────────

/// A validated exercise graph with indexed stage lookup.
#[derive(Debug, Clone)]
pub struct Exercise {
    pub id: String,
    pub start_stage: StageId,
    pub variables: Vec<VariableDeclaration>,
    pub hint_malus: Option<HintMalusType>,
    stages: Vec<Stage>,
    stage_index: HashMap<StageId, usize>,
    suffix_weights: SuffixWeights,
}

impl Exercise {
    /// Build and validate an exercise. Suffix weights are generated from the
    /// graph unless replaced with [`Exercise::with_suffix_weights`].
    pub fn new(
        id: impl Into<String>,
        start_stage: StageId,
        stages: Vec<Stage>,
    ) -> Result<Self, PlayerError> {
        let id = id.into();
        let mut stage_index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if stage_index.insert(stage.id, i).is_some() {
                return Err(invalid(format!("duplicate stage id {}", stage.id)));
            }
        }

        if !stage_index.contains_key(&start_stage) {
            return Err(invalid(format!("start stage {} is not defined", start_stage)));
        }

        for stage in &stages {
            for transition in stage.transitions() {
                if let TransitionTarget::Stage(target) = transition.target {
                    if !stage_index.contains_key(&target) {
                        return Err(invalid(format!(
                            "stage {} has a transition to unknown stage {}",
                            stage.id, target
                        )));
                    }
                }
            }
        }

        let suffix_weights = SuffixWeights::generate(&stages);

        Ok(Exercise {
            id,
            start_stage,
            variables: Vec::new(),
            hint_malus: None,
            stages,
            stage_index,
            suffix_weights,
        })
    }

    pub fn with_variables(mut self, variables: Vec<VariableDeclaration>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_hint_malus(mut self, hint_malus: Option<HintMalusType>) -> Self {
        self.hint_malus = hint_malus;
        self
    }

    /// Replace the generated suffix weights with a precomputed table.
    pub fn with_suffix_weights(mut self, suffix_weights: SuffixWeights) -> Self {
        self.suffix_weights = suffix_weights;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stage_index.get(&id).map(|&i| &self.stages[i])
    }

    /// Look up a stage, treating an unknown id as a configuration error.
    pub fn require_stage(&self, id: StageId) -> Result<&Stage, PlayerError> {
        self.stage(id)
            .ok_or(PlayerError::UnknownStage { stage_id: id })
    }

    pub fn suffix_weights(&self) -> &SuffixWeights {
        &self.suffix_weights
    }

    /// Deserialize an exercise from interchange JSON.
    pub fn from_interchange(bundle: &serde_json::Value) -> Result<Self, PlayerError> {
        let bundle = assess_interchange::from_interchange(bundle).map_err(|e| invalid(e.to_string()))?;
        Self::from_bundle(bundle)
    }

    /// Convert an already parsed interchange bundle.
    pub fn from_bundle(bundle: assess_interchange::ExerciseBundle) -> Result<Self, PlayerError> {
        let hint_malus = bundle
            .hint_malus
            .as_deref()
            .map(|s| s.parse::<HintMalusType>())
            .transpose()
            .map_err(invalid)?;

        let stages = bundle.stages.into_iter().map(stage_from_construct).collect();
        let variables = bundle
            .variables
            .into_iter()
            .map(|v| VariableDeclaration {
                name: v.name,
                initialization: v.initialization,
            })
            .collect();

        let mut exercise = Exercise::new(bundle.id, StageId(bundle.start_stage), stages)?
            .with_variables(variables)
            .with_hint_malus(hint_malus);

        if let Some(weights) = bundle.suffix_weights {
            exercise = exercise.with_suffix_weights(
                weights
                    .into_iter()
                    .map(|(stage, weight)| (StageId(stage), weight))
                    .collect(),
            );
        }
        Ok(exercise)
    }
}

fn invalid(message: impl Into<String>) -> PlayerError {
    PlayerError::InvalidExercise {
        message: message.into(),
    }
}

fn transition_from_construct(t: assess_interchange::TransitionConstruct) -> Transition {
    let target = match (t.repeat, t.target) {
        (true, _) => TransitionTarget::Repeat,
        (false, Some(id)) => TransitionTarget::Stage(StageId(id)),
        (false, None) => TransitionTarget::End,
    };
    Transition {
        target,
        condition: t.condition,
        stage_expression: t.stage_expression,
    }
}

fn updates_from_construct(list: Vec<assess_interchange::VariableUpdateConstruct>) -> Vec<VariableUpdate> {
    list.into_iter()
        .map(|u| VariableUpdate::new(u.variable, u.expression))
        .collect()
}

fn stage_from_construct(s: assess_interchange::StageConstruct) -> Stage {
    Stage {
        id: StageId(s.id),
        kind: s.kind,
        weight: s.weight,
        order_index: s.order_index,
        default_transition: transition_from_construct(s.default_transition),
        stage_transitions: s
            .stage_transitions
            .into_iter()
            .map(transition_from_construct)
            .collect(),
        skip_transitions: s
            .skip_transitions
            .into_iter()
            .map(transition_from_construct)
            .collect(),
        updates: StageUpdates {
            on_enter: updates_from_construct(s.updates.on_enter),
            before_check: updates_from_construct(s.updates.before_check),
            after_check: updates_from_construct(s.updates.after_check),
            on_normal_exit: updates_from_construct(s.updates.on_normal_exit),
            on_skip: updates_from_construct(s.updates.on_skip),
            on_repeat: updates_from_construct(s.updates.on_repeat),
        },
        allow_skip: s.allow_skip,
        skip_message: s.skip_message,
        must_wait_for_pending_jobs: s.must_wait_for_pending_jobs,
        hints: s
            .hints
            .into_iter()
            .map(|h| StageHint {
                text: h.text,
                malus: h.malus,
            })
            .collect(),
        config: s.config,
    }
}
