//! Typed structs representing the exercise interchange JSON schema.
//!
//! Stage-type specific configuration is kept as `serde_json::Value`; only
//! the stage handler registered for that type interprets it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level interchange bundle describing one exercise.
#[derive(Debug, Clone)]
pub struct ExerciseBundle {
    /// Exercise identifier.
    pub id: String,
    /// Id of the designated start stage.
    pub start_stage: u64,
    /// Hint malus mode name (`cut_actual`, `cut_maximum`), if any.
    pub hint_malus: Option<String>,
    /// Declared exercise variables with their initialization expressions.
    pub variables: Vec<VariableDeclarationConstruct>,
    /// Precomputed suffix weights keyed by stage id, if the authoring tool
    /// shipped them.
    pub suffix_weights: Option<BTreeMap<u64, u32>>,
    pub stages: Vec<StageConstruct>,
}

// ── Variables ───────────────────────────────────────────────────────

/// A declared exercise variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableDeclarationConstruct {
    pub name: String,
    pub initialization: String,
}

/// One `(variable, expression)` update statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableUpdateConstruct {
    pub variable: String,
    pub expression: String,
}

/// The six lifecycle hook lists of a stage. Absent lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateHooksConstruct {
    pub on_enter: Vec<VariableUpdateConstruct>,
    pub before_check: Vec<VariableUpdateConstruct>,
    pub after_check: Vec<VariableUpdateConstruct>,
    pub on_normal_exit: Vec<VariableUpdateConstruct>,
    pub on_skip: Vec<VariableUpdateConstruct>,
    pub on_repeat: Vec<VariableUpdateConstruct>,
}

// ── Stage ───────────────────────────────────────────────────────────

/// A transition edge as written in the bundle.
///
/// `target: None` with `repeat: false` means "end of exercise".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionConstruct {
    pub target: Option<u64>,
    pub repeat: bool,
    pub condition: Option<String>,
    pub stage_expression: Option<String>,
}

/// A hint offered by a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HintConstruct {
    pub text: String,
    pub malus: u32,
}

/// A Stage construct from interchange JSON.
#[derive(Debug, Clone)]
pub struct StageConstruct {
    pub id: u64,
    /// Stage type tag, resolved by the player's handler registry.
    pub kind: String,
    pub weight: u32,
    pub order_index: i32,
    pub allow_skip: bool,
    pub skip_message: String,
    pub must_wait_for_pending_jobs: bool,
    pub hints: Vec<HintConstruct>,
    pub default_transition: TransitionConstruct,
    pub stage_transitions: Vec<TransitionConstruct>,
    pub skip_transitions: Vec<TransitionConstruct>,
    pub updates: UpdateHooksConstruct,
    /// Stage-type specific payload.
    pub config: serde_json::Value,
}

impl StageConstruct {
    /// All transitions of the stage, default first.
    pub fn transitions(&self) -> impl Iterator<Item = &TransitionConstruct> {
        std::iter::once(&self.default_transition)
            .chain(self.stage_transitions.iter())
            .chain(self.skip_transitions.iter())
    }
}
