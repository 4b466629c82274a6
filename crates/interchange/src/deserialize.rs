//! Deserialization from interchange JSON bundles into typed structs.
//!
//! The main entry point is [`from_interchange`], which takes a
//! `&serde_json::Value` and produces an [`ExerciseBundle`].

use crate::types::*;
use std::collections::BTreeMap;
use std::fmt;

/// Errors during interchange JSON deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The bundle is missing a required top-level field.
    MissingField { field: String },
    /// A construct is missing a required field or is malformed.
    ConstructError {
        kind: String,
        id: String,
        message: String,
    },
    /// The bundle structure is invalid.
    InvalidBundle(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "bundle missing required field: '{}'", field)
            }
            InterchangeError::ConstructError { kind, id, message } => {
                write!(f, "{} '{}': {}", kind, id, message)
            }
            InterchangeError::InvalidBundle(msg) => {
                write!(f, "invalid bundle: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize an exercise interchange JSON bundle into typed structs.
///
/// Only structural checks happen here. Graph consistency (unknown targets,
/// duplicate ids) is validated when the player builds its `Exercise`.
pub fn from_interchange(bundle: &serde_json::Value) -> Result<ExerciseBundle, InterchangeError> {
    let id = bundle
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "id".to_string(),
        })?
        .to_string();

    let start_stage = bundle
        .get("start_stage")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "start_stage".to_string(),
        })?;

    let hint_malus = bundle
        .get("hint_malus")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let stages_arr = bundle
        .get("stages")
        .and_then(|s| s.as_array())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "stages".to_string(),
        })?;

    let mut stages = Vec::with_capacity(stages_arr.len());
    for obj in stages_arr {
        stages.push(parse_stage(obj)?);
    }

    let variables = match bundle.get("variables") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(parse_variable_declaration)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(InterchangeError::InvalidBundle(
                "'variables' must be an array".to_string(),
            ))
        }
    };

    let suffix_weights = parse_suffix_weights(bundle)?;

    Ok(ExerciseBundle {
        id,
        start_stage,
        hint_malus,
        variables,
        suffix_weights,
        stages,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &serde_json::Value, field: &str) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| InterchangeError::InvalidBundle(format!("missing '{}' field", field)))
}

fn optional_str(obj: &serde_json::Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn stage_error(id: u64, message: impl Into<String>) -> InterchangeError {
    InterchangeError::ConstructError {
        kind: "Stage".to_string(),
        id: id.to_string(),
        message: message.into(),
    }
}

fn parse_u32(obj: &serde_json::Value, field: &str, stage_id: u64) -> Result<u32, InterchangeError> {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| stage_error(stage_id, format!("'{}' must be a non-negative integer", field))),
    }
}

fn parse_variable_declaration(
    obj: &serde_json::Value,
) -> Result<VariableDeclarationConstruct, InterchangeError> {
    Ok(VariableDeclarationConstruct {
        name: required_str(obj, "name")?,
        initialization: required_str(obj, "initialization")?,
    })
}

fn parse_suffix_weights(
    bundle: &serde_json::Value,
) -> Result<Option<BTreeMap<u64, u32>>, InterchangeError> {
    let obj = match bundle.get("suffix_weights") {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(InterchangeError::InvalidBundle(
                "'suffix_weights' must be an object".to_string(),
            ))
        }
    };

    let mut weights = BTreeMap::new();
    for (key, value) in obj {
        let stage_id: u64 = key.parse().map_err(|_| {
            InterchangeError::InvalidBundle(format!("suffix weight key '{}' is not a stage id", key))
        })?;
        let weight = value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                InterchangeError::InvalidBundle(format!(
                    "suffix weight for stage {} must be a non-negative integer",
                    stage_id
                ))
            })?;
        weights.insert(stage_id, weight);
    }
    Ok(Some(weights))
}

fn parse_transition(
    obj: &serde_json::Value,
    stage_id: u64,
) -> Result<TransitionConstruct, InterchangeError> {
    let target = match obj.get("target") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| stage_error(stage_id, "transition target must be a stage id"))?,
        ),
    };
    let repeat = obj.get("repeat").and_then(|v| v.as_bool()).unwrap_or(false);
    if repeat && target.is_some() {
        return Err(stage_error(
            stage_id,
            "transition cannot both repeat and name a target",
        ));
    }

    Ok(TransitionConstruct {
        target,
        repeat,
        condition: optional_str(obj, "condition"),
        stage_expression: optional_str(obj, "stage_expression"),
    })
}

fn parse_transition_list(
    obj: &serde_json::Value,
    field: &str,
    stage_id: u64,
) -> Result<Vec<TransitionConstruct>, InterchangeError> {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|t| parse_transition(t, stage_id))
            .collect(),
        Some(_) => Err(stage_error(stage_id, format!("'{}' must be an array", field))),
    }
}

fn parse_update_list(
    updates: &serde_json::Value,
    hook: &str,
    stage_id: u64,
) -> Result<Vec<VariableUpdateConstruct>, InterchangeError> {
    match updates.get(hook) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|u| {
                Ok(VariableUpdateConstruct {
                    variable: required_str(u, "variable")?,
                    expression: required_str(u, "expression")?,
                })
            })
            .collect(),
        Some(_) => Err(stage_error(
            stage_id,
            format!("update hook '{}' must be an array", hook),
        )),
    }
}

fn parse_updates(
    obj: &serde_json::Value,
    stage_id: u64,
) -> Result<UpdateHooksConstruct, InterchangeError> {
    let updates = match obj.get("updates") {
        None | Some(serde_json::Value::Null) => return Ok(UpdateHooksConstruct::default()),
        Some(u) => u,
    };

    Ok(UpdateHooksConstruct {
        on_enter: parse_update_list(updates, "on_enter", stage_id)?,
        before_check: parse_update_list(updates, "before_check", stage_id)?,
        after_check: parse_update_list(updates, "after_check", stage_id)?,
        on_normal_exit: parse_update_list(updates, "on_normal_exit", stage_id)?,
        on_skip: parse_update_list(updates, "on_skip", stage_id)?,
        on_repeat: parse_update_list(updates, "on_repeat", stage_id)?,
    })
}

fn parse_hints(obj: &serde_json::Value, stage_id: u64) -> Result<Vec<HintConstruct>, InterchangeError> {
    match obj.get("hints") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|h| {
                Ok(HintConstruct {
                    text: required_str(h, "text")?,
                    malus: parse_u32(h, "malus", stage_id)?,
                })
            })
            .collect(),
        Some(_) => Err(stage_error(stage_id, "'hints' must be an array")),
    }
}

fn parse_stage(obj: &serde_json::Value) -> Result<StageConstruct, InterchangeError> {
    let id = obj
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| InterchangeError::InvalidBundle("stage missing numeric 'id'".to_string()))?;
    let kind = obj
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| stage_error(id, "missing 'kind' field"))?
        .to_string();

    let default_transition = obj
        .get("default_transition")
        .filter(|v| !v.is_null())
        .ok_or_else(|| stage_error(id, "missing 'default_transition'"))
        .and_then(|t| parse_transition(t, id))?;

    let order_index = match obj.get("order_index") {
        None | Some(serde_json::Value::Null) => 0,
        Some(v) => v
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| stage_error(id, "'order_index' must be an integer"))?,
    };

    Ok(StageConstruct {
        id,
        kind,
        weight: parse_u32(obj, "weight", id)?,
        order_index,
        allow_skip: obj
            .get("allow_skip")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        skip_message: optional_str(obj, "skip_message").unwrap_or_default(),
        must_wait_for_pending_jobs: obj
            .get("must_wait_for_pending_jobs")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
        hints: parse_hints(obj, id)?,
        default_transition,
        stage_transitions: parse_transition_list(obj, "stage_transitions", id)?,
        skip_transitions: parse_transition_list(obj, "skip_transitions", id)?,
        updates: parse_updates(obj, id)?,
        config: obj
            .get("config")
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    })
}
