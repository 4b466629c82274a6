//! Expression evaluator seam.
//!
//! The player never parses expressions itself. Guards, variable updates and
//! initialization expressions are handed to an [`Evaluator`] together with
//! an [`EvaluationContext`]. Feedback and hint texts may reference variables
//! with `[var=name]`, `[input=name]` and `[meta=name]` placeholders.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{Value, VariableStore};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The evaluator rejected or could not compute the expression.
    Failed { expression: String, message: String },
    /// The expression produced a value of the wrong type.
    TypeMismatch { expected: String, got: String },
    /// The evaluator does not know the expression.
    UnknownExpression { expression: String },
    /// The evaluator backend is unreachable.
    Unavailable { message: String },
}

impl fmt::Display for EvaluatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorError::Failed {
                expression,
                message,
            } => write!(f, "evaluation of '{}' failed: {}", expression, message),
            EvaluatorError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            EvaluatorError::UnknownExpression { expression } => {
                write!(f, "unknown expression: '{}'", expression)
            }
            EvaluatorError::Unavailable { message } => {
                write!(f, "evaluator unavailable: {}", message)
            }
        }
    }
}

impl std::error::Error for EvaluatorError {}

// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

/// Variables visible to one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    /// Exercise variables (current, or frozen at stage entry).
    pub exercise: VariableStore,
    /// Learner input of the current visit, as exposed by the stage handler.
    pub input: VariableStore,
    /// Meta information (attempt, hints, current result, ...).
    pub meta: VariableStore,
}

impl EvaluationContext {
    /// Look up `scope=name` where scope is `var`, `input` or `meta`.
    pub fn lookup(&self, scope: &str, name: &str) -> Option<&Value> {
        match scope {
            "var" => self.exercise.get(name),
            "input" => self.input.get(name),
            "meta" => self.meta.get(name),
            _ => None,
        }
    }

    /// Resolve a single `[scope=name]` reference.
    pub fn lookup_reference(&self, reference: &str) -> Option<&Value> {
        let inner = reference.strip_prefix('[')?.strip_suffix(']')?;
        let (scope, name) = inner.split_once('=')?;
        self.lookup(scope.trim(), name.trim())
    }

    /// Replace every resolvable `[scope=name]` in `text` with the value's
    /// display form. Unresolvable references are left untouched.
    pub fn resolve_placeholders(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            let candidate = &rest[open..];
            match candidate.find(']') {
                Some(close) => {
                    let reference = &candidate[..=close];
                    match self.lookup_reference(reference) {
                        Some(value) => out.push_str(&value.to_string()),
                        None => out.push_str(reference),
                    }
                    rest = &candidate[close + 1..];
                }
                None => {
                    out.push_str(candidate);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// Black-box expression evaluation service.
pub trait Evaluator: Send + Sync {
    /// Evaluate a value expression.
    fn evaluate(&self, expression: &str, context: &EvaluationContext)
        -> Result<Value, EvaluatorError>;

    /// Evaluate a guard. Absent or blank expressions are always true.
    fn evaluate_condition(
        &self,
        expression: Option<&str>,
        context: &EvaluationContext,
    ) -> Result<bool, EvaluatorError> {
        match expression.map(str::trim) {
            None | Some("") => Ok(true),
            Some(expr) => self.evaluate(expr, context)?.as_bool(),
        }
    }

    /// Fill variable placeholders in feedback or hint text.
    fn resolve_placeholders(&self, text: &str, context: &EvaluationContext) -> String {
        context.resolve_placeholders(text)
    }
}

// ──────────────────────────────────────────────
// StaticEvaluator
// ──────────────────────────────────────────────

type ExpressionFn = Arc<dyn Fn(&EvaluationContext) -> Result<Value, EvaluatorError> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Value(Value),
    Failure(String),
    Computed(ExpressionFn),
}

/// An evaluator backed by a fixed table of expressions.
///
/// Expressions not in the table are still answered when they are a single
/// `[scope=name]` reference, a boolean literal, or an integer literal.
/// Useful for testing and for exercises whose expressions are known ahead
/// of time.
#[derive(Clone, Default)]
pub struct StaticEvaluator {
    table: HashMap<String, Entry>,
}

impl StaticEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `expression` always evaluates to `value`.
    pub fn with_value(mut self, expression: impl Into<String>, value: impl Into<Value>) -> Self {
        self.table
            .insert(expression.into(), Entry::Value(value.into()));
        self
    }

    /// `expression` always fails with `message`.
    pub fn with_failure(mut self, expression: impl Into<String>, message: impl Into<String>) -> Self {
        self.table
            .insert(expression.into(), Entry::Failure(message.into()));
        self
    }

    /// `expression` is computed from the context on every call.
    pub fn with_fn<F>(mut self, expression: impl Into<String>, f: F) -> Self
    where
        F: Fn(&EvaluationContext) -> Result<Value, EvaluatorError> + Send + Sync + 'static,
    {
        self.table
            .insert(expression.into(), Entry::Computed(Arc::new(f)));
        self
    }
}

impl fmt::Debug for StaticEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.table.keys().collect();
        keys.sort();
        f.debug_struct("StaticEvaluator")
            .field("expressions", &keys)
            .finish()
    }
}

impl Evaluator for StaticEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Value, EvaluatorError> {
        let expression = expression.trim();
        if let Some(entry) = self.table.get(expression) {
            return match entry {
                Entry::Value(v) => Ok(v.clone()),
                Entry::Failure(message) => Err(EvaluatorError::Failed {
                    expression: expression.to_string(),
                    message: message.clone(),
                }),
                Entry::Computed(f) => f(context),
            };
        }

        if let Some(value) = context.lookup_reference(expression) {
            return Ok(value.clone());
        }
        match expression {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if let Ok(i) = expression.parse::<i64>() {
            return Ok(Value::Int(i));
        }

        Err(EvaluatorError::UnknownExpression {
            expression: expression.to_string(),
        })
    }
}
