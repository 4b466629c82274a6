//! Submission aggregate and stage visits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::exercise::StageId;
use super::values::VariableStore;
use crate::log::SubmissionLog;
use crate::scoring::{points_with_hint_malus, EffectivePoints, HintMalusType};

/// Identity of one stage visit within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub u64);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ──────────────────────────────────────────────
// Results and hints
// ──────────────────────────────────────────────

/// A grading result attached to a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub points: u32,
    /// Feedback shown to the learner. Placeholders are resolved on attach.
    pub public_comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_comment: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

impl CheckResult {
    pub fn new(points: u32, public_comment: impl Into<String>) -> Self {
        CheckResult {
            points,
            public_comment: public_comment.into(),
            internal_comment: None,
            is_error: false,
        }
    }

    /// A result reporting that grading itself failed.
    pub fn error(internal_comment: impl Into<String>) -> Self {
        CheckResult {
            points: 0,
            public_comment: String::new(),
            internal_comment: Some(internal_comment.into()),
            is_error: true,
        }
    }
}

/// Instructor-assigned points replacing the automatic result of a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualResult {
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GivenHint {
    pub text: String,
    pub malus: u32,
}

// ──────────────────────────────────────────────
// Stage visit
// ──────────────────────────────────────────────

/// One pass through a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVisit {
    pub id: VisitId,
    pub stage_id: StageId,
    /// Exercise variables as they were when the visit was entered.
    pub variables: VariableStore,
    /// Stage-type specific learner input.
    pub input: serde_json::Value,
    pub results: Vec<CheckResult>,
    /// Automatic points, maintained by the stage handler.
    pub points: u32,
    pub manual_result: Option<ManualResult>,
    pub hints: Vec<GivenHint>,
    /// 1-based, incremented on repeat and erase.
    pub attempt_count: u32,
    pub has_internal_errors: bool,
    pub has_pending_checks: bool,
}

impl StageVisit {
    pub fn new(id: VisitId, stage_id: StageId) -> Self {
        StageVisit {
            id,
            stage_id,
            variables: VariableStore::new(),
            input: serde_json::Value::Null,
            results: Vec::new(),
            points: 0,
            manual_result: None,
            hints: Vec::new(),
            attempt_count: 1,
            has_internal_errors: false,
            has_pending_checks: false,
        }
    }

    /// Sum of the maluses of all given hints, saturating at `u32::MAX`.
    pub fn cumulative_malus(&self) -> u32 {
        self.hints
            .iter()
            .fold(0u32, |acc, h| acc.saturating_add(h.malus))
    }

    /// Automatic points reduced by the hint malus.
    pub fn points_with_hint_malus(&self, mode: Option<HintMalusType>) -> u32 {
        points_with_hint_malus(self.points, self.cumulative_malus(), mode)
    }

    /// Points that count for scoring: the manual result if present.
    pub fn effective_points(&self, mode: Option<HintMalusType>) -> EffectivePoints {
        match &self.manual_result {
            Some(manual) => EffectivePoints::Manual(manual.points.min(100)),
            None => EffectivePoints::Automatic(self.points_with_hint_malus(mode)),
        }
    }
}

// ──────────────────────────────────────────────
// Submission
// ──────────────────────────────────────────────

/// Coarse state derived from the submission flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    InProgress,
    Completed,
    Errored,
}

/// Aggregate root of one attempt at an exercise.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub exercise_id: String,
    pub(crate) log: SubmissionLog,
    pub(crate) visits: BTreeMap<VisitId, StageVisit>,
    pub(crate) variables: VariableStore,
    pub(crate) is_completed: bool,
    pub(crate) has_internal_errors: bool,
    pub(crate) has_pending_stage_checks: bool,
    pub(crate) result_points: u32,
    /// Storage version this aggregate was loaded at.
    pub(crate) version: Option<i64>,
    /// Number of log entries already written to storage.
    pub(crate) stored_log_len: usize,
}

impl Submission {
    pub fn new(id: impl Into<String>, exercise_id: impl Into<String>) -> Self {
        Submission {
            id: id.into(),
            exercise_id: exercise_id.into(),
            log: SubmissionLog::new(),
            visits: BTreeMap::new(),
            variables: VariableStore::new(),
            is_completed: false,
            has_internal_errors: false,
            has_pending_stage_checks: false,
            result_points: 0,
            version: None,
            stored_log_len: 0,
        }
    }

    pub fn log(&self) -> &SubmissionLog {
        &self.log
    }

    pub fn visits(&self) -> impl Iterator<Item = &StageVisit> {
        self.visits.values()
    }

    pub fn visit(&self, id: VisitId) -> Option<&StageVisit> {
        self.visits.get(&id)
    }

    pub(crate) fn visit_mut(&mut self, id: VisitId) -> Option<&mut StageVisit> {
        self.visits.get_mut(&id)
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn has_internal_errors(&self) -> bool {
        self.has_internal_errors
    }

    pub fn has_pending_stage_checks(&self) -> bool {
        self.has_pending_stage_checks
    }

    /// Cached total score, 0 to 100.
    pub fn result_points(&self) -> u32 {
        self.result_points
    }

    /// Storage version, `None` until first saved.
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    pub fn state(&self) -> SubmissionState {
        if self.is_completed {
            SubmissionState::Completed
        } else if self.has_internal_errors {
            SubmissionState::Errored
        } else {
            SubmissionState::InProgress
        }
    }

    /// The visit referenced by the most recent ENTER, i.e. the open visit
    /// unless the submission is completed.
    pub fn current_visit(&self) -> Option<&StageVisit> {
        if self.is_completed {
            return None;
        }
        self.log
            .last_entered_visit()
            .and_then(|id| self.visits.get(&id))
    }

    pub(crate) fn allocate_visit_id(&self) -> VisitId {
        VisitId(self.visits.keys().next_back().map(|v| v.0 + 1).unwrap_or(1))
    }
}
