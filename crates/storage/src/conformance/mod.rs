//! Backend-agnostic checks every `SubmissionStorage` must pass.
//!
//! Four groups of cases, each run against a fresh backend:
//!
//! - `init`: creating submissions, duplicates, lookups of unknown ids
//! - `log`: append-only log with gap-free sequence numbers
//! - `snapshot`: nothing is visible before commit, abort discards writes
//! - `version`: stale versions and interleaved snapshots are rejected
//!
//! A backend crate wires the suite into its own tests:
//!
//! ```ignore
//! #[tokio::test]
//! async fn sqlite_backend_conforms() {
//!     let report = assess_storage::conformance::run_conformance_suite(|| async {
//!         SqliteStorage::open_in_memory().await
//!     })
//!     .await;
//!     assert!(report.is_clean(), "{report}");
//! }
//! ```

mod init;
mod log;
mod snapshot;
mod version;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::record::{LogEntryRecord, StageVisitRecord, SubmissionRecord};
use crate::SubmissionStorage;

/// Outcome of one conformance case.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Group the case belongs to: `init`, `log`, `snapshot` or `version`.
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Why the case failed; `None` when it passed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, outcome: Result<(), String>) -> Self {
        TestResult {
            category: category.into(),
            name: name.into(),
            passed: outcome.is_ok(),
            message: outcome.err(),
        }
    }
}

/// Every case outcome of one suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConformanceReport {
    fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        ConformanceReport {
            total: results.len(),
            failed: results.len() - passed,
            passed,
            results,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut per_category: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for r in &self.results {
            let (passed, total) = per_category.entry(&r.category).or_default();
            *total += 1;
            if r.passed {
                *passed += 1;
            }
        }

        writeln!(f, "storage conformance: {} of {} cases passed", self.passed, self.total)?;
        for (category, (passed, total)) in per_category {
            writeln!(f, "  {category:<9} {passed}/{total}")?;
        }
        for r in self.failures() {
            let reason = r.message.as_deref().unwrap_or("no reason given");
            writeln!(f, "  failed {}::{}: {}", r.category, r.name, reason)?;
        }
        Ok(())
    }
}

/// Run every case, each against a backend freshly built by `factory`.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: SubmissionStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = init::run_init_tests(&factory).await;
    results.extend(log::run_log_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);

    ConformanceReport::from_results(results)
}

// ── Record builders ────────────────────────────────────────────

pub(crate) fn make_submission(submission_id: &str, exercise_id: &str) -> SubmissionRecord {
    SubmissionRecord {
        submission_id: submission_id.to_string(),
        exercise_id: exercise_id.to_string(),
        version: 0,
        is_completed: false,
        has_internal_errors: false,
        has_pending_stage_checks: false,
        result_points: 0,
        variables: serde_json::json!({}),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

fn make_log_entry(submission_id: &str, sequence: u64, kind: &str) -> LogEntryRecord {
    LogEntryRecord {
        submission_id: submission_id.to_string(),
        sequence,
        kind: kind.to_string(),
        visit_id: Some(1),
        recorded_at: "2025-01-01T00:00:30Z".to_string(),
        payload: serde_json::json!({ "type": kind, "visit": 1 }),
    }
}

fn make_stage_visit(submission_id: &str, visit_id: u64, stage_id: u64) -> StageVisitRecord {
    StageVisitRecord {
        submission_id: submission_id.to_string(),
        visit_id,
        stage_id,
        payload: serde_json::json!({ "attempt_count": 1 }),
    }
}

/// Insert and commit a fresh submission.
async fn seed_submission<S: SubmissionStorage>(s: &S, submission_id: &str) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_submission(&mut snap, make_submission(submission_id, "exercise-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}
