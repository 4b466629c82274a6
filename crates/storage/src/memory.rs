//! In-memory `SubmissionStorage` backend.
//!
//! Each snapshot works on a private copy of the committed tables. Commit
//! re-checks, per touched submission, that nobody else committed a new
//! version or log entry since the snapshot first touched it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{LogEntryRecord, StageVisitRecord, SubmissionRecord};
use crate::traits::SubmissionStorage;

#[derive(Debug, Clone, Default)]
struct Tables {
    submissions: BTreeMap<String, SubmissionRecord>,
    logs: BTreeMap<String, Vec<LogEntryRecord>>,
    visits: BTreeMap<String, BTreeMap<u64, StageVisitRecord>>,
}

impl Tables {
    fn version_of(&self, submission_id: &str) -> Option<i64> {
        self.submissions.get(submission_id).map(|s| s.version)
    }

    fn log_len(&self, submission_id: &str) -> u64 {
        self.logs
            .get(submission_id)
            .map(|l| l.len() as u64)
            .unwrap_or(0)
    }
}

/// Committed state as seen by a snapshot when it first touched a submission.
#[derive(Debug, Clone, Copy)]
struct Base {
    version: Option<i64>,
    log_len: u64,
}

/// Transaction handle for [`InMemoryStorage`].
#[derive(Debug)]
pub struct InMemorySnapshot {
    staged: Tables,
    touched: BTreeMap<String, Base>,
}

impl InMemorySnapshot {
    fn touch(&mut self, submission_id: &str) {
        if !self.touched.contains_key(submission_id) {
            let base = Base {
                version: self.staged.version_of(submission_id),
                log_len: self.staged.log_len(submission_id),
            };
            self.touched.insert(submission_id.to_string(), base);
        }
    }
}

/// Thread-safe in-memory storage, cheap to clone (shared state).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    committed: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.committed
            .lock()
            .map_err(|_| StorageError::Backend("in-memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl SubmissionStorage for InMemoryStorage {
    type Snapshot = InMemorySnapshot;

    async fn begin_snapshot(&self) -> Result<InMemorySnapshot, StorageError> {
        let staged = self.lock()?.clone();
        Ok(InMemorySnapshot {
            staged,
            touched: BTreeMap::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: InMemorySnapshot) -> Result<(), StorageError> {
        let mut committed = self.lock()?;

        for (submission_id, base) in &snapshot.touched {
            let current_version = committed.version_of(submission_id);
            if current_version != base.version {
                return Err(StorageError::ConcurrentConflict {
                    submission_id: submission_id.clone(),
                    expected_version: base.version.unwrap_or(-1),
                });
            }
            let current_len = committed.log_len(submission_id);
            if current_len != base.log_len {
                return Err(StorageError::LogConflict {
                    submission_id: submission_id.clone(),
                    expected_sequence: base.log_len,
                    got_sequence: current_len,
                });
            }
        }

        for submission_id in snapshot.touched.keys() {
            if let Some(record) = snapshot.staged.submissions.get(submission_id) {
                committed
                    .submissions
                    .insert(submission_id.clone(), record.clone());
            }
            if let Some(log) = snapshot.staged.logs.get(submission_id) {
                committed.logs.insert(submission_id.clone(), log.clone());
            }
            if let Some(visits) = snapshot.staged.visits.get(submission_id) {
                committed.visits.insert(submission_id.clone(), visits.clone());
            }
        }

        tracing::debug!(
            submissions = snapshot.touched.len(),
            "committed in-memory snapshot"
        );
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: InMemorySnapshot) -> Result<(), StorageError> {
        tracing::debug!(
            submissions = snapshot.touched.len(),
            "aborted in-memory snapshot"
        );
        Ok(())
    }

    async fn insert_submission(
        &self,
        snapshot: &mut InMemorySnapshot,
        record: SubmissionRecord,
    ) -> Result<(), StorageError> {
        let submission_id = record.submission_id.clone();
        if snapshot.staged.submissions.contains_key(&submission_id) {
            return Err(StorageError::AlreadyExists { submission_id });
        }
        snapshot.touch(&submission_id);
        snapshot.staged.submissions.insert(
            submission_id,
            SubmissionRecord {
                version: 0,
                ..record
            },
        );
        Ok(())
    }

    async fn get_submission_for_update(
        &self,
        snapshot: &mut InMemorySnapshot,
        submission_id: &str,
    ) -> Result<SubmissionRecord, StorageError> {
        let record = snapshot
            .staged
            .submissions
            .get(submission_id)
            .cloned()
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            })?;
        snapshot.touch(submission_id);
        Ok(record)
    }

    async fn update_submission(
        &self,
        snapshot: &mut InMemorySnapshot,
        expected_version: i64,
        record: SubmissionRecord,
    ) -> Result<i64, StorageError> {
        let submission_id = record.submission_id.clone();
        snapshot.touch(&submission_id);
        let stored = snapshot
            .staged
            .submissions
            .get_mut(&submission_id)
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: submission_id.clone(),
            })?;
        if stored.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                submission_id,
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        *stored = SubmissionRecord {
            version: new_version,
            ..record
        };
        Ok(new_version)
    }

    async fn append_log_entries(
        &self,
        snapshot: &mut InMemorySnapshot,
        submission_id: &str,
        entries: Vec<LogEntryRecord>,
    ) -> Result<(), StorageError> {
        if !snapshot.staged.submissions.contains_key(submission_id) {
            return Err(StorageError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            });
        }
        snapshot.touch(submission_id);
        let log = snapshot
            .staged
            .logs
            .entry(submission_id.to_string())
            .or_default();

        let mut expected = log.len() as u64;
        for entry in &entries {
            if entry.sequence != expected || entry.submission_id != submission_id {
                return Err(StorageError::LogConflict {
                    submission_id: submission_id.to_string(),
                    expected_sequence: expected,
                    got_sequence: entry.sequence,
                });
            }
            expected += 1;
        }
        log.extend(entries);
        Ok(())
    }

    async fn upsert_stage_visit(
        &self,
        snapshot: &mut InMemorySnapshot,
        record: StageVisitRecord,
    ) -> Result<(), StorageError> {
        if !snapshot.staged.submissions.contains_key(&record.submission_id) {
            return Err(StorageError::SubmissionNotFound {
                submission_id: record.submission_id,
            });
        }
        snapshot.touch(&record.submission_id);
        snapshot
            .staged
            .visits
            .entry(record.submission_id.clone())
            .or_default()
            .insert(record.visit_id, record);
        Ok(())
    }

    async fn get_submission(&self, submission_id: &str) -> Result<SubmissionRecord, StorageError> {
        self.lock()?
            .submissions
            .get(submission_id)
            .cloned()
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            })
    }

    async fn get_log(&self, submission_id: &str) -> Result<Vec<LogEntryRecord>, StorageError> {
        let tables = self.lock()?;
        if !tables.submissions.contains_key(submission_id) {
            return Err(StorageError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            });
        }
        Ok(tables.logs.get(submission_id).cloned().unwrap_or_default())
    }

    async fn get_stage_visits(
        &self,
        submission_id: &str,
    ) -> Result<Vec<StageVisitRecord>, StorageError> {
        let tables = self.lock()?;
        if !tables.submissions.contains_key(submission_id) {
            return Err(StorageError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            });
        }
        Ok(tables
            .visits
            .get(submission_id)
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_submissions(
        &self,
        exercise_id: Option<&str>,
    ) -> Result<Vec<SubmissionRecord>, StorageError> {
        Ok(self
            .lock()?
            .submissions
            .values()
            .filter(|s| exercise_id.map_or(true, |e| s.exercise_id == e))
            .cloned()
            .collect())
    }
}
