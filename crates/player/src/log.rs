//! Append-only submission event log.
//!
//! Every state change of a submission is recorded as a [`LogEvent`]. The
//! log is the sole source of truth for path reconstruction; entries are
//! never mutated or removed once appended.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::types::{CheckResult, Value, VisitId};

/// Flat entry type, as stored and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEntryKind {
    Enter,
    Submit,
    Skip,
    Hint,
    Repeat,
    Erase,
    Check,
    Fail,
    VarUpdate,
    Exit,
    End,
}

impl LogEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryKind::Enter => "ENTER",
            LogEntryKind::Submit => "SUBMIT",
            LogEntryKind::Skip => "SKIP",
            LogEntryKind::Hint => "HINT",
            LogEntryKind::Repeat => "REPEAT",
            LogEntryKind::Erase => "ERASE",
            LogEntryKind::Check => "CHECK",
            LogEntryKind::Fail => "FAIL",
            LogEntryKind::VarUpdate => "VAR_UPDATE",
            LogEntryKind::Exit => "EXIT",
            LogEntryKind::End => "END",
        }
    }
}

impl fmt::Display for LogEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened, with the payload each entry type carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEvent {
    Enter { visit: VisitId },
    Submit { visit: VisitId },
    Skip { visit: VisitId },
    Hint { visit: VisitId, text: String },
    Repeat { visit: VisitId },
    Erase { visit: VisitId },
    Check { visit: VisitId, result: CheckResult },
    /// `visit` is `None` for submission-level failures (initialization,
    /// missing stage handler).
    Fail {
        visit: Option<VisitId>,
        message: String,
    },
    VarUpdate {
        visit: VisitId,
        variable: String,
        value: Value,
    },
    Exit { visit: VisitId },
    End,
}

impl LogEvent {
    pub fn kind(&self) -> LogEntryKind {
        match self {
            LogEvent::Enter { .. } => LogEntryKind::Enter,
            LogEvent::Submit { .. } => LogEntryKind::Submit,
            LogEvent::Skip { .. } => LogEntryKind::Skip,
            LogEvent::Hint { .. } => LogEntryKind::Hint,
            LogEvent::Repeat { .. } => LogEntryKind::Repeat,
            LogEvent::Erase { .. } => LogEntryKind::Erase,
            LogEvent::Check { .. } => LogEntryKind::Check,
            LogEvent::Fail { .. } => LogEntryKind::Fail,
            LogEvent::VarUpdate { .. } => LogEntryKind::VarUpdate,
            LogEvent::Exit { .. } => LogEntryKind::Exit,
            LogEvent::End => LogEntryKind::End,
        }
    }

    /// The stage visit this entry concerns, if any.
    pub fn visit(&self) -> Option<VisitId> {
        match self {
            LogEvent::Enter { visit }
            | LogEvent::Submit { visit }
            | LogEvent::Skip { visit }
            | LogEvent::Hint { visit, .. }
            | LogEvent::Repeat { visit }
            | LogEvent::Erase { visit }
            | LogEvent::Check { visit, .. }
            | LogEvent::VarUpdate { visit, .. }
            | LogEvent::Exit { visit } => Some(*visit),
            LogEvent::Fail { visit, .. } => *visit,
            LogEvent::End => None,
        }
    }

    /// Human-readable payload text, as shown in the submission protocol.
    pub fn text(&self) -> Option<String> {
        match self {
            LogEvent::Hint { text, .. } => Some(text.clone()),
            LogEvent::Fail { message, .. } => Some(message.clone()),
            LogEvent::VarUpdate {
                variable, value, ..
            } => Some(format!("{} = {}", variable, value)),
            _ => None,
        }
    }
}

/// One appended log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log, the ordering key.
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub event: LogEvent,
}

impl LogEntry {
    pub fn kind(&self) -> LogEntryKind {
        self.event.kind()
    }
}

/// Ordered, append-only sequence of [`LogEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionLog {
    entries: Vec<LogEntry>,
}

impl SubmissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored entries, checking their sequence numbers.
    pub(crate) fn from_entries(entries: Vec<LogEntry>) -> Result<Self, String> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.sequence != i as u64 {
                return Err(format!(
                    "log entry at position {} has sequence {}",
                    i, entry.sequence
                ));
            }
        }
        Ok(SubmissionLog { entries })
    }

    /// Append an event stamped with the current time.
    pub fn append(&mut self, event: LogEvent) -> &LogEntry {
        let entry = LogEntry {
            sequence: self.entries.len() as u64,
            timestamp: OffsetDateTime::now_utc(),
            event,
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visit referenced by the most recent ENTER.
    pub fn last_entered_visit(&self) -> Option<VisitId> {
        self.entries.iter().rev().find_map(|e| match e.event {
            LogEvent::Enter { visit } => Some(visit),
            _ => None,
        })
    }

    pub fn contains_kind(&self, kind: LogEntryKind) -> bool {
        self.entries.iter().any(|e| e.kind() == kind)
    }

    /// Count of entries of one kind concerning `visit`.
    pub fn count_for_visit(&self, visit: VisitId, kind: LogEntryKind) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind() == kind && e.event.visit() == Some(visit))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_sequence_numbers() {
        let mut log = SubmissionLog::new();
        log.append(LogEvent::Enter { visit: VisitId(1) });
        let entry = log.append(LogEvent::Submit { visit: VisitId(1) });
        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.kind(), LogEntryKind::Submit);
        assert_eq!(log.len(), 2);
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }

    #[test]
    fn last_entered_visit_skips_other_kinds() {
        let mut log = SubmissionLog::new();
        assert_eq!(log.last_entered_visit(), None);
        log.append(LogEvent::Enter { visit: VisitId(1) });
        log.append(LogEvent::Enter { visit: VisitId(2) });
        log.append(LogEvent::Submit { visit: VisitId(2) });
        log.append(LogEvent::End);
        assert_eq!(log.last_entered_visit(), Some(VisitId(2)));
    }

    #[test]
    fn var_update_text() {
        let event = LogEvent::VarUpdate {
            visit: VisitId(3),
            variable: "score".into(),
            value: Value::Int(7),
        };
        assert_eq!(event.text().as_deref(), Some("score = 7"));
        assert_eq!(event.visit(), Some(VisitId(3)));
        assert_eq!(LogEvent::End.visit(), None);
    }

    #[test]
    fn entry_serializes_flat_with_type_tag() {
        let mut log = SubmissionLog::new();
        log.append(LogEvent::Fail {
            visit: None,
            message: "boom".into(),
        });
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["type"], "FAIL");
        assert_eq!(json["sequence"], 0);
        assert_eq!(json["message"], "boom");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, log.entries()[0]);
    }

    #[test]
    fn from_entries_rejects_gaps() {
        let mut log = SubmissionLog::new();
        log.append(LogEvent::Enter { visit: VisitId(1) });
        let mut entries = log.entries().to_vec();
        entries[0].sequence = 4;
        assert!(SubmissionLog::from_entries(entries).is_err());
    }
}
