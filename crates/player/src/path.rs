//! Submission path reconstruction.
//!
//! The effective path is re-derived from the log on every scoring pass:
//! REPEAT and ERASE retroactively change which visits count, so the path
//! is never cached.

use crate::log::{LogEvent, SubmissionLog};
use crate::types::{Submission, VisitId};

/// Derive the ordered visits that count toward grading.
///
/// ENTER adds a placeholder for the open visit that the next ENTER, SUBMIT,
/// or SKIP replaces. REPEAT arms the replacement of the repeated visit.
/// ERASE drops the erased visit and everything after it.
pub fn generate_submission_path(log: &SubmissionLog) -> Vec<VisitId> {
    let mut path: Vec<VisitId> = Vec::new();
    let mut replacing = false;

    for entry in log.iter() {
        match &entry.event {
            LogEvent::Enter { visit } => {
                if replacing {
                    path.pop();
                }
                path.push(*visit);
                replacing = true;
            }
            LogEvent::Submit { visit } | LogEvent::Skip { visit } => {
                if replacing {
                    path.pop();
                    replacing = false;
                }
                path.push(*visit);
            }
            LogEvent::Repeat { .. } => {
                replacing = true;
            }
            LogEvent::Erase { visit } => {
                if let Some(pos) = path.iter().position(|v| v == visit) {
                    path.truncate(pos);
                }
                replacing = false;
            }
            _ => {}
        }
    }

    path
}

/// True if `visit` was superseded: the submission is completed or a later
/// ENTER opened another visit.
pub fn is_stage_already_expanded(submission: &Submission, visit: VisitId) -> bool {
    if submission.is_completed() {
        return true;
    }
    submission.log().last_entered_visit() != Some(visit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(events: Vec<LogEvent>) -> SubmissionLog {
        let mut log = SubmissionLog::new();
        for event in events {
            log.append(event);
        }
        log
    }

    fn v(id: u64) -> VisitId {
        VisitId(id)
    }

    #[test]
    fn empty_log_has_empty_path() {
        assert!(generate_submission_path(&SubmissionLog::new()).is_empty());
    }

    #[test]
    fn open_visit_is_a_placeholder() {
        let log = log_of(vec![LogEvent::Enter { visit: v(1) }]);
        assert_eq!(generate_submission_path(&log), vec![v(1)]);
    }

    #[test]
    fn linear_progression() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Enter { visit: v(2) },
            LogEvent::Skip { visit: v(2) },
            LogEvent::End,
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1), v(2)]);
    }

    #[test]
    fn repeat_then_enter_replaces_repeated_visit() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Repeat { visit: v(1) },
            LogEvent::Enter { visit: v(2) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(2)]);
    }

    #[test]
    fn repeated_visit_submitted_again() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Enter { visit: v(2) },
            LogEvent::Submit { visit: v(2) },
            LogEvent::Repeat { visit: v(2) },
            LogEvent::Enter { visit: v(3) },
            LogEvent::Submit { visit: v(3) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1), v(3)]);
    }

    #[test]
    fn erase_truncates_before_erased_visit() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Enter { visit: v(2) },
            LogEvent::Submit { visit: v(2) },
            LogEvent::Enter { visit: v(3) },
            LogEvent::Erase { visit: v(2) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1)]);
    }

    #[test]
    fn re_expansion_after_erase_appends_new_visit() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Enter { visit: v(2) },
            LogEvent::Submit { visit: v(2) },
            LogEvent::Erase { visit: v(2) },
            LogEvent::Enter { visit: v(3) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1), v(3)]);
    }

    #[test]
    fn erase_of_unknown_visit_keeps_path() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Submit { visit: v(1) },
            LogEvent::Erase { visit: v(9) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1)]);
    }

    #[test]
    fn non_path_entries_are_ignored() {
        let log = log_of(vec![
            LogEvent::Enter { visit: v(1) },
            LogEvent::Hint {
                visit: v(1),
                text: "h".into(),
            },
            LogEvent::Fail {
                visit: Some(v(1)),
                message: "x".into(),
            },
            LogEvent::Exit { visit: v(1) },
        ]);
        assert_eq!(generate_submission_path(&log), vec![v(1)]);
    }
}
