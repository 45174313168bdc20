//! Run status transitions
//!
//! Every status change in the registry goes through [`validate_transition`].

use crate::error::WorkflowError;
use crate::run::RunStatus;

/// Validates a run status transition.
pub fn validate_transition(from: RunStatus, to: RunStatus) -> Result<(), WorkflowError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: RunStatus) -> Vec<RunStatus> {
    match from {
        RunStatus::Pending => vec![RunStatus::Running],
        RunStatus::Running => vec![RunStatus::Success, RunStatus::Failed, RunStatus::Suspended],
        RunStatus::Suspended => vec![RunStatus::Running, RunStatus::Cancelled],
        RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled => vec![],
    }
}

fn allowed(from: RunStatus, to: RunStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_is_only_non_terminal_exit_from_running() {
        let exits = allowed_transitions(RunStatus::Running);
        let non_terminal: Vec<_> = exits.into_iter().filter(|s| !s.is_terminal()).collect();
        assert_eq!(non_terminal, vec![RunStatus::Suspended]);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [RunStatus::Success, RunStatus::Failed, RunStatus::Cancelled] {
            assert!(allowed_transitions(status).is_empty());
        }
    }

    #[test]
    fn suspended_can_resume_or_cancel() {
        assert_eq!(
            allowed_transitions(RunStatus::Suspended),
            vec![RunStatus::Running, RunStatus::Cancelled]
        );
        assert!(validate_transition(RunStatus::Suspended, RunStatus::Success).is_err());
    }

    #[test]
    fn pending_cannot_skip_running() {
        assert!(validate_transition(RunStatus::Pending, RunStatus::Success).is_err());
        assert!(validate_transition(RunStatus::Pending, RunStatus::Running).is_ok());
    }
}
