//! Milestone status lifecycle
//!
//! Work reaches `Completed` only through `InProgress`. `Completed` and
//! `Cancelled` are final.

use crate::error::TransitionError;
use crate::types::MilestoneStatus;

/// Validates a status transition.
///
/// Re-asserting the current status is accepted as a no-op.
pub fn validate_transition(
    from: MilestoneStatus,
    to: MilestoneStatus,
) -> Result<(), TransitionError> {
    if from == to || allowed(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: MilestoneStatus) -> Vec<MilestoneStatus> {
    match from {
        MilestoneStatus::Pending => vec![
            MilestoneStatus::InProgress,
            MilestoneStatus::Blocked,
            MilestoneStatus::Cancelled,
        ],
        MilestoneStatus::InProgress => vec![
            MilestoneStatus::Completed,
            MilestoneStatus::Blocked,
            MilestoneStatus::Cancelled,
        ],
        MilestoneStatus::Blocked => vec![
            MilestoneStatus::Pending,
            MilestoneStatus::InProgress,
            MilestoneStatus::Cancelled,
        ],
        MilestoneStatus::Completed | MilestoneStatus::Cancelled => vec![],
    }
}

fn allowed(from: MilestoneStatus, to: MilestoneStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use MilestoneStatus::{Blocked, Cancelled, Completed, InProgress, Pending};

    #[test]
    fn forward_path_is_legal() {
        assert!(validate_transition(Pending, InProgress).is_ok());
        assert!(validate_transition(InProgress, Completed).is_ok());
        assert!(validate_transition(Blocked, InProgress).is_ok());
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(validate_transition(Completed, InProgress).is_err());
        assert!(validate_transition(Cancelled, Pending).is_err());
        assert!(allowed_transitions(Completed).is_empty());
    }

    #[test]
    fn skipping_in_progress_is_rejected() {
        let err = validate_transition(Pending, Completed).unwrap_err();
        assert_eq!(err.from, Pending);
        assert_eq!(err.to, Completed);
    }

    #[test]
    fn same_status_is_noop() {
        assert!(validate_transition(Completed, Completed).is_ok());
    }
}
