//! Error types for graph building and scheduling
//!
//! All of these are deterministic for a given store snapshot; none of them
//! is worth retrying inside the engine.

use cheque_milestone::{ContractId, DependencyId, MilestoneId, StoreError};

/// Failures while assembling a contract graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphBuildError {
    /// Store could not be read
    #[error("store unreachable: {0}")]
    Store(#[from] StoreError),

    /// Edge references a milestone that is not part of the contract
    #[error("dependency {dependency_id} references missing milestone {missing}")]
    DanglingEdge {
        /// Offending edge
        dependency_id: DependencyId,
        /// Endpoint that could not be resolved
        missing: MilestoneId,
    },

    /// Milestone returned for a contract it does not belong to
    #[error("milestone {milestone_id} belongs to contract {actual}, not {expected}")]
    ForeignMilestone {
        /// The milestone
        milestone_id: MilestoneId,
        /// Contract being built
        expected: ContractId,
        /// Contract the milestone names
        actual: ContractId,
    },

    /// Same milestone ID returned twice
    #[error("duplicate milestone {0}")]
    DuplicateMilestone(MilestoneId),
}

/// The dependency graph contains at least one cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "dependency cycle in contract {contract_id}: {} milestone(s) on a cycle: {}",
    .cycle_members.len(),
    join_ids(.cycle_members)
)]
pub struct CycleDetectedError {
    /// Contract whose graph is cyclic
    pub contract_id: ContractId,
    /// Every milestone lying on some cycle, sorted
    pub cycle_members: Vec<MilestoneId>,
    /// Each strongly connected cycle group, members sorted
    pub cycles: Vec<Vec<MilestoneId>>,
    /// Milestones not on a cycle but unorderable because they sit downstream of one
    pub blocked: Vec<MilestoneId>,
}

impl CycleDetectedError {
    /// Whether the given milestone is on a cycle
    #[inline]
    #[must_use]
    pub fn involves(&self, id: MilestoneId) -> bool {
        self.cycle_members.binary_search(&id).is_ok()
    }
}

fn join_ids(ids: &[MilestoneId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Durations the critical-path engine cannot work with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InconsistentDurationError {
    /// Negative planned duration
    #[error("milestone {milestone_id} has negative estimated duration ({seconds}s)")]
    Negative {
        /// The milestone
        milestone_id: MilestoneId,
        /// Offending duration in seconds
        seconds: i64,
    },

    /// Accumulated schedule offset left the representable range
    #[error("schedule overflow at milestone {milestone_id}")]
    Overflow {
        /// Milestone where the overflow happened
        milestone_id: MilestoneId,
    },
}

/// Any failure of the graph → order → CPM pipeline
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Graph could not be built
    #[error(transparent)]
    GraphBuild(#[from] GraphBuildError),

    /// Graph is cyclic
    #[error(transparent)]
    Cycle(#[from] CycleDetectedError),

    /// Durations are unusable
    #[error(transparent)]
    Duration(#[from] InconsistentDurationError),

    /// Order was produced from a different graph
    #[error("topological order does not belong to the graph of contract {0}")]
    OrderMismatch(ContractId),
}

impl ScheduleError {
    /// Cycle report, if this is a cycle failure
    #[inline]
    #[must_use]
    pub fn as_cycle(&self) -> Option<&CycleDetectedError> {
        match self {
            Self::Cycle(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_names_members() {
        let a = MilestoneId::from_u128(1);
        let b = MilestoneId::from_u128(2);
        let err = CycleDetectedError {
            contract_id: ContractId::from_u128(9),
            cycle_members: vec![a, b],
            cycles: vec![vec![a, b]],
            blocked: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 milestone(s) on a cycle"));
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
        assert!(err.involves(a));
        assert!(!err.involves(MilestoneId::from_u128(3)));
    }

    #[test]
    fn schedule_error_wraps_transparently() {
        let inner = InconsistentDurationError::Negative {
            milestone_id: MilestoneId::from_u128(1),
            seconds: -5,
        };
        let err = ScheduleError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(err.as_cycle().is_none());
    }
}
