//! Error types for the scheduling engine
//!
//! Provides error handling for:
//! - Store access failures
//! - Graph, ordering and CPM failures
//! - Rejected batch mutations
//! - Configuration loading

use cheque_analytics::AnalyticsError;
use cheque_milestone::{
    ContractId, DependencyId, DependencyType, MilestoneId, MilestoneStatus, StoreError,
    TransitionError,
};
use cheque_schedule::{
    CycleDetectedError, GraphBuildError, InconsistentDurationError, ScheduleError,
};
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store read or write failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Graph could not be built, sorted or scheduled
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Aggregation parameters rejected
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// A batch operation failed validation; nothing was written
    #[error("batch operation {index} rejected: {source}")]
    BatchRejected {
        /// Position of the offending mutation in the batch
        index: usize,
        /// Why it was rejected
        #[source]
        source: BatchError,
    },

    /// Configuration invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Check if the failure is transient
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Schedule(ScheduleError::GraphBuild(GraphBuildError::Store(e))) => {
                e.is_transient()
            }
            _ => false,
        }
    }

    /// Check if the stored data itself is inconsistent
    ///
    /// Dangling or foreign edges, duplicate milestones, cycles and negative
    /// durations all need a data fix, not a retry.
    #[must_use]
    pub fn is_data_integrity(&self) -> bool {
        match self {
            Self::Schedule(ScheduleError::GraphBuild(GraphBuildError::Store(_))) => false,
            Self::Schedule(
                ScheduleError::GraphBuild(_) | ScheduleError::Cycle(_) | ScheduleError::Duration(_),
            ) => true,
            Self::BatchRejected { source, .. } => source.is_data_integrity(),
            _ => false,
        }
    }

    /// Cycle report, whether from scheduling or from edge admission
    #[must_use]
    pub fn as_cycle(&self) -> Option<&CycleDetectedError> {
        match self {
            Self::Schedule(e) => e.as_cycle(),
            Self::BatchRejected {
                source: BatchError::Cycle(c),
                ..
            } => Some(c),
            _ => None,
        }
    }

    pub(crate) fn rejected(index: usize, source: BatchError) -> Self {
        Self::BatchRejected { index, source }
    }
}

impl From<GraphBuildError> for EngineError {
    fn from(e: GraphBuildError) -> Self {
        match e {
            GraphBuildError::Store(s) => Self::Store(s),
            other => Self::Schedule(other.into()),
        }
    }
}

impl From<CycleDetectedError> for EngineError {
    fn from(e: CycleDetectedError) -> Self {
        Self::Schedule(e.into())
    }
}

impl From<InconsistentDurationError> for EngineError {
    fn from(e: InconsistentDurationError) -> Self {
        Self::Schedule(e.into())
    }
}

/// Reasons a batch mutation is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    /// Milestone is not part of the contract
    #[error("milestone not found: {0}")]
    MilestoneNotFound(MilestoneId),

    /// Dependency edge is not part of the contract
    #[error("dependency not found: {0}")]
    DependencyNotFound(DependencyId),

    /// Milestone belongs to another contract
    #[error("milestone {milestone_id} belongs to contract {actual}, batch targets {expected}")]
    ContractMismatch {
        /// The milestone
        milestone_id: MilestoneId,
        /// Contract of the batch
        expected: ContractId,
        /// Contract of the milestone
        actual: ContractId,
    },

    /// Milestone ID already in use
    #[error("milestone already exists: {0}")]
    DuplicateMilestone(MilestoneId),

    /// Status change not allowed by the lifecycle
    #[error("milestone {milestone_id}: {source}")]
    IllegalTransition {
        /// The milestone
        milestone_id: MilestoneId,
        /// Rejected transition
        #[source]
        source: TransitionError,
    },

    /// Progress outside 0-100 or not a number
    #[error("milestone {milestone_id}: progress {value} outside 0-100")]
    InvalidProgress {
        /// The milestone
        milestone_id: MilestoneId,
        /// Requested value
        value: f64,
    },

    /// Progress on a completed or cancelled milestone
    #[error("milestone {milestone_id} is {status:?} and accepts no progress")]
    ProgressOnClosed {
        /// The milestone
        milestone_id: MilestoneId,
        /// Its terminal status
        status: MilestoneStatus,
    },

    /// Planned duration below zero
    #[error("milestone {milestone_id}: negative estimated duration ({seconds}s)")]
    NegativeDuration {
        /// The milestone
        milestone_id: MilestoneId,
        /// Requested duration in seconds
        seconds: i64,
    },

    /// Edge from a milestone to itself
    #[error("milestone {0} cannot depend on itself")]
    SelfDependency(MilestoneId),

    /// Same edge already present
    #[error("{milestone_id} already depends on {depends_on_id} ({dependency_type:?})")]
    DuplicateDependency {
        /// Dependent
        milestone_id: MilestoneId,
        /// Prerequisite
        depends_on_id: MilestoneId,
        /// Edge kind
        dependency_type: DependencyType,
    },

    /// Edge ID already in use
    #[error("dependency already exists: {0}")]
    DuplicateDependencyId(DependencyId),

    /// Edge would close a cycle
    #[error(transparent)]
    Cycle(#[from] CycleDetectedError),

    /// Stored contract data could not be assembled into a graph
    #[error(transparent)]
    Graph(#[from] GraphBuildError),
}

impl BatchError {
    /// Whether the rejection points at inconsistent data rather than a bad request
    #[inline]
    #[must_use]
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::Graph(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outage_is_retryable() {
        let err = EngineError::from(GraphBuildError::Store(StoreError::Unavailable("down".into())));
        assert!(matches!(err, EngineError::Store(_)));
        assert!(err.is_retryable());
        assert!(!err.is_data_integrity());
    }

    #[test]
    fn cycles_are_integrity_failures() {
        let cycle = CycleDetectedError {
            contract_id: ContractId::from_u128(1),
            cycle_members: vec![MilestoneId::from_u128(1), MilestoneId::from_u128(2)],
            cycles: vec![vec![MilestoneId::from_u128(1), MilestoneId::from_u128(2)]],
            blocked: vec![],
        };
        let err = EngineError::from(cycle.clone());
        assert!(err.is_data_integrity());
        assert!(!err.is_retryable());
        assert_eq!(err.as_cycle(), Some(&cycle));

        let rejected = EngineError::rejected(3, BatchError::Cycle(cycle));
        assert!(rejected.as_cycle().is_some());
        assert!(rejected.to_string().starts_with("batch operation 3 rejected"));
        assert!(!rejected.is_data_integrity());
    }
}
