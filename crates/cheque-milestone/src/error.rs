//! Error types for the milestone store and status lifecycle

use crate::ids::{ContractId, DependencyId, MilestoneId};
use crate::types::MilestoneStatus;

/// Milestone store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Milestone does not exist
    #[error("milestone not found: {0}")]
    MilestoneNotFound(MilestoneId),

    /// Dependency edge does not exist
    #[error("dependency not found: {0}")]
    DependencyNotFound(DependencyId),

    /// Record with this ID already exists
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Record belongs to a different contract than the transaction
    #[error("record belongs to contract {actual}, transaction is scoped to {expected}")]
    ContractMismatch {
        /// Contract the transaction was opened for
        expected: ContractId,
        /// Contract named by the record
        actual: ContractId,
    },
}

impl StoreError {
    /// Check if the failure is transient (worth retrying at the transport layer)
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Illegal status change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Current status
    pub from: MilestoneStatus,
    /// Requested status
    pub to: MilestoneStatus,
}
