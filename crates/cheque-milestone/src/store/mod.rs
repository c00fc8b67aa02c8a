//! Milestone store abstraction
//!
//! The engine reads and writes milestone data only through
//! [`MilestoneStore`]. Every write goes through [`MilestoneStore::apply`],
//! which must be all-or-nothing for the operations it is given; the named
//! CRUD primitives are thin wrappers over it.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::ids::{ContractId, DependencyId, MilestoneId};
use crate::types::{
    Milestone, MilestoneDependency, MilestoneStatus, ProgressSnapshot, ProgressUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One write inside a store transaction
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Insert a new milestone
    InsertMilestone(Milestone),
    /// Overwrite an existing milestone
    ReplaceMilestone(Milestone),
    /// Remove a milestone (edges are not touched)
    DeleteMilestone(MilestoneId),
    /// Insert a new dependency edge
    InsertDependency(MilestoneDependency),
    /// Remove a dependency edge
    DeleteDependency(DependencyId),
    /// Set status on several milestones
    SetStatus {
        /// Targets
        ids: Vec<MilestoneId>,
        /// New status
        status: MilestoneStatus,
    },
    /// Set progress on one milestone and record it in the history
    SetProgress {
        /// The change
        update: ProgressUpdate,
        /// When it was recorded
        recorded_at: DateTime<Utc>,
    },
}

/// Persistence seam for milestones and dependency edges
#[async_trait]
pub trait MilestoneStore: Send + Sync + std::fmt::Debug {
    /// All milestones of a contract
    async fn load_milestones(&self, contract: ContractId) -> Result<Vec<Milestone>, StoreError>;

    /// All dependency edges of a contract
    async fn load_dependencies(
        &self,
        contract: ContractId,
    ) -> Result<Vec<MilestoneDependency>, StoreError>;

    /// One milestone by ID, in any contract
    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>, StoreError>;

    /// Recorded progress readings of a contract, oldest first
    async fn load_progress_history(
        &self,
        contract: ContractId,
    ) -> Result<Vec<ProgressSnapshot>, StoreError>;

    /// Apply `ops` to one contract as a single transaction.
    ///
    /// # Errors
    /// If any operation fails, none of them take effect.
    async fn apply(&self, contract: ContractId, ops: Vec<StoreOp>) -> Result<(), StoreError>;

    /// Insert a milestone
    async fn create_milestone(&self, milestone: Milestone) -> Result<(), StoreError> {
        let contract = milestone.contract_id;
        self.apply(contract, vec![StoreOp::InsertMilestone(milestone)]).await
    }

    /// Overwrite a milestone
    async fn update_milestone(&self, milestone: Milestone) -> Result<(), StoreError> {
        let contract = milestone.contract_id;
        self.apply(contract, vec![StoreOp::ReplaceMilestone(milestone)]).await
    }

    /// Remove a milestone record only; incident edges are the caller's concern
    async fn delete_milestone(
        &self,
        contract: ContractId,
        id: MilestoneId,
    ) -> Result<(), StoreError> {
        self.apply(contract, vec![StoreOp::DeleteMilestone(id)]).await
    }

    /// Insert a dependency edge
    async fn create_dependency(
        &self,
        contract: ContractId,
        edge: MilestoneDependency,
    ) -> Result<(), StoreError> {
        self.apply(contract, vec![StoreOp::InsertDependency(edge)]).await
    }

    /// Remove a dependency edge
    async fn delete_dependency(
        &self,
        contract: ContractId,
        id: DependencyId,
    ) -> Result<(), StoreError> {
        self.apply(contract, vec![StoreOp::DeleteDependency(id)]).await
    }

    /// Set status on several milestones atomically
    async fn batch_update_status(
        &self,
        contract: ContractId,
        ids: Vec<MilestoneId>,
        status: MilestoneStatus,
    ) -> Result<(), StoreError> {
        self.apply(contract, vec![StoreOp::SetStatus { ids, status }]).await
    }

    /// Set progress on several milestones atomically
    async fn batch_update_progress(
        &self,
        contract: ContractId,
        updates: Vec<ProgressUpdate>,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let ops = updates
            .into_iter()
            .map(|update| StoreOp::SetProgress { update, recorded_at })
            .collect();
        self.apply(contract, ops).await
    }
}
