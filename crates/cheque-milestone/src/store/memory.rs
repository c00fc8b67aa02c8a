//! In-memory transactional store
//!
//! Tables are kept per contract. A transaction clones the contract's tables,
//! runs every operation against the clone, and swaps the clone in only if all
//! of them succeed.

use super::{MilestoneStore, StoreOp};
use crate::error::StoreError;
use crate::ids::{ContractId, DependencyId, MilestoneId};
use crate::types::{ContractSnapshot, Milestone, MilestoneDependency, ProgressSnapshot};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
struct ContractTables {
    milestones: BTreeMap<MilestoneId, Milestone>,
    dependencies: BTreeMap<DependencyId, MilestoneDependency>,
    history: Vec<ProgressSnapshot>,
}

impl ContractTables {
    fn apply_op(&mut self, contract: ContractId, op: StoreOp) -> Result<(), StoreError> {
        match op {
            StoreOp::InsertMilestone(milestone) => {
                check_contract(contract, milestone.contract_id)?;
                if self.milestones.contains_key(&milestone.id) {
                    return Err(StoreError::Duplicate(format!("milestone {}", milestone.id)));
                }
                self.milestones.insert(milestone.id, milestone);
            }
            StoreOp::ReplaceMilestone(milestone) => {
                check_contract(contract, milestone.contract_id)?;
                let slot = self
                    .milestones
                    .get_mut(&milestone.id)
                    .ok_or(StoreError::MilestoneNotFound(milestone.id))?;
                *slot = milestone;
            }
            StoreOp::DeleteMilestone(id) => {
                self.milestones
                    .remove(&id)
                    .ok_or(StoreError::MilestoneNotFound(id))?;
            }
            StoreOp::InsertDependency(edge) => {
                if self.dependencies.contains_key(&edge.id) {
                    return Err(StoreError::Duplicate(format!("dependency {}", edge.id)));
                }
                self.dependencies.insert(edge.id, edge);
            }
            StoreOp::DeleteDependency(id) => {
                self.dependencies
                    .remove(&id)
                    .ok_or(StoreError::DependencyNotFound(id))?;
            }
            StoreOp::SetStatus { ids, status } => {
                for id in ids {
                    let m = self
                        .milestones
                        .get_mut(&id)
                        .ok_or(StoreError::MilestoneNotFound(id))?;
                    m.status = status;
                }
            }
            StoreOp::SetProgress {
                update,
                recorded_at,
            } => {
                let m = self
                    .milestones
                    .get_mut(&update.milestone_id)
                    .ok_or(StoreError::MilestoneNotFound(update.milestone_id))?;
                m.percentage_complete = update.percentage_complete;
                self.history.push(ProgressSnapshot {
                    milestone_id: update.milestone_id,
                    percentage_complete: update.percentage_complete,
                    recorded_at,
                });
            }
        }
        Ok(())
    }
}

fn check_contract(expected: ContractId, actual: ContractId) -> Result<(), StoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::ContractMismatch { expected, actual })
    }
}

/// Map-backed [`MilestoneStore`] with per-transaction rollback
#[derive(Debug, Default)]
pub struct MemoryStore {
    contracts: RwLock<HashMap<ContractId, ContractTables>>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-loaded with one contract's records
    #[must_use]
    pub fn from_snapshot(snapshot: ContractSnapshot) -> Self {
        let store = Self::new();
        store.seed(snapshot);
        store
    }

    /// Replace a contract's records wholesale.
    ///
    /// Bypasses transactional checks; intended for fixtures and imports.
    pub fn seed(&self, snapshot: ContractSnapshot) {
        let tables = ContractTables {
            milestones: snapshot.milestones.into_iter().map(|m| (m.id, m)).collect(),
            dependencies: snapshot
                .dependencies
                .into_iter()
                .map(|d| (d.id, d))
                .collect(),
            history: snapshot.progress_history,
        };
        self.contracts.write().insert(snapshot.contract_id, tables);
    }

    /// Export a contract's records
    #[must_use]
    pub fn snapshot(&self, contract: ContractId) -> ContractSnapshot {
        let guard = self.contracts.read();
        let tables = guard.get(&contract).cloned().unwrap_or_default();
        ContractSnapshot {
            contract_id: contract,
            milestones: tables.milestones.into_values().collect(),
            dependencies: tables.dependencies.into_values().collect(),
            progress_history: tables.history,
        }
    }

    /// Simulate an unreachable backend
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MilestoneStore for MemoryStore {
    async fn load_milestones(&self, contract: ContractId) -> Result<Vec<Milestone>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .contracts
            .read()
            .get(&contract)
            .map(|t| t.milestones.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_dependencies(
        &self,
        contract: ContractId,
    ) -> Result<Vec<MilestoneDependency>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .contracts
            .read()
            .get(&contract)
            .map(|t| t.dependencies.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .contracts
            .read()
            .values()
            .find_map(|t| t.milestones.get(&id).cloned()))
    }

    async fn load_progress_history(
        &self,
        contract: ContractId,
    ) -> Result<Vec<ProgressSnapshot>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .contracts
            .read()
            .get(&contract)
            .map(|t| t.history.clone())
            .unwrap_or_default())
    }

    async fn apply(&self, contract: ContractId, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut guard = self.contracts.write();
        let mut working = guard.get(&contract).cloned().unwrap_or_default();
        let op_count = ops.len();

        for op in ops {
            if let Err(e) = working.apply_op(contract, op) {
                tracing::debug!(%contract, error = %e, "store transaction rolled back");
                return Err(e);
            }
        }

        guard.insert(contract, working);
        tracing::trace!(%contract, op_count, "store transaction committed");
        Ok(())
    }
}
