//! Per-contract reader/writer locks
//!
//! Scheduling reads of one contract share its lock; writes take it
//! exclusively. Different contracts never contend.

use cheque_milestone::ContractId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Lock table keyed by contract
#[derive(Debug, Default)]
pub struct ContractLocks {
    locks: DashMap<ContractId, Arc<RwLock<()>>>,
}

impl ContractLocks {
    /// Create empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, contract: ContractId) -> Arc<RwLock<()>> {
        // clone out so the shard guard is released before awaiting
        self.locks.entry(contract).or_default().clone()
    }

    /// Shared access for reads
    pub async fn read(&self, contract: ContractId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(contract).read_owned().await
    }

    /// Exclusive access for writes
    pub async fn write(&self, contract: ContractId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(contract).write_owned().await
    }

    /// Number of contracts seen
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no contract has been locked yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
