//! Testing utilities for the cheque milestone workspace
//!
//! Shared fixtures: fixed IDs, a fixed clock and small contracts.

#![allow(missing_docs)]

use cheque_milestone::{
    ContractId, ContractSnapshot, DependencyId, MemoryStore, Milestone, MilestoneDependency,
    MilestoneId,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const CONTRACT: ContractId = ContractId::from_u128(0xC0_17AC7);
pub const OTHER_CONTRACT: ContractId = ContractId::from_u128(0xC0_17AC8);

pub const A: MilestoneId = MilestoneId::from_u128(0xA);
pub const B: MilestoneId = MilestoneId::from_u128(0xB);
pub const C: MilestoneId = MilestoneId::from_u128(0xC);
pub const D: MilestoneId = MilestoneId::from_u128(0xD);

pub const A_TO_B: DependencyId = DependencyId::from_u128(0xAB);
pub const A_TO_C: DependencyId = DependencyId::from_u128(0xAC);
pub const B_TO_A: DependencyId = DependencyId::from_u128(0xBA);

/// Fixed reference time, 2026-01-05T00:00:00Z
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_571_200, 0).unwrap()
}

pub fn days_after_t0(days: i64) -> DateTime<Utc> {
    t0() + Duration::days(days)
}

pub fn milestone(id: MilestoneId, title: &str, seq: i32, days: i64) -> Milestone {
    Milestone::new(CONTRACT, title, seq)
        .with_id(id)
        .with_estimated_duration(Duration::days(days))
}

/// `milestone` needs `depends_on`
pub fn edge(
    dep: DependencyId,
    milestone: MilestoneId,
    depends_on: MilestoneId,
) -> MilestoneDependency {
    MilestoneDependency::prerequisite(milestone, depends_on).with_id(dep)
}

/// A(2d) precedes B(3d) and C(1d); A and B are critical, C has 2d slack
pub fn fork_contract() -> ContractSnapshot {
    ContractSnapshot {
        contract_id: CONTRACT,
        milestones: vec![
            milestone(A, "Design", 1, 2),
            milestone(B, "Build", 2, 3),
            milestone(C, "Docs", 3, 1),
        ],
        dependencies: vec![edge(A_TO_B, B, A), edge(A_TO_C, C, A)],
        progress_history: Vec::new(),
    }
}

/// A and B need each other; C waits behind A
pub fn cyclic_contract() -> ContractSnapshot {
    ContractSnapshot {
        contract_id: CONTRACT,
        milestones: vec![
            milestone(A, "Design", 1, 2),
            milestone(B, "Build", 2, 3),
            milestone(C, "Docs", 3, 1),
        ],
        dependencies: vec![
            edge(A_TO_B, B, A),
            edge(B_TO_A, A, B),
            edge(A_TO_C, C, A),
        ],
        progress_history: Vec::new(),
    }
}

pub fn seeded_store(snapshot: ContractSnapshot) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_snapshot(snapshot))
}

/// Snapshot with records in a stable order, for equality checks
pub fn sorted_snapshot(store: &MemoryStore, contract: ContractId) -> ContractSnapshot {
    let mut snapshot = store.snapshot(contract);
    snapshot.milestones.sort_by_key(|m| m.id);
    snapshot.dependencies.sort_by_key(|d| d.id);
    snapshot
}
