//! Batch mutations
//!
//! A [`MilestoneBatch`] is validated in full against a working copy of the
//! contract before anything is written. Planning turns it into one list of
//! [`StoreOp`]s that the store applies as a single transaction, so a batch
//! either lands completely or not at all.
//!
//! Rules enforced while planning:
//! - status changes follow the lifecycle; same-state changes are skipped
//! - progress is 0-100, rejected on completed or cancelled milestones, and
//!   moves the status along (first progress starts, 100 completes)
//! - deleting a milestone deletes every edge touching it
//! - a new edge needs both endpoints in the contract, no self-loop, no
//!   duplicate, and must leave the graph acyclic

use crate::error::BatchError;
use cheque_milestone::{
    validate_transition, ContractId, DependencyId, Milestone, MilestoneDependency, MilestoneId,
    MilestoneStatus, MilestoneUpdate, ProgressUpdate, StoreOp,
};
use cheque_schedule::{topological_sort, ContractGraph};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One requested change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MilestoneMutation {
    /// Move several milestones to one status
    SetStatus {
        /// Targets
        milestone_ids: Vec<MilestoneId>,
        /// New status
        status: MilestoneStatus,
    },
    /// Record progress on several milestones
    SetProgress {
        /// Changes
        updates: Vec<ProgressUpdate>,
    },
    /// Add a milestone
    CreateMilestone {
        /// The new milestone
        milestone: Milestone,
    },
    /// Edit authored fields of a milestone
    UpdateMilestone {
        /// Target
        milestone_id: MilestoneId,
        /// Fields to change
        update: MilestoneUpdate,
    },
    /// Remove a milestone and its edges
    DeleteMilestone {
        /// Target
        milestone_id: MilestoneId,
    },
    /// Add a dependency edge
    AddDependency {
        /// The new edge
        dependency: MilestoneDependency,
    },
    /// Remove a dependency edge
    RemoveDependency {
        /// Target
        dependency_id: DependencyId,
    },
}

impl MilestoneMutation {
    /// Whether the change can alter ordering or CPM timing
    #[must_use]
    pub fn touches_schedule(&self) -> bool {
        match self {
            Self::SetStatus { .. } | Self::SetProgress { .. } => false,
            Self::UpdateMilestone { update, .. } => update.touches_schedule(),
            Self::CreateMilestone { .. }
            | Self::DeleteMilestone { .. }
            | Self::AddDependency { .. }
            | Self::RemoveDependency { .. } => true,
        }
    }

    /// Milestones referenced without being created by this mutation
    pub(crate) fn referenced_milestones(&self) -> Vec<MilestoneId> {
        match self {
            Self::SetStatus { milestone_ids, .. } => milestone_ids.clone(),
            Self::SetProgress { updates } => updates.iter().map(|u| u.milestone_id).collect(),
            Self::UpdateMilestone { milestone_id, .. } | Self::DeleteMilestone { milestone_id } => {
                vec![*milestone_id]
            }
            Self::AddDependency { dependency } => {
                vec![dependency.milestone_id, dependency.depends_on_id]
            }
            Self::CreateMilestone { .. } | Self::RemoveDependency { .. } => Vec::new(),
        }
    }
}

/// Ordered set of mutations against one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneBatch {
    /// Target contract
    pub contract_id: ContractId,
    /// Changes, applied in order
    pub mutations: Vec<MilestoneMutation>,
}

impl MilestoneBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            mutations: Vec::new(),
        }
    }

    /// Append a mutation
    #[inline]
    #[must_use]
    pub fn with(mut self, mutation: MilestoneMutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Append a status change
    #[must_use]
    pub fn set_status(self, milestone_ids: Vec<MilestoneId>, status: MilestoneStatus) -> Self {
        self.with(MilestoneMutation::SetStatus {
            milestone_ids,
            status,
        })
    }

    /// Append progress updates
    #[must_use]
    pub fn set_progress(self, updates: Vec<ProgressUpdate>) -> Self {
        self.with(MilestoneMutation::SetProgress { updates })
    }

    /// Append a milestone creation
    #[must_use]
    pub fn create(self, milestone: Milestone) -> Self {
        self.with(MilestoneMutation::CreateMilestone { milestone })
    }

    /// Append a milestone edit
    #[must_use]
    pub fn update(self, milestone_id: MilestoneId, update: MilestoneUpdate) -> Self {
        self.with(MilestoneMutation::UpdateMilestone {
            milestone_id,
            update,
        })
    }

    /// Append a milestone deletion
    #[must_use]
    pub fn delete(self, milestone_id: MilestoneId) -> Self {
        self.with(MilestoneMutation::DeleteMilestone { milestone_id })
    }

    /// Append an edge creation
    #[must_use]
    pub fn add_dependency(self, dependency: MilestoneDependency) -> Self {
        self.with(MilestoneMutation::AddDependency { dependency })
    }

    /// Append an edge removal
    #[must_use]
    pub fn remove_dependency(self, dependency_id: DependencyId) -> Self {
        self.with(MilestoneMutation::RemoveDependency { dependency_id })
    }

    /// Number of mutations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the batch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Whether any mutation can alter ordering or CPM timing
    #[must_use]
    pub fn touches_schedule(&self) -> bool {
        self.mutations.iter().any(MilestoneMutation::touches_schedule)
    }
}

/// What a committed batch did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Store operations written
    pub operations: usize,
    /// Milestones created, changed or deleted
    pub milestones_touched: usize,
    /// Edges deleted because their milestone was deleted
    pub cascaded_dependencies: usize,
    /// Whether ordering or timing may have changed
    pub schedule_changed: bool,
}

/// Validated store operations for one batch
#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) ops: Vec<StoreOp>,
    pub(crate) outcome: BatchOutcome,
}

/// Mutable copy of one contract used to validate a batch
#[derive(Debug)]
pub(crate) struct WorkingCopy {
    contract_id: ContractId,
    milestones: BTreeMap<MilestoneId, Milestone>,
    dependencies: BTreeMap<DependencyId, MilestoneDependency>,
    foreign: HashMap<MilestoneId, ContractId>,
}

impl WorkingCopy {
    pub(crate) fn new(
        contract_id: ContractId,
        milestones: Vec<Milestone>,
        dependencies: Vec<MilestoneDependency>,
    ) -> Self {
        Self {
            contract_id,
            milestones: milestones.into_iter().map(|m| (m.id, m)).collect(),
            dependencies: dependencies.into_iter().map(|d| (d.id, d)).collect(),
            foreign: HashMap::new(),
        }
    }

    /// Record that `id` exists but belongs to `contract`
    pub(crate) fn note_foreign(&mut self, id: MilestoneId, contract: ContractId) {
        self.foreign.insert(id, contract);
    }

    pub(crate) fn contains(&self, id: MilestoneId) -> bool {
        self.milestones.contains_key(&id)
    }

    /// Validate every mutation in order and translate it into store operations
    ///
    /// On failure returns the index of the rejected mutation.
    pub(crate) fn plan(
        mut self,
        batch: &MilestoneBatch,
        now: DateTime<Utc>,
    ) -> Result<Plan, (usize, BatchError)> {
        let mut plan = Plan {
            ops: Vec::new(),
            outcome: BatchOutcome::default(),
        };
        for (index, mutation) in batch.mutations.iter().enumerate() {
            self.apply(mutation, now, &mut plan).map_err(|e| (index, e))?;
            plan.outcome.schedule_changed |= mutation.touches_schedule();
        }
        plan.outcome.operations = plan.ops.len();
        Ok(plan)
    }

    fn apply(
        &mut self,
        mutation: &MilestoneMutation,
        now: DateTime<Utc>,
        plan: &mut Plan,
    ) -> Result<(), BatchError> {
        match mutation {
            MilestoneMutation::SetStatus {
                milestone_ids,
                status,
            } => {
                for &id in milestone_ids {
                    let m = self.milestone_mut(id)?;
                    if m.status == *status {
                        continue;
                    }
                    transition(m, *status, now)?;
                    plan.ops.push(StoreOp::ReplaceMilestone(m.clone()));
                    plan.outcome.milestones_touched += 1;
                }
            }
            MilestoneMutation::SetProgress { updates } => {
                for update in updates {
                    let m = self.milestone_mut(update.milestone_id)?;
                    record_progress(m, update.percentage_complete, now)?;
                    plan.ops.push(StoreOp::ReplaceMilestone(m.clone()));
                    plan.ops.push(StoreOp::SetProgress {
                        update: *update,
                        recorded_at: now,
                    });
                    plan.outcome.milestones_touched += 1;
                }
            }
            MilestoneMutation::CreateMilestone { milestone } => {
                if milestone.contract_id != self.contract_id {
                    return Err(BatchError::ContractMismatch {
                        milestone_id: milestone.id,
                        expected: self.contract_id,
                        actual: milestone.contract_id,
                    });
                }
                if self.milestones.contains_key(&milestone.id)
                    || self.foreign.contains_key(&milestone.id)
                {
                    return Err(BatchError::DuplicateMilestone(milestone.id));
                }
                check_duration(milestone.id, milestone.estimated_duration)?;
                let mut milestone = milestone.clone();
                milestone.critical_path = false;
                self.milestones.insert(milestone.id, milestone.clone());
                plan.ops.push(StoreOp::InsertMilestone(milestone));
                plan.outcome.milestones_touched += 1;
            }
            MilestoneMutation::UpdateMilestone {
                milestone_id,
                update,
            } => {
                check_duration(*milestone_id, update.estimated_duration)?;
                let m = self.milestone_mut(*milestone_id)?;
                update.apply_to(m);
                plan.ops.push(StoreOp::ReplaceMilestone(m.clone()));
                plan.outcome.milestones_touched += 1;
            }
            MilestoneMutation::DeleteMilestone { milestone_id } => {
                self.milestone_mut(*milestone_id)?;
                let incident: Vec<DependencyId> = self
                    .dependencies
                    .values()
                    .filter(|d| d.touches(*milestone_id))
                    .map(|d| d.id)
                    .collect();
                for id in &incident {
                    self.dependencies.remove(id);
                    plan.ops.push(StoreOp::DeleteDependency(*id));
                }
                self.milestones.remove(milestone_id);
                plan.ops.push(StoreOp::DeleteMilestone(*milestone_id));
                plan.outcome.cascaded_dependencies += incident.len();
                plan.outcome.milestones_touched += 1;
            }
            MilestoneMutation::AddDependency { dependency } => {
                self.admit(dependency)?;
                self.dependencies.insert(dependency.id, dependency.clone());
                plan.ops.push(StoreOp::InsertDependency(dependency.clone()));
            }
            MilestoneMutation::RemoveDependency { dependency_id } => {
                if self.dependencies.remove(dependency_id).is_none() {
                    return Err(BatchError::DependencyNotFound(*dependency_id));
                }
                plan.ops.push(StoreOp::DeleteDependency(*dependency_id));
            }
        }
        Ok(())
    }

    fn milestone_mut(&mut self, id: MilestoneId) -> Result<&mut Milestone, BatchError> {
        if let Some(&actual) = self.foreign.get(&id) {
            return Err(BatchError::ContractMismatch {
                milestone_id: id,
                expected: self.contract_id,
                actual,
            });
        }
        self.milestones
            .get_mut(&id)
            .ok_or(BatchError::MilestoneNotFound(id))
    }

    fn admit(&mut self, edge: &MilestoneDependency) -> Result<(), BatchError> {
        for id in [edge.milestone_id, edge.depends_on_id] {
            self.milestone_mut(id)?;
        }
        if edge.milestone_id == edge.depends_on_id {
            return Err(BatchError::SelfDependency(edge.milestone_id));
        }
        if self.dependencies.contains_key(&edge.id) {
            return Err(BatchError::DuplicateDependencyId(edge.id));
        }
        let duplicate = self.dependencies.values().any(|d| {
            d.milestone_id == edge.milestone_id
                && d.depends_on_id == edge.depends_on_id
                && d.dependency_type == edge.dependency_type
        });
        if duplicate {
            return Err(BatchError::DuplicateDependency {
                milestone_id: edge.milestone_id,
                depends_on_id: edge.depends_on_id,
                dependency_type: edge.dependency_type,
            });
        }

        let mut edges: Vec<MilestoneDependency> = self.dependencies.values().cloned().collect();
        edges.push(edge.clone());
        let graph = ContractGraph::from_records(
            self.contract_id,
            self.milestones.values().cloned().collect(),
            edges,
        )?;
        topological_sort(&graph)?;
        Ok(())
    }
}

/// Move a milestone to `to`, stamping actual dates
fn transition(
    m: &mut Milestone,
    to: MilestoneStatus,
    now: DateTime<Utc>,
) -> Result<(), BatchError> {
    validate_transition(m.status, to).map_err(|source| BatchError::IllegalTransition {
        milestone_id: m.id,
        source,
    })?;
    match to {
        MilestoneStatus::InProgress => {
            m.actual_start_date.get_or_insert(now);
        }
        MilestoneStatus::Completed => {
            let start = *m.actual_start_date.get_or_insert(now);
            m.actual_end_date = Some(now);
            m.actual_duration = Some(now - start);
        }
        MilestoneStatus::Pending | MilestoneStatus::Blocked | MilestoneStatus::Cancelled => {}
    }
    m.status = to;
    Ok(())
}

fn check_duration(milestone_id: MilestoneId, duration: Option<Duration>) -> Result<(), BatchError> {
    match duration {
        Some(d) if d < Duration::zero() => Err(BatchError::NegativeDuration {
            milestone_id,
            seconds: d.num_seconds(),
        }),
        _ => Ok(()),
    }
}

/// Apply a progress reading and the status change it implies
///
/// A blocked milestone stays blocked on partial progress and is walked
/// through `InProgress` when it reaches 100.
fn record_progress(m: &mut Milestone, value: f64, now: DateTime<Utc>) -> Result<(), BatchError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(BatchError::InvalidProgress {
            milestone_id: m.id,
            value,
        });
    }
    if m.status.is_terminal() {
        return Err(BatchError::ProgressOnClosed {
            milestone_id: m.id,
            status: m.status,
        });
    }
    let starts = match m.status {
        MilestoneStatus::Pending => value > 0.0,
        MilestoneStatus::Blocked => value >= 100.0,
        _ => false,
    };
    if starts {
        transition(m, MilestoneStatus::InProgress, now)?;
    }
    if value >= 100.0 {
        transition(m, MilestoneStatus::Completed, now)?;
    }
    m.percentage_complete = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn contract() -> ContractId {
        ContractId::from_u128(1)
    }

    fn mid(n: u128) -> MilestoneId {
        MilestoneId::from_u128(n)
    }

    /// a <- b <- c
    fn copy() -> WorkingCopy {
        let ms = (1..=3)
            .map(|n| Milestone::new(contract(), format!("m{n}"), n as i32).with_id(mid(n)))
            .collect();
        let deps = vec![
            MilestoneDependency::prerequisite(mid(2), mid(1)).with_id(DependencyId::from_u128(12)),
            MilestoneDependency::prerequisite(mid(3), mid(2)).with_id(DependencyId::from_u128(23)),
        ];
        WorkingCopy::new(contract(), ms, deps)
    }

    #[test]
    fn progress_starts_then_completes() {
        let batch = MilestoneBatch::new(contract())
            .set_progress(vec![ProgressUpdate::new(mid(1), 30.0)])
            .set_progress(vec![ProgressUpdate::new(mid(1), 100.0)]);
        let plan = copy().plan(&batch, now()).unwrap();

        let last = plan
            .ops
            .iter()
            .rev()
            .find_map(|op| match op {
                StoreOp::ReplaceMilestone(m) => Some(m),
                _ => None,
            })
            .unwrap();
        assert_eq!(last.status, MilestoneStatus::Completed);
        assert_eq!(last.actual_start_date, Some(now()));
        assert_eq!(last.actual_end_date, Some(now()));
        assert_eq!(last.actual_duration, Some(Duration::zero()));
        assert_eq!(
            plan.ops.iter().filter(|op| matches!(op, StoreOp::SetProgress { .. })).count(),
            2
        );
        assert!(!plan.outcome.schedule_changed);
    }

    #[test]
    fn progress_out_of_range_is_rejected() {
        for bad in [-1.0, 100.5, f64::NAN] {
            let batch = MilestoneBatch::new(contract())
                .set_progress(vec![ProgressUpdate::new(mid(1), bad)]);
            let (index, err) = copy().plan(&batch, now()).unwrap_err();
            assert_eq!(index, 0);
            assert!(matches!(err, BatchError::InvalidProgress { .. }));
        }
    }

    #[test]
    fn progress_on_cancelled_is_rejected() {
        let batch = MilestoneBatch::new(contract())
            .set_status(vec![mid(1)], MilestoneStatus::Cancelled)
            .set_progress(vec![ProgressUpdate::new(mid(1), 10.0)]);
        let (index, err) = copy().plan(&batch, now()).unwrap_err();
        assert_eq!(index, 1);
        assert!(matches!(err, BatchError::ProgressOnClosed { .. }));
    }

    #[test]
    fn blocked_milestone_completes_through_in_progress() {
        let batch = MilestoneBatch::new(contract())
            .set_status(vec![mid(1)], MilestoneStatus::Blocked)
            .set_progress(vec![ProgressUpdate::new(mid(1), 40.0)])
            .set_progress(vec![ProgressUpdate::new(mid(1), 100.0)]);
        let plan = copy().plan(&batch, now()).unwrap();

        let statuses: Vec<MilestoneStatus> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                StoreOp::ReplaceMilestone(m) => Some(m.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                MilestoneStatus::Blocked,
                MilestoneStatus::Blocked,
                MilestoneStatus::Completed
            ]
        );
    }

    #[test]
    fn negative_duration_is_rejected() {
        let bad = Milestone::new(contract(), "bad", 4)
            .with_id(mid(4))
            .with_estimated_duration(Duration::days(-1));
        let (index, err) = copy()
            .plan(&MilestoneBatch::new(contract()).create(bad), now())
            .unwrap_err();
        assert_eq!(index, 0);
        assert_eq!(
            err,
            BatchError::NegativeDuration {
                milestone_id: mid(4),
                seconds: -86_400,
            }
        );

        let update = MilestoneUpdate {
            estimated_duration: Some(Duration::hours(-3)),
            ..MilestoneUpdate::default()
        };
        let batch = MilestoneBatch::new(contract())
            .set_progress(vec![ProgressUpdate::new(mid(1), 10.0)])
            .update(mid(2), update);
        let (index, err) = copy().plan(&batch, now()).unwrap_err();
        assert_eq!(index, 1);
        assert!(matches!(err, BatchError::NegativeDuration { .. }));
    }

    #[test]
    fn illegal_transition_names_milestone() {
        let batch =
            MilestoneBatch::new(contract()).set_status(vec![mid(2)], MilestoneStatus::Completed);
        let (_, err) = copy().plan(&batch, now()).unwrap_err();
        assert!(matches!(
            err,
            BatchError::IllegalTransition { milestone_id, .. } if milestone_id == mid(2)
        ));
    }

    #[test]
    fn same_status_is_skipped() {
        let batch = MilestoneBatch::new(contract())
            .set_status(vec![mid(1), mid(2)], MilestoneStatus::Pending);
        let plan = copy().plan(&batch, now()).unwrap();
        assert!(plan.ops.is_empty());
    }

    #[test]
    fn delete_cascades_to_incident_edges() {
        let batch = MilestoneBatch::new(contract()).delete(mid(2));
        let plan = copy().plan(&batch, now()).unwrap();
        assert_eq!(plan.outcome.cascaded_dependencies, 2);
        assert_eq!(
            plan.ops,
            vec![
                StoreOp::DeleteDependency(DependencyId::from_u128(12)),
                StoreOp::DeleteDependency(DependencyId::from_u128(23)),
                StoreOp::DeleteMilestone(mid(2)),
            ]
        );
        assert!(plan.outcome.schedule_changed);
    }

    fn reject(edge: MilestoneDependency) -> BatchError {
        let batch = MilestoneBatch::new(contract()).add_dependency(edge);
        copy().plan(&batch, now()).unwrap_err().1
    }

    #[test]
    fn edge_admission_rules() {
        assert!(matches!(
            reject(MilestoneDependency::prerequisite(mid(1), mid(1))),
            BatchError::SelfDependency(_)
        ));
        assert!(matches!(
            reject(MilestoneDependency::prerequisite(mid(2), mid(1))),
            BatchError::DuplicateDependency { .. }
        ));
        assert!(matches!(
            reject(MilestoneDependency::prerequisite(mid(1), mid(9))),
            BatchError::MilestoneNotFound(_)
        ));
        match reject(MilestoneDependency::prerequisite(mid(1), mid(3))) {
            BatchError::Cycle(c) => assert_eq!(c.cycle_members, vec![mid(1), mid(2), mid(3)]),
            other => panic!("expected cycle, got {other:?}"),
        }

        // same pair, other kind is allowed
        let batch = MilestoneBatch::new(contract())
            .add_dependency(MilestoneDependency::parallel(mid(2), mid(1)));
        assert!(copy().plan(&batch, now()).is_ok());
    }

    #[test]
    fn foreign_endpoint_is_a_contract_mismatch() {
        let mut wc = copy();
        wc.note_foreign(mid(50), ContractId::from_u128(2));
        let batch = MilestoneBatch::new(contract())
            .add_dependency(MilestoneDependency::prerequisite(mid(1), mid(50)));
        let (_, err) = wc.plan(&batch, now()).unwrap_err();
        assert!(matches!(err, BatchError::ContractMismatch { .. }));
    }

    #[test]
    fn later_mutations_see_earlier_ones() {
        let d = Milestone::new(contract(), "d", 4).with_id(mid(4));
        let batch = MilestoneBatch::new(contract())
            .create(d)
            .add_dependency(MilestoneDependency::prerequisite(mid(4), mid(3)))
            .delete(mid(4));
        let plan = copy().plan(&batch, now()).unwrap();
        assert_eq!(plan.outcome.cascaded_dependencies, 1);
        assert_eq!(plan.outcome.operations, 4);
    }

    #[test]
    fn mutations_round_trip_through_json() {
        let batch = MilestoneBatch::new(contract())
            .set_status(vec![mid(1)], MilestoneStatus::InProgress)
            .remove_dependency(DependencyId::from_u128(12));
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains(r#""op":"set_status""#));
        let back: MilestoneBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);
    }
}
