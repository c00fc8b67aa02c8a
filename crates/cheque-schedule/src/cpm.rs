//! Critical-path scheduling
//!
//! Two passes over a validated [`TopologicalOrder`]:
//!
//! - forward: `ES = max(EF of prerequisites)` (zero for none), `EF = ES + d`
//! - backward: `LF = min(LS of dependents)` (total duration for none), `LS = LF - d`
//!
//! `slack = LS - ES`; zero-slack milestones are critical. Only prerequisite
//! edges constrain timing; parallel edges are ignored here.
//!
//! All offsets are [`Duration`]s measured from schedule zero. Mixing time
//! units across milestones is a caller error and is not normalised.

use crate::error::{InconsistentDurationError, ScheduleError};
use crate::graph::ContractGraph;
use crate::topo::TopologicalOrder;
use cheque_milestone::duration_secs;
use cheque_milestone::{ContractId, MilestoneId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// CPM result for one milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MilestoneTiming {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Duration used for scheduling (zero when unset)
    #[serde(with = "duration_secs::required")]
    pub duration: Duration,
    /// Earliest start offset
    #[serde(with = "duration_secs::required")]
    pub earliest_start: Duration,
    /// Earliest finish offset
    #[serde(with = "duration_secs::required")]
    pub earliest_finish: Duration,
    /// Latest start offset that does not delay the contract
    #[serde(with = "duration_secs::required")]
    pub latest_start: Duration,
    /// Latest finish offset that does not delay the contract
    #[serde(with = "duration_secs::required")]
    pub latest_finish: Duration,
    /// Total float
    #[serde(with = "duration_secs::required")]
    pub slack: Duration,
    /// Float that does not delay any direct dependent
    #[serde(with = "duration_secs::required")]
    pub free_slack: Duration,
    /// Zero slack
    pub is_critical: bool,
}

impl MilestoneTiming {
    /// Map offsets onto the calendar
    ///
    /// `None` when any offset lands outside the representable date range.
    #[must_use]
    pub fn at(&self, anchor: DateTime<Utc>) -> Option<CalendarWindow> {
        Some(CalendarWindow {
            earliest_start: anchor.checked_add_signed(self.earliest_start)?,
            earliest_finish: anchor.checked_add_signed(self.earliest_finish)?,
            latest_start: anchor.checked_add_signed(self.latest_start)?,
            latest_finish: anchor.checked_add_signed(self.latest_finish)?,
        })
    }
}

/// CPM offsets resolved to calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarWindow {
    /// Earliest start
    pub earliest_start: DateTime<Utc>,
    /// Earliest finish
    pub earliest_finish: DateTime<Utc>,
    /// Latest start
    pub latest_start: DateTime<Utc>,
    /// Latest finish
    pub latest_finish: DateTime<Utc>,
}

/// CPM result for a whole contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpmSchedule {
    contract_id: ContractId,
    timings: Vec<MilestoneTiming>,
    index: HashMap<MilestoneId, usize>,
    total_duration: Duration,
    critical_path_duration: Duration,
    slack_time: Duration,
    critical_chain: Vec<MilestoneId>,
}

impl CpmSchedule {
    /// Contract the schedule belongs to
    #[inline]
    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    /// Per-milestone timings, in topological order
    #[inline]
    #[must_use]
    pub fn timings(&self) -> &[MilestoneTiming] {
        &self.timings
    }

    /// Timing of one milestone
    #[inline]
    #[must_use]
    pub fn timing(&self, id: MilestoneId) -> Option<&MilestoneTiming> {
        self.index.get(&id).map(|&i| &self.timings[i])
    }

    /// Whether a milestone has zero slack
    #[inline]
    #[must_use]
    pub fn is_critical(&self, id: MilestoneId) -> bool {
        self.timing(id).is_some_and(|t| t.is_critical)
    }

    /// Max earliest finish over sink milestones
    #[inline]
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Length of the critical chain, summed milestone by milestone
    #[inline]
    #[must_use]
    pub fn critical_path_duration(&self) -> Duration {
        self.critical_path_duration
    }

    /// Sum of slack over non-critical milestones (informational)
    #[inline]
    #[must_use]
    pub fn slack_time(&self) -> Duration {
        self.slack_time
    }

    /// One source-to-sink chain of zero-slack milestones
    #[inline]
    #[must_use]
    pub fn critical_chain(&self) -> &[MilestoneId] {
        &self.critical_chain
    }

    /// Every zero-slack milestone, in topological order
    #[must_use]
    pub fn critical_milestones(&self) -> Vec<MilestoneId> {
        self.timings
            .iter()
            .filter(|t| t.is_critical)
            .map(|t| t.milestone_id)
            .collect()
    }
}

/// Run the forward and backward passes
///
/// # Errors
/// - `ScheduleError::OrderMismatch` if `order` was not produced from `graph`
/// - `ScheduleError::Duration` for negative durations or offset overflow
pub fn schedule(
    graph: &ContractGraph,
    order: &TopologicalOrder,
) -> Result<CpmSchedule, ScheduleError> {
    if order.contract_id() != graph.contract_id()
        || order.len() != graph.len()
        || order.iter().any(|id| !graph.contains(id))
    {
        return Err(ScheduleError::OrderMismatch(graph.contract_id()));
    }

    let n = order.len();
    let ids = order.as_slice();
    let pos = |id: MilestoneId| order.position(id).unwrap_or(usize::MAX);

    let mut durations = Vec::with_capacity(n);
    for &id in ids {
        let d = graph.milestone(id).map_or_else(Duration::zero, |m| m.duration_or_zero());
        if d < Duration::zero() {
            return Err(InconsistentDurationError::Negative {
                milestone_id: id,
                seconds: d.num_seconds(),
            }
            .into());
        }
        durations.push(d);
    }

    // forward pass
    let mut es = vec![Duration::zero(); n];
    let mut ef = vec![Duration::zero(); n];
    for (i, &id) in ids.iter().enumerate() {
        let start = graph
            .prerequisites(id)
            .map(|p| ef[pos(p)])
            .max()
            .unwrap_or_else(Duration::zero);
        es[i] = start;
        ef[i] = start
            .checked_add(&durations[i])
            .ok_or(InconsistentDurationError::Overflow { milestone_id: id })?;
    }

    let total = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| graph.dependents(**id).next().is_none())
        .map(|(i, _)| ef[i])
        .max()
        .unwrap_or_else(Duration::zero);

    // backward pass
    let mut ls = vec![Duration::zero(); n];
    let mut lf = vec![Duration::zero(); n];
    for (i, &id) in ids.iter().enumerate().rev() {
        let finish = graph
            .dependents(id)
            .map(|s| ls[pos(s)])
            .min()
            .unwrap_or(total);
        lf[i] = finish;
        ls[i] = finish - durations[i];
    }

    let mut timings = Vec::with_capacity(n);
    let mut slack_time = Duration::zero();
    for (i, &id) in ids.iter().enumerate() {
        let slack = ls[i] - es[i];
        let free_slack = graph
            .dependents(id)
            .map(|s| es[pos(s)])
            .min()
            .unwrap_or(total)
            - ef[i];
        let is_critical = slack == Duration::zero();
        if !is_critical {
            slack_time = slack_time + slack;
        }
        timings.push(MilestoneTiming {
            milestone_id: id,
            duration: durations[i],
            earliest_start: es[i],
            earliest_finish: ef[i],
            latest_start: ls[i],
            latest_finish: lf[i],
            slack,
            free_slack,
            is_critical,
        });
    }

    let critical_chain = trace_critical_chain(graph, order, &timings, total);
    let critical_path_duration = critical_chain
        .iter()
        .map(|id| timings[pos(*id)].duration)
        .fold(Duration::zero(), |acc, d| acc + d);
    debug_assert_eq!(
        critical_path_duration, total,
        "critical chain length must equal the longest earliest finish"
    );

    let index = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    tracing::debug!(
        contract_id = %graph.contract_id(),
        total_secs = total.num_seconds(),
        critical = timings.iter().filter(|t| t.is_critical).count(),
        "critical path computed"
    );

    Ok(CpmSchedule {
        contract_id: graph.contract_id(),
        timings,
        index,
        total_duration: total,
        critical_path_duration,
        slack_time,
        critical_chain,
    })
}

/// Walk back from the first critical sink finishing at `total`, always taking
/// the earliest-ordered critical prerequisite that finishes exactly when the
/// current milestone starts.
fn trace_critical_chain(
    graph: &ContractGraph,
    order: &TopologicalOrder,
    timings: &[MilestoneTiming],
    total: Duration,
) -> Vec<MilestoneId> {
    let at = |id: MilestoneId| order.position(id).map(|i| &timings[i]);

    let Some(sink) = timings.iter().find(|t| {
        t.is_critical
            && t.earliest_finish == total
            && graph.dependents(t.milestone_id).next().is_none()
    }) else {
        return Vec::new();
    };

    let mut chain = vec![sink.milestone_id];
    let mut current = *sink;
    loop {
        let next = graph
            .prerequisites(current.milestone_id)
            .filter_map(at)
            .filter(|p| p.is_critical && p.earliest_finish == current.earliest_start)
            .min_by_key(|p| order.position(p.milestone_id));
        match next {
            Some(p) => {
                chain.push(p.milestone_id);
                current = *p;
            }
            None => break,
        }
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topo::topological_sort;
    use cheque_milestone::{Milestone, MilestoneDependency};
    use chrono::TimeZone;

    fn id(n: u128) -> MilestoneId {
        MilestoneId::from_u128(n)
    }

    fn days(n: i64) -> Duration {
        Duration::days(n)
    }

    fn run(nodes: &[(u128, Option<i64>)], edges: &[(u128, u128, bool)]) -> CpmSchedule {
        let c = ContractId::from_u128(1);
        let milestones = nodes
            .iter()
            .map(|&(n, d)| {
                let m = Milestone::new(c, format!("m{n}"), 0).with_id(id(n));
                match d {
                    Some(d) => m.with_estimated_duration(days(d)),
                    None => m,
                }
            })
            .collect();
        let deps = edges
            .iter()
            .map(|&(dependent, prereq, hard)| {
                if hard {
                    MilestoneDependency::prerequisite(id(dependent), id(prereq))
                } else {
                    MilestoneDependency::parallel(id(dependent), id(prereq))
                }
            })
            .collect();
        let g = ContractGraph::from_records(c, milestones, deps).unwrap();
        let order = topological_sort(&g).unwrap();
        schedule(&g, &order).unwrap()
    }

    #[test]
    fn fork_with_one_long_branch() {
        // A(2) -> B(3), A -> C(1)
        let s = run(&[(1, Some(2)), (2, Some(3)), (3, Some(1))], &[(2, 1, true), (3, 1, true)]);
        let a = s.timing(id(1)).unwrap();
        let b = s.timing(id(2)).unwrap();
        let c = s.timing(id(3)).unwrap();

        assert_eq!(a.earliest_finish, days(2));
        assert_eq!((b.earliest_start, b.earliest_finish), (days(2), days(5)));
        assert_eq!((c.earliest_start, c.earliest_finish), (days(2), days(3)));
        assert_eq!(s.total_duration(), days(5));
        assert_eq!(s.critical_path_duration(), days(5));
        assert!(b.is_critical && a.is_critical);
        assert_eq!(c.slack, days(2));
        assert_eq!(c.free_slack, days(2));
        assert_eq!(s.slack_time(), days(2));
        assert_eq!(s.critical_chain(), &[id(1), id(2)]);
    }

    #[test]
    fn parallel_edges_do_not_constrain_timing() {
        let s = run(&[(1, Some(4)), (2, Some(1))], &[(2, 1, false)]);
        let b = s.timing(id(2)).unwrap();
        assert_eq!(b.earliest_start, Duration::zero());
        assert_eq!(s.total_duration(), days(4));
        assert_eq!(b.slack, days(3));
    }

    #[test]
    fn equal_branches_are_both_critical() {
        let s = run(
            &[(1, Some(1)), (2, Some(3)), (3, Some(3)), (4, Some(1))],
            &[(2, 1, true), (3, 1, true), (4, 2, true), (4, 3, true)],
        );
        assert_eq!(s.critical_milestones(), vec![id(1), id(2), id(3), id(4)]);
        assert_eq!(s.total_duration(), days(5));
        assert_eq!(s.critical_chain(), &[id(1), id(2), id(4)]);
    }

    #[test]
    fn zero_duration_gate_can_be_critical() {
        // gate 2 has no duration and sits between 1 and 3
        let s = run(
            &[(1, Some(2)), (2, None), (3, Some(2)), (4, Some(1))],
            &[(2, 1, true), (3, 2, true)],
        );
        let gate = s.timing(id(2)).unwrap();
        assert!(gate.is_critical);
        assert_eq!(gate.earliest_start, gate.earliest_finish);
        assert_eq!(s.timing(id(4)).unwrap().slack, days(3));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let c = ContractId::from_u128(1);
        let m = Milestone::new(c, "bad", 0)
            .with_id(id(1))
            .with_estimated_duration(Duration::days(-1));
        let g = ContractGraph::from_records(c, vec![m], vec![]).unwrap();
        let order = topological_sort(&g).unwrap();
        let err = schedule(&g, &order).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Duration(InconsistentDurationError::Negative { .. })
        ));
    }

    #[test]
    fn order_from_other_graph_is_rejected() {
        let c = ContractId::from_u128(1);
        let g1 = ContractGraph::from_records(c, vec![Milestone::new(c, "a", 0)], vec![]).unwrap();
        let g2 = ContractGraph::from_records(c, vec![Milestone::new(c, "b", 0)], vec![]).unwrap();
        let order = topological_sort(&g1).unwrap();
        assert!(matches!(schedule(&g2, &order), Err(ScheduleError::OrderMismatch(_))));
    }

    #[test]
    fn empty_contract_has_zero_duration() {
        let s = run(&[], &[]);
        assert_eq!(s.total_duration(), Duration::zero());
        assert!(s.critical_chain().is_empty());
    }

    #[test]
    fn calendar_window_offsets_from_anchor() {
        let s = run(&[(1, Some(2)), (2, Some(3))], &[(2, 1, true)]);
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let w = s.timing(id(2)).unwrap().at(anchor).unwrap();
        assert_eq!(w.earliest_start, anchor + days(2));
        assert_eq!(w.latest_finish, anchor + days(5));
    }

    #[test]
    fn timing_serializes_offsets_as_seconds() {
        let s = run(&[(1, Some(2)), (2, Some(1))], &[]);
        let json = serde_json::to_value(s.timing(id(2)).unwrap()).unwrap();
        assert_eq!(json["duration"], 86_400);
        assert_eq!(json["slack"], 86_400);
        assert_eq!(json["is_critical"], false);
    }

    #[test]
    fn calendar_window_outside_date_range_is_none() {
        let c = ContractId::from_u128(1);
        let m = Milestone::new(c, "aeon", 0)
            .with_id(id(1))
            .with_estimated_duration(Duration::seconds(9_000_000_000_000));
        let g = ContractGraph::from_records(c, vec![m], vec![]).unwrap();
        let s = schedule(&g, &topological_sort(&g).unwrap()).unwrap();
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(s.timing(id(1)).unwrap().at(anchor), None);
    }
}
