//! Deterministic topological ordering with cycle reporting
//!
//! Kahn's algorithm over every edge of the contract graph (prerequisite and
//! parallel alike). Among milestones that become eligible at the same time,
//! the lowest `sequence_number` goes first, then the lowest ID, so the same
//! graph always yields the same order.
//!
//! When the sort stalls, the leftover milestones are split into those that
//! lie on a cycle (strongly connected components of size > 1, or self-loops)
//! and those merely blocked downstream of one.

use crate::error::CycleDetectedError;
use crate::graph::ContractGraph;
use cheque_milestone::{ContractId, MilestoneId};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// Validated linear order of a contract's milestones.
///
/// Only [`topological_sort`] constructs this type, so holding one proves the
/// graph it came from was acyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalOrder {
    contract_id: ContractId,
    order: Vec<MilestoneId>,
    positions: HashMap<MilestoneId, usize>,
}

impl TopologicalOrder {
    fn new(contract_id: ContractId, order: Vec<MilestoneId>) -> Self {
        let positions = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self {
            contract_id,
            order,
            positions,
        }
    }

    /// Contract the order belongs to
    #[inline]
    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    /// Ordered milestone IDs
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[MilestoneId] {
        &self.order
    }

    /// Iterate in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = MilestoneId> + '_ {
        self.order.iter().copied()
    }

    /// Position of a milestone in the order
    #[inline]
    #[must_use]
    pub fn position(&self, id: MilestoneId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Number of milestones
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the order is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Take the ordered IDs
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<MilestoneId> {
        self.order
    }
}

/// Sort the graph, or report every milestone on a cycle
///
/// # Errors
/// `CycleDetectedError` when some milestones can never become eligible.
pub fn topological_sort(graph: &ContractGraph) -> Result<TopologicalOrder, CycleDetectedError> {
    let mut in_degree: HashMap<MilestoneId, usize> = graph
        .nodes()
        .map(|(id, node)| (*id, node.predecessors.len()))
        .collect();

    let key = |id: MilestoneId| {
        let seq = graph.milestone(id).map_or(0, |m| m.sequence_number);
        Reverse((seq, id))
    };

    let mut ready: BinaryHeap<Reverse<(i32, MilestoneId)>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| key(*id))
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id);
        for link in graph.successors(id) {
            if let Some(d) = in_degree.get_mut(&link.id) {
                *d -= 1;
                if *d == 0 {
                    ready.push(key(link.id));
                }
            }
        }
    }

    if order.len() == graph.len() {
        tracing::trace!(
            contract_id = %graph.contract_id(),
            milestones = order.len(),
            "topological order computed"
        );
        return Ok(TopologicalOrder::new(graph.contract_id(), order));
    }

    let remaining: BTreeSet<MilestoneId> = in_degree
        .into_iter()
        .filter(|(_, d)| *d > 0)
        .map(|(id, _)| id)
        .collect();
    let err = cycle_report(graph, &remaining);
    tracing::debug!(
        contract_id = %graph.contract_id(),
        on_cycle = err.cycle_members.len(),
        blocked = err.blocked.len(),
        "dependency cycle detected"
    );
    Err(err)
}

/// Whether the graph is acyclic (the sort reduced to a boolean)
#[inline]
#[must_use]
pub fn is_acyclic(graph: &ContractGraph) -> bool {
    topological_sort(graph).is_ok()
}

fn cycle_report(graph: &ContractGraph, remaining: &BTreeSet<MilestoneId>) -> CycleDetectedError {
    let mut sub: DiGraphMap<MilestoneId, ()> = DiGraphMap::new();
    for id in remaining {
        sub.add_node(*id);
        for link in graph.successors(*id) {
            if remaining.contains(&link.id) {
                sub.add_edge(*id, link.id, ());
            }
        }
    }

    let mut cycles: Vec<Vec<MilestoneId>> = tarjan_scc(&sub)
        .into_iter()
        .filter(|scc| scc.len() > 1 || sub.contains_edge(scc[0], scc[0]))
        .map(|mut scc| {
            scc.sort();
            scc
        })
        .collect();
    cycles.sort();

    let members: BTreeSet<MilestoneId> = cycles.iter().flatten().copied().collect();
    let blocked = remaining.difference(&members).copied().collect();

    CycleDetectedError {
        contract_id: graph.contract_id(),
        cycle_members: members.into_iter().collect(),
        cycles,
        blocked,
    }
}
