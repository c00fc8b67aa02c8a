use cheque_milestone::{ContractId, Milestone, MilestoneDependency, MilestoneId};
use cheque_schedule::{is_acyclic, schedule, topological_sort, ContractGraph, ContractSchedule};
use chrono::Duration;
use proptest::prelude::*;
use std::collections::HashSet;

const CONTRACT: ContractId = ContractId::from_u128(0xC0);

fn mid(i: usize) -> MilestoneId {
    MilestoneId::from_u128(i as u128 + 1)
}

/// Nodes `0..n` with random sequence numbers and durations; edges only point
/// from a higher index to a lower one, so the graph is always acyclic.
fn build(
    n: usize,
    seqs: &[i32],
    hours: &[i64],
    raw_edges: &[(usize, usize, bool)],
) -> ContractGraph {
    let milestones = (0..n)
        .map(|i| {
            Milestone::new(CONTRACT, format!("m{i}"), seqs[i])
                .with_id(mid(i))
                .with_estimated_duration(Duration::hours(hours[i]))
        })
        .collect();
    let deps = raw_edges
        .iter()
        .filter(|(a, b, _)| *a < n && *b < n && a != b)
        .map(|&(a, b, hard)| {
            let (dependent, prereq) = if a > b { (a, b) } else { (b, a) };
            if hard {
                MilestoneDependency::prerequisite(mid(dependent), mid(prereq))
            } else {
                MilestoneDependency::parallel(mid(dependent), mid(prereq))
            }
        })
        .collect();
    ContractGraph::from_records(CONTRACT, milestones, deps).unwrap()
}

fn dag_strategy() -> impl Strategy<Value = ContractGraph> {
    (1..16usize).prop_flat_map(|n| {
        (
            Just(n),
            proptest::collection::vec(-3..4i32, n),
            proptest::collection::vec(0..48i64, n),
            proptest::collection::vec((0..n, 0..n, any::<bool>()), 0..40),
        )
            .prop_map(|(n, seqs, hours, edges)| build(n, &seqs, &hours, &edges))
    })
}

proptest! {
    #[test]
    fn prop_order_is_a_permutation_respecting_edges(graph in dag_strategy()) {
        let order = topological_sort(&graph).unwrap();

        let seen: HashSet<_> = order.iter().collect();
        prop_assert_eq!(seen.len(), graph.len());
        prop_assert_eq!(order.len(), graph.len());

        for edge in graph.edges() {
            let before = order.position(edge.depends_on_id).unwrap();
            let after = order.position(edge.milestone_id).unwrap();
            prop_assert!(before < after);
        }
    }

    #[test]
    fn prop_order_is_deterministic(graph in dag_strategy()) {
        let first = topological_sort(&graph).unwrap();
        let rebuilt = ContractGraph::from_records(
            CONTRACT,
            {
                let mut ms: Vec<_> = graph.milestones().cloned().collect();
                ms.reverse();
                ms
            },
            graph.edges().iter().cloned().rev().collect(),
        )
        .unwrap();
        let second = topological_sort(&rebuilt).unwrap();
        prop_assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn prop_cpm_slack_invariants(graph in dag_strategy()) {
        let order = topological_sort(&graph).unwrap();
        let cpm = schedule(&graph, &order).unwrap();

        for t in cpm.timings() {
            prop_assert_eq!(t.slack, t.latest_start - t.earliest_start);
            prop_assert_eq!(t.slack, t.latest_finish - t.earliest_finish);
            prop_assert!(t.slack >= Duration::zero());
            prop_assert!(t.free_slack >= Duration::zero());
            prop_assert!(t.free_slack <= t.slack);
        }

        let max_sink_finish = graph
            .sinks()
            .into_iter()
            .filter_map(|id| cpm.timing(id))
            .map(|t| t.earliest_finish)
            .max()
            .unwrap_or_else(Duration::zero);
        prop_assert_eq!(cpm.total_duration(), cpm.critical_path_duration());
        prop_assert!(cpm.total_duration() >= max_sink_finish);
    }

    #[test]
    fn prop_critical_milestones_lie_on_zero_slack_chains(graph in dag_strategy()) {
        let s = ContractSchedule::compute(graph).unwrap();
        let cpm = s.cpm();
        let g = s.graph();

        for id in cpm.critical_milestones() {
            let t = cpm.timing(id).unwrap();
            // a critical milestone either starts at zero or has a critical
            // prerequisite finishing exactly when it starts
            let backed = t.earliest_start == Duration::zero()
                || g.prerequisites(id).any(|p| {
                    let pt = cpm.timing(p).unwrap();
                    pt.is_critical && pt.earliest_finish == t.earliest_start
                });
            // and either finishes at the end or feeds a critical dependent
            let forward = t.earliest_finish == cpm.total_duration()
                || g.dependents(id).any(|d| {
                    let dt = cpm.timing(d).unwrap();
                    dt.is_critical && dt.earliest_start == t.earliest_finish
                });
            prop_assert!(backed && forward);
        }

        let chain = cpm.critical_chain();
        prop_assert!(!chain.is_empty());
        for pair in chain.windows(2) {
            prop_assert!(g.prerequisites(pair[1]).any(|p| p == pair[0]));
        }
    }

    #[test]
    fn prop_back_edge_creates_reported_cycle(graph in dag_strategy()) {
        let order = topological_sort(&graph).unwrap();
        // close a cycle over the first edge, if any
        if let Some(edge) = graph.edges().first() {
            let closing = MilestoneDependency::prerequisite(edge.depends_on_id, edge.milestone_id);
            let cyclic = graph.with_dependency(closing).unwrap();
            prop_assert!(!is_acyclic(&cyclic));
            let err = topological_sort(&cyclic).unwrap_err();
            prop_assert!(err.involves(edge.depends_on_id));
            prop_assert!(err.involves(edge.milestone_id));
        } else {
            prop_assert_eq!(order.len(), graph.len());
        }
    }
}

#[test]
fn fork_scenario_matches_hand_computation() {
    // A(2) -> B(3), A -> C(1)
    let a = Milestone::new(CONTRACT, "A", 1)
        .with_id(mid(0))
        .with_estimated_duration(Duration::days(2));
    let b = Milestone::new(CONTRACT, "B", 2)
        .with_id(mid(1))
        .with_estimated_duration(Duration::days(3));
    let c = Milestone::new(CONTRACT, "C", 3)
        .with_id(mid(2))
        .with_estimated_duration(Duration::days(1));
    let deps = vec![
        MilestoneDependency::prerequisite(b.id, a.id),
        MilestoneDependency::prerequisite(c.id, a.id),
    ];
    let graph = ContractGraph::from_records(CONTRACT, vec![a, b, c], deps).unwrap();
    let s = ContractSchedule::compute(graph).unwrap();

    assert_eq!(s.order().as_slice()[0], mid(0));
    let cpm = s.cpm();
    assert_eq!(cpm.timing(mid(0)).unwrap().earliest_finish, Duration::days(2));
    assert_eq!(cpm.timing(mid(1)).unwrap().earliest_start, Duration::days(2));
    assert_eq!(cpm.timing(mid(1)).unwrap().earliest_finish, Duration::days(5));
    assert_eq!(cpm.timing(mid(2)).unwrap().earliest_start, Duration::days(2));
    assert_eq!(cpm.timing(mid(2)).unwrap().earliest_finish, Duration::days(3));
    assert_eq!(cpm.total_duration(), Duration::days(5));
    assert_eq!(cpm.timing(mid(1)).unwrap().slack, Duration::zero());
    assert_eq!(cpm.timing(mid(2)).unwrap().slack, Duration::days(2));
}

#[test]
fn mutual_dependency_is_reported() {
    let a = Milestone::new(CONTRACT, "A", 1).with_id(mid(0));
    let b = Milestone::new(CONTRACT, "B", 2).with_id(mid(1));
    let deps = vec![
        MilestoneDependency::prerequisite(a.id, b.id),
        MilestoneDependency::prerequisite(b.id, a.id),
    ];
    let graph = ContractGraph::from_records(CONTRACT, vec![a, b], deps).unwrap();
    assert!(!is_acyclic(&graph));
    let err = ContractSchedule::compute(graph).unwrap_err();
    let cycle = err.as_cycle().unwrap();
    assert_eq!(cycle.cycle_members, vec![mid(0), mid(1)]);
}
