//! Contract dependency graph
//!
//! Assembles the milestones and dependency edges of one contract into a
//! bidirectional adjacency structure. The graph is always rebuilt from the
//! edge records; the authored `Milestone::dependencies` list is ignored.
//!
//! Building does not check acyclicity; that is the sorter's job
//! ([`crate::topo::topological_sort`]).

use crate::error::GraphBuildError;
use cheque_milestone::{
    ContractId, DependencyType, Milestone, MilestoneDependency, MilestoneId, MilestoneStore,
};
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, HashMap};

/// Adjacent milestone plus the strongest relationship to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Neighbouring milestone
    pub id: MilestoneId,
    /// Relationship kind (prerequisite wins over parallel)
    pub dependency_type: DependencyType,
}

/// One milestone and its neighbourhood
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The milestone record
    pub milestone: Milestone,
    /// Milestones this one depends on, sorted by ID
    pub predecessors: Vec<Link>,
    /// Milestones depending on this one, sorted by ID
    pub successors: Vec<Link>,
}

/// Per-contract adjacency view
#[derive(Debug, Clone)]
pub struct ContractGraph {
    contract_id: ContractId,
    nodes: BTreeMap<MilestoneId, GraphNode>,
    edges: Vec<MilestoneDependency>,
}

impl ContractGraph {
    /// Build from already-loaded records
    ///
    /// # Errors
    /// - `GraphBuildError::ForeignMilestone` if a milestone names another contract
    /// - `GraphBuildError::DuplicateMilestone` on repeated IDs
    /// - `GraphBuildError::DanglingEdge` if an edge endpoint is not among `milestones`
    pub fn from_records(
        contract_id: ContractId,
        milestones: Vec<Milestone>,
        dependencies: Vec<MilestoneDependency>,
    ) -> Result<Self, GraphBuildError> {
        let mut builder = GraphBuilder::new(contract_id);
        for milestone in milestones {
            builder.add_milestone(milestone)?;
        }
        for edge in dependencies {
            builder.add_dependency(edge)?;
        }
        Ok(builder.build())
    }

    /// Load a contract from the store and build its graph
    ///
    /// # Errors
    /// `GraphBuildError::Store` when the store cannot be read, plus everything
    /// [`ContractGraph::from_records`] reports.
    pub async fn load<S>(store: &S, contract_id: ContractId) -> Result<Self, GraphBuildError>
    where
        S: MilestoneStore + ?Sized,
    {
        let milestones = store.load_milestones(contract_id).await?;
        let dependencies = store.load_dependencies(contract_id).await?;
        tracing::debug!(
            %contract_id,
            milestones = milestones.len(),
            dependencies = dependencies.len(),
            "building contract graph"
        );
        Self::from_records(contract_id, milestones, dependencies).map_err(|e| {
            tracing::warn!(%contract_id, error = %e, "contract graph rejected");
            e
        })
    }

    /// Owning contract
    #[inline]
    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    /// Number of milestones
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the contract has no milestones
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the milestone is part of this graph
    #[inline]
    #[must_use]
    pub fn contains(&self, id: MilestoneId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node by milestone ID
    #[inline]
    #[must_use]
    pub fn node(&self, id: MilestoneId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Milestone record by ID
    #[inline]
    #[must_use]
    pub fn milestone(&self, id: MilestoneId) -> Option<&Milestone> {
        self.nodes.get(&id).map(|n| &n.milestone)
    }

    /// All milestones, in ID order
    pub fn milestones(&self) -> impl Iterator<Item = &Milestone> + '_ {
        self.nodes.values().map(|n| &n.milestone)
    }

    /// All nodes, in ID order
    pub fn nodes(&self) -> impl Iterator<Item = (&MilestoneId, &GraphNode)> + '_ {
        self.nodes.iter()
    }

    /// Stored edge records (duplicates included)
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[MilestoneDependency] {
        &self.edges
    }

    /// Direct predecessors of any kind
    #[must_use]
    pub fn predecessors(&self, id: MilestoneId) -> &[Link] {
        self.nodes.get(&id).map_or(&[], |n| n.predecessors.as_slice())
    }

    /// Direct successors of any kind
    #[must_use]
    pub fn successors(&self, id: MilestoneId) -> &[Link] {
        self.nodes.get(&id).map_or(&[], |n| n.successors.as_slice())
    }

    /// Predecessors that constrain timing
    pub fn prerequisites(&self, id: MilestoneId) -> impl Iterator<Item = MilestoneId> + '_ {
        self.predecessors(id)
            .iter()
            .filter(|l| l.dependency_type.constrains_timing())
            .map(|l| l.id)
    }

    /// Successors whose timing this milestone constrains
    pub fn dependents(&self, id: MilestoneId) -> impl Iterator<Item = MilestoneId> + '_ {
        self.successors(id)
            .iter()
            .filter(|l| l.dependency_type.constrains_timing())
            .map(|l| l.id)
    }

    /// Milestones with no predecessors of any kind
    #[must_use]
    pub fn sources(&self) -> Vec<MilestoneId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.predecessors.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Milestones with no successors of any kind
    #[must_use]
    pub fn sinks(&self) -> Vec<MilestoneId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.successors.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Edges touching a milestone
    pub fn incident_edges(
        &self,
        id: MilestoneId,
    ) -> impl Iterator<Item = &MilestoneDependency> + '_ {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Milestones grouped with `id` through parallel edges (either direction)
    #[must_use]
    pub fn parallel_group(&self, id: MilestoneId) -> Vec<MilestoneId> {
        let mut group: Vec<MilestoneId> = self
            .predecessors(id)
            .iter()
            .chain(self.successors(id))
            .filter(|l| l.dependency_type == DependencyType::Parallel)
            .map(|l| l.id)
            .collect();
        group.sort();
        group.dedup();
        group
    }

    /// Petgraph view with edges pointing prerequisite → dependent
    #[must_use]
    pub fn to_digraph(&self) -> DiGraphMap<MilestoneId, DependencyType> {
        let mut g = DiGraphMap::with_capacity(self.nodes.len(), self.edges.len());
        for id in self.nodes.keys() {
            g.add_node(*id);
        }
        for (id, node) in &self.nodes {
            for link in &node.successors {
                g.add_edge(*id, link.id, link.dependency_type);
            }
        }
        g
    }

    /// Copy of this graph with one more edge, for admission checks
    ///
    /// # Errors
    /// `GraphBuildError::DanglingEdge` if an endpoint is unknown.
    pub fn with_dependency(&self, edge: MilestoneDependency) -> Result<Self, GraphBuildError> {
        let mut builder = GraphBuilder::from_graph(self.clone());
        builder.add_dependency(edge)?;
        Ok(builder.build())
    }
}

/// Incremental builder for [`ContractGraph`]
#[derive(Debug)]
pub struct GraphBuilder {
    contract_id: ContractId,
    milestones: BTreeMap<MilestoneId, Milestone>,
    links: BTreeMap<(MilestoneId, MilestoneId), DependencyType>,
    edges: Vec<MilestoneDependency>,
}

impl GraphBuilder {
    /// Create empty builder for a contract
    #[inline]
    #[must_use]
    pub fn new(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            milestones: BTreeMap::new(),
            links: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    fn from_graph(graph: ContractGraph) -> Self {
        let mut links = BTreeMap::new();
        for (id, node) in &graph.nodes {
            for pred in &node.predecessors {
                links.insert((*id, pred.id), pred.dependency_type);
            }
        }
        Self {
            contract_id: graph.contract_id,
            milestones: graph
                .nodes
                .into_iter()
                .map(|(id, n)| (id, n.milestone))
                .collect(),
            links,
            edges: graph.edges,
        }
    }

    /// Add a milestone
    ///
    /// # Errors
    /// Rejects milestones of another contract and repeated IDs.
    pub fn add_milestone(&mut self, milestone: Milestone) -> Result<&mut Self, GraphBuildError> {
        if milestone.contract_id != self.contract_id {
            return Err(GraphBuildError::ForeignMilestone {
                milestone_id: milestone.id,
                expected: self.contract_id,
                actual: milestone.contract_id,
            });
        }
        if self.milestones.contains_key(&milestone.id) {
            return Err(GraphBuildError::DuplicateMilestone(milestone.id));
        }
        self.milestones.insert(milestone.id, milestone);
        Ok(self)
    }

    /// Add a dependency edge; both endpoints must already be added
    ///
    /// # Errors
    /// `GraphBuildError::DanglingEdge` naming the unresolved endpoint.
    pub fn add_dependency(
        &mut self,
        edge: MilestoneDependency,
    ) -> Result<&mut Self, GraphBuildError> {
        for endpoint in [edge.milestone_id, edge.depends_on_id] {
            if !self.milestones.contains_key(&endpoint) {
                return Err(GraphBuildError::DanglingEdge {
                    dependency_id: edge.id,
                    missing: endpoint,
                });
            }
        }

        // Prerequisite orders before Parallel, so min keeps the stronger kind
        self.links
            .entry((edge.milestone_id, edge.depends_on_id))
            .and_modify(|t| *t = (*t).min(edge.dependency_type))
            .or_insert(edge.dependency_type);
        self.edges.push(edge);
        Ok(self)
    }

    /// Finish the graph
    #[must_use]
    pub fn build(self) -> ContractGraph {
        let mut preds: HashMap<MilestoneId, Vec<Link>> = HashMap::new();
        let mut succs: HashMap<MilestoneId, Vec<Link>> = HashMap::new();

        // links iterate in (dependent, prerequisite) order, so each list comes out sorted
        for (&(dependent, prerequisite), &dependency_type) in &self.links {
            preds.entry(dependent).or_default().push(Link {
                id: prerequisite,
                dependency_type,
            });
            succs.entry(prerequisite).or_default().push(Link {
                id: dependent,
                dependency_type,
            });
        }

        let nodes = self
            .milestones
            .into_iter()
            .map(|(id, milestone)| {
                let mut successors = succs.remove(&id).unwrap_or_default();
                successors.sort_by_key(|l| l.id);
                let node = GraphNode {
                    milestone,
                    predecessors: preds.remove(&id).unwrap_or_default(),
                    successors,
                };
                (id, node)
            })
            .collect();

        ContractGraph {
            contract_id: self.contract_id,
            nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheque_milestone::{ContractSnapshot, MemoryStore};

    fn ms(contract: ContractId, n: u128) -> Milestone {
        Milestone::new(contract, format!("m{n}"), i32::try_from(n).unwrap())
            .with_id(MilestoneId::from_u128(n))
    }

    #[test]
    fn builds_both_directions() {
        let c = ContractId::new();
        let (a, b, d) = (ms(c, 1), ms(c, 2), ms(c, 3));
        let (ai, bi, di) = (a.id, b.id, d.id);
        let g = ContractGraph::from_records(
            c,
            vec![a, b, d],
            vec![
                MilestoneDependency::prerequisite(bi, ai),
                MilestoneDependency::parallel(di, ai),
            ],
        )
        .unwrap();

        assert_eq!(g.len(), 3);
        assert_eq!(g.successors(ai).len(), 2);
        assert_eq!(g.predecessors(bi)[0].id, ai);
        assert_eq!(g.dependents(ai).collect::<Vec<_>>(), vec![bi]);
        assert_eq!(g.prerequisites(di).count(), 0);
        assert_eq!(g.sources(), vec![ai]);
        assert_eq!(g.sinks(), vec![bi, di]);
        assert_eq!(g.parallel_group(ai), vec![di]);
    }

    #[test]
    fn dangling_edge_is_reported() {
        let c = ContractId::new();
        let a = ms(c, 1);
        let ghost = MilestoneId::from_u128(99);
        let edge = MilestoneDependency::prerequisite(a.id, ghost);
        let edge_id = edge.id;

        let err = ContractGraph::from_records(c, vec![a], vec![edge]).unwrap_err();
        assert_eq!(
            err,
            GraphBuildError::DanglingEdge {
                dependency_id: edge_id,
                missing: ghost,
            }
        );
    }

    #[test]
    fn foreign_milestone_is_rejected() {
        let c = ContractId::new();
        let other = ms(ContractId::new(), 1);
        let err = ContractGraph::from_records(c, vec![other], vec![]).unwrap_err();
        assert!(matches!(err, GraphBuildError::ForeignMilestone { .. }));
    }

    #[test]
    fn duplicate_pair_keeps_prerequisite() {
        let c = ContractId::new();
        let (a, b) = (ms(c, 1), ms(c, 2));
        let (ai, bi) = (a.id, b.id);
        let g = ContractGraph::from_records(
            c,
            vec![a, b],
            vec![
                MilestoneDependency::parallel(bi, ai),
                MilestoneDependency::prerequisite(bi, ai),
            ],
        )
        .unwrap();

        assert_eq!(g.predecessors(bi).len(), 1);
        assert_eq!(g.predecessors(bi)[0].dependency_type, DependencyType::Prerequisite);
        assert_eq!(g.edges().len(), 2);
        assert_eq!(g.incident_edges(ai).count(), 2);
    }

    #[test]
    fn authored_dependency_list_is_ignored() {
        let c = ContractId::new();
        let a = ms(c, 1);
        let mut b = ms(c, 2);
        b.dependencies.push(a.id);
        let bi = b.id;
        let g = ContractGraph::from_records(c, vec![a, b], vec![]).unwrap();
        assert!(g.predecessors(bi).is_empty());
    }

    #[test]
    fn with_dependency_does_not_touch_original() {
        let c = ContractId::new();
        let (a, b) = (ms(c, 1), ms(c, 2));
        let (ai, bi) = (a.id, b.id);
        let g = ContractGraph::from_records(c, vec![a, b], vec![]).unwrap();
        let extended = g
            .with_dependency(MilestoneDependency::prerequisite(bi, ai))
            .unwrap();
        assert!(g.predecessors(bi).is_empty());
        assert_eq!(extended.predecessors(bi)[0].id, ai);
        assert_eq!(extended.to_digraph().edge_count(), 1);
    }

    #[tokio::test]
    async fn load_surfaces_store_outage() {
        let c = ContractId::new();
        let store = MemoryStore::from_snapshot(ContractSnapshot {
            contract_id: c,
            milestones: vec![ms(c, 1)],
            ..Default::default()
        });
        assert_eq!(ContractGraph::load(&store, c).await.unwrap().len(), 1);

        store.set_offline(true);
        let err = ContractGraph::load(&store, c).await.unwrap_err();
        assert!(matches!(err, GraphBuildError::Store(_)));
    }
}
