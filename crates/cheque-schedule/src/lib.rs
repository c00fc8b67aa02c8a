//! Cheque Schedule - dependency graphs, ordering and critical-path analysis
//!
//! The pipeline runs in three stages, each producing the input of the next:
//!
//! 1. [`ContractGraph`]: milestones and edges of one contract, with
//!    predecessors and successors per milestone
//! 2. [`TopologicalOrder`]: a deterministic Kahn order, or a
//!    [`CycleDetectedError`] naming every milestone on a cycle
//! 3. [`CpmSchedule`]: earliest/latest start and finish, slack and the
//!    critical chain
//!
//! [`ContractSchedule::compute`] runs all three.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cpm;
pub mod error;
pub mod graph;
pub mod topo;

pub use cpm::{schedule, CalendarWindow, CpmSchedule, MilestoneTiming};
pub use error::{CycleDetectedError, GraphBuildError, InconsistentDurationError, ScheduleError};
pub use graph::{ContractGraph, GraphBuilder, GraphNode, Link};
pub use topo::{is_acyclic, topological_sort, TopologicalOrder};

use chrono::{DateTime, Utc};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Graph, order and CPM result of one contract, computed together
#[derive(Debug, Clone)]
pub struct ContractSchedule {
    graph: ContractGraph,
    order: TopologicalOrder,
    cpm: CpmSchedule,
}

impl ContractSchedule {
    /// Sort and schedule a graph
    ///
    /// # Errors
    /// `ScheduleError::Cycle` for cyclic graphs, `ScheduleError::Duration` for
    /// negative durations.
    pub fn compute(graph: ContractGraph) -> Result<Self, ScheduleError> {
        let order = topological_sort(&graph)?;
        let cpm = schedule(&graph, &order)?;
        Ok(Self { graph, order, cpm })
    }

    /// The graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &ContractGraph {
        &self.graph
    }

    /// The topological order
    #[inline]
    #[must_use]
    pub fn order(&self) -> &TopologicalOrder {
        &self.order
    }

    /// The CPM result
    #[inline]
    #[must_use]
    pub fn cpm(&self) -> &CpmSchedule {
        &self.cpm
    }

    /// Earliest planned start over all milestones
    ///
    /// Used as schedule zero when no explicit anchor is configured.
    #[must_use]
    pub fn earliest_planned_start(&self) -> Option<DateTime<Utc>> {
        self.graph
            .milestones()
            .filter_map(|m| m.estimated_start_date)
            .min()
    }
}
