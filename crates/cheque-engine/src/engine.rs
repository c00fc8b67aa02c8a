//! Milestone scheduling engine
//!
//! The facade callers talk to. It owns:
//! - the store handle
//! - a per-contract lock table (reads share, writes exclude)
//! - a cache of computed schedules, dropped on every committed write
//!
//! Reads go store → graph → order → CPM → aggregation. Writes go through the
//! batch coordinator and land in one store transaction.

use crate::batch::{BatchOutcome, MilestoneBatch, WorkingCopy};
use crate::cache::ScheduleCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::locks::ContractLocks;
use cheque_analytics::{
    resolve_anchor, CompletionStats, DelayReport, DueResolver, ProgressTrend, RiskAnalysis,
    TimelineAnalysis,
};
use cheque_milestone::{
    ContractId, DependencyId, Milestone, MilestoneDependency, MilestoneId, MilestoneStatus,
    MilestoneStore, MilestoneUpdate, ProgressUpdate, StoreOp,
};
use cheque_schedule::{is_acyclic, topological_sort, ContractGraph, ContractSchedule};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// Scheduling engine over a [`MilestoneStore`]
#[derive(Debug)]
pub struct MilestoneEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
    cache: ScheduleCache,
    locks: ContractLocks,
}

impl<S: MilestoneStore> MilestoneEngine<S> {
    /// Create engine with validated configuration
    ///
    /// # Errors
    /// `EngineError::Config` if `config` fails validation.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let cache = match config.cache_ttl.and_then(|ttl| ttl.to_std().ok()) {
            Some(ttl) => ScheduleCache::with_ttl(config.cache_capacity, ttl),
            None => ScheduleCache::new(config.cache_capacity),
        };
        Ok(Self {
            store,
            config,
            cache,
            locks: ContractLocks::new(),
        })
    }

    /// Create engine with default configuration
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            cache: ScheduleCache::new(config.cache_capacity),
            config,
            locks: ContractLocks::new(),
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Schedule cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ScheduleCache {
        &self.cache
    }

    /// Drop the cached schedule of a contract written to outside the engine
    pub async fn invalidate(&self, contract: ContractId) {
        let _guard = self.locks.write(contract).await;
        self.cache.invalidate(contract).await;
    }

    // ---- reads ------------------------------------------------------------

    /// Graph, order and CPM result of a contract
    ///
    /// # Errors
    /// Store failures, dangling edges, cycles and negative durations.
    pub async fn schedule(
        &self,
        contract: ContractId,
    ) -> Result<Arc<ContractSchedule>, EngineError> {
        let _guard = self.locks.read(contract).await;
        self.schedule_locked(contract).await
    }

    async fn schedule_locked(
        &self,
        contract: ContractId,
    ) -> Result<Arc<ContractSchedule>, EngineError> {
        if let Some(cached) = self.cache.get(contract).await {
            return Ok(cached);
        }
        let graph = ContractGraph::load(self.store.as_ref(), contract).await?;
        let schedule = Arc::new(ContractSchedule::compute(graph)?);
        self.cache.insert(contract, Arc::clone(&schedule)).await;
        Ok(schedule)
    }

    /// Whether the contract's dependency graph is acyclic
    ///
    /// # Errors
    /// Store failures and dangling edges; a cycle is `Ok(false)`.
    pub async fn validate_dependency_graph(
        &self,
        contract: ContractId,
    ) -> Result<bool, EngineError> {
        let _guard = self.locks.read(contract).await;
        if self.cache.get(contract).await.is_some() {
            return Ok(true);
        }
        let graph = ContractGraph::load(self.store.as_ref(), contract).await?;
        let acyclic = is_acyclic(&graph);
        if !acyclic {
            tracing::info!(contract_id = %contract, "dependency graph is cyclic");
        }
        Ok(acyclic)
    }

    /// Milestone IDs with every prerequisite before its dependents
    ///
    /// # Errors
    /// `CycleDetectedError` (as `EngineError::Schedule`) naming every
    /// milestone on a cycle, plus store failures and dangling edges.
    pub async fn topological_order(
        &self,
        contract: ContractId,
    ) -> Result<Vec<MilestoneId>, EngineError> {
        let _guard = self.locks.read(contract).await;
        if let Some(cached) = self.cache.get(contract).await {
            return Ok(cached.order().as_slice().to_vec());
        }
        let graph = ContractGraph::load(self.store.as_ref(), contract).await?;
        Ok(topological_sort(&graph)?.into_vec())
    }

    /// Zero-slack milestones in topological order, flagged from the fresh computation
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports.
    pub async fn critical_path_milestones(
        &self,
        contract: ContractId,
    ) -> Result<Vec<Milestone>, EngineError> {
        let schedule = self.schedule(contract).await?;
        Ok(schedule
            .cpm()
            .critical_milestones()
            .into_iter()
            .filter_map(|id| schedule.graph().milestone(id).cloned())
            .map(|mut m| {
                m.critical_path = true;
                m
            })
            .collect())
    }

    /// CPM offsets and calendar windows of every milestone
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports.
    pub async fn timeline_analysis(
        &self,
        contract: ContractId,
    ) -> Result<TimelineAnalysis, EngineError> {
        let schedule = self.schedule(contract).await?;
        let anchor = resolve_anchor(self.config.schedule_start, &schedule);
        Ok(TimelineAnalysis::build(&schedule, anchor))
    }

    /// Timelines of several contracts, computed concurrently
    pub async fn timelines_for(
        &self,
        contracts: &[ContractId],
    ) -> Vec<(ContractId, Result<TimelineAnalysis, EngineError>)> {
        join_all(
            contracts
                .iter()
                .map(|&contract| async move { (contract, self.timeline_analysis(contract).await) }),
        )
        .await
    }

    /// Completion counts as of `now`
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports.
    pub async fn completion_stats(
        &self,
        contract: ContractId,
        now: DateTime<Utc>,
    ) -> Result<CompletionStats, EngineError> {
        let schedule = self.schedule(contract).await?;
        let anchor = resolve_anchor(self.config.schedule_start, &schedule);
        let due = DueResolver::with_schedule(schedule.cpm(), anchor);
        Ok(CompletionStats::compute(schedule.graph().milestones(), &due, now))
    }

    /// Risk buckets, scores and contingency plans
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports.
    pub async fn risk_analysis(&self, contract: ContractId) -> Result<RiskAnalysis, EngineError> {
        let schedule = self.schedule(contract).await?;
        Ok(RiskAnalysis::compute(&schedule, &self.config.risk_weights)?)
    }

    /// Overdue milestones as of `now`, most delayed first
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports.
    pub async fn delayed_milestones_report(
        &self,
        contract: ContractId,
        now: DateTime<Utc>,
    ) -> Result<DelayReport, EngineError> {
        let schedule = self.schedule(contract).await?;
        let anchor = resolve_anchor(self.config.schedule_start, &schedule);
        let due = DueResolver::with_schedule(schedule.cpm(), anchor);
        Ok(DelayReport::compute(
            schedule.graph().milestones(),
            &due,
            Some(schedule.cpm()),
            now,
        ))
    }

    /// Completion over time from recorded progress history
    ///
    /// Does not need an acyclic graph.
    ///
    /// # Errors
    /// Store failures and invalid bucket widths.
    pub async fn progress_trend(
        &self,
        contract: ContractId,
        now: DateTime<Utc>,
    ) -> Result<ProgressTrend, EngineError> {
        let _guard = self.locks.read(contract).await;
        let ids: HashSet<MilestoneId> = self
            .store
            .load_milestones(contract)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let history = self.store.load_progress_history(contract).await?;
        Ok(ProgressTrend::compute(&ids, &history, self.config.trend_bucket, now)?)
    }

    // ---- writes -----------------------------------------------------------

    /// Validate and commit a batch, stamping status changes with the current time
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn apply_batch(&self, batch: MilestoneBatch) -> Result<BatchOutcome, EngineError> {
        self.apply_batch_at(batch, Utc::now()).await
    }

    /// Validate and commit a batch as of `now`
    ///
    /// Nothing is written unless every mutation passes.
    ///
    /// # Errors
    /// - `EngineError::BatchRejected` naming the first failing mutation
    /// - `EngineError::Store` if the store refuses the transaction
    pub async fn apply_batch_at(
        &self,
        batch: MilestoneBatch,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, EngineError> {
        let contract = batch.contract_id;
        let _guard = self.locks.write(contract).await;

        let milestones = self.store.load_milestones(contract).await?;
        let dependencies = self.store.load_dependencies(contract).await?;
        let mut working = WorkingCopy::new(contract, milestones, dependencies);

        let referenced: HashSet<MilestoneId> = batch
            .mutations
            .iter()
            .flat_map(|m| m.referenced_milestones())
            .filter(|id| !working.contains(*id))
            .collect();
        for id in referenced {
            if let Some(other) = self.store.load_milestone(id).await? {
                if other.contract_id != contract {
                    working.note_foreign(id, other.contract_id);
                }
            }
        }

        let plan = working.plan(&batch, now).map_err(|(index, source)| {
            tracing::debug!(contract_id = %contract, index, error = %source, "batch rejected");
            EngineError::rejected(index, source)
        })?;

        if plan.ops.is_empty() {
            return Ok(plan.outcome);
        }

        self.store.apply(contract, plan.ops).await?;
        self.cache.invalidate(contract).await;
        tracing::info!(
            contract_id = %contract,
            operations = plan.outcome.operations,
            cascaded = plan.outcome.cascaded_dependencies,
            "batch committed"
        );

        if self.config.persist_critical_flags && plan.outcome.schedule_changed {
            if let Err(e) = self.sync_locked(contract).await {
                tracing::warn!(
                    contract_id = %contract,
                    error = %e,
                    "critical-path flags not synced"
                );
            }
        }
        Ok(plan.outcome)
    }

    /// Move several milestones to one status
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn update_status(
        &self,
        contract: ContractId,
        ids: Vec<MilestoneId>,
        status: MilestoneStatus,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).set_status(ids, status))
            .await
    }

    /// Record progress on several milestones
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn update_progress(
        &self,
        contract: ContractId,
        updates: Vec<ProgressUpdate>,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).set_progress(updates))
            .await
    }

    /// Add a milestone to its contract
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn create_milestone(
        &self,
        milestone: Milestone,
    ) -> Result<BatchOutcome, EngineError> {
        let contract = milestone.contract_id;
        self.apply_batch(MilestoneBatch::new(contract).create(milestone))
            .await
    }

    /// Edit authored fields of a milestone
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn update_milestone(
        &self,
        contract: ContractId,
        id: MilestoneId,
        update: MilestoneUpdate,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).update(id, update))
            .await
    }

    /// Delete a milestone together with every edge touching it
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn delete_milestone(
        &self,
        contract: ContractId,
        id: MilestoneId,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).delete(id))
            .await
    }

    /// Admit a dependency edge
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`]; an edge closing a cycle is
    /// rejected with the would-be cycle.
    pub async fn add_dependency(
        &self,
        contract: ContractId,
        edge: MilestoneDependency,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).add_dependency(edge))
            .await
    }

    /// Remove a dependency edge
    ///
    /// # Errors
    /// See [`MilestoneEngine::apply_batch_at`].
    pub async fn remove_dependency(
        &self,
        contract: ContractId,
        id: DependencyId,
    ) -> Result<BatchOutcome, EngineError> {
        self.apply_batch(MilestoneBatch::new(contract).remove_dependency(id))
            .await
    }

    /// Write the current critical-path projection to each milestone's flag
    ///
    /// Returns the number of milestones whose flag changed.
    ///
    /// # Errors
    /// Everything [`MilestoneEngine::schedule`] reports, plus store write failures.
    pub async fn sync_critical_path(&self, contract: ContractId) -> Result<usize, EngineError> {
        let _guard = self.locks.write(contract).await;
        self.sync_locked(contract).await
    }

    async fn sync_locked(&self, contract: ContractId) -> Result<usize, EngineError> {
        let schedule = self.schedule_locked(contract).await?;
        let ops: Vec<StoreOp> = schedule
            .graph()
            .milestones()
            .filter(|m| m.critical_path != schedule.cpm().is_critical(m.id))
            .map(|m| {
                let mut m = m.clone();
                m.critical_path = !m.critical_path;
                StoreOp::ReplaceMilestone(m)
            })
            .collect();
        let changed = ops.len();
        if changed > 0 {
            self.store.apply(contract, ops).await?;
            self.cache.invalidate(contract).await;
            tracing::debug!(contract_id = %contract, changed, "critical-path flags synced");
        }
        Ok(changed)
    }
}
