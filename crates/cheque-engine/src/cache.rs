//! Per-contract schedule cache using moka
//!
//! Holds the graph, order and CPM result of each recently read contract.
//! Entries are filled on read and dropped on any committed write to the
//! contract; only successful computations are cached.

use cheque_milestone::ContractId;
use cheque_schedule::ContractSchedule;
use moka::future::Cache;
use std::sync::Arc;

/// Cache performance counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Computed schedules keyed by contract
#[derive(Debug, Clone)]
pub struct ScheduleCache {
    inner: Option<Cache<ContractId, Arc<ContractSchedule>>>,
}

impl ScheduleCache {
    /// Create cache with max capacity; zero disables caching
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: (max_capacity > 0).then(|| Cache::new(max_capacity)),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: std::time::Duration) -> Self {
        Self {
            inner: (max_capacity > 0).then(|| {
                Cache::builder()
                    .max_capacity(max_capacity)
                    .time_to_live(ttl)
                    .build()
            }),
        }
    }

    /// Whether entries are kept at all
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Cached schedule of a contract
    pub async fn get(&self, contract: ContractId) -> Option<Arc<ContractSchedule>> {
        let cache = self.inner.as_ref()?;
        let hit = cache.get(&contract).await;
        if hit.is_some() {
            metrics::counter!("cheque_schedule_cache_hits_total").increment(1);
            tracing::trace!(contract_id = %contract, "schedule cache hit");
        } else {
            metrics::counter!("cheque_schedule_cache_misses_total").increment(1);
        }
        hit
    }

    /// Store a computed schedule
    pub async fn insert(&self, contract: ContractId, schedule: Arc<ContractSchedule>) {
        if let Some(cache) = &self.inner {
            cache.insert(contract, schedule).await;
        }
    }

    /// Drop a contract's entry
    pub async fn invalidate(&self, contract: ContractId) {
        if let Some(cache) = &self.inner {
            cache.invalidate(&contract).await;
            metrics::counter!("cheque_schedule_cache_invalidations_total").increment(1);
            tracing::debug!(contract_id = %contract, "schedule cache invalidated");
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }

    /// Get cache statistics
    ///
    /// Counts lag behind writes until moka runs its pending maintenance.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.as_ref().map_or(0, Cache::entry_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheque_milestone::Milestone;
    use cheque_schedule::ContractGraph;

    fn schedule(contract: ContractId) -> Arc<ContractSchedule> {
        let graph =
            ContractGraph::from_records(contract, vec![Milestone::new(contract, "a", 1)], vec![])
                .unwrap();
        Arc::new(ContractSchedule::compute(graph).unwrap())
    }

    #[tokio::test]
    async fn insert_get_invalidate() {
        let cache = ScheduleCache::new(8);
        let contract = ContractId::from_u128(7);
        assert!(cache.get(contract).await.is_none());

        cache.insert(contract, schedule(contract)).await;
        let hit = cache.get(contract).await.unwrap();
        assert_eq!(hit.graph().contract_id(), contract);

        cache.invalidate(contract).await;
        assert!(cache.get(contract).await.is_none());
    }

    #[tokio::test]
    async fn zero_capacity_disables() {
        let cache = ScheduleCache::new(0);
        let contract = ContractId::from_u128(7);
        cache.insert(contract, schedule(contract)).await;
        assert!(!cache.is_enabled());
        assert!(cache.get(contract).await.is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }
}
