//! Memoization of compiled template plans.
//!
//! Plans are cached per template id and evicted on template/field mutation.
//! Eviction is idempotent: invalidating an absent entry is a no-op, and the
//! next access rebuilds exactly once.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;

use super::plan::TemplatePlan;

/// LRU cache of compiled plans keyed by template id.
pub struct PlanCache {
    inner: Mutex<LruCache<String, Arc<TemplatePlan>>>,
    rebuilds: AtomicU64,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(256).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// Fetch a cached plan.
    pub fn get(&self, template_id: &str) -> Option<Arc<TemplatePlan>> {
        self.inner
            .lock()
            .expect("plan cache poisoned")
            .get(template_id)
            .cloned()
    }

    /// Store a freshly compiled plan.
    pub fn insert(&self, plan: Arc<TemplatePlan>) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .expect("plan cache poisoned")
            .put(plan.template_id.clone(), plan);
    }

    /// Evict the plan for a template. Safe to call repeatedly; absent
    /// entries are ignored.
    pub fn invalidate(&self, template_id: &str) {
        self.inner
            .lock()
            .expect("plan cache poisoned")
            .pop(template_id);
    }

    /// Number of plan compilations since startup (for tests/metrics).
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("plan cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::test_fixtures::{field, template};

    fn plan(id: &str) -> Arc<TemplatePlan> {
        let tmpl = template(id, "formdata", 1);
        let fields = vec![field("FF1", id, "name", "field_01")];
        Arc::new(TemplatePlan::build(&tmpl, &fields, &[], None).unwrap())
    }

    #[test]
    fn test_get_insert_round_trip() {
        let cache = PlanCache::new(8);
        assert!(cache.get("FT1").is_none());

        cache.insert(plan("FT1"));
        assert!(cache.get("FT1").is_some());
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn test_double_invalidation_is_idempotent() {
        let cache = PlanCache::new(8);
        cache.insert(plan("FT1"));

        cache.invalidate("FT1");
        cache.invalidate("FT1");
        assert!(cache.get("FT1").is_none());

        // Next access rebuilds exactly once.
        cache.insert(plan("FT1"));
        assert_eq!(cache.rebuild_count(), 2);
        assert!(cache.get("FT1").is_some());
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = PlanCache::new(2);
        cache.insert(plan("FT1"));
        cache.insert(plan("FT2"));
        cache.insert(plan("FT3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("FT1").is_none());
        assert!(cache.get("FT3").is_some());
    }
}
