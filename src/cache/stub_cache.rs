//! Stub cache (C8): caches loader handles keyed by `(tenantId, workerId)`,
//! guarded by worker version. See spec.md §4.8.

use std::sync::Arc;

use dashmap::DashMap;

use crate::common::{TenantId, WorkerId, Version};
use crate::loader::Stub;

struct Entry {
    version: Version,
    stub: Arc<dyn Stub>,
}

/// Does not single-flight stub acquisition (spec §5): concurrent cold
/// starts for the same key are the loader's problem, and the façade writes
/// the winning stub idempotently — all stubs for a given version are
/// equivalent, so last-writer-wins is safe.
#[derive(Default)]
pub struct StubCache {
    entries: DashMap<(TenantId, WorkerId), Entry>,
}

impl StubCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast path: returns the cached stub only if its version still
    /// matches `version`; otherwise `None` so the caller cold-starts.
    pub fn get(&self, tenant_id: &str, worker_id: &str, version: Version) -> Option<Arc<dyn Stub>> {
        self.entries
            .get(&(tenant_id.to_string(), worker_id.to_string()))
            .filter(|e| e.version == version)
            .map(|e| e.stub.clone())
    }

    pub fn put(&self, tenant_id: &str, worker_id: &str, version: Version, stub: Arc<dyn Stub>) {
        self.entries
            .insert((tenant_id.to_string(), worker_id.to_string()), Entry { version, stub });
    }

    /// Invalidated by `updateWorker`/`deleteWorker`.
    pub fn invalidate(&self, tenant_id: &str, worker_id: &str) {
        self.entries.remove(&(tenant_id.to_string(), worker_id.to_string()));
    }

    /// Invalidated by `updateTenant`/`deleteTenant`: every key owned by
    /// `tenant_id`.
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.entries.retain(|(tid, _), _| tid != tenant_id);
    }

    /// Invalidated by `updateDefaults`: every key, platform-wide.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Fetcher, Request, Response};
    use async_trait::async_trait;

    struct NullStub;

    struct NullFetcher;

    #[async_trait]
    impl Fetcher for NullFetcher {
        async fn dispatch(&self, _req: Request) -> crate::error::Result<Response> {
            Ok(Response::text(200, "ok"))
        }
    }

    #[async_trait]
    impl Stub for NullStub {
        async fn get_entrypoint(&self, _name: Option<&str>) -> crate::error::Result<Arc<dyn Fetcher>> {
            Ok(Arc::new(NullFetcher))
        }
    }

    #[test]
    fn stale_version_misses() {
        let cache = StubCache::new();
        cache.put("acme", "api", 1, Arc::new(NullStub));
        assert!(cache.get("acme", "api", 1).is_some());
        assert!(cache.get("acme", "api", 2).is_none());
    }

    #[test]
    fn tenant_invalidation_only_touches_that_tenant() {
        let cache = StubCache::new();
        cache.put("acme", "api", 1, Arc::new(NullStub));
        cache.put("globex", "api", 1, Arc::new(NullStub));

        cache.invalidate_tenant("acme");

        assert!(cache.get("acme", "api", 1).is_none());
        assert!(cache.get("globex", "api", 1).is_some());
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let cache = StubCache::new();
        cache.put("acme", "api", 1, Arc::new(NullStub));
        cache.put("globex", "api", 1, Arc::new(NullStub));

        cache.invalidate_all();

        assert!(cache.get("acme", "api", 1).is_none());
        assert!(cache.get("globex", "api", 1).is_none());
    }
}
