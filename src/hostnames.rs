//! Hostname index (C7): exclusive hostname → `(tenantId, workerId)`
//! binding with reverse lookup. See spec.md §4.7.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::model::HostnameRoute;
use crate::storage::HostnameStore;

pub struct HostnameIndex {
    store: Arc<dyn HostnameStore>,
}

impl HostnameIndex {
    pub fn new(store: Arc<dyn HostnameStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, hostname: &str) -> Result<Option<HostnameRoute>> {
        self.store.get(hostname).await
    }

    /// Binds every hostname in `hostnames` to `(tenant_id, worker_id)`. On
    /// the first hostname already bound elsewhere, rolls back the
    /// hostnames this call bound so far and fails with
    /// `CoreError::Conflict` — callers must retry with a different set.
    ///
    /// Uses compare-after-write repair for the concurrent-writer case
    /// (spec §4.7): write, then re-read; if the re-read disagrees with
    /// what we just wrote, a racing writer won and we back out.
    pub async fn add(&self, tenant_id: &str, worker_id: &str, hostnames: &[String]) -> Result<()> {
        let mut bound_this_call = Vec::new();

        for host in hostnames {
            if let Some(existing) = self.store.get(host).await? {
                if existing.tenant_id == tenant_id && existing.worker_id == worker_id {
                    continue; // already ours, idempotent no-op
                }
                self.rollback(&bound_this_call).await;
                tracing::warn!(
                    hostname = %host,
                    owner_tenant = %existing.tenant_id,
                    owner_worker = %existing.worker_id,
                    "hostname already bound elsewhere, rolling back this call's earlier bindings"
                );
                return Err(CoreError::conflict(format!(
                    "hostname '{host}' already bound to {}/{}",
                    existing.tenant_id, existing.worker_id
                )));
            }

            self.store
                .put(
                    host,
                    HostnameRoute {
                        hostname: host.clone(),
                        tenant_id: tenant_id.to_string(),
                        worker_id: worker_id.to_string(),
                    },
                )
                .await?;

            match self.store.get(host).await? {
                Some(route) if route.tenant_id == tenant_id && route.worker_id == worker_id => {
                    bound_this_call.push(host.clone());
                }
                _ => {
                    self.rollback(&bound_this_call).await;
                    return Err(CoreError::conflict(format!(
                        "hostname '{host}' lost a concurrent write race"
                    )));
                }
            }
        }

        Ok(())
    }

    async fn rollback(&self, hostnames: &[String]) {
        for host in hostnames {
            let _ = self.store.delete(host).await;
        }
    }

    /// Unbinds every hostname in `hostnames` from `(tenant_id, worker_id)`.
    /// A hostname that doesn't resolve, or that resolves to a different
    /// worker, is left untouched — ownership (spec.md §3: "Each
    /// HostnameRoute is owned by exactly one Worker") means one tenant can
    /// never delete another's route by naming it in its own call.
    pub async fn remove(&self, tenant_id: &str, worker_id: &str, hostnames: &[String]) -> Result<()> {
        for host in hostnames {
            match self.store.get(host).await? {
                Some(existing) if existing.tenant_id == tenant_id && existing.worker_id == worker_id => {
                    self.store.delete(host).await?;
                }
                Some(existing) => {
                    tracing::warn!(
                        hostname = %host,
                        owner_tenant = %existing.tenant_id,
                        owner_worker = %existing.worker_id,
                        requester_tenant = %tenant_id,
                        requester_worker = %worker_id,
                        "refusing to remove a hostname owned by another worker"
                    );
                }
                None => {}
            }
        }
        Ok(())
    }

    pub async fn list_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<Vec<String>> {
        self.store.list_by_worker(tenant_id, worker_id).await
    }

    pub async fn delete_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<usize> {
        self.store.delete_by_worker(tenant_id, worker_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryHostnameStore;

    #[tokio::test]
    async fn add_then_resolve_round_trips() {
        let index = HostnameIndex::new(Arc::new(InMemoryHostnameStore::default()));
        index.add("acme", "api", &["app.acme.com".to_string()]).await.unwrap();

        let route = index.resolve("app.acme.com").await.unwrap().unwrap();
        assert_eq!(route.tenant_id, "acme");
        assert_eq!(route.worker_id, "api");
    }

    #[tokio::test]
    async fn second_tenant_claiming_same_hostname_conflicts() {
        let index = HostnameIndex::new(Arc::new(InMemoryHostnameStore::default()));
        index.add("acme", "api", &["app.acme.com".to_string()]).await.unwrap();

        let err = index
            .add("acme", "api2", &["app.acme.com".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);

        // Resolve still returns the first binding.
        let route = index.resolve("app.acme.com").await.unwrap().unwrap();
        assert_eq!(route.worker_id, "api");
    }

    #[tokio::test]
    async fn conflict_rolls_back_hostnames_bound_earlier_in_the_call() {
        let index = HostnameIndex::new(Arc::new(InMemoryHostnameStore::default()));
        index.add("acme", "api", &["taken.acme.com".to_string()]).await.unwrap();

        let err = index
            .add(
                "acme",
                "api2",
                &["fresh.acme.com".to_string(), "taken.acme.com".to_string()],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);

        assert!(index.resolve("fresh.acme.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_only_the_callers_own_hostname() {
        let index = HostnameIndex::new(Arc::new(InMemoryHostnameStore::default()));
        index.add("acme", "api", &["app.acme.com".to_string()]).await.unwrap();

        index.remove("acme", "api", &["app.acme.com".to_string()]).await.unwrap();

        assert!(index.resolve("app.acme.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_cannot_hijack_a_hostname_owned_by_another_worker() {
        let index = HostnameIndex::new(Arc::new(InMemoryHostnameStore::default()));
        index.add("acme", "api", &["victim.example.com".to_string()]).await.unwrap();

        // Tenant "globex" tries to delete a hostname it doesn't own.
        index.remove("globex", "other", &["victim.example.com".to_string()]).await.unwrap();

        // Route survives untouched, and globex still can't claim it.
        let route = index.resolve("victim.example.com").await.unwrap().unwrap();
        assert_eq!(route.tenant_id, "acme");
        assert_eq!(route.worker_id, "api");

        let err = index
            .add("globex", "other", &["victim.example.com".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }
}
