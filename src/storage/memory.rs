//! Reference in-memory implementation of the storage contracts, backed by
//! `dashmap::DashMap` — the same concurrent-map primitive the teacher
//! codebase reaches for in its own in-process indexes. Good enough for
//! tests and for the demo binary; not durable across restarts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::common::{ListPage, ListParams};
use crate::error::Result;
use crate::model::{Bundle, HostnameRoute, PlatformDefaults, Template, Tenant, Worker};

use super::{BundleStore, DefaultsStore, HostnameStore, TemplateStore, TenantStore, WorkerStore};

fn paginate<T: Clone>(mut keys: Vec<String>, items: &BTreeMap<String, T>, params: &ListParams) -> ListPage<T> {
    keys.sort();
    if let Some(prefix) = &params.prefix {
        keys.retain(|k| k.starts_with(prefix.as_str()));
    }

    let offset: usize = params
        .cursor
        .as_ref()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let limit = params.limit.unwrap_or(usize::MAX);

    let page: Vec<T> = keys
        .iter()
        .skip(offset)
        .take(limit)
        .filter_map(|k| items.get(k).cloned())
        .collect();

    let next_offset = offset + page.len();
    let cursor = if next_offset < keys.len() {
        Some(next_offset.to_string())
    } else {
        None
    };

    ListPage::new(page, cursor)
}

/// Snapshots a `DashMap` into a sorted `BTreeMap` for pagination. Cheap
/// enough for the reference store; a real backend would push filtering
/// and the cursor down to the query layer.
fn snapshot<K: std::hash::Hash + Eq + Clone + ToString, V: Clone>(
    map: &DashMap<K, V>,
) -> BTreeMap<String, V> {
    map.iter().map(|e| (e.key().to_string(), e.value().clone())).collect()
}

// ---------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryTenantStore {
    map: DashMap<String, Tenant>,
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get(&self, id: &str) -> Result<Option<Tenant>> {
        Ok(self.map.get(id).map(|e| e.clone()))
    }

    async fn put(&self, id: &str, record: Tenant) -> Result<()> {
        self.map.insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.map.remove(id);
        Ok(())
    }

    async fn list(&self, params: ListParams) -> Result<ListPage<Tenant>> {
        let snap = snapshot(&self.map);
        let keys = snap.keys().cloned().collect();
        Ok(paginate(keys, &snap, &params))
    }
}

// ---------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryWorkerStore {
    map: DashMap<(String, String), Worker>,
}

fn worker_key(tenant_id: &str, worker_id: &str) -> (String, String) {
    (tenant_id.to_string(), worker_id.to_string())
}

#[async_trait]
impl WorkerStore for InMemoryWorkerStore {
    async fn get(&self, tenant_id: &str, worker_id: &str) -> Result<Option<Worker>> {
        Ok(self.map.get(&worker_key(tenant_id, worker_id)).map(|e| e.clone()))
    }

    async fn put(&self, tenant_id: &str, worker_id: &str, record: Worker) -> Result<()> {
        self.map.insert(worker_key(tenant_id, worker_id), record);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, worker_id: &str) -> Result<()> {
        self.map.remove(&worker_key(tenant_id, worker_id));
        Ok(())
    }

    async fn list(&self, tenant_id: &str, params: ListParams) -> Result<ListPage<Worker>> {
        let mut keyed: BTreeMap<String, Worker> = BTreeMap::new();
        for entry in self.map.iter() {
            let (tid, wid) = entry.key();
            if tid == tenant_id {
                keyed.insert(wid.clone(), entry.value().clone());
            }
        }
        let keys = keyed.keys().cloned().collect();
        Ok(paginate(keys, &keyed, &params))
    }

    async fn delete_all(&self, tenant_id: &str) -> Result<usize> {
        let victims: Vec<(String, String)> = self
            .map
            .iter()
            .filter(|e| e.key().0 == tenant_id)
            .map(|e| e.key().clone())
            .collect();
        for key in &victims {
            self.map.remove(key);
        }
        Ok(victims.len())
    }
}

// ---------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------

pub struct InMemoryBundleStore {
    versioned: DashMap<(String, String, u64), Bundle>,
    fingerprinted: DashMap<String, (Bundle, Option<Instant>)>,
}

impl Default for InMemoryBundleStore {
    fn default() -> Self {
        Self {
            versioned: DashMap::new(),
            fingerprinted: DashMap::new(),
        }
    }
}

#[async_trait]
impl BundleStore for InMemoryBundleStore {
    async fn get(&self, tenant_id: &str, worker_id: &str, version: u64) -> Result<Option<Bundle>> {
        let key = (tenant_id.to_string(), worker_id.to_string(), version);
        Ok(self.versioned.get(&key).map(|e| e.clone()))
    }

    async fn put(&self, tenant_id: &str, worker_id: &str, version: u64, bundle: Bundle) -> Result<()> {
        let key = (tenant_id.to_string(), worker_id.to_string(), version);
        self.versioned.insert(key, bundle);
        Ok(())
    }

    async fn delete_all(&self, tenant_id: &str, worker_id: &str) -> Result<usize> {
        let victims: Vec<(String, String, u64)> = self
            .versioned
            .iter()
            .filter(|e| e.key().0 == tenant_id && e.key().1 == worker_id)
            .map(|e| e.key().clone())
            .collect();
        for key in &victims {
            self.versioned.remove(key);
        }
        Ok(victims.len())
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Bundle>> {
        match self.fingerprinted.get(fingerprint) {
            Some(entry) => {
                let (bundle, expires_at) = entry.value().clone();
                if expires_at.map(|t| t <= Instant::now()).unwrap_or(false) {
                    drop(entry);
                    self.fingerprinted.remove(fingerprint);
                    Ok(None)
                } else {
                    Ok(Some(bundle))
                }
            }
            None => Ok(None),
        }
    }

    async fn put_by_fingerprint(&self, fingerprint: &str, bundle: Bundle, ttl_secs: Option<u64>) -> Result<()> {
        let expires_at = ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.fingerprinted.insert(fingerprint.to_string(), (bundle, expires_at));
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Hostnames
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryHostnameStore {
    forward: DashMap<String, HostnameRoute>,
    /// `(tenant, worker) -> hostnames`, maintained alongside `forward` so
    /// `list_by_worker`/`delete_by_worker` don't need a full scan.
    reverse: DashMap<(String, String), Vec<String>>,
}

#[async_trait]
impl HostnameStore for InMemoryHostnameStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRoute>> {
        Ok(self.forward.get(hostname).map(|e| e.clone()))
    }

    async fn put(&self, hostname: &str, route: HostnameRoute) -> Result<()> {
        let key = worker_key(&route.tenant_id, &route.worker_id);
        self.forward.insert(hostname.to_string(), route);
        let mut entry = self.reverse.entry(key).or_insert_with(Vec::new);
        if !entry.contains(&hostname.to_string()) {
            entry.push(hostname.to_string());
        }
        Ok(())
    }

    async fn delete(&self, hostname: &str) -> Result<()> {
        if let Some((_, route)) = self.forward.remove(hostname) {
            let key = worker_key(&route.tenant_id, &route.worker_id);
            if let Some(mut hosts) = self.reverse.get_mut(&key) {
                hosts.retain(|h| h != hostname);
            }
        }
        Ok(())
    }

    async fn list_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<Vec<String>> {
        let key = worker_key(tenant_id, worker_id);
        Ok(self.reverse.get(&key).map(|e| e.clone()).unwrap_or_default())
    }

    async fn delete_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<usize> {
        let key = worker_key(tenant_id, worker_id);
        let hosts = self.reverse.remove(&key).map(|(_, v)| v).unwrap_or_default();
        for host in &hosts {
            self.forward.remove(host);
        }
        Ok(hosts.len())
    }
}

// ---------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryTemplateStore {
    map: DashMap<String, Template>,
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get(&self, id: &str) -> Result<Option<Template>> {
        Ok(self.map.get(id).map(|e| e.clone()))
    }

    async fn put(&self, id: &str, record: Template) -> Result<()> {
        self.map.insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.map.remove(id);
        Ok(())
    }

    async fn list(&self, params: ListParams) -> Result<ListPage<Template>> {
        let snap = snapshot(&self.map);
        let keys = snap.keys().cloned().collect();
        Ok(paginate(keys, &snap, &params))
    }
}

// ---------------------------------------------------------------------
// Platform defaults
// ---------------------------------------------------------------------

pub struct InMemoryDefaultsStore {
    inner: RwLock<PlatformDefaults>,
}

impl Default for InMemoryDefaultsStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(PlatformDefaults::default()),
        }
    }
}

#[async_trait]
impl DefaultsStore for InMemoryDefaultsStore {
    async fn get(&self) -> Result<PlatformDefaults> {
        Ok(self.inner.read().clone())
    }

    async fn put(&self, defaults: PlatformDefaults) -> Result<()> {
        *self.inner.write() = defaults;
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------

/// Bundles one instance of every store behind `Arc<dyn Trait>`, ready to
/// hand to [`crate::facade::Platform::new`].
#[derive(Clone)]
pub struct InMemoryStorage {
    pub tenants: Arc<dyn TenantStore>,
    pub workers: Arc<dyn WorkerStore>,
    pub bundles: Arc<dyn BundleStore>,
    pub hostnames: Arc<dyn HostnameStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub defaults: Arc<dyn DefaultsStore>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantStore::default()),
            workers: Arc::new(InMemoryWorkerStore::default()),
            bundles: Arc::new(InMemoryBundleStore::default()),
            hostnames: Arc::new(InMemoryHostnameStore::default()),
            templates: Arc::new(InMemoryTemplateStore::default()),
            defaults: Arc::new(InMemoryDefaultsStore::default()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::now;

    fn tenant(id: &str) -> Tenant {
        Tenant {
            id: id.to_string(),
            config: Default::default(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn tenant_crud_round_trips() {
        let store = InMemoryTenantStore::default();
        assert!(store.get("acme").await.unwrap().is_none());

        store.put("acme", tenant("acme")).await.unwrap();
        assert!(store.get("acme").await.unwrap().is_some());

        store.delete("acme").await.unwrap();
        assert!(store.get("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tenant_list_paginates_with_cursor() {
        let store = InMemoryTenantStore::default();
        for id in ["a", "b", "c", "d"] {
            store.put(id, tenant(id)).await.unwrap();
        }

        let page1 = store
            .list(ListParams { prefix: None, limit: Some(2), cursor: None })
            .await
            .unwrap();
        assert_eq!(page1.items.len(), 2);
        assert!(page1.cursor.is_some());

        let page2 = store
            .list(ListParams { prefix: None, limit: Some(2), cursor: page1.cursor })
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 2);
        assert!(page2.cursor.is_none());
    }

    #[tokio::test]
    async fn hostname_forward_and_reverse_stay_in_sync() {
        let store = InMemoryHostnameStore::default();
        store
            .put(
                "app.acme.com",
                HostnameRoute {
                    hostname: "app.acme.com".to_string(),
                    tenant_id: "acme".to_string(),
                    worker_id: "api".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            store.list_by_worker("acme", "api").await.unwrap(),
            vec!["app.acme.com".to_string()]
        );

        let deleted = store.delete_by_worker("acme", "api").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get("app.acme.com").await.unwrap().is_none());
        assert!(store.list_by_worker("acme", "api").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bundle_fingerprint_ttl_expires() {
        let store = InMemoryBundleStore::default();
        let bundle = Bundle {
            main_module: "a.ts".to_string(),
            modules: BTreeMap::new(),
            version: 1,
            built_at: now(),
            warnings: vec![],
        };
        store.put_by_fingerprint("fp1", bundle.clone(), Some(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get_by_fingerprint("fp1").await.unwrap().is_none());
    }
}
