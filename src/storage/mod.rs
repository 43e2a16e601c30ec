//! Storage contracts (C1): typed persistence interfaces for tenants,
//! workers, bundles, hostname routes and templates, plus a reference
//! in-memory implementation (see [`memory`]). All operations are async
//! and may fail with [`crate::error::CoreError::Storage`]; absence is
//! represented as `Ok(None)`, never an error.
//!
//! The abstract key layout from spec.md §6 is realized literally as the
//! `DashMap` keys in [`memory::InMemoryStorage`]:
//! `tenant:{id}`, `worker:{tenantId}:{id}`, `bundle:{tenantId}:{id}:v{n}`,
//! `bundle-fingerprint:{hex}`, `hostname:{host}`,
//! `hostname-idx:{tenantId}:{workerId}:{host}`, `template:{id}`,
//! `platform-defaults`.

pub mod memory;

use async_trait::async_trait;

use crate::common::{ListPage, ListParams};
use crate::error::Result;
use crate::model::{Bundle, HostnameRoute, PlatformDefaults, Template, Tenant, Worker};

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Tenant>>;
    async fn put(&self, id: &str, record: Tenant) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self, params: ListParams) -> Result<ListPage<Tenant>>;
}

#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn get(&self, tenant_id: &str, worker_id: &str) -> Result<Option<Worker>>;
    async fn put(&self, tenant_id: &str, worker_id: &str, record: Worker) -> Result<()>;
    async fn delete(&self, tenant_id: &str, worker_id: &str) -> Result<()>;
    async fn list(&self, tenant_id: &str, params: ListParams) -> Result<ListPage<Worker>>;
    /// Deletes every worker owned by `tenant_id`. Returns the count deleted.
    async fn delete_all(&self, tenant_id: &str) -> Result<usize>;
}

#[async_trait]
pub trait BundleStore: Send + Sync {
    async fn get(&self, tenant_id: &str, worker_id: &str, version: u64) -> Result<Option<Bundle>>;
    async fn put(&self, tenant_id: &str, worker_id: &str, version: u64, bundle: Bundle) -> Result<()>;
    /// Deletes every bundle for `(tenant_id, worker_id)`. Returns the count deleted.
    async fn delete_all(&self, tenant_id: &str, worker_id: &str) -> Result<usize>;

    /// Fingerprint-keyed lookup used by the bundle cache (C4) for
    /// ephemeral runs. May share storage with the versioned methods
    /// above or live in a distinct backing store.
    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Bundle>>;
    /// `ttl_secs = None` means no expiration (used for versioned writes);
    /// `Some(secs)` is the recommended policy for ephemeral fingerprint
    /// entries (spec recommends 3600s).
    async fn put_by_fingerprint(&self, fingerprint: &str, bundle: Bundle, ttl_secs: Option<u64>) -> Result<()>;
}

#[async_trait]
pub trait HostnameStore: Send + Sync {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRoute>>;
    /// Writes the forward entry (`hostname -> route`) and the reverse
    /// index entry (`(tenant, worker) -> hostname`) for the caller's
    /// chosen hostname. Implementations MUST keep both in sync.
    async fn put(&self, hostname: &str, route: HostnameRoute) -> Result<()>;
    async fn delete(&self, hostname: &str) -> Result<()>;
    async fn list_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<Vec<String>>;
    /// Deletes every hostname bound to `(tenant_id, worker_id)`. Returns
    /// the count deleted.
    async fn delete_by_worker(&self, tenant_id: &str, worker_id: &str) -> Result<usize>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Template>>;
    async fn put(&self, id: &str, record: Template) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self, params: ListParams) -> Result<ListPage<Template>>;
}

#[async_trait]
pub trait DefaultsStore: Send + Sync {
    async fn get(&self) -> Result<PlatformDefaults>;
    async fn put(&self, defaults: PlatformDefaults) -> Result<()>;
}
