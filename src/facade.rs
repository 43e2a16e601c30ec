//! Platform façade (C9): the crate's single public entry point.
//! Orchestrates storage (C1), the bundler via the bundle cache (C2-C4),
//! config resolution (C5), templates (C6), hostnames (C7) and the stub
//! cache (C8). See spec.md §4.9 for the contract each method implements.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bundler::{BuildOptions, Bundler};
use crate::cache::bundle_cache::BundleCache;
use crate::cache::stub_cache::StubCache;
use crate::common::{now, validate_id, ListPage, ListParams};
use crate::config;
use crate::error::{CoreError, Result};
use crate::hash;
use crate::hostnames::HostnameIndex;
use crate::loader::{BundleColdStart, FingerprintColdStart, Loader, Request, Response, Stub};
use crate::model::{
    Bundle, ConfigFields, ConfigFieldsPatch, FileMap, PlatformDefaults, Slot, Template,
    TemplateMetadata, Tenant, Worker,
};
use crate::storage::{BundleStore, DefaultsStore, HostnameStore, TemplateStore, TenantStore, WorkerStore};
use crate::template;

/// Storage backends the façade orchestrates. Any mix of implementations
/// works; [`crate::storage::memory::InMemoryStorage`] supplies one set of
/// consistent, non-durable defaults via [`From`].
pub struct Stores {
    pub tenants: Arc<dyn TenantStore>,
    pub workers: Arc<dyn WorkerStore>,
    pub bundles: Arc<dyn BundleStore>,
    pub hostnames: Arc<dyn HostnameStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub defaults: Arc<dyn DefaultsStore>,
}

impl From<crate::storage::memory::InMemoryStorage> for Stores {
    fn from(s: crate::storage::memory::InMemoryStorage) -> Self {
        Stores {
            tenants: s.tenants,
            workers: s.workers,
            bundles: s.bundles,
            hostnames: s.hostnames,
            templates: s.templates,
            defaults: s.defaults,
        }
    }
}

/// Result of `fetch`/`runEphemeral`: the dispatched response plus whether
/// the build that produced it hit the bundle cache.
pub struct RunOutcome {
    pub response: Response,
    pub cached: bool,
}

pub struct Platform {
    tenants: Arc<dyn TenantStore>,
    workers: Arc<dyn WorkerStore>,
    bundles: Arc<dyn BundleStore>,
    templates: Arc<dyn TemplateStore>,
    defaults: Arc<dyn DefaultsStore>,
    hostnames: HostnameIndex,
    bundle_cache: BundleCache,
    stub_cache: StubCache,
    loader: Arc<dyn Loader>,
}

impl Platform {
    pub fn new(stores: Stores, bundler: Arc<dyn Bundler>, loader: Arc<dyn Loader>) -> Self {
        Platform {
            tenants: stores.tenants,
            workers: stores.workers,
            bundles: stores.bundles.clone(),
            templates: stores.templates,
            defaults: stores.defaults,
            hostnames: HostnameIndex::new(stores.hostnames),
            bundle_cache: BundleCache::new(bundler, stores.bundles),
            stub_cache: StubCache::new(),
            loader,
        }
    }

    // ---------------------------------------------------------------
    // Platform defaults
    // ---------------------------------------------------------------

    pub async fn get_defaults(&self) -> Result<PlatformDefaults> {
        self.defaults.get().await
    }

    /// Merges `patch` into the persisted defaults, writes first, then
    /// invalidates every stub cache entry platform-wide.
    pub async fn update_defaults(&self, patch: ConfigFieldsPatch) -> Result<PlatformDefaults> {
        let mut current = self.defaults.get().await?;
        current.apply_patch(patch);
        self.defaults.put(current.clone()).await?;
        self.stub_cache.invalidate_all();
        tracing::info!("platform defaults updated, invalidating all cached stubs");
        Ok(current)
    }

    // ---------------------------------------------------------------
    // Tenants
    // ---------------------------------------------------------------

    pub async fn create_tenant(&self, id: &str, config: ConfigFields) -> Result<Tenant> {
        validate_id("tenant", id)?;
        if self.tenants.get(id).await?.is_some() {
            return Err(CoreError::conflict(format!("tenant '{id}' already exists")));
        }
        let tenant = Tenant {
            id: id.to_string(),
            config,
            created_at: now(),
            updated_at: now(),
        };
        self.tenants.put(id, tenant.clone()).await?;
        tracing::info!(tenant_id = %id, "tenant created");
        Ok(tenant)
    }

    pub async fn update_tenant(&self, id: &str, patch: ConfigFieldsPatch) -> Result<Tenant> {
        let mut tenant = self.tenants.get(id).await?.ok_or_else(|| CoreError::not_found("tenant", id))?;
        tenant.config.apply_patch(patch);
        tenant.updated_at = now();
        self.tenants.put(id, tenant.clone()).await?;
        self.stub_cache.invalidate_tenant(id);
        tracing::info!(tenant_id = %id, "tenant updated, invalidating its cached stubs");
        Ok(tenant)
    }

    pub async fn get_tenant(&self, id: &str) -> Result<Tenant> {
        self.tenants.get(id).await?.ok_or_else(|| CoreError::not_found("tenant", id))
    }

    pub async fn list_tenants(&self, params: ListParams) -> Result<ListPage<Tenant>> {
        self.tenants.list(params).await
    }

    /// Cascades: deletes every worker owned by the tenant (each of which
    /// cascades to its bundles/hostnames), then the tenant record itself.
    pub async fn delete_tenant(&self, id: &str) -> Result<()> {
        self.tenants.get(id).await?.ok_or_else(|| CoreError::not_found("tenant", id))?;

        for worker_id in self.all_worker_ids(id).await? {
            self.delete_worker(id, &worker_id).await?;
        }
        self.tenants.delete(id).await?;
        self.stub_cache.invalidate_tenant(id);
        tracing::info!(tenant_id = %id, "tenant deleted (cascaded to its workers)");
        Ok(())
    }

    async fn all_worker_ids(&self, tenant_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .workers
                .list(tenant_id, ListParams { prefix: None, limit: None, cursor: cursor.clone() })
                .await?;
            ids.extend(page.items.into_iter().map(|w| w.id));
            match page.cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(ids)
    }

    // ---------------------------------------------------------------
    // Workers
    // ---------------------------------------------------------------

    pub async fn list_workers(&self, tenant_id: &str, params: ListParams) -> Result<ListPage<Worker>> {
        self.workers.list(tenant_id, params).await
    }

    pub async fn get_worker(&self, tenant_id: &str, worker_id: &str) -> Result<Worker> {
        self.workers
            .get(tenant_id, worker_id)
            .await?
            .ok_or_else(|| CoreError::not_found("worker", worker_id))
    }

    /// 1. verify tenant exists; 2. verify uniqueness; 3. build via C4
    /// (validates compilation and caches by fingerprint); 4. write the v1
    /// bundle; 5. write the worker record *after* the bundle write
    /// (invariant 3); 6. register hostnames, rolling back on conflict.
    pub async fn create_worker(
        &self,
        tenant_id: &str,
        worker_id: &str,
        config: ConfigFields,
        files: FileMap,
        hostnames: Vec<String>,
        build: Option<BuildOptions>,
    ) -> Result<Worker> {
        validate_id("worker", worker_id)?;
        self.get_tenant(tenant_id).await?;

        if self.workers.get(tenant_id, worker_id).await?.is_some() {
            return Err(CoreError::conflict(format!("worker '{worker_id}' already exists")));
        }

        let options = build.unwrap_or_default();
        let built = self.bundle_cache.get_or_build(&files, &options).await?;

        let bundle = Bundle {
            main_module: built.bundle.main_module,
            modules: built.bundle.modules,
            version: 1,
            built_at: now(),
            warnings: built.bundle.warnings,
        };
        self.bundles.put(tenant_id, worker_id, 1, bundle).await?;

        let mut worker = Worker {
            tenant_id: tenant_id.to_string(),
            id: worker_id.to_string(),
            config,
            files,
            hostnames: Vec::new(),
            created_at: now(),
            updated_at: now(),
            version: 1,
        };
        self.workers.put(tenant_id, worker_id, worker.clone()).await?;

        if !hostnames.is_empty() {
            self.hostnames.add(tenant_id, worker_id, &hostnames).await?;
            for host in hostnames {
                if !worker.hostnames.contains(&host) {
                    worker.hostnames.push(host);
                }
            }
            self.workers.put(tenant_id, worker_id, worker.clone()).await?;
        }

        tracing::info!(tenant_id, worker_id, version = 1, "worker created");
        Ok(worker)
    }

    /// Merges `config_patch`/`files` over the current record, rebuilds via
    /// C4, writes the bundle at `version + 1`, then the record, then
    /// invalidates the stub cache entry.
    pub async fn update_worker(
        &self,
        tenant_id: &str,
        worker_id: &str,
        config_patch: Option<ConfigFieldsPatch>,
        files: Option<FileMap>,
        build: Option<BuildOptions>,
    ) -> Result<Worker> {
        let mut worker = self
            .workers
            .get(tenant_id, worker_id)
            .await?
            .ok_or_else(|| CoreError::not_found("worker", worker_id))?;

        if let Some(patch) = config_patch {
            worker.config.apply_patch(patch);
        }
        if let Some(new_files) = files {
            worker.files = new_files;
        }

        let options = build.unwrap_or_default();
        let built = self.bundle_cache.get_or_build(&worker.files, &options).await?;
        let new_version = worker.version + 1;

        let bundle = Bundle {
            main_module: built.bundle.main_module,
            modules: built.bundle.modules,
            version: new_version,
            built_at: now(),
            warnings: built.bundle.warnings,
        };
        self.bundles.put(tenant_id, worker_id, new_version, bundle).await?;

        worker.version = new_version;
        worker.updated_at = now();
        self.workers.put(tenant_id, worker_id, worker.clone()).await?;
        self.stub_cache.invalidate(tenant_id, worker_id);
        tracing::info!(tenant_id, worker_id, version = new_version, "worker updated, invalidating its cached stub");

        Ok(worker)
    }

    pub async fn delete_worker(&self, tenant_id: &str, worker_id: &str) -> Result<()> {
        self.hostnames.delete_by_worker(tenant_id, worker_id).await?;
        self.bundles.delete_all(tenant_id, worker_id).await?;
        self.workers.delete(tenant_id, worker_id).await?;
        self.stub_cache.invalidate(tenant_id, worker_id);
        tracing::info!(tenant_id, worker_id, "worker deleted (cascaded to its bundles and hostnames)");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------

    pub async fn fetch(
        &self,
        tenant_id: &str,
        worker_id: &str,
        req: Request,
        entrypoint: Option<&str>,
    ) -> Result<Response> {
        let stub = self.get_stub(tenant_id, worker_id).await?;
        let fetcher = stub.get_entrypoint(entrypoint).await?;
        fetcher.dispatch(req).await
    }

    async fn get_stub(&self, tenant_id: &str, worker_id: &str) -> Result<Arc<dyn Stub>> {
        let (tenant, worker) =
            tokio::try_join!(self.tenants.get(tenant_id), self.workers.get(tenant_id, worker_id))?;
        let tenant = tenant.ok_or_else(|| CoreError::not_found("tenant", tenant_id))?;
        let worker = worker.ok_or_else(|| CoreError::not_found("worker", worker_id))?;

        if let Some(stub) = self.stub_cache.get(tenant_id, worker_id, worker.version) {
            tracing::debug!(tenant_id, worker_id, version = worker.version, "stub cache hit");
            return Ok(stub);
        }

        tracing::debug!(tenant_id, worker_id, version = worker.version, "stub cache miss, cold-starting loader");
        let defaults = self.defaults.get().await?;
        let effective = config::resolve(&defaults, &tenant.config, Some(&worker.config));

        let cold_start = Arc::new(BundleColdStart {
            store: self.bundles.clone(),
            tenant_id: tenant_id.to_string(),
            worker_id: worker_id.to_string(),
            version: worker.version,
            config: effective,
        });
        let name = format!("{tenant_id}:{worker_id}:v{}", worker.version);
        let stub = self.loader.get(&name, cold_start).await?;
        self.stub_cache.put(tenant_id, worker_id, worker.version, stub.clone());
        Ok(stub)
    }

    /// Build-and-dispatch with no persisted Worker or HostnameRoute;
    /// cached by fingerprint only.
    pub async fn run_ephemeral(
        &self,
        tenant_id: Option<&str>,
        files: FileMap,
        req: Request,
        build: Option<BuildOptions>,
    ) -> Result<RunOutcome> {
        let defaults = self.defaults.get().await?;
        let tenant_config = match tenant_id {
            Some(id) => self.tenants.get(id).await?.map(|t| t.config).unwrap_or_default(),
            None => ConfigFields::default(),
        };
        let effective = config::resolve(&defaults, &tenant_config, None);

        let options = build.unwrap_or_default();
        let built = self.bundle_cache.get_or_build(&files, &options).await?;
        let fp = hash::fingerprint(&files, &options);

        let cold_start = Arc::new(FingerprintColdStart {
            store: self.bundles.clone(),
            fingerprint: fp.clone(),
            config: effective,
        });

        let tenant_label = tenant_id.unwrap_or("anonymous");
        let name = format!("{tenant_label}:ephemeral:{fp}");
        let stub = self.loader.get(&name, cold_start).await?;
        let fetcher = stub.get_entrypoint(None).await?;
        let response = fetcher.dispatch(req).await?;

        Ok(RunOutcome { response, cached: built.cached })
    }

    pub async fn route(&self, host: &str, req: Request) -> Result<Option<Response>> {
        match self.hostnames.resolve(host).await? {
            Some(route) => Ok(Some(self.fetch(&route.tenant_id, &route.worker_id, req, None).await?)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Hostnames
    // ---------------------------------------------------------------

    pub async fn add_hostnames(&self, tenant_id: &str, worker_id: &str, hostnames: Vec<String>) -> Result<Worker> {
        let mut worker = self.get_worker(tenant_id, worker_id).await?;
        self.hostnames.add(tenant_id, worker_id, &hostnames).await?;
        for host in hostnames {
            if !worker.hostnames.contains(&host) {
                worker.hostnames.push(host);
            }
        }
        self.workers.put(tenant_id, worker_id, worker.clone()).await?;
        Ok(worker)
    }

    pub async fn remove_hostnames(&self, tenant_id: &str, worker_id: &str, hostnames: Vec<String>) -> Result<Worker> {
        let mut worker = self.get_worker(tenant_id, worker_id).await?;
        // Only hostnames this worker actually owns are eligible for removal;
        // `HostnameIndex::remove` also re-checks ownership per hostname, so
        // a caller naming another worker's hostname can neither delete nor
        // desync that other worker's record.
        let owned: Vec<String> = hostnames.into_iter().filter(|h| worker.hostnames.contains(h)).collect();
        self.hostnames.remove(tenant_id, worker_id, &owned).await?;
        worker.hostnames.retain(|h| !owned.contains(h));
        self.workers.put(tenant_id, worker_id, worker.clone()).await?;
        Ok(worker)
    }

    // ---------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------

    pub async fn register_template(
        &self,
        id: &str,
        name: String,
        description: Option<String>,
        files: FileMap,
        slots: Vec<Slot>,
        defaults: Option<ConfigFields>,
    ) -> Result<Template> {
        validate_id("template", id)?;
        if self.templates.get(id).await?.is_some() {
            return Err(CoreError::conflict(format!("template '{id}' already exists")));
        }
        template::validate_slots(&files, &slots)?;

        let t = Template { id: id.to_string(), name, description, files, slots, defaults };
        self.templates.put(id, t.clone()).await?;
        Ok(t)
    }

    pub async fn update_template(
        &self,
        id: &str,
        name: Option<String>,
        description: Option<Option<String>>,
        files: Option<FileMap>,
        slots: Option<Vec<Slot>>,
        defaults: Option<Option<ConfigFields>>,
    ) -> Result<Template> {
        let mut t = self.templates.get(id).await?.ok_or_else(|| CoreError::not_found("template", id))?;

        if let Some(n) = name {
            t.name = n;
        }
        if let Some(d) = description {
            t.description = d;
        }
        if let Some(f) = files {
            t.files = f;
        }
        if let Some(s) = slots {
            t.slots = s;
        }
        if let Some(d) = defaults {
            t.defaults = d;
        }
        template::validate_slots(&t.files, &t.slots)?;

        self.templates.put(id, t.clone()).await?;
        Ok(t)
    }

    pub async fn get_template(&self, id: &str) -> Result<Template> {
        self.templates.get(id).await?.ok_or_else(|| CoreError::not_found("template", id))
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        self.templates.get(id).await?.ok_or_else(|| CoreError::not_found("template", id))?;
        self.templates.delete(id).await
    }

    pub async fn list_templates(&self, params: ListParams) -> Result<ListPage<TemplateMetadata>> {
        let page = self.templates.list(params).await?;
        Ok(ListPage::new(page.items.iter().map(TemplateMetadata::from).collect(), page.cursor))
    }

    pub async fn preview_template_files(&self, template_id: &str, values: BTreeMap<String, String>) -> Result<FileMap> {
        let t = self.get_template(template_id).await?;
        template::interpolate(&t.files, &t.slots, &values)
    }

    /// Interpolates the template, merges `template.defaults → overrides`
    /// into the new worker's config, then delegates to `create_worker`.
    pub async fn create_worker_from_template(
        &self,
        tenant_id: &str,
        template_id: &str,
        worker_id: &str,
        values: BTreeMap<String, String>,
        overrides: Option<ConfigFieldsPatch>,
        build: Option<BuildOptions>,
    ) -> Result<Worker> {
        let t = self.get_template(template_id).await?;
        let files = template::interpolate(&t.files, &t.slots, &values)?;

        let mut config = t.defaults.clone().unwrap_or_default();
        if let Some(patch) = overrides {
            config.apply_patch(patch);
        }

        self.create_worker(tenant_id, worker_id, config, files, Vec::new(), build).await
    }
}
