//! Bundle cache (C4): content-addressed store mapping fingerprint to
//! compiled [`Bundle`], with at-most-one concurrent build per fingerprint
//! within this process. See spec.md §4.4.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::bundler::{BuildOptions, Bundler};
use crate::common::now;
use crate::error::Result;
use crate::hash::fingerprint;
use crate::model::{Bundle, FileMap};
use crate::storage::BundleStore;

/// Ephemeral fingerprint-keyed entries expire after an hour; versioned
/// writes made by the façade bypass this cache entirely and never expire.
const FINGERPRINT_TTL_SECS: u64 = 3600;

pub struct BuildResult {
    pub bundle: Bundle,
    /// `true` when the bundle was already present under its fingerprint —
    /// either from an earlier call or (best-effort) from a build this call
    /// joined in flight rather than triggered itself.
    pub cached: bool,
}

/// The only path by which the core invokes the bundler. Single-flights
/// concurrent callers sharing a fingerprint via an inflight map of
/// `OnceCell`s; a build that fails leaves the cell uninitialized so the
/// next caller retries (spec: "build errors are not cached").
pub struct BundleCache {
    bundler: Arc<dyn Bundler>,
    store: Arc<dyn BundleStore>,
    inflight: DashMap<String, Arc<OnceCell<Bundle>>>,
}

impl BundleCache {
    pub fn new(bundler: Arc<dyn Bundler>, store: Arc<dyn BundleStore>) -> Self {
        Self {
            bundler,
            store,
            inflight: DashMap::new(),
        }
    }

    pub async fn get_or_build(&self, files: &FileMap, options: &BuildOptions) -> Result<BuildResult> {
        let fp = fingerprint(files, options);

        if let Some(bundle) = self.store.get_by_fingerprint(&fp).await? {
            return Ok(BuildResult { bundle, cached: true });
        }

        let cell = self
            .inflight
            .entry(fp.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let joined_in_flight = cell.initialized();

        let result = cell
            .get_or_try_init(|| self.build_and_store(files, options, &fp))
            .await
            .cloned();

        // Best-effort cleanup: the inflight map itself holds one `Arc`, so
        // a count of 2 means our local clone is the only other holder —
        // no concurrent caller is still waiting on this cell. Under an
        // unlucky interleave the entry can outlive its build; that just
        // means a later call allocates a fresh cell.
        if Arc::strong_count(&cell) <= 2 {
            self.inflight.remove(&fp);
        }

        result.map(|bundle| BuildResult { bundle, cached: joined_in_flight })
    }

    async fn build_and_store(&self, files: &FileMap, options: &BuildOptions, fp: &str) -> Result<Bundle> {
        let output = self.bundler.build(files, options).await?;
        let bundle = Bundle {
            main_module: output.main_module,
            modules: output.modules,
            version: 0,
            built_at: now(),
            warnings: output.warnings,
        };
        // Write failures never fail the call; the caller still gets the bundle.
        let _ = self.store.put_by_fingerprint(fp, bundle.clone(), Some(FINGERPRINT_TTL_SECS)).await;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::EchoBundler;
    use crate::storage::memory::InMemoryBundleStore;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn files(pairs: &[(&str, &str)]) -> FileMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
    }

    #[tokio::test]
    async fn second_call_with_identical_input_is_cached() {
        let cache = BundleCache::new(Arc::new(EchoBundler), Arc::new(InMemoryBundleStore::default()));
        let f = files(&[("a.ts", "1")]);
        let opts = BuildOptions::default();

        let first = cache.get_or_build(&f, &opts).await.unwrap();
        assert!(!first.cached);

        let second = cache.get_or_build(&f, &opts).await.unwrap();
        assert!(second.cached);
        assert_eq!(first.bundle.main_module, second.bundle.main_module);
    }

    #[tokio::test]
    async fn failed_build_is_not_cached_and_retries() {
        struct FlakyBundler {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Bundler for FlakyBundler {
            async fn build(
                &self,
                files: &FileMap,
                options: &BuildOptions,
            ) -> Result<crate::bundler::BuildOutput> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(crate::error::CoreError::build("boom", None))
                } else {
                    EchoBundler.build(files, options).await
                }
            }
        }

        let cache = BundleCache::new(
            Arc::new(FlakyBundler { calls: AtomicUsize::new(0) }),
            Arc::new(InMemoryBundleStore::default()),
        );
        let f = files(&[("a.ts", "1")]);
        let opts = BuildOptions::default();

        assert!(cache.get_or_build(&f, &opts).await.is_err());
        assert!(cache.get_or_build(&f, &opts).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        struct CountingBundler {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait::async_trait]
        impl Bundler for CountingBundler {
            async fn build(
                &self,
                files: &FileMap,
                options: &BuildOptions,
            ) -> Result<crate::bundler::BuildOutput> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                EchoBundler.build(files, options).await
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(BundleCache::new(
            Arc::new(CountingBundler { calls: calls.clone() }),
            Arc::new(InMemoryBundleStore::default()),
        ));
        let f = Arc::new(files(&[("a.ts", "1")]));
        let opts = Arc::new(BuildOptions::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let f = f.clone();
            let opts = opts.clone();
            handles.push(tokio::spawn(async move { cache.get_or_build(&f, &opts).await.unwrap() }));
        }
        let results: Vec<_> = futures_lite_join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first_module = results[0].main_module.clone();
        assert!(results.iter().all(|r| r.main_module == first_module));
    }

    async fn futures_lite_join_all(
        handles: Vec<tokio::task::JoinHandle<BuildResult>>,
    ) -> Vec<Bundle> {
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap().bundle);
        }
        out
    }
}
