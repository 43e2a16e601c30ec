//! In-process caches: [`bundle_cache`] (C4, content-addressed, single-flight
//! builds) and [`stub_cache`] (C8, version-guarded loader handles).

pub mod bundle_cache;
pub mod stub_cache;
