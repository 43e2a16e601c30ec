//! Bundler adapter (C2): the one call the core makes into the compiler.
//! The real bundler/compiler is an opaque external collaborator (spec.md
//! §1); this module only defines the seam and ships a deterministic test
//! double (`EchoBundler`) used by the façade's own tests and by
//! [`crate::cache::bundle_cache`]'s single-flight tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::FileMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    pub bundle: bool,
    pub minify: bool,
    pub sourcemap: bool,
    pub entry_point: Option<String>,
    pub externals: Option<Vec<String>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            bundle: true,
            minify: false,
            sourcemap: false,
            entry_point: None,
            externals: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub main_module: String,
    pub modules: std::collections::BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// The compiler/bundler seam. Implementations are required to be
/// deterministic given identical `(files, options)` — same `modules` and
/// `main_module` for identical inputs. `warnings` are advisory and may
/// vary. This determinism is what makes [`crate::cache::bundle_cache`]
/// safe to content-address by fingerprint.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn build(&self, files: &FileMap, options: &BuildOptions) -> Result<BuildOutput>;
}

/// Deterministic test double: treats every file as already "compiled",
/// picking the entry point by `options.entry_point`, falling back to a
/// `package.json`'s declared `main`, falling back to the lexicographically
/// first file. Never fails except on an empty file map or a named entry
/// point that isn't present.
pub struct EchoBundler;

#[async_trait]
impl Bundler for EchoBundler {
    async fn build(&self, files: &FileMap, options: &BuildOptions) -> Result<BuildOutput> {
        use crate::error::CoreError;

        if files.is_empty() {
            return Err(CoreError::build("no source files provided", None));
        }

        let main_module = if let Some(ep) = &options.entry_point {
            if !files.contains_key(ep) {
                return Err(CoreError::build(
                    format!("entry point '{ep}' not found in source files"),
                    None,
                ));
            }
            ep.clone()
        } else if let Some(pkg) = files.get("package.json") {
            extract_package_main(pkg).unwrap_or_else(|| first_key(files))
        } else {
            first_key(files)
        };

        Ok(BuildOutput {
            main_module,
            modules: files.clone(),
            warnings: Vec::new(),
        })
    }
}

fn first_key(files: &FileMap) -> String {
    files.keys().next().cloned().expect("checked non-empty above")
}

fn extract_package_main(pkg_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(pkg_json).ok()?;
    value.get("main")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn files(pairs: &[(&str, &str)]) -> FileMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
    }

    #[tokio::test]
    async fn picks_entry_point_from_package_json() {
        let f = files(&[
            ("src/index.ts", "export default {}"),
            ("package.json", r#"{"main":"src/index.ts"}"#),
        ]);
        let out = EchoBundler.build(&f, &BuildOptions::default()).await.unwrap();
        assert_eq!(out.main_module, "src/index.ts");
        assert_eq!(out.modules.len(), 2);
    }

    #[tokio::test]
    async fn explicit_entry_point_wins() {
        let f = files(&[("a.ts", "1"), ("b.ts", "2"), ("package.json", r#"{"main":"a.ts"}"#)]);
        let mut opts = BuildOptions::default();
        opts.entry_point = Some("b.ts".to_string());
        let out = EchoBundler.build(&f, &opts).await.unwrap();
        assert_eq!(out.main_module, "b.ts");
    }

    #[tokio::test]
    async fn empty_files_is_a_build_error() {
        let f = FileMap::new();
        let err = EchoBundler.build(&f, &BuildOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Build);
    }

    #[tokio::test]
    async fn deterministic_across_calls() {
        let f = files(&[("a.ts", "1"), ("b.ts", "2")]);
        let opts = BuildOptions::default();
        let out1 = EchoBundler.build(&f, &opts).await.unwrap();
        let out2 = EchoBundler.build(&f, &opts).await.unwrap();
        assert_eq!(out1.main_module, out2.main_module);
        assert_eq!(out1.modules, out2.modules);
    }
}
