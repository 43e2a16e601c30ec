//! Content hasher (C3): canonical fingerprint of `(files, options)` used
//! as the bundle cache key. See spec.md §4.3.

use sha2::{Digest, Sha256};

use crate::bundler::BuildOptions;
use crate::model::FileMap;

/// `fingerprint(files, options) -> hex string`.
///
/// `files` is already a `BTreeMap`, so iteration is lexicographically
/// sorted by construction; values are hashed byte-for-byte. Options follow
/// in a fixed field order with stable scalar formatting, so the result is
/// stable across process restarts and independent of `HashMap`/JSON key
/// ordering. Truncated to the first 16 hex characters per spec — collision
/// risk at this length only causes extra cache hits on literally identical
/// inputs, which is the desired behavior.
pub fn fingerprint(files: &FileMap, options: &BuildOptions) -> String {
    let mut hasher = Sha256::new();

    for (path, content) in files {
        hasher.update((path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
    }

    // Options, in a fixed order, each scalar formatted stably.
    hasher.update([options.bundle as u8]);
    hasher.update([options.minify as u8]);
    hasher.update([options.sourcemap as u8]);

    match &options.entry_point {
        Some(ep) => {
            hasher.update([1u8]);
            hasher.update((ep.len() as u64).to_le_bytes());
            hasher.update(ep.as_bytes());
        }
        None => hasher.update([0u8]),
    }

    match &options.externals {
        Some(externals) => {
            hasher.update([1u8]);
            // externals is caller-ordered; canonicalize by sorting so the
            // fingerprint only depends on the *set*, not call-site order.
            let mut sorted = externals.clone();
            sorted.sort();
            hasher.update((sorted.len() as u64).to_le_bytes());
            for e in &sorted {
                hasher.update((e.len() as u64).to_le_bytes());
                hasher.update(e.as_bytes());
            }
        }
        None => hasher.update([0u8]),
    }

    let digest = hasher.finalize();
    let full_hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    full_hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn files(pairs: &[(&str, &str)]) -> FileMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn deterministic_for_identical_input() {
        let f = files(&[("a.ts", "1"), ("b.ts", "2")]);
        let o = BuildOptions::default();
        assert_eq!(fingerprint(&f, &o), fingerprint(&f, &o));
    }

    #[test]
    fn independent_of_map_construction_order() {
        let f1 = files(&[("a.ts", "1"), ("b.ts", "2")]);
        let f2 = files(&[("b.ts", "2"), ("a.ts", "1")]);
        let o = BuildOptions::default();
        assert_eq!(fingerprint(&f1, &o), fingerprint(&f2, &o));
    }

    #[test]
    fn differs_when_content_differs() {
        let f1 = files(&[("a.ts", "1")]);
        let f2 = files(&[("a.ts", "2")]);
        let o = BuildOptions::default();
        assert_ne!(fingerprint(&f1, &o), fingerprint(&f2, &o));
    }

    #[test]
    fn differs_when_options_differ() {
        let f = files(&[("a.ts", "1")]);
        let mut o1 = BuildOptions::default();
        o1.minify = false;
        let mut o2 = BuildOptions::default();
        o2.minify = true;
        assert_ne!(fingerprint(&f, &o1), fingerprint(&f, &o2));
    }

    #[test]
    fn is_sixteen_hex_chars() {
        let f = files(&[("a.ts", "1")]);
        let fp = fingerprint(&f, &BuildOptions::default());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
