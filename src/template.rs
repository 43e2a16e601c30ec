//! Template engine (C6): `{{slot}}` extraction, validation and textual
//! interpolation. See spec.md §4.6. Purely textual — never parses source.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};
use crate::model::{FileMap, Slot};

static SLOT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").unwrap());

/// Union of every `{{name}}` occurrence across all file contents.
pub fn extract_slot_names(files: &FileMap) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for content in files.values() {
        for cap in SLOT_PATTERN.captures_iter(content) {
            names.insert(cap[1].to_string());
        }
    }
    names
}

/// Invariant 5: `extractSlotNames(files) ⊆ {s.name | s ∈ slots}`. Fails
/// naming the first offending slot in file-then-occurrence order (`files`
/// is a `BTreeMap`, so iteration is already path-sorted).
pub fn validate_slots(files: &FileMap, slots: &[Slot]) -> Result<()> {
    let declared: BTreeSet<&str> = slots.iter().map(|s| s.name.as_str()).collect();
    for (path, content) in files {
        for cap in SLOT_PATTERN.captures_iter(content) {
            let name = &cap[1];
            if !declared.contains(name) {
                return Err(CoreError::validation(format!(
                    "slot '{name}' in '{path}' has no matching declared slot"
                )));
            }
        }
    }
    Ok(())
}

/// Replaces every `{{s.name}}` occurrence with `values[s.name]`, falling
/// back to `s.default`. A slot occurrence with neither is a
/// `ValidationError`; an occurrence of an undeclared name is too (should
/// already be unreachable if [`validate_slots`] ran at template write).
pub fn interpolate(files: &FileMap, slots: &[Slot], values: &BTreeMap<String, String>) -> Result<FileMap> {
    let declared: BTreeMap<&str, &Slot> = slots.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut out = FileMap::new();

    for (path, content) in files {
        let mut rendered = String::with_capacity(content.len());
        let mut last_end = 0;

        for cap in SLOT_PATTERN.captures_iter(content) {
            let whole = cap.get(0).unwrap();
            let name = &cap[1];
            rendered.push_str(&content[last_end..whole.start()]);

            let slot = declared.get(name).ok_or_else(|| {
                CoreError::validation(format!("slot '{name}' in '{path}' has no matching declared slot"))
            })?;
            let value = values.get(name).cloned().or_else(|| slot.default.clone()).ok_or_else(|| {
                CoreError::validation(format!("slot '{name}' has no provided value and no default"))
            })?;
            rendered.push_str(&value);

            last_end = whole.end();
        }
        rendered.push_str(&content[last_end..]);
        out.insert(path.clone(), rendered);
    }

    Ok(out)
}
