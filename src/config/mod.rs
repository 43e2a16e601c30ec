//! Config resolver (C5): merges platform defaults, tenant config and an
//! optional worker config into one [`EffectiveConfig`]. Pure and
//! side-effect-free — see spec.md §4.5 for the per-field merge rules this
//! module implements verbatim.

pub mod settings;

use std::collections::BTreeMap;

use crate::model::{ConfigFields, EffectiveConfig, Limits, DEFAULT_COMPATIBILITY_DATE};

/// Merge *defaults → tenant → worker* into an [`EffectiveConfig`].
///
/// - `env`: three-way shallow merge, later keys overwrite earlier.
/// - `compatibility_date`: first-defined wins, worker → tenant → defaults
///   → `"2026-01-24"`.
/// - `compatibility_flags`: concatenation of defaults ++ tenant ++ worker,
///   first-seen order preserved, deduplicated.
/// - `limits`: three-way shallow merge per sub-field.
/// - `tails`: concatenation of defaults ++ tenant ++ worker, duplicates
///   preserved.
/// - `global_outbound`: first-defined wins, same order as
///   `compatibility_date` (see DESIGN.md).
pub fn resolve(
    defaults: &ConfigFields,
    tenant: &ConfigFields,
    worker: Option<&ConfigFields>,
) -> EffectiveConfig {
    let mut env: BTreeMap<String, String> = BTreeMap::new();
    env.extend(defaults.env.clone());
    env.extend(tenant.env.clone());
    if let Some(w) = worker {
        env.extend(w.env.clone());
    }

    let compatibility_date = worker
        .and_then(|w| w.compatibility_date.clone())
        .or_else(|| tenant.compatibility_date.clone())
        .or_else(|| defaults.compatibility_date.clone())
        .unwrap_or_else(|| DEFAULT_COMPATIBILITY_DATE.to_string());

    let compatibility_flags = dedup_preserve_order(
        defaults
            .compatibility_flags
            .iter()
            .chain(tenant.compatibility_flags.iter())
            .chain(worker.into_iter().flat_map(|w| w.compatibility_flags.iter())),
    );

    let limits = Limits::merge3(
        defaults.limits.as_ref(),
        tenant.limits.as_ref(),
        worker.and_then(|w| w.limits.as_ref()),
    );

    let mut tails = defaults.tails.clone();
    tails.extend(tenant.tails.clone());
    if let Some(w) = worker {
        tails.extend(w.tails.clone());
    }

    let global_outbound = worker
        .and_then(|w| w.outbound.clone())
        .or_else(|| tenant.outbound.clone())
        .or_else(|| defaults.outbound.clone());

    EffectiveConfig {
        env,
        compatibility_date,
        compatibility_flags,
        limits,
        tails,
        global_outbound,
    }
}

fn dedup_preserve_order<'a, I: Iterator<Item = &'a String>>(iter: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in iter {
        if seen.insert(item.clone()) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TailRef;

    fn fields(env: &[(&str, &str)], flags: &[&str]) -> ConfigFields {
        ConfigFields {
            env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            compatibility_flags: flags.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn env_three_way_merge_later_wins() {
        let defaults = fields(&[("A", "1"), ("B", "1")], &[]);
        let tenant = fields(&[("B", "2"), ("C", "2")], &[]);
        let worker = fields(&[("C", "3"), ("D", "3")], &[]);

        let effective = resolve(&defaults, &tenant, Some(&worker));

        let expected: BTreeMap<String, String> = [
            ("A", "1"),
            ("B", "2"),
            ("C", "3"),
            ("D", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(effective.env, expected);
    }

    #[test]
    fn flags_concatenate_and_dedup_first_seen() {
        let defaults = fields(&[], &["a"]);
        let tenant = fields(&[], &["b", "a"]);
        let worker = fields(&[], &["c"]);

        let effective = resolve(&defaults, &tenant, Some(&worker));
        assert_eq!(effective.compatibility_flags, vec!["a", "b", "c"]);
    }

    #[test]
    fn compatibility_date_first_defined_wins() {
        let mut defaults = ConfigFields::default();
        defaults.compatibility_date = Some("2025-01-01".into());
        let tenant = ConfigFields::default();

        let effective = resolve(&defaults, &tenant, None);
        assert_eq!(effective.compatibility_date, "2025-01-01");

        let all_absent = resolve(&ConfigFields::default(), &ConfigFields::default(), None);
        assert_eq!(all_absent.compatibility_date, DEFAULT_COMPATIBILITY_DATE);
    }

    #[test]
    fn tails_concatenate_preserving_duplicates() {
        let mut defaults = ConfigFields::default();
        defaults.tails = vec![TailRef::from("t1")];
        let mut tenant = ConfigFields::default();
        tenant.tails = vec![TailRef::from("t1"), TailRef::from("t2")];
        let mut worker = ConfigFields::default();
        worker.tails = vec![TailRef::from("t3")];

        let effective = resolve(&defaults, &tenant, Some(&worker));
        assert_eq!(
            effective.tails,
            vec![
                TailRef::from("t1"),
                TailRef::from("t1"),
                TailRef::from("t2"),
                TailRef::from("t3"),
            ]
        );
    }

    #[test]
    fn limits_merge_per_subfield_and_absent_when_all_none() {
        let defaults = ConfigFields::default();
        let tenant = ConfigFields::default();
        assert!(resolve(&defaults, &tenant, None).limits.is_none());

        let mut tenant2 = ConfigFields::default();
        tenant2.limits = Some(Limits { cpu_ms: Some(100), subrequests: None });
        let mut worker = ConfigFields::default();
        worker.limits = Some(Limits { cpu_ms: None, subrequests: Some(5) });

        let effective = resolve(&defaults, &tenant2, Some(&worker));
        assert_eq!(
            effective.limits,
            Some(Limits { cpu_ms: Some(100), subrequests: Some(5) })
        );
    }

    #[test]
    fn determinism_law() {
        let defaults = fields(&[("A", "1")], &["x"]);
        let tenant = fields(&[("B", "2")], &["y"]);
        let worker = fields(&[("C", "3")], &["z"]);

        let a = resolve(&defaults, &tenant, Some(&worker));
        let b = resolve(&defaults, &tenant, Some(&worker));
        assert_eq!(a, b);
    }
}
