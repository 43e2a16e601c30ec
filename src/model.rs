//! Entities from the data model: [`Tenant`], [`Worker`], [`Bundle`],
//! [`HostnameRoute`], [`Template`] and the configuration layers that feed
//! the resolver in [`crate::config`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{TenantId, Version, WorkerId};

/// A source tree: path → file content. `BTreeMap` keeps keys sorted, which
/// [`crate::hash::fingerprint`] relies on for canonical serialization.
pub type FileMap = BTreeMap<String, String>;

/// An opaque reference to a tail observer or outbound interceptor worker.
/// The core never dispatches to these directly; it passes the name through
/// to the `Loader`'s cold-start descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailRef(pub String);

impl From<&str> for TailRef {
    fn from(s: &str) -> Self {
        TailRef(s.to_string())
    }
}

impl std::fmt::Display for TailRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU and subrequest ceilings. Every sub-field merges independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub cpu_ms: Option<u64>,
    pub subrequests: Option<u64>,
}

impl Limits {
    /// Three-way shallow merge, later (more specific) layers win per
    /// sub-field. Returns `None` if all three inputs are `None`.
    pub fn merge3(
        defaults: Option<&Limits>,
        tenant: Option<&Limits>,
        worker: Option<&Limits>,
    ) -> Option<Limits> {
        if defaults.is_none() && tenant.is_none() && worker.is_none() {
            return None;
        }
        let cpu_ms = worker
            .and_then(|l| l.cpu_ms)
            .or_else(|| tenant.and_then(|l| l.cpu_ms))
            .or_else(|| defaults.and_then(|l| l.cpu_ms));
        let subrequests = worker
            .and_then(|l| l.subrequests)
            .or_else(|| tenant.and_then(|l| l.subrequests))
            .or_else(|| defaults.and_then(|l| l.subrequests));
        Some(Limits { cpu_ms, subrequests })
    }
}

/// The config fields shared by [`PlatformDefaults`], a tenant, and a
/// worker. Each layer carries its own copy; [`crate::config::resolve`]
/// merges the three into an [`EffectiveConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFields {
    pub env: BTreeMap<String, String>,
    pub compatibility_date: Option<String>,
    pub compatibility_flags: Vec<String>,
    pub limits: Option<Limits>,
    pub tails: Vec<TailRef>,
    /// Name of the outbound interceptor worker, if any. Not part of the
    /// `EffectiveConfig` tuple the spec's C5 table enumerates verbatim,
    /// but required by the cold-start descriptor's `globalOutbound` field
    /// and by the glossary's description of outbound workers; resolved
    /// with the same first-defined-wins rule as `compatibility_date`. See
    /// DESIGN.md for this Open Question's resolution.
    pub outbound: Option<TailRef>,
}

/// A partial update to a [`ConfigFields`]-shaped entity: each `Some(_)`
/// field replaces the corresponding current value wholesale (entity-level
/// updates are whole-field replace, not deep merge — deep merge only
/// happens across inheritance layers at config-resolution time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFieldsPatch {
    pub env: Option<BTreeMap<String, String>>,
    pub compatibility_date: Option<Option<String>>,
    pub compatibility_flags: Option<Vec<String>>,
    pub limits: Option<Option<Limits>>,
    pub tails: Option<Vec<TailRef>>,
    pub outbound: Option<Option<TailRef>>,
}

impl ConfigFields {
    pub fn apply_patch(&mut self, patch: ConfigFieldsPatch) {
        if let Some(env) = patch.env {
            self.env = env;
        }
        if let Some(date) = patch.compatibility_date {
            self.compatibility_date = date;
        }
        if let Some(flags) = patch.compatibility_flags {
            self.compatibility_flags = flags;
        }
        if let Some(limits) = patch.limits {
            self.limits = limits;
        }
        if let Some(tails) = patch.tails {
            self.tails = tails;
        }
        if let Some(outbound) = patch.outbound {
            self.outbound = outbound;
        }
    }
}

/// Process- or persistence-wide fallback config bundle.
pub type PlatformDefaults = ConfigFields;

/// Logical owner of workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    #[serde(flatten)]
    pub config: ConfigFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A compilable unit owned by exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub tenant_id: TenantId,
    pub id: WorkerId,
    #[serde(flatten)]
    pub config: ConfigFields,
    pub files: FileMap,
    pub hostnames: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// The compiled form of a worker at a specific version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub main_module: String,
    pub modules: BTreeMap<String, String>,
    pub version: Version,
    pub built_at: DateTime<Utc>,
    pub warnings: Vec<String>,
}

/// An exclusive hostname → `(tenant, worker)` binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostnameRoute {
    pub hostname: String,
    pub tenant_id: TenantId,
    pub worker_id: WorkerId,
}

/// A single `{{name}}` slot declared by a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub description: Option<String>,
    pub default: Option<String>,
    pub example: Option<String>,
}

/// A reusable, parameterized worker skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub files: FileMap,
    pub slots: Vec<Slot>,
    pub defaults: Option<ConfigFields>,
}

/// Listing projection of a [`Template`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub slot_names: Vec<String>,
}

impl From<&Template> for TemplateMetadata {
    fn from(t: &Template) -> Self {
        TemplateMetadata {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
            slot_names: t.slots.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

/// The resolved configuration actually handed to the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub env: BTreeMap<String, String>,
    pub compatibility_date: String,
    pub compatibility_flags: Vec<String>,
    pub limits: Option<Limits>,
    pub tails: Vec<TailRef>,
    pub global_outbound: Option<TailRef>,
}

/// Fallback `compatibilityDate` when no layer defines one.
pub const DEFAULT_COMPATIBILITY_DATE: &str = "2026-01-24";
