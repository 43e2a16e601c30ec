//! Shared types used across the storage, config, and façade layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant identifier: ASCII, URL-safe, caller-supplied.
pub type TenantId = String;

/// Worker identifier, unique within a tenant.
pub type WorkerId = String;

/// Template identifier.
pub type TemplateId = String;

/// A hostname bound to exactly one `(tenant, worker)`.
pub type Hostname = String;

/// Monotonically increasing worker version, starting at 1.
pub type Version = u64;

/// Current UTC instant, serialized ISO-8601.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Pagination cursor opaque to callers; the in-memory store encodes it as
/// a plain offset, but the contract treats it as an opaque token.
pub type Cursor = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub cursor: Option<Cursor>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>, cursor: Option<Cursor>) -> Self {
        Self { items, cursor }
    }
}

/// Validates a tenant/worker identifier: non-empty, ASCII, URL-safe
/// (`[A-Za-z0-9_-]+`). The spec leaves hostname validation unspecified
/// (see DESIGN.md); identifiers are stricter because they appear in
/// loader names (`"{tenantId}:{workerId}:v{version}"`).
pub fn validate_id(kind: &str, id: &str) -> crate::error::Result<()> {
    use crate::error::CoreError;

    if id.is_empty() {
        return Err(CoreError::validation(format!("{kind} id must not be empty")));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(CoreError::validation(format!(
            "{kind} id '{id}' must be ASCII alphanumeric, '_', '-' or '.'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_url_safe_ids() {
        assert!(validate_id("tenant", "acme-corp_1.0").is_ok());
    }

    #[test]
    fn rejects_empty_and_unsafe_ids() {
        assert!(validate_id("tenant", "").is_err());
        assert!(validate_id("tenant", "acme/corp").is_err());
        assert!(validate_id("tenant", "acme corp").is_err());
    }
}
