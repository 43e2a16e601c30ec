//! Bootstrap configuration for the demonstration binary (`src/main.rs`):
//! an optional `platform.toml` in the working directory, overridable by
//! environment variables. Distinct from [`super::resolve`] (C5), which
//! merges *persisted* tenant/worker config layers — this is the knob set
//! that exists before any tenant has been created.

use serde::Deserialize;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8787";
const DEFAULT_FINGERPRINT_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerSettings {
    pub listen_addr: Option<String>,
    /// TTL for ephemeral fingerprint-keyed bundle cache entries (spec.md
    /// §4.4 recommends 3600s). Exposed here so an operator can tune it
    /// without touching code; not yet threaded into `BundleCache` beyond
    /// its compiled-in default, since the in-memory reference store is
    /// the only consumer today.
    pub fingerprint_ttl_secs: Option<u64>,
}

impl ServerSettings {
    /// Reads `platform.toml` from the current directory if present
    /// (missing or malformed file is silently treated as "no overrides",
    /// matching the teacher's own "would load from file if it exists"
    /// bootstrap comment), then layers `LISTEN_ADDR` on top.
    pub fn load() -> Self {
        let mut settings = std::fs::read_to_string("platform.toml")
            .ok()
            .and_then(|raw| match toml::from_str(&raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(error = %e, "platform.toml present but invalid, ignoring it");
                    None
                }
            })
            .unwrap_or_default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            settings.listen_addr = Some(addr);
        }
        settings
    }

    pub fn listen_addr(&self) -> String {
        self.listen_addr.clone().unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
    }

    pub fn fingerprint_ttl_secs(&self) -> u64 {
        self.fingerprint_ttl_secs.unwrap_or(DEFAULT_FINGERPRINT_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_set() {
        let settings = ServerSettings::default();
        assert_eq!(settings.listen_addr(), DEFAULT_LISTEN_ADDR);
        assert_eq!(settings.fingerprint_ttl_secs(), DEFAULT_FINGERPRINT_TTL_SECS);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings = ServerSettings {
            listen_addr: Some("127.0.0.1:9000".to_string()),
            fingerprint_ttl_secs: Some(60),
        };
        assert_eq!(settings.listen_addr(), "127.0.0.1:9000");
        assert_eq!(settings.fingerprint_ttl_secs(), 60);
    }
}
