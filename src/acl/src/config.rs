//! Service configuration loading and validation
//!
//! Configuration can come from code (`AclConfig::default()` plus struct update
//! syntax), a TOML document, or environment variables:
//!
//! - `ACL_CACHE_ENABLED` - Enable the result cache (default: true)
//! - `ACL_CACHE_TTL` - Cache TTL in seconds (default: 300)
//! - `ACL_DEBUG_MODE` - Log every decision at info level (default: false)
//! - `ACL_STRICT_MODE` - Reserved, currently has no effect (default: false)
//! - `ACL_METRICS_ENABLED` - Collect in-process metrics (default: true)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AclError, Result};

/// Largest TTL the cache can represent as a signed millisecond count
const MAX_CACHE_TTL_SECS: u64 = (i64::MAX / 1_000) as u64;

/// Permission service configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AclConfig {
    /// Cache permission checks, role lookups and permission lookups
    pub cache_enabled: bool,

    /// Time-to-live for cached results, in seconds
    #[serde(rename = "cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Promote per-decision logs from debug to info
    pub debug_mode: bool,

    /// Reserved; accepted and carried but never consulted
    pub strict_mode: bool,

    /// Collect in-process metrics
    pub metrics_enabled: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: 300,
            debug_mode: false,
            strict_mode: false,
            metrics_enabled: true,
        }
    }
}

impl AclConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Build from `ACL_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("ACL_CACHE_ENABLED") {
            config.cache_enabled = parse_bool("ACL_CACHE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("ACL_CACHE_TTL") {
            config.cache_ttl_secs = v.trim().parse().map_err(|_| {
                AclError::InvalidConfig(format!("ACL_CACHE_TTL must be seconds, got '{}'", v))
            })?;
        }
        if let Some(v) = lookup("ACL_DEBUG_MODE") {
            config.debug_mode = parse_bool("ACL_DEBUG_MODE", &v)?;
        }
        if let Some(v) = lookup("ACL_STRICT_MODE") {
            config.strict_mode = parse_bool("ACL_STRICT_MODE", &v)?;
        }
        if let Some(v) = lookup("ACL_METRICS_ENABLED") {
            config.metrics_enabled = parse_bool("ACL_METRICS_ENABLED", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(AclError::InvalidConfig(format!(
                "cache_ttl must be at most {} seconds",
                MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub(crate) fn cache_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AclError::InvalidConfig(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
