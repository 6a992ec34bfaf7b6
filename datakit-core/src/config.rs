//! Engine configuration.
//!
//! Defaults are embedded from `config/default.toml`. Applications layer
//! their own files and environment variables on top of
//! [`EngineSettings::builder`] before deserializing.
//!
//! ```toml
//! [cache]
//! default_ttl_secs = 300
//! min_sweep_interval_secs = 0
//!
//! [cache.ttl_policies]
//! status = 60
//! history = 1800
//!
//! [search]
//! threshold = 0.6
//! case_sensitive = false
//! ```

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Settings for every engine component.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub sort: SortConfig,
    pub group: GroupConfig,
    pub pipeline: PipelineConfig,
}

/// Expiring cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when a caller passes none
    pub default_ttl_secs: u64,
    /// Minimum time between opportunistic sweeps; 0 sweeps on every write
    #[serde(default)]
    pub min_sweep_interval_secs: u64,
    /// Content kind to TTL in seconds
    #[serde(default)]
    pub ttl_policies: HashMap<String, u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub threshold: f64,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortConfig {
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub cache_capacity: usize,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

fn default_cache_enabled() -> bool {
    true
}

impl EngineSettings {
    /// Returns a builder seeded with the embedded defaults.
    pub fn builder() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Parses a TOML document layered over the embedded defaults.
    pub fn from_toml(overrides: &str) -> Result<Self> {
        let settings = Self::builder()
            .add_source(config::File::from_str(overrides, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            search: SearchConfig {
                threshold: 0.6,
                case_sensitive: false,
            },
            sort: SortConfig { cache_capacity: 50 },
            group: GroupConfig { cache_capacity: 50 },
            pipeline: PipelineConfig {
                cache_capacity: 50,
                cache_enabled: true,
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttl_policies = [
            ("list", 300),
            ("detail", 300),
            ("status", 60),
            ("results", 300),
            ("history", 1800),
        ]
        .into_iter()
        .map(|(kind, secs)| (kind.to_string(), secs))
        .collect();

        Self {
            default_ttl_secs: 300,
            min_sweep_interval_secs: 0,
            ttl_policies,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn min_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.min_sweep_interval_secs)
    }

    pub fn policies(&self) -> TtlPolicies {
        TtlPolicies {
            fallback: self.default_ttl(),
            policies: self
                .ttl_policies
                .iter()
                .map(|(kind, secs)| (kind.clone(), Duration::from_secs(*secs)))
                .collect(),
        }
    }
}

/// Per-content-kind TTL table.
///
/// The cache itself honors whatever TTL it is handed; this table is for
/// the call sites choosing one.
#[derive(Debug, Clone)]
pub struct TtlPolicies {
    fallback: Duration,
    policies: HashMap<String, Duration>,
}

impl TtlPolicies {
    pub fn ttl_for(&self, kind: &str) -> Duration {
        self.policies.get(kind).copied().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let parsed = EngineSettings::from_toml("").unwrap();
        let built = EngineSettings::default();

        assert_eq!(parsed.cache.default_ttl_secs, built.cache.default_ttl_secs);
        assert_eq!(parsed.cache.ttl_policies, built.cache.ttl_policies);
        assert_eq!(parsed.search.threshold, built.search.threshold);
        assert_eq!(parsed.sort.cache_capacity, built.sort.cache_capacity);
        assert_eq!(parsed.group.cache_capacity, built.group.cache_capacity);
        assert_eq!(parsed.pipeline.cache_enabled, built.pipeline.cache_enabled);
    }

    #[test]
    fn test_overrides_layer_over_defaults() {
        let settings = EngineSettings::from_toml(
            r#"
            [search]
            threshold = 0.8
            case_sensitive = true

            [cache.ttl_policies]
            status = 15
            "#,
        )
        .unwrap();

        assert_eq!(settings.search.threshold, 0.8);
        assert!(settings.search.case_sensitive);
        assert_eq!(settings.sort.cache_capacity, 50);

        let policies = settings.cache.policies();
        assert_eq!(policies.ttl_for("status"), Duration::from_secs(15));
        assert_eq!(policies.ttl_for("history"), Duration::from_secs(1800));
    }

    #[test]
    fn test_unknown_kind_falls_back_to_default_ttl() {
        let policies = CacheConfig::default().policies();
        assert_eq!(policies.ttl_for("nope"), Duration::from_secs(300));
    }

    #[test]
    fn test_malformed_overrides_are_errors() {
        assert!(EngineSettings::from_toml("[search]\nthreshold = \"high\"").is_err());
    }
}
