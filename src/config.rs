//! Layered application settings.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Engine defaults embedded in `datakit-core`
//! 2. Workbench defaults embedded from `config/default.toml`
//! 3. `config/default.toml` and `config/local.toml` in the working directory (optional)
//! 4. Environment variables prefixed with `DATAKIT__`, nested with `__`
//!    (`DATAKIT__SEARCH__THRESHOLD=0.8`)

use config::{Config, ConfigError, Environment, File, FileFormat};
use datakit_core::config::EngineSettings;
use serde::Deserialize;
use std::path::Path;

const WORKBENCH_DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub engine: EngineSettings,
    pub workbench: WorkbenchSettings,
}

/// Which record fields the workbench searches and indexes.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkbenchSettings {
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub index_fields: Vec<String>,
    /// TTL policy applied to fetches that name no kind
    #[serde(default = "default_ttl_kind")]
    pub ttl_kind: String,
}

fn default_ttl_kind() -> String {
    "list".to_string()
}

impl AppSettings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_dir(Path::new("config"))
    }

    /// Loads settings using `config_dir` for the optional file layers.
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let config = EngineSettings::builder()
            .add_source(File::from_str(WORKBENCH_DEFAULTS, FileFormat::Toml))
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("DATAKIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self {
            workbench: config.get("workbench")?,
            engine: config.try_deserialize()?,
        })
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            workbench: WorkbenchSettings {
                search_fields: vec!["name".to_string(), "title".to_string(), "description".to_string()],
                index_fields: vec!["status".to_string(), "category".to_string()],
                ttl_kind: default_ttl_kind(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn setup() {
        INIT.call_once(|| {
            std::env::set_var("DATAKIT__SEARCH__THRESHOLD", "0.75");
        });
    }

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.engine.cache.default_ttl_secs, 300);
        assert_eq!(settings.workbench.ttl_kind, "list");
        assert!(settings.workbench.index_fields.contains(&"status".to_string()));
    }

    #[test]
    fn test_embedded_layers_without_files() {
        let settings = AppSettings::from_dir(Path::new("does-not-exist")).unwrap();
        assert_eq!(settings.engine.sort.cache_capacity, 50);
        assert_eq!(settings.workbench.search_fields, AppSettings::default().workbench.search_fields);
    }

    #[test]
    fn test_environment_override() {
        setup();
        let settings = AppSettings::new().unwrap();
        assert_eq!(settings.engine.search.threshold, 0.75);
    }
}
