//! Server Configuration

use audit_compliance::{AdapterSettings, CatalogConfig, EngineConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`]
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
}

/// Whole `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[server]`
    pub server: ServerConfig,
    /// `[ontology]`
    pub ontology: OntologyConfig,
    /// `[store]`
    pub store: StoreConfig,
    /// `[pipeline]`
    pub pipeline: PipelineConfig,
    /// `[catalog]`
    pub catalog: CatalogConfig,
    /// `[adapters.*]`
    pub adapters: AdapterSettings,
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

/// Seed JSON directory; the built-in ontology is used when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Directory holding the seed JSON files
    pub seed_dir: Option<PathBuf>,
}

/// Snapshot file restored at startup and written on shutdown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file path
    pub snapshot: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Engine part of the config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            pipeline: self.pipeline.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/audit/config.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.ontology.seed_dir.is_none());
        assert!(config.adapters.ssl_labs.enabled);
        assert!(!config.adapters.policy.enabled);
    }

    #[test]
    fn test_parse_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [store]
            snapshot = "data/graph.json"

            [pipeline]
            adapter_timeout = 30
            synthetic_failures = false

            [pipeline.tool_timeouts]
            ssl = 300

            [catalog]
            axe = "axe-full"

            [adapters.nikto]
            enabled = false

            [adapters.policy]
            enabled = true
            endpoint = "http://localhost:8000/analyze"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.store.snapshot, Some(PathBuf::from("data/graph.json")));
        assert_eq!(config.pipeline.adapter_timeout, Duration::from_secs(30));
        assert_eq!(config.pipeline.tool_timeouts["ssl"], 300);
        assert!(!config.pipeline.synthetic_failures);
        assert_eq!(config.catalog.axe, "axe-full");
        assert_eq!(config.catalog.ssl, "ssl-labs");
        assert!(!config.adapters.nikto.enabled);
        assert!(config.adapters.policy.enabled);
        assert_eq!(config.engine_config().pipeline.adapter_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let path = std::env::temp_dir().join(format!("audit-config-{}.toml", std::process::id()));
        fs::write(&path, "[server\nbind = 1").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
