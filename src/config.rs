//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults, then lets
//!     the environment override the storage coordinates so the service key
//!     never has to live in a file (SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY).
//!
//! structure:
//!     - ServerConfig: where the hub listens.
//!     - StorageConfig: which backend holds the log and how to reach it.
//!     - RetentionConfig: how many readings the log keeps.
//!
//! ==============================================================================

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Which blob store implementation backs the log.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Supabase Storage bucket (the production setup).
    #[default]
    Supabase,
    /// Process-local map; readings vanish on shutdown. For development.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Supabase project URL, e.g. "https://abc123.supabase.co"
    pub project_url: String,
    /// Bucket holding the log blob
    pub bucket: String,
    /// Key of the single CSV blob inside the bucket
    pub object_key: String,
    /// Service-role key; normally injected via SUPABASE_SERVICE_ROLE_KEY
    pub service_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            project_url: String::new(),
            bucket: "sensor-data".to_string(),
            object_key: "sensor_readings.csv".to_string(),
            service_key: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    /// Newest readings kept in the log; older ones are evicted on write.
    pub max_entries: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: HubConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides.
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("hub.toml"),
            std::path::PathBuf::from("..").join("config").join("hub.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        info!("Loaded configuration from {}", path.display());
                        return config.with_env_overrides();
                    }
                    Err(e) => {
                        warn!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        warn!("No config file found - using defaults");
        Self::default().with_env_overrides()
    }

    /// The storage coordinates follow the environment when set, so
    /// deployments can keep the service key out of the config file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.storage.project_url = url;
        }
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.service_key = key;
        }
        self
    }

    /// Log a configuration summary at startup.
    pub fn log_summary(&self) {
        info!("Listen address: {}", self.server.bind_addr);
        info!(
            "Storage: {:?} backend, bucket '{}', object '{}'",
            self.storage.backend, self.storage.bucket, self.storage.object_key
        );
        info!("Retention window: {} readings", self.retention.max_entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_setup() {
        let config = HubConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert_eq!(config.storage.bucket, "sensor-data");
        assert_eq!(config.storage.object_key, "sensor_readings.csv");
        assert_eq!(config.retention.max_entries, 1000);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let config: HubConfig = toml::from_str(
            r#"
            [retention]
            max_entries = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.retention.max_entries, 50);
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn backend_names_are_lowercase() {
        let config: HubConfig = toml::from_str(
            r#"
            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }
}
