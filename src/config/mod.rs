//! Configuration for the cloud saver plugin.
//!
//! The host decodes this configuration and hands it to [`crate::CloudSaver`];
//! the saver validates it but never produces it.

pub mod validation;

pub use validation::{MIN_WINDOW, parse_duration};

use crate::cloud::CloudServiceConfig;
use crate::utils::error::{Result, SaverError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Criteria for selecting which routers to monitor. An empty (or absent)
/// name list monitors every router; otherwise names match exactly and
/// case-sensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterFilter {
    #[serde(default)]
    pub names: Vec<String>,
}

/// Plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Services whose per-minute request rate falls below this are scaled down.
    pub traffic_threshold: f64,
    /// Tick interval, e.g. `"5m"`. Must be at least one minute outside test mode.
    pub window_size: String,
    /// Prometheus text endpoint exposed by the proxy.
    pub metrics_url: String,
    /// Base URL of the proxy's HTTP API.
    pub api_url: String,
    pub router_filter: Option<RouterFilter>,
    pub cloud_config: CloudServiceConfig,
    /// Relaxes the minimum-window check for tests.
    #[serde(skip)]
    pub test_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traffic_threshold: 1.0,
            window_size: "5m".to_string(),
            metrics_url: "http://localhost:8080/metrics".to_string(),
            api_url: "http://localhost:8080/api".to_string(),
            router_filter: None,
            cloud_config: CloudServiceConfig {
                service_type: "mock".to_string(),
                ..Default::default()
            },
            test_mode: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SaverError::config(format!("failed to read config file: {e}")))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| SaverError::config(format!("failed to parse config: {e}")))?;

        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate the configuration, returning the parsed window size.
    pub fn validate(&self) -> Result<Duration> {
        let window = parse_duration(&self.window_size)
            .map_err(|e| SaverError::config(format!("invalid window size: {e}")))?;

        if window < MIN_WINDOW && !self.test_mode {
            return Err(SaverError::config(format!(
                "window size must be at least 1 minute, got {:?}",
                window
            )));
        }

        if self.traffic_threshold < 0.0 {
            return Err(SaverError::config("traffic threshold must be non-negative"));
        }

        self.cloud_config.validate()?;

        Ok(window)
    }
}
