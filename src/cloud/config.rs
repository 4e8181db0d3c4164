//! Provider-agnostic cloud service configuration.
//!
//! A single flat struct with a `type` discriminator rather than a tagged
//! enum: the hosting plugin runtime decodes configuration generically, and
//! per-variant requirements are enforced in [`CloudServiceConfig::validate`]
//! and at service construction.

use crate::utils::error::{Result, SaverError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authentication details for a cloud provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialsConfig {
    /// `service_account` (default): `secret` is a path to a service-account
    /// JSON file. `token`: `secret` is a raw PEM private key, for tests.
    #[serde(rename = "type")]
    pub credentials_type: String,
    pub secret: String,
}

/// Configuration for constructing a cloud service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudServiceConfig {
    /// Provider discriminator: `gcp` or `mock`.
    #[serde(rename = "type")]
    pub service_type: String,
    pub region: Option<String>,
    pub zone: Option<String>,
    #[serde(rename = "projectID")]
    pub project_id: Option<String>,
    /// Override for the provider's control-plane base URL.
    pub endpoint: Option<String>,
    pub credentials: Option<CredentialsConfig>,
    pub resource_tags: HashMap<String, String>,

    // Mock-specific fields
    /// Pre-seeded per-resource scale values.
    pub initial_scale: HashMap<String, i32>,
    /// Fail scale-down operations after this many calls (0 disables).
    pub fail_after: u32,
    /// Restore `initial_scale` after this duration, e.g. `"30s"` (empty disables).
    pub reset_after: String,
}

impl CloudServiceConfig {
    pub fn validate(&self) -> Result<()> {
        match self.service_type.as_str() {
            "" => Err(SaverError::config("cloud service type is required")),
            "gcp" => {
                if self.zone.as_deref().unwrap_or("").is_empty() {
                    return Err(SaverError::config("zone is required for gcp"));
                }
                if self.region.as_deref().unwrap_or("").is_empty() {
                    return Err(SaverError::config("region is required for gcp"));
                }
                match &self.credentials {
                    Some(c) if !c.secret.is_empty() => Ok(()),
                    _ => Err(SaverError::config("credentials are required for gcp")),
                }
            }
            "mock" => {
                if self.initial_scale.is_empty() {
                    return Err(SaverError::config("initialScale is required for mock"));
                }
                Ok(())
            }
            other => Err(SaverError::config(format!(
                "unknown cloud provider: {other}"
            ))),
        }
    }
}
