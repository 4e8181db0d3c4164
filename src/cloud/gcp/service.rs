//! The GCP-backed [`CloudService`] implementation.

use super::auth::{Credentials, TokenManager};
use super::compute::{ComputeClient, scale_for_status};
use crate::cloud::{CloudService, CloudServiceConfig};
use crate::utils::error::{Result, SaverError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cloud service backed by GCP compute instances: one service maps to one
/// instance, and scale is binary (running or terminated).
pub struct GcpService {
    compute: ComputeClient,
    project_id: String,
    zone: String,
    #[allow(dead_code)]
    region: String,
}

impl GcpService {
    pub fn new(config: &CloudServiceConfig) -> Result<Self> {
        let zone = require_field(config.zone.as_deref(), "zone")?;
        let region = require_field(config.region.as_deref(), "region")?;

        let credentials_config = config
            .credentials
            .as_ref()
            .filter(|c| !c.secret.is_empty())
            .ok_or_else(|| SaverError::config("credentials are required for gcp"))?;

        let credentials = match credentials_config.credentials_type.as_str() {
            "service_account" | "" => Credentials::from_file(&credentials_config.secret)?,
            // Secret is a raw PEM key; only useful against a stubbed endpoint.
            "token" => Credentials::from_private_key(credentials_config.secret.clone()),
            other => {
                return Err(SaverError::config(format!(
                    "unsupported credentials type: {other}"
                )));
            }
        };

        // Fall back to the service-account file's project when the cloud
        // config leaves it unset.
        let project_id = match config.project_id.as_deref().filter(|p| !p.is_empty()) {
            Some(project) => project.to_string(),
            None if !credentials.project_id.is_empty() => credentials.project_id.clone(),
            None => return Err(SaverError::config("project ID is required for gcp")),
        };

        let token_manager = Arc::new(TokenManager::new(credentials)?);
        let compute = ComputeClient::new(config.endpoint.as_deref(), token_manager);

        Ok(Self {
            compute,
            project_id,
            zone: zone.to_string(),
            region: region.to_string(),
        })
    }

    /// Replace the compute client, keeping project/zone. Used by tests to
    /// shorten the stop-and-wait timings.
    pub fn with_compute_client(mut self, compute: ComputeClient) -> Self {
        self.compute = compute;
        self
    }
}

fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SaverError::config(format!("{name} is required for gcp")))
}

#[async_trait]
impl CloudService for GcpService {
    async fn scale_down(&self, cancel: &CancellationToken, resource: &str) -> Result<()> {
        info!(instance = resource, "scale down requested");

        let instance = self
            .compute
            .get_instance(cancel, &self.project_id, &self.zone, resource)
            .await?;

        // Idempotent: nothing to do if the instance is already on its way down.
        if instance.status == "TERMINATED" || instance.status == "STOPPING" {
            debug!(
                instance = resource,
                status = %instance.status,
                "instance already stopped or stopping"
            );
            return Ok(());
        }

        self.compute
            .stop_instance(cancel, &self.project_id, &self.zone, resource)
            .await?;

        info!(instance = resource, "instance stopped");
        Ok(())
    }

    async fn scale_up(&self, _cancel: &CancellationToken, resource: &str) -> Result<()> {
        // Power-down-only by design; restoring capacity is an operator action.
        Err(SaverError::not_implemented(format!(
            "scale up for instance {resource}"
        )))
    }

    async fn current_scale(&self, cancel: &CancellationToken, resource: &str) -> Result<i32> {
        let instance = self
            .compute
            .get_instance(cancel, &self.project_id, &self.zone, resource)
            .await?;
        Ok(scale_for_status(resource, &instance.status))
    }
}
