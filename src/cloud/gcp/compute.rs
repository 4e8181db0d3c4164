//! REST client for the GCP compute control plane.
//!
//! Covers the two resources the saver touches (instances and zone
//! operations) and the stop-and-wait protocol that drives an instance to
//! a terminal state.

use super::PROVIDER;
use super::auth::TokenManager;
use crate::utils::error::{Result, SaverError};
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Production compute API base path.
pub const COMPUTE_BASE_PATH: &str = "https://compute.googleapis.com/compute/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A compute instance, reduced to the fields the saver inspects.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub name: String,
    pub status: String,
}

/// A zone operation: the provider-side handle for an in-flight asynchronous
/// action such as an instance stop.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(default)]
    pub message: String,
}

impl OperationError {
    fn message(&self) -> String {
        let messages: Vec<&str> = self
            .errors
            .iter()
            .map(|detail| detail.message.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        if messages.is_empty() {
            "operation failed".to_string()
        } else {
            messages.join("; ")
        }
    }
}

/// GCP's structured error envelope: `{"error": {"message": ...}}`.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Map an instance status onto the binary per-instance scale model.
/// Unrecognized statuses count as scaled down, with a logged warning.
pub fn scale_for_status(instance_name: &str, status: &str) -> i32 {
    match status {
        "RUNNING" | "PROVISIONING" | "STAGING" => 1,
        "TERMINATED" | "SUSPENDED" | "STOPPING" => 0,
        other => {
            warn!(
                instance = instance_name,
                status = other,
                "instance in unrecognized state, treating as scaled down"
            );
            0
        }
    }
}

/// Authenticated client for instance and operation resources.
pub struct ComputeClient {
    client: reqwest::Client,
    base_url: String,
    token_manager: Arc<TokenManager>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ComputeClient {
    pub fn new(base_url: Option<&str>, token_manager: Arc<TokenManager>) -> Self {
        let base = match base_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => COMPUTE_BASE_PATH.to_string(),
        };

        Self {
            client: reqwest::Client::new(),
            base_url: base,
            token_manager,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overall deadline for the stop-and-wait protocol.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval between operation status polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn get_instance(
        &self,
        cancel: &CancellationToken,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Instance> {
        let path = format!("projects/{project}/zones/{zone}/instances/{instance}");
        let body = self.do_request(cancel, Method::GET, &path).await?;
        serde_json::from_slice(&body)
            .map_err(|e| SaverError::parsing(format!("failed to decode instance response: {e}")))
    }

    pub async fn get_operation(
        &self,
        cancel: &CancellationToken,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation> {
        let path = format!("projects/{project}/zones/{zone}/operations/{operation}");
        let body = self.do_request(cancel, Method::GET, &path).await?;
        serde_json::from_slice(&body)
            .map_err(|e| SaverError::parsing(format!("failed to decode operation response: {e}")))
    }

    /// Stop an instance and wait for the operation to complete.
    ///
    /// Resolves only when the instance reaches TERMINATED, the overall
    /// timeout elapses ([`SaverError::Timeout`]), or the caller's token is
    /// cancelled ([`SaverError::Cancelled`]), never silently.
    pub async fn stop_instance(
        &self,
        cancel: &CancellationToken,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Operation> {
        let path = format!("projects/{project}/zones/{zone}/instances/{instance}/stop");
        let body = self.do_request(cancel, Method::POST, &path).await?;

        let operation: Operation = serde_json::from_slice(&body)
            .map_err(|e| SaverError::parsing(format!("failed to decode operation response: {e}")))?;

        let operation = self
            .wait_for_operation(cancel, project, zone, &operation.name)
            .await?;

        // The operation reports DONE before the instance record settles;
        // require terminal state on the instance itself.
        let final_state = self.get_instance(cancel, project, zone, instance).await?;
        if final_state.status != "TERMINATED" {
            return Err(SaverError::provider(
                PROVIDER,
                format!("instance failed to stop: status is {}", final_state.status),
            ));
        }

        Ok(operation)
    }

    async fn wait_for_operation(
        &self,
        cancel: &CancellationToken,
        project: &str,
        zone: &str,
        operation_name: &str,
    ) -> Result<Operation> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(SaverError::cancelled(format!("operation {operation_name}")));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(SaverError::timeout(format!(
                        "waiting for operation {operation_name}"
                    )));
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    let operation = self
                        .get_operation(cancel, project, zone, operation_name)
                        .await?;

                    if operation.status == "DONE" {
                        if let Some(error) = &operation.error {
                            return Err(SaverError::provider(
                                PROVIDER,
                                format!("operation failed: {}", error.message()),
                            ));
                        }
                        return Ok(operation);
                    }
                }
            }
        }
    }

    async fn do_request(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
    ) -> Result<Vec<u8>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(SaverError::cancelled(format!("{method} {path}"))),
            result = self.execute(method.clone(), path) => result,
        }
    }

    async fn execute(&self, method: Method, path: &str) -> Result<Vec<u8>> {
        let token = self.token_manager.get_token().await?;
        let url = format!("{}/{}", self.base_url, path);

        debug!("Request: {} {}", method, path);
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            // Prefer the provider's structured message when parseable.
            if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(&body) {
                if !envelope.error.message.is_empty() {
                    return Err(SaverError::provider(PROVIDER, envelope.error.message));
                }
            }
            return Err(SaverError::provider(
                PROVIDER,
                format!("request failed with status {}", status.as_u16()),
            ));
        }

        Ok(body.to_vec())
    }
}
