//! Cloud provider abstraction.
//!
//! Scale decisions made by the saver are applied through the [`CloudService`]
//! trait; concrete backends are the GCP compute implementation and an
//! in-memory mock for tests and dry runs.

pub mod config;
pub mod gcp;
pub mod mock;

pub use config::{CloudServiceConfig, CredentialsConfig};

use crate::utils::error::{Result, SaverError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Operations that can be performed on the cloud resource backing a service.
///
/// Every call takes a caller-supplied cancellation token; implementations
/// surface cancellation as [`SaverError::Cancelled`], distinct from their
/// own internal deadlines.
#[async_trait]
pub trait CloudService: Send + Sync {
    /// Power down the named resource. Idempotent: succeeds without side
    /// effects if the resource is already stopped or stopping.
    async fn scale_down(&self, cancel: &CancellationToken, resource: &str) -> Result<()>;

    /// Restore capacity for the named resource. The real backend never
    /// implements this; powering back up is an operator action.
    async fn scale_up(&self, cancel: &CancellationToken, resource: &str) -> Result<()>;

    /// Current scale of the named resource: 1 if serving (or coming up),
    /// 0 if stopped (or going down).
    async fn current_scale(&self, cancel: &CancellationToken, resource: &str) -> Result<i32>;
}

const AWS_T: &str = "aws"; // placeholder for a future AWS implementation
const GCP_T: &str = "gcp"; // active GCP implementation
const AZURE_T: &str = "azure"; // placeholder for a future Azure implementation
const MOCK_T: &str = "mock";

/// Create a cloud service from configuration. An unrecognized discriminator
/// is a construction-time error, never a runtime default.
pub fn new_service(config: &CloudServiceConfig) -> Result<Arc<dyn CloudService>> {
    match config.service_type.as_str() {
        GCP_T => Ok(Arc::new(gcp::GcpService::new(config)?)),
        MOCK_T => Ok(Arc::new(mock::MockService::new(config)?)),
        AWS_T => Err(SaverError::config("AWS implementation not yet available")),
        AZURE_T => Err(SaverError::config("Azure implementation not yet available")),
        other => Err(SaverError::config(format!(
            "unknown cloud provider: {other}"
        ))),
    }
}
