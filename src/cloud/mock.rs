//! Deterministic in-memory cloud service for tests and dry runs.

use crate::cloud::{CloudService, CloudServiceConfig};
use crate::config::parse_duration;
use crate::utils::error::{Result, SaverError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const PROVIDER: &str = "mock";

/// In-memory scale map, pre-seeded from configuration.
///
/// Supports two failure-shaping knobs: `fail_after` makes scale-down calls
/// error once the call count passes the threshold, and `reset_after`
/// restores the seeded values after a fixed delay regardless of interim
/// mutation.
pub struct MockService {
    scale: Arc<RwLock<HashMap<String, i32>>>,
    initial_scale: HashMap<String, i32>,
    fail_after: u32,
    scale_down_calls: AtomicU32,
    cancel: CancellationToken,
}

impl MockService {
    pub fn new(config: &CloudServiceConfig) -> Result<Self> {
        let reset_after = if config.reset_after.is_empty() {
            Duration::ZERO
        } else {
            parse_duration(&config.reset_after)
                .map_err(|e| SaverError::config(format!("invalid resetAfter: {e}")))?
        };

        info!("creating mock cloud service");
        let service = Self {
            scale: Arc::new(RwLock::new(config.initial_scale.clone())),
            initial_scale: config.initial_scale.clone(),
            fail_after: config.fail_after,
            scale_down_calls: AtomicU32::new(0),
            cancel: CancellationToken::new(),
        };

        if reset_after > Duration::ZERO {
            service.spawn_reset_timer(reset_after);
        }

        Ok(service)
    }

    /// One-shot timer restoring the seeded scales; shares the foreground
    /// lock and dies with the service via the cancellation token.
    fn spawn_reset_timer(&self, reset_after: Duration) {
        let scale = Arc::clone(&self.scale);
        let initial = self.initial_scale.clone();
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(reset_after) => {
                    info!("resetting scale values for mock service");
                    *scale.write() = initial;
                }
            }
        });
    }

    fn check_failure(&self) -> Result<()> {
        let calls = self.scale_down_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after > 0 && calls > self.fail_after {
            return Err(SaverError::provider(
                PROVIDER,
                format!("mock service failed after {} operations", self.fail_after),
            ));
        }
        Ok(())
    }

    /// Preset the scale of a resource.
    pub fn set_scale(&self, resource: &str, scale: i32) {
        self.scale.write().insert(resource.to_string(), scale);
    }

    /// Restore every resource to its seeded scale.
    pub fn reset(&self) {
        info!("resetting scale values for mock service");
        *self.scale.write() = self.initial_scale.clone();
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl CloudService for MockService {
    async fn scale_down(&self, _cancel: &CancellationToken, resource: &str) -> Result<()> {
        self.check_failure()?;

        let mut scale = self.scale.write();
        let current = scale.get_mut(resource).ok_or_else(|| {
            SaverError::provider(PROVIDER, format!("resource {resource} not found"))
        })?;

        if *current <= 0 {
            debug!(resource, "resource already at minimum scale");
            return Ok(());
        }

        *current -= 1;
        Ok(())
    }

    async fn scale_up(&self, _cancel: &CancellationToken, resource: &str) -> Result<()> {
        let mut scale = self.scale.write();
        let entry = scale.entry(resource.to_string()).or_insert(0);
        debug!(resource, current = *entry, "scaling up mock resource");
        *entry += 1;
        Ok(())
    }

    async fn current_scale(&self, _cancel: &CancellationToken, resource: &str) -> Result<i32> {
        self.scale.read().get(resource).copied().ok_or_else(|| {
            SaverError::provider(PROVIDER, format!("resource {resource} not found"))
        })
    }
}
