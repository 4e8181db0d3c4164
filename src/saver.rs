//! The periodic orchestration loop.
//!
//! On each tick the saver collects per-service request rates, binds each
//! service to its owning router, filters by the configured allow-list, and
//! powers down the cloud resource behind any service whose traffic fell
//! below the threshold. The loop only ever scales down.

use crate::cloud::{self, CloudService};
use crate::config::{Config, MIN_WINDOW, RouterFilter};
use crate::metrics::MetricsCollector;
use crate::proxy::ProxyClient;
use crate::utils::error::{Result, SaverError};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Opaque dynamic-configuration snapshot delivered to the host on every
/// tick. The saver never rewrites routing, so the payload stays empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigSnapshot {
    pub http: HttpConfiguration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HttpConfiguration {
    pub routers: HashMap<String, serde_json::Value>,
    pub services: HashMap<String, serde_json::Value>,
    pub middlewares: HashMap<String, serde_json::Value>,
}

/// Provider plugin that turns off cloud instances when traffic is below a
/// threshold. "Turn the lights off when the room is empty."
pub struct CloudSaver {
    name: String,
    traffic_threshold: f64,
    window_size: Duration,
    router_filter: Option<RouterFilter>,
    metrics_url: String,
    api_url: String,
    cloud_service: Arc<dyn CloudService>,
    test_mode: bool,
    cancel: Option<CancellationToken>,
}

impl CloudSaver {
    /// Create a new saver, constructing the cloud service from configuration.
    pub fn new(config: &Config, name: impl Into<String>) -> Result<Self> {
        let cloud_service = cloud::new_service(&config.cloud_config)?;
        Self::with_cloud_service(config, name, cloud_service)
    }

    /// Create a saver around an existing cloud service. This is the
    /// injection seam tests use to observe scale decisions.
    pub fn with_cloud_service(
        config: &Config,
        name: impl Into<String>,
        cloud_service: Arc<dyn CloudService>,
    ) -> Result<Self> {
        let window_size = config.validate()?;

        Ok(Self {
            name: name.into(),
            traffic_threshold: config.traffic_threshold,
            window_size,
            router_filter: config.router_filter.clone(),
            metrics_url: config.metrics_url.clone(),
            api_url: config.api_url.clone(),
            cloud_service,
            test_mode: config.test_mode,
            cancel: None,
        })
    }

    /// Runtime validation before the loop starts.
    pub fn init(&self) -> Result<()> {
        if self.window_size < MIN_WINDOW && !self.test_mode {
            return Err(SaverError::config("window size must be at least 1 minute"));
        }
        if self.traffic_threshold < 0.0 {
            return Err(SaverError::config("traffic threshold must be non-negative"));
        }
        Ok(())
    }

    /// Spawn the background tick worker and return the snapshot channel.
    ///
    /// The worker is bound to a cancellation token held by the saver;
    /// [`stop`](Self::stop) cancels it and the worker exits at its next
    /// wait point.
    pub fn start(&mut self) -> mpsc::Receiver<ConfigSnapshot> {
        // Restarting replaces any previous worker.
        self.stop();

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let (tx, rx) = mpsc::channel(1);
        let worker = TickWorker {
            collector: MetricsCollector::new(&self.metrics_url),
            proxy: ProxyClient::new(&self.api_url),
            cloud_service: Arc::clone(&self.cloud_service),
            traffic_threshold: self.traffic_threshold,
            router_filter: self.router_filter.clone(),
            window: self.window_size,
            cancel,
        };

        info!(
            name = %self.name,
            window = ?self.window_size,
            threshold = self.traffic_threshold,
            "starting cloud saver"
        );
        tokio::spawn(worker.run(tx));

        rx
    }

    /// Stop the worker and any related background tasks.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for CloudSaver {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TickWorker {
    collector: MetricsCollector,
    proxy: ProxyClient,
    cloud_service: Arc<dyn CloudService>,
    traffic_threshold: f64,
    router_filter: Option<RouterFilter>,
    window: Duration,
    cancel: CancellationToken,
}

impl TickWorker {
    async fn run(mut self, tx: mpsc::Sender<ConfigSnapshot>) {
        let mut ticker = tokio::time::interval(self.window);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // An interval's first tick resolves immediately; consume it so the
        // loop waits a full window before the first evaluation.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("tick worker stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            // One bad tick must not take down the host process.
            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(Ok(snapshot)) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!("tick worker stopped");
                            return;
                        }
                        sent = tx.send(snapshot) => {
                            if sent.is_err() {
                                debug!("snapshot receiver dropped, stopping tick worker");
                                return;
                            }
                        }
                    }
                }
                Ok(Err(e)) => error!("failed to evaluate tick: {e}"),
                Err(_) => error!("tick panicked, resuming on next interval"),
            }
        }
    }

    async fn tick(&mut self) -> Result<ConfigSnapshot> {
        let rates = self.collector.get_service_rates().await?;

        for (service_name, rate) in &rates {
            let router_name = match self.proxy.router_for_service(service_name).await {
                Ok(Some(router)) => router,
                Ok(None) => {
                    debug!(service = %service_name, "skipping service, no router uses it");
                    continue;
                }
                Err(e) => {
                    warn!(service = %service_name, error = %e, "failed to resolve router for service");
                    continue;
                }
            };

            if !should_monitor(self.router_filter.as_ref(), &router_name) {
                debug!(router = %router_name, "skipping router, not in filter list");
                continue;
            }

            if rate.per_min >= self.traffic_threshold {
                continue;
            }

            info!(
                "LOW TRAFFIC ALERT: service {} (router {}) is below threshold ({:.2} < {:.2} req/min)",
                service_name, router_name, rate.per_min, self.traffic_threshold
            );

            let resource = resource_name(service_name);
            // Per-service isolation: one failed scale-down never aborts the
            // tick for the remaining services.
            match self.cloud_service.scale_down(&self.cancel, resource).await {
                Ok(()) => info!(service = %service_name, resource, "scaled down cloud resource"),
                Err(e) => warn!(service = %service_name, resource, error = %e, "scale down failed"),
            }
        }

        Ok(ConfigSnapshot::default())
    }
}

/// An empty or absent allow-list monitors every router; otherwise names
/// must match exactly, case-sensitively.
fn should_monitor(filter: Option<&RouterFilter>, router_name: &str) -> bool {
    match filter {
        None => true,
        Some(filter) if filter.names.is_empty() => true,
        Some(filter) => filter.names.iter().any(|name| name == router_name),
    }
}

/// Strip the `@provider` suffix from a proxy service name to obtain the
/// cloud resource identifier, e.g. `whoami@docker` -> `whoami`.
fn resource_name(service: &str) -> &str {
    service.split('@').next().unwrap_or(service)
}
