//! Windowed per-service request-rate collection.
//!
//! The proxy exposes cumulative request counters in the Prometheus text
//! format; this module scrapes them and turns the deltas between ticks into
//! per-minute rates.

use crate::utils::error::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The counter family carrying per-service request totals.
pub const REQUEST_METRIC: &str = "traefik_service_requests_total";

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of one service's traffic over the last window. Recomputed and
/// fully replaced on every collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRate {
    pub service_name: String,
    /// Cumulative request count as reported by the proxy.
    pub total: f64,
    /// Requests per minute over the elapsed window.
    pub per_min: f64,
    /// Time elapsed since the previous collection.
    pub window: Duration,
}

/// Scrapes the metrics endpoint and computes windowed request rates.
pub struct MetricsCollector {
    client: reqwest::Client,
    metrics_url: String,
    last_counts: HashMap<String, f64>,
    last_time: Instant,
}

impl MetricsCollector {
    pub fn new(metrics_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            metrics_url: metrics_url.into(),
            last_counts: HashMap::new(),
            last_time: Instant::now(),
        }
    }

    /// Fetch request rates for all services seen in the current scrape.
    ///
    /// On the first call there is no baseline, so the cumulative total
    /// stands in for the rate, a documented approximation. The baseline is
    /// replaced wholesale afterwards: a service absent from the newest
    /// scrape simply disappears from the next comparison.
    pub async fn get_service_rates(&mut self) -> Result<HashMap<String, ServiceRate>> {
        let current_counts = self.fetch_service_requests().await?;

        let now = Instant::now();
        let window = now - self.last_time;
        debug!(
            services = current_counts.len(),
            window_secs = window.as_secs_f64(),
            "computing service rates"
        );

        let mut rates = HashMap::new();
        for (service, &total) in &current_counts {
            let per_min = if self.last_counts.is_empty() {
                // First run: no baseline to diff against.
                total
            } else {
                let previous = self.last_counts.get(service).copied().unwrap_or(0.0);
                let delta = total - previous;
                if delta < 0.0 {
                    // Counter reset, usually a proxy restart.
                    warn!(
                        service = %service,
                        "request counter went backwards, clamping delta to zero"
                    );
                    0.0
                } else if window.as_secs_f64() > 0.0 {
                    delta / window.as_secs_f64() * 60.0
                } else {
                    0.0
                }
            };

            rates.insert(
                service.clone(),
                ServiceRate {
                    service_name: service.clone(),
                    total,
                    per_min,
                    window,
                },
            );
        }

        self.last_counts = current_counts;
        self.last_time = now;

        Ok(rates)
    }

    async fn fetch_service_requests(&self) -> Result<HashMap<String, f64>> {
        let body = self
            .client
            .get(&self.metrics_url)
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await?
            .text()
            .await?;

        if body.is_empty() {
            warn!("metrics response body is empty");
            return Ok(HashMap::new());
        }

        let mut service_counts: HashMap<String, f64> = HashMap::new();
        for line in body.lines() {
            if !line.starts_with(REQUEST_METRIC) {
                continue;
            }
            // Entries for the same service are accumulated across label
            // combinations; a sample counts only when its code label is
            // 200 or absent, e.g.
            //   traefik_service_requests_total{service="svc",code="200"} 10
            //   traefik_service_requests_total{service="svc",code="404"} 50
            // yields 10 for "svc".
            if let Some((service, count)) = parse_metric_line(line) {
                *service_counts.entry(service).or_insert(0.0) += count;
            }
        }

        Ok(service_counts)
    }
}

/// Extract the service name and counter value from one metric line.
///
/// Returns `None` when the line is not of the `name{labels} value` shape,
/// lacks a `service` label, has a non-numeric value, or carries a `code`
/// label other than `200`.
pub fn parse_metric_line(line: &str) -> Option<(String, f64)> {
    let mut parts = line.split(' ');
    let _labels = parts.next()?;
    let value = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let count: f64 = value.parse().ok()?;

    let start = line.find("service=\"")? + "service=\"".len();
    let end = line[start..].find('"')?;
    let service = &line[start..start + end];

    if let Some(code_pos) = line.find("code=\"") {
        let code = line.get(code_pos + "code=\"".len()..)?.get(..3)?;
        if code != "200" {
            return None;
        }
    }

    Some((service.to_string(), count))
}
