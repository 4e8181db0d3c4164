//! Client for the reverse proxy's HTTP API.
//!
//! The saver reads two things from the proxy: the router table, and the
//! service-detail record whose `usedBy` list binds a service back to the
//! router that fronts it.

use crate::utils::error::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A router record as returned by the proxy API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Router {
    pub name: String,
    pub rule: String,
    pub service: String,
    pub provider: String,
    pub status: String,
    pub entry_points: Vec<String>,
    pub using: Vec<String>,
    pub priority: i64,
    pub middlewares: Vec<String>,
}

/// A service-detail record; `used_by` lists the routers fronting it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDetail {
    pub name: String,
    pub status: String,
    pub used_by: Vec<String>,
}

/// Thin typed client over the proxy's `/http/...` endpoints.
pub struct ProxyClient {
    client: reqwest::Client,
    api_url: String,
}

impl ProxyClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Fetch the full router table.
    pub async fn routers(&self) -> Result<Vec<Router>> {
        let url = format!("{}/http/routers", self.api_url);
        debug!("fetching routers from {url}");

        let routers = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(routers)
    }

    /// Fetch the detail record for a single service.
    pub async fn service_detail(&self, service: &str) -> Result<ServiceDetail> {
        let url = format!("{}/http/services/{}", self.api_url, service);
        debug!("fetching service detail from {url}");

        let detail = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(detail)
    }

    /// Resolve the router owning a service: the first `usedBy` entry of its
    /// detail record, or `None` when nothing routes to it.
    pub async fn router_for_service(&self, service: &str) -> Result<Option<String>> {
        let detail = self.service_detail(service).await?;
        Ok(detail.used_by.into_iter().next())
    }
}
