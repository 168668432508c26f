use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use vantage_types::{
    config::DashboardConfig,
    dashboard::{ActorStatus, TrainingStats},
    Result, VantageError,
};

use crate::network_error;

/// Read-only client for the actor and training dashboards.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    actors_url: String,
    training_url: String,
}

impl DashboardClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.poll_interval_ms.max(1_000)))
            .build()
            .map_err(|err| network_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            actors_url: config.actors_url.trim_end_matches('/').to_string(),
            training_url: config.training_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn actor_status(&self) -> Result<ActorStatus> {
        self.fetch(&format!("{}/api/status", self.actors_url)).await
    }

    pub async fn training_stats(&self) -> Result<TrainingStats> {
        self.fetch(&format!("{}/api/data", self.training_url)).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| network_error(format!("GET {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network_error(format!("GET {url} returned HTTP {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|err| network_error(format!("GET {url}: reading body failed: {err}")))?;
        debug!(url, bytes = body.len(), "dashboard payload");
        serde_json::from_str(&body)
            .map_err(|err| VantageError::Protocol(format!("GET {url}: unreadable payload: {err}")))
    }
}
