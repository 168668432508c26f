use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use vantage_types::{
    config::BackendConfig,
    game::{GameSnapshot, UciMove},
    wire::{parse_state, GotoRequest, MoveRequest, StateResponse},
    Result, VantageError,
};

use crate::{
    gateway::{MoveOutcome, SyncGateway},
    network_error,
};

/// [`SyncGateway`] over the backend's HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.request_timeout_ms.min(5_000)))
            .build()
            .map_err(|err| network_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(&self, route: &str, response: Response) -> Result<(StatusCode, StateResponse)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| network_error(format!("{route}: reading body failed: {err}")))?;
        debug!(route, %status, bytes = body.len(), "backend replied");
        if body.trim().is_empty() {
            return Ok((status, StateResponse::default()));
        }
        match parse_state(&body) {
            Ok(parsed) => Ok((status, parsed)),
            // Rejections sometimes carry an HTML error page instead of JSON.
            Err(_) if status == StatusCode::BAD_REQUEST => Ok((
                status,
                StateResponse {
                    ok: Some(false),
                    ..Default::default()
                },
            )),
            Err(err) => Err(err),
        }
    }

    fn expect_success(route: &str, status: StatusCode) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(network_error(format!("{route} returned HTTP {status}")))
        }
    }
}

fn send_error(route: &str, err: reqwest::Error) -> VantageError {
    if err.is_timeout() {
        network_error(format!("{route} timed out"))
    } else {
        network_error(format!("{route} failed: {err}"))
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn get_state(&self) -> Result<GameSnapshot> {
        let route = "GET /state";
        let response = self
            .client
            .get(self.url("/state"))
            .send()
            .await
            .map_err(|err| send_error(route, err))?;
        let (status, body) = self.read_body(route, response).await?;
        Self::expect_success(route, status)?;
        body.into_snapshot()
    }

    async fn submit_move(&self, mv: &UciMove) -> Result<MoveOutcome> {
        let route = "POST /move";
        let response = self
            .client
            .post(self.url("/move"))
            .json(&MoveRequest { uci: mv.to_string() })
            .send()
            .await
            .map_err(|err| send_error(route, err))?;
        let (status, body) = self.read_body(route, response).await?;
        if status == StatusCode::BAD_REQUEST || body.is_rejection() {
            let reason = body
                .error
                .unwrap_or_else(|| format!("backend refused {mv}"));
            warn!(%mv, %reason, "move rejected");
            return Ok(MoveOutcome::Rejected(reason));
        }
        Self::expect_success(route, status)?;
        Ok(MoveOutcome::Accepted(body.into_snapshot()?))
    }

    async fn goto(&self, view: u32) -> Result<GameSnapshot> {
        let route = "POST /goto";
        let response = self
            .client
            .post(self.url("/goto"))
            .json(&GotoRequest { view })
            .send()
            .await
            .map_err(|err| send_error(route, err))?;
        let (status, body) = self.read_body(route, response).await?;
        Self::expect_success(route, status)?;
        body.into_snapshot()
    }

    async fn engine_move(&self) -> Result<GameSnapshot> {
        let route = "POST /engine_move";
        let response = self
            .client
            .post(self.url("/engine_move"))
            .send()
            .await
            .map_err(|err| send_error(route, err))?;
        let (status, body) = self.read_body(route, response).await?;
        if status == StatusCode::BAD_REQUEST || body.is_rejection() {
            return Err(VantageError::Rejected(
                body.error.unwrap_or_else(|| "game is over".into()),
            ));
        }
        Self::expect_success(route, status)?;
        body.into_snapshot()
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
