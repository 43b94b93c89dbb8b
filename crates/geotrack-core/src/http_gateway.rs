//! HTTP client for the remote tracking service.
//!
//! # Example
//!
//! ```no_run
//! use geotrack_core::{DeviceGateway, HttpGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new("http://localhost:8080", "secret", "device_1")?;
//!
//! let state = gateway.get_status().await?;
//! println!("Tracking is {}", state);
//!
//! gateway.start_trigger().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use geotrack_types::{DataResponse, StatusResponse, TriggerActionResponse, TriggerState};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{DataOutcome, DeviceGateway, GatewayResult};

/// Header carrying the shared credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`DeviceGateway`].
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    api_key: String,
    device_id: String,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url.as_str())
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a new gateway client with the default timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the remote service (e.g., "http://localhost:8080")
    /// * `api_key` - Shared credential attached to every request
    /// * `device_id` - Identifier of the tracked device
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        device_id: impl Into<String>,
    ) -> GatewayResult<Self> {
        Self::with_timeout(base_url, api_key, device_id, DEFAULT_TIMEOUT)
    }

    /// Create a gateway client with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        api_key: impl Into<String>,
        device_id: impl Into<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::communication(base_url, e.to_string()))?;

        Self::with_client(base_url, api_key, device_id, client)
    }

    /// Create a gateway client with a custom reqwest Client.
    pub fn with_client(
        base_url: &str,
        api_key: impl Into<String>,
        device_id: impl Into<String>,
        client: Client,
    ) -> GatewayResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
            device_id: device_id.into(),
        })
    }

    /// Create a gateway client from configuration.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Self::with_timeout(
            &config.base_url,
            config.api_key.clone(),
            config.device_id.clone(),
            config.timeout(),
        )
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    /// Build `{base}/api/devices/{device_id}/{tail...}`.
    fn endpoint(&self, tail: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                GatewayError::InvalidUrl(format!("cannot append a path to {}", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "devices", self.device_id.as_str()])
                .extend(tail);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> GatewayResult<Response> {
        debug!("Requesting {}", url);
        request
            .header(API_KEY_HEADER, self.api_key.as_str())
            .send()
            .await
            .map_err(|e| GatewayError::communication(url.as_str(), e.to_string()))
    }

    async fn trigger_action(&self, action: &str) -> GatewayResult<()> {
        let url = self.endpoint(&["trigger", action])?;
        let response = self.send(self.client.post(url.clone()), &url).await?;
        let status = response.status();

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::communication(url.as_str(), e.to_string()))?;
            // An empty or non-JSON 2xx body counts as acceptance.
            if let Ok(parsed) = serde_json::from_slice::<TriggerActionResponse>(&body)
                && !parsed.success
            {
                return Err(GatewayError::rejected(
                    parsed
                        .message
                        .unwrap_or_else(|| format!("trigger {} declined", action_name(&url))),
                ));
            }
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED {
            // A bad credential fails every call alike, so it is not a refusal
            Err(unexpected_status(&url, response).await)
        } else if status.is_client_error() {
            Err(GatewayError::rejected(error_message(response).await))
        } else {
            Err(unexpected_status(&url, response).await)
        }
    }
}

#[async_trait]
impl DeviceGateway for HttpGateway {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn get_status(&self) -> GatewayResult<TriggerState> {
        let url = self.endpoint(&["status"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;

        if !response.status().is_success() {
            return Err(unexpected_status(&url, response).await);
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::communication(url.as_str(), e.to_string()))?;
        Ok(TriggerState::from(body.triggered))
    }

    async fn get_data(&self) -> GatewayResult<DataOutcome> {
        let url = self.endpoint(&["data"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            return Ok(DataOutcome::Forbidden);
        }
        if !status.is_success() {
            return Err(unexpected_status(&url, response).await);
        }

        let body: DataResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::communication(url.as_str(), e.to_string()))?;
        Ok(DataOutcome::Samples(body.coordinates))
    }

    async fn start_trigger(&self) -> GatewayResult<()> {
        self.trigger_action("start").await
    }

    async fn stop_trigger(&self) -> GatewayResult<()> {
        self.trigger_action("stop").await
    }
}

fn parse_base_url(base_url: &str) -> GatewayResult<Url> {
    let trimmed = base_url.trim_end_matches('/');

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(GatewayError::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Url::parse(trimmed).map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", base_url, e)))
}

fn action_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("action")
}

/// Pull a message out of an error body: `{"error": ..}` or `{"message": ..}`,
/// falling back to the status line.
async fn error_message(response: Response) -> String {
    let status = response.status();
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|e| e.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| status.to_string())
}

async fn unexpected_status(url: &Url, response: Response) -> GatewayError {
    let status = response.status().as_u16();
    GatewayError::Communication {
        url: url.to_string(),
        status: Some(status),
        message: error_message(response).await,
    }
}
