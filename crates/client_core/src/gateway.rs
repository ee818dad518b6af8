//! Remote inventory backend: the gateway trait the session talks to and the
//! reqwest-backed implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::Ean,
    protocol::{AddUnitRequest, HealthStatus, InventoryEntry},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const INVENTORY_PATH: &str = "api/inventory";
const HEALTH_PATH: &str = "api/health";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Non-2xx response. `body` is the raw error payload, classified later.
    #[error("server rejected request with status {status}")]
    Rejected { status: u16, body: String },
    /// 2xx response whose body is not the expected shape.
    #[error("malformed response body (status {status}): {detail}")]
    MalformedBody { status: u16, detail: String },
    /// No response was received at all.
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BaseUrlError {
    #[error("backend url is empty")]
    Empty,
    #[error("invalid backend url '{url}': {reason}")]
    Invalid { url: String, reason: String },
    #[error("unsupported backend url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

/// Parses an operator-supplied base URL and guarantees a trailing slash so
/// relative API paths join under it instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> std::result::Result<Url, BaseUrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BaseUrlError::Empty);
    }

    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&with_slash).map_err(|err| BaseUrlError::Invalid {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BaseUrlError::UnsupportedScheme(other.to_string())),
    }
}

/// Each call mutates the server quantity by one, so callers must not retry.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    async fn add_unit(&self, ean: &Ean) -> std::result::Result<InventoryEntry, GatewayError>;
    /// `Ok(None)` means the quantity reached zero and the entry was deleted.
    async fn remove_unit(&self, ean: &Ean)
        -> std::result::Result<Option<InventoryEntry>, GatewayError>;
    async fn list_inventory(&self) -> std::result::Result<Vec<InventoryEntry>, GatewayError>;
    async fn check_health(&self) -> std::result::Result<HealthStatus, GatewayError>;
}

pub struct HttpInventoryGateway {
    http: Client,
    base_url: Url,
}

impl HttpInventoryGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    fn entry_url(&self, ean: &Ean) -> std::result::Result<Url, GatewayError> {
        let mut url = self.endpoint(INVENTORY_PATH)?;
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Transport(format!("backend url {} cannot be a base", self.base_url))
            })?
            .push(ean.as_str());
        Ok(url)
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    async fn add_unit(&self, ean: &Ean) -> std::result::Result<InventoryEntry, GatewayError> {
        let url = self.endpoint(INVENTORY_PATH)?;
        debug!(%ean, %url, "posting add-unit request");
        let response = self
            .http
            .post(url)
            .json(&AddUnitRequest::new(ean.clone()))
            .send()
            .await?;
        let status = response.status().as_u16();
        read_optional_entry(response)
            .await?
            .ok_or_else(|| GatewayError::MalformedBody {
                status,
                detail: "empty response body".to_string(),
            })
    }

    async fn remove_unit(
        &self,
        ean: &Ean,
    ) -> std::result::Result<Option<InventoryEntry>, GatewayError> {
        let url = self.entry_url(ean)?;
        debug!(%ean, %url, "sending remove-unit request");
        let response = self.http.delete(url).send().await?;
        read_optional_entry(response).await
    }

    async fn list_inventory(&self) -> std::result::Result<Vec<InventoryEntry>, GatewayError> {
        let response = self.http.get(self.endpoint(INVENTORY_PATH)?).send().await?;
        let (status, body) = read_success_body(response).await?;
        decode_body(status, &body)
    }

    async fn check_health(&self) -> std::result::Result<HealthStatus, GatewayError> {
        let response = self.http.get(self.endpoint(HEALTH_PATH)?).send().await?;
        let (status, body) = read_success_body(response).await?;
        decode_body(status, &body)
    }
}

async fn read_success_body(
    response: Response,
) -> std::result::Result<(StatusCode, String), GatewayError> {
    let status = response.status();
    // The status line already arrived, so a failed body read is never a
    // transport failure.
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) if status.is_success() => {
            return Err(GatewayError::MalformedBody {
                status: status.as_u16(),
                detail: format!("failed to read response body: {err}"),
            });
        }
        Err(err) => {
            debug!(status = status.as_u16(), error = %err, "failed to read error body");
            String::new()
        }
    };
    if !status.is_success() {
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok((status, body))
}

/// 204 and blank bodies both decode to `None`, as does a literal `null`.
async fn read_optional_entry(
    response: Response,
) -> std::result::Result<Option<InventoryEntry>, GatewayError> {
    let (status, body) = read_success_body(response).await?;
    if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        return Ok(None);
    }
    decode_body(status, &body)
}

fn decode_body<T: serde::de::DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> std::result::Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::MalformedBody {
        status: status.as_u16(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
