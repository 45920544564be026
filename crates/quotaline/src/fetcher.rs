//! Usage API client.

use crate::credentials::TokenSource;
use crate::error::{QuotalineError, Result};
use crate::store::UsageSnapshot;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_BETA_HEADER: &str = "anthropic-beta";
const ANTHROPIC_BETA_VALUE: &str = "oauth-2025-04-20";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// One HTTP GET. Production uses reqwest; tests substitute a canned reply.
#[allow(async_fn_in_trait)]
pub trait UsageTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<HttpReply>;
}

pub struct ReqwestTransport {
    // A client that failed to build turns every request into a failed fetch.
    client: std::result::Result<reqwest::Client, String>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                warn!("failed to build HTTP client: {}", e);
                e.to_string()
            });
        Self { client }
    }
}

impl UsageTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<HttpReply> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| QuotalineError::Client(e.clone()))?;
        let response = client.get(url).headers(headers).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Default, Deserialize)]
struct UsageApiResponse {
    #[serde(default)]
    five_hour: Option<UsageWindow>,
    #[serde(default)]
    seven_day: Option<UsageWindow>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageWindow {
    #[serde(default)]
    resets_at: Option<String>,
    #[serde(default)]
    utilization: Option<f64>,
}

pub struct UsageFetcher<T, S> {
    transport: T,
    tokens: S,
    endpoint: String,
}

impl<T: UsageTransport, S: TokenSource> UsageFetcher<T, S> {
    pub fn new(transport: T, tokens: S, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            tokens,
            endpoint: endpoint.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn prepare_headers(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ANTHROPIC_BETA_HEADER,
            HeaderValue::from_static(ANTHROPIC_BETA_VALUE),
        );
        Ok(headers)
    }

    /// Fetch current usage and stamp it with `now`. Makes exactly one request.
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<UsageSnapshot> {
        let token = self.tokens.access_token()?;
        let headers = Self::prepare_headers(&token)?;

        debug!("fetching usage from {}", self.endpoint);
        let reply = self.transport.get(&self.endpoint, headers).await?;
        if reply.status != 200 {
            return Err(QuotalineError::Status(reply.status));
        }

        let response: UsageApiResponse = serde_json::from_str(&reply.body)?;
        let five_hour = response.five_hour.unwrap_or_default();
        let seven_day = response.seven_day.unwrap_or_default();

        let resets_at = five_hour.resets_at.unwrap_or_default();
        if resets_at.is_empty() {
            return Err(QuotalineError::EmptyResponse);
        }

        Ok(UsageSnapshot {
            resets_at,
            utilization: five_hour.utilization.unwrap_or_default(),
            weekly_utilization: seven_day.utilization.unwrap_or_default(),
            weekly_resets_at: seven_day.resets_at.unwrap_or_default(),
            cached_at: now.timestamp(),
        })
    }
}
