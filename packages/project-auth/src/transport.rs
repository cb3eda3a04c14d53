use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::types::AccessToken;

/// Query parameter carrying the access token on every authorization API call.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// A GET request relative to the configured base URL.
///
/// Builders never see the token query parameter; the executor adds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
}

impl RemoteRequest {
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Path as sent, for logs. Never contains the token.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Resolve against the base URL and attach the token.
    pub fn to_url(&self, config: &AuthConfig, token: &AccessToken) -> Result<Url> {
        let mut url = config.endpoint(self.segments.as_slice())?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(ACCESS_TOKEN_PARAM, token.as_str());
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP seam. Failures to complete the exchange are `AuthError::Transport`;
/// any response that arrives, whatever its status, is returned.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse>;
}

/// reqwest-backed transport with a request timeout.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.request_timeout)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
