//! Hetzner Cloud API client implementation.
//!
//! API Documentation: <https://docs.hetzner.cloud/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::providers::traits::{ApiResponse, Transport, TransportError};

/// Base URL for the Hetzner Cloud API.
pub const API_BASE_URL: &str = "https://api.hetzner.cloud/v1";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("fence_hetzner/", env!("CARGO_PKG_VERSION"));

/// Authenticated session against the Hetzner Cloud API.
#[derive(Clone)]
pub struct HetznerCloud {
    /// HTTP client carrying the authorization headers.
    client: Client,
    /// API base URL without trailing slash.
    base_url: String,
}

impl HetznerCloud {
    /// Create a client for the public Hetzner Cloud API.
    ///
    /// # Errors
    /// Returns error if the token is not a valid header value or the HTTP
    /// client cannot be created.
    pub fn new(api_token: &str) -> Result<Self, TransportError> {
        Self::with_base_url(
            api_token,
            API_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a client against a custom base URL.
    ///
    /// # Errors
    /// Returns error if the token is not a valid header value or the HTTP
    /// client cannot be created.
    pub fn with_base_url(
        api_token: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_token}")).map_err(|_| {
            TransportError::Config("API token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and capture status and body.
    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok(ApiResponse::from_text(status, &text))
    }
}

#[async_trait]
impl Transport for HetznerCloud {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");
        self.send(self.client.get(&url)).await
    }

    async fn post(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        debug!(url = %url, "POST request");
        self.send(self.client.post(&url)).await
    }
}
