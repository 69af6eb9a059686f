//! Transport trait and common types for power-control APIs.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the provider API.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Status code and parsed body of one API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// JSON body; non-JSON text is kept as a string value, empty as `null`.
    pub body: Value,
}

impl ApiResponse {
    /// Create a response from an already parsed body.
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Create a response from raw body text.
    #[must_use]
    pub fn from_text(status: StatusCode, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }

    /// Deserialize the body into a typed model.
    ///
    /// # Errors
    /// Returns error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

/// Authenticated access to the provider's server-control endpoints.
///
/// Implementations never retry; retry policy belongs to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET against a path relative to the API base URL.
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError>;

    /// Issue a body-less POST against a path relative to the API base URL.
    async fn post(&self, path: &str) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_text_parses_json() {
        let response = ApiResponse::from_text(StatusCode::OK, r#"{"server":{"id":1}}"#);
        assert_eq!(response.body, json!({"server": {"id": 1}}));
    }

    #[test]
    fn test_from_text_keeps_plain_text() {
        let response = ApiResponse::from_text(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(response.body, Value::String("<html>bad gateway</html>".into()));

        let empty = ApiResponse::from_text(StatusCode::CREATED, "  ");
        assert_eq!(empty.body, Value::Null);
    }
}
