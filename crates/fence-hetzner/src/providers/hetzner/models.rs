//! Hetzner Cloud API request and response models.
//!
//! Based on the Hetzner Cloud API documentation.

use serde::Deserialize;

use crate::state::Target;

// ============================================================================
// Server types
// ============================================================================

/// Server identifier as sent by the API.
///
/// The API uses integers, but string ids are accepted too so that the
/// canonical string form is always available for host-to-target mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    /// Numeric id (the documented form).
    Number(u64),
    /// Textual id.
    Text(String),
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Response of `GET /servers/{id}`.
#[derive(Debug, Deserialize)]
pub struct ServerResponse {
    /// Server details.
    pub server: ServerDetails,
}

/// Fields of a server relevant to power control.
#[derive(Debug, Deserialize)]
pub struct ServerDetails {
    /// Server id.
    pub id: ServerId,
    /// Server name.
    pub name: String,
    /// Lifecycle status (`running`, `off`, ...).
    pub status: String,
}

impl From<ServerDetails> for Target {
    fn from(server: ServerDetails) -> Self {
        Self::new(server.id.to_string(), server.name, &server.status)
    }
}

/// Response of `GET /servers`.
#[derive(Debug, Deserialize)]
pub struct ServerListResponse {
    /// Servers on this page.
    pub servers: Vec<ServerDetails>,
    /// Pagination metadata.
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl ServerListResponse {
    /// Page number to request next, if any.
    #[must_use]
    pub fn next_page(&self) -> Option<u32> {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .and_then(|p| p.next_page)
    }
}

/// Collection metadata.
#[derive(Debug, Deserialize)]
pub struct Meta {
    /// Pagination details.
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Pagination details of a collection response.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Current page.
    pub page: u32,
    /// Next page, `null` on the last page.
    #[serde(default)]
    pub next_page: Option<u32>,
}

// ============================================================================
// Action types
// ============================================================================

/// Response of `POST /servers/{id}/actions/{command}`.
#[derive(Debug, Deserialize)]
pub struct ActionResponse {
    /// The queued action.
    pub action: ActionDetails,
}

/// Action tracked by the provider.
#[derive(Debug, Deserialize)]
pub struct ActionDetails {
    /// Action id.
    pub id: u64,
    /// Command name (`poweron`, `poweroff`).
    pub command: String,
    /// `running`, `success` or `error`.
    pub status: String,
    /// Error details when the action failed.
    #[serde(default)]
    pub error: Option<ApiError>,
}

// ============================================================================
// Error types
// ============================================================================

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ApiError,
}

/// Error details.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    /// Machine readable code (`locked`, `rate_limit_exceeded`, ...).
    pub code: String,
    /// Human readable message.
    pub message: String,
}
