//! Power-control operations against one provider account.
//!
//! [`FenceAgent`] exposes the three operations the fencing framework needs:
//! reading the power status of a target, switching it on or off, and
//! listing every target visible to the credential. All of them go through a
//! [`Transport`] and share the state table in [`crate::state`].

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use crate::error::FenceError;
use crate::providers::hetzner::{ActionResponse, ErrorResponse, ServerListResponse, ServerResponse};
use crate::providers::{ApiResponse, Transport};
use crate::state::{PowerState, Target};

/// Delay before retrying after a 429 or 423 response.
pub const DEFAULT_BACKOFF_SECS: u64 = 3;

/// Attempts allowed for one power change before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Targets keyed by canonical id, with name and mapped state.
pub type TargetList = BTreeMap<String, (String, PowerState)>;

/// Requested power change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Power the target on.
    On,
    /// Power the target off (hard).
    Off,
}

impl PowerAction {
    /// Provider action verb.
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::On => "poweron",
            Self::Off => "poweroff",
        }
    }

    /// State the target ends up in once the action lands.
    #[must_use]
    pub fn target_state(self) -> PowerState {
        match self {
            Self::On => PowerState::On,
            Self::Off => PowerState::Off,
        }
    }
}

/// Retry bounds for power changes hitting rate limits or locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between attempts.
    pub backoff: Duration,
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Fencing operations for targets reachable through one transport.
pub struct FenceAgent<T> {
    transport: T,
    retry: RetryPolicy,
    verbose_level: u8,
}

impl<T: Transport> FenceAgent<T> {
    /// Create an agent with the default retry policy.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            verbose_level: 0,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the verbosity; above 1 every API response is logged.
    #[must_use]
    pub fn with_verbose_level(mut self, verbose_level: u8) -> Self {
        self.verbose_level = verbose_level;
        self
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn log_response(&self, response: &ApiResponse) {
        if self.verbose_level > 1 {
            debug!(status = %response.status, "API responded with status code");
            debug!(body = %response.body, "API responded with body");
        }
    }

    /// Read the current power state of a target.
    ///
    /// A rate-limited request sleeps one backoff interval and reports
    /// [`PowerState::Unknown`]; the caller is expected to poll again.
    ///
    /// # Errors
    /// [`FenceError::LoginDenied`] on 401, [`FenceError::StatusUnavailable`]
    /// on any other failure.
    pub async fn get_power_status(&self, target_id: &str) -> Result<PowerState, FenceError> {
        debug!(server_id = %target_id, "Starting get status operation");

        let response = self
            .transport
            .get(&format!("/servers/{target_id}"))
            .await
            .map_err(|e| {
                error!(server_id = %target_id, error = %e, "Failed to get power status");
                FenceError::StatusUnavailable(e.to_string())
            })?;
        self.log_response(&response);

        match response.status {
            StatusCode::UNAUTHORIZED => {
                error!("API error (unauthorized): request was made with an invalid or unknown token");
                return Err(FenceError::LoginDenied);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(
                    backoff_secs = self.retry.backoff.as_secs_f64(),
                    "API error (rate_limit_exceeded): too many requests, waiting before reporting unknown"
                );
                tokio::time::sleep(self.retry.backoff).await;
                return Ok(PowerState::Unknown);
            }
            status if !status.is_success() => {
                let reason = describe_failure(&response);
                error!(server_id = %target_id, reason = %reason, "Failed to get power status");
                return Err(FenceError::StatusUnavailable(reason));
            }
            _ => {}
        }

        let server: ServerResponse = response.json().map_err(|e| {
            error!(server_id = %target_id, error = %e, "Failed to parse server response");
            FenceError::StatusUnavailable(format!("malformed server response: {e}"))
        })?;
        let target = Target::from(server.server);

        debug!(
            server_id = %target.id,
            provider_state = %target.provider_state,
            state = %target.state,
            "Status read"
        );
        Ok(target.state)
    }

    /// Issue a power change for a target.
    ///
    /// Rate-limited (429) and locked (423) responses are retried after a
    /// fixed backoff until [`RetryPolicy::max_attempts`] is used up. Powering
    /// off an already-off target (or on an already-on one) is accepted by the
    /// provider and is not an error.
    ///
    /// # Errors
    /// [`FenceError::LoginDenied`] on 401, [`FenceError::ActionFailed`] on
    /// any other failure or when retries are exhausted.
    pub async fn set_power_status(
        &self,
        target_id: &str,
        action: PowerAction,
    ) -> Result<(), FenceError> {
        let path = format!("/servers/{target_id}/actions/{}", action.command());
        info!(server_id = %target_id, command = action.command(), "Starting set status operation");

        let mut attempt = 0;
        loop {
            attempt += 1;

            let response = self.transport.post(&path).await.map_err(|e| {
                error!(server_id = %target_id, error = %e, "Failed to set power status");
                FenceError::ActionFailed(e.to_string())
            })?;
            self.log_response(&response);

            let transient = match response.status {
                StatusCode::UNAUTHORIZED => {
                    error!("API error (unauthorized): request was made with an invalid or unknown token");
                    return Err(FenceError::LoginDenied);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("API error (rate_limit_exceeded): too many requests");
                    FenceError::RateLimited
                }
                StatusCode::LOCKED => {
                    warn!("API error (locked): another action is already running on the server");
                    FenceError::ResourceLocked
                }
                status if status.is_success() => {
                    log_action(target_id, &response);
                    return Ok(());
                }
                _ => {
                    let reason = describe_failure(&response);
                    error!(server_id = %target_id, reason = %reason, "Failed to set power status");
                    return Err(FenceError::ActionFailed(reason));
                }
            };

            if attempt >= self.retry.max_attempts {
                error!(
                    server_id = %target_id,
                    attempts = attempt,
                    "Giving up on power change"
                );
                return Err(FenceError::ActionFailed(format!(
                    "{transient} (gave up after {attempt} attempts)"
                )));
            }

            warn!(
                attempt,
                max_attempts = self.retry.max_attempts,
                backoff_secs = self.retry.backoff.as_secs_f64(),
                "Waiting before trying again"
            );
            tokio::time::sleep(self.retry.backoff).await;
        }
    }

    /// List every target visible to the credential.
    ///
    /// Failures other than a denied login are logged and yield an empty
    /// list, so a health check cycle degrades instead of aborting.
    ///
    /// # Errors
    /// [`FenceError::LoginDenied`] on 401.
    pub async fn list_targets(&self) -> Result<TargetList, FenceError> {
        debug!("Starting list/monitor operation");

        match self.fetch_targets().await {
            Ok(targets) => Ok(targets),
            Err(FenceError::LoginDenied) => Err(FenceError::LoginDenied),
            Err(e) => {
                error!(error = %e, "Failed to list servers");
                Ok(TargetList::new())
            }
        }
    }

    async fn fetch_targets(&self) -> Result<TargetList, FenceError> {
        let mut targets = TargetList::new();
        let mut path = "/servers".to_string();
        let mut page = 1;

        loop {
            let response = self
                .transport
                .get(&path)
                .await
                .map_err(|e| FenceError::StatusUnavailable(e.to_string()))?;
            self.log_response(&response);

            if response.status == StatusCode::UNAUTHORIZED {
                error!("API error (unauthorized): request was made with an invalid or unknown token");
                return Err(FenceError::LoginDenied);
            }
            if !response.status.is_success() {
                return Err(FenceError::StatusUnavailable(describe_failure(&response)));
            }

            let listing: ServerListResponse = response.json().map_err(|e| {
                FenceError::StatusUnavailable(format!("malformed server list: {e}"))
            })?;
            let next_page = listing.next_page();

            for server in listing.servers {
                let target = Target::from(server);
                targets.insert(target.id, (target.name, target.state));
            }

            match next_page {
                Some(next) if next > page => {
                    page = next;
                    path = format!("/servers?page={next}");
                }
                _ => break,
            }
        }

        debug!(count = targets.len(), "Found servers");
        Ok(targets)
    }
}

/// Log the provider action returned by a power change.
fn log_action(target_id: &str, response: &ApiResponse) {
    match response.json::<ActionResponse>() {
        Ok(accepted) => {
            let action = accepted.action;
            if let Some(err) = action.error.filter(|_| action.status == "error") {
                warn!(
                    server_id = %target_id,
                    action_id = action.id,
                    code = %err.code,
                    message = %err.message,
                    "Provider reported the power action as failed"
                );
            } else {
                debug!(
                    server_id = %target_id,
                    action_id = action.id,
                    command = %action.command,
                    status = %action.status,
                    "Power action accepted"
                );
            }
        }
        Err(_) => debug!(server_id = %target_id, "Power action accepted"),
    }
}

/// Human readable reason for a non-2xx response.
fn describe_failure(response: &ApiResponse) -> String {
    match response.json::<ErrorResponse>() {
        Ok(body) => format!(
            "API responded with {}: {} ({})",
            response.status, body.error.message, body.error.code
        ),
        Err(_) => format!("API responded with {}", response.status),
    }
}
