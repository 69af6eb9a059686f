//! Classified failures reported back to the fencing framework.

use thiserror::Error;

/// Exit code for a successful action.
pub const EC_OK: u8 = 0;
/// Exit code for any failure without a more specific classification.
pub const EC_GENERIC_ERROR: u8 = 1;
/// Exit code of the `status` action when the target is powered off.
pub const EC_STATUS_OFF: u8 = 2;
/// Exit code when the provider rejected the credential.
pub const EC_LOGIN_DENIED: u8 = 3;
/// Exit code when the target did not reach the "on" state in time.
pub const EC_WAITING_ON: u8 = 6;
/// Exit code when the target did not reach the "off" state in time.
pub const EC_WAITING_OFF: u8 = 7;
/// Exit code when the power status could not be determined.
pub const EC_STATUS: u8 = 8;

/// Errors that terminate a fencing operation.
#[derive(Error, Debug)]
pub enum FenceError {
    /// The API token is invalid or unknown (HTTP 401). Never retried.
    #[error("Login denied: the API token is invalid or unknown")]
    LoginDenied,

    /// The provider is rate limiting requests (HTTP 429).
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Another action is already running on the target (HTTP 423).
    #[error("Resource locked: another action is already running")]
    ResourceLocked,

    /// The power status of the target could not be read.
    #[error("Failed to get power status: {0}")]
    StatusUnavailable(String),

    /// The power change could not be issued.
    #[error("Failed to set power status: {0}")]
    ActionFailed(String),

    /// The target did not power on within the power timeout.
    #[error("Timed out waiting to power ON")]
    WaitingOn,

    /// The target did not power off within the power timeout.
    #[error("Timed out waiting to power OFF")]
    WaitingOff,

    /// The supplied options are incomplete or inconsistent.
    #[error("Invalid arguments: {0}")]
    BadArgs(String),

    /// Writing the action output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FenceError {
    /// Exit code the fencing framework expects for this failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LoginDenied => EC_LOGIN_DENIED,
            Self::StatusUnavailable(_) => EC_STATUS,
            Self::WaitingOn => EC_WAITING_ON,
            Self::WaitingOff => EC_WAITING_OFF,
            Self::RateLimited
            | Self::ResourceLocked
            | Self::ActionFailed(_)
            | Self::BadArgs(_)
            | Self::Io(_) => EC_GENERIC_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(FenceError::LoginDenied.exit_code(), 3);
        assert_eq!(FenceError::StatusUnavailable("x".into()).exit_code(), 8);
        assert_eq!(FenceError::ActionFailed("x".into()).exit_code(), 1);
        assert_eq!(FenceError::WaitingOn.exit_code(), 6);
        assert_eq!(FenceError::WaitingOff.exit_code(), 7);
        assert_eq!(FenceError::BadArgs("x".into()).exit_code(), 1);
    }
}
