//! Provider error types.
//!
//! ## Security Note
//!
//! Messages end up in client responses. They must not contain passwords,
//! bind credentials, or raw directory internals beyond the server's
//! diagnostic text.

use sp_core::{ApiErrorCode, ApiErrorItem};
use sp_policy::PolicyError;
use thiserror::Error;

/// Errors that can occur while changing a password.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error to the directory.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The directory rejected the new password against its policy.
    #[error("{0}")]
    PasswordPolicy(String),

    /// The directory refused the operation for this account.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Directory lookup error.
    #[error("User lookup error: {0}")]
    UserLookup(String),

    /// Group membership could not be resolved.
    #[error("Group lookup error: {0}")]
    GroupLookup(String),

    /// Protocol error returned by the directory.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Breach check or other policy service failed.
    #[error("Policy check failed: {0}")]
    Policy(#[from] PolicyError),

    /// Internal error.
    #[error("Internal provider error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a password policy error.
    #[must_use]
    pub fn password_policy(msg: impl Into<String>) -> Self {
        Self::PasswordPolicy(msg.into())
    }

    /// Checks if this is a connection error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Maps the error to the item returned to the client.
    ///
    /// Directory complexity rejections become `ComplexPassword`; everything
    /// else is `Generic`.
    #[must_use]
    pub fn to_api_error(&self) -> ApiErrorItem {
        match self {
            Self::PasswordPolicy(msg) => {
                ApiErrorItem::with_message(ApiErrorCode::ComplexPassword, msg.clone())
            }
            other => ApiErrorItem::with_message(ApiErrorCode::Generic, other.to_string()),
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
