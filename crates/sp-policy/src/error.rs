//! Policy check error types.

use std::fmt;

use thiserror::Error;

/// Policy check errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Request to an external API failed.
    #[error("{api} request failed: {message}")]
    Request {
        /// Which API was called.
        api: &'static str,
        /// Error description.
        message: String,
    },

    /// External API answered with a non-success status.
    #[error("{api} request failed with status code {status}")]
    Status {
        /// Which API was called.
        api: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("{api} returned an invalid response: {message}")]
    InvalidResponse {
        /// Which API was called.
        api: &'static str,
        /// Error description.
        message: String,
    },
}

impl PolicyError {
    /// Creates a request error.
    #[must_use]
    pub fn request(api: &'static str, err: impl fmt::Display) -> Self {
        Self::Request {
            api,
            message: err.to_string(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(api: &'static str, err: impl fmt::Display) -> Self {
        Self::InvalidResponse {
            api,
            message: err.to_string(),
        }
    }
}

/// Result type for policy checks.
pub type PolicyResult<T> = Result<T, PolicyError>;
