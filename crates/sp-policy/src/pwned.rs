//! Breached password lookup.
//!
//! Uses the Pwned Passwords k-anonymity range API: only the first five
//! characters of the SHA-1 hash leave the process, and the matching suffix
//! is searched locally in the returned `SUFFIX:COUNT` list.

use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::{debug, instrument, warn};

use crate::error::{PolicyError, PolicyResult};

const API_NAME: &str = "Pwned Passwords";

/// Checks whether a password is known to be breached.
#[async_trait]
pub trait BreachChecker: Send + Sync {
    /// Returns `Ok(true)` if the password appears in a breach corpus.
    async fn is_pwned(&self, password: &str) -> PolicyResult<bool>;
}

/// Client for the Pwned Passwords range API.
#[derive(Debug, Clone)]
pub struct PwnedPasswordsClient {
    client: reqwest::Client,
    base_url: String,
}

impl PwnedPasswordsClient {
    /// Request timeout for range lookups.
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> PolicyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("SelfPass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PolicyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BreachChecker for PwnedPasswordsClient {
    #[instrument(skip(self, password))]
    async fn is_pwned(&self, password: &str) -> PolicyResult<bool> {
        let (prefix, suffix) = hash_parts(password);
        debug!(hash_prefix = %prefix, "Pwned Passwords range request");

        let url = format!("{}/range/{prefix}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "Pwned Passwords request failed");
            PolicyError::request(API_NAME, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Pwned Passwords returned an error status");
            return Err(PolicyError::Status {
                api: API_NAME,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| PolicyError::invalid_response(API_NAME, e))?;

        let found = range_contains(&body, &suffix);
        debug!(hash_prefix = %prefix, found, "Pwned Passwords range checked");
        Ok(found)
    }
}

/// Splits the upper-case SHA-1 hex digest into the 5-char prefix and the rest.
fn hash_parts(password: &str) -> (String, String) {
    let hash = hex::encode_upper(Sha1::digest(password.as_bytes()));
    let (prefix, suffix) = hash.split_at(5);
    (prefix.to_string(), suffix.to_string())
}

/// Searches a range response body for a hash suffix.
fn range_contains(body: &str, suffix: &str) -> bool {
    body.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .any(|(line_suffix, _count)| line_suffix.eq_ignore_ascii_case(suffix))
}
