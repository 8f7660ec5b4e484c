//! reCAPTCHA response verification.

use std::time::Duration;

use serde::Deserialize;
use sp_core::RecaptchaSettings;
use tracing::{debug, instrument};

use crate::error::{PolicyError, PolicyResult};

const API_NAME: &str = "reCAPTCHA";

/// Body returned by the siteverify endpoint.
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies captcha responses against the configured siteverify endpoint.
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    settings: Option<RecaptchaSettings>,
}

impl RecaptchaVerifier {
    /// Creates a verifier. `None` rejects every response.
    pub fn new(settings: Option<RecaptchaSettings>) -> PolicyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PolicyError::Client(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Returns true when verification is skipped entirely.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|s| s.private_key.trim().is_empty())
    }

    /// Verifies a captcha response token.
    ///
    /// - Settings present with an empty private key: always valid.
    /// - No settings, or no response token: invalid.
    /// - Otherwise the siteverify `success` flag decides.
    #[instrument(skip_all)]
    pub async fn verify(&self, response: Option<&str>) -> PolicyResult<bool> {
        if self.is_disabled() {
            return Ok(true);
        }

        let (Some(settings), Some(response)) = (
            self.settings.as_ref(),
            response.filter(|r| !r.is_empty()),
        ) else {
            return Ok(false);
        };

        let reply = self
            .client
            .get(&settings.verify_url)
            .query(&[
                ("secret", settings.private_key.as_str()),
                ("response", response),
            ])
            .send()
            .await
            .map_err(|e| PolicyError::request(API_NAME, e))?;

        let status = reply.status();
        if !status.is_success() {
            return Err(PolicyError::Status {
                api: API_NAME,
                status: status.as_u16(),
            });
        }

        let body: SiteVerifyResponse = reply
            .json()
            .await
            .map_err(|e| PolicyError::invalid_response(API_NAME, e))?;

        if !body.success {
            debug!(error_codes = ?body.error_codes, "captcha rejected");
        }
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, private_key: &str) -> RecaptchaSettings {
        RecaptchaSettings {
            site_key: "site".to_string(),
            private_key: private_key.to_string(),
            verify_url: format!("{}/recaptcha/api/siteverify", server.uri()),
            ..RecaptchaSettings::default()
        }
    }

    #[tokio::test]
    async fn empty_private_key_skips_verification() {
        let server = MockServer::start().await;
        let verifier = RecaptchaVerifier::new(Some(settings(&server, ""))).unwrap();
        assert!(verifier.verify(None).await.unwrap());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_settings_reject() {
        let verifier = RecaptchaVerifier::new(None).unwrap();
        assert!(!verifier.verify(Some("token")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_response_rejects() {
        let server = MockServer::start().await;
        let verifier = RecaptchaVerifier::new(Some(settings(&server, "secret"))).unwrap();
        assert!(!verifier.verify(None).await.unwrap());
        assert!(!verifier.verify(Some("")).await.unwrap());
    }

    #[tokio::test]
    async fn siteverify_success_flag_decides() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recaptcha/api/siteverify"))
            .and(query_param("secret", "secret"))
            .and(query_param("response", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recaptcha/api/siteverify"))
            .and(query_param("response", "bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"success": false, "error-codes": ["invalid-input-response"]}),
            ))
            .mount(&server)
            .await;

        let verifier = RecaptchaVerifier::new(Some(settings(&server, "secret"))).unwrap();
        assert!(verifier.verify(Some("good")).await.unwrap());
        assert!(!verifier.verify(Some("bad")).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let verifier = RecaptchaVerifier::new(Some(settings(&server, "secret"))).unwrap();
        let err = verifier.verify(Some("token")).await.unwrap_err();
        assert!(matches!(err, PolicyError::InvalidResponse { .. }));
    }
}
