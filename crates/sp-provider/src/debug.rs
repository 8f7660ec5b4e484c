//! Development provider that never touches a directory.
//!
//! The part of the username before `@` selects the outcome, which makes the
//! whole HTTP flow testable without Active Directory.

use std::sync::Arc;

use async_trait::async_trait;
use sp_core::{ApiErrorCode, ApiErrorItem};
use sp_policy::BreachChecker;
use tracing::{debug, error, warn};

use crate::provider::PasswordChangeProvider;

/// Provider returning canned outcomes keyed on the username.
pub struct DebugPasswordChangeProvider {
    breach_checker: Arc<dyn BreachChecker>,
}

impl DebugPasswordChangeProvider {
    /// Creates a debug provider.
    pub fn new(breach_checker: Arc<dyn BreachChecker>) -> Self {
        warn!("Using the debug password provider; no directory will be changed");
        Self { breach_checker }
    }

    fn outcome_for(username: &str) -> Option<ApiErrorItem> {
        let code = match username {
            "error" => return Some(ApiErrorItem::with_message(ApiErrorCode::Generic, "Error")),
            "changeNotPermitted" => ApiErrorCode::ChangeNotPermitted,
            "fieldMismatch" => ApiErrorCode::FieldMismatch,
            "fieldRequired" => ApiErrorCode::FieldRequired,
            "invalidCaptcha" => ApiErrorCode::InvalidCaptcha,
            "invalidCredentials" => ApiErrorCode::InvalidCredentials,
            "userNotFound" => ApiErrorCode::UserNotFound,
            "complexPassword" => ApiErrorCode::ComplexPassword,
            "pwnedPassword" => ApiErrorCode::PwnedPassword,
            _ => return None,
        };
        Some(ApiErrorItem::new(code))
    }
}

#[async_trait]
impl PasswordChangeProvider for DebugPasswordChangeProvider {
    async fn perform_password_change(
        &self,
        username: &str,
        _current_password: &str,
        new_password: &str,
    ) -> Option<ApiErrorItem> {
        let name = username.split('@').next().unwrap_or(username);

        match self.breach_checker.is_pwned(new_password).await {
            Ok(true) => return Some(ApiErrorItem::new(ApiErrorCode::PwnedPassword)),
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Breach check failed");
                return Some(ApiErrorItem::with_message(ApiErrorCode::Generic, e.to_string()));
            }
        }

        let outcome = Self::outcome_for(name);
        debug!(username = %name, failed = outcome.is_some(), "Debug password change");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use sp_policy::{PolicyError, PolicyResult};

    use super::*;

    struct FixedBreach(Option<bool>);

    #[async_trait]
    impl BreachChecker for FixedBreach {
        async fn is_pwned(&self, _password: &str) -> PolicyResult<bool> {
            self.0.ok_or(PolicyError::Status {
                api: "Pwned Passwords",
                status: 500,
            })
        }
    }

    fn provider(pwned: Option<bool>) -> DebugPasswordChangeProvider {
        DebugPasswordChangeProvider::new(Arc::new(FixedBreach(pwned)))
    }

    #[tokio::test]
    async fn magic_usernames_map_to_codes() {
        let provider = provider(Some(false));
        let cases = [
            ("changeNotPermitted", ApiErrorCode::ChangeNotPermitted),
            ("fieldMismatch", ApiErrorCode::FieldMismatch),
            ("fieldRequired", ApiErrorCode::FieldRequired),
            ("invalidCaptcha", ApiErrorCode::InvalidCaptcha),
            ("invalidCredentials", ApiErrorCode::InvalidCredentials),
            ("userNotFound", ApiErrorCode::UserNotFound),
            ("complexPassword", ApiErrorCode::ComplexPassword),
            ("pwnedPassword", ApiErrorCode::PwnedPassword),
        ];

        for (username, expected) in cases {
            let result = provider
                .perform_password_change(username, "old", "new")
                .await
                .unwrap();
            assert_eq!(result.error_code, expected, "username {username}");
        }
    }

    #[tokio::test]
    async fn error_username_is_generic() {
        let result = provider(Some(false))
            .perform_password_change("error@example.com", "old", "new")
            .await
            .unwrap();
        assert_eq!(result.error_code, ApiErrorCode::Generic);
        assert_eq!(result.message.as_deref(), Some("Error"));
    }

    #[tokio::test]
    async fn domain_is_stripped_and_others_succeed() {
        let provider = provider(Some(false));
        assert!(provider
            .perform_password_change("userNotFound@corp.local", "old", "new")
            .await
            .is_some());
        assert!(provider
            .perform_password_change("jdoe@corp.local", "old", "new")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn breach_check_runs_first() {
        let result = provider(Some(true))
            .perform_password_change("jdoe", "old", "password")
            .await
            .unwrap();
        assert_eq!(result.error_code, ApiErrorCode::PwnedPassword);

        let result = provider(None)
            .perform_password_change("jdoe", "old", "password")
            .await
            .unwrap();
        assert_eq!(result.error_code, ApiErrorCode::Generic);
    }
}
