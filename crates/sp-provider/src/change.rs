//! Password change orchestration.
//!
//! Runs the validation sequence in a fixed order and stops at the first
//! failure. Directory and network errors are caught and reported as
//! `Generic`, except directory complexity rejections which become
//! `ComplexPassword`.

use std::sync::Arc;

use async_trait::async_trait;
use sp_core::config::DEFAULT_MIN_PASSWORD_LENGTH;
use sp_core::{ApiErrorCode, ApiErrorItem, PasswordChangeOptions};
use sp_policy::BreachChecker;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderResult;
use crate::provider::{DirectoryBackend, DirectoryUser, PasswordChangeProvider};

/// Password change provider backed by a directory.
pub struct PasswordChangeService<D> {
    options: PasswordChangeOptions,
    directory: D,
    breach_checker: Arc<dyn BreachChecker>,
}

impl<D: DirectoryBackend> PasswordChangeService<D> {
    /// Creates a new service.
    pub fn new(
        options: PasswordChangeOptions,
        directory: D,
        breach_checker: Arc<dyn BreachChecker>,
    ) -> Self {
        debug!(id_type = %options.id_type_for_user, "password change service configured");
        Self {
            options,
            directory,
            breach_checker,
        }
    }

    /// Returns the options in use.
    #[must_use]
    pub const fn options(&self) -> &PasswordChangeOptions {
        &self.options
    }

    /// Returns the directory backend.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    async fn run(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> ProviderResult<Option<ApiErrorItem>> {
        let username = self.options.fix_username_with_domain(username);
        info!(username = %username, "Performing password change");

        let Some(user) = self.directory.find_user(&username).await? else {
            warn!(username = %username, "User not found");
            return Ok(Some(ApiErrorItem::new(ApiErrorCode::UserNotFound)));
        };

        if let Some(item) = self.validate_length(new_password).await {
            return Ok(Some(item));
        }

        if self.breach_checker.is_pwned(new_password).await? {
            error!(username = %username, "New password appears in a breach corpus");
            return Ok(Some(ApiErrorItem::new(ApiErrorCode::PwnedPassword)));
        }

        if let Some(item) = self.validate_groups(&user).await {
            return Ok(Some(item));
        }

        if user.cannot_change_password() {
            warn!(username = %username, "Account is denied the Change Password right");
            return Ok(Some(ApiErrorItem::new(ApiErrorCode::ChangeNotPermitted)));
        }

        if self.options.update_last_password && user.password_never_set() {
            if let Err(e) = self.directory.touch_password_last_set(&user).await {
                error!(username = %username, error = %e, "Failed to update pwdLastSet");
                return Ok(Some(ApiErrorItem::with_message(
                    ApiErrorCode::ChangeNotPermitted,
                    "Failed to update 'pwdLastSet' attribute.",
                )));
            }
            info!(username = %username, "pwdLastSet updated");
        }

        // An empty password would turn the verification bind into an
        // unauthenticated bind, which always succeeds.
        let accepted = !current_password.is_empty()
            && self
                .directory
                .validate_credentials(&user, current_password)
                .await?
                .is_accepted();
        if !accepted {
            warn!(username = %username, "Invalid current password");
            return Ok(Some(ApiErrorItem::new(ApiErrorCode::InvalidCredentials)));
        }

        self.update_password(&user, current_password, new_password)
            .await?;
        debug!(username = %username, "Password updated");
        Ok(None)
    }

    async fn validate_length(&self, new_password: &str) -> Option<ApiErrorItem> {
        let min_length = match self.directory.min_password_length().await {
            Ok(length) => length,
            Err(e) => {
                warn!(error = %e, default = DEFAULT_MIN_PASSWORD_LENGTH, "Could not read minimum password length");
                DEFAULT_MIN_PASSWORD_LENGTH
            }
        };

        if new_password.chars().count() < min_length {
            error!(min_length, "New password is shorter than the domain minimum");
            return Some(ApiErrorItem::new(ApiErrorCode::ComplexPassword));
        }
        None
    }

    async fn validate_groups(&self, user: &DirectoryUser) -> Option<ApiErrorItem> {
        let groups = match self.directory.user_groups(user).await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "Error retrieving groups, falling back to authorization groups");
                match self.directory.authorization_groups(user).await {
                    Ok(groups) => groups,
                    Err(e) => {
                        error!(error = %e, "Error during group membership validation");
                        return Some(ApiErrorItem::with_message(
                            ApiErrorCode::Generic,
                            "Error during group membership validation.",
                        ));
                    }
                }
            }
        };

        let is_member = |configured: &[String]| {
            groups
                .iter()
                .any(|g| configured.iter().any(|c| c.eq_ignore_ascii_case(g)))
        };

        if is_member(&self.options.restricted_ad_groups) {
            warn!(dn = %user.dn, "User is a member of a restricted group");
            return Some(ApiErrorItem::with_message(
                ApiErrorCode::ChangeNotPermitted,
                "User is a member of a restricted group and password change is not permitted.",
            ));
        }

        if !self.options.allowed_ad_groups.is_empty() && !is_member(&self.options.allowed_ad_groups) {
            warn!(dn = %user.dn, "User is not a member of any allowed group");
            return Some(ApiErrorItem::with_message(
                ApiErrorCode::ChangeNotPermitted,
                "User is not a member of any allowed group and password change is not permitted.",
            ));
        }

        None
    }

    async fn update_password(
        &self,
        user: &DirectoryUser,
        current_password: &str,
        new_password: &str,
    ) -> ProviderResult<()> {
        let change_err = match self
            .directory
            .change_password(user, current_password, new_password)
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !self.options.allow_set_password_fallback {
            warn!(error = %change_err, "Password change failed and reset fallback is disabled");
            return Err(change_err);
        }

        debug!(error = %change_err, "Password change failed, resetting with service account");
        self.directory
            .set_password(user, new_password)
            .await
            .inspect_err(|e| error!(error = %e, "Password reset failed"))
    }
}

#[async_trait]
impl<D: DirectoryBackend> PasswordChangeProvider for PasswordChangeService<D> {
    #[instrument(skip(self, current_password, new_password))]
    async fn perform_password_change(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Option<ApiErrorItem> {
        match self.run(username, current_password, new_password).await {
            Ok(result) => result,
            Err(e) => {
                let item = e.to_api_error();
                if item.error_code == ApiErrorCode::ComplexPassword {
                    warn!(error = %e, "Directory rejected the new password");
                } else {
                    error!(error = %e, "Unexpected error during password change");
                }
                Some(item)
            }
        }
    }
}
