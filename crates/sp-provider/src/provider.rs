//! Provider traits.
//!
//! [`PasswordChangeProvider`] is what the HTTP layer calls.
//! [`DirectoryBackend`] is what the orchestration calls; it is a thin
//! surface over the directory so the policy sequence stays testable.

use async_trait::async_trait;
use sp_core::ApiErrorItem;

use crate::error::ProviderResult;

// ============================================================================
// Password Change Provider
// ============================================================================

/// Entry point used by the HTTP controller.
#[async_trait]
pub trait PasswordChangeProvider: Send + Sync {
    /// Changes a user's password.
    ///
    /// Returns `None` on success, or the first error detected.
    async fn perform_password_change(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Option<ApiErrorItem>;

    /// Measures how different the new password is from the current one.
    fn measure_new_password_distance(&self, current_password: &str, new_password: &str) -> usize {
        sp_policy::distance(current_password, new_password)
    }
}

// ============================================================================
// Directory Backend
// ============================================================================

/// A user account as seen by the orchestration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUser {
    /// Distinguished name.
    pub dn: String,
    /// Value of the identity attribute the user was found by.
    pub account_name: String,
    /// userPrincipalName, when present.
    pub user_principal_name: Option<String>,
    /// Raw `pwdLastSet` value. `None` or `Some(0)` means never set.
    pub password_last_set: Option<i64>,
    /// Raw `userAccountControl` flags.
    pub user_account_control: u32,
    /// The account's DACL denies it the Change Password right.
    pub change_password_denied: bool,
}

impl DirectoryUser {
    /// Returns true if the account may not change its own password.
    ///
    /// Active Directory ignores the `PASSWD_CANT_CHANGE` bit of
    /// `userAccountControl`; only the DACL decides.
    #[must_use]
    pub const fn cannot_change_password(&self) -> bool {
        self.change_password_denied
    }

    /// Returns true if the password has never been set.
    #[must_use]
    pub fn password_never_set(&self) -> bool {
        matches!(self.password_last_set, None | Some(0))
    }
}

/// Outcome of verifying the current password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// The password is correct.
    Valid,
    /// The password is correct but expired or flagged "must change".
    Expired,
    /// The password is wrong.
    Invalid,
}

impl CredentialCheck {
    /// Returns true if the password change may proceed.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Valid | Self::Expired)
    }
}

/// Directory operations needed to change a password.
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Finds a user by the configured identity attribute.
    async fn find_user(&self, username: &str) -> ProviderResult<Option<DirectoryUser>>;

    /// Reads the domain minimum password length.
    async fn min_password_length(&self) -> ProviderResult<usize>;

    /// Lists the user's directly assigned group names.
    async fn user_groups(&self, user: &DirectoryUser) -> ProviderResult<Vec<String>>;

    /// Lists every group the user belongs to, including nested groups.
    async fn authorization_groups(&self, user: &DirectoryUser) -> ProviderResult<Vec<String>>;

    /// Sets `pwdLastSet` to the current time.
    async fn touch_password_last_set(&self, user: &DirectoryUser) -> ProviderResult<()>;

    /// Verifies the user's current password.
    async fn validate_credentials(
        &self,
        user: &DirectoryUser,
        password: &str,
    ) -> ProviderResult<CredentialCheck>;

    /// Changes the password, proving knowledge of the current one.
    async fn change_password(
        &self,
        user: &DirectoryUser,
        current_password: &str,
        new_password: &str,
    ) -> ProviderResult<()>;

    /// Resets the password with the service account's rights.
    async fn set_password(&self, user: &DirectoryUser, new_password: &str) -> ProviderResult<()>;
}
