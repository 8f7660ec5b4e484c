//! Active Directory backend.
//!
//! ## Security Requirements
//!
//! - All connections use LDAPS (TLS from connection start)
//! - STARTTLS is NOT supported
//! - Plain LDAP is NOT supported
//! - Passwords are never logged

use std::sync::Arc;

use async_trait::async_trait;
use ldap3::Mod;
use sp_provider::{CredentialCheck, DirectoryBackend, DirectoryUser, ProviderResult};
use tracing::{debug, instrument};

use crate::config::LdapConfig;
use crate::connection::LdapConnectionPool;
use crate::error::{LdapError, LdapResult, RC_INVALID_CREDENTIALS};
use crate::password::{change_mods, reset_mods, touch_pwd_last_set_mods};
use crate::search::LdapSearcher;

/// Bind diagnostic sub-codes meaning "right password, but it must change".
const MUST_CHANGE_SUBCODES: [&str; 2] = ["data 773", "data 532"];

/// Classifies the result of binding with the user's current password.
///
/// AD refuses the bind (code 49) when the password is expired or flagged
/// "must change at next logon", but the password itself was correct.
pub fn classify_bind(rc: u32, text: &str) -> LdapResult<CredentialCheck> {
    match rc {
        0 => Ok(CredentialCheck::Valid),
        RC_INVALID_CREDENTIALS if MUST_CHANGE_SUBCODES.iter().any(|c| text.contains(c)) => {
            Ok(CredentialCheck::Expired)
        }
        RC_INVALID_CREDENTIALS => Ok(CredentialCheck::Invalid),
        _ => Err(LdapError::from_result("bind", rc, text)),
    }
}

/// Runs `$op` against a pooled connection bound to `$conn`.
///
/// The idle connection may have been closed by the server while parked. A
/// transport failure on a reused connection is retried once on a newly
/// opened one.
macro_rules! with_connection {
    ($self:ident, |$conn:ident| $op:expr) => {{
        let mut $conn = $self.pool.get().await?;
        let mut result = $op;
        if $conn.is_reused() && !healthy(&result) {
            debug!("Idle LDAP connection failed, retrying on a new connection");
            $conn.release(false).await;
            $conn = $self.pool.get_fresh().await?;
            result = $op;
        }
        $conn.release(healthy(&result)).await;
        result
    }};
}

/// Directory backend for Active Directory over LDAPS.
pub struct LdapDirectory {
    config: Arc<LdapConfig>,
    pool: LdapConnectionPool,
}

impl LdapDirectory {
    /// Creates a new directory backend.
    ///
    /// ## Errors
    ///
    /// Returns an error if a host does not use LDAPS or a required field is
    /// missing.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let pool = LdapConnectionPool::new(config.clone());
        Ok(Self { config, pool })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Checks that the directory is reachable with the service account.
    pub async fn test_connection(&self) -> LdapResult<()> {
        self.pool.test_connection().await
    }

    async fn modify(&self, dn: &str, mods: Vec<Mod<Vec<u8>>>) -> LdapResult<()> {
        with_connection!(self, |conn| conn
            .ldap_mut()
            .with_timeout(self.config.operation_timeout)
            .modify(dn, mods.clone())
            .await
            .map_err(LdapError::from)
            .and_then(|r| match r.rc {
                0 => Ok(()),
                rc => Err(LdapError::from_result("modify", rc, r.text)),
            }))
    }
}

/// A connection may be reused unless the transport failed.
fn healthy<T>(result: &LdapResult<T>) -> bool {
    !matches!(result, Err(e) if e.is_connection_error())
}

#[async_trait]
impl DirectoryBackend for LdapDirectory {
    #[instrument(skip(self))]
    async fn find_user(&self, username: &str) -> ProviderResult<Option<DirectoryUser>> {
        let result = with_connection!(self, |conn| LdapSearcher::new(&mut conn, &self.config)
            .find_user(username)
            .await);

        let identity = self.config.identity.as_str();
        Ok(result?.map(|entry| entry.to_directory_user(identity)))
    }

    async fn min_password_length(&self) -> ProviderResult<usize> {
        let result = with_connection!(self, |conn| LdapSearcher::new(&mut conn, &self.config)
            .min_password_length()
            .await);

        Ok(result?)
    }

    async fn user_groups(&self, user: &DirectoryUser) -> ProviderResult<Vec<String>> {
        let result = with_connection!(self, |conn| LdapSearcher::new(&mut conn, &self.config)
            .member_of(&user.dn)
            .await);

        Ok(result?)
    }

    async fn authorization_groups(&self, user: &DirectoryUser) -> ProviderResult<Vec<String>> {
        let result = with_connection!(self, |conn| LdapSearcher::new(&mut conn, &self.config)
            .in_chain_groups(&user.dn)
            .await);

        let groups = result?;
        debug!(dn = %user.dn, count = groups.len(), "Resolved nested groups");
        Ok(groups)
    }

    async fn touch_password_last_set(&self, user: &DirectoryUser) -> ProviderResult<()> {
        Ok(self.modify(&user.dn, touch_pwd_last_set_mods()).await?)
    }

    #[instrument(skip(self, user, password), fields(dn = %user.dn))]
    async fn validate_credentials(
        &self,
        user: &DirectoryUser,
        password: &str,
    ) -> ProviderResult<CredentialCheck> {
        let result = self.pool.bind_as(&user.dn, password).await?;
        let check = classify_bind(result.rc, &result.text)?;
        debug!(?check, "Credential check complete");
        Ok(check)
    }

    #[instrument(skip(self, user, current_password, new_password), fields(dn = %user.dn))]
    async fn change_password(
        &self,
        user: &DirectoryUser,
        current_password: &str,
        new_password: &str,
    ) -> ProviderResult<()> {
        Ok(self
            .modify(&user.dn, change_mods(current_password, new_password))
            .await?)
    }

    #[instrument(skip(self, user, new_password), fields(dn = %user.dn))]
    async fn set_password(&self, user: &DirectoryUser, new_password: &str) -> ProviderResult<()> {
        Ok(self.modify(&user.dn, reset_mods(new_password)).await?)
    }
}
