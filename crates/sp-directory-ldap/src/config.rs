//! Directory connection configuration.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Only LDAPS (LDAP over TLS) is supported.
//!
//! - Hosts are always contacted through `ldaps://`
//! - STARTTLS is NOT supported (vulnerable to downgrade attacks)
//! - Plain `ldap://` is NOT supported; Active Directory also refuses
//!   `unicodePwd` writes over an unencrypted channel

use std::time::Duration;

use sp_core::{IdentityType, PasswordChangeOptions};

use crate::error::{LdapError, LdapResult};

/// Directory connection configuration.
#[derive(Clone)]
pub struct LdapConfig {
    /// Hostnames (or `ldaps://` URLs), tried in order.
    pub hostnames: Vec<String>,

    /// LDAPS port used for bare hostnames.
    pub port: u16,

    /// Service account bind DN or UPN.
    pub bind_dn: String,

    /// Service account password.
    pub bind_credential: String,

    /// Base DN for user searches.
    pub users_dn: String,

    /// Attribute usernames are resolved by.
    pub identity: IdentityType,

    /// Whether to validate server certificates.
    pub validate_certificates: bool,

    /// Connect timeout per host.
    pub connection_timeout: Duration,

    /// Timeout for a single directory operation.
    pub operation_timeout: Duration,

    /// Maximum concurrent directory operations.
    pub pool_max_size: usize,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("hostnames", &self.hostnames)
            .field("port", &self.port)
            .field("bind_dn", &self.bind_dn)
            .field("bind_credential", &"***")
            .field("users_dn", &self.users_dn)
            .field("identity", &self.identity)
            .field("validate_certificates", &self.validate_certificates)
            .field("connection_timeout", &self.connection_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("pool_max_size", &self.pool_max_size)
            .finish()
    }
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Builds a configuration from the password change options.
    pub fn from_options(options: &PasswordChangeOptions) -> LdapResult<Self> {
        Self::builder()
            .hostnames(options.ldap_hostnames.clone())
            .port(options.ldap_port)
            .bind_dn(options.ldap_username.clone())
            .bind_credential(options.ldap_password.clone())
            .users_dn(options.ldap_search_base.clone())
            .identity(options.id_type_for_user.clone())
            .validate_certificates(options.ldap_validate_certificates)
            .build()
    }

    /// Validates the configuration.
    ///
    /// ## Security
    ///
    /// This method enforces LDAPS-only connections.
    pub fn validate(&self) -> LdapResult<()> {
        if self.hostnames.is_empty() {
            return Err(LdapError::config("at least one hostname is required"));
        }
        for host in &self.hostnames {
            self.connection_url(host)?;
        }

        if self.bind_dn.is_empty() {
            return Err(LdapError::config("bind_dn cannot be empty"));
        }

        if self.users_dn.is_empty() {
            return Err(LdapError::config("users_dn cannot be empty"));
        }

        if self.pool_max_size == 0 {
            return Err(LdapError::config("pool_max_size must be at least 1"));
        }

        Ok(())
    }

    /// Returns the LDAPS URL for a configured host.
    ///
    /// Bare hostnames get the configured port. Explicit URLs must use the
    /// `ldaps://` scheme.
    pub fn connection_url(&self, host: &str) -> LdapResult<String> {
        let host = host.trim();
        let lower = host.to_ascii_lowercase();

        if lower.starts_with("ldaps://") {
            if host.len() <= "ldaps://".len() {
                return Err(LdapError::config("Invalid LDAPS URL: missing host"));
            }
            return Ok(host.to_string());
        }
        if lower.contains("://") {
            return Err(LdapError::InsecureProtocol);
        }
        if host.is_empty() {
            return Err(LdapError::config("hostname cannot be empty"));
        }

        Ok(format!("ldaps://{host}:{}", self.port))
    }

    /// Returns the LDAPS URLs for every host, in failover order.
    #[must_use]
    pub fn connection_urls(&self) -> Vec<String> {
        self.hostnames
            .iter()
            .filter_map(|h| self.connection_url(h).ok())
            .collect()
    }

    /// Filter matching a user account by the identity attribute.
    #[must_use]
    pub fn user_by_username_filter(&self, username: &str) -> String {
        let escaped = ldap_escape(username);
        format!(
            "(&(objectCategory=person)(objectClass=user)({}={escaped}))",
            self.identity.as_str()
        )
    }

    /// Filter matching every group the DN belongs to, following nesting.
    #[must_use]
    pub fn in_chain_groups_filter(user_dn: &str) -> String {
        format!(
            "(&(objectClass=group)(member:1.2.840.113556.1.4.1941:={}))",
            ldap_escape(user_dn)
        )
    }
}

/// Escapes special characters in LDAP filter values (RFC 4515).
pub(crate) fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for [`LdapConfig`].
#[derive(Debug, Default)]
pub struct LdapConfigBuilder {
    hostnames: Vec<String>,
    port: u16,
    bind_dn: Option<String>,
    bind_credential: Option<String>,
    users_dn: Option<String>,
    identity: IdentityType,
    validate_certificates: bool,
    connection_timeout: Duration,
    operation_timeout: Duration,
    pool_max_size: usize,
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: 636,
            validate_certificates: true,
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
            pool_max_size: 10,
            ..Default::default()
        }
    }

    /// Adds a hostname.
    #[must_use]
    pub fn hostname(mut self, host: impl Into<String>) -> Self {
        self.hostnames.push(host.into());
        self
    }

    /// Replaces the hostname list.
    #[must_use]
    pub fn hostnames(mut self, hosts: Vec<String>) -> Self {
        self.hostnames = hosts;
        self
    }

    /// Sets the LDAPS port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the bind DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the bind credential (password).
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Sets the users DN.
    #[must_use]
    pub fn users_dn(mut self, dn: impl Into<String>) -> Self {
        self.users_dn = Some(dn.into());
        self
    }

    /// Sets the identity attribute.
    #[must_use]
    pub fn identity(mut self, identity: IdentityType) -> Self {
        self.identity = identity;
        self
    }

    /// Sets whether to validate certificates.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the operation timeout.
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the maximum number of concurrent operations.
    #[must_use]
    pub const fn pool_size(mut self, max: usize) -> Self {
        self.pool_max_size = max;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing
    /// - A host is given with a scheme other than `ldaps://`
    pub fn build(self) -> LdapResult<LdapConfig> {
        let config = LdapConfig {
            hostnames: self.hostnames,
            port: self.port,
            bind_dn: self
                .bind_dn
                .ok_or_else(|| LdapError::config("bind_dn is required"))?,
            bind_credential: self
                .bind_credential
                .ok_or_else(|| LdapError::config("bind_credential is required"))?,
            users_dn: self
                .users_dn
                .ok_or_else(|| LdapError::config("users_dn is required"))?,
            identity: self.identity,
            validate_certificates: self.validate_certificates,
            connection_timeout: self.connection_timeout,
            operation_timeout: self.operation_timeout,
            pool_max_size: self.pool_max_size,
        };

        config.validate()?;

        Ok(config)
    }
}
