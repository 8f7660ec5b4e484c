//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak passwords or bind credentials. Directory
//! diagnostic text is kept because administrators need it to tell a
//! complexity rejection from an access problem.

use sp_provider::ProviderError;
use thiserror::Error;

/// `constraintViolation`: AD's answer to a password that fails policy.
pub const RC_CONSTRAINT_VIOLATION: u32 = 19;

/// `invalidCredentials`.
pub const RC_INVALID_CREDENTIALS: u32 = 49;

/// `insufficientAccessRights`.
pub const RC_INSUFFICIENT_ACCESS: u32 = 50;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// A host was configured with a scheme other than LDAPS.
    #[error("Security error: Only LDAPS is supported. URL must start with 'ldaps://'. STARTTLS and plain LDAP are not allowed.")]
    InsecureProtocol,

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Service account bind failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// The directory rejected the password against its policy.
    #[error("{0}")]
    ConstraintViolation(String),

    /// The bound account lacks the right to perform the operation.
    #[error("Insufficient access rights: {0}")]
    InsufficientAccess(String),

    /// Any other non-success result code.
    #[error("LDAP {op} failed with code {rc}: {text}")]
    Operation {
        /// Operation name.
        op: &'static str,
        /// Result code.
        rc: u32,
        /// Diagnostic text.
        text: String,
    },

    /// Pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl LdapError {
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

    /// Classifies a non-success result code.
    #[must_use]
    pub fn from_result(op: &'static str, rc: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        match rc {
            RC_CONSTRAINT_VIOLATION => Self::ConstraintViolation(text),
            RC_INSUFFICIENT_ACCESS => Self::InsufficientAccess(text),
            _ => Self::Operation { op, rc, text },
        }
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::PoolExhausted | Self::Ldap3(_)
        )
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for ProviderError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => Self::Configuration(msg),
            LdapError::InsecureProtocol => Self::Configuration(err.to_string()),
            LdapError::Connection(msg) => Self::Connection(msg),
            LdapError::PoolExhausted => Self::Connection(err.to_string()),
            LdapError::Bind(msg) => Self::Connection(format!("service account bind failed: {msg}")),
            LdapError::Search(msg) => Self::UserLookup(msg),
            LdapError::ConstraintViolation(msg) => Self::PasswordPolicy(msg),
            LdapError::InsufficientAccess(msg) => Self::AccessDenied(msg),
            LdapError::Operation { .. } => Self::Protocol(err.to_string()),
            LdapError::Ldap3(e) => Self::Protocol(e.to_string()),
        }
    }
}
