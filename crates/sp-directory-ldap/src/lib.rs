//! # sp-directory-ldap
//!
//! Active Directory backend for SelfPass over LDAPS, built on `ldap3`.
//!
//! ## Security
//!
//! Only LDAPS is supported. Active Directory refuses `unicodePwd` writes on
//! unencrypted connections, and the service account credential must not
//! travel in cleartext either.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod password;
pub mod provider;
pub mod search;
pub mod security;

pub use config::{LdapConfig, LdapConfigBuilder};
pub use connection::{LdapConnection, LdapConnectionPool};
pub use error::{LdapError, LdapResult};
pub use provider::{classify_bind, LdapDirectory};
pub use search::{LdapEntry, LdapSearcher};
