//! Application state management.
//!
//! This module defines the shared state that is passed to all request handlers.

use std::sync::Arc;

use sp_directory_ldap::LdapDirectory;
use sp_policy::RecaptchaVerifier;
use sp_provider::{PasswordChangeProvider, PasswordChangeService};

use crate::config::ServerConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Password change provider.
    pub provider: Arc<dyn PasswordChangeProvider>,

    /// Captcha verifier.
    pub captcha: RecaptchaVerifier,

    /// Directory-backed service, checked by the readiness probe.
    pub directory: Option<Arc<PasswordChangeService<LdapDirectory>>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        config: ServerConfig,
        provider: Arc<dyn PasswordChangeProvider>,
        captcha: RecaptchaVerifier,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            captcha,
            directory: None,
        }
    }

    /// Creates a state backed by Active Directory.
    pub fn with_directory(
        config: ServerConfig,
        service: Arc<PasswordChangeService<LdapDirectory>>,
        captcha: RecaptchaVerifier,
    ) -> Self {
        Self {
            directory: Some(service.clone()),
            ..Self::new(config, service, captcha)
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
