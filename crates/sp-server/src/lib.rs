//! # sp-server
//!
//! Axum server for SelfPass.
//!
//! This crate provides the HTTP surface of the service:
//! - Password endpoints (client settings, password change, generated passwords)
//! - Health check endpoints
//! - Optional static hosting of the pre-built web client
//!
//! ## Architecture
//!
//! The password change provider is chosen at startup. The LDAP provider runs
//! the full policy sequence against Active Directory. The debug provider
//! returns canned outcomes so the client can be developed without a domain.
//!
//! ## Usage
//!
//! ```ignore
//! use sp_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::{ProviderKind, ServerConfig};
pub use router::create_router;
pub use state::AppState;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sp_directory_ldap::{LdapConfig, LdapDirectory};
use sp_policy::{BreachChecker, PwnedPasswordsClient, RecaptchaVerifier};
use sp_provider::{DebugPasswordChangeProvider, PasswordChangeService};
use tokio::net::TcpListener;

/// The SelfPass server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// This builds the selected provider and validates the directory
    /// configuration. No connection is opened until the first request.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let breach_checker: Arc<dyn BreachChecker> = Arc::new(
            PwnedPasswordsClient::new(config.options.pwned_passwords_url.clone())
                .context("failed to create Pwned Passwords client")?,
        );
        let captcha = RecaptchaVerifier::new(config.client.recaptcha.clone())
            .context("failed to create reCAPTCHA client")?;

        if captcha.is_disabled() {
            tracing::warn!("reCAPTCHA private key is empty, captcha verification is disabled");
        }

        let state = match config.provider {
            ProviderKind::Debug => {
                let provider = Arc::new(DebugPasswordChangeProvider::new(breach_checker));
                AppState::new(config.clone(), provider, captcha)
            }
            ProviderKind::Ldap => {
                let ldap_config = LdapConfig::from_options(&config.options)
                    .context("invalid directory configuration")?;
                let directory =
                    LdapDirectory::new(ldap_config).context("invalid directory configuration")?;
                let service = Arc::new(PasswordChangeService::new(
                    config.options.clone(),
                    directory,
                    breach_checker,
                ));

                tracing::info!(
                    hosts = ?config.options.ldap_hostnames,
                    port = config.options.ldap_port,
                    "Active Directory provider configured"
                );
                AppState::with_directory(config.clone(), service, captcha)
            }
        };

        Ok(Self { config, state })
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let app = create_router(self.state);

        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!(
            provider = %self.config.provider,
            "Server listening on http://{}",
            listener.local_addr()?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates a test router without starting the server.
    ///
    /// This is useful for integration testing.
    pub fn test_router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
