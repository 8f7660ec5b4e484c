//! LDAP connection pool management.
//!
//! ## Security Requirements
//!
//! All connections use LDAPS (TLS from connection start).
//! STARTTLS is NOT supported to prevent downgrade attacks.

use std::sync::Arc;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::config::LdapConfig;
use crate::error::{LdapError, LdapResult};

/// Connection pool for service-account connections.
///
/// Concurrency is bounded by a semaphore. One idle, service-bound
/// connection is kept for reuse; the rest are opened on demand.
pub struct LdapConnectionPool {
    config: Arc<LdapConfig>,
    semaphore: Arc<Semaphore>,
    idle: Arc<Mutex<Option<Ldap>>>,
}

impl LdapConnectionPool {
    /// Creates a new connection pool.
    ///
    /// ## Security
    ///
    /// The configuration must use LDAPS. This is validated at config build time.
    pub fn new(config: Arc<LdapConfig>) -> Self {
        let max_size = config.pool_max_size;
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(max_size)),
            idle: Arc::new(Mutex::new(None)),
        }
    }

    /// Gets a service-bound connection from the pool.
    ///
    /// Hand it back with [`LdapConnection::release`] to allow reuse.
    pub async fn get(&self) -> LdapResult<LdapConnection> {
        let permit = self.acquire().await?;

        if let Some(ldap) = self.idle.lock().await.take() {
            debug!("Reusing idle LDAP connection");
            return Ok(self.wrap(ldap, permit, true));
        }

        let ldap = self.create_connection().await?;
        Ok(self.wrap(ldap, permit, false))
    }

    /// Gets a newly opened service-bound connection, bypassing the idle one.
    pub async fn get_fresh(&self) -> LdapResult<LdapConnection> {
        let permit = self.acquire().await?;
        let ldap = self.create_connection().await?;
        Ok(self.wrap(ldap, permit, false))
    }

    /// Binds as `dn` on a dedicated connection and returns the raw result.
    ///
    /// The connection is closed afterwards; it never enters the pool.
    pub async fn bind_as(&self, dn: &str, password: &str) -> LdapResult<ldap3::LdapResult> {
        let _permit = self.acquire().await?;
        let mut ldap = self.open().await?;

        let result = ldap
            .with_timeout(self.config.operation_timeout)
            .simple_bind(dn, password)
            .await;
        if let Err(e) = ldap.unbind().await {
            debug!(error = %e, "Unbind after credential check failed");
        }

        Ok(result?)
    }

    /// Tests the connection to the directory.
    pub async fn test_connection(&self) -> LdapResult<()> {
        let mut conn = self.get().await?;

        let result = conn
            .ldap_mut()
            .with_timeout(self.config.operation_timeout)
            .search("", ldap3::Scope::Base, "(objectClass=*)", vec!["defaultNamingContext"])
            .await
            .map_err(|e| LdapError::connection(format!("Test search failed: {e}")));

        conn.release(result.is_ok()).await;
        result.map(|_| ())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    async fn acquire(&self) -> LdapResult<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LdapError::PoolExhausted)
    }

    fn wrap(&self, ldap: Ldap, permit: OwnedSemaphorePermit, reused: bool) -> LdapConnection {
        LdapConnection {
            ldap,
            reused,
            idle: self.idle.clone(),
            _permit: permit,
        }
    }

    /// Parks `ldap` as the idle connection.
    #[cfg(test)]
    pub(crate) async fn park_idle(&self, ldap: Ldap) {
        *self.idle.lock().await = Some(ldap);
    }

    /// Opens and service-binds a new connection.
    async fn create_connection(&self) -> LdapResult<Ldap> {
        let mut ldap = self.open().await?;

        let result = ldap
            .with_timeout(self.config.operation_timeout)
            .simple_bind(&self.config.bind_dn, &self.config.bind_credential)
            .await
            .map_err(|e| LdapError::Bind(e.to_string()))?;

        if result.rc != 0 {
            return Err(LdapError::Bind(format!(
                "code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(ldap)
    }

    /// Opens an unbound connection, trying each host in order.
    async fn open(&self) -> LdapResult<Ldap> {
        let mut last_error = LdapError::config("no directory hosts configured");

        for url in self.config.connection_urls() {
            let settings = LdapConnSettings::new()
                .set_conn_timeout(self.config.connection_timeout)
                .set_no_tls_verify(!self.config.validate_certificates);

            match LdapConnAsync::with_settings(settings, &url).await {
                Ok((conn, ldap)) => {
                    tokio::spawn(async move {
                        if let Err(e) = conn.drive().await {
                            warn!(error = %e, "LDAP connection driver error");
                        }
                    });
                    debug!(url = %url, "LDAP connection established");
                    return Ok(ldap);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "LDAP host unreachable, trying next");
                    last_error = LdapError::connection(format!("{url}: {e}"));
                }
            }
        }

        Err(last_error)
    }
}

/// A service-bound connection from the pool.
pub struct LdapConnection {
    ldap: Ldap,
    reused: bool,
    idle: Arc<Mutex<Option<Ldap>>>,
    _permit: OwnedSemaphorePermit,
}

impl LdapConnection {
    /// Returns a mutable reference to the LDAP handle.
    #[must_use]
    pub fn ldap_mut(&mut self) -> &mut Ldap {
        &mut self.ldap
    }

    /// Returns true if this connection sat idle in the pool before.
    ///
    /// The server may have closed such a connection in the meantime.
    #[must_use]
    pub const fn is_reused(&self) -> bool {
        self.reused
    }

    /// Returns the connection to the pool.
    ///
    /// Pass `healthy = false` after a transport error so the connection is
    /// closed instead of reused.
    pub async fn release(mut self, healthy: bool) {
        if healthy {
            let mut idle = self.idle.lock().await;
            if idle.is_none() {
                *idle = Some(self.ldap);
                return;
            }
        }
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "Unbind of released connection failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hosts: Vec<String>) -> Arc<LdapConfig> {
        Arc::new(
            LdapConfig::builder()
                .hostnames(hosts)
                .bind_dn("svc-selfpass@example.com")
                .bind_credential("password")
                .users_dn("OU=Users,DC=example,DC=com")
                .pool_size(5)
                .connection_timeout(std::time::Duration::from_millis(200))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn pool_creation() {
        let pool = LdapConnectionPool::new(config(vec!["dc1.example.com".to_string()]));
        assert_eq!(pool.config().pool_max_size, 5);
    }

    #[tokio::test]
    async fn unreachable_hosts_report_connection_error() {
        // Nothing listens on port 1 of the loopback interface.
        let pool = LdapConnectionPool::new(config(vec![
            "ldaps://127.0.0.1:1".to_string(),
            "ldaps://127.0.0.1:1".to_string(),
        ]));

        let err = pool.get().await.err().unwrap();
        assert!(err.is_connection_error(), "unexpected error: {err}");

        let err = pool.get_fresh().await.err().unwrap();
        assert!(err.is_connection_error(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn parked_connection_is_marked_reused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conn, ldap) = LdapConnAsync::new(&format!("ldap://{addr}")).await.unwrap();
        tokio::spawn(async move {
            let _ = conn.drive().await;
        });

        let pool = LdapConnectionPool::new(config(vec!["ldaps://127.0.0.1:1".to_string()]));
        pool.park_idle(ldap).await;

        let conn = pool.get().await.unwrap();
        assert!(conn.is_reused());

        // An unhealthy release closes the connection instead of parking it.
        conn.release(false).await;
        assert!(pool.idle.lock().await.is_none());
    }
}
