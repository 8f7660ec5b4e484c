//! Common test utilities and fixtures.

use std::net::TcpListener;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::sleep;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sp_server::{Server, ServerConfig};

/// SHA-1 suffix of "password" (prefix `5BAA6`).
const PASSWORD_SUFFIX: &str = "1E4C9B93F3F0682250B6CF8331B7EE68FD8";

/// Test environment that manages the mock services and server.
pub struct TestEnv {
    /// Mock for the Pwned Passwords and reCAPTCHA APIs.
    pub mock: MockServer,
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client for testing.
    pub client: Client,
    /// Server shutdown signal.
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestEnv {
    /// Creates a test environment with the default test configuration.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_, _| {}).await
    }

    /// Creates a test environment, letting the caller adjust the config.
    ///
    /// `configure` receives the mock server URI for pointing external
    /// services at it.
    pub async fn with_config(
        configure: impl FnOnce(&mut ServerConfig, &str),
    ) -> anyhow::Result<Self> {
        // Initialize tracing for tests
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sp_server=debug,sp_provider=debug,sp_policy=debug")
            .try_init();

        let mock = MockServer::start().await;
        mount_pwned_range(&mock).await;

        // Find available port for server
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let server_port = listener.local_addr()?.port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{server_port}");

        let mut config = ServerConfig::for_testing(&mock.uri());
        config.port = server_port;
        configure(&mut config, &mock.uri());

        // Create shutdown channel
        let (_shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        // Start server
        let server = Server::new(config)?;
        tokio::spawn(async move {
            tokio::select! {
                result = server.run() => {
                    if let Err(e) = result {
                        tracing::error!("Server error: {}", e);
                    }
                }
                _ = shutdown_rx => {
                    tracing::info!("Server shutdown requested");
                }
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        wait_for_server(&client, &base_url).await?;

        Ok(Self {
            mock,
            base_url,
            client,
            _shutdown_tx,
        })
    }

    /// Returns the password API URL.
    pub fn password_url(&self) -> String {
        format!("{}/api/password", self.base_url)
    }

    /// Posts a change request with matching new passwords.
    pub async fn change_password(
        &self,
        username: &str,
        current: &str,
        new: &str,
    ) -> anyhow::Result<(u16, Value)> {
        self.post_json(json!({
            "username": username,
            "currentPassword": current,
            "newPassword": new,
            "newPasswordVerify": new,
        }))
        .await
    }

    /// Posts an arbitrary JSON body to the password API.
    pub async fn post_json(&self, body: Value) -> anyhow::Result<(u16, Value)> {
        let response = self
            .client
            .post(self.password_url())
            .json(&body)
            .send()
            .await?;
        read(response).await
    }
}

/// Reads status and JSON body.
pub async fn read(response: Response) -> anyhow::Result<(u16, Value)> {
    let status = response.status().as_u16();
    let body = response.json().await?;
    Ok((status, body))
}

/// Returns the first error code of an API result.
pub fn first_error_code(body: &Value) -> Option<i64> {
    body["errors"].get(0)?["errorCode"].as_i64()
}

/// Serves a range where only "password" is breached.
async fn mount_pwned_range(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/range/5BAA6"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("0018A45C4D1DEF81644B54AB7F969B88D65:1\r\n{PASSWORD_SUFFIX}:3861493\r\n")),
        )
        .mount(mock)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/range/[0-9A-F]{5}$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("0018A45C4D1DEF81644B54AB7F969B88D65:1\r\n"),
        )
        .with_priority(10)
        .mount(mock)
        .await;
}

/// Waits for the server to be ready.
async fn wait_for_server(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let health_url = format!("{base_url}/health");
    let max_attempts = 50;

    for attempt in 1..=max_attempts {
        match client.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Server ready after {} attempts", attempt);
                return Ok(());
            }
            Ok(response) => {
                tracing::debug!(
                    "Server not ready (status {}), attempt {}/{}",
                    response.status(),
                    attempt,
                    max_attempts
                );
            }
            Err(e) => {
                tracing::debug!(
                    "Server not ready ({}), attempt {}/{}",
                    e,
                    attempt,
                    max_attempts
                );
            }
        }
        sleep(Duration::from_millis(100)).await;
    }

    anyhow::bail!("Server did not become ready in time")
}
