//! Health endpoint integration tests.

use crate::common::TestEnv;

/// Tests health endpoints.
#[tokio::test]
async fn test_health_endpoints() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let health: serde_json::Value = env
        .client
        .get(format!("{}/health", env.base_url))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());

    for probe in ["live", "ready"] {
        let response = env
            .client
            .get(format!("{}/health/{probe}", env.base_url))
            .send()
            .await?;
        assert!(
            response.status().is_success(),
            "{probe} probe should return success"
        );
    }

    Ok(())
}

/// Unknown paths are not served when no client directory is configured.
#[tokio::test]
async fn test_unknown_path_is_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .client
        .get(format!("{}/index.html", env.base_url))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 404);

    Ok(())
}

/// A configured client directory is served as the fallback.
#[tokio::test]
async fn test_static_client_is_served() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("sp-static-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("index.html"), "<html>SelfPass</html>")?;

    let static_dir = dir.clone();
    let env = TestEnv::with_config(move |config, _| config.static_dir = Some(static_dir)).await?;

    let body = env
        .client
        .get(format!("{}/", env.base_url))
        .send()
        .await?
        .text()
        .await?;
    std::fs::remove_dir_all(&dir)?;

    assert!(body.contains("SelfPass"));

    // API routes still take precedence.
    let response = env.client.get(env.password_url()).send().await?;
    assert!(response.status().is_success());

    Ok(())
}
