//! Password API integration tests.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{first_error_code, read, TestEnv};

/// Tests the client settings endpoint.
#[tokio::test]
async fn test_get_settings() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config, _| {
        config.client.minimum_score = 2;
        config.client.use_email = true;
        config.client.alerts.error_invalid_user = "Unknown account".to_string();
        if let Some(recaptcha) = config.client.recaptcha.as_mut() {
            recaptcha.site_key = "public-site-key".to_string();
            recaptcha.private_key = "private-secret".to_string();
        }
    })
    .await?;

    let (status, body) = read(env.client.get(env.password_url()).send().await?).await?;

    assert_eq!(status, 200);
    assert_eq!(body["minimumScore"], 2);
    assert_eq!(body["useEmail"], true);
    assert_eq!(body["alerts"]["errorInvalidUser"], "Unknown account");
    assert!(body["changePasswordForm"]["helpText"].is_string());
    assert_eq!(body["recaptcha"]["siteKey"], "public-site-key");
    assert!(body["recaptcha"].get("privateKey").is_none());
    assert!(!body.to_string().contains("private-secret"));

    Ok(())
}

/// Tests the password generator endpoint.
#[tokio::test]
async fn test_generated_password() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config, _| config.client.password_entropy = 32).await?;

    let url = format!("{}/generated", env.password_url());
    let (_, first) = read(env.client.get(&url).send().await?).await?;
    let (status, second) = read(env.client.get(&url).send().await?).await?;

    assert_eq!(status, 200);
    let first = first["password"].as_str().unwrap_or_default();
    assert_eq!(first.len(), 44);
    assert_ne!(first, second["password"].as_str().unwrap_or_default());

    Ok(())
}

/// Tests a successful password change.
#[tokio::test]
async fn test_change_password_success() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (status, body) = env
        .change_password("jdoe@example.com", "Old-Password-1", "Brand-New-Passphrase-2")
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "errors": [] }));

    // The breach check only sends the hash prefix.
    let requests = env.mock.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.path().starts_with("/range/"));
    assert_eq!(requests[0].url.path().len(), "/range/".len() + 5);

    Ok(())
}

/// Tests that validation failures are reported before the provider runs.
#[tokio::test]
async fn test_change_password_validation() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (status, body) = env
        .post_json(json!({
            "username": "jdoe",
            "currentPassword": "old",
            "newPassword": "one",
            "newPasswordVerify": "two",
        }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(2));
    assert_eq!(body["errors"][0]["fieldName"], "newPasswordVerify");

    let (status, body) = env
        .post_json(json!({
            "username": "jdoe",
            "newPassword": "same",
            "newPasswordVerify": "same",
        }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(1));
    assert_eq!(body["errors"][0]["fieldName"], "currentPassword");

    let response = env
        .client
        .post(env.password_url())
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    let (status, body) = read(response).await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(0));

    // None of these reached the breach check.
    assert!(env.mock.received_requests().await.unwrap_or_default().is_empty());

    Ok(())
}

/// Tests breached password rejection.
#[tokio::test]
async fn test_pwned_password_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (status, body) = env.change_password("jdoe", "Old-Password-1", "password").await?;

    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(12));

    Ok(())
}

/// Tests that an unavailable breach service fails the change.
#[tokio::test]
async fn test_breach_service_failure() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config, uri| {
        config.options.pwned_passwords_url = format!("{uri}/unavailable");
    })
    .await?;

    let (status, body) = env
        .change_password("jdoe", "Old-Password-1", "Brand-New-Passphrase-2")
        .await?;

    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(0));

    Ok(())
}

/// Tests the provider outcomes selected by username.
#[tokio::test]
async fn test_provider_errors() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let cases = [
        ("userNotFound", 3),
        ("invalidCredentials@example.com", 4),
        ("changeNotPermitted", 6),
        ("complexPassword", 9),
        ("error", 0),
    ];

    for (username, code) in cases {
        let (status, body) = env
            .change_password(username, "Old-Password-1", "Brand-New-Passphrase-2")
            .await?;
        assert_eq!(status, 400, "{username}");
        assert_eq!(first_error_code(&body), Some(code), "{username}");
    }

    Ok(())
}

/// Tests the distance and strength checks.
#[tokio::test]
async fn test_similarity_and_strength() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config, _| {
        config.client.minimum_distance = 4;
        config.client.minimum_score = 3;
    })
    .await?;

    let (status, body) = env
        .change_password("jdoe", "Winter-Coat-2024", "Winter-Coat-2025")
        .await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(11));

    let (status, body) = env.change_password("jdoe", "Old-Password-1", "qwerty12").await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(10));

    let (status, _) = env
        .change_password("jdoe", "Old-Password-1", "violet staircase humming 41 lanterns")
        .await?;
    assert_eq!(status, 200);

    Ok(())
}

/// Tests reCAPTCHA verification against the siteverify endpoint.
#[tokio::test]
async fn test_recaptcha() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config, uri| {
        if let Some(recaptcha) = config.client.recaptcha.as_mut() {
            recaptcha.site_key = "site".to_string();
            recaptcha.private_key = "secret".to_string();
            recaptcha.verify_url = format!("{uri}/recaptcha/api/siteverify");
        }
    })
    .await?;

    Mock::given(method("GET"))
        .and(path("/recaptcha/api/siteverify"))
        .and(query_param("response", "human"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&env.mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/recaptcha/api/siteverify"))
        .and(query_param("response", "robot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&env.mock)
        .await;

    let request = |token: Option<&str>| {
        json!({
            "username": "jdoe",
            "currentPassword": "Old-Password-1",
            "newPassword": "Brand-New-Passphrase-2",
            "newPasswordVerify": "Brand-New-Passphrase-2",
            "recaptcha": token,
        })
    };

    let (status, body) = env.post_json(request(None)).await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(5));
    assert_eq!(body["errors"][0]["fieldName"], "recaptcha");

    let (status, body) = env.post_json(request(Some("robot"))).await?;
    assert_eq!(status, 400);
    assert_eq!(first_error_code(&body), Some(5));

    let (status, body) = env.post_json(request(Some("human"))).await?;
    assert_eq!(status, 200, "{body}");

    Ok(())
}
