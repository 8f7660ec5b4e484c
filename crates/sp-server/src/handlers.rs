//! Password endpoint handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use sp_core::{ApiErrorCode, ApiErrorItem, ApiResult, ClientSettings};
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

/// Body of a password change request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordModel {
    /// Account to change.
    pub username: Option<String>,
    /// Current password.
    pub current_password: Option<String>,
    /// New password.
    pub new_password: Option<String>,
    /// New password, typed again.
    pub new_password_verify: Option<String>,
    /// Captcha response token.
    pub recaptcha: Option<String>,
}

impl ChangePasswordModel {
    /// Names of required fields that are missing or blank.
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("username", &self.username),
            ("currentPassword", &self.current_password),
            ("newPassword", &self.new_password),
            ("newPasswordVerify", &self.new_password_verify),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Generated password response.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedPassword {
    /// The password.
    pub password: String,
}

type ApiResponse = (StatusCode, Json<ApiResult>);

fn bad_request(result: ApiResult) -> ApiResponse {
    (StatusCode::BAD_REQUEST, Json(result))
}

/// `GET /api/password`: client settings.
pub async fn get_settings(State(state): State<AppState>) -> Json<ClientSettings> {
    Json(state.config.client.clone())
}

/// `GET /api/password/generated`: a random password.
pub async fn get_generated_password(State(state): State<AppState>) -> Json<GeneratedPassword> {
    Json(GeneratedPassword {
        password: sp_policy::generate_password(state.config.client.password_entropy),
    })
}

/// `POST /api/password`: changes a password.
///
/// Checks run in order and the first failure is returned with `400`.
///
/// A `newPassword`/`newPasswordVerify` mismatch is checked first and answers
/// `FieldMismatch` on `newPasswordVerify`, so the form can highlight the
/// verify field. A mismatch is never folded into the generic
/// "Invalid Request" answer, even when other fields are missing as well.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordModel>, JsonRejection>,
) -> ApiResponse {
    let model = match payload {
        Ok(Json(model)) => model,
        Err(rejection) => {
            warn!(error = %rejection, "Invalid request body");
            return bad_request(ApiResult::invalid_request());
        }
    };

    if model.new_password != model.new_password_verify {
        warn!("Invalid model, passwords don't match");
        return bad_request(ApiResult::field_mismatch());
    }

    let missing = model.missing_fields();
    if !missing.is_empty() {
        warn!(fields = ?missing, "Invalid model, validation failed");
        return bad_request(ApiResult::missing_fields(missing));
    }

    match state.captcha.verify(model.recaptcha.as_deref()).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Invalid Recaptcha");
            return bad_request(ApiResult::invalid_captcha());
        }
        Err(e) => {
            warn!(error = %e, "Recaptcha verification failed");
            return bad_request(ApiResult::invalid_captcha());
        }
    }

    let username = model.username.unwrap_or_default();
    let current = model.current_password.unwrap_or_default();
    let new = model.new_password.unwrap_or_default();
    let client = &state.config.client;

    if client.minimum_distance > 0
        && state.provider.measure_new_password_distance(&current, &new) < client.minimum_distance
    {
        return bad_request(ApiResult::from_error(ApiErrorItem::new(
            ApiErrorCode::MinimumDistance,
        )));
    }

    if client.minimum_score > 0 && sp_policy::score(&new) < client.minimum_score {
        return bad_request(ApiResult::from_error(ApiErrorItem::new(
            ApiErrorCode::MinimumScore,
        )));
    }

    match state
        .provider
        .perform_password_change(&username, &current, &new)
        .await
    {
        None => {
            info!(username = %username, "Password changed");
            (StatusCode::OK, Json(ApiResult::success()))
        }
        Some(item) => {
            if item.error_code == ApiErrorCode::Generic {
                error!(username = %username, error = %item, "Failed to update password");
            }
            bad_request(ApiResult::from_error(item))
        }
    }
}
