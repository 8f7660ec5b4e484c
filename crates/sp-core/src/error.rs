//! Error taxonomy surfaced to clients.
//!
//! Every failed password change is reported as one or more
//! [`ApiErrorItem`]s inside an [`ApiResult`]. The client localizes the
//! message from the numeric [`ApiErrorCode`], so the discriminants are part
//! of the wire contract and must not be renumbered.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Closed set of error codes returned by the password endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiErrorCode {
    /// Unexpected failure (directory, network, internal).
    Generic = 0,
    /// A required field was missing or empty.
    FieldRequired = 1,
    /// The new password and its confirmation differ.
    FieldMismatch = 2,
    /// The user does not exist in the directory.
    UserNotFound = 3,
    /// The current password is wrong.
    InvalidCredentials = 4,
    /// The captcha response was rejected.
    InvalidCaptcha = 5,
    /// Policy forbids this user from changing the password.
    ChangeNotPermitted = 6,
    /// The new password does not meet the complexity policy.
    ComplexPassword = 9,
    /// The new password strength score is below the minimum.
    MinimumScore = 10,
    /// The new password is too similar to the current one.
    MinimumDistance = 11,
    /// The new password appears in a public breach corpus.
    PwnedPassword = 12,
}

impl ApiErrorCode {
    /// All codes, in discriminant order.
    pub const ALL: [Self; 11] = [
        Self::Generic,
        Self::FieldRequired,
        Self::FieldMismatch,
        Self::UserNotFound,
        Self::InvalidCredentials,
        Self::InvalidCaptcha,
        Self::ChangeNotPermitted,
        Self::ComplexPassword,
        Self::MinimumScore,
        Self::MinimumDistance,
        Self::PwnedPassword,
    ];

    /// Returns the wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Looks up a code by wire value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u8() == value)
    }

    /// Default English message for the code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::Generic => "An unexpected error occurred.",
            Self::FieldRequired => "This field is required.",
            Self::FieldMismatch => "The passwords do not match.",
            Self::UserNotFound => "The username was not found.",
            Self::InvalidCredentials => "The current password is invalid.",
            Self::InvalidCaptcha => "The captcha response is invalid.",
            Self::ChangeNotPermitted => "You are not allowed to change your password.",
            Self::ComplexPassword => "The new password does not meet the complexity requirements.",
            Self::MinimumScore => "The new password is not strong enough.",
            Self::MinimumDistance => "The new password is too similar to the current one.",
            Self::PwnedPassword => "The new password has appeared in a data breach.",
        }
    }
}

impl Serialize for ApiErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ApiErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = ApiErrorCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer error code")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                u8::try_from(value)
                    .ok()
                    .and_then(ApiErrorCode::from_u8)
                    .ok_or_else(|| E::custom(format!("unknown error code {value}")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                let value = u64::try_from(value)
                    .map_err(|_| E::custom(format!("unknown error code {value}")))?;
                self.visit_u64(value)
            }
        }

        deserializer.deserialize_u64(CodeVisitor)
    }
}

/// A single error entry returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorItem {
    /// Error code.
    pub error_code: ApiErrorCode,
    /// Name of the offending request field, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiErrorItem {
    /// Creates an item with the code's default message.
    #[must_use]
    pub fn new(error_code: ApiErrorCode) -> Self {
        Self {
            error_code,
            field_name: None,
            message: Some(error_code.default_message().to_string()),
        }
    }

    /// Creates an item with a custom message.
    #[must_use]
    pub fn with_message(error_code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            field_name: None,
            message: Some(message.into()),
        }
    }

    /// Attaches the offending field name.
    #[must_use]
    pub fn for_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }
}

impl fmt::Display for ApiErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self
            .message
            .as_deref()
            .unwrap_or_else(|| self.error_code.default_message());
        match &self.field_name {
            Some(field) => write!(f, "{:?} ({field}): {message}", self.error_code),
            None => write!(f, "{:?}: {message}", self.error_code),
        }
    }
}

/// Response envelope for the password endpoint.
///
/// An empty `errors` list means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult {
    /// Errors, in the order they were detected.
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ApiResult {
    /// Creates an empty (successful) result.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a result holding one error.
    #[must_use]
    pub fn from_error(item: ApiErrorItem) -> Self {
        Self {
            errors: vec![item],
            payload: None,
        }
    }

    /// Result for a request body that could not be parsed.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::from_error(ApiErrorItem::with_message(
            ApiErrorCode::Generic,
            "Invalid Request",
        ))
    }

    /// Result for a new password that differs from its confirmation.
    #[must_use]
    pub fn field_mismatch() -> Self {
        Self::from_error(ApiErrorItem::new(ApiErrorCode::FieldMismatch).for_field("newPasswordVerify"))
    }

    /// Result for a rejected captcha.
    #[must_use]
    pub fn invalid_captcha() -> Self {
        Self::from_error(ApiErrorItem::new(ApiErrorCode::InvalidCaptcha).for_field("recaptcha"))
    }

    /// Result listing every missing required field.
    #[must_use]
    pub fn missing_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            errors: fields
                .into_iter()
                .map(|field| ApiErrorItem::new(ApiErrorCode::FieldRequired).for_field(field))
                .collect(),
            payload: None,
        }
    }

    /// Appends an error.
    pub fn push(&mut self, item: ApiErrorItem) {
        self.errors.push(item);
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for the expected shape.
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is present but invalid.
    #[error("invalid configuration value for {key}: {message}")]
    Invalid {
        /// Setting name.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}
