//! # sp-core
//!
//! Core types shared by every SelfPass crate.
//!
//! This crate provides the error taxonomy surfaced to clients and the
//! option types that drive the password change policy.
//!
//! ## Security
//!
//! Error items carry user-facing messages only. Passwords and bind
//! credentials never appear in them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    Alerts, ChangePasswordForm, ClientSettings, ErrorsPasswordForm, IdentityType,
    PasswordChangeOptions, RecaptchaSettings, SettingsFile, ValidationRegex,
};
pub use error::{ApiErrorCode, ApiErrorItem, ApiResult, ConfigError};
