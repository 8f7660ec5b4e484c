//! # sp-policy
//!
//! Password policy checks for SelfPass.
//!
//! This crate implements the checks that sit around the directory call:
//!
//! ## Features
//!
//! - Breached password lookup using the Pwned Passwords k-anonymity API
//! - reCAPTCHA response verification
//! - zxcvbn strength scoring and Levenshtein edit distance
//! - Random password generation
//!
//! ## Example
//!
//! ```ignore
//! use sp_policy::{BreachChecker, PwnedPasswordsClient};
//!
//! let client = PwnedPasswordsClient::new("https://api.pwnedpasswords.com")?;
//! if client.is_pwned("correct horse battery staple").await? {
//!     // reject
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod captcha;
pub mod error;
pub mod generator;
pub mod pwned;
pub mod strength;

pub use captcha::RecaptchaVerifier;
pub use error::{PolicyError, PolicyResult};
pub use generator::generate_password;
pub use pwned::{BreachChecker, PwnedPasswordsClient};
pub use strength::{distance, score};
