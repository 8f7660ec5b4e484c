//! # sp-provider
//!
//! Password change providers for SelfPass.
//!
//! This crate provides the provider traits and the password change
//! orchestration that runs the policy checks in order before touching the
//! directory:
//!
//! 1. user lookup
//! 2. minimum length
//! 3. breach check
//! 4. allowed / restricted groups
//! 5. "user cannot change password" flag
//! 6. current password verification
//! 7. change, falling back to an administrative reset
//!
//! The directory itself sits behind [`DirectoryBackend`], so the sequence
//! can run against Active Directory or an in-memory stand-in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod change;
pub mod debug;
pub mod error;
pub mod provider;

pub use change::PasswordChangeService;
pub use debug::DebugPasswordChangeProvider;
pub use error::{ProviderError, ProviderResult};
pub use provider::{CredentialCheck, DirectoryBackend, DirectoryUser, PasswordChangeProvider};
