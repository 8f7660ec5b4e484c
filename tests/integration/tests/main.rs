//! End-to-End Integration Tests
//!
//! These tests run the full HTTP server with the debug provider. The
//! Pwned Passwords and reCAPTCHA services are replaced by local mocks.

mod common;
mod health;
mod password_api;
