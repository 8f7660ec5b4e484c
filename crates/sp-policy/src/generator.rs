//! Random password generation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Smallest number of random bytes used.
pub const MIN_ENTROPY: usize = 8;

/// Largest number of random bytes used.
pub const MAX_ENTROPY: usize = 128;

/// Generates a password from `entropy` random bytes, base64-encoded.
///
/// `entropy` is clamped to [`MIN_ENTROPY`]..=[`MAX_ENTROPY`].
#[must_use]
pub fn generate_password(entropy: usize) -> String {
    let mut bytes = vec![0u8; entropy.clamp(MIN_ENTROPY, MAX_ENTROPY)];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
