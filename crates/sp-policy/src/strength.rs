//! Password strength and similarity measures.

/// Highest zxcvbn score.
pub const MAX_SCORE: u8 = 4;

/// Returns the zxcvbn strength score (0 = weakest, 4 = strongest).
///
/// Passwords zxcvbn refuses to evaluate (e.g. empty) score 0.
#[must_use]
pub fn score(password: &str) -> u8 {
    match zxcvbn::zxcvbn(password, &[]) {
        Ok(entropy) => entropy.score(),
        Err(_) => 0,
    }
}

/// Returns the Levenshtein edit distance between two passwords, in characters.
#[must_use]
pub fn distance(current: &str, new: &str) -> usize {
    strsim::levenshtein(current, new)
}
