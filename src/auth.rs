//! Constant-time shared-token check for the signaling endpoint's optional
//! `RELAY_AUTH_TOKEN` requirement.

use subtle::ConstantTimeEq;

/// Compare a client-supplied token against the configured secret in
/// constant time, so a timing side channel can't be used to brute-force the
/// token a byte at a time.
#[must_use]
pub fn secrets_match(expected: &str, supplied: &str) -> bool {
    if expected.len() != supplied.len() {
        return false;
    }
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_are_accepted() {
        assert!(secrets_match("s3cret", "s3cret"));
    }

    #[test]
    fn mismatched_tokens_are_rejected() {
        assert!(!secrets_match("s3cret", "wrong"));
    }

    #[test]
    fn differing_lengths_are_rejected() {
        assert!(!secrets_match("s3cret", "s3cretextra"));
    }
}
