//! One-time token generation and format validation.
//!
//! Tokens travel through an external messaging channel and back through web
//! forms, so they are restricted to the URL-safe alphabet `[A-Za-z0-9_-]`
//! and a length of 8 to 128 characters. Freshly generated tokens encode 24
//! random bytes (192 bits of entropy) as unpadded base64url.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::{TOKEN_ENTROPY_BYTES, TOKEN_MAX_LEN, TOKEN_MIN_LEN};

/// Generate a fresh one-time token (32-character base64url string).
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// Check that a candidate token matches the expected shape.
///
/// This is a cheap pre-check performed before any storage lookup; a token
/// that fails it can never exist in the store.
pub fn is_valid_format(token: &str) -> bool {
    if token.len() < TOKEN_MIN_LEN || token.len() > TOKEN_MAX_LEN {
        return false;
    }
    token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_valid_and_unique() {
        let a = generate();
        let b = generate();
        assert!(is_valid_format(&a));
        assert!(is_valid_format(&b));
        assert_ne!(a, b);
        // 24 bytes -> 32 base64url chars, no padding
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn rejects_short_and_long_tokens() {
        assert!(!is_valid_format(""));
        assert!(!is_valid_format("ab"));
        assert!(!is_valid_format("a234567")); // 7 chars, one short
        assert!(is_valid_format("a2345678")); // exactly 8
        let long = "x".repeat(128);
        assert!(is_valid_format(&long));
        let too_long = "x".repeat(129);
        assert!(!is_valid_format(&too_long));
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        assert!(!is_valid_format("abc def12"));
        assert!(!is_valid_format("abcdef1+"));
        assert!(!is_valid_format("abcdef1="));
        assert!(!is_valid_format("токен123"));
        assert!(is_valid_format("AZaz09_-"));
    }
}
