//! Opaque token generation for invitation and referral credentials.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

/// Prefix for single-use invitation tokens.
pub const INVITATION_PREFIX: &str = "inv_";

/// Prefix for multi-use referral tokens.
pub const REFERRAL_PREFIX: &str = "ref_";

/// Length of random bytes for token generation.
const TOKEN_RANDOM_BYTES: usize = 33;

fn generate_opaque(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..TOKEN_RANDOM_BYTES).map(|_| rng.gen()).collect();
    format!("{}{}", prefix, URL_SAFE_NO_PAD.encode(&random_bytes))
}

/// Generate a new invitation token.
pub fn generate_invitation_token() -> String {
    generate_opaque(INVITATION_PREFIX)
}

/// Generate a new referral token.
pub fn generate_referral_token() -> String {
    generate_opaque(REFERRAL_PREFIX)
}

/// Shortened form of a token, safe for logs and error messages.
///
/// Full token values are credentials and must never be logged.
pub fn display_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_token_format() {
        let token = generate_invitation_token();
        assert!(token.starts_with(INVITATION_PREFIX));
        assert!(token.len() > 40);
    }

    #[test]
    fn test_referral_token_format() {
        let token = generate_referral_token();
        assert!(token.starts_with(REFERRAL_PREFIX));
        assert!(token.len() > 40);
    }

    #[test]
    fn test_token_uniqueness() {
        assert_ne!(generate_invitation_token(), generate_invitation_token());
        assert_ne!(generate_referral_token(), generate_referral_token());
    }

    #[test]
    fn test_tokens_are_url_safe() {
        let token = generate_invitation_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(display_prefix("inv_abcdefgh"), "inv_abcd");
        assert_eq!(display_prefix("inv"), "inv");
    }
}
