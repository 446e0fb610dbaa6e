//! Verification of auth-provider identity tokens (RS256).
//!
//! The borrower portal never issues its own login tokens. The authentication
//! provider signs an RS256 JWT whose `sub` claim is the stable subject id
//! and whose optional `email` claim carries the login email. This module
//! verifies those tokens against the provider's public key.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for identity-token operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Claims carried by the auth provider's identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject: the provider's stable, opaque user identifier.
    pub sub: String,
    /// Login email, when the provider shares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
}

/// Default leeway in seconds for clock skew tolerance.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Verifies identity tokens against the auth provider's RSA public key.
#[derive(Clone)]
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    /// Leeway in seconds for clock skew tolerance.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("leeway_secs", &self.leeway_secs)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl IdentityVerifier {
    /// Creates a verifier from the provider's RSA public key in PEM format.
    pub fn from_rsa_pem(public_key_pem: &str, leeway_secs: u64) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            decoding_key,
            leeway_secs,
        })
    }

    /// Verifies a token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data =
            decode::<IdentityClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                    _ => JwtError::DecodingError(e.to_string()),
                }
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(JwtError::InvalidToken);
        }

        Ok(token_data.claims)
    }
}

/// Mints a provider-style identity token from an RSA private key.
///
/// The service itself never signs tokens; this exists for the test suites
/// and local tooling, which stand in for the auth provider.
pub fn sign_identity_token(
    private_key_pem: &str,
    subject_id: &str,
    email: Option<&str>,
    expiry_secs: i64,
) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;

    let now = Utc::now();
    let claims = IdentityClaims {
        sub: subject_id.to_string(),
        email: email.map(|e| e.to_string()),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| JwtError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Throwaway 2048-bit keypair used only by these tests.
    const TEST_PRIVATE_KEY: &str = include_str!("../testdata/identity_test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../testdata/identity_test_key.pub.pem");

    fn verifier() -> IdentityVerifier {
        IdentityVerifier::from_rsa_pem(TEST_PUBLIC_KEY, 0).expect("test public key")
    }

    #[test]
    fn test_verify_round_trip() {
        let token =
            sign_identity_token(TEST_PRIVATE_KEY, "auth0|abc123", Some("b@example.com"), 600)
                .unwrap();

        let claims = verifier().verify(&token).unwrap();
        assert_eq!(claims.sub, "auth0|abc123");
        assert_eq!(claims.email.as_deref(), Some("b@example.com"));
    }

    #[test]
    fn test_verify_without_email_claim() {
        let token = sign_identity_token(TEST_PRIVATE_KEY, "auth0|no-email", None, 600).unwrap();
        let claims = verifier().verify(&token).unwrap();
        assert_eq!(claims.sub, "auth0|no-email");
        assert!(claims.email.is_none());
    }

    #[test]
    fn test_verify_expired_token() {
        let token = sign_identity_token(TEST_PRIVATE_KEY, "auth0|expired", None, -600).unwrap();
        match verifier().verify(&token) {
            Err(JwtError::TokenExpired) => {}
            other => panic!("Expected TokenExpired, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_garbage_token() {
        assert!(verifier().verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_verify_tampered_token() {
        let token = sign_identity_token(TEST_PRIVATE_KEY, "auth0|victim", None, 600).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_sig = "AAAA";
        parts[2] = forged_sig;
        assert!(verifier().verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_leeway_accepts_recently_expired() {
        let token = sign_identity_token(TEST_PRIVATE_KEY, "auth0|skew", None, -5).unwrap();
        let lenient = IdentityVerifier::from_rsa_pem(TEST_PUBLIC_KEY, 60).unwrap();
        assert!(lenient.verify(&token).is_ok());
    }

    #[test]
    fn test_invalid_public_key() {
        assert!(IdentityVerifier::from_rsa_pem("not a pem", DEFAULT_LEEWAY_SECS).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", verifier());
        assert!(debug.contains("[REDACTED]"));
    }
}
