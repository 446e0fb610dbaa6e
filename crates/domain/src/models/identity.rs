//! The authenticated identity supplied by the auth provider, and the
//! request/response shapes for the identity endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Identity of the current caller, as verified by the auth provider.
///
/// Ephemeral per-request input; never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Opaque stable identifier from the auth provider (`sub` claim).
    pub subject_id: String,
    /// Login email, when the provider shares it.
    pub email: Option<String>,
}

impl ExternalIdentity {
    pub fn new(subject_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email,
        }
    }
}

/// Request body for explicit identity linking.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LinkRequest {
    #[validate(custom(function = "shared::validation::validate_token_format"))]
    pub invitation_token: String,
}

/// Response for a successful link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkResponse {
    pub contact_id: String,
    /// False when the mapping already existed and the call was a retry.
    pub newly_linked: bool,
}

/// Request body for session bootstrap.
///
/// The invitation token is whatever the client cached across the auth
/// redirect; it may be absent, stale, or belong to a different contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SessionRequest {
    #[validate(custom(function = "validate_optional_token"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_token: Option<String>,
}

fn validate_optional_token(token: &str) -> Result<(), validator::ValidationError> {
    shared::validation::validate_token_format(token)
}

/// Response for a resolved session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionResponse {
    pub contact_id: String,
    /// True when this request performed the link, false on the fast path.
    pub linked_now: bool,
    /// True when the client should drop its cached invitation token.
    pub discard_token: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_request_valid_token() {
        let request = LinkRequest {
            invitation_token: "inv_abc123XYZ".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_link_request_rejects_empty_token() {
        let request = LinkRequest {
            invitation_token: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_session_request_token_optional() {
        let request = SessionRequest {
            invitation_token: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_session_request_rejects_malformed_token() {
        let request = SessionRequest {
            invitation_token: Some("inv_abc 123".to_string()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_external_identity_new() {
        let identity = ExternalIdentity::new("auth0|abc", Some("b@example.com".to_string()));
        assert_eq!(identity.subject_id, "auth0|abc");
        assert_eq!(identity.email.as_deref(), Some("b@example.com"));
    }
}
