//! Auth-provider identity extractor.
//!
//! Validates the Bearer token against the provider's public key and exposes
//! the verified subject id and email claim to handlers. Identity is never
//! taken from query parameters or request bodies.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::ExternalIdentity;
use shared::jwt::JwtError;

/// Verified identity of the calling user.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    /// Stable opaque identifier from the provider's `sub` claim.
    pub subject_id: String,
    /// Login email, when the provider shares it.
    pub email: Option<String>,
}

impl AuthIdentity {
    /// The domain-layer view of this identity.
    pub fn identity(&self) -> ExternalIdentity {
        ExternalIdentity::new(self.subject_id.clone(), self.email.clone())
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.verifier.verify(token).map_err(|e| match e {
            JwtError::TokenExpired => {
                ApiError::Unauthorized("Identity token has expired".to_string())
            }
            _ => ApiError::Unauthorized("Invalid identity token".to_string()),
        })?;

        // The subject id flows into storage lookups; reject malformed ones
        // here rather than deeper in the stack.
        shared::validation::validate_opaque_id(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid identity token".to_string()))?;

        Ok(AuthIdentity {
            subject_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Optional identity: lets routes serve both anonymous and signed-in callers
/// without rejecting the request.
///
/// An invalid or expired bearer token resolves to `None`; routes that need
/// a hard failure use [`AuthIdentity`] instead.
#[derive(Debug, Clone)]
pub struct OptionalAuthIdentity(pub Option<AuthIdentity>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuthIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(token) = bearer_token(parts) else {
            return Ok(OptionalAuthIdentity(None));
        };

        match state.verifier.verify(token) {
            Ok(claims) if shared::validation::validate_opaque_id(&claims.sub).is_ok() => {
                Ok(OptionalAuthIdentity(Some(AuthIdentity {
                    subject_id: claims.sub,
                    email: claims.email,
                })))
            }
            _ => Ok(OptionalAuthIdentity(None)),
        }
    }
}
