//! Invitation token domain model.
//!
//! An invitation token is a single-use, time-limited credential that
//! authorizes binding one login subject to one specific CRM contact.
//! Consumed rows are kept forever for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Invitation token domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationToken {
    pub id: Uuid,
    pub token: String,
    /// CRM contact this invitation binds to.
    pub contact_id: String,
    /// CRM account scoping the contact.
    pub account_id: String,
    /// The invited email address.
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    /// Subject that consumed the token, for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by_subject: Option<String>,
}

/// Why an invitation token cannot be used.
///
/// The variants are ordered by diagnosis precedence: a token that is both
/// used and expired reports `AlreadyUsed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvitationTokenError {
    #[error("Invitation token not found")]
    NotFound,

    #[error("Invitation token has already been used")]
    AlreadyUsed,

    #[error("Invitation token has expired")]
    Expired,
}

impl InvitationToken {
    /// Check if the token has been consumed.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Check expiry against an explicit instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check if the token is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Validate the token at the given instant.
    ///
    /// Check order is used-state before expiry, so the caller always gets
    /// the most specific diagnosable error.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<InvitationGrant, InvitationTokenError> {
        if self.is_used() {
            return Err(InvitationTokenError::AlreadyUsed);
        }
        if self.is_expired_at(now) {
            return Err(InvitationTokenError::Expired);
        }
        Ok(InvitationGrant {
            contact_id: self.contact_id.clone(),
            account_id: self.account_id.clone(),
            email: self.email.clone(),
        })
    }
}

/// What a valid invitation token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationGrant {
    pub contact_id: String,
    pub account_id: String,
    pub email: String,
}

/// Request body for side-effect-free invitation validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ValidateInvitationRequest {
    #[validate(custom(function = "shared::validation::validate_token_format"))]
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(used: bool, expired: bool) -> InvitationToken {
        let now = Utc::now();
        InvitationToken {
            id: Uuid::new_v4(),
            token: "inv_test".to_string(),
            contact_id: "0031U00001abc".to_string(),
            account_id: "0011U00001xyz".to_string(),
            email: "borrower@example.com".to_string(),
            issued_at: now - Duration::hours(1),
            expires_at: if expired {
                now - Duration::minutes(5)
            } else {
                now + Duration::hours(1)
            },
            used_at: used.then(|| now - Duration::minutes(30)),
            used_by_subject: used.then(|| "auth0|prior".to_string()),
        }
    }

    #[test]
    fn test_validate_fresh_token() {
        let grant = token(false, false).validate_at(Utc::now()).unwrap();
        assert_eq!(grant.contact_id, "0031U00001abc");
        assert_eq!(grant.account_id, "0011U00001xyz");
        assert_eq!(grant.email, "borrower@example.com");
    }

    #[test]
    fn test_validate_used_token() {
        assert_eq!(
            token(true, false).validate_at(Utc::now()),
            Err(InvitationTokenError::AlreadyUsed)
        );
    }

    #[test]
    fn test_validate_expired_token() {
        assert_eq!(
            token(false, true).validate_at(Utc::now()),
            Err(InvitationTokenError::Expired)
        );
    }

    #[test]
    fn test_used_check_fires_before_expiry() {
        // A consumed token that has since expired still reports AlreadyUsed.
        assert_eq!(
            token(true, true).validate_at(Utc::now()),
            Err(InvitationTokenError::AlreadyUsed)
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let t = token(false, false);
        assert!(!t.is_expired_at(t.expires_at));
        assert!(t.is_expired_at(t.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_validate_request_token_format() {
        let request = ValidateInvitationRequest {
            token: "inv_ok-token".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = ValidateInvitationRequest {
            token: "inv bad".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
