//! Token Validator: side-effect-free validation of invitation and referral
//! tokens, reporting the most specific failure.
//!
//! Validation never mutates token state. Consuming a token (marking an
//! invitation used, incrementing a referral's quota) is an explicit
//! separate operation, so speculative validation, e.g. rendering a preview
//! banner before login, can run unbounded without depleting anything.

use chrono::Utc;
use thiserror::Error;

use crate::models::{
    InvitationGrant, InvitationTokenError, ReferralGrant, ReferralTokenError,
};
use crate::services::store::{InvitationTokenStore, ReferralTokenStore, StoreError};

/// Invitation validation failure: either a diagnosable token problem or a
/// storage fault.
#[derive(Debug, Error)]
pub enum InvitationValidateError {
    #[error(transparent)]
    Token(#[from] InvitationTokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Referral validation failure.
#[derive(Debug, Error)]
pub enum ReferralValidateError {
    #[error(transparent)]
    Token(#[from] ReferralTokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stateless validator over the token stores.
#[derive(Clone)]
pub struct TokenValidator<S> {
    store: S,
}

impl<S> TokenValidator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: InvitationTokenStore> TokenValidator<S> {
    /// Validate an invitation token without consuming it.
    ///
    /// Check order: existence, then used state, then expiry.
    pub async fn validate_invitation(
        &self,
        token: &str,
    ) -> Result<InvitationGrant, InvitationValidateError> {
        let invitation = self
            .store
            .find_invitation(token)
            .await?
            .ok_or(InvitationTokenError::NotFound)?;

        Ok(invitation.validate_at(Utc::now())?)
    }
}

impl<S: ReferralTokenStore> TokenValidator<S> {
    /// Validate a referral token without consuming it.
    ///
    /// Check order: existence, deactivation, quota, expiry.
    pub async fn validate_referral(
        &self,
        token: &str,
    ) -> Result<ReferralGrant, ReferralValidateError> {
        let referral = self
            .store
            .find_referral(token)
            .await?
            .ok_or(ReferralTokenError::NotFound)?;

        Ok(referral.validate_at(Utc::now())?)
    }

    /// Consume one use of a referral token.
    ///
    /// The store performs a guarded atomic increment; when the guard
    /// rejects, the token is re-read to report which condition failed.
    pub async fn consume_referral(
        &self,
        token: &str,
    ) -> Result<ReferralGrant, ReferralValidateError> {
        if self.store.consume_referral(token).await? {
            // Re-read for the post-increment count.
            let referral = self
                .store
                .find_referral(token)
                .await?
                .ok_or(ReferralTokenError::NotFound)?;
            return Ok(ReferralGrant {
                owner_contact_id: referral.owner_contact_id.clone(),
                uses_count: referral.uses_count,
                max_uses: referral.max_uses,
                is_active: referral.is_active(),
            });
        }

        // Guard rejected: classify via validation, which reports the most
        // specific reason. A token that validates cleanly here lost a race
        // on the last remaining use; report it as exhausted.
        match self.validate_referral(token).await {
            Ok(_) => Err(ReferralTokenError::Exhausted.into()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvitationToken, ReferralToken};
    use crate::services::store::MemoryIdentityStore;
    use chrono::Duration;
    use uuid::Uuid;

    fn invitation(token: &str, expires_in: Duration) -> InvitationToken {
        let now = Utc::now();
        InvitationToken {
            id: Uuid::new_v4(),
            token: token.to_string(),
            contact_id: "0031U00001abc".to_string(),
            account_id: "0011U00001xyz".to_string(),
            email: "b@example.com".to_string(),
            issued_at: now,
            expires_at: now + expires_in,
            used_at: None,
            used_by_subject: None,
        }
    }

    fn referral(token: &str, uses: i32, max: i32) -> ReferralToken {
        let now = Utc::now();
        ReferralToken {
            id: Uuid::new_v4(),
            token: token.to_string(),
            owner_contact_id: "0031U00001own".to_string(),
            created_at: now,
            expires_at: now + Duration::days(30),
            uses_count: uses,
            max_uses: max,
            deactivated_at: None,
        }
    }

    #[tokio::test]
    async fn test_validate_invitation_success() {
        let store = MemoryIdentityStore::new();
        store
            .insert_invitation(invitation("inv_ok", Duration::hours(1)))
            .await;

        let validator = TokenValidator::new(store);
        let grant = validator.validate_invitation("inv_ok").await.unwrap();
        assert_eq!(grant.contact_id, "0031U00001abc");
    }

    #[tokio::test]
    async fn test_validate_invitation_not_found() {
        let validator = TokenValidator::new(MemoryIdentityStore::new());
        match validator.validate_invitation("inv_missing").await {
            Err(InvitationValidateError::Token(InvitationTokenError::NotFound)) => {}
            other => panic!("Expected NotFound, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_validate_invitation_does_not_consume() {
        let store = MemoryIdentityStore::new();
        store
            .insert_invitation(invitation("inv_ok", Duration::hours(1)))
            .await;

        let validator = TokenValidator::new(store.clone());
        for _ in 0..10 {
            validator.validate_invitation("inv_ok").await.unwrap();
        }

        let stored = store.find_invitation("inv_ok").await.unwrap().unwrap();
        assert!(stored.used_at.is_none());
    }

    #[tokio::test]
    async fn test_validate_referral_never_changes_uses_count() {
        let store = MemoryIdentityStore::new();
        store.insert_referral(referral("ref_ok", 2, 10)).await;

        let validator = TokenValidator::new(store.clone());
        for _ in 0..100 {
            validator.validate_referral("ref_ok").await.unwrap();
        }

        let stored = store.find_referral("ref_ok").await.unwrap().unwrap();
        assert_eq!(stored.uses_count, 2);
    }

    #[tokio::test]
    async fn test_consume_referral_until_exhausted() {
        let store = MemoryIdentityStore::new();
        store.insert_referral(referral("ref_q", 0, 3)).await;

        let validator = TokenValidator::new(store);
        for expected in 1..=3 {
            let grant = validator.consume_referral("ref_q").await.unwrap();
            assert_eq!(grant.uses_count, expected);
        }

        match validator.consume_referral("ref_q").await {
            Err(ReferralValidateError::Token(ReferralTokenError::Exhausted)) => {}
            other => panic!("Expected Exhausted, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_consume_referral_inactive() {
        let store = MemoryIdentityStore::new();
        let mut token = referral("ref_off", 0, 3);
        token.deactivated_at = Some(Utc::now());
        store.insert_referral(token).await;

        let validator = TokenValidator::new(store);
        match validator.consume_referral("ref_off").await {
            Err(ReferralValidateError::Token(ReferralTokenError::Inactive)) => {}
            other => panic!("Expected Inactive, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_consume_referral_not_found() {
        let validator = TokenValidator::new(MemoryIdentityStore::new());
        match validator.consume_referral("ref_missing").await {
            Err(ReferralValidateError::Token(ReferralTokenError::NotFound)) => {}
            other => panic!("Expected NotFound, got {:?}", other.err()),
        }
    }
}
