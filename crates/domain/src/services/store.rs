//! Store traits for tokens and mappings, plus an in-memory implementation.
//!
//! The persistence crate implements these traits over PostgreSQL; the
//! in-memory store backs unit tests and local experimentation. Both must
//! uphold the same contract: `create_mapping` is atomic with respect to the
//! bijection invariant and reports which side of the pair collided.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{InvitationToken, ReferralToken, UserMapping};

/// Which uniqueness constraint a mapping insert violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingConflict {
    /// The subject already has a mapping row.
    SubjectAlreadyMapped,
    /// The contact already has a mapping row.
    ContactAlreadyMapped,
}

/// Errors surfaced by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping conflict: {0:?}")]
    Conflict(MappingConflict),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Read and consume operations over invitation tokens.
#[async_trait::async_trait]
pub trait InvitationTokenStore: Send + Sync {
    /// Fetch an invitation token by its opaque value.
    async fn find_invitation(&self, token: &str) -> Result<Option<InvitationToken>, StoreError>;

    /// Mark an invitation consumed by the given subject.
    ///
    /// Guarded single-shot update: returns `true` if this call consumed the
    /// token, `false` if it was already consumed. Repeating the call for the
    /// same token is safe.
    async fn mark_invitation_used(
        &self,
        token: &str,
        subject_id: &str,
    ) -> Result<bool, StoreError>;
}

/// Read and consume operations over referral tokens.
#[async_trait::async_trait]
pub trait ReferralTokenStore: Send + Sync {
    /// Fetch a referral token by its opaque value.
    async fn find_referral(&self, token: &str) -> Result<Option<ReferralToken>, StoreError>;

    /// Increment `uses_count` if the token is active, unexpired, and below
    /// its quota. Returns `false` when the guard rejected the increment.
    async fn consume_referral(&self, token: &str) -> Result<bool, StoreError>;
}

/// The bijective subject-to-contact mapping store.
#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<UserMapping>, StoreError>;

    async fn find_by_contact(&self, contact_id: &str) -> Result<Option<UserMapping>, StoreError>;

    /// Insert a mapping row. The uniqueness of both `subject_id` and
    /// `contact_id` is enforced atomically; a violation is reported as
    /// `StoreError::Conflict` naming the colliding side.
    async fn create_mapping(
        &self,
        subject_id: &str,
        contact_id: &str,
    ) -> Result<UserMapping, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    invitations: HashMap<String, InvitationToken>,
    referrals: HashMap<String, ReferralToken>,
    mappings: Vec<UserMapping>,
}

/// In-memory store implementing all three traits behind one mutex, so
/// `create_mapping` checks both uniqueness constraints atomically.
///
/// Clones share state, mirroring how repository clones share a pool.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an invitation token.
    pub async fn insert_invitation(&self, token: InvitationToken) {
        let mut inner = self.inner.lock().await;
        inner.invitations.insert(token.token.clone(), token);
    }

    /// Seed a referral token.
    pub async fn insert_referral(&self, token: ReferralToken) {
        let mut inner = self.inner.lock().await;
        inner.referrals.insert(token.token.clone(), token);
    }

    /// All mapping rows, for asserting the bijection in tests.
    pub async fn mappings(&self) -> Vec<UserMapping> {
        self.inner.lock().await.mappings.clone()
    }
}

#[async_trait::async_trait]
impl InvitationTokenStore for MemoryIdentityStore {
    async fn find_invitation(&self, token: &str) -> Result<Option<InvitationToken>, StoreError> {
        Ok(self.inner.lock().await.invitations.get(token).cloned())
    }

    async fn mark_invitation_used(
        &self,
        token: &str,
        subject_id: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.invitations.get_mut(token) {
            Some(invitation) if invitation.used_at.is_none() => {
                invitation.used_at = Some(Utc::now());
                invitation.used_by_subject = Some(subject_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl ReferralTokenStore for MemoryIdentityStore {
    async fn find_referral(&self, token: &str) -> Result<Option<ReferralToken>, StoreError> {
        Ok(self.inner.lock().await.referrals.get(token).cloned())
    }

    async fn consume_referral(&self, token: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        match inner.referrals.get_mut(token) {
            Some(referral)
                if referral.is_active()
                    && !referral.is_exhausted()
                    && !referral.is_expired_at(now) =>
            {
                referral.uses_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl MappingStore for MemoryIdentityStore {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<UserMapping>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .mappings
            .iter()
            .find(|m| m.subject_id == subject_id)
            .cloned())
    }

    async fn find_by_contact(&self, contact_id: &str) -> Result<Option<UserMapping>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .mappings
            .iter()
            .find(|m| m.contact_id == contact_id)
            .cloned())
    }

    async fn create_mapping(
        &self,
        subject_id: &str,
        contact_id: &str,
    ) -> Result<UserMapping, StoreError> {
        let mut inner = self.inner.lock().await;

        // Subject uniqueness is checked first, matching the constraint order
        // the PostgreSQL implementation reports.
        if inner.mappings.iter().any(|m| m.subject_id == subject_id) {
            return Err(StoreError::Conflict(MappingConflict::SubjectAlreadyMapped));
        }
        if inner.mappings.iter().any(|m| m.contact_id == contact_id) {
            return Err(StoreError::Conflict(MappingConflict::ContactAlreadyMapped));
        }

        let mapping = UserMapping {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            contact_id: contact_id.to_string(),
            created_at: Utc::now(),
        };
        inner.mappings.push(mapping.clone());
        Ok(mapping)
    }
}
