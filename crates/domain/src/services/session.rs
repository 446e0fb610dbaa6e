//! Session Bootstrapper: the deterministic decision table run on every
//! authenticated page load.
//!
//! The load-bearing ordering property: the mapping lookup runs before any
//! token is consulted. Once an identity is linked it never depends on token
//! availability again, and a stale token in the client's cache can never
//! re-trigger a linking side effect for an already-resolved identity.

use thiserror::Error;
use tracing::info;

use crate::models::{ExternalIdentity, InvitationTokenError};
use crate::services::identity_linker::{IdentityLinker, LinkError};
use crate::services::store::{InvitationTokenStore, MappingStore};

/// Terminal, unrecoverable outcomes of session bootstrap.
///
/// The caller is expected to present the message and not auto-retry; the
/// conflict variants direct the user to support, the token variants to a
/// fresh invitation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No valid access path: sign in through your invitation link")]
    NoAccessPath,

    #[error("Account not found: use your invitation link to connect your login")]
    AccountNotFound,

    #[error("Invitation expired or already used: request a fresh invitation")]
    InvitationInvalid(#[source] InvitationTokenError),

    #[error("This borrower record is already connected to a different login; contact support")]
    ContactConflict,

    #[error("This login is already connected to a different borrower record; contact support")]
    SubjectConflict,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether the client should drop its cached invitation token: retrying
    /// with the same token cannot change this outcome.
    pub fn discard_token(&self) -> bool {
        matches!(
            self,
            SessionError::InvitationInvalid(_)
                | SessionError::ContactConflict
                | SessionError::SubjectConflict
        )
    }
}

/// Successful session resolution.
#[derive(Debug, Clone)]
pub struct SessionResolution {
    pub contact_id: String,
    /// True when this request performed the link rather than finding an
    /// existing mapping.
    pub linked_now: bool,
    /// True when a supplied invitation token is spent and should be dropped
    /// from the client cache.
    pub discard_token: bool,
}

/// Orchestrates mapping lookup and link attempts for one request.
#[derive(Clone)]
pub struct SessionBootstrapper<I, M> {
    invitations: I,
    mappings: M,
}

impl<I, M> SessionBootstrapper<I, M>
where
    I: InvitationTokenStore + Clone,
    M: MappingStore + Clone,
{
    pub fn new(invitations: I, mappings: M) -> Self {
        Self {
            invitations,
            mappings,
        }
    }

    /// Resolve the caller to a contact id, linking if needed.
    ///
    /// Decision table:
    /// - no identity: unrecoverable, regardless of any cached token
    ///   (linking requires an authenticated identity)
    /// - identity with an existing mapping: resolved, tokens never consulted
    /// - identity without mapping or token: unrecoverable
    /// - identity without mapping, token present: link attempt; the token is
    ///   spent either way
    pub async fn bootstrap(
        &self,
        identity: Option<&ExternalIdentity>,
        cached_token: Option<&str>,
    ) -> Result<SessionResolution, SessionError> {
        let identity = identity.ok_or(SessionError::NoAccessPath)?;

        if let Some(mapping) = self
            .mappings
            .find_by_subject(&identity.subject_id)
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?
        {
            // Fast path. Any cached token is left unconsumed.
            return Ok(SessionResolution {
                contact_id: mapping.contact_id,
                linked_now: false,
                discard_token: false,
            });
        }

        let token = cached_token.ok_or(SessionError::AccountNotFound)?;

        let linker = IdentityLinker::new(self.invitations.clone(), self.mappings.clone());
        match linker.link(identity, token).await {
            Ok(outcome) => {
                info!(
                    subject_id = %identity.subject_id,
                    contact_id = %outcome.mapping.contact_id,
                    linked_now = outcome.newly_linked,
                    "Session resolved via link attempt"
                );
                Ok(SessionResolution {
                    contact_id: outcome.mapping.contact_id,
                    linked_now: outcome.newly_linked,
                    discard_token: true,
                })
            }
            Err(LinkError::TokenInvalid(reason)) => Err(SessionError::InvitationInvalid(reason)),
            Err(LinkError::ContactAlreadyAssociated) => Err(SessionError::ContactConflict),
            Err(LinkError::SubjectAlreadyAssociated) => Err(SessionError::SubjectConflict),
            Err(LinkError::Internal(msg)) => Err(SessionError::Internal(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvitationToken;
    use crate::services::store::{MemoryIdentityStore, StoreError};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn invitation(token: &str, contact: &str) -> InvitationToken {
        let now = Utc::now();
        InvitationToken {
            id: Uuid::new_v4(),
            token: token.to_string(),
            contact_id: contact.to_string(),
            account_id: "0011U00001xyz".to_string(),
            email: "b@example.com".to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            used_at: None,
            used_by_subject: None,
        }
    }

    fn identity(subject: &str) -> ExternalIdentity {
        ExternalIdentity::new(subject, None)
    }

    fn bootstrapper(
        store: &MemoryIdentityStore,
    ) -> SessionBootstrapper<MemoryIdentityStore, MemoryIdentityStore> {
        SessionBootstrapper::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_no_identity_no_token() {
        let store = MemoryIdentityStore::new();
        match bootstrapper(&store).bootstrap(None, None).await {
            Err(SessionError::NoAccessPath) => {}
            other => panic!("Expected NoAccessPath, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_no_identity_with_token_still_unrecoverable() {
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;
        match bootstrapper(&store).bootstrap(None, Some("inv_t1")).await {
            Err(SessionError::NoAccessPath) => {}
            other => panic!("Expected NoAccessPath, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_identity_without_mapping_or_token() {
        let store = MemoryIdentityStore::new();
        match bootstrapper(&store)
            .bootstrap(Some(&identity("s1")), None)
            .await
        {
            Err(SessionError::AccountNotFound) => {}
            other => panic!("Expected AccountNotFound, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_first_visit_links_and_discards_token() {
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;

        let resolution = bootstrapper(&store)
            .bootstrap(Some(&identity("s1")), Some("inv_t1"))
            .await
            .unwrap();

        assert_eq!(resolution.contact_id, "c1");
        assert!(resolution.linked_now);
        assert!(resolution.discard_token);
    }

    #[tokio::test]
    async fn test_fast_path_ignores_stale_token() {
        // s1 is mapped to c1; a stale cached token resolving to c2 is still
        // in the request. The mapping lookup wins and the token is left
        // unconsumed.
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;
        store.insert_invitation(invitation("inv_t3", "c2")).await;

        let bootstrap = bootstrapper(&store);
        bootstrap
            .bootstrap(Some(&identity("s1")), Some("inv_t1"))
            .await
            .unwrap();

        let resolution = bootstrap
            .bootstrap(Some(&identity("s1")), Some("inv_t3"))
            .await
            .unwrap();

        assert_eq!(resolution.contact_id, "c1");
        assert!(!resolution.linked_now);
        assert!(!resolution.discard_token);

        let stale = store.find_invitation("inv_t3").await.unwrap().unwrap();
        assert!(!stale.is_used());
    }

    #[tokio::test]
    async fn test_fast_path_never_links_again() {
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;

        let bootstrap = bootstrapper(&store);
        bootstrap
            .bootstrap(Some(&identity("s1")), Some("inv_t1"))
            .await
            .unwrap();

        // Repeated bootstraps resolve via lookup alone.
        for _ in 0..5 {
            let resolution = bootstrap
                .bootstrap(Some(&identity("s1")), Some("inv_t1"))
                .await
                .unwrap();
            assert_eq!(resolution.contact_id, "c1");
            assert!(!resolution.linked_now);
        }
        assert_eq!(store.mappings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_used_token_reports_invitation_invalid() {
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;

        let bootstrap = bootstrapper(&store);
        bootstrap
            .bootstrap(Some(&identity("s1")), Some("inv_t1"))
            .await
            .unwrap();

        let err = bootstrap
            .bootstrap(Some(&identity("s2")), Some("inv_t1"))
            .await
            .unwrap_err();
        match &err {
            SessionError::InvitationInvalid(InvitationTokenError::AlreadyUsed) => {}
            other => panic!("Expected AlreadyUsed, got {:?}", other),
        }
        assert!(err.discard_token());
    }

    #[tokio::test]
    async fn test_contact_conflict_is_unrecoverable_and_discards() {
        let store = MemoryIdentityStore::new();
        store.insert_invitation(invitation("inv_t1", "c1")).await;
        store.insert_invitation(invitation("inv_t2", "c1")).await;

        let bootstrap = bootstrapper(&store);
        bootstrap
            .bootstrap(Some(&identity("s1")), Some("inv_t1"))
            .await
            .unwrap();

        let err = bootstrap
            .bootstrap(Some(&identity("s2")), Some("inv_t2"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ContactConflict));
        assert!(err.discard_token());
    }

    #[tokio::test]
    async fn test_account_not_found_keeps_token_hope() {
        // AccountNotFound means no token was supplied; nothing to discard.
        let err = SessionError::AccountNotFound;
        assert!(!err.discard_token());
        assert!(!SessionError::NoAccessPath.discard_token());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_internal() {
        #[derive(Clone)]
        struct DownStore;

        #[async_trait::async_trait]
        impl MappingStore for DownStore {
            async fn find_by_subject(
                &self,
                _subject_id: &str,
            ) -> Result<Option<crate::models::UserMapping>, StoreError> {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }

            async fn find_by_contact(
                &self,
                _contact_id: &str,
            ) -> Result<Option<crate::models::UserMapping>, StoreError> {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }

            async fn create_mapping(
                &self,
                _subject_id: &str,
                _contact_id: &str,
            ) -> Result<crate::models::UserMapping, StoreError> {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }
        }

        let tokens = MemoryIdentityStore::new();
        let bootstrap = SessionBootstrapper::new(tokens, DownStore);
        match bootstrap.bootstrap(Some(&identity("s1")), None).await {
            Err(SessionError::Internal(_)) => {}
            other => panic!("Expected Internal, got {:?}", other.err()),
        }
    }
}
