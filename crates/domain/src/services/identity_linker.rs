//! Identity Linker: the transactional operation that binds an authenticated
//! identity to the CRM contact an invitation token resolves to.
//!
//! The conflict prechecks are an optimization for specific diagnostics; the
//! mapping store's uniqueness constraints are the authority. A concurrent
//! winner between precheck and insert surfaces as a store conflict and is
//! re-classified into the same typed errors.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ExternalIdentity, InvitationGrant, InvitationTokenError, UserMapping};
use crate::services::store::{
    InvitationTokenStore, MappingConflict, MappingStore, StoreError,
};

/// Linking failure.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The invitation token does not authorize linking; the reason says why.
    #[error("Invitation token invalid: {0}")]
    TokenInvalid(#[source] InvitationTokenError),

    /// The contact is permanently bound to a different login identity.
    /// Not retryable; requires support intervention.
    #[error("Contact is already associated with a different login identity")]
    ContactAlreadyAssociated,

    /// The login identity is permanently bound to a different contact.
    /// Not retryable; requires support intervention.
    #[error("Login identity is already associated with a different contact")]
    SubjectAlreadyAssociated,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(MappingConflict::SubjectAlreadyMapped) => {
                LinkError::SubjectAlreadyAssociated
            }
            StoreError::Conflict(MappingConflict::ContactAlreadyMapped) => {
                LinkError::ContactAlreadyAssociated
            }
            StoreError::Unavailable(msg) => LinkError::Internal(msg),
        }
    }
}

/// Result of a successful link call.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub mapping: UserMapping,
    /// False when the mapping already existed (idempotent retry).
    pub newly_linked: bool,
}

/// Links authenticated identities to CRM contacts via invitation tokens.
#[derive(Clone)]
pub struct IdentityLinker<I, M> {
    invitations: I,
    mappings: M,
}

impl<I, M> IdentityLinker<I, M>
where
    I: InvitationTokenStore,
    M: MappingStore,
{
    pub fn new(invitations: I, mappings: M) -> Self {
        Self {
            invitations,
            mappings,
        }
    }

    /// Create or confirm the mapping for `identity` using `invitation_token`.
    ///
    /// Sequence: validate the token, precheck both sides of the bijection,
    /// insert, then mark the token used. Exactly one caller wins a race for
    /// the same contact or subject; the rest receive a conflict error,
    /// never a silent duplicate mapping.
    pub async fn link(
        &self,
        identity: &ExternalIdentity,
        invitation_token: &str,
    ) -> Result<LinkOutcome, LinkError> {
        let grant = self.validate_invitation(invitation_token).await?;

        // Contact-side precheck runs first so contact conflicts win when
        // both sides would fire.
        if let Some(existing) = self
            .mappings
            .find_by_contact(&grant.contact_id)
            .await
            .map_err(internal)?
        {
            if existing.subject_id != identity.subject_id {
                return Err(LinkError::ContactAlreadyAssociated);
            }
            // Already linked to this very identity: a retried request after
            // a timeout. Confirm rather than conflict.
            self.mark_used(invitation_token, &identity.subject_id).await;
            return Ok(LinkOutcome {
                mapping: existing,
                newly_linked: false,
            });
        }

        if let Some(existing) = self
            .mappings
            .find_by_subject(&identity.subject_id)
            .await
            .map_err(internal)?
        {
            // A same-contact row would have been found by the contact
            // lookup above, so any hit here is a different contact.
            debug_assert_ne!(existing.contact_id, grant.contact_id);
            return Err(LinkError::SubjectAlreadyAssociated);
        }

        let mapping = self.create_mapping(identity, &grant).await?;

        self.mark_used(invitation_token, &identity.subject_id).await;

        info!(
            subject_id = %identity.subject_id,
            contact_id = %grant.contact_id,
            token_prefix = %shared::token::display_prefix(invitation_token),
            "Identity linked to contact"
        );

        Ok(LinkOutcome {
            mapping,
            newly_linked: true,
        })
    }

    async fn validate_invitation(&self, token: &str) -> Result<InvitationGrant, LinkError> {
        let invitation = self
            .invitations
            .find_invitation(token)
            .await
            .map_err(internal)?
            .ok_or(LinkError::TokenInvalid(InvitationTokenError::NotFound))?;

        invitation
            .validate_at(Utc::now())
            .map_err(LinkError::TokenInvalid)
    }

    /// Insert the mapping, reclassifying races and recovering from
    /// transient faults.
    async fn create_mapping(
        &self,
        identity: &ExternalIdentity,
        grant: &InvitationGrant,
    ) -> Result<UserMapping, LinkError> {
        match self
            .mappings
            .create_mapping(&identity.subject_id, &grant.contact_id)
            .await
        {
            Ok(mapping) => Ok(mapping),
            Err(StoreError::Conflict(conflict)) => {
                // Lost a race since the prechecks. If the winner wrote the
                // identical pair (a duplicated retry of this same request),
                // confirm it; otherwise report the conflict the constraint
                // identified.
                let existing = match conflict {
                    MappingConflict::SubjectAlreadyMapped => {
                        self.mappings.find_by_subject(&identity.subject_id).await
                    }
                    MappingConflict::ContactAlreadyMapped => {
                        self.mappings.find_by_contact(&grant.contact_id).await
                    }
                }
                .map_err(internal)?;

                match existing {
                    Some(mapping)
                        if mapping.subject_id == identity.subject_id
                            && mapping.contact_id == grant.contact_id =>
                    {
                        Ok(mapping)
                    }
                    _ => Err(StoreError::Conflict(conflict).into()),
                }
            }
            Err(StoreError::Unavailable(msg)) => {
                // The write may have committed before the fault (e.g. a
                // timeout after commit). Re-discover by lookup before
                // re-attempting blind creation.
                warn!(
                    subject_id = %identity.subject_id,
                    error = %msg,
                    "Mapping create failed transiently; recovering via lookup"
                );

                match self
                    .mappings
                    .find_by_subject(&identity.subject_id)
                    .await
                    .map_err(internal)?
                {
                    Some(mapping) if mapping.contact_id == grant.contact_id => Ok(mapping),
                    Some(_) => Err(LinkError::SubjectAlreadyAssociated),
                    None => self
                        .mappings
                        .create_mapping(&identity.subject_id, &grant.contact_id)
                        .await
                        .map_err(LinkError::from),
                }
            }
        }
    }

    /// Mark the invitation consumed, after the mapping exists.
    ///
    /// The guarded update is idempotent; a failure here leaves the mapping
    /// authoritative (the fast path never consults tokens again), so it is
    /// logged rather than surfaced to the caller.
    async fn mark_used(&self, token: &str, subject_id: &str) {
        match self.invitations.mark_invitation_used(token, subject_id).await {
            Ok(_) => {}
            Err(e) => warn!(
                token_prefix = %shared::token::display_prefix(token),
                error = %e,
                "Failed to mark invitation token used"
            ),
        }
    }
}

fn internal(err: StoreError) -> LinkError {
    LinkError::Internal(err.to_string())
}
