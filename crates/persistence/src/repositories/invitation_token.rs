//! Repository for invitation token database operations.
//!
//! Rows are never deleted; consumed tokens are kept for audit.

use chrono::{DateTime, Utc};
use domain::models::InvitationToken;
use domain::services::store::{InvitationTokenStore, StoreError};
use sqlx::PgPool;

use crate::entities::InvitationTokenEntity;

/// Repository for invitation token operations.
#[derive(Clone)]
pub struct InvitationTokenRepository {
    pool: PgPool,
}

impl InvitationTokenRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new invitation token.
    ///
    /// Called by the portal's internal invitation-generation action and by
    /// test seeding; there is no public creation endpoint.
    pub async fn create(
        &self,
        token: &str,
        contact_id: &str,
        account_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<InvitationToken, sqlx::Error> {
        let entity = sqlx::query_as::<_, InvitationTokenEntity>(
            r#"
            INSERT INTO invitation_tokens (token, contact_id, account_id, email, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, token, contact_id, account_id, email, issued_at, expires_at, used_at, used_by_subject
            "#,
        )
        .bind(token)
        .bind(contact_id)
        .bind(account_id)
        .bind(email)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity.into())
    }
}

#[async_trait::async_trait]
impl InvitationTokenStore for InvitationTokenRepository {
    async fn find_invitation(&self, token: &str) -> Result<Option<InvitationToken>, StoreError> {
        let entity = sqlx::query_as::<_, InvitationTokenEntity>(
            r#"
            SELECT id, token, contact_id, account_id, email, issued_at, expires_at, used_at, used_by_subject
            FROM invitation_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(entity.map(Into::into))
    }

    /// Mark a token consumed by the given subject.
    ///
    /// The `used_at IS NULL` guard makes this a single-shot update: exactly
    /// one caller observes `true`, and repeating the call is harmless.
    async fn mark_invitation_used(
        &self,
        token: &str,
        subject_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE invitation_tokens
            SET used_at = NOW(), used_by_subject = $2
            WHERE token = $1 AND used_at IS NULL
            "#,
        )
        .bind(token)
        .bind(subject_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
