//! Repository for referral token database operations.

use chrono::{DateTime, Utc};
use domain::models::ReferralToken;
use domain::services::store::{ReferralTokenStore, StoreError};
use sqlx::PgPool;

use crate::entities::ReferralTokenEntity;

const REFERRAL_COLUMNS: &str =
    "id, token, owner_contact_id, created_at, expires_at, uses_count, max_uses, deactivated_at";

/// Repository for referral token operations.
#[derive(Clone)]
pub struct ReferralTokenRepository {
    pool: PgPool,
}

impl ReferralTokenRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new referral token for the owning contact.
    pub async fn create(
        &self,
        token: &str,
        owner_contact_id: &str,
        max_uses: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<ReferralToken, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO referral_tokens (token, owner_contact_id, max_uses, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        );

        let entity = sqlx::query_as::<_, ReferralTokenEntity>(&query)
            .bind(token)
            .bind(owner_contact_id)
            .bind(max_uses)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(entity.into())
    }
}

#[async_trait::async_trait]
impl ReferralTokenStore for ReferralTokenRepository {
    async fn find_referral(&self, token: &str) -> Result<Option<ReferralToken>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM referral_tokens
            WHERE token = $1
            "#,
            REFERRAL_COLUMNS
        );

        let entity = sqlx::query_as::<_, ReferralTokenEntity>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(entity.map(Into::into))
    }

    /// Guarded atomic increment: only succeeds while the token is active,
    /// unexpired, and below its quota. The guard in the WHERE clause is
    /// what keeps concurrent consumers from overshooting `max_uses`.
    async fn consume_referral(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE referral_tokens
            SET uses_count = uses_count + 1
            WHERE token = $1
              AND deactivated_at IS NULL
              AND expires_at > NOW()
              AND uses_count < max_uses
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
