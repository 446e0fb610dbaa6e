//! Referral token entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::ReferralToken;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the referral_tokens table.
#[derive(Debug, Clone, FromRow)]
pub struct ReferralTokenEntity {
    pub id: Uuid,
    pub token: String,
    pub owner_contact_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub uses_count: i32,
    pub max_uses: i32,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl From<ReferralTokenEntity> for ReferralToken {
    fn from(entity: ReferralTokenEntity) -> Self {
        ReferralToken {
            id: entity.id,
            token: entity.token,
            owner_contact_id: entity.owner_contact_id,
            created_at: entity.created_at,
            expires_at: entity.expires_at,
            uses_count: entity.uses_count,
            max_uses: entity.max_uses,
            deactivated_at: entity.deactivated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_referral_token_entity_to_domain() {
        let now = Utc::now();
        let entity = ReferralTokenEntity {
            id: Uuid::new_v4(),
            token: "ref_abc123".to_string(),
            owner_contact_id: "0031U00001own".to_string(),
            created_at: now,
            expires_at: now + Duration::days(90),
            uses_count: 5,
            max_uses: 25,
            deactivated_at: None,
        };

        let token: ReferralToken = entity.clone().into();
        assert_eq!(token.id, entity.id);
        assert_eq!(token.uses_count, 5);
        assert_eq!(token.remaining_uses(), 20);
        assert!(token.is_active());
    }
}
