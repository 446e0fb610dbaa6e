//! Invitation token entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::InvitationToken;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the invitation_tokens table.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationTokenEntity {
    pub id: Uuid,
    pub token: String,
    pub contact_id: String,
    pub account_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_subject: Option<String>,
}

impl From<InvitationTokenEntity> for InvitationToken {
    fn from(entity: InvitationTokenEntity) -> Self {
        InvitationToken {
            id: entity.id,
            token: entity.token,
            contact_id: entity.contact_id,
            account_id: entity.account_id,
            email: entity.email,
            issued_at: entity.issued_at,
            expires_at: entity.expires_at,
            used_at: entity.used_at,
            used_by_subject: entity.used_by_subject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_invitation_token_entity_to_domain() {
        let now = Utc::now();
        let entity = InvitationTokenEntity {
            id: Uuid::new_v4(),
            token: "inv_abc123".to_string(),
            contact_id: "0031U00001abc".to_string(),
            account_id: "0011U00001xyz".to_string(),
            email: "borrower@example.com".to_string(),
            issued_at: now,
            expires_at: now + Duration::days(7),
            used_at: None,
            used_by_subject: None,
        };

        let token: InvitationToken = entity.clone().into();
        assert_eq!(token.id, entity.id);
        assert_eq!(token.token, "inv_abc123");
        assert_eq!(token.contact_id, "0031U00001abc");
        assert!(!token.is_used());
    }

    #[test]
    fn test_consumed_entity_to_domain() {
        let now = Utc::now();
        let entity = InvitationTokenEntity {
            id: Uuid::new_v4(),
            token: "inv_used".to_string(),
            contact_id: "0031U00001abc".to_string(),
            account_id: "0011U00001xyz".to_string(),
            email: "borrower@example.com".to_string(),
            issued_at: now - Duration::days(1),
            expires_at: now + Duration::days(6),
            used_at: Some(now),
            used_by_subject: Some("auth0|consumer".to_string()),
        };

        let token: InvitationToken = entity.into();
        assert!(token.is_used());
        assert_eq!(token.used_by_subject.as_deref(), Some("auth0|consumer"));
    }
}
