//! User mapping entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::UserMapping;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the user_mappings table.
///
/// Both `subject_id` and `contact_id` carry unique constraints; the table
/// is the single source of truth for the bijection.
#[derive(Debug, Clone, FromRow)]
pub struct UserMappingEntity {
    pub id: Uuid,
    pub subject_id: String,
    pub contact_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserMappingEntity> for UserMapping {
    fn from(entity: UserMappingEntity) -> Self {
        UserMapping {
            id: entity.id,
            subject_id: entity.subject_id,
            contact_id: entity.contact_id,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mapping_entity_to_domain() {
        let entity = UserMappingEntity {
            id: Uuid::new_v4(),
            subject_id: "auth0|abc".to_string(),
            contact_id: "0031U00001abc".to_string(),
            created_at: Utc::now(),
        };

        let mapping: UserMapping = entity.clone().into();
        assert_eq!(mapping.id, entity.id);
        assert_eq!(mapping.subject_id, "auth0|abc");
        assert_eq!(mapping.contact_id, "0031U00001abc");
    }
}
