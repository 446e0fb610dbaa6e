//! Repository for the bijective subject-to-contact mapping.
//!
//! The two unique constraints on `user_mappings` are the linearization
//! point for concurrent linking. `create_mapping` translates a uniqueness
//! violation into a typed conflict naming the colliding side, so the
//! identity linker can distinguish "someone else claimed this contact"
//! from "this subject already has a different contact".

use domain::models::UserMapping;
use domain::services::store::{MappingConflict, MappingStore, StoreError};
use sqlx::PgPool;
use tracing::warn;

use crate::entities::UserMappingEntity;

/// Constraint names declared in the user_mappings migration.
const SUBJECT_UNIQUE_CONSTRAINT: &str = "user_mappings_subject_id_key";
const CONTACT_UNIQUE_CONSTRAINT: &str = "user_mappings_contact_id_key";

/// Repository for user mapping database operations.
#[derive(Clone)]
pub struct UserMappingRepository {
    pool: PgPool,
}

impl UserMappingRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn query_by_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<UserMapping>, sqlx::Error> {
        let entity = sqlx::query_as::<_, UserMappingEntity>(
            r#"
            SELECT id, subject_id, contact_id, created_at
            FROM user_mappings
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(Into::into))
    }

    async fn query_by_contact(
        &self,
        contact_id: &str,
    ) -> Result<Option<UserMapping>, sqlx::Error> {
        let entity = sqlx::query_as::<_, UserMappingEntity>(
            r#"
            SELECT id, subject_id, contact_id, created_at
            FROM user_mappings
            WHERE contact_id = $1
            "#,
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(Into::into))
    }
}

#[async_trait::async_trait]
impl MappingStore for UserMappingRepository {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<UserMapping>, StoreError> {
        // Reads are idempotent: one retry on transient failure.
        match self.query_by_subject(subject_id).await {
            Ok(mapping) => Ok(mapping),
            Err(first) => {
                warn!(error = %first, "Mapping lookup by subject failed, retrying once");
                self.query_by_subject(subject_id)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))
            }
        }
    }

    async fn find_by_contact(&self, contact_id: &str) -> Result<Option<UserMapping>, StoreError> {
        match self.query_by_contact(contact_id).await {
            Ok(mapping) => Ok(mapping),
            Err(first) => {
                warn!(error = %first, "Mapping lookup by contact failed, retrying once");
                self.query_by_contact(contact_id)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))
            }
        }
    }

    async fn create_mapping(
        &self,
        subject_id: &str,
        contact_id: &str,
    ) -> Result<UserMapping, StoreError> {
        let result = sqlx::query_as::<_, UserMappingEntity>(
            r#"
            INSERT INTO user_mappings (subject_id, contact_id)
            VALUES ($1, $2)
            RETURNING id, subject_id, contact_id, created_at
            "#,
        )
        .bind(subject_id)
        .bind(contact_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(entity) => Ok(entity.into()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                match db_err.constraint() {
                    Some(SUBJECT_UNIQUE_CONSTRAINT) => {
                        Err(StoreError::Conflict(MappingConflict::SubjectAlreadyMapped))
                    }
                    Some(CONTACT_UNIQUE_CONSTRAINT) => {
                        Err(StoreError::Conflict(MappingConflict::ContactAlreadyMapped))
                    }
                    other => Err(StoreError::Unavailable(format!(
                        "unexpected unique violation on {:?}",
                        other
                    ))),
                }
            }
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_names_match_migration() {
        // The 23505 classification depends on these exact names; the
        // migration declares them explicitly.
        assert_eq!(SUBJECT_UNIQUE_CONSTRAINT, "user_mappings_subject_id_key");
        assert_eq!(CONTACT_UNIQUE_CONSTRAINT, "user_mappings_contact_id_key");
    }
}
