//! The persisted, bijective (subject id, contact id) pair.
//!
//! A mapping is the durable outcome of successful linking: once it exists,
//! session resolution never consults tokens again for that identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bijective association between a login subject and a CRM contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserMapping {
    pub id: Uuid,
    pub subject_id: String,
    pub contact_id: String,
    pub created_at: DateTime<Utc>,
}

/// Response shape for the returning-user fast path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MappingResponse {
    pub contact_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserMapping> for MappingResponse {
    fn from(mapping: UserMapping) -> Self {
        Self {
            contact_id: mapping.contact_id,
            created_at: mapping.created_at,
        }
    }
}
