//! Referral token domain model.
//!
//! A referral token is a multi-use, time-limited credential that authorizes
//! creating new leads attributed to an owning contact. It never authorizes
//! identity linking; the two token kinds are not interchangeable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Referral token domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReferralToken {
    pub id: Uuid,
    pub token: String,
    /// Contact that owns the referral quota and receives attribution.
    pub owner_contact_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub uses_count: i32,
    pub max_uses: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Why a referral token cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferralTokenError {
    #[error("Referral token not found")]
    NotFound,

    #[error("Referral token has been deactivated")]
    Inactive,

    #[error("Referral token has no remaining uses")]
    Exhausted,

    #[error("Referral token has expired")]
    Expired,
}

impl ReferralToken {
    /// Check if the token has been explicitly deactivated.
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    /// Check if the usage quota is spent.
    pub fn is_exhausted(&self) -> bool {
        self.uses_count >= self.max_uses
    }

    /// Check expiry against an explicit instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Remaining uses, never negative.
    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.uses_count).max(0)
    }

    /// Validate the token at the given instant.
    ///
    /// Check order: deactivation, then quota, then expiry. Validation is
    /// side-effect free; consumption is a separate explicit operation.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<ReferralGrant, ReferralTokenError> {
        if !self.is_active() {
            return Err(ReferralTokenError::Inactive);
        }
        if self.is_exhausted() {
            return Err(ReferralTokenError::Exhausted);
        }
        if self.is_expired_at(now) {
            return Err(ReferralTokenError::Expired);
        }
        Ok(ReferralGrant {
            owner_contact_id: self.owner_contact_id.clone(),
            uses_count: self.uses_count,
            max_uses: self.max_uses,
            is_active: true,
        })
    }
}

/// What a valid referral token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReferralGrant {
    pub owner_contact_id: String,
    pub uses_count: i32,
    pub max_uses: i32,
    pub is_active: bool,
}

/// Request body for referral validation and consumption.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ReferralTokenRequest {
    #[validate(custom(function = "shared::validation::validate_token_format"))]
    pub token: String,
}

/// Request to create a new referral token for the calling contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateReferralTokenRequest {
    #[validate(range(min = 1, max = 1000, message = "max_uses must be between 1 and 1000"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<i32>,
    #[validate(range(
        min = 1,
        max = 365,
        message = "expires_in_days must be between 1 and 365"
    ))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_days: Option<i32>,
}

/// Response for referral token creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReferralTokenResponse {
    pub token: String,
    pub owner_contact_id: String,
    pub uses_count: i32,
    pub max_uses: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<ReferralToken> for ReferralTokenResponse {
    fn from(token: ReferralToken) -> Self {
        let is_active = token.is_active();
        Self {
            token: token.token,
            owner_contact_id: token.owner_contact_id,
            uses_count: token.uses_count,
            max_uses: token.max_uses,
            expires_at: token.expires_at,
            is_active,
        }
    }
}

/// Response for a successful consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsumeReferralResponse {
    pub uses_count: i32,
    pub remaining_uses: i32,
}
