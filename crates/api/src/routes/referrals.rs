//! Referral token routes: validate, consume, and create.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use validator::Validate;

use domain::models::referral_token::{
    ConsumeReferralResponse, CreateReferralTokenRequest, ReferralTokenRequest,
    ReferralTokenResponse,
};
use domain::models::ReferralGrant;
use domain::services::{MappingStore, TokenValidator};
use persistence::repositories::{ReferralTokenRepository, UserMappingRepository};
use shared::token::{display_prefix, generate_referral_token};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthIdentity;
use crate::middleware::metrics::record_referral_consumed;

/// Validate a referral token without consuming a use.
///
/// POST /api/v1/tokens/referral/validate
pub async fn validate_referral(
    State(state): State<AppState>,
    Json(request): Json<ReferralTokenRequest>,
) -> Result<Json<ReferralGrant>, ApiError> {
    request.validate()?;

    let validator = TokenValidator::new(ReferralTokenRepository::new(state.pool.clone()));
    let grant = validator.validate_referral(&request.token).await?;

    Ok(Json(grant))
}

/// Consume one use of a referral token.
///
/// POST /api/v1/tokens/referral/consume
///
/// Called on successful lead submission, never during validation.
pub async fn consume_referral(
    State(state): State<AppState>,
    Json(request): Json<ReferralTokenRequest>,
) -> Result<Json<ConsumeReferralResponse>, ApiError> {
    request.validate()?;

    let validator = TokenValidator::new(ReferralTokenRepository::new(state.pool.clone()));
    let grant = validator.consume_referral(&request.token).await?;

    record_referral_consumed();
    tracing::info!(
        token_prefix = %display_prefix(&request.token),
        uses_count = grant.uses_count,
        max_uses = grant.max_uses,
        "Referral token consumed"
    );

    Ok(Json(ConsumeReferralResponse {
        uses_count: grant.uses_count,
        remaining_uses: grant.max_uses - grant.uses_count,
    }))
}

/// Create a referral token owned by the caller's contact.
///
/// POST /api/v1/tokens/referral
///
/// Only mapped borrowers can refer; an unlinked login has no contact to
/// own the token.
pub async fn create_referral_token(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(request): Json<CreateReferralTokenRequest>,
) -> Result<(StatusCode, Json<ReferralTokenResponse>), ApiError> {
    request.validate()?;

    let mappings = UserMappingRepository::new(state.pool.clone());
    let mapping = mappings
        .find_by_subject(&auth.subject_id)
        .await?
        .ok_or(ApiError::AccountNotFound)?;

    let max_uses = request
        .max_uses
        .unwrap_or(state.config.tokens.referral_default_max_uses);
    let ttl_days = request
        .expires_in_days
        .map(i64::from)
        .unwrap_or(state.config.tokens.referral_default_ttl_days);
    let expires_at = Utc::now() + Duration::days(ttl_days);

    let token = generate_referral_token();
    let repo = ReferralTokenRepository::new(state.pool.clone());
    let referral = repo
        .create(&token, &mapping.contact_id, max_uses, expires_at)
        .await?;

    tracing::info!(
        token_prefix = %display_prefix(&referral.token),
        owner_contact_id = %referral.owner_contact_id,
        max_uses = referral.max_uses,
        "Referral token created"
    );

    Ok((StatusCode::CREATED, Json(referral.into())))
}
