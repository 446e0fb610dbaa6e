//! Invitation token routes.

use axum::{extract::State, Json};
use validator::Validate;

use domain::models::invitation_token::ValidateInvitationRequest;
use domain::models::InvitationGrant;
use domain::services::TokenValidator;
use persistence::repositories::InvitationTokenRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// Validate an invitation token without consuming it.
///
/// POST /api/v1/tokens/invitation/validate
///
/// Public: the pre-login banner calls this before the user has any
/// authenticated identity. Repeated calls never change token state.
pub async fn validate_invitation(
    State(state): State<AppState>,
    Json(request): Json<ValidateInvitationRequest>,
) -> Result<Json<InvitationGrant>, ApiError> {
    request.validate()?;

    let validator = TokenValidator::new(InvitationTokenRepository::new(state.pool.clone()));
    let grant = validator.validate_invitation(&request.token).await?;

    Ok(Json(grant))
}
