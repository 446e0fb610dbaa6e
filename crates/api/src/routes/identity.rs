//! Identity routes: mapping lookup, explicit linking, session bootstrap,
//! and the resolved contact profile.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

use domain::models::identity::{LinkRequest, LinkResponse, SessionRequest, SessionResponse};
use domain::models::user_mapping::MappingResponse;
use domain::services::{IdentityLinker, LinkError, MappingStore, SessionBootstrapper, SessionError};
use persistence::repositories::{InvitationTokenRepository, UserMappingRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AuthIdentity, OptionalAuthIdentity};
use crate::middleware::metrics::{record_identity_link, record_session_resolution};
use crate::services::crm::{ContactProfile, Opportunity};

/// Look up the caller's mapping.
///
/// GET /api/v1/identity/mapping
///
/// Returning-user fast path: a 200 here means the client can proceed
/// without any token.
pub async fn get_mapping(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<MappingResponse>, ApiError> {
    let repo = UserMappingRepository::new(state.pool.clone());

    let mapping = repo
        .find_by_subject(&auth.subject_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No linked borrower record".to_string()))?;

    Ok(Json(mapping.into()))
}

/// Link the caller's identity to a contact via an invitation token.
///
/// POST /api/v1/identity/link
pub async fn link_identity(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, ApiError> {
    request.validate()?;

    let linker = IdentityLinker::new(
        InvitationTokenRepository::new(state.pool.clone()),
        UserMappingRepository::new(state.pool.clone()),
    );

    match linker.link(&auth.identity(), &request.invitation_token).await {
        Ok(outcome) => {
            record_identity_link(if outcome.newly_linked {
                "linked"
            } else {
                "idempotent"
            });

            tracing::info!(
                subject_id = %auth.subject_id,
                contact_id = %outcome.mapping.contact_id,
                newly_linked = outcome.newly_linked,
                "Identity linked"
            );

            Ok(Json(LinkResponse {
                contact_id: outcome.mapping.contact_id,
                newly_linked: outcome.newly_linked,
            }))
        }
        Err(err) => {
            record_identity_link(match &err {
                LinkError::TokenInvalid(_) => "token_invalid",
                LinkError::ContactAlreadyAssociated | LinkError::SubjectAlreadyAssociated => {
                    "conflict"
                }
                LinkError::Internal(_) => "error",
            });
            Err(err.into())
        }
    }
}

/// Error body for session bootstrap, extending the standard error shape
/// with the token-discard hint.
#[derive(Debug, Serialize)]
struct SessionFailureBody {
    error: &'static str,
    message: String,
    discard_token: bool,
}

fn session_failure(err: SessionError) -> Response {
    let (status, code) = match &err {
        SessionError::NoAccessPath => (StatusCode::UNAUTHORIZED, "no_access_path"),
        SessionError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
        SessionError::InvitationInvalid(_) => (StatusCode::UNAUTHORIZED, "token_invalid"),
        SessionError::ContactConflict => (StatusCode::CONFLICT, "contact_already_associated"),
        SessionError::SubjectConflict => (StatusCode::CONFLICT, "subject_already_associated"),
        SessionError::Internal(msg) => {
            tracing::error!("Session bootstrap internal error: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    let message = match &err {
        SessionError::Internal(_) => "An internal error occurred".to_string(),
        other => other.to_string(),
    };

    let body = SessionFailureBody {
        error: code,
        message,
        discard_token: err.discard_token(),
    };

    (status, Json(body)).into_response()
}

/// Resolve the caller's session, linking along the way if needed.
///
/// POST /api/v1/identity/session
///
/// Auth is optional at the HTTP layer; an absent or invalid bearer token
/// resolves to the no-access-path outcome rather than a bare 401.
pub async fn bootstrap_session(
    State(state): State<AppState>,
    OptionalAuthIdentity(auth): OptionalAuthIdentity,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, Response> {
    request.validate().map_err(|e| {
        record_session_resolution("validation_error");
        ApiError::from(e).into_response()
    })?;

    let bootstrapper = SessionBootstrapper::new(
        InvitationTokenRepository::new(state.pool.clone()),
        UserMappingRepository::new(state.pool.clone()),
    );

    let identity = auth.as_ref().map(|a| a.identity());

    match bootstrapper
        .bootstrap(identity.as_ref(), request.invitation_token.as_deref())
        .await
    {
        Ok(resolution) => {
            record_session_resolution(if resolution.linked_now {
                "linked"
            } else {
                "fast_path"
            });

            Ok(Json(SessionResponse {
                contact_id: resolution.contact_id,
                linked_now: resolution.linked_now,
                discard_token: resolution.discard_token,
            }))
        }
        Err(err) => {
            record_session_resolution(match &err {
                SessionError::NoAccessPath => "no_access_path",
                SessionError::AccountNotFound => "account_not_found",
                SessionError::InvitationInvalid(_) => "token_invalid",
                SessionError::ContactConflict | SessionError::SubjectConflict => "conflict",
                SessionError::Internal(_) => "error",
            });
            Err(session_failure(err))
        }
    }
}

/// Resolved contact profile with loan opportunities.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileResponse {
    pub contact: ContactProfile,
    pub opportunities: Vec<Opportunity>,
}

/// Fetch the caller's contact profile from the CRM.
///
/// GET /api/v1/identity/profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<ProfileResponse>, ApiError> {
    let repo = UserMappingRepository::new(state.pool.clone());

    let mapping = repo
        .find_by_subject(&auth.subject_id)
        .await?
        .ok_or(ApiError::AccountNotFound)?;

    let contact = state.crm.get_contact(&mapping.contact_id).await?;
    let opportunities = state.crm.list_opportunities(&mapping.contact_id).await?;

    Ok(Json(ProfileResponse {
        contact,
        opportunities,
    }))
}
