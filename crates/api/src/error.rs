use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::models::{InvitationTokenError, ReferralTokenError};
use domain::services::{InvitationValidateError, LinkError, ReferralValidateError, StoreError};

/// API-level error with a closed set of machine-readable reason codes.
///
/// Token and conflict failures carry a specific code so clients can branch
/// without parsing messages; storage faults collapse into the generic
/// internal/unavailable variants.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invitation token invalid: {0}")]
    TokenInvalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token not found")]
    TokenNotFound,

    #[error("No borrower record linked to this login")]
    AccountNotFound,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has already been used")]
    TokenAlreadyUsed,

    #[error("Referral token has been deactivated")]
    ReferralInactive,

    #[error("Referral token has no remaining uses")]
    ReferralExhausted,

    #[error("This borrower record is already connected to a different login; contact support")]
    ContactAlreadyAssociated,

    #[error("This login is already connected to a different borrower record; contact support")]
    SubjectAlreadyAssociated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl ApiError {
    /// Status code and reason code for this error.
    pub fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::TokenInvalid(_) => (StatusCode::UNAUTHORIZED, "token_invalid"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::TokenNotFound => (StatusCode::NOT_FOUND, "token_not_found"),
            ApiError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
            ApiError::TokenExpired => (StatusCode::GONE, "token_expired"),
            ApiError::TokenAlreadyUsed => (StatusCode::GONE, "token_already_used"),
            ApiError::ReferralInactive => (StatusCode::GONE, "referral_inactive"),
            ApiError::ReferralExhausted => (StatusCode::CONFLICT, "referral_exhausted"),
            ApiError::ContactAlreadyAssociated => {
                (StatusCode::CONFLICT, "contact_already_associated")
            }
            ApiError::SubjectAlreadyAssociated => {
                (StatusCode::CONFLICT, "subject_already_associated")
            }
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();

        let message = match &self {
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<InvitationTokenError> for ApiError {
    fn from(err: InvitationTokenError) -> Self {
        match err {
            InvitationTokenError::NotFound => ApiError::TokenNotFound,
            InvitationTokenError::AlreadyUsed => ApiError::TokenAlreadyUsed,
            InvitationTokenError::Expired => ApiError::TokenExpired,
        }
    }
}

impl From<ReferralTokenError> for ApiError {
    fn from(err: ReferralTokenError) -> Self {
        match err {
            ReferralTokenError::NotFound => ApiError::TokenNotFound,
            ReferralTokenError::Inactive => ApiError::ReferralInactive,
            ReferralTokenError::Exhausted => ApiError::ReferralExhausted,
            ReferralTokenError::Expired => ApiError::TokenExpired,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // Raw conflicts are classified by the linker; one reaching this
            // conversion means a code path skipped it.
            StoreError::Conflict(_) => ApiError::Internal(format!("Unclassified conflict: {}", err)),
            StoreError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<InvitationValidateError> for ApiError {
    fn from(err: InvitationValidateError) -> Self {
        match err {
            InvitationValidateError::Token(e) => e.into(),
            InvitationValidateError::Store(e) => e.into(),
        }
    }
}

impl From<ReferralValidateError> for ApiError {
    fn from(err: ReferralValidateError) -> Self {
        match err {
            ReferralValidateError::Token(e) => e.into(),
            ReferralValidateError::Store(e) => e.into(),
        }
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::TokenInvalid(reason) => ApiError::TokenInvalid(reason.to_string()),
            LinkError::ContactAlreadyAssociated => ApiError::ContactAlreadyAssociated,
            LinkError::SubjectAlreadyAssociated => ApiError::SubjectAlreadyAssociated,
            LinkError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let detail = e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "invalid value".to_string());
                    format!("{}: {}", field, detail)
                })
            })
            .collect();

        ApiError::Validation(messages.join("; "))
    }
}
