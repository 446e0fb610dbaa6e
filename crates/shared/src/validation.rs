//! Common validation utilities.

use validator::ValidationError;

/// Maximum length accepted for opaque token strings.
const MAX_TOKEN_LENGTH: usize = 128;

/// Maximum length accepted for subject ids and CRM record ids.
const MAX_ID_LENGTH: usize = 255;

/// Validates the shape of an opaque token string.
///
/// Tokens are URL-safe base64 with a short lowercase prefix; anything else
/// is rejected before it reaches the store.
pub fn validate_token_format(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
        let mut err = ValidationError::new("token_length");
        err.message = Some("Token must be between 1 and 128 characters".into());
        return Err(err);
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("token_charset");
        err.message = Some("Token contains invalid characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an opaque identifier (subject id, contact id, account id).
pub fn validate_opaque_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        let mut err = ValidationError::new("id_length");
        err.message = Some("Identifier must be between 1 and 255 characters".into());
        return Err(err);
    }

    if id.chars().any(|c| c.is_control()) {
        let mut err = ValidationError::new("id_charset");
        err.message = Some("Identifier contains control characters".into());
        return Err(err);
    }

    Ok(())
}
