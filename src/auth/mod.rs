// Authentication module
// Guards the destructive purge endpoint with a shared bearer secret

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Purge is disabled: no secret configured")]
    NotConfigured,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid bearer token")]
    InvalidToken,
}

/// Token part of an `Authorization: Bearer <token>` value
pub fn parse_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Compare without short-circuiting on the first differing byte
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check an `Authorization` header value against the configured secret
///
/// With no secret configured every purge is refused.
pub fn verify_purge_credential(
    secret: Option<&str>,
    authorization: Option<&str>,
) -> Result<(), AuthError> {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return Err(AuthError::NotConfigured),
    };
    let token = authorization
        .and_then(parse_bearer)
        .ok_or(AuthError::MissingToken)?;

    if constant_time_compare(token.as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}
