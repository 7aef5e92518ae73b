// Purge credential tests

use kagami::auth::{verify_purge_credential, AuthError};
use kagami::pipeline::RequestContext;

#[test]
fn test_credential_read_from_any_header_casing() {
    let ctx = RequestContext::new("DELETE", "/a.png").with_header("AUTHORIZATION", "Bearer  token-123 ");
    assert!(verify_purge_credential(Some("token-123"), ctx.header("Authorization")).is_ok());
}

#[test]
fn test_wrong_secret_is_rejected() {
    assert_eq!(
        verify_purge_credential(Some("right"), Some("Bearer wrong")),
        Err(AuthError::InvalidToken)
    );
}

#[test]
fn test_prefix_of_secret_is_rejected() {
    assert_eq!(
        verify_purge_credential(Some("secret"), Some("Bearer secr")),
        Err(AuthError::InvalidToken)
    );
}

#[test]
fn test_basic_scheme_is_not_a_bearer() {
    assert_eq!(
        verify_purge_credential(Some("secret"), Some("Basic secret")),
        Err(AuthError::MissingToken)
    );
}

#[test]
fn test_correct_secret_is_accepted() {
    assert!(verify_purge_credential(Some("secret"), Some("bearer secret")).is_ok());
}
