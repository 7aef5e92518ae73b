// Error types module

use std::fmt;

use crate::auth::AuthError;
use crate::image_optimizer::ImageError;
use crate::storage::StoreError;

/// Public body for every 5xx response
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// Request-level error returned by the pipeline
///
/// Categorizes failures by who caused them, which decides both the HTTP
/// status and how much detail the client may see.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// Request or source image failed validation (400/413/415)
    InputRejected { status: u16, message: String },

    /// Object key is empty or the object does not exist
    NotFound,

    /// Missing or wrong purge credential
    Unauthorized,

    /// Every engine path failed; the detail is for logs only
    EngineFailure(String),

    /// Storage or other unexpected failure
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::InputRejected { message, .. } => write!(f, "Rejected: {}", message),
            ServiceError::NotFound => write!(f, "Not found"),
            ServiceError::Unauthorized => write!(f, "Unauthorized"),
            ServiceError::EngineFailure(msg) => write!(f, "Engine failure: {}", msg),
            ServiceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    pub fn to_http_status(&self) -> u16 {
        match self {
            ServiceError::InputRejected { status, .. } => *status,
            ServiceError::NotFound => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::EngineFailure(_) | ServiceError::Internal(_) => 500,
        }
    }

    /// Body text safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::InputRejected { message, .. } => message.clone(),
            ServiceError::NotFound => "Not Found".to_string(),
            ServiceError::Unauthorized => "Unauthorized".to_string(),
            ServiceError::EngineFailure(_) | ServiceError::Internal(_) => {
                INTERNAL_ERROR_BODY.to_string()
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.to_http_status() < 500
    }
}

impl From<ImageError> for ServiceError {
    fn from(err: ImageError) -> Self {
        if err.is_client_error() {
            ServiceError::InputRejected {
                status: err.to_http_status(),
                message: err.to_string(),
            }
        } else {
            ServiceError::EngineFailure(err.to_string())
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey(_) => ServiceError::NotFound,
            StoreError::TooLarge { size, max_size } => ImageError::FileTooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                max_size: usize::try_from(max_size).unwrap_or(usize::MAX),
            }
            .into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(_: AuthError) -> Self {
        ServiceError::Unauthorized
    }
}
