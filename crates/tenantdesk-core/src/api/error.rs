use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - request was rejected after token refresh")]
    Unauthorized,

    #[error("Authentication expired - no refresh token available")]
    AuthExpired,

    #[error("Session is no longer valid: {0}")]
    SessionInvalid(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Map a failure status to an error. 401 handling is the client's job,
    /// so here it only means a terminal rejection.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            code => ApiError::ServerError {
                status: code,
                message: Self::truncate_body(body),
            },
        }
    }

    /// HTTP status carried by the error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => Some(401),
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the user has to log in again
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::AuthExpired | ApiError::SessionInvalid(_)
        )
    }
}
