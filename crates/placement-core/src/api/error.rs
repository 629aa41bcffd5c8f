use thiserror::Error;

/// Message shown when the token endpoint rejects a login with an empty body
pub const GENERIC_LOGIN_FAILURE: &str = "Login failed";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - session is no longer valid")]
    Unauthorized,

    #[error("{0}")]
    LoginRejected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Build the error for a rejected login. The backend's own text is surfaced
    /// verbatim so the user sees why the credentials were refused.
    pub fn login_rejected(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            ApiError::LoginRejected(GENERIC_LOGIN_FAILURE.to_string())
        } else {
            ApiError::LoginRejected(Self::truncate_body(trimmed))
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Short text suitable for a status line
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Session expired - please log in again".to_string(),
            ApiError::LoginRejected(text) => text.clone(),
            ApiError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::Network(_) => "Unable to reach the server".to_string(),
            other => format!("Request failed: {}", other),
        }
    }
}
