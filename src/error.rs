use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    /// Local form validation failed; no request was sent.
    #[error("{0}")]
    Validation(String),
    /// Transport failure or an upstream error without a more specific status.
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Maps a failed API status onto the error taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            422 => Self::UnprocessableEntity(message),
            _ => Self::Dependency(message),
        }
    }

    /// Text shown to the user in a toast.
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::UnprocessableEntity(message)
            | Self::Validation(message)
            | Self::Dependency(message)
            | Self::Internal(message) => message.trim(),
        };
        if message.is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message.to_string()
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(format!("Unexpected response payload: {error}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Internal(format!("Local storage error: {error}"))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication token not found. Please log in again.")]
    Missing,
    #[error("Invalid authentication token.")]
    Malformed(String),
    #[error("Session expired. Please log in again.")]
    Expired { expired_at: i64 },
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        Self::Unauthorized(error.to_string())
    }
}
