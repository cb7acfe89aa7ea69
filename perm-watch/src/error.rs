use thiserror::Error;

pub type PermWatchResult<T> = Result<T, PermWatchError>;

#[derive(Debug, Error)]
pub enum PermWatchError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Permission query failed: {message}")]
    RemoteQueryFailure { status: Option<u16>, message: String },

    #[error("Invalid watch target: {0}")]
    InvalidTarget(String),

    #[error("Watch registration failed: {message}")]
    RegistrationFailure { status: Option<u16>, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Drive API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error)
}

impl PermWatchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::RemoteQueryFailure { .. } => true,
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteQueryFailure { status, .. } | Self::RegistrationFailure { status, .. } => {
                *status
            }
            Self::ApiError { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None
        }
    }
}
