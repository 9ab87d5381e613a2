use crate::client::persistence::PersistenceError;
use crate::wire::{CredentialsError, ErrorType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("server rejected request ({status} {error_type}): {message}")]
    Api {
        status: u16,
        error_type: ErrorType,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("token storage error: {0}")]
    Persistence(String),

    #[error("not logged in")]
    NotAuthenticated,

    #[error("request already in flight")]
    Busy,
}

impl ClientError {
    /// Category shown to the user.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Validation(_) => ErrorType::Validation,
            Self::Api { error_type, .. } => *error_type,
            Self::NotAuthenticated => ErrorType::Unauthorized,
            Self::Persistence(_) => ErrorType::Internal,
            Self::Transport(_) | Self::Busy => ErrorType::Unknown,
        }
    }

    /// The server answered and refused; retrying the same request is pointless.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }
}

impl From<CredentialsError> for ClientError {
    fn from(err: CredentialsError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::Transport(format!("bad url: {}", err))
    }
}

impl From<PersistenceError> for ClientError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err.to_string())
    }
}
