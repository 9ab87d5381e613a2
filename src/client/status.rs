use crate::wire::ErrorType;

/// Lifecycle of one asynchronous operation as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(ErrorType),
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn error(&self) -> Option<ErrorType> {
        match self {
            Self::Failed(error_type) => Some(*error_type),
            _ => None,
        }
    }
}
