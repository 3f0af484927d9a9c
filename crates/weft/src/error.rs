use thiserror::Error;

/// Failure of a single field resolution, loader key, or association slot.
///
/// `Clone` so one batch failure can be handed to every waiter on that batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeftError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("read scope failure: {message}")]
    Scope { message: String },
    #[error("fetch failure: {message}")]
    Fetch { message: String },
    #[error("request cancelled")]
    Cancelled,
}

impl WeftError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn scope(message: impl Into<String>) -> Self {
        Self::Scope {
            message: message.into(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type WeftResult<T> = Result<T, WeftError>;
