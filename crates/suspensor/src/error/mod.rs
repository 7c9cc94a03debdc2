use std::fmt;
use std::sync::Arc;

use thiserror::Error as ThisError;

use crate::resource::{ResourceId, Suspension};

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum SuspensorError {
    #[error("Impossible resource state: {0}")]
    ImpossibleState(String),

    #[error("Resource {0} was abandoned before it settled")]
    Abandoned(ResourceId),
}

impl SuspensorError {
    pub fn impossible(message: impl Into<String>) -> Self {
        Self::ImpossibleState(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::ImpossibleState(_) => "IMPOSSIBLE_STATE",
            Self::Abandoned(_) => "ABANDONED",
        }
    }
}

/// Why a read did not produce a value.
///
/// `Suspended` is flow control: the caller retries once the carried
/// [`Suspension`] resolves. `OperationFailed` holds the payload the operation
/// rejected with, shared so every reader sees the same object.
pub enum ReadError<E> {
    Suspended(Suspension),
    OperationFailed(Arc<E>),
}

impl<E> ReadError<E> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            Self::Suspended(suspension) => Some(suspension),
            Self::OperationFailed(_) => None,
        }
    }

    pub fn into_failure(self) -> Option<Arc<E>> {
        match self {
            Self::Suspended(_) => None,
            Self::OperationFailed(error) => Some(error),
        }
    }
}

impl<E> Clone for ReadError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Suspended(suspension) => Self::Suspended(suspension.clone()),
            Self::OperationFailed(error) => Self::OperationFailed(Arc::clone(error)),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended(suspension) => f.debug_tuple("Suspended").field(suspension).finish(),
            Self::OperationFailed(error) => f.debug_tuple("OperationFailed").field(error).finish(),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended(suspension) => {
                write!(f, "Resource {} is not ready yet", suspension.resource())
            }
            Self::OperationFailed(error) => write!(f, "Operation failed: {error:?}"),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for ReadError<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    #[test]
    fn test_error_codes() {
        assert_eq!(SuspensorError::impossible("boom").code(), "IMPOSSIBLE_STATE");

        let (resource, _settle) = Resource::<u8, String>::deferred();
        assert_eq!(SuspensorError::Abandoned(resource.id()).code(), "ABANDONED");
    }

    #[test]
    fn test_read_error_display() {
        let failed: ReadError<String> = ReadError::OperationFailed(Arc::new("404".to_string()));
        assert_eq!(failed.to_string(), "Operation failed: \"404\"");
        assert!(!failed.is_suspended());

        let (resource, _settle) = Resource::<u8, String>::deferred();
        let suspended = resource.try_read().unwrap_err();
        assert!(suspended.is_suspended());
        assert!(suspended.to_string().contains("is not ready yet"));
        assert!(suspended.into_failure().is_none());
    }
}
