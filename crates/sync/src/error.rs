#![forbid(unsafe_code)]

use ritual_core::{RemoteError, ValidationError};
use ritual_storage::StoreError;

#[derive(Debug)]
pub enum SyncError {
    /// The mutation was malformed and nothing was queued.
    Validation(ValidationError),
    /// The local database failed; the operation did not take effect.
    Storage(StoreError),
    TransientSync(String),
    PermanentSync(String),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Storage(_) => "STORAGE",
            Self::TransientSync(_) => "TRANSIENT_SYNC",
            Self::PermanentSync(_) => "PERMANENT_SYNC",
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation: {err}"),
            Self::Storage(err) => write!(f, "local storage: {err}"),
            Self::TransientSync(message) => write!(f, "sync unavailable: {message}"),
            Self::PermanentSync(message) => write!(f, "sync rejected: {message}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for SyncError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::Unavailable(message) => Self::TransientSync(message),
            RemoteError::Rejected(message) => Self::PermanentSync(message),
        }
    }
}
