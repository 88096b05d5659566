//! Service-layer error taxonomy.

use guideforge_core::{AccessDenied, OrderingError};
use guideforge_metadata::MetadataError;
use guideforge_storage::StorageError;
use thiserror::Error;

/// Failure kinds a caller can act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
    InvalidArgument,
    StorageFailure,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or bad credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The principal is known but fails the ownership check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("step {step_id} does not belong to manual {manual_id}")]
    ForeignStep { step_id: i64, manual_id: i64 },

    #[error("storage failure while {context}")]
    Storage {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthenticated(_) | Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidArgument(_) | Self::ForeignStep { .. } => ErrorKind::InvalidArgument,
            Self::Storage { .. } => ErrorKind::StorageFailure,
        }
    }

    /// Message without the kind prefix, safe to show to clients. Storage
    /// failures only name what was being done.
    pub fn detail(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Unauthenticated(msg)
            | Self::Unauthorized(msg)
            | Self::Conflict(msg)
            | Self::InvalidArgument(msg) => msg.clone(),
            Self::ForeignStep { .. } | Self::Storage { .. } => self.to_string(),
        }
    }

    pub(crate) fn storage(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wrap a metadata error, keeping the kinds callers can act on.
    pub(crate) fn metadata(context: impl Into<String>, err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::AlreadyExists(what) => Self::Conflict(what),
            MetadataError::Ordering(e) => e.into(),
            other => Self::storage(context, other),
        }
    }

    /// Wrap a blob store error. A missing blob is reported as `NotFound`.
    pub(crate) fn blob(context: impl Into<String>, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => Self::NotFound(format!("blob {key}")),
            StorageError::InvalidKey(key) => Self::InvalidArgument(key),
            other => Self::storage(context, other),
        }
    }
}

impl From<AccessDenied> for ServiceError {
    fn from(e: AccessDenied) -> Self {
        Self::Unauthorized(e.to_string())
    }
}

impl From<OrderingError> for ServiceError {
    fn from(e: OrderingError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<guideforge_core::Error> for ServiceError {
    fn from(e: guideforge_core::Error) -> Self {
        use guideforge_core::Error;
        match e {
            Error::Validation { .. } => Self::InvalidArgument(e.to_string()),
            Error::InvalidToken(_) | Error::TokenExpired => Self::Unauthenticated(e.to_string()),
            Error::PasswordHash(_) | Error::Config(_) => Self::storage("processing credentials", e),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
