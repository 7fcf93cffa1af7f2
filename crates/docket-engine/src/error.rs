//! Surface error taxonomy.
//!
//! Every denial the core and the store produce maps onto one of these
//! variants; `kind()` is the stable string controllers and the CLI key
//! on. `Conflict` is the only kind retried automatically; a stale
//! `VersionMismatch` reports as the same kind but is never retried,
//! since the caller's view cannot freshen on its own.

use docket_core::{RequestAction, RequestStatus, ResolveError};
use docket_core::error::DenialKind;
use docket_store::claim::ClaimError;
use docket_store::{RequestStoreError, StoreMutationError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("action {action} is not valid in status {status}")]
    InvalidTransition {
        status: RequestStatus,
        action: RequestAction,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request {request_id} is at version {actual}, expected {expected}")]
    VersionMismatch {
        request_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestNotFound(_) => "request_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::VersionMismatch { .. } => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Only lost-race conflicts are worth an automatic retry. A
    /// version mismatch repeats identically on every attempt: the
    /// caller supplied the stale number, so retrying cannot clear it.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            DenialKind::InvalidTransition => match err {
                ResolveError::InvalidTransition(inner) => Self::InvalidTransition {
                    status: inner.status,
                    action: inner.action,
                },
                other => Self::Forbidden(other.to_string()),
            },
            _ => Self::Forbidden(err.to_string()),
        }
    }
}

impl From<ClaimError> for EngineError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::RequestNotFound(id) => Self::RequestNotFound(id),
            ClaimError::NotEligible { .. } | ClaimError::HeldByAnother { .. } => {
                Self::Forbidden(err.to_string())
            }
            ClaimError::InvalidTtl { .. } | ClaimError::TtlOverflow => {
                Self::Validation(err.to_string())
            }
            ClaimError::LockBusy { .. } => Self::Conflict(err.to_string()),
            ClaimError::LockIo { .. } | ClaimError::Store(_) => Self::Storage(err.to_string()),
        }
    }
}

impl From<RequestStoreError> for EngineError {
    fn from(err: RequestStoreError) -> Self {
        match err {
            RequestStoreError::RequestNotFound(id) => Self::RequestNotFound(id),
            RequestStoreError::RequestAlreadyExists(id) => {
                Self::Conflict(format!("request already exists: {id}"))
            }
            RequestStoreError::Journal(inner) => Self::Storage(inner.to_string()),
        }
    }
}

impl From<StoreMutationError<EngineError>> for EngineError {
    fn from(err: StoreMutationError<EngineError>) -> Self {
        match err {
            StoreMutationError::Mutation(inner) => inner,
            StoreMutationError::LockBusy { lock_path } => {
                Self::Conflict(format!("request-store lock busy: {lock_path}"))
            }
            StoreMutationError::LockIo { lock_path, message } => {
                Self::Storage(format!("lock {lock_path}: {message}"))
            }
            StoreMutationError::Store(source) => source.into(),
        }
    }
}
