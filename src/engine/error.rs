use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;

/// Failures of the engine and of the storage boundary behind it.
///
/// A taken or stale slot is not an error; see `service::Admission`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("invalid tenant: {0}")]
    InvalidTenant(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository failure: {0}")]
    Repository(String),
}
