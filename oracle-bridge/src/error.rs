//! Error types for the bridge

use crate::types::RequestId;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Registry or override call from a non-owner identity
    #[error("Caller is not the owner")]
    NotOwner,

    /// Direct submission from an identity outside the operator allow-list
    #[error("Caller is not an authorized oracle")]
    NotAuthorizedOracle,

    /// Screening requested by a caller outside the requester allow-list
    #[error("Caller is not an authorized requester")]
    NotAuthorizedRequester,

    /// Signature does not recover to an authorized operator
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed message already consumed
    #[error("Signature already used")]
    SignatureAlreadyUsed,

    /// Request id was never issued
    #[error("Screening not found: {0}")]
    ScreeningNotFound(RequestId),

    /// Request already has an accepted result
    #[error("Screening already completed: {0}")]
    ScreeningAlreadyCompleted(RequestId),

    /// Request was expired by the owner
    #[error("Screening expired: {0}")]
    ScreeningExpired(RequestId),

    /// Expiry requested before the request outlived its TTL
    #[error("Screening not stale yet: {0}")]
    ScreeningNotStale(RequestId),

    /// Required identity argument is empty
    #[error("Zero address: {0}")]
    ZeroAddress(&'static str),

    /// Unparseable identity
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotOwner => "not_owner",
            Error::NotAuthorizedOracle => "not_authorized_oracle",
            Error::NotAuthorizedRequester => "not_authorized_requester",
            Error::InvalidSignature => "invalid_signature",
            Error::SignatureAlreadyUsed => "signature_already_used",
            Error::ScreeningNotFound(_) => "screening_not_found",
            Error::ScreeningAlreadyCompleted(_) => "screening_already_completed",
            Error::ScreeningExpired(_) => "screening_expired",
            Error::ScreeningNotStale(_) => "screening_not_stale",
            Error::ZeroAddress(_) => "zero_address",
            Error::InvalidAddress(_) => "invalid_address",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Concurrency(_) => "concurrency",
            Error::Io(_) => "io",
        }
    }
}

/// Failure reported by a compliance sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Transfer Ledger unreachable or its queue is full
    #[error("Compliance sink unavailable: {0}")]
    Unavailable(String),

    /// Transfer Ledger refused the update
    #[error("Compliance sink rejected update: {0}")]
    Rejected(String),
}
