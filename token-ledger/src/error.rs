//! Error types for the ledger

use crate::types::Amount;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The first group are policy rejections: ordinary, expected outcomes of a
/// precondition check. State is left exactly as it was before the call.
/// The second group are infrastructure failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller is not the administrator
    #[error("Unauthorized: caller is not the administrator")]
    Unauthorized,

    /// Ledger is paused
    #[error("Ledger is paused")]
    Paused,

    /// Transfer of zero units
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Non-positive amount for issue/retire, or non-positive issue cap
    #[error("Invalid amount")]
    InvalidAmount,

    /// Recipient not allowed for this operation
    #[error("Invalid recipient")]
    InvalidRecipient,

    /// Caller is not an issuer
    #[error("Caller is not an issuer")]
    NotIssuer,

    /// Account is already an issuer
    #[error("Account is already registered as issuer")]
    AlreadyRegistered,

    /// Issue metadata exceeds the length bound
    #[error("Metadata too long: {len} characters (max {max})")]
    MetadataTooLong {
        /// Supplied length
        len: usize,
        /// Maximum length
        max: usize,
    },

    /// Balance does not cover the amount
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        /// Current balance
        available: Amount,
        /// Requested amount
        required: Amount,
    },

    /// Issue amount above the per-call cap
    #[error("Issue limit exceeded: {amount} > {cap}")]
    IssueLimitExceeded {
        /// Requested amount
        amount: Amount,
        /// Current cap
        cap: Amount,
    },

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (supply conservation, audit contiguity)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Journal cannot be replayed
    #[error("Journal corrupted: {0}")]
    JournalCorrupted(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for policy rejections of a single call
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized
                | Error::Paused
                | Error::ZeroAmount
                | Error::InvalidAmount
                | Error::InvalidRecipient
                | Error::NotIssuer
                | Error::AlreadyRegistered
                | Error::MetadataTooLong { .. }
                | Error::InsufficientBalance { .. }
                | Error::IssueLimitExceeded { .. }
        )
    }

    /// Stable label for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::Paused => "paused",
            Error::ZeroAmount => "zero_amount",
            Error::InvalidAmount => "invalid_amount",
            Error::InvalidRecipient => "invalid_recipient",
            Error::NotIssuer => "not_issuer",
            Error::AlreadyRegistered => "already_registered",
            Error::MetadataTooLong { .. } => "metadata_too_long",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::IssueLimitExceeded { .. } => "issue_limit_exceeded",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::JournalCorrupted(_) => "journal_corrupted",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
