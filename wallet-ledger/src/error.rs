//! Error types for the wallet ledger

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::AccountId;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Debit attempted beyond the available balance.
    /// No state change was made; safe to surface to the user.
    #[error("Insufficient funds on {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Account that was debited
        account: AccountId,
        /// Amount requested
        requested: Decimal,
        /// Balance at the time of the attempt
        available: Decimal,
    },

    /// Amount was zero or negative
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Decimal),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists for this user
    #[error("Account already exists for user: {0}")]
    AccountExists(String),

    /// Account is archived and can no longer transact
    #[error("Account is archived: {0}")]
    AccountArchived(AccountId),

    /// Storage error (RocksDB). The failed batch committed nothing,
    /// so the operation is safe to retry.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (cached balance diverged from the log, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
