//! Error types for the market engine

use thiserror::Error;

use crate::types::MarketStatus;

/// Result type for market operations
pub type Result<T> = std::result::Result<T, Error>;

/// Market engine errors
///
/// Every failure is returned as a typed result to the caller; lifecycle
/// violations leave no state change, and storage failures commit nothing
/// so the operation is safe to retry.
#[derive(Error, Debug)]
pub enum Error {
    /// Wallet ledger error (insufficient funds, unknown account, ...)
    #[error("Ledger error: {0}")]
    Ledger(#[from] wallet_ledger::Error),

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Stake rejected because the market no longer accepts stakes
    #[error("Market closed: {0}")]
    MarketClosed(String),

    /// Requested lifecycle edge is not legal
    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Status the market is in
        from: MarketStatus,
        /// Status that was requested
        to: MarketStatus,
    },

    /// Settlement requested on a market that was already settled with a
    /// different outcome, or on a cancelled market
    #[error("Market already settled: {0}")]
    AlreadySettled(String),

    /// Settlement requested before the market closed
    #[error("Market not yet closed: {0}")]
    NotYetClosed(String),

    /// Stake parameters rejected (non-positive amount, empty outcome)
    #[error("Invalid stake: {0}")]
    InvalidStake(String),

    /// Market parameters rejected at creation
    #[error("Invalid market: {0}")]
    InvalidMarket(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

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
