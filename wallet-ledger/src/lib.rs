//! Poolhouse Wallet Ledger
//!
//! Per-account balance ledger with an append-only transaction log.
//!
//! # Architecture
//!
//! - **Append-only log**: Every balance change is an immutable record
//! - **Derived balance**: The cached balance is maintained in the same
//!   atomic write as the transaction that changed it
//! - **Per-account serialization**: A lock table keyed by account id
//!   makes all operations on one account linearizable
//! - **Atomic storage**: Transaction, balance and indices commit in a
//!   single RocksDB `WriteBatch`
//!
//! # Invariants
//!
//! - Balance never negative: debits beyond the balance are rejected
//! - Balance == Σ(transaction amounts) for all time
//! - Append-only: transactions never modified or deleted
//! - One account per user, created exactly once

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use types::{Account, AccountId, Currency, LedgerTransaction, TxnReason};
