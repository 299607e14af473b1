//! Poolhouse Market Engine
//!
//! Pari-mutuel betting markets over the wallet ledger.
//!
//! # Architecture
//!
//! Markets are pool-based: all stakes on one market share a pool, and
//! winners split the pool (net of the platform fee) in proportion to
//! their stake. There is no order matching and no fixed odds.
//!
//! 1. **Registry**: market records, lifecycle transitions, per-market
//!    exclusive sections
//! 2. **Staking**: debit the wallet, record the stake and grow the pool
//!    as one all-or-nothing unit
//! 3. **Settlement**: split the pool among winners, idempotently
//! 4. **Query**: read-only listing projection for the UI layer
//!
//! # Lifecycle
//!
//! `Open → Closed → Settled`, or `Open → Cancelled`. Close happens
//! explicitly or lazily once the deadline has elapsed; every other
//! transition request fails.
//!
//! # Example
//!
//! ```no_run
//! use market_engine::{BettingEngine, Config};
//!
//! #[tokio::main]
//! async fn main() -> market_engine::Result<()> {
//!     let engine = BettingEngine::open(Config::default())?;
//!
//!     let markets = engine.list_markets(Default::default())?;
//!     println!("{} open markets", markets.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod query;
pub mod registry;
pub mod settle;
pub mod stake;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::BettingEngine;
pub use error::{Error, Result};
pub use types::{
    BetType, Market, MarketFilter, MarketId, MarketStatus, MarketSummary, Outcome,
    SettlementReport, Stake, StakeState,
};
