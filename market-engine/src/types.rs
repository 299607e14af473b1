//! Core types for betting markets
//!
//! Money fields are `Decimal` throughout; payout arithmetic never touches
//! floating point.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use wallet_ledger::AccountId;

/// Market identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId(Uuid);

impl MarketId {
    /// Generate a fresh market ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Raw bytes (storage key)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An outcome label a stake can be placed on
///
/// Outcomes are free-form labels; binary markets conventionally carry two
/// of them ("yes"/"no").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome(String);

impl Outcome {
    /// Wrap an outcome label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the label is usable
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BetType {
    /// Two outcomes
    Binary = 1,
    /// More than two outcomes
    MultiOutcome = 2,
}

impl BetType {
    /// Parse from string, `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "binary" => Some(BetType::Binary),
            "multi" | "multi_outcome" => Some(BetType::MultiOutcome),
            _ => None,
        }
    }

    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Binary => "binary",
            BetType::MultiOutcome => "multi_outcome",
        }
    }
}

/// Market lifecycle status
///
/// Transitions are monotonic and one-directional:
/// `Open → Closed → Settled`, with `Open → Cancelled` as the only other
/// legal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MarketStatus {
    /// Accepting stakes
    Open = 1,
    /// Deadline passed or explicitly closed, awaiting settlement
    Closed = 2,
    /// Outcome determined, pool distributed (terminal)
    Settled = 3,
    /// Cancelled from open, all stakes refunded (terminal)
    Cancelled = 4,
}

impl MarketStatus {
    /// Whether `self -> to` is a legal lifecycle edge
    pub fn can_transition(self, to: MarketStatus) -> bool {
        matches!(
            (self, to),
            (MarketStatus::Open, MarketStatus::Closed)
                | (MarketStatus::Closed, MarketStatus::Settled)
                | (MarketStatus::Open, MarketStatus::Cancelled)
        )
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, MarketStatus::Settled | MarketStatus::Cancelled)
    }

    /// Parse from string, `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" | "active" => Some(MarketStatus::Open),
            "closed" => Some(MarketStatus::Closed),
            "settled" => Some(MarketStatus::Settled),
            "cancelled" => Some(MarketStatus::Cancelled),
            _ => None,
        }
    }
}

/// A pool-based betting market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Unique market ID
    pub id: MarketId,

    /// Market title
    pub title: String,

    /// Longer description for listings
    pub description: String,

    /// Kind of market
    pub bet_type: BetType,

    /// Lifecycle status
    pub status: MarketStatus,

    /// Sum of all non-refunded stake amounts
    pub total_pool: Decimal,

    /// Distinct accounts with at least one stake
    pub participant_count: u64,

    /// Deadline after which no new stakes are accepted
    pub close_time: DateTime<Utc>,

    /// Winning outcome (set at settlement)
    pub outcome: Option<Outcome>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Market {
    /// Create a new open market
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        bet_type: BetType,
        close_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MarketId::generate(),
            title: title.into(),
            description: description.into(),
            bet_type,
            status: MarketStatus::Open,
            total_pool: Decimal::ZERO,
            participant_count: 0,
            close_time,
            outcome: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the deadline has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.close_time
    }

    /// Listing projection
    pub fn summary(&self) -> MarketSummary {
        MarketSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            bet_type: self.bet_type,
            status: self.status,
            total_pool: self.total_pool,
            participant_count: self.participant_count,
            close_time: self.close_time,
            created_at: self.created_at,
        }
    }
}

/// State of a stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StakeState {
    /// Funds committed, market not yet resolved
    Active = 1,
    /// Stake was on the winning outcome, payout credited
    Won = 2,
    /// Stake was on a losing outcome, funds forfeited
    Lost = 3,
    /// Stake returned in full (cancellation or zero-winner settlement)
    Refunded = 4,
}

/// A user's commitment of funds to one outcome of a market
///
/// A stake's existence and the ledger debit that funded it are one atomic
/// fact; neither is ever observed without the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stake {
    /// Unique stake ID
    pub id: Uuid,

    /// Staking account
    pub account_id: AccountId,

    /// Market staked on
    pub market_id: MarketId,

    /// Chosen outcome
    pub outcome: Outcome,

    /// Stake amount (debited at creation)
    pub amount: Decimal,

    /// Stake state
    pub state: StakeState,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Stake {
    /// Create an active stake
    pub fn new(
        account_id: AccountId,
        market_id: MarketId,
        outcome: Outcome,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            market_id,
            outcome,
            amount,
            state: StakeState::Active,
            created_at: Utc::now(),
        }
    }
}

/// A single payout or refund issued during settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerCredit {
    /// Credited account
    pub account_id: AccountId,

    /// Stake the credit belongs to
    pub stake_id: Uuid,

    /// Credited amount
    pub amount: Decimal,
}

/// Result of settling one market
///
/// Persisted so that repeated settlement calls return the original report
/// without re-crediting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Settled market
    pub market_id: MarketId,

    /// Winning outcome
    pub winning_outcome: Outcome,

    /// Pool at settlement time
    pub total_pool: Decimal,

    /// Platform fee retained (includes rounding residue)
    pub fee: Decimal,

    /// Pool distributed to winners
    pub net_pool: Decimal,

    /// Credits issued
    pub credits: Vec<WinnerCredit>,

    /// True when nobody picked the winning outcome and all stakes were
    /// refunded in full with no fee
    pub refunded: bool,

    /// Settlement timestamp
    pub settled_at: DateTime<Utc>,
}

impl SettlementReport {
    /// Total amount credited by this settlement
    pub fn total_credited(&self) -> Decimal {
        self.credits.iter().map(|c| c.amount).sum()
    }
}

/// Market listing projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    /// Market ID
    pub id: MarketId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Kind of market
    pub bet_type: BetType,
    /// Lifecycle status
    pub status: MarketStatus,
    /// Current pool
    pub total_pool: Decimal,
    /// Distinct stakers
    pub participant_count: u64,
    /// Stake deadline
    pub close_time: DateTime<Utc>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Listing filter
///
/// Malformed filter parameters are defaulted rather than rejected: an
/// unknown status string falls back to `Open`, an unknown bet type to no
/// bet-type filter at all.
#[derive(Debug, Clone)]
pub struct MarketFilter {
    /// Only markets of this type (None = all)
    pub bet_type: Option<BetType>,

    /// Only markets in this status (None = all)
    pub status: Option<MarketStatus>,

    /// Maximum results
    pub limit: usize,

    /// Results to skip
    pub offset: usize,
}

impl Default for MarketFilter {
    fn default() -> Self {
        Self {
            bet_type: None,
            status: Some(MarketStatus::Open),
            limit: 50,
            offset: 0,
        }
    }
}

impl MarketFilter {
    /// Build a filter from raw string parameters, defaulting anything
    /// malformed
    pub fn from_params(
        bet_type: Option<&str>,
        status: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Self {
        let default = Self::default();
        Self {
            bet_type: bet_type.and_then(BetType::parse),
            status: match status {
                Some(s) => MarketStatus::parse(s).or(default.status),
                None => default.status,
            },
            limit: limit.unwrap_or(default.limit),
            offset: offset.unwrap_or(0),
        }
    }
}
