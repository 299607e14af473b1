//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money, never floats)
//! - Append-only auditability (transactions are immutable facts)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh account ID
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

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Kenyan Shilling
    KES,
    /// Nigerian Naira
    NGN,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::KES => "KES",
            Currency::NGN => "NGN",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "KES" => Some(Currency::KES),
            "NGN" => Some(Currency::NGN),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A user's funds holder
///
/// The balance field is a cached derived value: the transaction log is
/// authoritative, and the cache is only ever updated in the same atomic
/// write as the transaction that changed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    pub id: AccountId,

    /// Owning user (one account per user)
    pub user_id: String,

    /// Account currency
    pub currency: Currency,

    /// Cached balance (never negative)
    pub balance: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Archived accounts keep their history but reject new debits
    pub archived: bool,
}

impl Account {
    /// Create a zero-balance account for a user
    pub fn new(user_id: impl Into<String>, currency: Currency) -> Self {
        Self {
            id: AccountId::generate(),
            user_id: user_id.into(),
            currency,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
            archived: false,
        }
    }
}

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxnReason {
    /// Funds committed to a market pool
    Stake = 1,
    /// Winnings credited after settlement
    Payout = 2,
    /// Stake returned (cancellation or zero-winner settlement)
    Refund = 3,
    /// Funds gateway credit (confirmed external deposit)
    Deposit = 4,
    /// Funds gateway debit (confirmed external withdrawal)
    Withdrawal = 5,
    /// Compensating entry undoing a committed transaction after a
    /// failed multi-store operation
    Reversal = 6,
}

impl fmt::Display for TxnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnReason::Stake => "stake",
            TxnReason::Payout => "payout",
            TxnReason::Refund => "refund",
            TxnReason::Deposit => "deposit",
            TxnReason::Withdrawal => "withdrawal",
            TxnReason::Reversal => "reversal",
        };
        write!(f, "{}", s)
    }
}

/// Immutable record of a single atomic balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Account whose balance changed
    pub account_id: AccountId,

    /// Signed amount (negative = debit, positive = credit)
    pub amount: Decimal,

    /// Reason for the change
    pub reason: TxnReason,

    /// Related market, if any
    pub market_ref: Option<Uuid>,

    /// Transaction timestamp
    pub timestamp: DateTime<Utc>,

    /// Balance snapshot after this transaction committed
    pub balance_after: Decimal,
}

impl LedgerTransaction {
    /// Build a debit record (amount stored negative)
    pub fn debit(
        account_id: AccountId,
        amount: Decimal,
        reason: TxnReason,
        market_ref: Option<Uuid>,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            amount: -amount,
            reason,
            market_ref,
            timestamp: Utc::now(),
            balance_after,
        }
    }

    /// Build a credit record
    pub fn credit(
        account_id: AccountId,
        amount: Decimal,
        reason: TxnReason,
        market_ref: Option<Uuid>,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            amount,
            reason,
            market_ref,
            timestamp: Utc::now(),
            balance_after,
        }
    }

    /// Whether this transaction reduced the balance
    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}
