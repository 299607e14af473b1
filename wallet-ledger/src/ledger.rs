//! Main ledger API
//!
//! Ties storage, per-account locking and metrics into the debit/credit
//! interface the betting engine drives.
//!
//! # Concurrency
//!
//! Every mutation of one account happens under that account's entry in
//! a lock table, making all operations on one account linearizable.
//! Operations on different accounts interleave freely. The lock is held
//! for the whole read-modify-write, and the transaction record plus the
//! cached balance commit in a single atomic storage batch, so a reader
//! can never observe a balance that omits a committed transaction.
//!
//! # Example
//!
//! ```no_run
//! use wallet_ledger::{Config, Currency, Ledger, TxnReason};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> wallet_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let account = ledger.create_account("user-1", Currency::USD)?;
//!     ledger
//!         .credit(account.id, Decimal::new(100_00, 2), TxnReason::Deposit, None)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    storage::Storage,
    types::{Account, AccountId, Currency, LedgerTransaction, TxnReason},
    Config, Error, Result,
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Storage backend
    storage: Arc<Storage>,

    /// Per-account exclusive sections
    locks: DashMap<AccountId, Arc<Mutex<()>>>,

    /// Serializes account creation (user uniqueness check + write)
    create_guard: parking_lot::Mutex<()>,

    /// Metrics collector
    metrics: Metrics,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        Ok(Self {
            storage,
            locks: DashMap::new(),
            create_guard: parking_lot::Mutex::new(()),
            metrics: Metrics::new()
                .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?,
        })
    }

    /// Open with a shared storage handle (for tests and embedding)
    pub fn with_storage(storage: Arc<Storage>) -> Result<Self> {
        Ok(Self {
            storage,
            locks: DashMap::new(),
            create_guard: parking_lot::Mutex::new(()),
            metrics: Metrics::new()
                .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?,
        })
    }

    fn lock_for(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a zero-balance account for a user
    ///
    /// Called exactly once per user at registration. A second call for
    /// the same user fails with [`Error::AccountExists`].
    pub fn create_account(
        &self,
        user_id: impl Into<String>,
        currency: Currency,
    ) -> Result<Account> {
        let user_id = user_id.into();

        let _guard = self.create_guard.lock();

        if self.storage.account_for_user(&user_id)?.is_some() {
            return Err(Error::AccountExists(user_id));
        }

        let account = Account::new(user_id, currency);
        self.storage.create_account_atomic(&account)?;
        self.metrics.record_account_created();

        tracing::info!(
            account_id = %account.id,
            user_id = %account.user_id,
            currency = %account.currency,
            "Account created"
        );

        Ok(account)
    }

    /// Debit an account
    ///
    /// Fails with [`Error::InsufficientFunds`] (no state change) when the
    /// balance does not cover the amount. Archived accounts reject debits.
    pub async fn debit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        reason: TxnReason,
        market_ref: Option<Uuid>,
    ) -> Result<LedgerTransaction> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let timer = std::time::Instant::now();
        let mut account = self.storage.get_account(account_id)?;

        if account.archived {
            return Err(Error::AccountArchived(account_id));
        }

        if account.balance < amount {
            self.metrics.record_debit_rejected();
            return Err(Error::InsufficientFunds {
                account: account_id,
                requested: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        let txn =
            LedgerTransaction::debit(account_id, amount, reason, market_ref, account.balance);

        self.storage.apply_transaction_atomic(&txn, &account)?;
        self.metrics.record_transaction(timer.elapsed().as_secs_f64());

        Ok(txn)
    }

    /// Credit an account
    ///
    /// Credits are accepted on archived accounts too: settlement refunds
    /// must land even when the user has since been archived.
    pub async fn credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        reason: TxnReason,
        market_ref: Option<Uuid>,
    ) -> Result<LedgerTransaction> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let timer = std::time::Instant::now();
        let mut account = self.storage.get_account(account_id)?;

        account.balance += amount;
        let txn =
            LedgerTransaction::credit(account_id, amount, reason, market_ref, account.balance);

        self.storage.apply_transaction_atomic(&txn, &account)?;
        self.metrics.record_transaction(timer.elapsed().as_secs_f64());

        Ok(txn)
    }

    /// Get account record
    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.storage.get_account(account_id)
    }

    /// Get cached balance
    pub fn balance(&self, account_id: AccountId) -> Result<Decimal> {
        Ok(self.storage.get_account(account_id)?.balance)
    }

    /// Look up the account created for a user, if any
    pub fn account_for_user(&self, user_id: &str) -> Result<Option<Account>> {
        match self.storage.account_for_user(user_id)? {
            Some(id) => Ok(Some(self.storage.get_account(id)?)),
            None => Ok(None),
        }
    }

    /// Full transaction history for an account, oldest first
    pub fn account_transactions(&self, account_id: AccountId) -> Result<Vec<LedgerTransaction>> {
        self.storage.account_transactions(account_id)
    }

    /// Archive an account (history kept, further debits rejected)
    pub async fn archive_account(&self, account_id: AccountId) -> Result<()> {
        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let mut account = self.storage.get_account(account_id)?;
        account.archived = true;
        self.storage.put_account(&account)?;

        tracing::info!(account_id = %account_id, "Account archived");

        Ok(())
    }

    /// Audit: verify the cached balance equals the sum of the log
    pub async fn verify_balance(&self, account_id: AccountId) -> Result<()> {
        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let account = self.storage.get_account(account_id)?;
        let total: Decimal = self
            .storage
            .account_transactions(account_id)?
            .iter()
            .map(|t| t.amount)
            .sum();

        if total != account.balance {
            return Err(Error::InvariantViolation(format!(
                "Account {} cached balance {} != transaction sum {}",
                account_id, account.balance, total
            )));
        }

        Ok(())
    }

    /// Flush storage to disk (shutdown path)
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }

    /// Metrics registry for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
