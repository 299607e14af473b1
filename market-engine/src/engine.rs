//! Engine facade wiring the ledger, registry, staking, settlement and
//! query services together
//!
//! [`BettingEngine`] is the single entry point an embedding service (HTTP
//! layer, CLI, test harness) talks to. It owns both stores, shares one
//! metrics registry across the write path, and exposes the full operation
//! surface: account management, wallet funding, market lifecycle, staking
//! and settlement.

use crate::{
    config::Config,
    metrics::Metrics,
    query::MarketQuery,
    registry::MarketRegistry,
    settle::SettlementEngine,
    stake::StakeEngine,
    store::MarketStore,
    types::{
        BetType, Market, MarketFilter, MarketId, MarketSummary, Outcome, SettlementReport, Stake,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::{Account, AccountId, Currency, Ledger, LedgerTransaction, TxnReason};

/// Betting engine facade
pub struct BettingEngine {
    /// Wallet ledger
    ledger: Arc<Ledger>,

    /// Market registry
    registry: Arc<MarketRegistry>,

    /// Stake engine
    stakes: StakeEngine,

    /// Settlement engine
    settlement: SettlementEngine,

    /// Listing queries
    query: MarketQuery,

    /// Metrics collector
    metrics: Metrics,
}

impl std::fmt::Debug for BettingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BettingEngine").finish_non_exhaustive()
    }
}

impl BettingEngine {
    /// Open both stores and wire up the engine
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let ledger_config = wallet_ledger::Config {
            data_dir: config.ledger_data_dir.clone(),
            ..wallet_ledger::Config::default()
        };
        let ledger = Arc::new(Ledger::open(ledger_config)?);

        let store = Arc::new(MarketStore::open(&config)?);
        Self::assemble(ledger, store, config)
    }

    /// Wire the engine over already-open stores (tests and embedding)
    pub fn with_stores(ledger: Arc<Ledger>, store: Arc<MarketStore>, config: Config) -> Result<Self> {
        config.validate()?;
        Self::assemble(ledger, store, config)
    }

    fn assemble(ledger: Arc<Ledger>, store: Arc<MarketStore>, config: Config) -> Result<Self> {
        let registry = Arc::new(MarketRegistry::new(store.clone()));
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let stakes = StakeEngine::new(registry.clone(), ledger.clone(), metrics.clone());
        let settlement = SettlementEngine::new(
            registry.clone(),
            ledger.clone(),
            config.fee_rate,
            metrics.clone(),
        );
        let query = MarketQuery::new(store, config.query.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            fee_rate = %config.fee_rate,
            "Betting engine started"
        );

        Ok(Self {
            ledger,
            registry,
            stakes,
            settlement,
            query,
            metrics,
        })
    }

    // Accounts

    /// Create the wallet account for a newly registered user
    pub fn create_account(&self, user_id: impl Into<String>, currency: Currency) -> Result<Account> {
        Ok(self.ledger.create_account(user_id, currency)?)
    }

    /// Look up the account for a user, if one exists
    pub fn account_for_user(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.ledger.account_for_user(user_id)?)
    }

    /// Current balance of an account
    pub fn balance(&self, account_id: AccountId) -> Result<Decimal> {
        Ok(self.ledger.balance(account_id)?)
    }

    /// Full transaction history for an account, oldest first
    pub fn account_transactions(&self, account_id: AccountId) -> Result<Vec<LedgerTransaction>> {
        Ok(self.ledger.account_transactions(account_id)?)
    }

    /// Credit external funds into a wallet
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<LedgerTransaction> {
        Ok(self
            .ledger
            .credit(account_id, amount, TxnReason::Deposit, None)
            .await?)
    }

    /// Debit funds out of a wallet
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<LedgerTransaction> {
        Ok(self
            .ledger
            .debit(account_id, amount, TxnReason::Withdrawal, None)
            .await?)
    }

    // Markets

    /// Create a new open market
    pub fn create_market(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        bet_type: BetType,
        close_time: DateTime<Utc>,
    ) -> Result<Market> {
        self.registry.create(title, description, bet_type, close_time)
    }

    /// Explicitly close an open market
    pub async fn close_market(&self, market_id: MarketId) -> Result<Market> {
        self.registry.close(market_id).await
    }

    /// Get a market record
    pub fn get_market(&self, market_id: MarketId) -> Result<Market> {
        self.registry.get(market_id)
    }

    /// List markets matching a filter, newest first
    pub fn list_markets(&self, filter: MarketFilter) -> Result<Vec<MarketSummary>> {
        self.query.list_markets(&filter)
    }

    // Staking and settlement

    /// Place a stake on one outcome of a market
    pub async fn place_stake(
        &self,
        account_id: AccountId,
        market_id: MarketId,
        outcome: Outcome,
        amount: Decimal,
    ) -> Result<Stake> {
        self.stakes.place_stake(account_id, market_id, outcome, amount).await
    }

    /// Settle a closed market with its winning outcome
    pub async fn settle_market(
        &self,
        market_id: MarketId,
        winning_outcome: Outcome,
    ) -> Result<SettlementReport> {
        self.settlement.settle(market_id, winning_outcome).await
    }

    /// Cancel an open market, refunding every stake
    pub async fn cancel_market(&self, market_id: MarketId) -> Result<()> {
        self.settlement.cancel(market_id).await
    }

    /// The settlement report for a market, if settled
    pub fn settlement_report(&self, market_id: MarketId) -> Result<Option<SettlementReport>> {
        self.registry.store().get_report(market_id)
    }

    // Lifecycle and observability

    /// Flush both stores before process exit
    pub fn shutdown(&self) -> Result<()> {
        self.ledger.flush()?;
        self.registry.store().flush()?;

        tracing::info!("Betting engine shut down");

        Ok(())
    }

    /// Engine metrics registry for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Ledger handle (audit tooling)
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_engine() -> (BettingEngine, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = Config {
            ledger_data_dir: temp.path().join("ledger"),
            market_data_dir: temp.path().join("markets"),
            ..Config::default()
        };
        (BettingEngine::open(config).unwrap(), temp)
    }

    #[tokio::test]
    async fn test_deposit_withdraw_roundtrip() {
        let (engine, _temp) = test_engine();

        let account = engine.create_account("user-1", Currency::USD).unwrap();
        engine
            .deposit(account.id, Decimal::new(100_00, 2))
            .await
            .unwrap();
        engine
            .withdraw(account.id, Decimal::new(30_00, 2))
            .await
            .unwrap();

        assert_eq!(
            engine.balance(account.id).unwrap(),
            Decimal::new(70_00, 2)
        );
        assert_eq!(engine.account_transactions(account.id).unwrap().len(), 2);

        engine.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_account_created_once_per_user() {
        let (engine, _temp) = test_engine();

        engine.create_account("user-1", Currency::USD).unwrap();
        let err = engine.create_account("user-1", Currency::USD).unwrap_err();
        assert!(matches!(
            err,
            Error::Ledger(wallet_ledger::Error::AccountExists(_))
        ));

        assert!(engine.account_for_user("user-1").unwrap().is_some());
        assert!(engine.account_for_user("nobody").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_market_round() {
        let (engine, _temp) = test_engine();

        let alice = engine.create_account("alice", Currency::USD).unwrap();
        let bob = engine.create_account("bob", Currency::USD).unwrap();
        engine
            .deposit(alice.id, Decimal::new(1000_00, 2))
            .await
            .unwrap();
        engine
            .deposit(bob.id, Decimal::new(1000_00, 2))
            .await
            .unwrap();

        let market = engine
            .create_market(
                "Will it rain tomorrow?",
                "",
                BetType::Binary,
                Utc::now() + Duration::hours(1),
            )
            .unwrap();

        engine
            .place_stake(
                alice.id,
                market.id,
                Outcome::new("yes"),
                Decimal::new(400_00, 2),
            )
            .await
            .unwrap();
        engine
            .place_stake(
                bob.id,
                market.id,
                Outcome::new("no"),
                Decimal::new(600_00, 2),
            )
            .await
            .unwrap();

        engine.close_market(market.id).await.unwrap();
        let report = engine
            .settle_market(market.id, Outcome::new("yes"))
            .await
            .unwrap();

        assert_eq!(report.net_pool, Decimal::new(950_00, 2));
        assert_eq!(engine.balance(alice.id).unwrap(), Decimal::new(1550_00, 2));
        assert_eq!(engine.balance(bob.id).unwrap(), Decimal::new(400_00, 2));
        assert_eq!(
            engine.settlement_report(market.id).unwrap().map(|r| r.fee),
            Some(Decimal::new(50_00, 2))
        );
    }

    #[tokio::test]
    async fn test_list_markets_via_facade() {
        let (engine, _temp) = test_engine();

        let market = engine
            .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
            .unwrap();

        let listed = engine.list_markets(MarketFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, market.id);
    }
}
