//! Market registry: records, lifecycle transitions and per-market
//! exclusive sections
//!
//! # Exclusive sections
//!
//! Every pool-mutating operation (stake, settle, cancel, explicit close)
//! runs under the market's entry in a lock table. No two such operations
//! on the same market ever interleave; operations on different markets
//! run in parallel.
//!
//! # Lazy close
//!
//! There is no background clock. An `Open` market whose deadline has
//! elapsed is transitioned to `Closed` the next time it is loaded for
//! mutation, and a stake arriving in the gap is rejected regardless.

use crate::{
    store::MarketStore,
    types::{BetType, Market, MarketId, MarketStatus},
    Error, Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Market registry
pub struct MarketRegistry {
    /// Storage backend
    store: Arc<MarketStore>,

    /// Per-market exclusive sections
    locks: DashMap<MarketId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for MarketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketRegistry").finish_non_exhaustive()
    }
}

impl MarketRegistry {
    /// Create registry over a store
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Storage handle (shared with staking/settlement)
    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    /// The exclusive section for a market
    ///
    /// Callers hold the mutex for the whole read-modify-write of a stake,
    /// settlement or cancellation.
    pub fn lock(&self, market_id: MarketId) -> Arc<Mutex<()>> {
        self.locks
            .entry(market_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new open market
    pub fn create(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        bet_type: BetType,
        close_time: DateTime<Utc>,
    ) -> Result<Market> {
        let title = title.into();

        if title.trim().is_empty() {
            return Err(Error::InvalidMarket("title must not be empty".to_string()));
        }

        if close_time <= Utc::now() {
            return Err(Error::InvalidMarket(
                "close_time must be in the future".to_string(),
            ));
        }

        let market = Market::new(title, description, bet_type, close_time);
        self.store.create_market_atomic(&market)?;

        tracing::info!(
            market_id = %market.id,
            title = %market.title,
            bet_type = market.bet_type.as_str(),
            close_time = %market.close_time,
            "Market created"
        );

        Ok(market)
    }

    /// Get market by ID (plain read, no lazy close)
    pub fn get(&self, market_id: MarketId) -> Result<Market> {
        self.store.get_market(market_id)
    }

    /// Load a market for mutation, applying the lazy close first
    ///
    /// Must be called with the market's exclusive section held. An `Open`
    /// market past its deadline is persisted as `Closed` before being
    /// returned.
    pub fn load_for_update(&self, market_id: MarketId) -> Result<Market> {
        let mut market = self.store.get_market(market_id)?;

        if market.status == MarketStatus::Open && market.is_expired(Utc::now()) {
            self.apply_transition(&mut market, MarketStatus::Closed)?;
            self.store.put_market(&market)?;

            tracing::info!(market_id = %market.id, "Market auto-closed past deadline");
        }

        Ok(market)
    }

    /// Apply a lifecycle transition in memory, validating the edge
    ///
    /// The caller persists the market (usually as part of a larger atomic
    /// batch).
    pub fn apply_transition(&self, market: &mut Market, to: MarketStatus) -> Result<()> {
        if !market.status.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: market.status,
                to,
            });
        }

        market.status = to;
        Ok(())
    }

    /// Explicitly close an open market
    pub async fn close(&self, market_id: MarketId) -> Result<Market> {
        let lock = self.lock(market_id);
        let _guard = lock.lock().await;

        let mut market = self.store.get_market(market_id)?;

        // Already auto-closed is fine to report as-is
        if market.status == MarketStatus::Closed {
            return Ok(market);
        }

        self.apply_transition(&mut market, MarketStatus::Closed)?;
        self.store.put_market(&market)?;

        tracing::info!(market_id = %market.id, "Market closed");

        Ok(market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_registry() -> (MarketRegistry, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.market_data_dir = temp_dir.path().to_path_buf();
        let store = Arc::new(MarketStore::open(&config).unwrap());
        (MarketRegistry::new(store), temp_dir)
    }

    #[tokio::test]
    async fn test_create_rejects_past_close_time() {
        let (registry, _temp) = test_registry();

        let err = registry
            .create(
                "Expired",
                "",
                BetType::Binary,
                Utc::now() - Duration::minutes(1),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMarket(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let (registry, _temp) = test_registry();

        let err = registry
            .create("  ", "", BetType::Binary, Utc::now() + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMarket(_)));
    }

    #[tokio::test]
    async fn test_explicit_close() {
        let (registry, _temp) = test_registry();

        let market = registry
            .create("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
            .unwrap();

        let closed = registry.close(market.id).await.unwrap();
        assert_eq!(closed.status, MarketStatus::Closed);

        // Closing again is a no-op
        let again = registry.close(market.id).await.unwrap();
        assert_eq!(again.status, MarketStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_after_terminal_fails() {
        let (registry, _temp) = test_registry();

        let mut market = registry
            .create("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
            .unwrap();

        registry
            .apply_transition(&mut market, MarketStatus::Cancelled)
            .unwrap();
        registry.store().put_market(&market).unwrap();

        let err = registry.close(market.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_lazy_close_on_load_for_update() {
        let (registry, _temp) = test_registry();

        let mut market = registry
            .create("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
            .unwrap();

        // Backdate the deadline to simulate an expired open market
        market.close_time = Utc::now() - Duration::seconds(1);
        registry.store().put_market(&market).unwrap();

        let loaded = registry.load_for_update(market.id).unwrap();
        assert_eq!(loaded.status, MarketStatus::Closed);

        // The transition was persisted
        assert_eq!(
            registry.get(market.id).unwrap().status,
            MarketStatus::Closed
        );
    }
}
