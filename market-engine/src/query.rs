//! Listing queries over the market store
//!
//! Listings scan the creation-time index (most recent first), filter in
//! status/bet-type order, then page with offset and limit. The page size
//! is capped by configuration; malformed filter input was already
//! defaulted by [`MarketFilter::from_params`](crate::MarketFilter).

use crate::{
    config::QueryConfig,
    store::MarketStore,
    types::{MarketFilter, MarketId, MarketSummary},
    Result,
};
use std::sync::Arc;

/// Read-side query service for market listings
pub struct MarketQuery {
    /// Storage backend
    store: Arc<MarketStore>,

    /// Paging limits
    config: QueryConfig,
}

impl std::fmt::Debug for MarketQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketQuery")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MarketQuery {
    /// Create query service over a store
    pub fn new(store: Arc<MarketStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// List markets matching a filter, newest first
    ///
    /// Reads stored status only; an expired market that has not yet been
    /// touched by a mutation still lists as `Open` until the lazy close
    /// runs.
    pub fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<MarketSummary>> {
        let limit = if filter.limit == 0 {
            self.config.default_limit
        } else {
            filter.limit.min(self.config.max_limit)
        };

        let ids = self.store.market_ids_created_desc()?;

        let mut summaries = Vec::new();
        let mut skipped = 0usize;

        for id in ids {
            let market = self.store.get_market(id)?;

            if let Some(bet_type) = filter.bet_type {
                if market.bet_type != bet_type {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if market.status != status {
                    continue;
                }
            }

            if skipped < filter.offset {
                skipped += 1;
                continue;
            }

            summaries.push(market.summary());
            if summaries.len() >= limit {
                break;
            }
        }

        Ok(summaries)
    }

    /// Look up a single market summary
    pub fn get_market(&self, market_id: MarketId) -> Result<MarketSummary> {
        Ok(self.store.get_market(market_id)?.summary())
    }
}
