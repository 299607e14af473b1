//! Storage layer for markets and stakes using RocksDB
//!
//! # Column Families
//!
//! - `markets` - Market records (key: market_id)
//! - `stakes` - Stake records (key: stake_id)
//! - `reports` - Settlement reports (key: market_id)
//! - `indices` - Secondary indices (market stakes, participants, listing)
//!
//! Every multi-record mutation commits through a single `WriteBatch`:
//! a stake is never visible without its pool increment, and a settled
//! market is never visible with half its stakes still active.

use crate::{
    error::{Error, Result},
    types::{Market, MarketId, SettlementReport, Stake},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;
use wallet_ledger::AccountId;

/// Column family names
const CF_MARKETS: &str = "markets";
const CF_STAKES: &str = "stakes";
const CF_REPORTS: &str = "reports";
const CF_INDICES: &str = "indices";

/// Index prefixes within `indices`
const IDX_MARKET_STAKE: &[u8] = b"ms|";
const IDX_PARTICIPANT: &[u8] = b"ma|";
const IDX_CREATED: &[u8] = b"cr|";

/// Storage wrapper for RocksDB
pub struct MarketStore {
    db: Arc<DB>,
}

impl std::fmt::Debug for MarketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketStore").finish_non_exhaustive()
    }
}

impl MarketStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.market_data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_MARKETS, Self::cf_options_fast_read()),
            ColumnFamilyDescriptor::new(CF_STAKES, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_REPORTS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened market store RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_fast_read() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Market operations

    /// Get market by ID
    pub fn get_market(&self, market_id: MarketId) -> Result<Market> {
        let cf = self.cf_handle(CF_MARKETS)?;

        let value = self
            .db
            .get_cf(cf, market_id.as_bytes())?
            .ok_or_else(|| Error::MarketNotFound(market_id.to_string()))?;

        let market: Market = bincode::deserialize(&value)?;
        Ok(market)
    }

    /// Put market record (single, unbatched)
    pub fn put_market(&self, market: &Market) -> Result<()> {
        let cf = self.cf_handle(CF_MARKETS)?;
        let value = bincode::serialize(market)?;
        self.db.put_cf(cf, market.id.as_bytes(), &value)?;
        Ok(())
    }

    /// Create market and its listing index atomically
    pub fn create_market_atomic(&self, market: &Market) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_markets = self.cf_handle(CF_MARKETS)?;
        let value = bincode::serialize(market)?;
        batch.put_cf(cf_markets, market.id.as_bytes(), &value);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(cf_indices, Self::created_index_key(market), &[]);

        self.db.write(batch)?;

        Ok(())
    }

    // Stake operations

    /// Insert a stake with its pool increment and indices (atomic)
    ///
    /// The stake, the updated market (pool and participant count) and the
    /// stake/participant indices either all commit or none do.
    pub fn insert_stake_atomic(&self, stake: &Stake, market: &Market) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Stake record
        let cf_stakes = self.cf_handle(CF_STAKES)?;
        let stake_value = bincode::serialize(stake)?;
        batch.put_cf(cf_stakes, stake.id.as_bytes(), &stake_value);

        // 2. Market with updated pool / participant count
        let cf_markets = self.cf_handle(CF_MARKETS)?;
        let market_value = bincode::serialize(market)?;
        batch.put_cf(cf_markets, market.id.as_bytes(), &market_value);

        // 3. Indices
        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::market_stake_index_key(stake.market_id, stake.id),
            &[],
        );
        batch.put_cf(
            cf_indices,
            Self::participant_index_key(stake.market_id, stake.account_id),
            &[],
        );

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            stake_id = %stake.id,
            market_id = %stake.market_id,
            account_id = %stake.account_id,
            amount = %stake.amount,
            "Stake committed"
        );

        Ok(())
    }

    /// Get stake by ID
    pub fn get_stake(&self, stake_id: Uuid) -> Result<Stake> {
        let cf = self.cf_handle(CF_STAKES)?;

        let value = self
            .db
            .get_cf(cf, stake_id.as_bytes())?
            .ok_or_else(|| Error::Other(format!("Stake not found: {}", stake_id)))?;

        let stake: Stake = bincode::deserialize(&value)?;
        Ok(stake)
    }

    /// All stakes on a market, oldest first (via index)
    pub fn market_stakes(&self, market_id: MarketId) -> Result<Vec<Stake>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::market_stake_prefix(market_id);
        let iter = self.db.prefix_iterator_cf(cf_indices, &prefix);

        let mut stakes = Vec::new();
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }

            // Extract stake_id from key tail
            if key.len() >= prefix.len() + 16 {
                let stake_id_bytes: [u8; 16] = key[prefix.len()..prefix.len() + 16]
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt stake index entry".to_string()))?;
                let stake = self.get_stake(Uuid::from_bytes(stake_id_bytes))?;
                stakes.push(stake);
            }
        }

        Ok(stakes)
    }

    /// Whether an account already has a stake on a market
    pub fn has_participant(&self, market_id: MarketId, account_id: AccountId) -> Result<bool> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::participant_index_key(market_id, account_id);
        Ok(self.db.get_cf(cf, key)?.is_some())
    }

    // Settlement operations

    /// Commit a resolution: updated market, updated stakes, and (for
    /// settlement) the report, in one batch
    pub fn resolve_atomic(
        &self,
        market: &Market,
        stakes: &[Stake],
        report: Option<&SettlementReport>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_markets = self.cf_handle(CF_MARKETS)?;
        let market_value = bincode::serialize(market)?;
        batch.put_cf(cf_markets, market.id.as_bytes(), &market_value);

        let cf_stakes = self.cf_handle(CF_STAKES)?;
        for stake in stakes {
            let value = bincode::serialize(stake)?;
            batch.put_cf(cf_stakes, stake.id.as_bytes(), &value);
        }

        if let Some(report) = report {
            let cf_reports = self.cf_handle(CF_REPORTS)?;
            let value = bincode::serialize(report)?;
            batch.put_cf(cf_reports, market.id.as_bytes(), &value);
        }

        self.db.write(batch)?;

        Ok(())
    }

    /// Get the settlement report for a market, if settled
    pub fn get_report(&self, market_id: MarketId) -> Result<Option<SettlementReport>> {
        let cf = self.cf_handle(CF_REPORTS)?;

        match self.db.get_cf(cf, market_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Listing

    /// Market ids ordered by creation time, most recent first
    pub fn market_ids_created_desc(&self) -> Result<Vec<MarketId>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let iter = self.db.prefix_iterator_cf(cf, IDX_CREATED);

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(IDX_CREATED) {
                break;
            }

            // Key layout: "cr|" || inverted_millis(8) || market_id(16)
            let tail_start = IDX_CREATED.len() + 8;
            if key.len() >= tail_start + 16 {
                let id_bytes: [u8; 16] = key[tail_start..tail_start + 16]
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt listing index entry".to_string()))?;
                ids.push(MarketId::from_uuid(Uuid::from_bytes(id_bytes)));
            }
        }

        Ok(ids)
    }

    /// Flush memtables to disk (shutdown path)
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // Index key helpers

    fn market_stake_prefix(market_id: MarketId) -> Vec<u8> {
        let mut key = IDX_MARKET_STAKE.to_vec();
        key.extend_from_slice(market_id.as_bytes());
        key
    }

    fn market_stake_index_key(market_id: MarketId, stake_id: Uuid) -> Vec<u8> {
        let mut key = Self::market_stake_prefix(market_id);
        key.extend_from_slice(stake_id.as_bytes());
        key
    }

    fn participant_index_key(market_id: MarketId, account_id: AccountId) -> Vec<u8> {
        let mut key = IDX_PARTICIPANT.to_vec();
        key.extend_from_slice(market_id.as_bytes());
        key.extend_from_slice(account_id.as_bytes());
        key
    }

    /// Inverted-timestamp key so a forward scan yields created-desc order
    fn created_index_key(market: &Market) -> Vec<u8> {
        let millis = market.created_at.timestamp_millis().max(0) as u64;
        let mut key = IDX_CREATED.to_vec();
        key.extend_from_slice(&(u64::MAX - millis).to_be_bytes());
        key.extend_from_slice(market.id.as_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BetType, MarketStatus, Outcome, StakeState};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_store() -> (MarketStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.market_data_dir = temp_dir.path().to_path_buf();
        (MarketStore::open(&config).unwrap(), temp_dir)
    }

    fn test_market() -> Market {
        Market::new(
            "Test market",
            "A test",
            BetType::Binary,
            Utc::now() + Duration::hours(1),
        )
    }

    #[test]
    fn test_create_and_get_market() {
        let (store, _temp) = test_store();

        let market = test_market();
        store.create_market_atomic(&market).unwrap();

        let retrieved = store.get_market(market.id).unwrap();
        assert_eq!(retrieved.id, market.id);
        assert_eq!(retrieved.status, MarketStatus::Open);
    }

    #[test]
    fn test_market_not_found() {
        let (store, _temp) = test_store();
        let err = store.get_market(MarketId::generate()).unwrap_err();
        assert!(matches!(err, Error::MarketNotFound(_)));
    }

    #[test]
    fn test_insert_stake_atomic() {
        let (store, _temp) = test_store();

        let mut market = test_market();
        store.create_market_atomic(&market).unwrap();

        let account = AccountId::generate();
        let stake = Stake::new(
            account,
            market.id,
            Outcome::new("yes"),
            Decimal::new(400_00, 2),
        );
        market.total_pool += stake.amount;
        market.participant_count += 1;

        store.insert_stake_atomic(&stake, &market).unwrap();

        let retrieved = store.get_market(market.id).unwrap();
        assert_eq!(retrieved.total_pool, Decimal::new(400_00, 2));
        assert_eq!(retrieved.participant_count, 1);

        let stakes = store.market_stakes(market.id).unwrap();
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].state, StakeState::Active);

        assert!(store.has_participant(market.id, account).unwrap());
        assert!(!store
            .has_participant(market.id, AccountId::generate())
            .unwrap());
    }

    #[test]
    fn test_market_ids_created_desc() {
        let (store, _temp) = test_store();

        let mut expected = Vec::new();
        for i in 0..3 {
            let mut market = test_market();
            // Force distinct, increasing creation times
            market.created_at = Utc::now() + Duration::milliseconds(i * 10);
            store.create_market_atomic(&market).unwrap();
            expected.push(market.id);
        }
        expected.reverse();

        let ids = store.market_ids_created_desc().unwrap();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_resolve_atomic_persists_report() {
        let (store, _temp) = test_store();

        let mut market = test_market();
        store.create_market_atomic(&market).unwrap();

        let mut stake = Stake::new(
            AccountId::generate(),
            market.id,
            Outcome::new("yes"),
            Decimal::new(100_00, 2),
        );
        market.total_pool += stake.amount;
        market.participant_count += 1;
        store.insert_stake_atomic(&stake, &market).unwrap();

        stake.state = StakeState::Won;
        market.status = MarketStatus::Closed;
        store.put_market(&market).unwrap();
        market.status = MarketStatus::Settled;
        market.outcome = Some(Outcome::new("yes"));

        let report = SettlementReport {
            market_id: market.id,
            winning_outcome: Outcome::new("yes"),
            total_pool: market.total_pool,
            fee: Decimal::new(5_00, 2),
            net_pool: Decimal::new(95_00, 2),
            credits: vec![],
            refunded: false,
            settled_at: Utc::now(),
        };

        store
            .resolve_atomic(&market, std::slice::from_ref(&stake), Some(&report))
            .unwrap();

        let retrieved = store.get_report(market.id).unwrap().unwrap();
        assert_eq!(retrieved.net_pool, Decimal::new(95_00, 2));
        assert_eq!(
            store.get_stake(stake.id).unwrap().state,
            StakeState::Won
        );
        assert_eq!(
            store.get_market(market.id).unwrap().status,
            MarketStatus::Settled
        );
    }
}
