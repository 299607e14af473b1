//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: account_id)
//! - `transactions` - Append-only transaction log (key: txn_id)
//! - `indices` - Secondary indices (account history, user lookup)

use crate::{
    error::{Error, Result},
    types::{Account, AccountId, LedgerTransaction},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";

/// Prefix for the user -> account index
const USER_INDEX_PREFIX: &[u8] = b"user|";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy transaction log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened wallet ledger RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
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

    // Account operations

    /// Put account record (single, unbatched)
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(cf, account.id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let value = self
            .db
            .get_cf(cf, account_id.as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;

        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Create account and its user index atomically
    pub fn create_account_atomic(&self, account: &Account) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        batch.put_cf(cf_accounts, account.id.as_bytes(), &value);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::user_index_key(&account.user_id),
            account.id.as_bytes(),
        );

        self.db.write(batch)?;

        Ok(())
    }

    /// Look up the account for a user, if one exists
    pub fn account_for_user(&self, user_id: &str) -> Result<Option<AccountId>> {
        let cf = self.cf_handle(CF_INDICES)?;

        match self.db.get_cf(cf, Self::user_index_key(user_id))? {
            Some(bytes) => {
                let id_bytes: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt user index entry".to_string()))?;
                Ok(Some(AccountId::from_uuid(Uuid::from_bytes(id_bytes))))
            }
            None => Ok(None),
        }
    }

    // Transaction operations

    /// Append transaction with balance update and index (atomic)
    ///
    /// The transaction record, the updated account (with its new cached
    /// balance) and the history index either all commit or none do.
    pub fn apply_transaction_atomic(
        &self,
        txn: &LedgerTransaction,
        account: &Account,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Transaction record
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        let txn_value = bincode::serialize(txn)?;
        batch.put_cf(cf_txns, txn.id.as_bytes(), &txn_value);

        // 2. Updated account (cached balance)
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let account_value = bincode::serialize(account)?;
        batch.put_cf(cf_accounts, account.id.as_bytes(), &account_value);

        // 3. History index: account_id || txn_id -> empty
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::history_index_key(account.id, txn.id);
        batch.put_cf(cf_indices, &idx, &[]);

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.id,
            account_id = %account.id,
            amount = %txn.amount,
            reason = %txn.reason,
            balance_after = %txn.balance_after,
            "Ledger transaction committed"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, txn_id: Uuid) -> Result<LedgerTransaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, txn_id.as_bytes())?
            .ok_or_else(|| Error::Other(format!("Transaction not found: {}", txn_id)))?;

        let txn: LedgerTransaction = bincode::deserialize(&value)?;
        Ok(txn)
    }

    /// Get all transactions for an account, oldest first (via index)
    ///
    /// UUIDv7 transaction ids sort by creation time, so the index scan
    /// yields the append order.
    pub fn account_transactions(&self, account_id: AccountId) -> Result<Vec<LedgerTransaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = account_id.as_bytes();
        let iter = self.db.prefix_iterator_cf(cf_indices, prefix);

        let mut txns = Vec::new();
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(prefix) {
                break;
            }

            // Extract txn_id from key (bytes 16..32)
            if key.len() >= 32 {
                let txn_id_bytes: [u8; 16] = key[16..32]
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt history index entry".to_string()))?;
                let txn = self.get_transaction(Uuid::from_bytes(txn_id_bytes))?;
                txns.push(txn);
            }
        }

        Ok(txns)
    }

    /// Flush memtables to disk (shutdown path)
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // Index key helpers

    fn history_index_key(account_id: AccountId, txn_id: Uuid) -> Vec<u8> {
        let mut key = account_id.as_bytes().to_vec();
        key.extend_from_slice(txn_id.as_bytes());
        key
    }

    fn user_index_key(user_id: &str) -> Vec<u8> {
        let mut key = USER_INDEX_PREFIX.to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }
}
