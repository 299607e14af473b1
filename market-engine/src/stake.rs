//! Stake engine: accept a user's stake against a market pool
//!
//! Placing a stake spans two stores: the wallet ledger (debit) and the
//! market store (stake record + pool increment). The ledger debit commits
//! first; if the market-side batch then fails, a compensating credit
//! undoes the debit so the operation is all-or-nothing.
//!
//! Concurrent stakes on the same market serialize on the registry's
//! per-market exclusive section. Concurrent stakes by the same account on
//! different markets proceed in parallel and serialize only at the
//! ledger's per-account lock.

use crate::{
    metrics::Metrics,
    registry::MarketRegistry,
    types::{MarketId, MarketStatus, Outcome, Stake},
    Error, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::{AccountId, Ledger, TxnReason};

/// Stake engine
pub struct StakeEngine {
    /// Market registry (locks + store)
    registry: Arc<MarketRegistry>,

    /// Wallet ledger
    ledger: Arc<Ledger>,

    /// Metrics collector
    metrics: Metrics,
}

impl std::fmt::Debug for StakeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakeEngine").finish_non_exhaustive()
    }
}

impl StakeEngine {
    /// Create stake engine
    pub fn new(registry: Arc<MarketRegistry>, ledger: Arc<Ledger>, metrics: Metrics) -> Self {
        Self {
            registry,
            ledger,
            metrics,
        }
    }

    /// Place a stake on one outcome of a market
    ///
    /// Atomic unit: (a) ledger debit, (b) stake record, (c) pool
    /// increment, (d) participant count increment for first-time stakers.
    /// `InsufficientFunds` aborts before anything else changes; a
    /// market-side storage failure rolls the debit back with a
    /// compensating credit.
    pub async fn place_stake(
        &self,
        account_id: AccountId,
        market_id: MarketId,
        outcome: Outcome,
        amount: Decimal,
    ) -> Result<Stake> {
        if amount <= Decimal::ZERO {
            self.metrics.record_stake_rejected();
            return Err(Error::InvalidStake(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        if outcome.is_empty() {
            self.metrics.record_stake_rejected();
            return Err(Error::InvalidStake("outcome must not be empty".to_string()));
        }

        let timer = std::time::Instant::now();

        let lock = self.registry.lock(market_id);
        let _guard = lock.lock().await;

        let mut market = self.registry.load_for_update(market_id)?;

        // The lazy check above already persisted the auto-close; this
        // guard also rejects the stake that raced in before it ran.
        if market.status != MarketStatus::Open || market.is_expired(Utc::now()) {
            self.metrics.record_stake_rejected();
            return Err(Error::MarketClosed(market_id.to_string()));
        }

        // (a) Debit the account; InsufficientFunds propagates with no
        // other change made.
        let debit = self
            .ledger
            .debit(
                account_id,
                amount,
                TxnReason::Stake,
                Some(market_id.as_uuid()),
            )
            .await
            .map_err(|e| {
                self.metrics.record_stake_rejected();
                Error::Ledger(e)
            })?;

        // (b)-(d) Stake record, pool increment, idempotent participant
        // counting, committed in one batch.
        let stake = Stake::new(account_id, market_id, outcome, amount);

        let new_participant = !self.registry.store().has_participant(market_id, account_id)?;
        market.total_pool += amount;
        if new_participant {
            market.participant_count += 1;
        }

        if let Err(commit_err) = self.registry.store().insert_stake_atomic(&stake, &market) {
            // Roll the debit back so no partial effect survives.
            if let Err(refund_err) = self
                .ledger
                .credit(
                    account_id,
                    amount,
                    TxnReason::Reversal,
                    Some(market_id.as_uuid()),
                )
                .await
            {
                tracing::error!(
                    stake_id = %stake.id,
                    debit_txn = %debit.id,
                    error = %refund_err,
                    "Compensating credit failed after stake commit error"
                );
            }
            self.metrics.record_stake_rejected();
            return Err(commit_err);
        }

        self.metrics.record_stake(timer.elapsed().as_secs_f64());

        tracing::info!(
            stake_id = %stake.id,
            market_id = %market_id,
            account_id = %account_id,
            outcome = %stake.outcome,
            amount = %amount,
            pool = %market.total_pool,
            "Stake placed"
        );

        Ok(stake)
    }
}
