//! Settlement engine: distribute a closed market's pool, or unwind an
//! open market
//!
//! # Payout arithmetic
//!
//! All division happens in `Decimal`. Each winner's share is rounded
//! DOWN to the minor unit, so the sum of payouts can never exceed the
//! net pool; the rounding residue stays with the platform fee. A dust
//! stake whose share rounds down to zero still marks as `Won`, but no
//! ledger credit is issued for it. When nobody picked the winning
//! outcome the whole pool is refunded in full and no fee is taken.
//!
//! Credits issued before a failure — whether a later credit or the
//! final resolution batch fails — are compensated with `Reversal`
//! debits, so a failed settlement leaves no partial effect and is safe
//! to retry.
//!
//! # Idempotency
//!
//! The settlement report is persisted in the same atomic batch as the
//! status transition. Re-settling with the same outcome returns the
//! stored report without issuing any new ledger transactions; the check
//! runs inside the same exclusive section used for staking.

use crate::{
    metrics::Metrics,
    registry::MarketRegistry,
    types::{MarketId, MarketStatus, Outcome, SettlementReport, StakeState, WinnerCredit},
    Error, Result,
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use wallet_ledger::{Ledger, LedgerTransaction, TxnReason};

/// Settlement engine
pub struct SettlementEngine {
    /// Market registry (locks + store)
    registry: Arc<MarketRegistry>,

    /// Wallet ledger
    ledger: Arc<Ledger>,

    /// Platform fee rate (0.05 = 5%)
    fee_rate: Decimal,

    /// Metrics collector
    metrics: Metrics,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("fee_rate", &self.fee_rate)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Create settlement engine
    pub fn new(
        registry: Arc<MarketRegistry>,
        ledger: Arc<Ledger>,
        fee_rate: Decimal,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            ledger,
            fee_rate,
            metrics,
        }
    }

    /// Settle a closed market with its winning outcome
    pub async fn settle(
        &self,
        market_id: MarketId,
        winning_outcome: Outcome,
    ) -> Result<SettlementReport> {
        if winning_outcome.is_empty() {
            return Err(Error::InvalidMarket(
                "winning outcome must not be empty".to_string(),
            ));
        }

        let lock = self.registry.lock(market_id);
        let _guard = lock.lock().await;

        // Lazy close applies here too: an expired open market becomes
        // closed and is then settleable.
        let mut market = self.registry.load_for_update(market_id)?;

        match market.status {
            MarketStatus::Settled => {
                let report = self
                    .registry
                    .store()
                    .get_report(market_id)?
                    .ok_or_else(|| {
                        Error::Storage(format!("Settled market {} has no report", market_id))
                    })?;

                if report.winning_outcome == winning_outcome {
                    return Ok(report);
                }
                return Err(Error::AlreadySettled(market_id.to_string()));
            }
            MarketStatus::Cancelled => {
                return Err(Error::AlreadySettled(market_id.to_string()));
            }
            MarketStatus::Open => {
                return Err(Error::NotYetClosed(market_id.to_string()));
            }
            MarketStatus::Closed => {}
        }

        let mut stakes = self.registry.store().market_stakes(market_id)?;
        let winning_total: Decimal = stakes
            .iter()
            .filter(|s| s.state == StakeState::Active && s.outcome == winning_outcome)
            .map(|s| s.amount)
            .sum();

        let total_pool = market.total_pool;
        let mut issued: Vec<LedgerTransaction> = Vec::new();
        let mut credits: Vec<WinnerCredit> = Vec::new();

        let report = if winning_total.is_zero() {
            // Nobody picked the winner: defined refund policy, not an
            // error. Every active stake comes back in full, no fee.
            for stake in stakes.iter_mut().filter(|s| s.state == StakeState::Active) {
                let txn = match self
                    .ledger
                    .credit(
                        stake.account_id,
                        stake.amount,
                        TxnReason::Refund,
                        Some(market_id.as_uuid()),
                    )
                    .await
                {
                    Ok(txn) => txn,
                    Err(e) => {
                        self.unwind_credits(&issued).await;
                        return Err(e.into());
                    }
                };
                issued.push(txn);
                credits.push(WinnerCredit {
                    account_id: stake.account_id,
                    stake_id: stake.id,
                    amount: stake.amount,
                });
                stake.state = StakeState::Refunded;
            }

            // All stakes refunded, nothing left in the pool
            market.total_pool = Decimal::ZERO;
            self.metrics.record_refunds(credits.len() as u64);

            SettlementReport {
                market_id,
                winning_outcome: winning_outcome.clone(),
                total_pool,
                fee: Decimal::ZERO,
                net_pool: total_pool,
                credits,
                refunded: true,
                settled_at: Utc::now(),
            }
        } else {
            let net_pool = total_pool * (Decimal::ONE - self.fee_rate);

            for stake in stakes.iter_mut().filter(|s| s.state == StakeState::Active) {
                if stake.outcome == winning_outcome {
                    // Proportional pari-mutuel split, rounded down to
                    // the minor unit; residue stays with the fee.
                    let payout = (stake.amount * net_pool / winning_total)
                        .round_dp_with_strategy(2, RoundingStrategy::ToZero);

                    // A dust stake can round down to nothing; it still
                    // won, but there is no amount to credit.
                    if payout > Decimal::ZERO {
                        let txn = match self
                            .ledger
                            .credit(
                                stake.account_id,
                                payout,
                                TxnReason::Payout,
                                Some(market_id.as_uuid()),
                            )
                            .await
                        {
                            Ok(txn) => txn,
                            Err(e) => {
                                self.unwind_credits(&issued).await;
                                return Err(e.into());
                            }
                        };
                        issued.push(txn);
                    }
                    credits.push(WinnerCredit {
                        account_id: stake.account_id,
                        stake_id: stake.id,
                        amount: payout,
                    });
                    stake.state = StakeState::Won;
                } else {
                    // Losing stakes were debited at stake time; nothing
                    // comes back.
                    stake.state = StakeState::Lost;
                }
            }

            let total_credited: Decimal = credits.iter().map(|c| c.amount).sum();

            SettlementReport {
                market_id,
                winning_outcome: winning_outcome.clone(),
                total_pool,
                fee: total_pool - total_credited,
                net_pool,
                credits,
                refunded: false,
                settled_at: Utc::now(),
            }
        };

        market.outcome = Some(winning_outcome);
        self.registry
            .apply_transition(&mut market, MarketStatus::Settled)?;

        if let Err(commit_err) =
            self.registry
                .store()
                .resolve_atomic(&market, &stakes, Some(&report))
        {
            self.unwind_credits(&issued).await;
            return Err(commit_err);
        }

        self.metrics.record_settlement();

        tracing::info!(
            market_id = %market_id,
            winning_outcome = %report.winning_outcome,
            total_pool = %report.total_pool,
            net_pool = %report.net_pool,
            fee = %report.fee,
            winners = report.credits.len(),
            refunded = report.refunded,
            "Market settled"
        );

        Ok(report)
    }

    /// Cancel an open market, refunding every active stake in full
    ///
    /// Only legal from `Open`. A market that is closed but not yet
    /// settled cannot be cancelled.
    pub async fn cancel(&self, market_id: MarketId) -> Result<()> {
        let lock = self.registry.lock(market_id);
        let _guard = lock.lock().await;

        let mut market = self.registry.load_for_update(market_id)?;

        if market.status != MarketStatus::Open {
            return Err(Error::InvalidTransition {
                from: market.status,
                to: MarketStatus::Cancelled,
            });
        }

        let mut stakes = self.registry.store().market_stakes(market_id)?;
        let mut issued: Vec<LedgerTransaction> = Vec::new();

        for stake in stakes.iter_mut().filter(|s| s.state == StakeState::Active) {
            let txn = match self
                .ledger
                .credit(
                    stake.account_id,
                    stake.amount,
                    TxnReason::Refund,
                    Some(market_id.as_uuid()),
                )
                .await
            {
                Ok(txn) => txn,
                Err(e) => {
                    self.unwind_credits(&issued).await;
                    return Err(e.into());
                }
            };
            issued.push(txn);
            stake.state = StakeState::Refunded;
        }

        market.total_pool = Decimal::ZERO;
        self.registry
            .apply_transition(&mut market, MarketStatus::Cancelled)?;

        if let Err(commit_err) = self.registry.store().resolve_atomic(&market, &stakes, None) {
            self.unwind_credits(&issued).await;
            return Err(commit_err);
        }

        self.metrics.record_cancellation();
        self.metrics.record_refunds(issued.len() as u64);

        tracing::info!(
            market_id = %market_id,
            refunds = issued.len(),
            "Market cancelled"
        );

        Ok(())
    }

    /// Compensate already-issued credits after a failed commit
    ///
    /// Reversals carry their own transaction reason so the audit trail
    /// never mistakes an undo for a real payout or refund.
    async fn unwind_credits(&self, issued: &[LedgerTransaction]) {
        for txn in issued {
            if let Err(e) = self
                .ledger
                .debit(txn.account_id, txn.amount, TxnReason::Reversal, txn.market_ref)
                .await
            {
                tracing::error!(
                    txn_id = %txn.id,
                    account_id = %txn.account_id,
                    error = %e,
                    "Compensating debit failed after settlement commit error"
                );
            }
        }
    }
}
