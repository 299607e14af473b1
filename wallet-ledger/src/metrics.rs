//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_transactions_total` - Total committed transactions
//! - `ledger_debit_rejections_total` - Debits rejected for insufficient funds
//! - `ledger_accounts_total` - Accounts created
//! - `ledger_apply_duration_seconds` - Histogram of commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Total committed transactions
    pub transactions_total: IntCounter,

    /// Debits rejected for insufficient funds
    pub debit_rejections_total: IntCounter,

    /// Accounts created
    pub accounts_total: IntCounter,

    /// Commit latency histogram
    pub apply_duration: Histogram,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_total",
            "Total committed transactions",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let debit_rejections_total = IntCounter::with_opts(Opts::new(
            "ledger_debit_rejections_total",
            "Debits rejected for insufficient funds",
        ))?;
        registry.register(Box::new(debit_rejections_total.clone()))?;

        let accounts_total = IntCounter::with_opts(Opts::new(
            "ledger_accounts_total",
            "Accounts created",
        ))?;
        registry.register(Box::new(accounts_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_apply_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        Ok(Self {
            transactions_total,
            debit_rejections_total,
            accounts_total,
            apply_duration,
            registry,
        })
    }

    /// Record a committed transaction
    pub fn record_transaction(&self, duration_seconds: f64) {
        self.transactions_total.inc();
        self.apply_duration.observe(duration_seconds);
    }

    /// Record a rejected debit
    pub fn record_debit_rejected(&self) {
        self.debit_rejections_total.inc();
    }

    /// Record account creation
    pub fn record_account_created(&self) {
        self.accounts_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transactions_total.get(), 0);
        assert_eq!(metrics.accounts_total.get(), 0);
    }

    #[test]
    fn test_record_transaction() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transaction(0.002);
        metrics.record_transaction(0.010);
        assert_eq!(metrics.transactions_total.get(), 2);
    }

    #[test]
    fn test_record_debit_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_debit_rejected();
        assert_eq!(metrics.debit_rejections_total.get(), 1);
    }
}
