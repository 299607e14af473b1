//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `market_stakes_total` - Stakes accepted
//! - `market_stake_rejections_total` - Stakes rejected (closed market,
//!   insufficient funds, bad parameters)
//! - `market_settlements_total` - Markets settled
//! - `market_cancellations_total` - Markets cancelled
//! - `market_refunds_total` - Refund credits issued
//! - `market_stake_duration_seconds` - Histogram of stake latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Stakes accepted
    pub stakes_total: IntCounter,

    /// Stakes rejected
    pub stake_rejections_total: IntCounter,

    /// Markets settled
    pub settlements_total: IntCounter,

    /// Markets cancelled
    pub cancellations_total: IntCounter,

    /// Refund credits issued
    pub refunds_total: IntCounter,

    /// Stake latency histogram
    pub stake_duration: Histogram,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let stakes_total =
            IntCounter::with_opts(Opts::new("market_stakes_total", "Stakes accepted"))?;
        registry.register(Box::new(stakes_total.clone()))?;

        let stake_rejections_total = IntCounter::with_opts(Opts::new(
            "market_stake_rejections_total",
            "Stakes rejected",
        ))?;
        registry.register(Box::new(stake_rejections_total.clone()))?;

        let settlements_total =
            IntCounter::with_opts(Opts::new("market_settlements_total", "Markets settled"))?;
        registry.register(Box::new(settlements_total.clone()))?;

        let cancellations_total = IntCounter::with_opts(Opts::new(
            "market_cancellations_total",
            "Markets cancelled",
        ))?;
        registry.register(Box::new(cancellations_total.clone()))?;

        let refunds_total =
            IntCounter::with_opts(Opts::new("market_refunds_total", "Refund credits issued"))?;
        registry.register(Box::new(refunds_total.clone()))?;

        let stake_duration = Histogram::with_opts(
            HistogramOpts::new(
                "market_stake_duration_seconds",
                "Histogram of stake latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(stake_duration.clone()))?;

        Ok(Self {
            stakes_total,
            stake_rejections_total,
            settlements_total,
            cancellations_total,
            refunds_total,
            stake_duration,
            registry,
        })
    }

    /// Record an accepted stake
    pub fn record_stake(&self, duration_seconds: f64) {
        self.stakes_total.inc();
        self.stake_duration.observe(duration_seconds);
    }

    /// Record a rejected stake
    pub fn record_stake_rejected(&self) {
        self.stake_rejections_total.inc();
    }

    /// Record a settlement
    pub fn record_settlement(&self) {
        self.settlements_total.inc();
    }

    /// Record a cancellation
    pub fn record_cancellation(&self) {
        self.cancellations_total.inc();
    }

    /// Record refund credits
    pub fn record_refunds(&self, count: u64) {
        self.refunds_total.inc_by(count);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
