//! Price aggregator.
//!
//! Every `interval` the aggregator drains the contribution channel and
//! emits one VWAP per symbol, `Σ(v·p) / Σv`, to the price handler. Each
//! drain stops at `max_drain` contributions so a steady flood cannot
//! starve evaluation.

use crate::error::{FeedError, FeedResult};
use preorder_core::{AggregatedPrice, Price, PriceHandler, TradeContribution};
use preorder_telemetry::Metrics;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Aggregator timing and drain limits.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Aggregation window.
    pub interval: Duration,
    /// Stop draining after waiting this long for the next contribution.
    pub read_timeout: Duration,
    /// Maximum contributions read per cycle.
    pub max_drain: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            read_timeout: Duration::from_millis(50),
            max_drain: 1000,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> FeedResult<()> {
        if self.interval.is_zero() {
            return Err(FeedError::InvalidConfig("interval must be > 0".to_string()));
        }
        if self.max_drain == 0 {
            return Err(FeedError::InvalidConfig("max_drain must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Contributions read from the channel.
    pub read: usize,
    /// Prices handed to the handler.
    pub emitted: usize,
    /// The channel closed during the drain.
    pub closed: bool,
}

#[derive(Debug, Default)]
struct Accumulator {
    volume: Decimal,
    notional: Decimal,
}

/// Drains contributions and emits per-symbol VWAPs.
pub struct PriceAggregator {
    rx: mpsc::Receiver<TradeContribution>,
    handler: Arc<dyn PriceHandler>,
    config: AggregatorConfig,
    shutdown: CancellationToken,
}

impl PriceAggregator {
    pub fn new(
        rx: mpsc::Receiver<TradeContribution>,
        handler: Arc<dyn PriceHandler>,
        config: AggregatorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            handler,
            config,
            shutdown,
        }
    }

    /// Run until shutdown or until the channel closes.
    pub async fn run(mut self) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_drain = self.config.max_drain,
            "Price aggregator started"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Price aggregator shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let report = self.run_cycle().await;
            if report.closed {
                info!("Contribution channel closed, price aggregator exiting");
                return;
            }
        }
    }

    /// Drain once and emit prices.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut sums: BTreeMap<String, Accumulator> = BTreeMap::new();
        let mut report = CycleReport::default();

        while report.read < self.config.max_drain {
            match tokio::time::timeout(self.config.read_timeout, self.rx.recv()).await {
                Ok(Some(contribution)) => {
                    report.read += 1;
                    let acc = sums.entry(contribution.symbol).or_default();
                    acc.volume += contribution.volume;
                    acc.notional += contribution.notional;
                }
                Ok(None) => {
                    report.closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        for price in vwap(sums) {
            debug!(symbol = %price.symbol, price = %price.price, "Aggregated price");
            Metrics::aggregated_price(&price.symbol);
            self.handler.on_price(price).await;
            report.emitted += 1;
        }

        if report.read > 0 {
            debug!(
                read = report.read,
                emitted = report.emitted,
                "Aggregation cycle complete"
            );
        }
        report
    }
}

fn vwap(sums: BTreeMap<String, Accumulator>) -> Vec<AggregatedPrice> {
    sums.into_iter()
        .filter(|(_, acc)| acc.volume > Decimal::ZERO)
        .map(|(symbol, acc)| AggregatedPrice::new(symbol, Price::new(acc.notional / acc.volume)))
        .collect()
}
