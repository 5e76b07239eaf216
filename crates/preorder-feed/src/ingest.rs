//! Trade ingest.
//!
//! Partitions each trade batch by symbol and enqueues one contribution per
//! symbol. The channel is bounded; when it stays full past the enqueue
//! timeout the contribution is dropped and counted.

use crate::error::{FeedError, FeedResult};
use preorder_core::TradeContribution;
use preorder_telemetry::Metrics;
use preorder_ws::{FeedMessage, TradePrint};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tracing::{debug, trace, warn};

/// Result of ingesting one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Prints that contributed volume.
    pub prints: usize,
    /// Contributions enqueued.
    pub enqueued: usize,
    /// Contributions dropped on a full channel.
    pub dropped: usize,
}

/// Sum prints per symbol, skipping zero-volume and non-positive-price prints.
///
/// Output is ordered by symbol.
pub fn partition(prints: &[TradePrint]) -> Vec<TradeContribution> {
    partition_counted(prints).into_iter().map(|(c, _)| c).collect()
}

/// Like [`partition`], with the number of prints behind each contribution.
fn partition_counted(prints: &[TradePrint]) -> Vec<(TradeContribution, usize)> {
    let mut sums: BTreeMap<&str, (Decimal, Decimal, usize)> = BTreeMap::new();

    for print in prints {
        if print.volume <= Decimal::ZERO || print.price <= Decimal::ZERO {
            trace!(symbol = %print.symbol, "Skipping empty print");
            continue;
        }
        let entry = sums.entry(print.symbol.as_str()).or_default();
        entry.0 += print.volume;
        entry.1 += print.volume * print.price;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(symbol, (volume, notional, count))| {
            (TradeContribution::new(symbol, volume, notional), count)
        })
        .collect()
}

/// Forwards trade contributions into the aggregation channel.
pub struct TradeIngest {
    tx: mpsc::Sender<TradeContribution>,
    enqueue_timeout: Duration,
    dropped: AtomicU64,
}

impl TradeIngest {
    pub fn new(tx: mpsc::Sender<TradeContribution>, enqueue_timeout: Duration) -> Self {
        Self {
            tx,
            enqueue_timeout,
            dropped: AtomicU64::new(0),
        }
    }

    /// Total contributions dropped since start.
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ingest one feed message. Non-trade messages are ignored.
    ///
    /// Returns `ChannelClosed` once the aggregator has gone away.
    pub async fn handle(&self, message: &FeedMessage) -> FeedResult<IngestStats> {
        let FeedMessage::Trade { data } = message else {
            return Ok(IngestStats::default());
        };

        let mut stats = IngestStats::default();
        for (contribution, prints) in partition_counted(data) {
            stats.prints += prints;
            Metrics::trades_ingested(&contribution.symbol, prints as u64);

            match self.tx.send_timeout(contribution, self.enqueue_timeout).await {
                Ok(()) => stats.enqueued += 1,
                Err(SendTimeoutError::Timeout(dropped)) => {
                    stats.dropped += 1;
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    Metrics::contribution_dropped();
                    warn!(
                        symbol = %dropped.symbol,
                        dropped_total = total,
                        "Aggregation channel full, dropping contribution"
                    );
                }
                Err(SendTimeoutError::Closed(_)) => return Err(FeedError::ChannelClosed),
            }
        }

        debug!(
            prints = stats.prints,
            enqueued = stats.enqueued,
            dropped = stats.dropped,
            "Ingested trade batch"
        );
        Ok(stats)
    }
}
