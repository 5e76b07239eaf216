//! Trade ingest and price aggregation.
//!
//! Ingest turns trade batches into per-symbol volume-weighted contributions
//! on a bounded channel; the aggregator drains that channel on a fixed
//! cadence and hands one VWAP per symbol to a [`PriceHandler`].
//!
//! [`PriceHandler`]: preorder_core::PriceHandler

pub mod aggregator;
pub mod error;
pub mod ingest;

pub use aggregator::{AggregatorConfig, CycleReport, PriceAggregator};
pub use error::{FeedError, FeedResult};
pub use ingest::{partition, IngestStats, TradeIngest};
