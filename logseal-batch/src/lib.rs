//! Logseal Batch - the aggregation pipeline.
//!
//! The [`BatchAggregator`] periodically turns the intake spool into
//! committed batches: drain, seal, build the Merkle tree, anchor the
//! root, archive the artifacts, and only then consume the spool. A
//! failure anywhere before the final consume leaves the spooled records
//! in place for the next cycle.

pub mod aggregator;

pub use aggregator::{AggregatorConfig, BatchAggregator, CycleError, CycleOutcome};
