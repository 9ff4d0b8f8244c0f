//! Per-key min/mean/max over very large `key;value` files.
//!
//! The input is cut into newline-aligned segments that are dealt round-robin
//! to independent lanes. Each lane parses its segments into batches and folds
//! them into a private table; the tables are merged once every lane is done,
//! then sorted by key and rendered as `key=min/mean/max` lines.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fixed_point;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod stats;
pub mod store;
pub mod timing;

pub use config::{Cli, ConfigError, PipelineConfig, ReadMode, StoreKind};
pub use error::BrcError;
pub use pipeline::{run, Report};
pub use stats::{AggregateEntry, Stats};
pub use store::{HashStore, KeyedAggregateStore, TrieStore};
