use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use thiserror::Error;

pub const DEFAULT_SEGMENT_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_SEGMENT_QUEUE: usize = 64;
pub const DEFAULT_BATCH_SIZE: usize = 2048;
pub const DEFAULT_BATCH_QUEUE: usize = 64;
pub const DEFAULT_CAPACITY_HINT: usize = 16_384;

/// Key storage used by every lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    #[default]
    Hash,
    Trie,
}

/// How the input bytes are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReadMode {
    /// Map the file, falling back to block reads if mapping fails.
    #[default]
    Auto,
    Mmap,
    Blocks,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("percent must be within 0..=100, got {0}")]
    Percent(u8),
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub path: PathBuf,
    /// Share of the file to process, in percent of its length.
    pub percent: u8,
    pub lanes: usize,
    pub segment_size: usize,
    pub segment_queue: usize,
    pub batch_size: usize,
    pub batch_queue: usize,
    pub capacity_hint: usize,
    pub store: StoreKind,
    pub read_mode: ReadMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("measurements.txt"),
            percent: 100,
            lanes: default_lanes(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            segment_queue: DEFAULT_SEGMENT_QUEUE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_queue: DEFAULT_BATCH_QUEUE,
            capacity_hint: DEFAULT_CAPACITY_HINT,
            store: StoreKind::default(),
            read_mode: ReadMode::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.percent > 100 {
            return Err(ConfigError::Percent(self.percent));
        }
        for (name, value) in [
            ("lanes", self.lanes),
            ("segment_size", self.segment_size),
            ("segment_queue", self.segment_queue),
            ("batch_size", self.batch_size),
            ("batch_queue", self.batch_queue),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}

pub fn default_lanes() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Command line surface of the `brc-lanes` binary.
#[derive(Debug, Parser)]
#[command(name = "brc-lanes", version, about = "Per-key min/mean/max over `key;value` lines")]
pub struct Cli {
    /// Input file of `<key>;<value>` lines.
    #[arg(default_value = "measurements.txt")]
    pub file: PathBuf,

    /// Percentage of the file to process.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: u8,

    /// Number of parallel lanes (defaults to available parallelism).
    #[arg(long)]
    pub lanes: Option<usize>,

    /// Segment size in bytes handed to a lane at a time.
    #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    pub segment_size: usize,

    /// Bounded depth of each lane's segment queue.
    #[arg(long, default_value_t = DEFAULT_SEGMENT_QUEUE)]
    pub segment_queue: usize,

    /// Measurements per parsed batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Bounded depth of each lane's batch queue.
    #[arg(long, default_value_t = DEFAULT_BATCH_QUEUE)]
    pub batch_queue: usize,

    /// Expected number of distinct keys per lane.
    #[arg(long, default_value_t = DEFAULT_CAPACITY_HINT)]
    pub capacity_hint: usize,

    #[arg(long, value_enum, default_value_t = StoreKind::Hash)]
    pub store: StoreKind,

    #[arg(long, value_enum, default_value_t = ReadMode::Auto)]
    pub read_mode: ReadMode,

    /// Compare the report with this expected output file.
    #[arg(long)]
    pub check: Option<PathBuf>,

    /// Print the per-stage timing table to stderr.
    #[arg(long)]
    pub timings: bool,
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            path: self.file.clone(),
            percent: self.percent,
            lanes: self.lanes.unwrap_or_else(default_lanes),
            segment_size: self.segment_size,
            segment_queue: self.segment_queue,
            batch_size: self.batch_size,
            batch_queue: self.batch_queue,
            capacity_hint: self.capacity_hint,
            store: self.store,
            read_mode: self.read_mode,
        }
    }
}
