use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fixed_point::MalformedNumber;

/// Fatal failures of a pipeline run. Every variant aborts the run; there is
/// no partial-result mode.
#[derive(Debug, Error)]
pub enum BrcError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("reader: cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reader: cannot map {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reader: read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("parser (lane {lane}): {source} in line {line:?}")]
    MalformedNumber {
        lane: usize,
        line: String,
        #[source]
        source: MalformedNumber,
    },

    #[error("parser (lane {lane}): missing ';' separator in line {line:?}")]
    MissingSeparator { lane: usize, line: String },

    #[error("{stage} worker for lane {lane} panicked")]
    WorkerPanicked { stage: &'static str, lane: usize },

    #[error("output: {0}")]
    Output(#[source] io::Error),
}

pub type Result<T, E = BrcError> = std::result::Result<T, E>;
