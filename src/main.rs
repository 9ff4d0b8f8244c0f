use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use brc_lanes::report::first_mismatch;
use brc_lanes::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.pipeline_config();
    let report = brc_lanes::run(&config)
        .with_context(|| format!("processing {}", config.path.display()))?;

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&report.output)
        .and_then(|()| stdout.flush())
        .map_err(brc_lanes::BrcError::Output)?;

    if cli.timings {
        eprint!("{}", report.timings);
        eprintln!(
            "{} lines, {} keys, {} segments, {} batches, {} bytes",
            report.lines, report.keys, report.segments, report.batches, report.bytes
        );
    }

    if let Some(expected) = &cli.check {
        let expected_bytes = fs::read(expected)
            .with_context(|| format!("reading check file {}", expected.display()))?;
        if let Some(mismatch) = first_mismatch(&report.output, &expected_bytes) {
            bail!(
                "output differs from {} at line {}: expected {:?}, got {:?}",
                expected.display(),
                mismatch.line,
                mismatch.expected.unwrap_or_default(),
                mismatch.actual.unwrap_or_default()
            );
        }
        eprintln!("output matches {}", expected.display());
    }
    Ok(())
}
