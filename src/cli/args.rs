//! Command-line arguments and subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "spectest",
    version,
    about = "Runs template-driven conformance suites against external implementations."
)]
pub struct SpectestArgs {
    /// Log at debug level. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate a suite, printing every finding.
    Check {
        /// The suite directory.
        path: PathBuf,
    },
    /// Print the hydrated tests of a suite as JSON.
    HydrateTests {
        /// The suite directory.
        path: PathBuf,
    },
    /// Run the suite against its implementations.
    Run {
        /// The suite directory.
        path: PathBuf,
        /// Label selector over implementations.
        #[arg(long, value_name = "SELECTOR")]
        implementation: Option<String>,
        /// Label selector over specifications.
        #[arg(long, value_name = "SELECTOR")]
        specification: Option<String>,
        /// Label selector over tests.
        #[arg(long, value_name = "SELECTOR")]
        test: Option<String>,
        /// Tests to run at once; defaults to the available parallelism.
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Seconds each test program may run.
        #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
        timeout: Option<Duration>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Parses `--timeout` seconds into a positive duration.
fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if secs.is_nan() || secs <= 0.0 {
        return Err(format!("timeout must be greater than zero, got {raw}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("timeout of {raw} seconds is out of range"))
}
