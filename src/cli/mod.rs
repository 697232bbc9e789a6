//! The `spectest` command-line interface.

use std::io::Write;
use std::path::Path;
use std::process;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use termcolor::{ColorChoice, StandardStream};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::args::{Command, Format, SpectestArgs};
use crate::errors::{HarnessError, Result};
use crate::executor::{
    execute, CancellationToken, ExecutionOptions, Summary, TestRecord, TestSuite,
};
use crate::filter::Filter;
use crate::selector::Selector;
use crate::storage::load_suite;
use crate::validation::ValidationSummary;

pub mod args;
pub mod output;

/// Settings for `spectest run` after flags are applied.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub jobs: usize,
    pub timeout: Duration,
    pub color: ColorChoice,
    pub format: Format,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            timeout: Duration::from_secs(10),
            color: default_color(),
            format: Format::Text,
        }
    }
}

fn default_color() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// The main entry point for the CLI.
pub fn run() {
    let args = SpectestArgs::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match args.command {
        Command::Check { path } => handle_check(&path),
        Command::HydrateTests { path } => handle_hydrate_tests(&path),
        Command::Run {
            path,
            implementation,
            specification,
            test,
            jobs,
            timeout,
            format,
        } => {
            let mut config = RunConfig {
                format,
                ..RunConfig::default()
            };
            if let Some(jobs) = jobs {
                config.jobs = jobs.max(1);
            }
            if let Some(timeout) = timeout {
                config.timeout = timeout;
            }
            let filters = Filters {
                implementation: implementation.as_deref(),
                specification: specification.as_deref(),
                test: test.as_deref(),
            };
            handle_run(&path, &filters, &config)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            process::exit(1);
        }
    }
}

// ============================================================================
// SUBCOMMANDS
// ============================================================================
//
// Each handler returns whether the command succeeded; errors that stop the
// command outright are returned as `Err`.

fn handle_check(path: &Path) -> Result<bool> {
    let suite = load_suite(path)?;
    let mut out = StandardStream::stdout(default_color());
    let io_error = |e| HarnessError::io("<stdout>", e);

    output::print_loaded(
        &mut out,
        suite.list_specifications().len(),
        suite.list_implementations().len(),
        suite.test_document_count(),
    )
    .map_err(io_error)?;

    let mut summary = ValidationSummary::default();
    let mut write_result: std::io::Result<()> = Ok(());
    suite.run_validation(|file, findings| {
        summary.update(findings);
        if write_result.is_ok() {
            write_result = output::print_findings(&mut out, file, findings);
        }
    });
    write_result.map_err(io_error)?;
    output::print_validation_summary(&mut out, &summary).map_err(io_error)?;

    if summary.has_errors() {
        return Err(HarnessError::Validation {
            errors: summary.errors,
        });
    }
    Ok(true)
}

fn handle_hydrate_tests(path: &Path) -> Result<bool> {
    let suite = load_suite(path)?;
    let json = serde_json::to_string_pretty(suite.list_hydrated_tests()).map_err(|source| {
        HarnessError::Encode {
            what: "hydrated tests",
            source,
        }
    })?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").map_err(|e| HarnessError::io("<stdout>", e))?;
    Ok(true)
}

struct Filters<'a> {
    implementation: Option<&'a str>,
    specification: Option<&'a str>,
    test: Option<&'a str>,
}

fn selector_filter(flag: &str, selector: Option<&str>) -> Result<Filter> {
    match selector {
        None => Ok(Filter::new()),
        Some(text) => {
            let selector = Selector::parse(text).map_err(|e| HarnessError::selector(flag, e))?;
            Ok(Filter::new().with_selector(&selector))
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    records: &'a [TestRecord],
    summary: Summary,
}

fn handle_run(path: &Path, filters: &Filters<'_>, config: &RunConfig) -> Result<bool> {
    let suite = load_suite(path)?;

    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!(error = %e, "couldn't install the Ctrl-C handler");
    }

    let options = ExecutionOptions {
        implementation_filter: selector_filter("--implementation", filters.implementation)?,
        specification_filter: selector_filter("--specification", filters.specification)?,
        test_filter: selector_filter("--test", filters.test)?,
        jobs: config.jobs,
        timeout: Some(config.timeout),
        cancellation,
    };
    let report = execute(&suite, &options)?;

    let io_error = |e| HarnessError::io("<stdout>", e);
    match config.format {
        Format::Text => {
            let mut out = StandardStream::stdout(config.color);
            output::print_report(&mut out, &report).map_err(io_error)?;
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(&JsonReport {
                records: &report.records,
                summary: report.summary(),
            })
            .map_err(|source| HarnessError::Encode {
                what: "run report",
                source,
            })?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").map_err(io_error)?;
        }
    }
    Ok(!report.has_failures())
}
