//! Drives the implementation × variant × specification × test matrix.
//!
//! For every variant, each specification it claims (and that survived the
//! caller's filters) selects its required tests. Those run on a bounded
//! worker pool; outcomes are sorted by test id within each pair.

pub mod runner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::assertion::{AssertionError, AssertionRuntime, Verdict};
use crate::errors::{HarnessError, Result};
use crate::filter::Filter;
use crate::hydrate::{HydratedTestCase, TestKind};
use crate::model::{Implementation, ImplementationVariant, Specification};
use crate::walker::Requirements;

use runner::{run_program, ProcessOutput};

/// What the orchestrator needs from a loaded suite.
pub trait TestSuite {
    fn list_hydrated_tests(&self) -> &[HydratedTestCase];
    fn list_implementations(&self) -> &[Implementation];
    fn list_specifications(&self) -> &[Specification];
    fn create_assertion_runtime(&self) -> std::result::Result<AssertionRuntime, AssertionError>;
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Set once to stop a run at the next test boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub implementation_filter: Filter,
    pub specification_filter: Filter,
    pub test_filter: Filter,
    /// Worker threads per pair; `1` runs tests one after another.
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            implementation_filter: Filter::new(),
            specification_filter: Filter::new(),
            test_filter: Filter::new(),
            jobs: 1,
            timeout: None,
            cancellation: CancellationToken::new(),
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outcome {
    Skipped { reason: String },
    Judged { verdict: Verdict, output: ProcessOutput },
    Captured { output: ProcessOutput },
}

impl Outcome {
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Judged { verdict, .. } if verdict.pass)
    }

    pub fn failed(&self) -> bool {
        matches!(self, Outcome::Judged { verdict, .. } if !verdict.pass)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub implementation: String,
    pub variant: String,
    pub specification: String,
    pub uid: String,
    pub display_name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub captured: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub records: Vec<TestRecord>,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for record in &self.records {
            match &record.outcome {
                Outcome::Skipped { .. } => summary.skipped += 1,
                Outcome::Captured { .. } => summary.captured += 1,
                Outcome::Judged { verdict, .. } if verdict.pass => summary.passed += 1,
                Outcome::Judged { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.records.iter().any(|r| r.outcome.failed())
    }
}

// ============================================================================
// EXECUTION
// ============================================================================

pub fn execute<S: TestSuite + ?Sized>(suite: &S, options: &ExecutionOptions) -> Result<RunReport> {
    let runtime = suite.create_assertion_runtime()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .map_err(|e| HarnessError::ThreadPool(e.to_string()))?;

    let tests: Vec<&HydratedTestCase> = suite
        .list_hydrated_tests()
        .iter()
        .filter(|t| options.test_filter.matches(*t))
        .collect();
    let specifications = options
        .specification_filter
        .apply(suite.list_specifications());

    let mut report = RunReport::default();
    for implementation in options
        .implementation_filter
        .apply(suite.list_implementations())
    {
        for variant in &implementation.variants {
            for specification in specifications
                .iter()
                .filter(|s| variant.specifications.contains(&s.metadata.name))
            {
                let pair = Pair {
                    implementation,
                    variant,
                    specification,
                };
                let records = pair.run(&tests, &runtime, &pool, options)?;
                report.records.extend(records);
            }
        }
    }
    Ok(report)
}

struct Pair<'a> {
    implementation: &'a Implementation,
    variant: &'a ImplementationVariant,
    specification: &'a Specification,
}

impl Pair<'_> {
    #[instrument(
        skip_all,
        fields(
            implementation = %self.implementation.metadata.name,
            variant = %self.variant.metadata.name,
            specification = %self.specification.metadata.name
        )
    )]
    fn run(
        &self,
        tests: &[&HydratedTestCase],
        runtime: &AssertionRuntime,
        pool: &rayon::ThreadPool,
        options: &ExecutionOptions,
    ) -> Result<Vec<TestRecord>> {
        let requirements = Requirements::for_specification(self.specification)?;
        let required: Vec<&HydratedTestCase> = tests
            .iter()
            .copied()
            .filter(|t| requirements.requires(*t))
            .collect();
        info!(tests = required.len(), "running specification");

        // An invalid test aborts the pair before anything runs.
        for test in &required {
            if let TestKind::Invalid { reason } = &test.kind {
                return Err(HarnessError::InvalidTest {
                    uid: test.uid.clone(),
                    reason: reason.clone(),
                });
            }
        }

        let mut records = pool.install(|| {
            required
                .par_iter()
                .map(|test| self.run_test(test, runtime, options))
                .collect::<Result<Vec<_>>>()
        })?;
        records.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(records)
    }

    fn run_test(
        &self,
        test: &HydratedTestCase,
        runtime: &AssertionRuntime,
        options: &ExecutionOptions,
    ) -> Result<TestRecord> {
        if options.cancellation.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }

        let outcome = match &test.kind {
            TestKind::Skip { reason } => {
                debug!(test = %test.uid, reason = %reason, "skipped");
                Outcome::Skipped {
                    reason: reason.clone(),
                }
            }
            TestKind::Invalid { reason } => {
                return Err(HarnessError::InvalidTest {
                    uid: test.uid.clone(),
                    reason: reason.clone(),
                })
            }
            TestKind::Eval { input, .. } => {
                let output = self.run_input(test, input, options)?;
                let verdict = runtime
                    .evaluate(test, &output)
                    .map_err(|source| HarnessError::Evaluation {
                        uid: test.uid.clone(),
                        source,
                    })?;
                if !verdict.pass {
                    warn!(test = %test.uid, "assertion failed");
                }
                Outcome::Judged { verdict, output }
            }
            TestKind::CaptureEval { input } => Outcome::Captured {
                output: self.run_input(test, input, options)?,
            },
        };

        Ok(TestRecord {
            implementation: self.implementation.metadata.name.clone(),
            variant: self.variant.metadata.name.clone(),
            specification: self.specification.metadata.name.clone(),
            uid: test.uid.clone(),
            display_name: test.display_name.clone(),
            outcome,
        })
    }

    fn run_input(
        &self,
        test: &HydratedTestCase,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<ProcessOutput> {
        if self.variant.runtime.local.is_none() {
            return Err(HarnessError::UnknownRuntime {
                implementation: self.implementation.metadata.name.clone(),
                variant: self.variant.metadata.name.clone(),
            });
        }
        debug!(test = %test.uid, "executing");
        run_program(&self.variant.test_command, input, options.timeout).map_err(|source| {
            HarnessError::Runner {
                uid: test.uid.clone(),
                source,
            }
        })
    }
}
