//! Sequential test execution and result accounting.
//!
//! The executor runs every discovered method one at a time, in a stable
//! order: modules as the inspector emitted them, methods in enumeration
//! order within each module. There is no re-sorting and no concurrency;
//! tests are free to rely on process-global state.
//!
//! Per method the executor re-loads the owning module, builds a fresh
//! single-method suite (so `set_up`/`tear_down` run for exactly this
//! method), runs it, and maps the framework result into a
//! [`MethodResult`]. Every branch measures the wall-clock duration.
//!
//! Isolation is at hook granularity only. A test that corrupts global
//! state can affect later tests; nothing here promises process isolation.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coverage::{self, CoverageBackend, CoverageCollection};
use crate::framework::quiet_panics;
use crate::inspector::{ModuleMethods, TestMethod};
use crate::registry::Registry;

/// Outcome of one method execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The method ran to completion.
    Pass,

    /// The assertion primitive signalled a mismatch.
    Fail,

    /// The method could not run, or raised anything else.
    Error,
}

impl TestStatus {
    /// Uppercase label used by the report.
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Error => "ERROR",
        }
    }
}

/// The outcome of one method execution, created exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResult {
    /// The method that was executed.
    pub method: TestMethod,

    /// Pass/fail/error trichotomy.
    pub status: TestStatus,

    /// Wall-clock time for the execution, whatever the outcome.
    pub duration: Duration,

    /// Diagnostic message; absent exactly when the method passed.
    pub error: Option<String>,

    /// Failure site or panic location, when known.
    pub traceback: Option<String>,
}

/// Aggregate over a run: append-only, frozen at [`stop_timing`].
///
/// `total == passed + failed + errors == results.len()` after every
/// [`add_result`].
///
/// [`stop_timing`]: TestResult::stop_timing
/// [`add_result`]: TestResult::add_result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResult {
    pub results: Vec<MethodResult>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Duration,
}

impl TestResult {
    /// Appends one method result and bumps the matching counter.
    pub fn add_result(&mut self, result: MethodResult) {
        match result.status {
            TestStatus::Pass => self.passed += 1,
            TestStatus::Fail => self.failed += 1,
            TestStatus::Error => self.errors += 1,
        }
        self.total += 1;
        self.results.push(result);
    }

    /// Marks the start of the run.
    pub fn start_timing(&mut self) {
        self.start_time = Some(Utc::now());
    }

    /// Marks the end of the run and fixes the wall-clock duration.
    pub fn stop_timing(&mut self) {
        let end = Utc::now();
        self.end_time = Some(end);
        if let Some(start) = self.start_time {
            self.duration = (end - start).to_std().unwrap_or_default();
        }
    }

    /// Success rate in percent; `0.0` for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    /// All non-passing results, in execution order.
    pub fn failed_results(&self) -> Vec<&MethodResult> {
        self.results
            .iter()
            .filter(|result| result.status != TestStatus::Pass)
            .collect()
    }
}

/// Runs a single test method and collects its result.
///
/// The owning module is re-loaded for every call, so module
/// initialisation failures surface per method rather than aborting the
/// run.
pub fn run_single(registry: &Registry, method: &TestMethod) -> MethodResult {
    let start = Instant::now();

    let outcome = |status, duration, error, traceback| MethodResult {
        method: method.clone(),
        status,
        duration,
        error,
        traceback,
    };

    let tests = match registry.load(&method.module, method.file_path.as_deref()) {
        Ok(tests) => tests,
        Err(load_error) => {
            return outcome(
                TestStatus::Error,
                start.elapsed(),
                Some(format!("Failed to import module: {load_error}")),
                None,
            );
        }
    };

    let Some(entry) = tests.find(method.class_name.as_deref(), &method.name) else {
        return outcome(
            TestStatus::Error,
            start.elapsed(),
            Some(format!(
                "Test '{}' not found in module '{}'",
                method.name, method.module
            )),
            None,
        );
    };

    let suite_result = entry.suite().run();
    let duration = start.elapsed();

    // Only the first failure or error entry is reported; later entries
    // (e.g. a tear_down panic after a method failure) stay in the suite
    // result but are not surfaced.
    if suite_result.was_successful() {
        outcome(TestStatus::Pass, duration, None, None)
    } else if let Some(first) = suite_result.failures.first() {
        outcome(
            TestStatus::Fail,
            duration,
            Some(first.message.clone()),
            first.trace.clone(),
        )
    } else if let Some(first) = suite_result.errors.first() {
        outcome(
            TestStatus::Error,
            duration,
            Some(first.message.clone()),
            first.trace.clone(),
        )
    } else {
        outcome(
            TestStatus::Error,
            duration,
            Some("Unknown test result state".to_string()),
            None,
        )
    }
}

/// Runs every method, bracketing the run with coverage collection.
///
/// Returns the aggregate result plus the (stopped) coverage collection
/// when one was started. Progress is rendered on a terminal bar with one
/// line per completed method.
pub fn run_all(
    registry: &Registry,
    modules: &[ModuleMethods],
    collect_coverage: bool,
    coverage_backend: Option<Box<dyn CoverageBackend>>,
) -> (TestResult, Option<CoverageCollection>) {
    info!("Starting test execution...");

    let mut test_result = TestResult::default();
    test_result.start_timing();

    let mut collection = if collect_coverage {
        coverage::start_collection(coverage_backend)
    } else {
        None
    };

    let total: usize = modules.iter().map(|module| module.methods.len()).sum();
    info!(
        "Running {total} test methods across {} modules",
        modules.len()
    );

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Expected test panics must not spray backtraces over the report.
    let _hook = quiet_panics();

    for module in modules {
        progress.println(format!("Running tests in module: {}", module.module));

        for method in &module.methods {
            let result = run_single(registry, method);

            let status = match result.status {
                TestStatus::Pass => console::style("PASS").green(),
                TestStatus::Fail => console::style("FAIL").red(),
                TestStatus::Error => console::style("ERROR").red().bold(),
            };
            progress.println(format!(
                "  {} {} ({:.3}s)",
                status,
                result.method.full_name(),
                result.duration.as_secs_f64()
            ));
            progress.inc(1);

            test_result.add_result(result);
        }
    }

    progress.finish_and_clear();
    test_result.stop_timing();

    coverage::stop_collection(&mut collection);

    info!(
        "Test execution completed in {:.2} seconds",
        test_result.duration.as_secs_f64()
    );

    (test_result, collection)
}
