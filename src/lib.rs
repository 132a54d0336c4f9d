//! # testrules
//!
//! A lightweight, method-level test runner: it discovers test source files
//! by glob patterns, enumerates every registered test method, executes each
//! in an isolated single-method suite, and aggregates structured reports.
//! Optional coverage collection and a style-lint pass fold into the same
//! exit status.
//!
//! ## Architecture
//!
//! The pipeline runs leaves-first through five stages:
//!
//! ### Configuration ([`config`])
//!
//! A single JSON file (`testrules.json`) with per-field defaults. Loading
//! never fails; broken configuration degrades to the defaults with a
//! warning.
//!
//! ### Discovery ([`discovery`])
//!
//! Cascaded strategies produce an ordered, deduplicated file list:
//! explicit modules, then a named group, then a test type's patterns, then
//! every configured type.
//!
//! ### Inspection ([`inspector`] over [`registry`])
//!
//! Modules register themselves in a [`Registry`] — a name plus an
//! initialisation closure enumerating the module's test-case methods and
//! standalone test functions. The inspector loads each discovered file's
//! module through the registry and emits [`TestMethod`] descriptors.
//!
//! ### Execution ([`executor`] over [`framework`])
//!
//! Each method runs in a fresh single-method [`Suite`]: construct the
//! case, `set_up`, method, `tear_down`, all under unwind protection. The
//! distinguished [`framework::Failure`] payload raised by [`check!`],
//! [`check_eq!`], [`check_ne!`] and [`framework::fail`] separates
//! assertion failures from arbitrary panics. Execution is strictly
//! sequential.
//!
//! ### Reporting ([`report`], [`coverage`], [`lint`], [`app`])
//!
//! Summary, per-method detail, and timing sections; an optional coverage
//! table and HTML tree; an optional lint pass. The exit-status combiner
//! maps `(any test failure, any error, lint failed)` to `0` or `1`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use testrules::app::{self, Backends};
//! use testrules::framework::TestCase;
//! use testrules::registry::Registry;
//! use testrules::check_eq;
//!
//! #[derive(Default)]
//! struct TestClean;
//!
//! impl TestCase for TestClean {}
//!
//! impl TestClean {
//!     fn test_addition(&mut self) {
//!         check_eq!(2 + 2, 4);
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register("test_clean", |m| {
//!     m.case::<TestClean>("TestClean")
//!         .method("test_addition", TestClean::test_addition);
//!     Ok(())
//! });
//!
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let code = app::run(
//!     &args,
//!     &registry,
//!     Backends::default(),
//!     Path::new("."),
//!     Path::new("testrules.json"),
//! );
//! std::process::exit(code);
//! ```
//!
//! ## Backends
//!
//! Coverage counting and style linting are external capabilities behind
//! the [`coverage::CoverageBackend`] and [`lint::LintBackend`] traits.
//! When a backend is absent the pipeline warns and degrades; it never
//! fails the run for a missing collaborator.
//!
//! [`Registry`]: registry::Registry
//! [`TestMethod`]: inspector::TestMethod
//! [`Suite`]: framework::Suite

pub mod app;
pub mod config;
pub mod coverage;
pub mod discovery;
pub mod executor;
pub mod framework;
pub mod inspector;
pub mod lint;
pub mod registry;
pub mod report;

// Re-export the types most embedders need.

pub use app::{Action, Backends, exit_code, parse_arguments, run};
pub use config::{Config, load_config};
pub use executor::{MethodResult, TestResult, TestStatus, run_all, run_single};
pub use framework::{Suite, SuiteResult, TestCase, fail};
pub use inspector::{TestMethod, discover_test_methods, inspect};
pub use registry::{ModuleTests, Registry};
