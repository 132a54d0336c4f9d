//! Configuration loading and schema for the test runner.
//!
//! Configuration lives in a single JSON file (default `testrules.json` in
//! the working directory). Every field is optional; missing fields inherit
//! the documented defaults. Loading never fails: a missing file, an I/O
//! error, and a parse error all degrade to the pure-default [`Config`] with
//! a diagnostic on the log stream, because a broken config must not take
//! the test run down with it.
//!
//! # Schema
//!
//! ```json
//! {
//!   "test_patterns":     { "unit": ["test_*.rs", "*_test.rs"] },
//!   "test_groups":       { "core": ["test_clean"] },
//!   "coverage_enabled":  true,
//!   "html_coverage":     true,
//!   "html_coverage_dir": "htmlcov"
//! }
//! ```
//!
//! Unknown top-level keys are preserved (so a serialized `Config` round-trips)
//! but ignored by every downstream component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "testrules.json";

/// Effective runtime configuration.
///
/// Created once at startup and treated as immutable for the rest of the
/// process. Maps are ordered so iteration (and therefore log output and
/// all-types discovery) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filename glob patterns per test type.
    pub test_patterns: BTreeMap<String, Vec<String>>,

    /// Named groups of module names, bypassing pattern matching.
    pub test_groups: BTreeMap<String, Vec<String>>,

    /// Whether the executor brackets the run with coverage collection.
    pub coverage_enabled: bool,

    /// Whether a HTML coverage tree is emitted after the text report.
    pub html_coverage: bool,

    /// Output directory for the HTML coverage tree.
    pub html_coverage_dir: PathBuf,

    /// Unknown top-level keys, preserved verbatim and ignored.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        let patterns = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

        Self {
            test_patterns: BTreeMap::from([
                ("unit".to_string(), patterns(&["test_*.rs", "*_test.rs"])),
                (
                    "integration".to_string(),
                    patterns(&["integration_test_*.rs", "*_integration_test.rs"]),
                ),
                ("e2e".to_string(), patterns(&["e2e_test_*.rs", "*_e2e_test.rs"])),
                (
                    "regression".to_string(),
                    patterns(&["regression_test_*.rs", "*_regression_test.rs"]),
                ),
            ]),
            test_groups: BTreeMap::from([("all".to_string(), Vec::new())]),
            coverage_enabled: true,
            html_coverage: true,
            html_coverage_dir: PathBuf::from("htmlcov"),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// All configured test type names.
    pub fn test_types(&self) -> Vec<&str> {
        self.test_patterns.keys().map(String::as_str).collect()
    }

    /// Whether `test_type` is configured.
    pub fn has_test_type(&self, test_type: &str) -> bool {
        self.test_patterns.contains_key(test_type)
    }

    /// Patterns for one test type; empty when the type is unknown.
    pub fn patterns_for(&self, test_type: &str) -> &[String] {
        self.test_patterns
            .get(test_type)
            .map_or(&[], Vec::as_slice)
    }

    /// Whether `group` names a configured test group.
    pub fn has_group(&self, group: &str) -> bool {
        self.test_groups.contains_key(group)
    }

    /// Registers an additional test type with its patterns.
    pub fn add_test_type(&mut self, test_type: &str, patterns: Vec<String>) {
        self.test_patterns.insert(test_type.to_string(), patterns);
    }
}

/// Loads configuration from a JSON file, falling back to defaults.
///
/// Never fails: a missing file logs an info line, an unreadable or
/// unparsable file logs a warning, and both return `Config::default()`.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "No configuration file found at {}, using defaults",
            path.display()
        );
        return Config::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            warn!(
                "Error reading configuration file {}: {error}; using default configuration",
                path.display()
            );
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(error) => {
            warn!(
                "Error parsing configuration file {}: {error}; using default configuration",
                path.display()
            );
            Config::default()
        }
    }
}
