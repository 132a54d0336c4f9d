//! Coverage orchestration over a pluggable backend.
//!
//! The engine does not count lines or branches itself; a
//! [`CoverageBackend`] does. The orchestrator brackets the executor's run
//! with `start`/`stop`, then asks the backend for a per-file
//! [`FileAnalysis`] to render the text table and the HTML tree.
//!
//! The backend is a capability that may be absent, and every operation
//! here is best-effort: backend unavailability, initialisation failures,
//! and per-file analysis errors degrade to a warning. Coverage never
//! affects test outcomes or the exit status.
//!
//! # Report format
//!
//! ```text
//! Name                              Stmts     Miss   Branch   BrPart    Cover
//! ------------------------------------------------------------------------
//! src/engine.rs                       120       10       16        2    91.7%
//!                                Missing: 14, 88-92, 140
//! ------------------------------------------------------------------------
//! TOTAL                               120       10       16        2    91.7%
//! ```
//!
//! Missing-line ranges are only printed for files with at most ten missing
//! lines; beyond that the list stops carrying information.

use std::path::{Path, PathBuf};

use anyhow::Result;
use console::style;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;

/// Missing-line lists longer than this are not printed per file.
const MAX_MISSING_LINES_SHOWN: usize = 10;

/// Collector settings handed to the backend at start.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Root the counters are measured under.
    pub source_root: PathBuf,

    /// Whether branch counters are enabled alongside line counters.
    pub branch: bool,

    /// Glob patterns for paths excluded from measurement.
    pub omit: Vec<String>,
}

impl CollectorConfig {
    /// The engine's standard collector: branch coverage rooted at `.`,
    /// omitting test files, build output, and vendored trees.
    pub fn for_run() -> Self {
        Self {
            source_root: PathBuf::from("."),
            branch: true,
            omit: [
                "*/tests/*",
                "test_*",
                "*_test.rs",
                "build.rs",
                "*/target/*",
                "*/vendor/*",
                "*/.cargo/*",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Per-file analysis produced by the backend.
#[derive(Debug, Clone, Default)]
pub struct FileAnalysis {
    /// Executable statements in the file.
    pub statements: usize,

    /// Line numbers that were never executed.
    pub missing_lines: Vec<u32>,

    /// Branch points in the file.
    pub branches: usize,

    /// Branch points only partially taken.
    pub partial_branches: usize,
}

/// Totals across every measured file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub statements: usize,
    pub missing: usize,
    pub branches: usize,
    pub partial_branches: usize,

    /// Percentage of statements executed.
    pub line_coverage: f64,

    /// Percentage of branches fully taken.
    pub branch_coverage: f64,
}

/// A line/branch counter over instrumented source.
///
/// Implemented outside the engine; the orchestrator only starts, stops,
/// and queries it. Implementations must tolerate `analyze` being called
/// after `stop`.
pub trait CoverageBackend {
    /// Initialises counting with the given collector settings.
    fn start(&mut self, collector: &CollectorConfig) -> Result<()>;

    /// Stops counting and persists raw data.
    fn stop(&mut self) -> Result<()>;

    /// Files that were measured, in any order.
    fn measured_files(&self) -> Vec<PathBuf>;

    /// Line/branch analysis for one measured file.
    fn analyze(&self, file: &Path) -> Result<FileAnalysis>;

    /// Writes the HTML report tree under `dir`.
    fn write_html(&self, dir: &Path) -> Result<()>;
}

/// A started (and later stopped) coverage collection.
pub struct CoverageCollection {
    backend: Box<dyn CoverageBackend>,
}

/// Starts coverage collection, degrading to `None` on any problem.
pub fn start_collection(backend: Option<Box<dyn CoverageBackend>>) -> Option<CoverageCollection> {
    let Some(mut backend) = backend else {
        warn!("Coverage backend not available; running without coverage");
        return None;
    };

    match backend.start(&CollectorConfig::for_run()) {
        Ok(()) => {
            info!("Coverage collection started with branch coverage enabled");
            Some(CoverageCollection { backend })
        }
        Err(error) => {
            warn!("Failed to initialize coverage collection: {error:#}");
            None
        }
    }
}

/// Stops collection and persists data. Returns whether that succeeded.
pub fn stop_collection(collection: &mut Option<CoverageCollection>) -> bool {
    let Some(collection) = collection.as_mut() else {
        return false;
    };

    match collection.backend.stop() {
        Ok(()) => {
            info!("Coverage collection completed and data saved");
            true
        }
        Err(error) => {
            warn!("Error stopping coverage collection: {error:#}");
            false
        }
    }
}

/// Renders the fixed-width coverage table and returns the totals.
///
/// Files that fail to analyze are warned about and skipped; an empty
/// measurement set yields `None`.
pub fn render_report(collection: &CoverageCollection) -> Option<CoverageSummary> {
    let mut files = collection.backend.measured_files();
    if files.is_empty() {
        warn!("No files were measured for coverage");
        return None;
    }
    files.sort();

    println!();
    println!("{}", style("COVERAGE REPORT").bold());
    println!("{}", "=".repeat(72));
    println!(
        "{:<30} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Name", "Stmts", "Miss", "Branch", "BrPart", "Cover"
    );
    println!("{}", "-".repeat(72));

    let mut totals = CoverageSummary {
        statements: 0,
        missing: 0,
        branches: 0,
        partial_branches: 0,
        line_coverage: 100.0,
        branch_coverage: 100.0,
    };

    for file in &files {
        let analysis = match collection.backend.analyze(file) {
            Ok(analysis) => analysis,
            Err(error) => {
                warn!("Error analyzing coverage for {}: {error:#}", file.display());
                continue;
            }
        };

        let missing = analysis.missing_lines.len();
        let percent = line_percent(analysis.statements, missing);

        totals.statements += analysis.statements;
        totals.missing += missing;
        totals.branches += analysis.branches;
        totals.partial_branches += analysis.partial_branches;

        println!(
            "{:<30} {:>8} {:>8} {:>8} {:>8} {:>7.1}%",
            display_name(file),
            analysis.statements,
            missing,
            analysis.branches,
            analysis.partial_branches,
            percent
        );

        if missing > 0 && missing <= MAX_MISSING_LINES_SHOWN {
            let ranges = compress_ranges(&analysis.missing_lines);
            println!("{:<30} Missing: {}", "", ranges.join(", "));
        }
    }

    totals.line_coverage = line_percent(totals.statements, totals.missing);
    totals.branch_coverage = branch_percent(totals.branches, totals.partial_branches);

    println!("{}", "-".repeat(72));
    println!(
        "{:<30} {:>8} {:>8} {:>8} {:>8} {:>7.1}%",
        "TOTAL",
        totals.statements,
        totals.missing,
        totals.branches,
        totals.partial_branches,
        totals.line_coverage
    );

    println!();
    println!("{}", style("COVERAGE SUMMARY:").bold());
    println!(
        "   Lines covered: {}/{} ({:.1}%)",
        totals.statements - totals.missing,
        totals.statements,
        totals.line_coverage
    );
    if totals.branches > 0 {
        println!(
            "   Branches covered: {}/{} ({:.1}%)",
            totals.branches - totals.partial_branches,
            totals.branches,
            totals.branch_coverage
        );
    }

    Some(totals)
}

/// Emits the HTML tree and prints the absolute index path.
pub fn render_html_report(collection: &CoverageCollection, config: &Config) -> bool {
    if !config.html_coverage {
        info!("HTML coverage report generation is disabled in configuration");
        return false;
    }

    let html_dir = &config.html_coverage_dir;
    if !html_dir.exists() {
        if let Err(error) = std::fs::create_dir_all(html_dir) {
            warn!(
                "Could not create HTML coverage directory {}: {error}",
                html_dir.display()
            );
            return false;
        }
        info!("Created HTML coverage directory: {}", html_dir.display());
    }

    info!("Generating HTML coverage report...");
    if let Err(error) = collection.backend.write_html(html_dir) {
        warn!("Error generating HTML coverage report: {error:#}");
        return false;
    }

    let index = html_dir.join("index.html");
    if !index.exists() {
        warn!("HTML report was generated but index.html not found at expected location");
        return false;
    }

    match std::path::absolute(&index) {
        Ok(absolute) => {
            println!("HTML coverage report saved to: {}", absolute.display());
            println!("Open in browser: file://{}", absolute.display());
        }
        Err(_) => println!("HTML coverage report saved to: {}", index.display()),
    }
    true
}

fn line_percent(statements: usize, missing: usize) -> f64 {
    if statements == 0 {
        100.0
    } else {
        (statements - missing) as f64 / statements as f64 * 100.0
    }
}

fn branch_percent(branches: usize, partial: usize) -> f64 {
    if branches == 0 {
        100.0
    } else {
        (branches - partial) as f64 / branches as f64 * 100.0
    }
}

fn display_name(file: &Path) -> String {
    let name = file.display().to_string();
    let count = name.chars().count();
    if count > 28 {
        let tail: String = name.chars().skip(count - 25).collect();
        format!("...{tail}")
    } else {
        name
    }
}

/// Compresses sorted line numbers into `a` / `a-b` range strings.
fn compress_ranges(lines: &[u32]) -> Vec<String> {
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return ranges;
    };

    let (mut start, mut end) = (first, first);
    for line in iter {
        if line == end + 1 {
            end = line;
        } else {
            ranges.push(format_range(start, end));
            start = line;
            end = line;
        }
    }
    ranges.push(format_range(start, end));
    ranges
}

fn format_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeBackend {
        started: bool,
        stopped: bool,
        fail_start: bool,
        analyses: BTreeMap<PathBuf, FileAnalysis>,
    }

    impl CoverageBackend for FakeBackend {
        fn start(&mut self, collector: &CollectorConfig) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("no data directory");
            }
            assert!(collector.branch);
            self.started = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.stopped = true;
            Ok(())
        }

        fn measured_files(&self) -> Vec<PathBuf> {
            self.analyses.keys().cloned().collect()
        }

        fn analyze(&self, file: &Path) -> Result<FileAnalysis> {
            self.analyses
                .get(file)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("not measured"))
        }

        fn write_html(&self, dir: &Path) -> Result<()> {
            std::fs::write(dir.join("index.html"), "<html></html>")?;
            Ok(())
        }
    }

    #[test]
    fn test_compress_ranges() {
        assert!(compress_ranges(&[]).is_empty());
        assert_eq!(compress_ranges(&[7]), ["7"]);
        assert_eq!(compress_ranges(&[1, 2, 3]), ["1-3"]);
        assert_eq!(compress_ranges(&[3, 1, 2, 9, 11, 12]), ["1-3", "9", "11-12"]);
    }

    #[test]
    fn test_start_collection_without_backend() {
        assert!(start_collection(None).is_none());
    }

    #[test]
    fn test_start_collection_init_failure_degrades() {
        let backend = FakeBackend {
            fail_start: true,
            ..FakeBackend::default()
        };
        assert!(start_collection(Some(Box::new(backend))).is_none());
    }

    #[test]
    fn test_stop_collection() {
        let mut none = None;
        assert!(!stop_collection(&mut none));

        let mut started = start_collection(Some(Box::new(FakeBackend::default())));
        assert!(started.is_some());
        assert!(stop_collection(&mut started));
    }

    #[test]
    fn test_render_report_totals() {
        let mut backend = FakeBackend::default();
        backend.analyses.insert(
            PathBuf::from("src/a.rs"),
            FileAnalysis {
                statements: 80,
                missing_lines: vec![4, 5, 6, 10],
                branches: 10,
                partial_branches: 2,
            },
        );
        backend.analyses.insert(
            PathBuf::from("src/b.rs"),
            FileAnalysis {
                statements: 20,
                missing_lines: vec![],
                branches: 0,
                partial_branches: 0,
            },
        );

        let collection = start_collection(Some(Box::new(backend))).unwrap();
        let summary = render_report(&collection).unwrap();

        assert_eq!(summary.statements, 100);
        assert_eq!(summary.missing, 4);
        assert_eq!(summary.branches, 10);
        assert_eq!(summary.partial_branches, 2);
        assert!((summary.line_coverage - 96.0).abs() < 1e-9);
        assert!((summary.branch_coverage - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_report_without_measured_files() {
        let collection = start_collection(Some(Box::new(FakeBackend::default()))).unwrap();
        assert!(render_report(&collection).is_none());
    }

    #[test]
    fn test_html_report_respects_config_switch() {
        let dir = tempfile::tempdir().unwrap();
        let collection = start_collection(Some(Box::new(FakeBackend::default()))).unwrap();

        let mut config = Config::default();
        config.html_coverage_dir = dir.path().join("htmlcov");

        config.html_coverage = false;
        assert!(!render_html_report(&collection, &config));

        config.html_coverage = true;
        assert!(render_html_report(&collection, &config));
        assert!(config.html_coverage_dir.join("index.html").exists());
    }

    #[test]
    fn test_display_name_truncates_long_paths() {
        let long = PathBuf::from("src/some/deeply/nested/module/with/a/long/path/name.rs");
        let shown = display_name(&long);
        assert!(shown.starts_with("..."));
        assert_eq!(shown.chars().count(), 28);
    }
}
