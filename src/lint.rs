//! Style-lint orchestration over a pluggable backend.
//!
//! Like coverage, the lint backend is a capability that may be absent. The
//! orchestrator collects the files to check (either an explicit list or a
//! walk of the search path, skipping version-control metadata, build
//! output, coverage output, and virtual-env style trees), hands them to the
//! backend, and reduces the answer to a single count:
//!
//! | Return | Meaning |
//! |--------|---------|
//! | `-1`   | backend unavailable or internal error |
//! | `0`    | clean |
//! | `n`    | `n` style violations |
//!
//! A `-1` renders a distinct "linting failed" message but does not fail
//! the exit status; only a positive violation count does.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::discovery::SOURCE_EXT;

/// Sentinel for "the lint pass could not run".
pub const LINT_UNAVAILABLE: i32 = -1;

/// Directory names never descended into during the lint walk.
const SKIPPED_DIRS: &[&str] = &[
    ".git", ".hg", ".svn", "target", "htmlcov", ".venv", "venv", ".cargo", ".idea",
];

/// A style checker over source files.
///
/// Implemented outside the engine; the orchestrator only hands it a file
/// list and reads back a violation count.
pub trait LintBackend {
    /// Checks the given files, returning the number of violations found.
    fn check_files(&self, files: &[PathBuf]) -> Result<usize>;
}

/// Runs the style-lint pass.
///
/// With `specific_files` the list is filtered down to existing source
/// files; otherwise the search path is walked. See the module docs for the
/// return contract.
pub fn run_lint(
    backend: Option<&dyn LintBackend>,
    search_path: &Path,
    specific_files: Option<&[PathBuf]>,
) -> i32 {
    let Some(backend) = backend else {
        warn!("Lint backend not available");
        return LINT_UNAVAILABLE;
    };

    info!("Running code style checks...");

    let files = match specific_files {
        Some(files) => files
            .iter()
            .filter(|file| is_source_file(file) && file.exists())
            .cloned()
            .collect(),
        None => collect_source_files(search_path),
    };

    if files.is_empty() {
        warn!("No source files found to lint");
        return 0;
    }

    info!("Found {} source files to check", files.len());

    match backend.check_files(&files) {
        Ok(count) => i32::try_from(count).unwrap_or(i32::MAX),
        Err(error) => {
            warn!("Error running style checks: {error:#}");
            LINT_UNAVAILABLE
        }
    }
}

/// Walks the search path for source files, skipping excluded directories.
fn collect_source_files(search_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(search_path)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && is_skipped_dir(entry.file_name().to_string_lossy().as_ref()))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_source_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    files
}

fn is_skipped_dir(name: &str) -> bool {
    SKIPPED_DIRS.contains(&name)
}

fn is_source_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXT)
}
