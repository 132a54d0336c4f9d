//! Cascaded test-file discovery.
//!
//! Discovery turns a command (explicit modules, a named group, a test type,
//! or nothing at all) into an ordered list of source files. Strategies are
//! consulted in priority order and the first applicable one wins:
//!
//! | Priority | Input | Strategy |
//! |----------|-------|----------|
//! | 1 | explicit module names | candidate paths, then a recursive search |
//! | 2 | group name | resolve to module names, then strategy 1 |
//! | 3 | test type | expand the type's filename globs recursively |
//! | 4 | nothing | union of strategy 3 over every configured type |
//!
//! Output is always deduplicated and sorted by full path. An empty result
//! is not an error here; the caller decides what exit code that produces.
//!
//! Pattern expansion walks the search path recursively and matches *file
//! names* against the configured globs, so `test_*.rs` finds matches at any
//! depth. The search path is an explicit parameter throughout; discovery
//! never consults or changes the working directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;

/// Extension of the source files the engine discovers.
pub const SOURCE_EXT: &str = "rs";

/// Discovers test files for one command.
///
/// Priority: `modules` over `group` over `test_type` over all types.
/// Lower-priority inputs are not consulted once a strategy applies.
pub fn discover(
    test_type: Option<&str>,
    modules: Option<&[String]>,
    group: Option<&str>,
    config: &Config,
    search_path: &Path,
) -> Vec<PathBuf> {
    let files = if let Some(modules) = modules.filter(|m| !m.is_empty()) {
        info!("Discovering tests for explicit modules: {modules:?}");
        files_by_modules(modules, search_path)
    } else if let Some(group) = group {
        info!("Discovering tests for group: {group}");
        let group_modules = resolve_group(group, config);
        if group_modules.is_empty() {
            warn!("No modules found in group '{group}' or group doesn't exist");
            Vec::new()
        } else {
            files_by_modules(&group_modules, search_path)
        }
    } else if let Some(test_type) = test_type {
        info!("Discovering tests for type: {test_type}");
        files_by_type(test_type, config, search_path)
    } else {
        info!("Discovering all test files");
        let mut all = BTreeSet::new();
        for test_type in config.test_types() {
            all.extend(files_by_type(test_type, config, search_path));
        }
        all.into_iter().collect()
    };

    info!("Found {} test files", files.len());
    files
}

/// Expands one test type's filename patterns as recursive globs.
///
/// Unknown types produce a warning and an empty list, not an error.
pub fn files_by_type(test_type: &str, config: &Config, search_path: &Path) -> Vec<PathBuf> {
    if !config.has_test_type(test_type) {
        warn!("Unknown test type: {test_type}");
        return Vec::new();
    }

    let patterns: Vec<Pattern> = config
        .patterns_for(test_type)
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(error) => {
                warn!("Invalid pattern '{raw}' for test type {test_type}: {error}");
                None
            }
        })
        .collect();

    let mut files = BTreeSet::new();
    for entry in WalkDir::new(search_path).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if patterns.iter().any(|pattern| pattern.matches(&name)) {
            files.insert(entry.into_path());
        }
    }

    files.into_iter().collect()
}

/// Locates source files for explicitly named modules.
///
/// Candidates per module, first hit wins: `<name>.rs` relative to the
/// working directory, `<search_path>/<name>.rs`, then a recursive search
/// below `search_path`. Misses produce a warning and are skipped.
pub fn files_by_modules(module_names: &[String], search_path: &Path) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for module_name in module_names {
        let file_name = format!("{module_name}.{SOURCE_EXT}");

        let direct = PathBuf::from(&file_name);
        let under_search = search_path.join(&file_name);

        if direct.exists() {
            files.insert(direct);
        } else if under_search.exists() {
            files.insert(under_search);
        } else {
            let nested: Vec<PathBuf> = WalkDir::new(search_path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| {
                    entry.file_type().is_file() && entry.file_name().to_string_lossy() == file_name
                })
                .map(walkdir::DirEntry::into_path)
                .collect();

            if nested.is_empty() {
                warn!("Module file not found: {module_name}");
            } else {
                files.extend(nested);
            }
        }
    }

    files.into_iter().collect()
}

/// Resolves a group name to its configured module list.
///
/// Unknown groups produce a warning and an empty list.
pub fn resolve_group(group_name: &str, config: &Config) -> Vec<String> {
    match config.test_groups.get(group_name) {
        Some(modules) => {
            info!(
                "Test group '{group_name}' contains {} modules: {modules:?}",
                modules.len()
            );
            modules.clone()
        }
        None => {
            warn!("Test group '{group_name}' not found in configuration");
            Vec::new()
        }
    }
}
