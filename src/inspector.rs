//! Per-module test enumeration.
//!
//! The inspector bridges discovery and execution: given a discovered source
//! file it derives the module name, loads the module through the
//! [`Registry`](crate::registry::Registry) (with the scoped resolution-path
//! extension), and emits one [`TestMethod`] descriptor per enumerated test.
//! Class-bound methods are emitted before standalone functions; within each
//! shape the registry's enumeration order is preserved. Only names starting
//! with `test` become methods.
//!
//! A module that fails to load is reported with a warning and contributes
//! no methods; inspection of the remaining files continues, so one broken
//! module never reduces the results of the others.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::registry::Registry;

/// Prefix a callable must carry to count as a test.
const TEST_PREFIX: &str = "test";

/// A single executable test, identified by `module[.class].name`.
///
/// Created during inspection and never mutated. The full name is the
/// stable identity used by reporting and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethod {
    /// Method or function name.
    pub name: String,

    /// Owning module name.
    pub module: String,

    /// Owning class name; `None` for standalone functions.
    pub class_name: Option<String>,

    /// Source file the module was discovered in.
    pub file_path: Option<PathBuf>,
}

impl TestMethod {
    /// The canonical identity: `module "." (class ".")? name`.
    pub fn full_name(&self) -> String {
        match &self.class_name {
            Some(class_name) => format!("{}.{}.{}", self.module, class_name, self.name),
            None => format!("{}.{}", self.module, self.name),
        }
    }
}

impl std::fmt::Display for TestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// The inspected methods of one module, in execution order.
#[derive(Debug, Clone)]
pub struct ModuleMethods {
    /// Module name derived from the file path.
    pub module: String,

    /// The file the module was discovered in.
    pub file_path: PathBuf,

    /// Methods in enumeration order: class-bound first, then standalone.
    pub methods: Vec<TestMethod>,
}

/// Derives a module name from a source file path.
///
/// The path is taken relative to `search_path` when possible, the
/// extension is dropped, and separators become dots: `sub/test_db.rs`
/// under `search_path` maps to `sub.test_db`.
pub fn module_name_for_path(file_path: &Path, search_path: &Path) -> String {
    let relative = file_path.strip_prefix(search_path).unwrap_or(file_path);
    let trimmed = relative.with_extension("");

    let name = trimmed
        .components()
        .filter_map(|component| match component {
            std::path::Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".");

    name.trim_start_matches('.').to_string()
}

/// Enumerates the test methods of one module.
///
/// Load failures degrade to a warning and an empty list; the pipeline
/// continues with other files.
pub fn inspect(registry: &Registry, module_name: &str, file_path: Option<&Path>) -> Vec<TestMethod> {
    let tests = match registry.load(module_name, file_path) {
        Ok(tests) => tests,
        Err(error) => {
            warn!("Failed to import module {module_name}: {error}");
            return Vec::new();
        }
    };

    let describe = |class_name: Option<&str>, name: &str| TestMethod {
        name: name.to_string(),
        module: module_name.to_string(),
        class_name: class_name.map(str::to_string),
        file_path: file_path.map(Path::to_path_buf),
    };

    let mut methods = Vec::new();

    // Class-bound methods first, standalone functions second, each in
    // registration order.
    for entry in tests.entries() {
        if let Some(class_name) = entry.class_name() {
            if entry.name().starts_with(TEST_PREFIX) {
                methods.push(describe(Some(class_name), entry.name()));
            }
        }
    }
    for entry in tests.entries() {
        if entry.class_name().is_none() && entry.name().starts_with(TEST_PREFIX) {
            methods.push(describe(None, entry.name()));
        }
    }

    methods
}

/// Inspects every discovered file, keeping modules that yielded methods.
///
/// Modules appear in input order; per-module method order is the
/// inspector's enumeration order. Emits a narration line per module and a
/// closing summary.
pub fn discover_test_methods(
    registry: &Registry,
    test_files: &[PathBuf],
    search_path: &Path,
) -> Vec<ModuleMethods> {
    let mut modules = Vec::new();
    let mut failed_modules = Vec::new();

    for file_path in test_files {
        let module_name = module_name_for_path(file_path, search_path);
        info!("Inspecting module: {module_name} ({})", file_path.display());

        if !file_path.exists() {
            warn!("File not found: {}", file_path.display());
            failed_modules.push(module_name);
            continue;
        }

        let methods = inspect(registry, &module_name, Some(file_path));
        if methods.is_empty() {
            info!("No test methods found in {module_name}");
            continue;
        }

        info!("Found {} test methods in {module_name}", methods.len());
        modules.push(ModuleMethods {
            module: module_name,
            file_path: file_path.clone(),
            methods,
        });
    }

    info!(
        "Module discovery summary: {} processed, {} with tests, {} failed",
        test_files.len(),
        modules.len(),
        failed_modules.len()
    );
    if !failed_modules.is_empty() {
        info!("Failed modules: {failed_modules:?}");
    }

    modules
}
