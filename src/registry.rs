//! The module registry: named translation units and their test entries.
//!
//! A reflective host enumerates test classes straight out of a loaded
//! module. A compiled program cannot, so the engine inverts the contract:
//! each test module registers itself under a name, together with an
//! initialisation closure that enumerates its tests into a [`ModuleTests`]
//! value. "Loading a module" means running that closure; a closure that
//! returns an error or panics is the moral equivalent of a module that fails
//! to import, and the pipeline degrades the same way (a warning plus an
//! empty method list, or a per-method error result).
//!
//! # Registration
//!
//! ```
//! use testrules::registry::Registry;
//! use testrules::framework::TestCase;
//! use testrules::check_eq;
//!
//! #[derive(Default)]
//! struct TestClean;
//!
//! impl TestCase for TestClean {}
//!
//! impl TestClean {
//!     fn test_basic(&mut self) {
//!         check_eq!(2 + 2, 4);
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register("test_clean", |m| {
//!     m.case::<TestClean>("TestClean")
//!         .method("test_basic", TestClean::test_basic);
//!     m.function("test_standalone", || check_eq!(1, 1));
//!     Ok(())
//! });
//!
//! let tests = registry.load("test_clean", None).unwrap();
//! assert_eq!(tests.entries().len(), 2);
//! ```
//!
//! # Resolution path
//!
//! The registry owns the module-resolution path: an ordered list of
//! directories module initialisers may consult to locate sibling resources.
//! Loading a module from a file transiently prepends the file's directory
//! through an RAII [`PathGuard`]; the entry is removed on drop exactly iff
//! it was added, on success and failure paths alike, and pre-existing
//! entries are never disturbed.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::framework::{Suite, TestCase, TestFn, panic_message};

/// Initialisation closure for one registered module.
pub type ModuleInit = Arc<dyn Fn(&mut ModuleTests) -> anyhow::Result<()> + Send + Sync>;

/// Why a module failed to load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No module is registered under the requested name.
    #[error("no module registered under '{0}'")]
    NotRegistered(String),

    /// The module's initialiser returned an error.
    #[error("module '{module}' failed to initialize: {message}")]
    Init { module: String, message: String },

    /// The module's initialiser panicked.
    #[error("module '{module}' panicked during initialization: {message}")]
    Panicked { module: String, message: String },
}

/// How a test entry's body is invoked.
pub enum TestBody {
    /// A method bound to a test-case type; the thunk builds the
    /// single-method suite around a fresh instance.
    Method(Arc<dyn Fn() -> Suite + Send + Sync>),

    /// A standalone function, wrapped in a synthetic case at run time.
    Standalone(TestFn),
}

/// One registered test: a name, an optional owning class, and a body.
pub struct TestEntry {
    name: String,
    class_name: Option<String>,
    body: TestBody,
}

impl TestEntry {
    /// The method or function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning class name; `None` for standalone functions.
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Builds the single-method suite for this entry.
    pub fn suite(&self) -> Suite {
        match &self.body {
            TestBody::Method(make) => make(),
            TestBody::Standalone(function) => Suite::for_function(Arc::clone(function)),
        }
    }
}

/// The enumerated tests of one loaded module.
pub struct ModuleTests {
    module: String,
    file_path: Option<PathBuf>,
    resolution: Vec<PathBuf>,
    entries: Vec<TestEntry>,
}

impl std::fmt::Debug for ModuleTests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleTests")
            .field("module", &self.module)
            .field("file_path", &self.file_path)
            .field("resolution", &self.resolution)
            .field("entries", &self.entries.iter().map(TestEntry::name).collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleTests {
    fn new(module: &str, file_path: Option<&Path>, resolution: Vec<PathBuf>) -> Self {
        Self {
            module: module.to_string(),
            file_path: file_path.map(Path::to_path_buf),
            resolution,
            entries: Vec::new(),
        }
    }

    /// The module name this enumeration belongs to.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The source file the module was loaded from, when known.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// The resolution path in effect during this load, front entry first.
    ///
    /// Initialisers use this to locate sibling resources next to the module
    /// source without touching the process working directory.
    pub fn resolution_path(&self) -> &[PathBuf] {
        &self.resolution
    }

    /// Entries in registration order: class-bound methods and standalone
    /// functions interleaved exactly as the initialiser declared them.
    pub fn entries(&self) -> &[TestEntry] {
        &self.entries
    }

    /// Looks up one entry by owning class and name.
    pub fn find(&self, class_name: Option<&str>, name: &str) -> Option<&TestEntry> {
        self.entries
            .iter()
            .find(|entry| entry.class_name.as_deref() == class_name && entry.name == name)
    }

    /// Starts enumerating the methods of a test-case type.
    pub fn case<C: TestCase + 'static>(&mut self, class_name: &str) -> CaseTests<'_, C> {
        CaseTests {
            module: self,
            class_name: class_name.to_string(),
            _case: PhantomData,
        }
    }

    /// Registers a standalone test function.
    pub fn function(&mut self, name: &str, function: impl Fn() + Send + Sync + 'static) {
        self.entries.push(TestEntry {
            name: name.to_string(),
            class_name: None,
            body: TestBody::Standalone(Arc::new(function)),
        });
    }
}

/// Builder enumerating the methods of one test-case type.
pub struct CaseTests<'m, C> {
    module: &'m mut ModuleTests,
    class_name: String,
    _case: PhantomData<C>,
}

impl<C: TestCase + 'static> CaseTests<'_, C> {
    /// Registers one method of the case type.
    pub fn method(self, name: &str, method: fn(&mut C)) -> Self {
        self.module.entries.push(TestEntry {
            name: name.to_string(),
            class_name: Some(self.class_name.clone()),
            body: TestBody::Method(Arc::new(move || Suite::for_case(method))),
        });
        self
    }
}

/// All registered modules plus the module-resolution path.
pub struct Registry {
    modules: BTreeMap<String, ModuleInit>,
    resolution_path: Mutex<Vec<PathBuf>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            resolution_path: Mutex::new(Vec::new()),
        }
    }

    /// Registers a module under `name`.
    ///
    /// Registering the same name again replaces the previous initialiser,
    /// the way re-importing a module rebinds it.
    pub fn register<F>(&mut self, name: &str, init: F)
    where
        F: Fn(&mut ModuleTests) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.modules.insert(name.to_string(), Arc::new(init));
    }

    /// Whether a module is registered under `name`.
    pub fn is_registered(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Loads a module, enumerating its tests afresh.
    ///
    /// When `file_path` is given and exists, the file's directory is
    /// prepended to the resolution path for the duration of the load and
    /// removed afterwards (exactly iff it was added). Initialiser errors
    /// and panics are captured as [`LoadError`]s; nothing propagates.
    pub fn load(&self, module_name: &str, file_path: Option<&Path>) -> Result<ModuleTests, LoadError> {
        let existing_file = file_path.filter(|path| path.exists());

        // The guard must outlive the init call so the directory is visible
        // while the module enumerates, and must drop on every exit path.
        let _guard = existing_file
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| self.extend_resolution_path(dir));

        let init = self
            .modules
            .get(module_name)
            .ok_or_else(|| LoadError::NotRegistered(module_name.to_string()))?;

        let mut tests = ModuleTests::new(module_name, existing_file, self.resolution_path());
        match panic::catch_unwind(AssertUnwindSafe(|| init(&mut tests))) {
            Ok(Ok(())) => Ok(tests),
            Ok(Err(error)) => Err(LoadError::Init {
                module: module_name.to_string(),
                message: format!("{error:#}"),
            }),
            Err(payload) => Err(LoadError::Panicked {
                module: module_name.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// A snapshot of the current resolution path, front entry first.
    pub fn resolution_path(&self) -> Vec<PathBuf> {
        self.lock_path().clone()
    }

    /// Prepends `dir` to the resolution path unless already present.
    ///
    /// The returned guard removes the entry on drop exactly iff this call
    /// added it.
    pub fn extend_resolution_path(&self, dir: &Path) -> PathGuard<'_> {
        let dir = dir.to_path_buf();
        let added = {
            let mut path = self.lock_path();
            if path.contains(&dir) {
                false
            } else {
                path.insert(0, dir.clone());
                true
            }
        };
        PathGuard {
            registry: self,
            dir,
            added,
        }
    }

    fn lock_path(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.resolution_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped resolution-path extension; removes its entry on drop.
pub struct PathGuard<'r> {
    registry: &'r Registry,
    dir: PathBuf,
    added: bool,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        if self.added {
            let mut path = self.registry.lock_path();
            if let Some(index) = path.iter().position(|entry| entry == &self.dir) {
                path.remove(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_eq;
    use std::io::Write;

    #[derive(Default)]
    struct TestSample;

    impl TestCase for TestSample {}

    impl TestSample {
        fn test_one(&mut self) {
            check_eq!(1, 1);
        }

        fn test_two(&mut self) {
            check_eq!(2, 2);
        }
    }

    fn sample_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("test_sample", |m| {
            m.case::<TestSample>("TestSample")
                .method("test_one", TestSample::test_one)
                .method("test_two", TestSample::test_two);
            m.function("test_standalone", || check_eq!(3, 3));
            Ok(())
        });
        registry
    }

    #[test]
    fn test_load_enumerates_in_registration_order() {
        let registry = sample_registry();
        let tests = registry.load("test_sample", None).unwrap();

        let names: Vec<_> = tests.entries().iter().map(TestEntry::name).collect();
        assert_eq!(names, ["test_one", "test_two", "test_standalone"]);
        assert_eq!(tests.entries()[0].class_name(), Some("TestSample"));
        assert_eq!(tests.entries()[2].class_name(), None);
    }

    #[test]
    fn test_load_unregistered_module() {
        let registry = Registry::new();
        let error = registry.load("missing", None).unwrap_err();
        assert!(matches!(error, LoadError::NotRegistered(name) if name == "missing"));
    }

    #[test]
    fn test_load_captures_init_error() {
        let mut registry = Registry::new();
        registry.register("test_broken", |_| anyhow::bail!("missing dependency"));

        let error = registry.load("test_broken", None).unwrap_err();
        assert!(error.to_string().contains("missing dependency"));
    }

    #[test]
    fn test_load_captures_init_panic() {
        let mut registry = Registry::new();
        registry.register("test_panics", |_| panic!("bad module body"));

        let error = registry.load("test_panics", None).unwrap_err();
        assert!(matches!(error, LoadError::Panicked { .. }));
        assert!(error.to_string().contains("bad module body"));
    }

    #[test]
    fn test_find_distinguishes_class_and_standalone() {
        let registry = sample_registry();
        let tests = registry.load("test_sample", None).unwrap();

        assert!(tests.find(Some("TestSample"), "test_one").is_some());
        assert!(tests.find(None, "test_standalone").is_some());
        assert!(tests.find(None, "test_one").is_none());
        assert!(tests.find(Some("Other"), "test_one").is_none());
    }

    #[test]
    fn test_entry_suites_run() {
        let registry = sample_registry();
        let tests = registry.load("test_sample", None).unwrap();

        for entry in tests.entries() {
            assert!(entry.suite().run().was_successful(), "{} failed", entry.name());
        }
    }

    #[test]
    fn test_path_guard_adds_and_removes() {
        let registry = Registry::new();
        assert!(registry.resolution_path().is_empty());

        {
            let _guard = registry.extend_resolution_path(Path::new("/tmp/fixtures"));
            assert_eq!(registry.resolution_path(), vec![PathBuf::from("/tmp/fixtures")]);
        }

        assert!(registry.resolution_path().is_empty());
    }

    #[test]
    fn test_path_guard_leaves_existing_entry() {
        let registry = Registry::new();
        let _outer = registry.extend_resolution_path(Path::new("/tmp/fixtures"));

        {
            let _inner = registry.extend_resolution_path(Path::new("/tmp/fixtures"));
            assert_eq!(registry.resolution_path().len(), 1);
        }

        // The inner guard did not add the entry, so it must not remove it.
        assert_eq!(registry.resolution_path(), vec![PathBuf::from("/tmp/fixtures")]);
    }

    #[test]
    fn test_resolution_path_restored_after_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test_sample.rs");
        writeln!(std::fs::File::create(&file).unwrap(), "// fixture").unwrap();

        let mut registry = sample_registry();
        registry.register("test_broken", |_| anyhow::bail!("no dice"));

        let before = registry.resolution_path();

        let tests = registry.load("test_sample", Some(&file)).unwrap();
        assert_eq!(tests.resolution_path().first(), Some(&dir.path().to_path_buf()));
        assert_eq!(registry.resolution_path(), before);

        // The failure path restores the resolution path too.
        let broken = dir.path().join("test_broken.rs");
        writeln!(std::fs::File::create(&broken).unwrap(), "// fixture").unwrap();
        assert!(registry.load("test_broken", Some(&broken)).is_err());
        assert_eq!(registry.resolution_path(), before);
    }

    #[test]
    fn test_reregistering_replaces_initialiser() {
        let mut registry = sample_registry();
        registry.register("test_sample", |m| {
            m.function("test_only", || {});
            Ok(())
        });

        let tests = registry.load("test_sample", None).unwrap();
        assert_eq!(tests.entries().len(), 1);
        assert_eq!(tests.entries()[0].name(), "test_only");
    }
}
