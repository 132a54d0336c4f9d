//! The test framework contract: case hooks, the assertion primitive, and the
//! single-method suite runner.
//!
//! Everything the engine knows about a test boils down to three pieces:
//!
//! 1. **Case hooks** ([`TestCase`]) - `set_up` / `tear_down` run around every
//!    method, because each method executes in its own freshly built suite.
//! 2. **The assertion primitive** - [`check!`], [`check_eq!`], [`check_ne!`]
//!    and [`fail`] raise a distinguished [`Failure`] payload. The suite
//!    runner tells assertion failures apart from arbitrary panics by
//!    downcasting the payload.
//! 3. **The framework result** ([`SuiteResult`]) - ordered lists of failure
//!    and error entries, mirroring what a conventional runner hands back.
//!    The executor maps it into the pass/fail/error trichotomy.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Suite (one method)                  │
//! ├──────────────────────────────────────────────────────────┤
//! │  construct case ─► set_up ─► method ─► tear_down         │
//! │        │               │        │           │            │
//! │        ▼               ▼        ▼           ▼            │
//! │   SuiteResult { failures: [...], errors: [...] }         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A panic in `set_up` skips both the method and `tear_down`; a panic in the
//! method does not skip `tear_down`. Each panicking phase contributes one
//! entry, so a method failure followed by a `tear_down` panic yields a suite
//! with one failure and one error.
//!
//! # Example
//!
//! ```
//! use testrules::framework::{Suite, TestCase};
//! use testrules::check_eq;
//!
//! #[derive(Default)]
//! struct Calculator { total: i64 }
//!
//! impl TestCase for Calculator {
//!     fn set_up(&mut self) {
//!         self.total = 0;
//!     }
//! }
//!
//! impl Calculator {
//!     fn test_addition(&mut self) {
//!         self.total += 2;
//!         check_eq!(self.total, 2);
//!     }
//! }
//!
//! let result = Suite::for_case(Calculator::test_addition as fn(&mut Calculator)).run();
//! assert!(result.was_successful());
//! ```

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Hooks every test-case type provides.
///
/// A case type is instantiated once per method via [`Default`]; `set_up`
/// runs before the method and `tear_down` after it. Both hooks default to
/// no-ops so simple fixtures only implement what they need.
///
/// State does not survive between methods: the executor builds a fresh
/// single-method suite, and therefore a fresh instance, for every method.
pub trait TestCase: Default {
    /// Runs before the test method.
    fn set_up(&mut self) {}

    /// Runs after the test method, even when the method panicked.
    fn tear_down(&mut self) {}
}

/// The distinguished payload raised by the assertion primitive.
///
/// The suite runner downcasts unwind payloads against this type: a `Failure`
/// becomes a *failure* entry, any other panic becomes an *error* entry.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Human-readable mismatch description.
    pub message: String,

    /// `file:line` of the assertion site, captured by the macros.
    pub location: Option<String>,
}

/// Raises an assertion [`Failure`] unconditionally.
///
/// The long-hand form of the `check!` family, for cases where reaching a
/// statement at all is the mismatch:
///
/// ```should_panic
/// use testrules::framework::fail;
///
/// fail("reached unreachable branch");
/// ```
pub fn fail(message: impl Into<String>) -> ! {
    panic::panic_any(Failure {
        message: message.into(),
        location: None,
    });
}

#[doc(hidden)]
pub fn raise_failure(message: String, file: &str, line: u32) -> ! {
    panic::panic_any(Failure {
        message,
        location: Some(format!("{file}:{line}")),
    });
}

/// Asserts that a condition holds, raising a [`Failure`] otherwise.
///
/// An optional trailing format string replaces the default message:
///
/// ```
/// use testrules::check;
///
/// let connected = true;
/// check!(connected);
/// check!(connected, "expected an open connection");
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::framework::raise_failure(
                format!("check failed: {}", stringify!($cond)),
                file!(),
                line!(),
            );
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::framework::raise_failure(format!($($arg)+), file!(), line!());
        }
    };
}

/// Asserts that two values are equal, raising a [`Failure`] otherwise.
///
/// ```
/// use testrules::check_eq;
///
/// check_eq!(1 + 1, 2);
/// ```
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {{
        let left = &$left;
        let right = &$right;
        if !(left == right) {
            $crate::framework::raise_failure(
                format!("check_eq failed: `{left:?}` != `{right:?}`"),
                file!(),
                line!(),
            );
        }
    }};
}

/// Asserts that two values differ, raising a [`Failure`] otherwise.
#[macro_export]
macro_rules! check_ne {
    ($left:expr, $right:expr $(,)?) => {{
        let left = &$left;
        let right = &$right;
        if !(left != right) {
            $crate::framework::raise_failure(
                format!("check_ne failed: both sides are `{left:?}`"),
                file!(),
                line!(),
            );
        }
    }};
}

/// One failure or error entry recorded by a suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The assertion or panic message.
    pub message: String,

    /// Where it happened, when known (`file:line`).
    pub trace: Option<String>,
}

/// What a suite run hands back: ordered failure and error entries.
///
/// Matches the shape of a conventional framework result so the executor's
/// mapping stays a total function over `{successful, failures, errors}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteResult {
    /// Assertion failures, in the order the phases recorded them.
    pub failures: Vec<Diagnostic>,

    /// Non-assertion panics, in the order the phases recorded them.
    pub errors: Vec<Diagnostic>,
}

impl SuiteResult {
    /// `true` when no phase recorded a failure or error.
    pub fn was_successful(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }
}

/// Shared handle to a standalone test function.
pub type TestFn = Arc<dyn Fn() + Send + Sync>;

/// A single-method suite, built by the executor for exactly one run.
///
/// Construction selects the body shape; [`run`](Suite::run) drives the
/// phases under unwind protection and classifies every panic by payload.
pub struct Suite {
    runner: Box<dyn FnOnce() -> SuiteResult + Send>,
}

impl Suite {
    /// Builds a suite around one method of a test-case type.
    ///
    /// The case is instantiated inside the run so construction panics are
    /// captured like any other phase.
    pub fn for_case<C: TestCase + 'static>(method: fn(&mut C)) -> Self {
        Self {
            runner: Box::new(move || run_case(method)),
        }
    }

    /// Wraps a standalone function in a synthetic single-method case.
    ///
    /// The synthetic case has no-op hooks; its sole body invokes the
    /// function.
    pub fn for_function(function: TestFn) -> Self {
        Self {
            runner: Box::new(move || {
                let mut result = SuiteResult::default();
                guarded(|| function(), &mut result);
                result
            }),
        }
    }

    /// Executes the suite and collects its framework result.
    pub fn run(self) -> SuiteResult {
        (self.runner)()
    }
}

fn run_case<C: TestCase>(method: fn(&mut C)) -> SuiteResult {
    let mut result = SuiteResult::default();

    let Some(mut case) = guarded(C::default, &mut result) else {
        return result;
    };

    // A set_up panic skips the method and tear_down; a method panic must
    // still reach tear_down.
    if guarded(|| case.set_up(), &mut result).is_some() {
        guarded(|| method(&mut case), &mut result);
        guarded(|| case.tear_down(), &mut result);
    }

    result
}

/// Runs one phase under unwind protection, classifying any panic into the
/// result. Returns `None` when the phase panicked.
fn guarded<T>(phase: impl FnOnce() -> T, result: &mut SuiteResult) -> Option<T> {
    LAST_PANIC_LOCATION.with(|slot| slot.borrow_mut().take());

    match panic::catch_unwind(AssertUnwindSafe(phase)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let hook_trace = LAST_PANIC_LOCATION.with(|slot| slot.borrow_mut().take());

            if let Some(failure) = payload.downcast_ref::<Failure>() {
                result.failures.push(Diagnostic {
                    message: failure.message.clone(),
                    trace: failure.location.clone().or(hook_trace),
                });
            } else {
                result.errors.push(Diagnostic {
                    message: panic_message(payload.as_ref()),
                    trace: hook_trace,
                });
            }
            None
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

thread_local! {
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Restores the previous panic hook when the last guard drops.
///
/// Held by the executor for the duration of a run: expected test panics
/// must not spray the default hook's backtrace over the report. The quiet
/// hook records the panic location instead, which [`Suite::run`] picks up
/// as the traceback for non-assertion panics.
///
/// The hook is process-global, so installation is reference-counted:
/// nested or concurrent guards keep the quiet hook in place until the
/// last one drops.
pub struct PanicHookGuard {
    _private: (),
}

struct HookState {
    depth: usize,
    previous: Option<Box<dyn Fn(&panic::PanicHookInfo<'_>) + Send + Sync>>,
}

static HOOK_STATE: Mutex<HookState> = Mutex::new(HookState {
    depth: 0,
    previous: None,
});

/// Installs the location-recording quiet hook.
pub fn quiet_panics() -> PanicHookGuard {
    let mut state = HOOK_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    if state.depth == 0 {
        state.previous = Some(panic::take_hook());
        panic::set_hook(Box::new(|info| {
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()));
            LAST_PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
        }));
    }
    state.depth += 1;
    PanicHookGuard { _private: () }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        let mut state = HOOK_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth -= 1;
        if state.depth == 0 {
            if let Some(previous) = state.previous.take() {
                let _ = panic::take_hook();
                panic::set_hook(previous);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Ordered {
        log: Vec<&'static str>,
    }

    impl TestCase for Ordered {
        fn set_up(&mut self) {
            self.log.push("set_up");
        }

        fn tear_down(&mut self) {
            self.log.push("tear_down");
            check!(self.log.first() == Some(&"set_up"));
        }
    }

    impl Ordered {
        fn test_passes(&mut self) {
            self.log.push("method");
        }

        fn test_fails(&mut self) {
            check_eq!(1 + 1, 3);
        }

        fn test_panics(&mut self) {
            panic!("boom");
        }
    }

    #[test]
    fn test_passing_method_is_successful() {
        let result = Suite::for_case(Ordered::test_passes as fn(&mut Ordered)).run();
        assert!(result.was_successful());
        assert!(result.failures.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_assertion_failure_is_a_failure_entry() {
        let result = Suite::for_case(Ordered::test_fails as fn(&mut Ordered)).run();
        assert_eq!(result.failures.len(), 1);
        assert!(result.errors.is_empty());
        assert!(result.failures[0].message.contains("check_eq failed"));
        assert!(result.failures[0].trace.is_some());
    }

    #[test]
    fn test_arbitrary_panic_is_an_error_entry() {
        let result = Suite::for_case(Ordered::test_panics as fn(&mut Ordered)).run();
        assert!(result.failures.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "boom");
    }

    #[test]
    fn test_tear_down_runs_after_method_panic() {
        static TORE_DOWN: AtomicBool = AtomicBool::new(false);

        struct Probe;

        impl Default for Probe {
            fn default() -> Self {
                TORE_DOWN.store(false, Ordering::SeqCst);
                Probe
            }
        }

        impl TestCase for Probe {
            fn tear_down(&mut self) {
                TORE_DOWN.store(true, Ordering::SeqCst);
            }
        }

        impl Probe {
            fn test_explodes(&mut self) {
                panic!("mid-method");
            }
        }

        let result = Suite::for_case(Probe::test_explodes as fn(&mut Probe)).run();
        assert_eq!(result.errors.len(), 1);
        assert!(TORE_DOWN.load(Ordering::SeqCst));
    }

    #[test]
    fn test_set_up_panic_skips_method_and_tear_down() {
        #[derive(Default)]
        struct Fragile;

        impl TestCase for Fragile {
            fn set_up(&mut self) {
                panic!("broken fixture");
            }

            fn tear_down(&mut self) {
                unreachable!("tear_down must not run after a set_up panic");
            }
        }

        impl Fragile {
            fn test_never_runs(&mut self) {
                unreachable!("method must not run after a set_up panic");
            }
        }

        let result = Suite::for_case(Fragile::test_never_runs as fn(&mut Fragile)).run();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "broken fixture");
    }

    #[test]
    fn test_method_failure_plus_tear_down_panic_keeps_both_entries() {
        #[derive(Default)]
        struct Leaky;

        impl TestCase for Leaky {
            fn tear_down(&mut self) {
                panic!("leak detected");
            }
        }

        impl Leaky {
            fn test_mismatch(&mut self) {
                check_eq!("a", "b");
            }
        }

        let result = Suite::for_case(Leaky::test_mismatch as fn(&mut Leaky)).run();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(!result.was_successful());
    }

    #[test]
    fn test_standalone_function_wrapper() {
        let passing = Suite::for_function(Arc::new(|| {})).run();
        assert!(passing.was_successful());

        let failing = Suite::for_function(Arc::new(|| fail("standalone mismatch"))).run();
        assert_eq!(failing.failures.len(), 1);
        assert_eq!(failing.failures[0].message, "standalone mismatch");
    }

    #[test]
    fn test_quiet_hook_records_panic_location() {
        let _guard = quiet_panics();
        let result = Suite::for_function(Arc::new(|| panic!("located"))).run();
        assert_eq!(result.errors.len(), 1);
        let trace = result.errors[0].trace.as_deref().unwrap_or("");
        assert!(trace.contains("framework.rs"), "unexpected trace: {trace}");
    }
}
