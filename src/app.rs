//! Command drivers: from parsed tokens to a process exit code.
//!
//! The CLI surface is positional and the leftmost token decides:
//!
//! | Tokens | Action |
//! |--------|--------|
//! | *(none)* | run all tests |
//! | `help` \| `--help` \| `-h` | print help, exit 0 |
//! | `lint` | lint only |
//! | `check` | lint, then all tests (lint does not short-circuit) |
//! | a configured test type | run that type |
//! | a configured group | run that group |
//! | one other token | run it as a module |
//! | several other tokens | run them as modules |
//!
//! The exit code folds the whole run down to one bit: `0` iff no test
//! failed, no test errored, and lint found no violations; `1` otherwise.
//! "No test files found" and "no test methods found" are failures too.

use std::path::Path;

use console::style;
use tracing::info;

use crate::config::{self, Config};
use crate::coverage::{self, CoverageBackend};
use crate::discovery;
use crate::executor;
use crate::inspector;
use crate::lint::{self, LintBackend};
use crate::registry::Registry;
use crate::report;

/// Optional external collaborators wired in by the embedder.
///
/// Both backends are capabilities that may be absent; the pipeline
/// degrades with a warning wherever one is missing. The shipped binary
/// passes `Backends::default()`.
#[derive(Default)]
pub struct Backends {
    /// Coverage collector, bracketing the executor's run.
    pub coverage: Option<Box<dyn CoverageBackend>>,

    /// Style checker for the `lint` and `check` commands.
    pub lint: Option<Box<dyn LintBackend>>,
}

/// What the command-line tokens ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print the help block and exit successfully.
    Help,

    /// Run the lint pass only.
    Lint,

    /// Run lint, then all tests; both feed the exit code.
    Check,

    /// Run tests selected by type, group, or explicit modules.
    Test {
        test_type: Option<String>,
        modules: Option<Vec<String>>,
        group: Option<String>,
        description: String,
    },
}

/// Interprets positional tokens against the configured types and groups.
pub fn parse_arguments(args: &[String], config: &Config) -> Action {
    let all_tests = Action::Test {
        test_type: None,
        modules: None,
        group: None,
        description: "all tests".to_string(),
    };

    match args {
        [] => all_tests,
        [single] => {
            let command = single.as_str();
            match command {
                "help" | "--help" | "-h" => Action::Help,
                "lint" => Action::Lint,
                "check" => Action::Check,
                _ if config.has_test_type(command) => Action::Test {
                    test_type: Some(command.to_string()),
                    modules: None,
                    group: None,
                    description: format!("{command} tests"),
                },
                _ if config.has_group(command) => Action::Test {
                    test_type: None,
                    modules: None,
                    group: Some(command.to_string()),
                    description: format!("test group \"{command}\""),
                },
                _ => Action::Test {
                    test_type: None,
                    modules: Some(vec![command.to_string()]),
                    group: None,
                    description: format!("module \"{command}\""),
                },
            }
        }
        many => Action::Test {
            test_type: None,
            modules: Some(many.to_vec()),
            group: None,
            description: format!("modules: {}", many.join(", ")),
        },
    }
}

/// Maps run outcomes to the process exit code: `0` iff all clear.
pub fn exit_code(any_test_fail: bool, any_test_error: bool, lint_failed: bool) -> i32 {
    if any_test_fail || any_test_error || lint_failed {
        1
    } else {
        0
    }
}

/// Runs one command end to end and returns the exit code.
///
/// `search_path` directs discovery and lint; the process working
/// directory is never changed. `config_path` is the JSON configuration
/// file (missing or broken files degrade to defaults).
pub fn run(
    args: &[String],
    registry: &Registry,
    backends: Backends,
    search_path: &Path,
    config_path: &Path,
) -> i32 {
    println!("{}", style("Lightweight Test Runner").bold());
    println!("{}", "=".repeat(50));

    let config = config::load_config(config_path);
    let action = parse_arguments(args, &config);

    match action {
        Action::Help => {
            show_help();
            0
        }
        Action::Lint => {
            let violation_count = lint::run_lint(backends.lint.as_deref(), search_path, None);
            report::print_lint_results(violation_count);
            exit_code(false, false, violation_count > 0)
        }
        Action::Check => {
            info!("Running comprehensive check (linting + all tests)");

            let violation_count = lint::run_lint(backends.lint.as_deref(), search_path, None);
            report::print_lint_results(violation_count);

            // Lint does not short-circuit; tests run unconditionally and
            // both outcomes feed the final code.
            run_test_pipeline(
                None,
                None,
                None,
                "comprehensive check (linting + all tests)",
                &config,
                registry,
                backends.coverage,
                search_path,
                violation_count > 0,
            )
        }
        Action::Test {
            test_type,
            modules,
            group,
            description,
        } => run_test_pipeline(
            test_type.as_deref(),
            modules.as_deref(),
            group.as_deref(),
            &description,
            &config,
            registry,
            backends.coverage,
            search_path,
            false,
        ),
    }
}

/// Discovery → inspection → execution → reporting → exit code.
#[allow(clippy::too_many_arguments)]
fn run_test_pipeline(
    test_type: Option<&str>,
    modules: Option<&[String]>,
    group: Option<&str>,
    description: &str,
    config: &Config,
    registry: &Registry,
    coverage_backend: Option<Box<dyn CoverageBackend>>,
    search_path: &Path,
    lint_failed: bool,
) -> i32 {
    println!("Command: {description}");

    info!("Test types: {:?}", config.test_types());
    info!(
        "Test groups: {:?}",
        config.test_groups.keys().collect::<Vec<_>>()
    );
    info!("Coverage enabled: {}", config.coverage_enabled);
    info!("HTML coverage: {}", config.html_coverage);

    let discovered_files = discovery::discover(test_type, modules, group, config, search_path);
    if discovered_files.is_empty() {
        println!("{}", style("No test files found!").red().bold());
        return 1;
    }
    println!("Discovered {} test files", discovered_files.len());

    let methods_by_module =
        inspector::discover_test_methods(registry, &discovered_files, search_path);
    let total_methods: usize = methods_by_module
        .iter()
        .map(|module| module.methods.len())
        .sum();
    println!("Total test methods discovered: {total_methods}");

    if total_methods == 0 {
        println!("{}", style("No test methods found!").red().bold());
        return 1;
    }

    let (test_result, collection) = executor::run_all(
        registry,
        &methods_by_module,
        config.coverage_enabled,
        coverage_backend,
    );

    report::print_summary(&test_result);
    report::print_detailed_results(&test_result);

    if config.coverage_enabled {
        if let Some(collection) = &collection {
            coverage::render_report(collection);
            if config.html_coverage {
                coverage::render_html_report(collection, config);
            }
        }
    }

    report::print_timing_breakdown(&test_result);

    let code = exit_code(test_result.failed > 0, test_result.errors > 0, lint_failed);
    print_verdict(&test_result, lint_failed, code);
    code
}

fn print_verdict(test_result: &executor::TestResult, lint_failed: bool, code: i32) {
    println!();
    if code == 0 {
        println!("{}", style("All checks passed successfully!").green().bold());
        return;
    }

    let tests_failed = test_result.failed > 0 || test_result.errors > 0;
    let verdict = if lint_failed && tests_failed {
        "Both linting and tests failed. Please check above for details."
    } else if lint_failed {
        "Linting failed but tests passed. Please fix style violations."
    } else {
        "Some tests failed. Please check above for details."
    };
    println!("{}", style(verdict).red().bold());
}

/// Prints the help block.
pub fn show_help() {
    println!(
        r#"
Lightweight Test Runner

USAGE:
    testrules [COMMAND|MODULE...]

COMMANDS:
    (no args)           Run all tests
    unit                Run unit tests only
    integration         Run integration tests only
    e2e                 Run end-to-end tests only
    regression          Run regression tests only
    lint                Run code style checks only
    check               Run both linting and all tests
    help, --help, -h    Show this help message

TEST GROUPS:
    Run a predefined test group from your configuration file:
    testrules GROUP_NAME

MODULES:
    Run specific test modules:
    testrules module1 module2 ...

CONFIGURATION:
    Configuration is loaded from testrules.json in the working
    directory if present. All keys are optional:

    {{
      "test_patterns":     {{ "unit": ["test_*.rs"] }},
      "test_groups":       {{ "core": ["test_clean"] }},
      "coverage_enabled":  true,
      "html_coverage":     true,
      "html_coverage_dir": "htmlcov"
    }}
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_no_args_runs_all_tests() {
        let action = parse_arguments(&[], &Config::default());
        assert_eq!(
            action,
            Action::Test {
                test_type: None,
                modules: None,
                group: None,
                description: "all tests".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_help_forms() {
        let config = Config::default();
        for form in ["help", "--help", "-h"] {
            assert_eq!(parse_arguments(&tokens(&[form]), &config), Action::Help);
        }
    }

    #[test]
    fn test_parse_special_commands() {
        let config = Config::default();
        assert_eq!(parse_arguments(&tokens(&["lint"]), &config), Action::Lint);
        assert_eq!(parse_arguments(&tokens(&["check"]), &config), Action::Check);
    }

    #[test]
    fn test_parse_test_types() {
        let config = Config::default();
        for test_type in ["unit", "integration", "e2e", "regression"] {
            match parse_arguments(&tokens(&[test_type]), &config) {
                Action::Test {
                    test_type: Some(parsed),
                    modules: None,
                    group: None,
                    ..
                } => assert_eq!(parsed, test_type),
                other => panic!("unexpected action: {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_group_name() {
        let mut config = Config::default();
        config
            .test_groups
            .insert("core".to_string(), vec!["test_clean".to_string()]);

        match parse_arguments(&tokens(&["core"]), &config) {
            Action::Test {
                group: Some(group),
                test_type: None,
                modules: None,
                ..
            } => assert_eq!(group, "core"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_token_is_a_module() {
        match parse_arguments(&tokens(&["customtype"]), &Config::default()) {
            Action::Test {
                modules: Some(modules),
                test_type: None,
                group: None,
                ..
            } => assert_eq!(modules, vec!["customtype"]),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_parse_multiple_tokens_are_modules() {
        // Even tokens that name commands or types are modules when there
        // is more than one of them.
        match parse_arguments(&tokens(&["test_a", "lint"]), &Config::default()) {
            Action::Test {
                modules: Some(modules),
                ..
            } => assert_eq!(modules, vec!["test_a", "lint"]),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_exit_code_truth_table() {
        assert_eq!(exit_code(false, false, false), 0);
        assert_eq!(exit_code(true, false, false), 1);
        assert_eq!(exit_code(false, true, false), 1);
        assert_eq!(exit_code(false, false, true), 1);
        assert_eq!(exit_code(true, true, true), 1);
    }

    #[test]
    fn test_empty_directory_run_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        let code = run(
            &[],
            &registry,
            Backends::default(),
            dir.path(),
            &dir.path().join("testrules.json"),
        );
        assert_eq!(code, 1);
    }

    #[test]
    fn test_help_exits_zero_without_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        let code = run(
            &tokens(&["--help"]),
            &registry,
            Backends::default(),
            dir.path(),
            &dir.path().join("testrules.json"),
        );
        assert_eq!(code, 0);
    }
}
