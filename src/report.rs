//! Console rendering of run results.
//!
//! Three sections, emitted in order: the summary (counts, success rate,
//! wall-clock duration), the detailed per-method listing with failure
//! blocks, and the timing breakdown of the slowest methods. Styling is
//! decoration only; the semantic content is plain text.

use console::style;

use crate::executor::{TestResult, TestStatus};
use crate::lint::LINT_UNAVAILABLE;

/// How many of the slowest methods the timing breakdown shows.
const TIMING_TOP: usize = 5;

fn heading(title: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", style(title).bold());
    println!("{}", "=".repeat(60));
}

/// Prints the summary section: counts, success rate, execution time.
pub fn print_summary(result: &TestResult) {
    heading("TEST SUMMARY");

    println!("Passed:         {}", style(result.passed).green());
    println!("Failed:         {}", style(result.failed).red());
    println!("Errors:         {}", style(result.errors).red());
    println!("Total:          {}", result.total);
    println!("Success Rate:   {:.2}%", result.success_rate());
    println!("Execution Time: {:.2} seconds", result.duration.as_secs_f64());

    if result.failed == 0 && result.errors == 0 {
        println!();
        println!("{}", style("All tests passed!").green().bold());
    } else {
        println!();
        println!(
            "{}",
            style(format!(
                "{} test(s) failed or had errors",
                result.failed + result.errors
            ))
            .red()
        );
    }
}

/// Prints one line per method plus a failure block per non-pass result.
pub fn print_detailed_results(result: &TestResult) {
    heading("DETAILED TEST RESULTS");

    for method_result in &result.results {
        let glyph = match method_result.status {
            TestStatus::Pass => style("✓").green(),
            TestStatus::Fail => style("✗").red(),
            TestStatus::Error => style("!").red().bold(),
        };
        println!(
            "{glyph} {} ... {} ({:.3}s)",
            method_result.method.full_name(),
            method_result.status.label(),
            method_result.duration.as_secs_f64()
        );
    }

    let failed = result.failed_results();
    if failed.is_empty() {
        return;
    }

    heading("FAILURE DETAILS");

    for (index, method_result) in failed.iter().enumerate() {
        println!();
        println!("{}. {}", index + 1, method_result.method.full_name());
        println!("{}", "-".repeat(60));

        let label = match method_result.status {
            TestStatus::Fail => "FAILURE:",
            _ => "ERROR:",
        };
        println!("{}", style(label).red().bold());

        if let Some(error) = &method_result.error {
            println!("{error}");
        }
        if let Some(traceback) = &method_result.traceback {
            println!();
            println!("Traceback:");
            println!("{traceback}");
        }

        if index + 1 < failed.len() {
            println!();
            println!("{}", "-".repeat(60));
        }
    }
}

/// Prints the slowest methods, longest first.
pub fn print_timing_breakdown(result: &TestResult) {
    if result.results.is_empty() {
        return;
    }

    heading("TIMING BREAKDOWN");

    let mut by_duration: Vec<_> = result.results.iter().collect();
    by_duration.sort_by(|a, b| b.duration.cmp(&a.duration));

    for method_result in by_duration.into_iter().take(TIMING_TOP) {
        println!(
            "   {}: {:.3}s",
            method_result.method.full_name(),
            method_result.duration.as_secs_f64()
        );
    }
}

/// Prints the lint section for a violation count (see [`crate::lint`]).
pub fn print_lint_results(violation_count: i32) {
    heading("LINT RESULTS");

    if violation_count == LINT_UNAVAILABLE {
        println!("{}", style("Linting failed due to an error").red().bold());
        println!("Check the log output above for details");
    } else if violation_count == 0 {
        println!("{}", style("No style violations found").green().bold());
    } else {
        let plural = if violation_count == 1 { "" } else { "s" };
        println!(
            "{}",
            style(format!("Found {violation_count} style violation{plural}")).red()
        );
        println!("Check the output above for details on violations");
    }
}
