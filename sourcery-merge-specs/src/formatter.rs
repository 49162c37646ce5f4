//! Readable failure reports.

use crate::fixture::ExpectTarget;
use crate::runner::{Failure, FixtureOutcome, HarnessResult};

/// Lines of context shown around the first differing line.
const CONTEXT: usize = 2;

/// Format one failure of a fixture.
pub fn format_failure(fixture_name: &str, failure: &Failure) -> String {
    let mut lines = Vec::new();

    match failure {
        Failure::Content {
            target,
            path,
            line,
            expected,
            actual,
        } => {
            lines.push(format!("FAIL: {}:{}", fixture_name, line));
            let what = match target {
                ExpectTarget::Source => "source",
                ExpectTarget::Output => "output",
            };
            match actual {
                None => lines.push(format!("  {} `{}` was not written", what, path)),
                Some(actual) => {
                    lines.push(format!("  {} `{}` differs", what, path));
                    lines.extend(diff_context(expected, actual));
                }
            }
        }
        Failure::MissingError { path, kind, line } => {
            lines.push(format!("FAIL: {}:{}", fixture_name, line));
            lines.push(format!("  expected a `{}` error for `{}`, none was reported", kind, path));
        }
        Failure::UnexpectedError {
            path,
            kind,
            message,
        } => {
            lines.push(format!("FAIL: {}", fixture_name));
            lines.push(format!("  unexpected `{}` error for `{}`: {}", kind, path, message));
            lines.push(format!("  hint: add `> expect-error {} {}` if this is intended", path, kind));
        }
        Failure::NotIdempotent { path, status } => {
            lines.push(format!("FAIL: {}", fixture_name));
            lines.push(format!("  second run changed `{}` ({:?})", path, status));
            lines.push("  hint: merging already merged files must leave them untouched".to_string());
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/// Expected and actual text around the first line where they differ.
fn diff_context(expected: &str, actual: &str) -> Vec<String> {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    let first = expected_lines
        .iter()
        .zip(&actual_lines)
        .position(|(e, a)| e != a)
        .unwrap_or_else(|| expected_lines.len().min(actual_lines.len()));

    if first == expected_lines.len() && first == actual_lines.len() {
        return vec!["  (only line endings differ)".to_string()];
    }

    let from = first.saturating_sub(CONTEXT);
    let mut out = vec![format!("  first difference at line {}", first + 1)];
    for (label, lines) in [("expected", &expected_lines), ("found", &actual_lines)] {
        out.push(format!("  {}:", label));
        let to = (first + CONTEXT + 1).min(lines.len());
        for (idx, line) in lines.iter().enumerate().take(to).skip(from) {
            let marker = if idx == first { '>' } else { ' ' };
            out.push(format!("   {}{:4} | {}", marker, idx + 1, line));
        }
        if first >= lines.len() {
            out.push(format!("   >{:4} | <end of file>", first + 1));
        }
    }
    out
}

/// Format the result of one fixture, failures included.
pub fn format_outcome(outcome: &FixtureOutcome) -> String {
    if outcome.passed() {
        return format!("PASS: {} ({})\n", outcome.name, outcome.summary);
    }

    let mut output = String::new();
    for failure in &outcome.failures {
        output.push_str(&format_failure(&outcome.name, failure));
    }
    output
}

/// Format a summary of all results.
pub fn format_summary(result: &HarnessResult) -> String {
    let status = if result.success() { "PASS" } else { "FAIL" };
    let mut output = format!(
        "{}: {} fixtures, {} passed, {} failed\n",
        status,
        result.total,
        result.passed,
        result.failed.len()
    );
    for name in &result.failed {
        output.push_str(&format!("  failed: {}\n", name));
    }
    output
}
