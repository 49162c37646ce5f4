//! Runs fixtures through the merge engine in a scratch directory.
//!
//! Each fixture is written to a fresh temporary project, merged once and
//! compared against its expectations. When the first run matches, the
//! fixture is merged a second time and must not change anything.

use crate::errors::{SpecError, SpecResult};
use crate::fixture::{ExpectTarget, MergeFixture};
use crate::loader::load_all_fixtures;
use log::debug;
use sourcery_merge::{MergeConfig, RenderedTemplate, RunReport, Runner, SourceFile, WriteStatus};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Directory, relative to the scratch project, that receives outputs.
pub const OUTPUT_DIR: &str = "out";

/// One way a fixture can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A file does not have the expected content. `actual` is `None` when
    /// the file does not exist.
    Content {
        target: ExpectTarget,
        path: String,
        line: usize,
        expected: String,
        actual: Option<String>,
    },
    /// An `expect-error` line with no matching error in the report.
    MissingError {
        path: String,
        kind: String,
        line: usize,
    },
    /// The report holds an error the fixture does not expect.
    UnexpectedError {
        path: String,
        kind: String,
        message: String,
    },
    /// The second run wrote or removed a file.
    NotIdempotent { path: String, status: WriteStatus },
}

/// The result of running one fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureOutcome {
    pub name: String,
    /// Summary line of the first run.
    pub summary: String,
    pub failures: Vec<Failure>,
}

impl FixtureOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregated results of a fixture directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessResult {
    pub total: usize,
    pub passed: usize,
    /// Names of the fixtures that failed.
    pub failed: Vec<String>,
}

impl HarnessResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &FixtureOutcome) {
        self.total += 1;
        if outcome.passed() {
            self.passed += 1;
        } else {
            self.failed.push(outcome.name.clone());
        }
    }

    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Get the exit code (0 = pass, 1 = failures).
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Run every fixture under `dir`.
pub fn run_all(dir: &Path) -> SpecResult<(HarnessResult, Vec<FixtureOutcome>)> {
    let mut result = HarnessResult::new();
    let mut outcomes = Vec::new();

    for (name, fixture) in load_all_fixtures(dir)? {
        let outcome = run_fixture(&name, &fixture)?;
        result.record(&outcome);
        outcomes.push(outcome);
    }

    Ok((result, outcomes))
}

/// Run one fixture in a fresh scratch project.
pub fn run_fixture(name: &str, fixture: &MergeFixture) -> SpecResult<FixtureOutcome> {
    let setup = |message: String| SpecError::Setup {
        message: format!("{}: {}", name, message),
    };

    let dir = TempDir::new().map_err(|e| setup(e.to_string()))?;
    let root = dir.path();
    let mut config =
        MergeConfig::from_toml_str(&fixture.settings_toml()).map_err(|e| setup(e.to_string()))?;
    config.cache_path = root.join(".sourcery-merge").join("cache.json");

    for file in &fixture.sources {
        let path = root.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| setup(e.to_string()))?;
        }
        fs::write(&path, &file.text).map_err(|e| setup(e.to_string()))?;
    }

    let sources = fixture
        .sources
        .iter()
        .map(|file| {
            SourceFile::with_declarations(root.join(&file.path), file.text.clone(), &file.declarations)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| setup(e.to_string()))?;
    let templates: Vec<RenderedTemplate> = fixture
        .templates
        .iter()
        .map(|template| RenderedTemplate::new(template.name.as_str(), template.text.as_str()))
        .collect();

    let runner = Runner::new(&config, root.join(OUTPUT_DIR));
    let report = runner.run(&sources, &templates);
    debug!("{}: {}", name, report.to_string().trim_end());

    let mut failures = check_errors(root, fixture, &report);
    failures.extend(check_contents(root, fixture));

    if failures.is_empty() {
        let second = second_run_sources(root, fixture).map_err(setup)?;
        let again = runner.run(&second, &templates);
        debug!("{} (second run): {}", name, again.to_string().trim_end());

        failures.extend(
            again
                .sources
                .iter()
                .chain(&again.outputs)
                .filter(|file| matches!(file.status, WriteStatus::Written | WriteStatus::Removed))
                .map(|file| Failure::NotIdempotent {
                    path: relative(root, &file.path),
                    status: file.status,
                }),
        );
    }

    Ok(FixtureOutcome {
        name: name.to_string(),
        summary: report.to_string().lines().next().unwrap_or_default().to_string(),
        failures,
    })
}

fn check_errors(root: &Path, fixture: &MergeFixture, report: &RunReport) -> Vec<Failure> {
    let reported: Vec<(String, &'static str, String)> = report
        .errors
        .iter()
        .map(|e| (relative(root, &e.path), e.error.kind(), e.error.to_string()))
        .collect();

    let mut failures: Vec<Failure> = reported
        .iter()
        .filter(|(path, kind, _)| {
            !fixture
                .expected_errors
                .iter()
                .any(|expected| &expected.path == path && expected.kind == *kind)
        })
        .map(|(path, kind, message)| Failure::UnexpectedError {
            path: path.clone(),
            kind: kind.to_string(),
            message: message.clone(),
        })
        .collect();

    failures.extend(
        fixture
            .expected_errors
            .iter()
            .filter(|expected| {
                !reported
                    .iter()
                    .any(|(path, kind, _)| &expected.path == path && expected.kind == *kind)
            })
            .map(|expected| Failure::MissingError {
                path: expected.path.clone(),
                kind: expected.kind.clone(),
                line: expected.line,
            }),
    );

    failures
}

fn check_contents(root: &Path, fixture: &MergeFixture) -> Vec<Failure> {
    fixture
        .expectations
        .iter()
        .filter_map(|expectation| {
            let path = match expectation.target {
                ExpectTarget::Source => root.join(&expectation.path),
                ExpectTarget::Output => root.join(OUTPUT_DIR).join(&expectation.path),
            };
            let actual = fs::read_to_string(path).ok();
            if actual.as_deref() == Some(expectation.text.as_str()) {
                return None;
            }
            Some(Failure::Content {
                target: expectation.target,
                path: expectation.path.clone(),
                line: expectation.line,
                expected: expectation.text.clone(),
                actual,
            })
        })
        .collect()
}

/// Sources as they are on disk after the first run, with declarations
/// that fit the merged text.
fn second_run_sources(root: &Path, fixture: &MergeFixture) -> Result<Vec<SourceFile>, String> {
    let mut sources = Vec::new();

    for file in &fixture.sources {
        let path = root.join(&file.path);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => continue,
        };

        let declarations = match fixture.expectation_for(&file.path) {
            Some(expectation) => &expectation.declarations,
            None if text == file.text => &file.declarations,
            None => {
                return Err(format!(
                    "`{}` changed but has no `expect` section to describe its declarations",
                    file.path
                ));
            }
        };

        sources.push(
            SourceFile::with_declarations(path, text, declarations).map_err(|e| e.to_string())?,
        );
    }

    Ok(sources)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_fixture;

    const FIXTURE: &str = "\
# Auto insertion
--- source Foo.swift
class Foo {«Foo:»}
--- template Init
// sourcery:inline:auto:Foo.init
init() {}
// sourcery:end
--- expect Foo.swift
class Foo {«Foo:
// sourcery:inline:Foo.init
init() {}
// sourcery:end
»}
";

    #[test]
    fn test_run_passing_fixture() {
        let fixture = parse_fixture(FIXTURE).unwrap();
        let outcome = run_fixture("auto.merge", &fixture).unwrap();
        assert!(outcome.passed(), "{:?}", outcome.failures);
        assert!(outcome.summary.starts_with("OK: 2 written"));
    }

    #[test]
    fn test_content_mismatch_is_reported() {
        let input = FIXTURE.replace("class Foo {«Foo:\n//", "class Foo {«Foo:\n    //");
        let fixture = parse_fixture(&input).unwrap();
        let outcome = run_fixture("auto.merge", &fixture).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        match &outcome.failures[0] {
            Failure::Content { path, actual, .. } => {
                assert_eq!(path, "Foo.swift");
                assert!(actual.is_some());
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn test_expected_and_unexpected_errors() {
        let input = "\
> expect-error Foo.swift structural
--- source Foo.swift
// sourcery:inline:Foo.init
--- source Bar.swift
// sourcery:end
";
        let fixture = parse_fixture(input).unwrap();
        let outcome = run_fixture("errors.merge", &fixture).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0],
            Failure::UnexpectedError { path, kind, .. } if path == "Bar.swift" && kind == "structural"
        ));
    }

    #[test]
    fn test_missing_expected_error() {
        let input = "\
> expect-error Foo.swift conflict
--- source Foo.swift
class Foo {}
";
        let fixture = parse_fixture(input).unwrap();
        let outcome = run_fixture("missing.merge", &fixture).unwrap();
        assert!(matches!(&outcome.failures[..], [Failure::MissingError { line: 1, .. }]));
    }

    #[test]
    fn test_changed_source_needs_expect_section() {
        let input = "\
--- source Foo.swift
class Foo {«Foo:»}
--- template Init
// sourcery:inline:auto:Foo.init
init() {}
// sourcery:end
";
        let fixture = parse_fixture(input).unwrap();
        let err = run_fixture("no-expect.merge", &fixture).unwrap_err();
        assert!(err.to_string().contains("Foo.swift"));
    }

    #[test]
    fn test_harness_result_exit_code() {
        let mut result = HarnessResult::new();
        let passing = FixtureOutcome {
            name: "a.merge".into(),
            summary: String::new(),
            failures: vec![],
        };
        result.record(&passing);
        assert_eq!(result.exit_code(), 0);

        let failing = FixtureOutcome {
            name: "b.merge".into(),
            failures: vec![Failure::MissingError {
                path: "Foo.swift".into(),
                kind: "conflict".into(),
                line: 1,
            }],
            ..passing
        };
        result.record(&failing);
        assert_eq!(result.total, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, vec!["b.merge".to_string()]);
        assert_eq!(result.exit_code(), 1);
    }
}
