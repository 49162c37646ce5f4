//! Fixture types.
//!
//! A fixture describes one merge run: the source files with their
//! declarations, the rendered templates, and what the files should look
//! like afterwards.

use serde::Serialize;
use sourcery_merge::DeclarationSpec;

/// A parsed `.merge` fixture.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeFixture {
    /// Title from the `# Title` line, if present.
    pub title: Option<String>,
    /// Configuration overrides from `> set key=value` lines.
    pub settings: Vec<Setting>,
    /// Errors the run must report, from `> expect-error` lines.
    pub expected_errors: Vec<ExpectedError>,
    pub sources: Vec<FixtureFile>,
    pub templates: Vec<FixtureTemplate>,
    pub expectations: Vec<Expectation>,
}

/// A `> set key=value` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// A `> expect-error <path> <kind>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedError {
    /// Source path or template name the error is attributed to.
    pub path: String,
    /// Error kind as returned by `MergeError::kind`.
    pub kind: String,
    pub line: usize,
}

/// A `--- source <path>` section with its declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureFile {
    pub path: String,
    /// Text with declaration markers removed.
    pub text: String,
    pub declarations: Vec<DeclarationSpec>,
    pub line: usize,
}

/// A `--- template <name>` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureTemplate {
    pub name: String,
    pub text: String,
    pub line: usize,
}

/// Which file an expectation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpectTarget {
    /// A source file, relative to the project root.
    Source,
    /// A generated output, relative to the output directory.
    Output,
}

/// An `--- expect <path>` or `--- expect-output <path>` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expectation {
    pub target: ExpectTarget,
    pub path: String,
    pub text: String,
    /// Declarations of the merged source, used for the second run.
    pub declarations: Vec<DeclarationSpec>,
    pub line: usize,
}

impl MergeFixture {
    /// The expected merged content of a source file.
    pub fn expectation_for(&self, path: &str) -> Option<&Expectation> {
        self.expectations
            .iter()
            .find(|e| e.target == ExpectTarget::Source && e.path == path)
    }

    /// Settings rendered as a TOML document for `MergeConfig`.
    pub fn settings_toml(&self) -> String {
        self.settings
            .iter()
            .map(|setting| format!("{} = {}\n", setting.key, toml_value(&setting.value)))
            .collect()
    }
}

fn toml_value(value: &str) -> String {
    if value == "true" || value == "false" || value.parse::<i64>().is_ok() {
        value.to_string()
    } else {
        toml::Value::String(value.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_toml_quotes_strings() {
        let fixture = MergeFixture {
            settings: vec![
                Setting {
                    key: "base_indentation".into(),
                    value: "4".into(),
                    line: 2,
                },
                Setting {
                    key: "deleted_blocks".into(),
                    value: "reinsert".into(),
                    line: 3,
                },
                Setting {
                    key: "prune_empty_outputs".into(),
                    value: "true".into(),
                    line: 4,
                },
            ],
            ..MergeFixture::default()
        };

        assert_eq!(
            fixture.settings_toml(),
            "base_indentation = 4\ndeleted_blocks = \"reinsert\"\nprune_empty_outputs = true\n"
        );
    }
}
