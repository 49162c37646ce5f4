//! Parser for `.merge` fixture files.
//!
//! ```text
//! # Auto insertion into a nested type
//! > set base_indentation=4
//!
//! --- source Sources/Foo.swift
//! class Foo {«Foo:
//!     struct Inner {«Inner:»}
//! »}
//! --- template Init
//! // sourcery:inline:auto:Foo.Inner.init
//! init() {}
//! // sourcery:end
//! --- expect Sources/Foo.swift
//! ...
//! ```
//!
//! Before the first section, `# ` sets the title, `> ` lines are
//! directives and `//` lines are comments. Every `--- <kind> <path>` line
//! opens a section that runs until the next one. Trailing blank lines of a
//! section are dropped and its content always ends with a newline.

use crate::errors::{SpecError, SpecResult};
use crate::fixture::{
    ExpectTarget, Expectation, ExpectedError, FixtureFile, FixtureTemplate, MergeFixture, Setting,
};
use sourcery_merge::{DeclarationKind, DeclarationSpec};

/// Parse declaration markers from source text, returning the normalized
/// text and the declaration tree.
///
/// `«Name:` opens the body of a type declaration and `»` closes it. The
/// marked region is the body interior, so the closing marker sits right
/// before the closing delimiter. A `+` before the name marks an extension,
/// a `-` a member. Markers nest.
///
/// `first_line` is the fixture line of the first input line, for errors.
pub fn parse_declarations(
    input: &str,
    first_line: usize,
) -> SpecResult<(String, Vec<DeclarationSpec>)> {
    let mut normalized = String::with_capacity(input.len());
    let mut roots = Vec::new();
    let mut open: Vec<(DeclarationSpec, usize)> = Vec::new();
    let mut chars = input.char_indices();
    let line_of = |pos: usize| first_line + count_lines(input, pos) - 1;

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '«' => {
                let mut id = String::new();
                loop {
                    match chars.next() {
                        Some((_, ':')) => break,
                        Some((_, c)) if c.is_alphanumeric() || c == '_' || c == '.' => id.push(c),
                        Some((_, c)) if id.is_empty() && (c == '+' || c == '-') => id.push(c),
                        Some((_, c)) => {
                            return Err(SpecError::Parse {
                                line: line_of(pos),
                                message: format!(
                                    "invalid declaration marker: expected a name or ':', found '{}'",
                                    c
                                ),
                            });
                        }
                        None => {
                            return Err(SpecError::Parse {
                                line: line_of(pos),
                                message: "unclosed declaration marker: expected ':'".to_string(),
                            });
                        }
                    }
                }

                let (kind, name) = if let Some(name) = id.strip_prefix('+') {
                    (DeclarationKind::Extension, name)
                } else if let Some(name) = id.strip_prefix('-') {
                    (DeclarationKind::Member, name)
                } else {
                    (DeclarationKind::Type, id.as_str())
                };
                if name.is_empty() {
                    return Err(SpecError::Parse {
                        line: line_of(pos),
                        message: "declaration marker without a name".to_string(),
                    });
                }

                let start = normalized.len();
                open.push((DeclarationSpec::new(name, kind, start..start), pos));
            }
            '»' => {
                let (mut spec, _) = open.pop().ok_or_else(|| SpecError::Parse {
                    line: line_of(pos),
                    message: "'»' without an open declaration".to_string(),
                })?;
                spec.body.end = normalized.len();
                match open.last_mut() {
                    Some((parent, _)) => parent.children.push(spec),
                    None => roots.push(spec),
                }
            }
            _ => normalized.push(ch),
        }
    }

    if let Some((spec, pos)) = open.pop() {
        return Err(SpecError::Parse {
            line: line_of(pos),
            message: format!("declaration `{}` is never closed with '»'", spec.name),
        });
    }

    Ok((normalized, roots))
}

/// Count lines up to a byte position (for error messages).
fn count_lines(input: &str, byte_pos: usize) -> usize {
    input[..byte_pos.min(input.len())]
        .chars()
        .filter(|&c| c == '\n')
        .count()
        + 1
}

/// Parse a full `.merge` fixture file.
pub fn parse_fixture(input: &str) -> SpecResult<MergeFixture> {
    let mut fixture = MergeFixture::default();
    let mut section: Option<Section<'_>> = None;

    for (index, line) in input.lines().enumerate() {
        let line_num = index + 1;

        if let Some(header) = line.strip_prefix("--- ") {
            if let Some(done) = section.take() {
                done.finish(&mut fixture)?;
            }
            section = Some(Section::open(header, line_num)?);
            continue;
        }

        match section.as_mut() {
            Some(open) => open.lines.push(line),
            None => parse_preamble_line(&mut fixture, line, line_num)?,
        }
    }

    if let Some(done) = section {
        done.finish(&mut fixture)?;
    }

    Ok(fixture)
}

fn parse_preamble_line(fixture: &mut MergeFixture, line: &str, line_num: usize) -> SpecResult<()> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with("//") {
        return Ok(());
    }

    if let Some(title) = trimmed.strip_prefix("# ") {
        if fixture.title.is_none() {
            fixture.title = Some(title.trim().to_string());
        }
        return Ok(());
    }

    let directive = trimmed.strip_prefix("> ").ok_or_else(|| SpecError::Parse {
        line: line_num,
        message: format!("text outside a section: {:?}", trimmed),
    })?;
    let mut words = directive.split_whitespace();

    match words.next() {
        Some("set") => {
            let assignment = words.collect::<Vec<_>>().join(" ");
            let (key, value) = assignment.split_once('=').ok_or_else(|| SpecError::Parse {
                line: line_num,
                message: "expected `> set key=value`".to_string(),
            })?;
            fixture.settings.push(Setting {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
                line: line_num,
            });
        }
        Some("expect-error") => match (words.next(), words.next(), words.next()) {
            (Some(path), Some(kind), None) => fixture.expected_errors.push(ExpectedError {
                path: path.to_string(),
                kind: kind.to_string(),
                line: line_num,
            }),
            _ => {
                return Err(SpecError::Parse {
                    line: line_num,
                    message: "expected `> expect-error <path> <kind>`".to_string(),
                });
            }
        },
        other => {
            return Err(SpecError::Parse {
                line: line_num,
                message: format!("unknown directive: {:?}", other.unwrap_or("")),
            });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Source,
    Template,
    Expect,
    ExpectOutput,
}

struct Section<'a> {
    kind: SectionKind,
    name: String,
    line: usize,
    lines: Vec<&'a str>,
}

impl<'a> Section<'a> {
    fn open(header: &str, line: usize) -> SpecResult<Self> {
        let parse_error = |message: String| SpecError::Parse { line, message };

        let (kind, name) = header
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_error("expected `--- <kind> <path>`".to_string()))?;
        let kind = match kind {
            "source" => SectionKind::Source,
            "template" => SectionKind::Template,
            "expect" => SectionKind::Expect,
            "expect-output" => SectionKind::ExpectOutput,
            other => return Err(parse_error(format!("unknown section kind `{}`", other))),
        };

        Ok(Self {
            kind,
            name: name.trim().to_string(),
            line,
            lines: Vec::new(),
        })
    }

    fn content(&self) -> String {
        let mut end = self.lines.len();
        while end > 0 && self.lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        let mut text = self.lines[..end].join("\n");
        if end > 0 {
            text.push('\n');
        }
        text
    }

    fn finish(self, fixture: &mut MergeFixture) -> SpecResult<()> {
        let content = self.content();
        let first_line = self.line + 1;

        match self.kind {
            SectionKind::Source => {
                if fixture.sources.iter().any(|s| s.path == self.name) {
                    return Err(SpecError::Parse {
                        line: self.line,
                        message: format!("source `{}` is declared twice", self.name),
                    });
                }
                let (text, declarations) = parse_declarations(&content, first_line)?;
                fixture.sources.push(FixtureFile {
                    path: self.name,
                    text,
                    declarations,
                    line: self.line,
                });
            }
            SectionKind::Template => fixture.templates.push(FixtureTemplate {
                name: self.name,
                text: content,
                line: self.line,
            }),
            SectionKind::Expect => {
                let (text, declarations) = parse_declarations(&content, first_line)?;
                fixture.expectations.push(Expectation {
                    target: ExpectTarget::Source,
                    path: self.name,
                    text,
                    declarations,
                    line: self.line,
                });
            }
            SectionKind::ExpectOutput => fixture.expectations.push(Expectation {
                target: ExpectTarget::Output,
                path: self.name,
                text: content,
                declarations: Vec::new(),
                line: self.line,
            }),
        }

        Ok(())
    }
}
