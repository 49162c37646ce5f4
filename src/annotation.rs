//! Annotation markers and the line-oriented scanner.
//!
//! A block looks like this in both rendered templates and source files:
//!
//! ```text
//! // sourcery:inline:Foo.Inlined
//! var property = 2
//! // sourcery:end
//! ```
//!
//! The scanner returns every block in document order together with the free
//! text between blocks. Markers never nest.

use crate::errors::{MergeError, MergeResult};
use crate::text::{leading_whitespace, strip_line_ending};
use std::ops::Range;

const MARKER_PREFIX: &str = "sourcery:";

/// Placement mode of an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationMode {
    /// Replace an existing block in a source file.
    Inline,
    /// Insert as the last member of the anchor declaration's body.
    InlineAuto,
    /// Insert right after the anchor declaration's closing line.
    AfterAuto,
    /// Emit into a separate output file, relative to the output directory.
    File(String),
    /// Emit into a separate output file next to the anchor's source file.
    FileAuto(String),
}

impl AnnotationMode {
    /// Modes that merge into a source file rather than a separate output.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            AnnotationMode::Inline | AnnotationMode::InlineAuto | AnnotationMode::AfterAuto
        )
    }

    /// Modes that need the declaration index to find their first position.
    pub fn is_auto(&self) -> bool {
        matches!(self, AnnotationMode::InlineAuto | AnnotationMode::AfterAuto)
    }
}

/// One recognized marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Start { mode: AnnotationMode, key: String },
    End,
}

impl Marker {
    /// Parse the remainder of a line after the comment leader.
    ///
    /// Returns `Ok(None)` for anything that is not a merge marker. A known
    /// prefix with an empty key is an error.
    pub fn parse(rest: &str) -> Result<Option<Marker>, String> {
        let rest = rest.trim_end();
        let body = match rest.strip_prefix(MARKER_PREFIX) {
            Some(body) => body,
            None => return Ok(None),
        };

        if body == "end" {
            return Ok(Some(Marker::End));
        }

        let (mode, key) = if let Some(key) = body.strip_prefix("inline:after-auto:") {
            (AnnotationMode::AfterAuto, key)
        } else if let Some(key) = body.strip_prefix("inline:auto:") {
            (AnnotationMode::InlineAuto, key)
        } else if let Some(key) = body.strip_prefix("inline:") {
            (AnnotationMode::Inline, key)
        } else if let Some(path) = body.strip_prefix("file:auto:") {
            (AnnotationMode::FileAuto(path.to_string()), path)
        } else if let Some(path) = body.strip_prefix("file:") {
            (AnnotationMode::File(path.to_string()), path)
        } else {
            return Ok(None);
        };

        if key.is_empty() {
            return Err(format!("marker `{}` has an empty key", rest));
        }
        if key.contains(char::is_whitespace) {
            return Err(format!("marker key `{}` contains whitespace", key));
        }

        Ok(Some(Marker::Start {
            mode,
            key: key.to_string(),
        }))
    }

    /// Render a start marker line (without indentation or newline).
    pub fn render_start(leader: &str, mode: &AnnotationMode, key: &str) -> String {
        let form = match mode {
            AnnotationMode::Inline => "inline:",
            AnnotationMode::InlineAuto => "inline:auto:",
            AnnotationMode::AfterAuto => "inline:after-auto:",
            AnnotationMode::File(_) => "file:",
            AnnotationMode::FileAuto(_) => "file:auto:",
        };
        format!("{} {}{}{}", leader, MARKER_PREFIX, form, key)
    }

    /// Render an end marker line (without indentation or newline).
    pub fn render_end(leader: &str) -> String {
        format!("{} {}end", leader, MARKER_PREFIX)
    }
}

/// A marker pair and the text between its markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Dotted key for inline modes, relative output path for file modes.
    pub key: String,
    pub mode: AnnotationMode,
    /// Text between the start and end marker lines.
    pub body: String,
    /// Leading whitespace of the start marker line.
    pub indentation: String,
    /// 1-based line of the start marker.
    pub line: usize,
    /// From the start of the start-marker line to the end of the end-marker line.
    pub outer: Range<usize>,
    /// Byte range of `body` in the scanned text.
    pub body_range: Range<usize>,
}

/// Result of scanning a text buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Blocks in document order.
    pub annotations: Vec<Annotation>,
    /// Ranges of text outside every block.
    pub free: Vec<Range<usize>>,
}

impl ScanResult {
    /// The block whose markers strictly surround `offset`.
    pub fn enclosing(&self, offset: usize) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.outer.start < offset && offset < a.outer.end)
    }

    /// First block with the given key, if any.
    pub fn find(&self, key: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.key == key)
    }
}

/// Recognizes annotation markers behind a comment leader.
#[derive(Debug, Clone)]
pub struct Scanner {
    leader: String,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new("//")
    }
}

impl Scanner {
    pub fn new(leader: impl Into<String>) -> Self {
        Self {
            leader: leader.into(),
        }
    }

    /// Classify one line (without its terminator).
    pub fn marker(&self, line: &str) -> Result<Option<Marker>, String> {
        let rest = line.trim_start();
        match rest.strip_prefix(self.leader.as_str()) {
            Some(rest) => Marker::parse(rest.trim_start()),
            None => Ok(None),
        }
    }

    /// Scan a buffer for annotation blocks.
    pub fn scan(&self, text: &str) -> MergeResult<ScanResult> {
        struct Open {
            mode: AnnotationMode,
            key: String,
            indentation: String,
            line: usize,
            outer_start: usize,
            body_start: usize,
        }

        let mut result = ScanResult::default();
        let mut open: Option<Open> = None;
        let mut free_start = 0;
        let mut offset = 0;

        for (idx, raw_line) in text.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let line_start = offset;
            offset += raw_line.len();
            let line = strip_line_ending(raw_line);

            let marker = self
                .marker(line)
                .map_err(|message| MergeError::structural(line_no, message))?;

            match (marker, open.take()) {
                (None, current) => open = current,
                (Some(Marker::Start { mode, key }), None) => {
                    if free_start < line_start {
                        result.free.push(free_start..line_start);
                    }
                    open = Some(Open {
                        mode,
                        key,
                        indentation: leading_whitespace(line).to_string(),
                        line: line_no,
                        outer_start: line_start,
                        body_start: offset,
                    });
                }
                (Some(Marker::Start { key, .. }), Some(current)) => {
                    return Err(MergeError::structural(
                        line_no,
                        format!(
                            "`{}` starts inside `{}` opened at line {}; blocks do not nest",
                            key, current.key, current.line
                        ),
                    ));
                }
                (Some(Marker::End), None) => {
                    return Err(MergeError::structural(
                        line_no,
                        "end marker without a matching start marker",
                    ));
                }
                (Some(Marker::End), Some(current)) => {
                    let body_range = current.body_start..line_start;
                    result.annotations.push(Annotation {
                        key: current.key,
                        mode: current.mode,
                        body: text[body_range.clone()].to_string(),
                        indentation: current.indentation,
                        line: current.line,
                        outer: current.outer_start..offset,
                        body_range,
                    });
                    free_start = offset;
                }
            }
        }

        if let Some(current) = open {
            return Err(MergeError::structural(
                current.line,
                format!("`{}` is never closed", current.key),
            ));
        }

        if free_start < text.len() {
            result.free.push(free_start..text.len());
        }

        Ok(result)
    }
}
