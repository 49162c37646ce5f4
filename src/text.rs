//! Line and indentation helpers shared by the scanner, locator and merger.
//!
//! All offsets are byte offsets into UTF-8 text. Every offset returned here
//! sits on a line boundary, so it is always a valid char boundary.

use crate::config::WhitespacePolicy;

/// Offset of the first byte of the line containing `offset`.
pub fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |pos| pos + 1)
}

/// Offset just past the newline ending the line containing `offset`,
/// or the end of the text when that line is the last one.
pub fn line_end_inclusive(text: &str, offset: usize) -> usize {
    text[offset..]
        .find('\n')
        .map_or(text.len(), |pos| offset + pos + 1)
}

/// Leading spaces and tabs of a line.
pub fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// 1-based line number of `offset` (for diagnostics).
pub fn line_number(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

/// Strip the line terminator (`\n` or `\r\n`) from a line.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// The line terminator used at `offset`: that line's own, or the file's
/// first one when the line is unterminated. Defaults to `\n`.
pub fn line_ending_at(text: &str, offset: usize) -> &'static str {
    let line = &text[line_start(text, offset)..line_end_inclusive(text, offset)];
    let terminated = if line.ends_with('\n') {
        line
    } else {
        match text.find('\n') {
            Some(pos) => &text[..=pos],
            None => return "\n",
        }
    };
    if terminated.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Rewrite every line terminator of `text` as `newline`.
pub fn with_line_ending(text: &str, newline: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.ends_with('\n') {
            out.push_str(strip_line_ending(line));
            out.push_str(newline);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Re-indent a block body.
///
/// Each non-blank line loses the `strip` prefix (when present) and gains
/// `indent`. Blank lines are emitted empty. A non-empty result always ends
/// with a newline.
pub fn reindent(body: &str, strip: &str, indent: &str) -> String {
    let mut out = String::with_capacity(body.len() + indent.len() * 4);
    for line in body.split_inclusive('\n') {
        let content = strip_line_ending(line);
        let ending = if line.ends_with("\r\n") { "\r\n" } else { "\n" };

        if content.trim().is_empty() {
            out.push_str(ending);
            continue;
        }

        let content = if strip.is_empty() {
            content
        } else {
            content.strip_prefix(strip).unwrap_or(content)
        };
        out.push_str(indent);
        out.push_str(content);
        out.push_str(ending);
    }
    out
}

/// Remove trailing whitespace from every line and drop trailing blank lines.
pub fn normalize_trailing_whitespace(body: &str) -> String {
    let mut lines: Vec<&str> = body.lines().map(str::trim_end).collect();
    while lines.last().map_or(false, |line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Whether two block bodies are the same under the given policy.
pub fn bodies_match(old: &str, new: &str, policy: WhitespacePolicy) -> bool {
    match policy {
        WhitespacePolicy::Exact => old == new,
        WhitespacePolicy::IgnoreTrailing => {
            old == new || normalize_trailing_whitespace(old) == normalize_trailing_whitespace(new)
        }
    }
}

/// Line number of the first version-control conflict marker, if any.
pub fn find_conflict_marker(text: &str) -> Option<usize> {
    text.lines()
        .position(|line| line.starts_with("<<<<<") || line.starts_with(">>>>>"))
        .map(|idx| idx + 1)
}
