//! Insertion locator: where an auto-placed block goes the first time.

use crate::annotation::{Annotation, AnnotationMode, Marker};
use crate::declaration::{Declaration, DeclarationIndex};
use crate::errors::{MergeError, MergeResult};
use crate::text::{
    leading_whitespace, line_end_inclusive, line_ending_at, line_start, reindent, with_line_ending,
};

/// Text to insert at a byte offset of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub offset: usize,
    pub text: String,
}

/// The anchor part of a key: everything before its last `.`.
pub fn anchor_name(key: &str) -> Option<&str> {
    key.rsplit_once('.').map(|(anchor, _)| anchor)
}

/// Render a block with explicit `inline:` markers.
///
/// The body is dedented by `strip` (the indentation of the block's start
/// marker where it came from) and every non-blank line is indented by
/// `indent`, markers included. Every line ends with `newline`.
pub fn render_block(
    leader: &str,
    key: &str,
    body: &str,
    strip: &str,
    indent: &str,
    newline: &str,
) -> String {
    let mut out = String::new();
    out.push_str(indent);
    out.push_str(&Marker::render_start(leader, &AnnotationMode::Inline, key));
    out.push_str(newline);
    out.push_str(&with_line_ending(&reindent(body, strip, indent), newline));
    out.push_str(indent);
    out.push_str(&Marker::render_end(leader));
    out.push_str(newline);
    out
}

/// Compute the first insertion of an `InlineAuto` or `AfterAuto` block.
///
/// `base_indent` is added to the indentation derived from the anchor.
pub fn locate(
    index: &DeclarationIndex,
    text: &str,
    annotation: &Annotation,
    leader: &str,
    base_indent: &str,
) -> MergeResult<Insertion> {
    let unresolved = || MergeError::UnresolvedAnchor {
        key: annotation.key.clone(),
    };
    let decl = anchor_name(&annotation.key)
        .and_then(|anchor| index.first(anchor))
        .ok_or_else(unresolved)?;

    match annotation.mode {
        AnnotationMode::InlineAuto => Ok(inside_body(decl, text, annotation, leader, base_indent)),
        AnnotationMode::AfterAuto => Ok(after_body(decl, text, annotation, leader, base_indent)),
        _ => Err(unresolved()),
    }
}

fn closing_line_indent<'t>(decl: &Declaration, text: &'t str) -> &'t str {
    let start = line_start(text, decl.body.end);
    leading_whitespace(&text[start..line_end_inclusive(text, start)])
}

fn inside_body(
    decl: &Declaration,
    text: &str,
    annotation: &Annotation,
    leader: &str,
    base_indent: &str,
) -> Insertion {
    let multiline = text[decl.body.clone()].contains('\n');
    let (offset, indent) = if multiline {
        let offset = line_start(text, decl.body.end);
        (offset, format!("{}{}", closing_line_indent(decl, text), base_indent))
    } else {
        (decl.body.end, base_indent.to_string())
    };

    let newline = line_ending_at(text, decl.body.end);
    let block = render_block(
        leader,
        &annotation.key,
        &annotation.body,
        &annotation.indentation,
        &indent,
        newline,
    );
    Insertion {
        offset,
        text: format!("{}{}", newline, block),
    }
}

fn after_body(
    decl: &Declaration,
    text: &str,
    annotation: &Annotation,
    leader: &str,
    base_indent: &str,
) -> Insertion {
    let indent = format!("{}{}", closing_line_indent(decl, text), base_indent);
    let newline = line_ending_at(text, decl.body.end);
    let block = render_block(
        leader,
        &annotation.key,
        &annotation.body,
        &annotation.indentation,
        &indent,
        newline,
    );
    let needs_newline = !text[decl.trailing.clone()].ends_with('\n');

    Insertion {
        offset: decl.trailing.end,
        text: if needs_newline {
            format!("{}{}", newline, block)
        } else {
            block
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::DeclarationSpec;
    use std::ops::Range;
    use std::path::Path;

    fn body(text: &str, open: &str) -> Range<usize> {
        let start = text.find(open).unwrap() + open.len();
        let mut depth = 1;
        for (offset, ch) in text[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return start..start + offset;
                    }
                }
                _ => {}
            }
        }
        panic!("unbalanced braces after {}", open);
    }

    fn block(mode: AnnotationMode, key: &str, body: &str) -> Annotation {
        Annotation {
            key: key.to_string(),
            mode,
            body: body.to_string(),
            indentation: String::new(),
            line: 1,
            outer: 0..0,
            body_range: 0..0,
        }
    }

    fn apply(text: &str, insertion: &Insertion) -> String {
        let mut out = text.to_string();
        out.insert_str(insertion.offset, &insertion.text);
        out
    }

    #[test]
    fn test_single_line_body() {
        let text = "class Foo {}";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::InlineAuto, "Foo.Init", "init() {}\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &insertion),
            "class Foo {\n// sourcery:inline:Foo.Init\ninit() {}\n// sourcery:end\n}"
        );
    }

    #[test]
    fn test_multiline_body_uses_closing_line_and_base_indent() {
        let text = "class Foo {\n    struct Inner {\n    }\n}";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))
                .with_children(vec![DeclarationSpec::ty("Inner", body(text, "struct Inner {"))])],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::InlineAuto, "Foo.Inner.Inlined", "    var property = 3\n"),
            "//",
            "    ",
        )
        .unwrap();
        assert_eq!(
            apply(text, &insertion),
            "class Foo {\n    struct Inner {\n\n        // sourcery:inline:Foo.Inner.Inlined\n            var property = 3\n        // sourcery:end\n    }\n}"
        );
    }

    #[test]
    fn test_closing_delimiter_after_member() {
        let text = "class Foo {\n    var property = 1 }";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::InlineAuto, "Foo.Inlined", "var property = 2\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &insertion),
            "class Foo {\n\n    // sourcery:inline:Foo.Inlined\n    var property = 2\n    // sourcery:end\n    var property = 1 }"
        );
    }

    #[test]
    fn test_after_auto() {
        let text = "class Foo {}\nstruct Boo {}";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[
                DeclarationSpec::ty("Foo", body(text, "class Foo {")),
                DeclarationSpec::ty("Boo", body(text, "struct Boo {")),
            ],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::AfterAuto, "Foo.Inlined", "var property = 2\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &insertion),
            "class Foo {}\n// sourcery:inline:Foo.Inlined\nvar property = 2\n// sourcery:end\nstruct Boo {}"
        );
    }

    #[test]
    fn test_after_auto_at_end_of_file() {
        let text = "class Foo {}";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::AfterAuto, "Foo.Inlined", "var property = 2\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &insertion),
            "class Foo {}\n// sourcery:inline:Foo.Inlined\nvar property = 2\n// sourcery:end\n"
        );
    }

    #[test]
    fn test_first_declaration_in_source_order_wins() {
        let text = "class Foo {}\n\nextension Foo {\n}\n";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[
                DeclarationSpec::extension("Foo", body(text, "extension Foo {")),
                DeclarationSpec::ty("Foo", body(text, "class Foo {")),
            ],
        )
        .unwrap();

        let insertion = locate(
            &index,
            text,
            &block(AnnotationMode::InlineAuto, "Foo.fake", "var x = 1\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(insertion.offset, 11);
    }

    #[test]
    fn test_unresolved_anchor() {
        let text = "class Foo {}";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))],
        )
        .unwrap();

        for key in ["Bar.fake", "Foo"] {
            let err = locate(&index, text, &block(AnnotationMode::InlineAuto, key, ""), "//", "")
                .unwrap_err();
            assert!(matches!(err, MergeError::UnresolvedAnchor { .. }), "{}", key);
        }
    }

    #[test]
    fn test_crlf_source_gets_crlf_block() {
        let text = "class Foo {\r\n    var x = 1\r\n}\r\n";
        let index = DeclarationIndex::build(
            Path::new("a.swift"),
            text,
            &[DeclarationSpec::ty("Foo", body(text, "class Foo {"))],
        )
        .unwrap();

        let inside = locate(
            &index,
            text,
            &block(AnnotationMode::InlineAuto, "Foo.Init", "init() {\n}\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &inside),
            "class Foo {\r\n    var x = 1\r\n\r\n// sourcery:inline:Foo.Init\r\ninit() {\r\n}\r\n// sourcery:end\r\n}\r\n"
        );

        let after = locate(
            &index,
            text,
            &block(AnnotationMode::AfterAuto, "Foo.After", "let y = 2\n"),
            "//",
            "",
        )
        .unwrap();
        assert_eq!(
            apply(text, &after),
            "class Foo {\r\n    var x = 1\r\n}\r\n// sourcery:inline:Foo.After\r\nlet y = 2\r\n// sourcery:end\r\n"
        );
    }

    #[test]
    fn test_render_block_skips_blank_lines() {
        let rendered = render_block("//", "A.init", "init() {\n\n}\n", "", "    ", "\n");
        assert_eq!(
            rendered,
            "    // sourcery:inline:A.init\n    init() {\n\n    }\n    // sourcery:end\n"
        );
    }
}
