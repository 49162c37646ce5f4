
use crate::{
    merge_source, Annotation, CacheEntry, DeclarationIndex, DeclarationSpec, MergeConfig,
    MergeOutcome, Scanner,
};
use std::ops::Range;
use std::path::Path;

/// Body range of the braces opened by `open`, e.g. `"class Foo {"`.
fn body(text: &str, open: &str) -> Range<usize> {
    let start = text.find(open).expect("declaration in text") + open.len();
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
    panic!("unbalanced braces after {:?}", open);
}

fn ty(text: &str, name: &str, open: &str) -> DeclarationSpec {
    DeclarationSpec::ty(name, body(text, open))
}

fn ext(text: &str, name: &str, open: &str) -> DeclarationSpec {
    DeclarationSpec::extension(name, body(text, open))
}

fn blocks(template: &str) -> Vec<Annotation> {
    Scanner::default().scan(template).unwrap().annotations
}

fn merge_with(
    text: &str,
    specs: &[DeclarationSpec],
    template: &str,
    previous: Option<&CacheEntry>,
    config: &MergeConfig,
) -> MergeOutcome {
    let path = Path::new("Source.swift");
    let index = DeclarationIndex::build(path, text, specs).unwrap();
    merge_source(path, text, &index, &blocks(template), previous, config).unwrap()
}

/// Merged text, or the original text when nothing changed.
fn merged(text: &str, specs: &[DeclarationSpec], template: &str) -> String {
    merge_with(text, specs, template, None, &MergeConfig::default())
        .content
        .unwrap_or_else(|| text.to_string())
}
