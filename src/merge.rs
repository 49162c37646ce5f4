//! The per-file merge: existing blocks are updated in place, auto blocks are
//! inserted at their anchors, everything else is left byte-for-byte alone.

use crate::annotation::{Annotation, Scanner};
use crate::cache::CacheEntry;
use crate::config::{DeletedBlockPolicy, MergeConfig};
use crate::declaration::DeclarationIndex;
use crate::emit::is_generated;
use crate::errors::{MergeError, MergeResult};
use crate::locator::locate;
use crate::text::{
    bodies_match, find_conflict_marker, line_ending_at, line_number, reindent, with_line_ending,
};
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use std::path::Path;

/// A range replacement in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
    pub key: String,
}

/// Result of merging one source file.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// New file text, or `None` when nothing changed.
    pub content: Option<String>,
    /// Keys of every block in the file after the merge.
    pub present: BTreeSet<String>,
    /// Deleted auto blocks kept out of the file.
    pub suppressed: BTreeSet<String>,
    /// Inline annotations that found no place in this file.
    pub unplaced: Vec<Annotation>,
    /// Number of edits applied.
    pub edits: usize,
    /// The file carries the generation header and was not touched.
    pub excluded: bool,
}

impl MergeOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.content.is_none()
    }
}

/// Merge `annotations` into `text`.
///
/// `previous` is the cache entry recorded for this file by the last run, if
/// the cache is enabled. Only inline annotations are merged; `File` and
/// `FileAuto` blocks belong to the output collector and are skipped here.
pub fn merge_source(
    path: &Path,
    text: &str,
    index: &DeclarationIndex,
    annotations: &[Annotation],
    previous: Option<&CacheEntry>,
    config: &MergeConfig,
) -> MergeResult<MergeOutcome> {
    if let Some(line) = find_conflict_marker(text) {
        return Err(MergeError::ConflictMarkersPresent { line });
    }

    let mut outcome = MergeOutcome::default();
    let inline: Vec<&Annotation> = annotations.iter().filter(|a| a.mode.is_inline()).collect();

    if is_generated(text, &config.comment_leader) {
        debug!("{}: generated file, not merging", path.display());
        outcome.excluded = true;
        outcome.unplaced = inline.into_iter().cloned().collect();
        return Ok(outcome);
    }

    let existing = Scanner::new(config.comment_leader.as_str()).scan(text)?;
    let mut seen_existing = HashSet::new();
    for block in &existing.annotations {
        if !seen_existing.insert(block.key.as_str()) {
            warn!(
                "{}:{}: duplicate block `{}`; only the first is updated",
                path.display(),
                block.line,
                block.key
            );
        }
        outcome.present.insert(block.key.clone());
    }

    let base_indent = config.base_indent();
    let mut edits = Vec::new();
    let mut seen = HashSet::new();

    for annotation in inline {
        if !seen.insert(annotation.key.as_str()) {
            warn!(
                "{}: `{}` rendered more than once; keeping the first",
                path.display(),
                annotation.key
            );
            continue;
        }

        if let Some(block) = existing.find(&annotation.key) {
            let body = with_line_ending(
                &reindent(&annotation.body, &annotation.indentation, &block.indentation),
                line_ending_at(text, block.outer.start),
            );
            if bodies_match(&block.body, &body, config.whitespace) {
                debug!("{}: `{}` is up to date", path.display(), annotation.key);
            } else {
                debug!("{}: replacing `{}`", path.display(), annotation.key);
                edits.push(Edit {
                    range: block.body_range.clone(),
                    text: body,
                    key: annotation.key.clone(),
                });
            }
            continue;
        }

        if !annotation.mode.is_auto() {
            outcome.unplaced.push(annotation.clone());
            continue;
        }

        let was_inserted = previous.map_or(false, |entry| entry.remembers(&annotation.key));
        if was_inserted && config.deleted_blocks == DeletedBlockPolicy::LeaveAbsent {
            debug!(
                "{}: `{}` was deleted after generation; leaving it out",
                path.display(),
                annotation.key
            );
            outcome.suppressed.insert(annotation.key.clone());
            continue;
        }

        match locate(index, text, annotation, &config.comment_leader, &base_indent) {
            Ok(insertion) => {
                if let Some(block) = existing.enclosing(insertion.offset) {
                    warn!(
                        "{}: anchor of `{}` lies inside `{}` (line {}); not inserting",
                        path.display(),
                        annotation.key,
                        block.key,
                        block.line
                    );
                    outcome.unplaced.push(annotation.clone());
                    continue;
                }
                debug!(
                    "{}: inserting `{}` at byte {}",
                    path.display(),
                    annotation.key,
                    insertion.offset
                );
                outcome.present.insert(annotation.key.clone());
                edits.push(Edit {
                    range: insertion.offset..insertion.offset,
                    text: insertion.text,
                    key: annotation.key.clone(),
                });
            }
            Err(MergeError::UnresolvedAnchor { key }) => {
                debug!("{}: no anchor for `{}`", path.display(), key);
                outcome.unplaced.push(annotation.clone());
            }
            Err(err) => return Err(err),
        }
    }

    outcome.edits = edits.len();
    let merged = apply_edits(text, edits)?;
    if merged != text {
        outcome.content = Some(merged);
    }
    Ok(outcome)
}

/// Apply non-overlapping edits to `text`.
///
/// Edits are applied from the highest start offset down, so offsets computed
/// against the original text stay valid. Equal offsets apply in descending
/// key order, which leaves the inserted blocks in ascending key order.
pub fn apply_edits(text: &str, mut edits: Vec<Edit>) -> MergeResult<String> {
    edits.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then_with(|| a.key.cmp(&b.key))
    });

    for pair in edits.windows(2) {
        if pair[0].range.end > pair[1].range.start {
            return Err(MergeError::structural(
                line_number(text, pair[1].range.start),
                format!("`{}` overlaps `{}`", pair[1].key, pair[0].key),
            ));
        }
    }

    let mut out = text.to_string();
    for edit in edits.iter().rev() {
        out.replace_range(edit.range.clone(), &edit.text);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(start: usize, end: usize, text: &str, key: &str) -> Edit {
        Edit {
            range: start..end,
            text: text.to_string(),
            key: key.to_string(),
        }
    }

    #[test]
    fn test_apply_edits_descending() {
        let text = "abcdef";
        let out = apply_edits(text, vec![edit(0, 1, "X", "a"), edit(4, 6, "YZW", "b")]).unwrap();
        assert_eq!(out, "XbcdYZW");
    }

    #[test]
    fn test_apply_edits_equal_offsets_sorted_by_key() {
        let text = "{}";
        let out = apply_edits(
            text,
            vec![edit(1, 1, "[otherFake]", "Foo.otherFake"), edit(1, 1, "[fake]", "Foo.fake")],
        )
        .unwrap();
        assert_eq!(out, "{[fake][otherFake]}");
    }

    #[test]
    fn test_apply_edits_rejects_overlap() {
        let err = apply_edits("abcdef", vec![edit(0, 3, "X", "a"), edit(2, 4, "Y", "b")]).unwrap_err();
        assert!(matches!(err, MergeError::StructuralAnnotation { .. }));
    }

    #[test]
    fn test_conflict_markers_fail_before_scanning() {
        let text = "class Foo {\n<<<<<<< HEAD\n// sourcery:inline:Foo.A\n}\n";
        let err = merge_source(
            Path::new("Foo.swift"),
            text,
            &DeclarationIndex::empty(),
            &[],
            None,
            &MergeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::ConflictMarkersPresent { line: 2 }));
    }
}
