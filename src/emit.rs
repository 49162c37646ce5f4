//! Generated outputs: per-template aggregate files and `file:` fragments.

use crate::annotation::{Annotation, AnnotationMode, ScanResult};
use crate::text::reindent;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const GENERATOR: &str = "sourcery-merge";

/// Header written at the top of every generated output.
pub fn header(leader: &str) -> String {
    format!(
        "{leader} Generated using {} {}\n{leader} DO NOT EDIT\n",
        GENERATOR,
        env!("CARGO_PKG_VERSION"),
        leader = leader
    )
}

/// Whether a file was produced by the generator and must not be merged into.
pub fn is_generated(text: &str, leader: &str) -> bool {
    let first = text.lines().next().unwrap_or("");
    first
        .strip_prefix(leader)
        .map_or(false, |rest| rest.trim_start().starts_with("Generated using"))
}

/// Path of a `file:` output: paths without an extension get
/// `.generated.<ext>` appended.
pub fn generated_path(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".generated.{}", extension));
    PathBuf::from(name)
}

/// Path of a template's aggregate output.
pub fn aggregate_path(output_dir: &Path, template: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.generated.{}", template, extension))
}

/// The type a `file:auto:` path belongs to: its file name up to the first
/// `+` or `.`.
pub fn owning_type(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let end = name.find(|c: char| c == '+' || c == '.').unwrap_or(name.len());
    &name[..end]
}

/// Rendered template text with placed blocks cut out.
///
/// Free text and every block for which `keep` returns true are emitted in
/// document order; kept blocks keep their markers.
pub fn aggregate_body(text: &str, scan: &ScanResult, keep: impl Fn(&Annotation) -> bool) -> String {
    let mut pieces: Vec<_> = scan.free.iter().cloned().collect();
    pieces.extend(
        scan.annotations
            .iter()
            .filter(|annotation| keep(annotation))
            .map(|annotation| annotation.outer.clone()),
    );
    pieces.sort_by_key(|range| range.start);
    pieces.into_iter().map(|range| &text[range]).collect()
}

/// Receives `File` and `FileAuto` blocks.
pub trait FileSink {
    fn push(&mut self, annotation: &Annotation);
}

/// One generated output and the bodies that make it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub path: PathBuf,
    pub bodies: Vec<String>,
}

impl GeneratedOutput {
    pub fn new(path: impl Into<PathBuf>, bodies: Vec<String>) -> Self {
        Self {
            path: path.into(),
            bodies,
        }
    }

    /// No body has any non-whitespace content.
    pub fn is_empty(&self) -> bool {
        self.bodies.iter().all(|body| body.trim().is_empty())
    }

    /// Header followed by the bodies, separated by one blank line.
    pub fn render(&self, leader: &str) -> String {
        let mut out = header(leader);
        out.push_str(&self.bodies.join("\n"));
        out
    }
}

/// Collects file blocks into outputs, keyed by resolved path.
#[derive(Debug, Clone)]
pub struct OutputCollector {
    output_dir: PathBuf,
    extension: String,
    type_dirs: HashMap<String, PathBuf>,
    outputs: Vec<GeneratedOutput>,
    positions: HashMap<PathBuf, usize>,
}

impl OutputCollector {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            type_dirs: HashMap::new(),
            outputs: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Directories of the files declaring each type, for `file:auto:` paths.
    pub fn with_type_dirs(mut self, type_dirs: HashMap<String, PathBuf>) -> Self {
        self.type_dirs = type_dirs;
        self
    }

    /// Where a file-mode block is written.
    pub fn resolve(&self, mode: &AnnotationMode) -> Option<PathBuf> {
        let (base, relative) = match mode {
            AnnotationMode::File(path) => (&self.output_dir, path),
            AnnotationMode::FileAuto(path) => {
                let base = self
                    .type_dirs
                    .get(owning_type(path))
                    .unwrap_or(&self.output_dir);
                (base, path)
            }
            _ => return None,
        };
        Some(generated_path(&base.join(relative), &self.extension))
    }

    pub fn into_outputs(self) -> Vec<GeneratedOutput> {
        self.outputs
    }
}

impl FileSink for OutputCollector {
    /// Inline blocks have no output path and are ignored.
    fn push(&mut self, annotation: &Annotation) {
        let path = match self.resolve(&annotation.mode) {
            Some(path) => path,
            None => return,
        };
        debug!("`{}` -> {}", annotation.key, path.display());

        let body = reindent(&annotation.body, &annotation.indentation, "");
        match self.positions.get(&path) {
            Some(&idx) => self.outputs[idx].bodies.push(body),
            None => {
                self.positions.insert(path.clone(), self.outputs.len());
                self.outputs.push(GeneratedOutput::new(path, vec![body]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Scanner;

    fn file_block(path: &str, body: &str) -> Annotation {
        Annotation {
            key: path.to_string(),
            mode: AnnotationMode::File(path.to_string()),
            body: body.to_string(),
            indentation: String::new(),
            line: 1,
            outer: 0..0,
            body_range: 0..0,
        }
    }

    #[test]
    fn test_header_and_detection() {
        let header = header("//");
        assert!(header.starts_with("// Generated using sourcery-merge "));
        assert!(header.ends_with("// DO NOT EDIT\n"));
        assert!(is_generated(&header, "//"));
        assert!(!is_generated("class Foo {}\n// Generated using sourcery-merge\n", "//"));
        assert!(!is_generated(&header, "#"));
    }

    #[test]
    fn test_generated_path() {
        assert_eq!(
            generated_path(Path::new("out/Generated/Foo"), "swift"),
            PathBuf::from("out/Generated/Foo.generated.swift")
        );
        assert_eq!(
            generated_path(Path::new("out/Generated/Foo.generated.swift"), "swift"),
            PathBuf::from("out/Generated/Foo.generated.swift")
        );
    }

    #[test]
    fn test_owning_type() {
        assert_eq!(owning_type("Generated/Foo+Codable"), "Foo");
        assert_eq!(owning_type("Foo.Bar.swift"), "Foo");
        assert_eq!(owning_type("Baz"), "Baz");
    }

    #[test]
    fn test_bodies_for_one_path_are_joined() {
        let mut collector = OutputCollector::new("out", "swift");
        collector.push(&file_block("Generated/Foo", "X\n"));
        collector.push(&file_block("Generated/Bar", "Z\n"));
        collector.push(&file_block("Generated/Foo", "Y\n"));

        let outputs = collector.into_outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].path, PathBuf::from("out/Generated/Foo.generated.swift"));
        assert_eq!(outputs[0].render("//"), format!("{}X\n\nY\n", header("//")));
    }

    #[test]
    fn test_file_auto_resolves_next_to_declaring_source() {
        let mut dirs = HashMap::new();
        dirs.insert("Foo".to_string(), PathBuf::from("Sources/Model"));
        let collector = OutputCollector::new("out", "swift").with_type_dirs(dirs);

        assert_eq!(
            collector.resolve(&AnnotationMode::FileAuto("Foo+Codable".into())),
            Some(PathBuf::from("Sources/Model/Foo+Codable.generated.swift"))
        );
        assert_eq!(
            collector.resolve(&AnnotationMode::FileAuto("Bar+Codable".into())),
            Some(PathBuf::from("out/Bar+Codable.generated.swift"))
        );
        assert_eq!(collector.resolve(&AnnotationMode::Inline), None);
    }

    #[test]
    fn test_empty_output() {
        assert!(GeneratedOutput::new("a", vec!["\n".into(), "  ".into()]).is_empty());
        assert!(!GeneratedOutput::new("a", vec!["x".into()]).is_empty());
    }

    #[test]
    fn test_aggregate_body_keeps_unplaced_blocks() {
        let text = "// Line One\n// sourcery:inline:auto:Foo.A\na\n// sourcery:end\n// sourcery:inline:Bar.B\nb\n// sourcery:end\ntail\n";
        let scan = Scanner::default().scan(text).unwrap();
        let body = aggregate_body(text, &scan, |annotation| annotation.key == "Bar.B");
        assert_eq!(
            body,
            "// Line One\n// sourcery:inline:Bar.B\nb\n// sourcery:end\ntail\n"
        );
    }
}
