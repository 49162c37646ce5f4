//! Batch orchestration: route rendered blocks to source files, merge every
//! file on the worker pool, then write results and update the cache.

use crate::annotation::{Annotation, ScanResult, Scanner};
use crate::cache::{CacheEntry, FragmentCache};
use crate::config::MergeConfig;
use crate::declaration::{DeclarationIndex, DeclarationKind, DeclarationSpec};
use crate::emit::{
    aggregate_body, aggregate_path, is_generated, FileSink, GeneratedOutput, OutputCollector,
};
use crate::errors::{FileError, MergeError, MergeResult};
use crate::locator::anchor_name;
use crate::merge::{merge_source, MergeOutcome};
use crate::write::{remove_if_exists, write_atomic, write_if_changed, WriteStatus};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// A source file and its declarations.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub index: DeclarationIndex,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>, index: DeclarationIndex) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            index,
        }
    }

    /// Build a source file from text and its scanned declarations.
    pub fn with_declarations(
        path: impl Into<PathBuf>,
        text: impl Into<String>,
        specs: &[DeclarationSpec],
    ) -> MergeResult<Self> {
        let path = path.into();
        let text = text.into();
        let index = DeclarationIndex::build(&path, &text, specs)?;
        Ok(Self { path, text, index })
    }

    /// Read a source file from disk. A file that no longer exists is skipped
    /// with a warning.
    pub fn load(path: &Path, specs: &[DeclarationSpec]) -> MergeResult<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::with_declarations(path, text, specs).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("{}: source file disappeared; skipping", path.display());
                Ok(None)
            }
            Err(source) => Err(MergeError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// The rendered output of one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    /// Template identity; names the aggregate output.
    pub name: String,
    pub text: String,
}

impl RenderedTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Merge result for one source file, not yet written.
#[derive(Debug)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub result: MergeResult<MergeOutcome>,
}

/// Everything a run will write.
#[derive(Debug, Default)]
pub struct Plan {
    pub files: Vec<PlannedFile>,
    pub outputs: Vec<GeneratedOutput>,
    /// Errors found before merging (unreadable templates).
    pub errors: Vec<FileError>,
}

/// Status of one file after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: WriteStatus,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub sources: Vec<FileReport>,
    pub outputs: Vec<FileReport>,
    pub errors: Vec<FileError>,
    pub dry_run: bool,
}

impl RunReport {
    fn count(&self, status: WriteStatus) -> usize {
        self.sources
            .iter()
            .chain(&self.outputs)
            .filter(|report| report.status == status)
            .count()
    }

    pub fn written(&self) -> usize {
        self.count(WriteStatus::Written)
    }

    pub fn unchanged(&self) -> usize {
        self.count(WriteStatus::Unchanged)
    }

    pub fn removed(&self) -> usize {
        self.count(WriteStatus::Removed)
    }

    pub fn skipped(&self) -> usize {
        self.count(WriteStatus::Skipped)
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    pub fn status_of(&self, path: &Path) -> Option<WriteStatus> {
        self.sources
            .iter()
            .chain(&self.outputs)
            .find(|report| report.path == path)
            .map(|report| report.status)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success() { "OK" } else { "FAILED" };
        let verb = if self.dry_run { "would write" } else { "written" };
        writeln!(
            f,
            "{}: {} {}, {} unchanged, {} removed, {} skipped",
            status,
            self.written(),
            verb,
            self.unchanged(),
            self.removed(),
            self.skipped()
        )?;
        for error in &self.errors {
            writeln!(f, "  error: {}", error)?;
        }
        Ok(())
    }
}

/// Where each inline block of a template went.
struct Routed {
    scan: ScanResult,
    /// Source index per annotation, `None` when no file takes it.
    targets: Vec<Option<usize>>,
}

/// Drives a merge run over a set of sources and rendered templates.
#[derive(Debug, Clone)]
pub struct Runner<'a> {
    config: &'a MergeConfig,
    output_dir: PathBuf,
    dry_run: bool,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a MergeConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            dry_run: false,
        }
    }

    /// Compute everything but write nothing, cache included.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Open the cache, plan, apply and save the cache.
    pub fn run(&self, sources: &[SourceFile], templates: &[RenderedTemplate]) -> RunReport {
        let mut cache = FragmentCache::open(self.config, sources.iter().map(|s| s.path.as_path()));
        let plan = self.plan(sources, templates, &cache);
        let report = self.apply(plan, &mut cache);

        if !self.dry_run {
            if let Err(err) = cache.save() {
                warn!("{}", err);
            }
        }
        report
    }

    /// Scan templates, route their blocks and merge every source file.
    pub fn plan(
        &self,
        sources: &[SourceFile],
        templates: &[RenderedTemplate],
        cache: &FragmentCache,
    ) -> Plan {
        let scanner = Scanner::new(self.config.comment_leader.as_str());
        let mut plan = Plan::default();

        let eligible: Vec<bool> = sources
            .iter()
            .map(|source| !is_generated(&source.text, &self.config.comment_leader))
            .collect();
        let existing_keys: Vec<HashSet<String>> = sources
            .par_iter()
            .zip(eligible.par_iter())
            .map(|(source, &eligible)| {
                if !eligible {
                    return HashSet::new();
                }
                scanner
                    .scan(&source.text)
                    .map(|scan| scan.annotations.into_iter().map(|a| a.key).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut collector = OutputCollector::new(&self.output_dir, self.config.output_extension.as_str())
            .with_type_dirs(type_dirs(sources, &eligible));

        let mut groups: Vec<Vec<Annotation>> = vec![Vec::new(); sources.len()];
        let mut routed = Vec::with_capacity(templates.len());
        for template in templates {
            let scan = match scanner.scan(&template.text) {
                Ok(scan) => scan,
                Err(error) => {
                    plan.errors.push(FileError::new(template.name.as_str(), error));
                    routed.push(None);
                    continue;
                }
            };

            let mut targets = Vec::with_capacity(scan.annotations.len());
            for annotation in &scan.annotations {
                if !annotation.mode.is_inline() {
                    collector.push(annotation);
                    targets.push(None);
                    continue;
                }

                let target = route(annotation, sources, &eligible, &existing_keys);
                match target {
                    Some(idx) => groups[idx].push(annotation.clone()),
                    None => debug!(
                        "{}: `{}` has no target file; keeping it in the template output",
                        template.name, annotation.key
                    ),
                }
                targets.push(target);
            }
            routed.push(Some(Routed { scan, targets }));
        }

        let config = self.config;
        plan.files = sources
            .par_iter()
            .zip(groups.par_iter())
            .map(|(source, annotations)| {
                let result = merge_source(
                    &source.path,
                    &source.text,
                    &source.index,
                    annotations,
                    cache.entry(&source.path),
                    config,
                );
                PlannedFile {
                    path: source.path.clone(),
                    result,
                }
            })
            .collect();

        let unplaced: Vec<HashSet<&str>> = plan
            .files
            .iter()
            .map(|file| match &file.result {
                Ok(outcome) => outcome.unplaced.iter().map(|a| a.key.as_str()).collect(),
                Err(_) => HashSet::new(),
            })
            .collect();

        let mut aggregates = Vec::new();
        for (template, routed) in templates.iter().zip(&routed) {
            let routed = match routed {
                Some(routed) => routed,
                None => continue,
            };
            let kept: HashSet<usize> = routed
                .scan
                .annotations
                .iter()
                .zip(&routed.targets)
                .filter(|(annotation, target)| {
                    annotation.mode.is_inline()
                        && target.map_or(true, |idx| unplaced[idx].contains(annotation.key.as_str()))
                })
                .map(|(annotation, _)| annotation.outer.start)
                .collect();

            let body = aggregate_body(&template.text, &routed.scan, |annotation| {
                kept.contains(&annotation.outer.start)
            });
            aggregates.push(GeneratedOutput::new(
                aggregate_path(&self.output_dir, &template.name, &self.config.output_extension),
                vec![body],
            ));
        }

        plan.outputs = aggregates;
        plan.outputs.extend(collector.into_outputs());
        plan
    }

    /// Write the planned results and record them in the cache.
    pub fn apply(&self, plan: Plan, cache: &mut FragmentCache) -> RunReport {
        let mut report = RunReport {
            errors: plan.errors,
            dry_run: self.dry_run,
            ..RunReport::default()
        };

        for file in plan.files {
            let outcome = match file.result {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!("{}: {}", file.path.display(), error);
                    report.errors.push(FileError::new(file.path, error));
                    continue;
                }
            };

            if outcome.excluded {
                report.sources.push(FileReport {
                    path: file.path,
                    status: WriteStatus::Skipped,
                });
                continue;
            }

            let status = match &outcome.content {
                None => WriteStatus::Unchanged,
                Some(_) if self.dry_run => WriteStatus::Written,
                Some(content) => match write_atomic(&file.path, content) {
                    Ok(()) => {
                        info!("{}: {} edit(s) written", file.path.display(), outcome.edits);
                        WriteStatus::Written
                    }
                    Err(error) => {
                        warn!("{}", error);
                        report.errors.push(FileError::new(file.path, error));
                        continue;
                    }
                },
            };

            cache.record(
                &file.path,
                CacheEntry::new(outcome.present, outcome.suppressed),
            );
            report.sources.push(FileReport {
                path: file.path,
                status,
            });
        }

        let leader = self.config.comment_leader.as_str();
        for output in plan.outputs {
            let result = if output.is_empty() && self.config.prune_empty_outputs {
                if self.dry_run {
                    Ok(if output.path.exists() {
                        WriteStatus::Removed
                    } else {
                        WriteStatus::Skipped
                    })
                } else {
                    remove_if_exists(&output.path)
                }
            } else if self.dry_run {
                let current = std::fs::read_to_string(&output.path).ok();
                Ok(if current.as_deref() == Some(output.render(leader).as_str()) {
                    WriteStatus::Unchanged
                } else {
                    WriteStatus::Written
                })
            } else {
                write_if_changed(&output.path, &output.render(leader))
            };

            match result {
                Ok(status) => {
                    if status == WriteStatus::Written {
                        info!("{}: generated", output.path.display());
                    }
                    report.outputs.push(FileReport {
                        path: output.path,
                        status,
                    });
                }
                Err(error) => report.errors.push(FileError::new(output.path, error)),
            }
        }

        report
    }
}

/// The file an inline block merges into: the first with an existing block
/// under its key, else for auto blocks the first that declares its anchor.
fn route(
    annotation: &Annotation,
    sources: &[SourceFile],
    eligible: &[bool],
    existing_keys: &[HashSet<String>],
) -> Option<usize> {
    let candidates = || (0..sources.len()).filter(|&idx| eligible[idx]);

    if let Some(idx) = candidates().find(|&idx| existing_keys[idx].contains(&annotation.key)) {
        return Some(idx);
    }
    if !annotation.mode.is_auto() {
        return None;
    }
    let anchor = anchor_name(&annotation.key)?;
    candidates().find(|&idx| sources[idx].index.contains(anchor))
}

/// Directory of the first file declaring each top-level type.
///
/// Types declared in more than one file are reported; the first file wins.
fn type_dirs(sources: &[SourceFile], eligible: &[bool]) -> HashMap<String, PathBuf> {
    let mut owners: HashMap<String, &Path> = HashMap::new();
    let eligible_sources = || {
        sources
            .iter()
            .zip(eligible)
            .filter_map(|(source, &eligible)| if eligible { Some(source) } else { None })
    };

    for source in eligible_sources() {
        for decl in source.index.roots() {
            if decl.kind != DeclarationKind::Type {
                continue;
            }
            match owners.get(&decl.qualified_name) {
                Some(first) if *first != source.path.as_path() => warn!(
                    "`{}` is declared in both {} and {}; using the first",
                    decl.qualified_name,
                    first.display(),
                    source.path.display()
                ),
                Some(_) => {}
                None => {
                    owners.insert(decl.qualified_name.clone(), &source.path);
                }
            }
        }
    }

    for source in eligible_sources() {
        for decl in source.index.roots() {
            owners
                .entry(decl.qualified_name.clone())
                .or_insert(&source.path);
        }
    }

    owners
        .into_iter()
        .map(|(name, path)| {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (name, dir)
        })
        .collect()
}
