#![doc(issue_tracker_base_url = "https://github.com/storyscript/sourcery-merge/issues/")]

//! Merge generated code fragments into hand-written source files.
//!
//! Templates render text containing annotated blocks. Each block names a key
//! and a placement mode; the engine finds where the block belongs, replaces
//! or inserts it while leaving every other byte of the file alone, and only
//! rewrites files whose content actually changed.
//!
//! ## Modules
//!
//! - [`annotation`] - Marker grammar and the line-oriented block scanner
//! - [`declaration`] - Arena index of the declarations in a source file
//! - [`locator`] - First-insertion position for auto-placed blocks
//! - [`merge`] - Per-file merge producing a new buffer or no change
//! - [`cache`] - Fragment cache for idempotence and deleted-block detection
//! - [`emit`] - Aggregate and `file:` outputs
//! - [`write`] - Atomic, change-only writes
//! - [`run`] - Routing, the worker pool and the run report
//! - [`config`] - Engine configuration
//! - [`errors`] - Error types
//!
//! ## Example
//!
//! ```ignore
//! use sourcery_merge::{DeclarationSpec, MergeConfig, RenderedTemplate, Runner, SourceFile};
//!
//! let source = SourceFile::with_declarations(
//!     "Sources/Foo.swift",
//!     "class Foo {}",
//!     &[DeclarationSpec::ty("Foo", 11..11)],
//! )?;
//! let template = RenderedTemplate::new(
//!     "Init",
//!     "// sourcery:inline:auto:Foo.init\ninit() {}\n// sourcery:end\n",
//! );
//!
//! let config = MergeConfig::default();
//! let report = Runner::new(&config, "Sources/Generated").run(&[source], &[template]);
//! assert!(report.success());
//! ```

pub mod annotation;
pub mod cache;
pub mod config;
pub mod declaration;
pub mod emit;
pub mod errors;
pub mod locator;
pub mod merge;
pub mod run;
pub mod text;
pub mod write;

pub use annotation::{Annotation, AnnotationMode, Marker, ScanResult, Scanner};
pub use cache::{CacheEntry, FragmentCache};
pub use config::{DeletedBlockPolicy, MergeConfig, WhitespacePolicy};
pub use declaration::{
    DeclId, Declaration, DeclarationFile, DeclarationIndex, DeclarationKind, DeclarationManifest,
    DeclarationSpec,
};
pub use emit::{FileSink, GeneratedOutput, OutputCollector};
pub use errors::{FileError, MergeError, MergeResult};
pub use locator::{locate, Insertion};
pub use merge::{apply_edits, merge_source, Edit, MergeOutcome};
pub use run::{FileReport, Plan, PlannedFile, RenderedTemplate, RunReport, Runner, SourceFile};
pub use write::WriteStatus;

#[cfg(test)]
mod tests;
