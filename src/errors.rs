//! Error types for the merge engine.
//!
//! Every error is scoped to one file. The batch runner collects them as
//! [`FileError`]s so that a failure in one file never aborts the others.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning, merging or writing a file.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Unmatched, unterminated or nested annotation markers.
    #[error("malformed annotation at line {line}: {message}")]
    StructuralAnnotation { line: usize, message: String },

    /// The file contains unresolved version-control conflict markers.
    #[error("unresolved merge conflict markers at line {line}; resolve the conflict before generating")]
    ConflictMarkersPresent { line: usize },

    /// An auto-placed annotation whose anchor declaration does not exist.
    #[error("no declaration found to anchor `{key}`")]
    UnresolvedAnchor { key: String },

    /// Atomic replacement of a file failed.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A declaration range does not fit the file it describes.
    #[error("invalid declaration in {}: {message}", path.display())]
    InvalidDeclaration { path: PathBuf, message: String },

    /// The fragment cache could not be loaded or saved.
    #[error("fragment cache {}: {message}", path.display())]
    Cache { path: PathBuf, message: String },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl MergeError {
    pub(crate) fn structural(line: usize, message: impl Into<String>) -> Self {
        MergeError::StructuralAnnotation {
            line,
            message: message.into(),
        }
    }

    /// Whether this error stops the merge of the file it belongs to.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MergeError::UnresolvedAnchor { .. })
    }

    /// Short stable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::StructuralAnnotation { .. } => "structural",
            MergeError::ConflictMarkersPresent { .. } => "conflict",
            MergeError::UnresolvedAnchor { .. } => "unresolved",
            MergeError::WriteFailure { .. } => "write",
            MergeError::Read { .. } => "read",
            MergeError::InvalidDeclaration { .. } => "declaration",
            MergeError::Cache { .. } => "cache",
            MergeError::Config { .. } => "config",
        }
    }
}

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// An error attributed to a single source file, template or output.
#[derive(Debug)]
pub struct FileError {
    pub path: PathBuf,
    pub error: MergeError,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, error: MergeError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
