//! Error types for the fixture harness.
//!
//! Parse and load errors stop a fixture before it runs. Mismatches found
//! while running are reported as [`crate::runner::Failure`]s instead.

use thiserror::Error;

/// Errors that can occur while loading or running a fixture.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Error parsing a fixture file.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Error loading a fixture file.
    #[error("failed to load fixture: {path}: {message}")]
    Load { path: String, message: String },

    /// The fixture could not be set up or run.
    #[error("fixture setup failed: {message}")]
    Setup { message: String },
}

/// Result type for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;
