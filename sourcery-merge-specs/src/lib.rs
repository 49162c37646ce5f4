#![doc(issue_tracker_base_url = "https://github.com/storyscript/sourcery-merge/issues/")]

//! Fixture-driven testing infrastructure for sourcery-merge.
//!
//! Test cases are `.merge` files: source files with inline declaration
//! markers, rendered templates, and the expected files after merging.
//!
//! ## Overview
//!
//! Declarations are marked directly in the source text (`«Name:` ... `»`
//! around a body interior), so a fixture shows at a glance where every
//! auto-placed block is anchored. Each fixture runs in a scratch project
//! and is then merged a second time to check that nothing changes.
//!
//! ## Modules
//!
//! - [`parser`] - Parses `.merge` fixture files and declaration markers
//! - [`fixture`] - Fixture types
//! - [`loader`] - Loads fixtures from disk
//! - [`runner`] - Runs fixtures through the merge engine
//! - [`formatter`] - Readable failure reports
//! - [`errors`] - Error types for the harness

pub mod errors;
pub mod fixture;
pub mod formatter;
pub mod loader;
pub mod parser;
pub mod runner;

pub use errors::{SpecError, SpecResult};
pub use fixture::{
    ExpectTarget, Expectation, ExpectedError, FixtureFile, FixtureTemplate, MergeFixture, Setting,
};
pub use formatter::{format_failure, format_outcome, format_summary};
pub use loader::{load_all_fixtures, load_fixture};
pub use parser::{parse_declarations, parse_fixture};
pub use runner::{run_all, run_fixture, Failure, FixtureOutcome, HarnessResult};
