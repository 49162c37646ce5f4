//! Write decision: files are only replaced when their content changed, and
//! always atomically.

use crate::errors::{MergeError, MergeResult};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// What happened to one file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WriteStatus {
    Written,
    Unchanged,
    Removed,
    /// Nothing on disk and nothing to write.
    Skipped,
}

fn write_failure(path: &Path) -> impl FnOnce(io::Error) -> MergeError + '_ {
    move |source| MergeError::WriteFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory. On failure the previous file is left intact. A replaced file
/// keeps its permissions.
pub fn write_atomic(path: &Path, contents: &str) -> MergeResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_failure(path))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(write_failure(path))?;
    temp.write_all(contents.as_bytes())
        .map_err(write_failure(path))?;
    temp.flush().map_err(write_failure(path))?;
    match fs::metadata(path) {
        Ok(meta) => temp
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(write_failure(path))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(write_failure(path)(err)),
    }
    temp.persist(path)
        .map_err(|err| write_failure(path)(err.error))?;
    Ok(())
}

/// Write `contents` unless the file already holds exactly that text.
pub fn write_if_changed(path: &Path, contents: &str) -> MergeResult<WriteStatus> {
    match fs::read_to_string(path) {
        Ok(current) if current == contents => return Ok(WriteStatus::Unchanged),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {}
        Err(source) => {
            return Err(MergeError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    write_atomic(path, contents)?;
    Ok(WriteStatus::Written)
}

/// Remove a stale output, if there is one.
pub fn remove_if_exists(path: &Path) -> MergeResult<WriteStatus> {
    match fs::remove_file(path) {
        Ok(()) => Ok(WriteStatus::Removed),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(WriteStatus::Skipped),
        Err(source) => Err(MergeError::WriteFailure {
            path: path.to_path_buf(),
            source,
        }),
    }
}
