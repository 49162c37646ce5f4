//! Fixture file loading.

use crate::{parse_fixture, MergeFixture, SpecError};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Load a single fixture file.
pub fn load_fixture(path: &Path) -> Result<MergeFixture, SpecError> {
    let content = fs::read_to_string(path).map_err(|e| SpecError::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_fixture(&content).map_err(|e| SpecError::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load all fixtures from a directory (glob: **/*.merge), sorted by their
/// path relative to `dir`. A missing directory holds no fixtures.
pub fn load_all_fixtures(dir: &Path) -> Result<Vec<(String, MergeFixture)>, SpecError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut fixtures = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| SpecError::Load {
            path: e.path().unwrap_or(dir).display().to_string(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "merge") {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let fixture = load_fixture(path)?;
        fixtures.push((relative.to_string_lossy().replace('\\', "/"), fixture));
    }

    fixtures.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fixture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("inline-auto-single-line.merge");
        let fixture = load_fixture(&path).unwrap();
        assert!(fixture.title.is_some());
        assert_eq!(fixture.sources.len(), 1);
    }

    #[test]
    fn test_load_all_fixtures() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let fixtures = load_all_fixtures(&dir).unwrap();
        assert!(fixtures.len() >= 5);
        assert!(fixtures.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn test_load_nested_fixtures() {
        let dir = tempfile::TempDir::new().unwrap();
        let fixture = "--- source Foo.swift\nclass Foo {}\n";
        fs::create_dir_all(dir.path().join("auto")).unwrap();
        fs::write(dir.path().join("auto/single.merge"), fixture).unwrap();
        fs::write(dir.path().join("explicit.merge"), fixture).unwrap();
        fs::write(dir.path().join("notes.md"), "not a fixture\n").unwrap();

        let fixtures = load_all_fixtures(dir.path()).unwrap();
        let names: Vec<_> = fixtures.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["auto/single.merge", "explicit.merge"]);

        assert!(load_all_fixtures(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_fixture() {
        let err = load_fixture(Path::new("/nonexistent/fixture.merge")).unwrap_err();
        assert!(matches!(err, SpecError::Load { .. }));
    }
}
