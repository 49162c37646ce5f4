//! Project manifest: where sources, declarations and rendered templates live.
//!
//! Relative paths are resolved against the manifest's directory.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use sourcery_merge::{DeclarationManifest, MergeConfig, RenderedTemplate};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn default_extensions() -> Vec<String> {
    vec!["swift".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Source files or directories (walked recursively).
    pub sources: Vec<PathBuf>,
    /// Extensions kept when walking a source directory.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Declaration index written by the declaration scanner.
    #[serde(default)]
    pub declarations: Option<PathBuf>,
    /// Directory of rendered templates, one file per template.
    pub rendered: PathBuf,
    /// Output directory for aggregate and `file:` outputs.
    pub output: PathBuf,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.merge.validate()?;
        Ok(manifest)
    }

    /// Load a manifest and resolve its paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest = Self::from_toml_str(&content)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(manifest.resolve(base))
    }

    fn resolve(mut self, base: &Path) -> Self {
        let join = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        };

        self.sources = self.sources.iter().map(|path| join(path)).collect();
        self.declarations = self.declarations.as_deref().map(join);
        self.rendered = join(&self.rendered);
        self.output = join(&self.output);
        self.merge.cache_path = join(&self.merge.cache_path);
        self
    }

    /// Every source file, in walk order, without duplicates.
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for source in &self.sources {
            if source.is_file() {
                if seen.insert(source.clone()) {
                    files.push(source.clone());
                }
                continue;
            }
            if !source.is_dir() {
                warn!("{}: source path does not exist; skipping", source.display());
                continue;
            }

            for entry in WalkDir::new(source).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("failed to walk {}", source.display()))?;
                let path = entry.path();
                let wanted = entry.file_type().is_file()
                    && path
                        .extension()
                        .map_or(false, |ext| self.extensions.iter().any(|e| ext == e.as_str()));
                if wanted && seen.insert(path.to_path_buf()) {
                    files.push(path.to_path_buf());
                }
            }
        }

        debug!("{} source files", files.len());
        Ok(files)
    }

    /// The declaration index, with its paths resolved like the sources.
    pub fn declaration_manifest(&self, base: &Path) -> Result<DeclarationManifest> {
        let path = match &self.declarations {
            Some(path) => path,
            None => return Ok(DeclarationManifest::default()),
        };

        let mut manifest = DeclarationManifest::load(path)?;
        for file in &mut manifest.files {
            if file.path.is_relative() {
                file.path = base.join(&file.path);
            }
        }
        Ok(manifest)
    }

    /// Rendered templates, named after their file stems.
    pub fn rendered_templates(&self) -> Result<Vec<RenderedTemplate>> {
        let mut templates = Vec::new();

        for entry in WalkDir::new(&self.rendered)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry
                .with_context(|| format!("failed to list rendered templates in {}", self.rendered.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let name = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read rendered template {}", path.display()))?;
            templates.push(RenderedTemplate::new(name, text));
        }

        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcery_merge::DeletedBlockPolicy;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
sources = ["Sources"]
declarations = "build/declarations.json"
rendered = "build/rendered"
output = "Sources/Generated"

[merge]
base_indentation = 4
deleted_blocks = "reinsert"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
        assert_eq!(manifest.extensions, vec!["swift".to_string()]);
        assert_eq!(manifest.merge.base_indentation, 4);
        assert_eq!(manifest.merge.deleted_blocks, DeletedBlockPolicy::Reinsert);
        assert_eq!(manifest.merge.comment_leader, "//");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Manifest::from_toml_str("sources = []\nrendered = \"r\"\noutput = \"o\"\nsource = 1\n").is_err());
    }

    #[test]
    fn test_invalid_merge_config_is_rejected() {
        let content = "sources = []\nrendered = \"r\"\noutput = \"o\"\n[merge]\ncomment_leader = \"\"\n";
        assert!(Manifest::from_toml_str(content).is_err());
    }

    #[test]
    fn test_paths_resolve_against_manifest_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sourcery-merge.toml");
        fs::write(&path, MANIFEST).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.sources, vec![dir.path().join("Sources")]);
        assert_eq!(manifest.output, dir.path().join("Sources/Generated"));
        assert_eq!(
            manifest.merge.cache_path,
            dir.path().join(".sourcery-merge/cache.json")
        );
    }

    #[test]
    fn test_source_walk_filters_extensions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Sources/Model")).unwrap();
        fs::write(dir.path().join("Sources/Model/Foo.swift"), "class Foo {}\n").unwrap();
        fs::write(dir.path().join("Sources/Bar.swift"), "class Bar {}\n").unwrap();
        fs::write(dir.path().join("Sources/README.md"), "docs\n").unwrap();

        let manifest = Manifest {
            sources: vec![
                dir.path().join("Sources"),
                dir.path().join("Sources/Bar.swift"),
                dir.path().join("Missing"),
            ],
            ..Manifest::from_toml_str(MANIFEST).unwrap()
        };

        let files = manifest.source_files().unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("Sources/Bar.swift"),
                dir.path().join("Sources/Model/Foo.swift"),
            ]
        );
    }

    #[test]
    fn test_rendered_templates_use_file_stems() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("rendered")).unwrap();
        fs::write(dir.path().join("rendered/Equatable.swift"), "// eq\n").unwrap();
        fs::write(dir.path().join("rendered/AutoInit.swift"), "// init\n").unwrap();

        let manifest = Manifest {
            rendered: dir.path().join("rendered"),
            ..Manifest::from_toml_str(MANIFEST).unwrap()
        };

        let templates = manifest.rendered_templates().unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["AutoInit", "Equatable"]);
        assert_eq!(templates[1].text, "// eq\n");
    }
}
