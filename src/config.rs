//! Merge configuration.

use crate::errors::{MergeError, MergeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with a block the user deleted after a previous run inserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletedBlockPolicy {
    /// Keep the block out of the file and remember the deletion.
    LeaveAbsent,
    /// Insert the block again at its anchor.
    Reinsert,
}

impl Default for DeletedBlockPolicy {
    fn default() -> Self {
        DeletedBlockPolicy::LeaveAbsent
    }
}

/// How block bodies are compared when deciding whether to rewrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhitespacePolicy {
    /// Byte-exact comparison.
    Exact,
    /// Trailing whitespace on each line and trailing blank lines are ignored.
    IgnoreTrailing,
}

impl Default for WhitespacePolicy {
    fn default() -> Self {
        WhitespacePolicy::IgnoreTrailing
    }
}

/// Configuration for a merge run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Comment token that introduces annotation markers (`//`, `#`, `--`).
    pub comment_leader: String,
    /// Spaces added to every line of an auto-inserted block.
    pub base_indentation: usize,
    /// Skip loading, consulting and saving the fragment cache.
    pub cache_disabled: bool,
    /// Where the fragment cache lives.
    pub cache_path: PathBuf,
    /// Delete (or never create) generated outputs with empty content.
    pub prune_empty_outputs: bool,
    pub deleted_blocks: DeletedBlockPolicy,
    pub whitespace: WhitespacePolicy,
    /// Extension used for generated output files.
    pub output_extension: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            comment_leader: "//".into(),
            base_indentation: 0,
            cache_disabled: false,
            cache_path: PathBuf::from(".sourcery-merge/cache.json"),
            prune_empty_outputs: false,
            deleted_blocks: DeletedBlockPolicy::default(),
            whitespace: WhitespacePolicy::default(),
            output_extension: "swift".into(),
        }
    }
}

impl MergeConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> MergeResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| MergeError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> MergeResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| MergeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_base_indentation(mut self, spaces: usize) -> Self {
        self.base_indentation = spaces;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_disabled = true;
        self
    }

    pub fn validate(&self) -> MergeResult<()> {
        let leader = self.comment_leader.trim();
        if leader.is_empty() || leader.contains(char::is_whitespace) {
            return Err(MergeError::Config {
                message: format!("comment_leader must be a single token, got {:?}", self.comment_leader),
            });
        }
        if self.output_extension.starts_with('.') {
            return Err(MergeError::Config {
                message: "output_extension must not start with '.'".into(),
            });
        }
        Ok(())
    }

    /// The base indentation as a string of spaces.
    pub fn base_indent(&self) -> String {
        " ".repeat(self.base_indentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.comment_leader, "//");
        assert_eq!(config.deleted_blocks, DeletedBlockPolicy::LeaveAbsent);
        assert_eq!(config.whitespace, WhitespacePolicy::IgnoreTrailing);
        assert!(!config.cache_disabled);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = MergeConfig::from_toml_str(
            r#"
base_indentation = 4
deleted_blocks = "reinsert"
whitespace = "exact"
"#,
        )
        .unwrap();
        assert_eq!(config.base_indentation, 4);
        assert_eq!(config.base_indent(), "    ");
        assert_eq!(config.deleted_blocks, DeletedBlockPolicy::Reinsert);
        assert_eq!(config.whitespace, WhitespacePolicy::Exact);
        assert_eq!(config.comment_leader, "//");
    }

    #[test]
    fn test_rejects_unknown_field() {
        let result = MergeConfig::from_toml_str("base_indent = 2");
        assert!(matches!(result, Err(MergeError::Config { .. })));
    }

    #[test]
    fn test_rejects_spaced_leader() {
        let result = MergeConfig::from_toml_str(r#"comment_leader = "/ /""#);
        assert!(matches!(result, Err(MergeError::Config { .. })));
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let config = MergeConfig::load(Path::new("/nonexistent/merge.toml")).unwrap();
        assert_eq!(config, MergeConfig::default());
    }
}
