//! Fragment cache: which blocks each source file held after the last run.
//!
//! The cache is an explicit store. It is opened at the start of a run,
//! consulted while merging and saved once at the end. A missing or corrupt
//! cache file only costs the deletion history; it never fails a run.

use crate::config::MergeConfig;
use crate::errors::{MergeError, MergeResult};
use crate::write::write_atomic;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const CACHE_VERSION: u32 = 1;

/// Cached state of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Keys of the blocks present after the last run.
    #[serde(default)]
    pub inserted: BTreeSet<String>,
    /// Keys the user deleted that stay out of the file.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub retired: BTreeSet<String>,
}

impl CacheEntry {
    pub fn new(inserted: BTreeSet<String>, retired: BTreeSet<String>) -> Self {
        Self { inserted, retired }
    }

    /// Whether a previous run put this key into the file.
    pub fn remembers(&self, key: &str) -> bool {
        self.inserted.contains(key) || self.retired.contains(key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    sources: BTreeSet<PathBuf>,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

/// Persistent map of source path to [`CacheEntry`].
#[derive(Debug, Clone)]
pub struct FragmentCache {
    /// `None` when the cache is disabled.
    path: Option<PathBuf>,
    data: CacheFile,
    dirty: bool,
}

impl FragmentCache {
    /// A cache that never loads, answers or saves anything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            data: CacheFile::default(),
            dirty: false,
        }
    }

    /// An empty cache that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            data: CacheFile {
                version: CACHE_VERSION,
                ..CacheFile::default()
            },
            dirty: true,
        }
    }

    /// Open the cache for a run over `sources`.
    ///
    /// The stored entries are dropped when the set of source paths differs
    /// from the one they were recorded for.
    pub fn open<'a>(config: &MergeConfig, sources: impl IntoIterator<Item = &'a Path>) -> Self {
        if config.cache_disabled {
            return Self::disabled();
        }

        let path = config.cache_path.clone();
        let sources: BTreeSet<PathBuf> = sources.into_iter().map(Path::to_path_buf).collect();
        let mut cache = match Self::load(&path) {
            Ok(Some(cache)) => cache,
            Ok(None) => Self::empty(&path),
            Err(err) => {
                warn!("{}; starting with an empty cache", err);
                Self::empty(&path)
            }
        };

        if cache.data.sources != sources {
            if !cache.data.entries.is_empty() {
                debug!("source set changed; clearing fragment cache");
            }
            cache.data.entries.clear();
            cache.data.sources = sources;
            cache.dirty = true;
        }
        cache
    }

    fn load(path: &Path) -> MergeResult<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(MergeError::Cache {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })
            }
        };

        let data: CacheFile = serde_json::from_str(&content).map_err(|e| MergeError::Cache {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if data.version != CACHE_VERSION {
            return Err(MergeError::Cache {
                path: path.to_path_buf(),
                message: format!("unsupported version {}", data.version),
            });
        }

        Ok(Some(Self {
            path: Some(path.to_path_buf()),
            data,
            dirty: false,
        }))
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn entry(&self, source: &Path) -> Option<&CacheEntry> {
        if !self.is_enabled() {
            return None;
        }
        self.data.entries.get(source)
    }

    /// Record the state of a source file after a successful merge.
    pub fn record(&mut self, source: &Path, entry: CacheEntry) {
        if !self.is_enabled() {
            return;
        }
        if self.data.entries.get(source) != Some(&entry) {
            self.data.entries.insert(source.to_path_buf(), entry);
            self.dirty = true;
        }
    }

    /// Flush to disk if anything changed since it was opened.
    pub fn save(&mut self) -> MergeResult<()> {
        let path = match &self.path {
            Some(path) if self.dirty => path,
            _ => return Ok(()),
        };

        let json = serde_json::to_string_pretty(&self.data).map_err(|e| MergeError::Cache {
            path: path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(path, &json)?;
        debug!("saved fragment cache to {}", path.display());
        self.dirty = false;
        Ok(())
    }
}
