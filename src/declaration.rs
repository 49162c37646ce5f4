//! Declaration index: the named, ranged declarations of one source file.
//!
//! Declarations are produced by an external scanner of the host language and
//! arrive as a nested [`DeclarationSpec`] tree. The index flattens that tree
//! into an arena addressed by [`DeclId`], with a qualified-name multimap for
//! anchor lookup. Parent and child links are plain ids, so there are no
//! ownership cycles.

use crate::errors::{MergeError, MergeResult};
use crate::text::line_end_inclusive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Index of a declaration inside a [`DeclarationIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    Type,
    /// An extension of a type declared elsewhere. Its `name` is the qualified
    /// name of the extended type.
    Extension,
    Member,
}

impl Default for DeclarationKind {
    fn default() -> Self {
        DeclarationKind::Type
    }
}

/// One declaration as delivered by the external scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSpec {
    pub name: String,
    #[serde(default)]
    pub kind: DeclarationKind,
    /// Interior of the body: from just after the opening delimiter to the
    /// closing delimiter.
    pub body: Range<usize>,
    #[serde(default)]
    pub children: Vec<DeclarationSpec>,
}

impl DeclarationSpec {
    pub fn new(name: impl Into<String>, kind: DeclarationKind, body: Range<usize>) -> Self {
        Self {
            name: name.into(),
            kind,
            body,
            children: Vec::new(),
        }
    }

    pub fn ty(name: impl Into<String>, body: Range<usize>) -> Self {
        Self::new(name, DeclarationKind::Type, body)
    }

    pub fn extension(name: impl Into<String>, body: Range<usize>) -> Self {
        Self::new(name, DeclarationKind::Extension, body)
    }

    pub fn with_children(mut self, children: Vec<DeclarationSpec>) -> Self {
        self.children = children;
        self
    }
}

/// A declaration in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: DeclId,
    /// Local name as written in source.
    pub name: String,
    /// Dot-joined path from the outermost enclosing declaration.
    pub qualified_name: String,
    pub kind: DeclarationKind,
    pub body: Range<usize>,
    /// From the closing delimiter to the end of its line, newline included.
    pub trailing: Range<usize>,
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
}

/// Arena of declarations for one source file.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    nodes: Vec<Declaration>,
    roots: Vec<DeclId>,
    by_name: HashMap<String, Vec<DeclId>>,
}

impl DeclarationIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index for `text` from the scanner's declaration tree.
    ///
    /// Every body range must lie within the text and on char boundaries.
    pub fn build(path: &Path, text: &str, specs: &[DeclarationSpec]) -> MergeResult<Self> {
        let mut index = Self::default();
        for spec in specs {
            let id = index.insert(path, text, spec, None)?;
            index.roots.push(id);
        }

        let nodes = &index.nodes;
        for ids in index.by_name.values_mut() {
            ids.sort_by_key(|id| nodes[id.0].body.start);
        }
        Ok(index)
    }

    fn insert(
        &mut self,
        path: &Path,
        text: &str,
        spec: &DeclarationSpec,
        parent: Option<DeclId>,
    ) -> MergeResult<DeclId> {
        let body = spec.body.clone();
        if body.start > body.end || body.end > text.len() {
            return Err(MergeError::InvalidDeclaration {
                path: path.to_path_buf(),
                message: format!(
                    "`{}` body {}..{} is outside the file ({} bytes)",
                    spec.name,
                    body.start,
                    body.end,
                    text.len()
                ),
            });
        }
        if !text.is_char_boundary(body.start) || !text.is_char_boundary(body.end) {
            return Err(MergeError::InvalidDeclaration {
                path: path.to_path_buf(),
                message: format!("`{}` body {}..{} splits a character", spec.name, body.start, body.end),
            });
        }

        let qualified_name = match (spec.kind, parent) {
            (DeclarationKind::Extension, _) | (_, None) => spec.name.clone(),
            (_, Some(parent)) => format!("{}.{}", self.nodes[parent.0].qualified_name, spec.name),
        };

        let id = DeclId(self.nodes.len());
        self.nodes.push(Declaration {
            id,
            name: spec.name.clone(),
            qualified_name: qualified_name.clone(),
            kind: spec.kind,
            trailing: body.end..line_end_inclusive(text, body.end),
            body,
            parent,
            children: Vec::new(),
        });
        self.by_name.entry(qualified_name).or_default().push(id);

        for child in &spec.children {
            let child_id = self.insert(path, text, child, Some(id))?;
            self.nodes[id.0].children.push(child_id);
        }
        Ok(id)
    }

    /// All declarations sharing a qualified name, in source order.
    pub fn lookup<'a>(&'a self, qualified_name: &str) -> impl Iterator<Item = &'a Declaration> + 'a {
        self.by_name
            .get(qualified_name)
            .into_iter()
            .flatten()
            .map(move |id| &self.nodes[id.0])
    }

    /// The first declaration with this qualified name in source order.
    pub fn first(&self, qualified_name: &str) -> Option<&Declaration> {
        self.lookup(qualified_name).next()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.by_name.contains_key(qualified_name)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Declaration> {
        self.roots.iter().map(move |id| &self.nodes[id.0])
    }
}

/// Declarations of one file in the on-disk declaration manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationFile {
    pub path: PathBuf,
    #[serde(default)]
    pub declarations: Vec<DeclarationSpec>,
}

/// The JSON document written by the declaration scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclarationManifest {
    #[serde(default)]
    pub files: Vec<DeclarationFile>,
}

impl DeclarationManifest {
    pub fn from_json_str(path: &Path, content: &str) -> MergeResult<Self> {
        serde_json::from_str(content).map_err(|e| MergeError::InvalidDeclaration {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> MergeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MergeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &content)
    }

    /// Declarations recorded for a file, if the scanner saw it.
    pub fn for_path(&self, path: &Path) -> Option<&[DeclarationSpec]> {
        self.files
            .iter()
            .find(|file| file.path == path)
            .map(|file| file.declarations.as_slice())
    }
}
