//! Material descriptor documents
//!
//! A descriptor is a small tree of tagged nodes with ordered string
//! attributes. The material system only depends on [`DocumentSource`];
//! [`RonDocumentStore`] keeps descriptors as RON files on disk and
//! [`MemoryDocumentStore`] keeps them in memory for editors and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::{AssetSource, AssetStatus};

/// Document store errors
#[derive(Error, Debug)]
pub enum DocumentError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed document
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Document path
        path: String,
        /// Parser message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// One node of a descriptor tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Node tag
    pub tag: String,
    /// Attributes in document order
    #[serde(default)]
    attributes: Vec<(String, String)>,
    /// Child nodes in document order
    #[serde(default)]
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Create an empty node
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr)
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`add_child`](Self::add_child)
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the tag matches (case-insensitive)
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the attribute is present
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attribute parsed into `T`; unparsable values are logged and ignored
    pub fn attr_as<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.attr(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring malformed attribute {}=\"{}\" on <{}>", name, raw, self.tag);
                None
            }
        }
    }

    /// Boolean attribute; accepts `1`/`0` and `true`/`false`
    pub fn attr_bool(&self, name: &str) -> Option<bool> {
        match self.attr(name)?.trim() {
            "1" => Some(true),
            "0" | "" => Some(false),
            other if other.eq_ignore_ascii_case("true") => Some(true),
            other if other.eq_ignore_ascii_case("false") => Some(false),
            other => {
                log::warn!("Ignoring malformed boolean {}=\"{}\" on <{}>", name, other, self.tag);
                None
            }
        }
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Child nodes in document order
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Child by index
    pub fn child(&self, index: usize) -> Option<&Self> {
        self.children.get(index)
    }

    /// First child with the given tag
    pub fn find_child(&self, tag: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.is_tag(tag))
    }

    /// Append a child node
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Append an empty child and return it for filling in
    pub fn new_child(&mut self, tag: &str) -> &mut Self {
        self.children.push(Self::new(tag));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Parse a RON encoded document
    pub fn from_ron(source: &str) -> Result<Self, DocumentError> {
        ron::from_str(source).map_err(|e| DocumentError::Parse {
            path: "<memory>".to_string(),
            message: e.to_string(),
        })
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DocumentError::Serialize(e.to_string()))
    }
}

/// Structured document parser
pub trait DocumentSource: Send + Sync {
    /// Parse the document at `path`; `None` when absent or malformed
    fn parse(&self, path: &str) -> Option<DocumentNode>;
}

/// Descriptor files stored as RON below a root directory
pub struct RonDocumentStore {
    root: PathBuf,
}

impl RonDocumentStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path below the root; components that do not exist with the exact
    /// spelling are matched case-insensitively against the directory listing
    fn full_path(&self, path: &str) -> PathBuf {
        let exact = self.root.join(path.trim_start_matches('/'));
        if exact.exists() {
            return exact;
        }

        let mut resolved = self.root.clone();
        let mut components = path.split('/').filter(|c| !c.is_empty());
        while let Some(component) = components.next() {
            let candidate = resolved.join(component);
            if candidate.exists() {
                resolved = candidate;
                continue;
            }
            match Self::find_entry(&resolved, component) {
                Some(entry) => resolved = entry,
                None => {
                    resolved.push(component);
                    resolved.extend(components.by_ref());
                    break;
                }
            }
        }
        resolved
    }

    fn find_entry(dir: &Path, component: &str) -> Option<PathBuf> {
        std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(component))
            .map(|entry| entry.path())
    }

    /// Read and decode a document
    pub fn read(&self, path: &str) -> Result<DocumentNode, DocumentError> {
        let contents = std::fs::read_to_string(self.full_path(path))?;
        ron::from_str(&contents).map_err(|e| DocumentError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Encode and write a document, creating parent folders
    pub fn write(&self, path: &str, node: &DocumentNode) -> Result<(), DocumentError> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full_path, node.to_ron()?)?;
        Ok(())
    }
}

impl DocumentSource for RonDocumentStore {
    fn parse(&self, path: &str) -> Option<DocumentNode> {
        match self.read(path) {
            Ok(node) => Some(node),
            Err(e) => {
                log::warn!("Failed to load material document {}: {}", path, e);
                None
            }
        }
    }
}

impl AssetSource for RonDocumentStore {
    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }

    fn asset_status(&self, path: &str) -> AssetStatus {
        if self.exists(path) {
            AssetStatus::Compiled
        } else {
            AssetStatus::Missing
        }
    }

    fn enumerate(&self, folder: &str, extension: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut pending = vec![folder.trim_end_matches('/').to_string()];

        while let Some(relative) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(self.full_path(&relative)) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = if relative.is_empty() {
                    name.clone()
                } else {
                    format!("{relative}/{name}")
                };
                let path = entry.path();
                if path.is_dir() {
                    pending.push(child);
                } else if path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                {
                    found.push(child);
                }
            }
        }

        found.sort();
        found
    }
}

/// In-memory descriptors with controllable asset status
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, DocumentNode>>,
    statuses: RwLock<HashMap<String, AssetStatus>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str) -> String {
        path.replace('\\', "/").trim_start_matches('/').to_lowercase()
    }

    /// Add or replace a document
    pub fn insert(&self, path: &str, node: DocumentNode) {
        self.documents.write().insert(Self::key(path), node);
    }

    /// Remove a document
    pub fn remove(&self, path: &str) -> Option<DocumentNode> {
        self.documents.write().remove(&Self::key(path))
    }

    /// Override the status reported for a path that has no document
    pub fn set_status(&self, path: &str, status: AssetStatus) {
        self.statuses.write().insert(Self::key(path), status);
    }
}

impl DocumentSource for MemoryDocumentStore {
    fn parse(&self, path: &str) -> Option<DocumentNode> {
        self.documents.read().get(&Self::key(path)).cloned()
    }
}

impl AssetSource for MemoryDocumentStore {
    fn exists(&self, path: &str) -> bool {
        self.documents.read().contains_key(&Self::key(path))
    }

    fn asset_status(&self, path: &str) -> AssetStatus {
        let key = Self::key(path);
        if let Some(status) = self.statuses.read().get(&key) {
            return *status;
        }
        if self.documents.read().contains_key(&key) {
            AssetStatus::Compiled
        } else {
            AssetStatus::Missing
        }
    }

    fn enumerate(&self, folder: &str, extension: &str) -> Vec<String> {
        let prefix = format!("{}/", Self::key(folder).trim_end_matches('/'));
        let suffix = format!(".{}", extension.to_lowercase());
        let mut found: Vec<String> = self
            .documents
            .read()
            .keys()
            .filter(|k| k.starts_with(&prefix) && k.ends_with(&suffix))
            .cloned()
            .collect();
        found.sort();
        found
    }
}
