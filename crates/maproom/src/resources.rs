//! Resource catalog tree
//!
//! The catalog mirrors the on-disk resource directories: one top-level
//! category node per resource [`DataType`] (present even when the directory
//! is missing), nested category nodes for subdirectories, and leaf
//! descriptors for files whose extension the type handles. Scanning is
//! tolerant: an unreadable entry is logged and skipped, never fatal to the
//! rest of the scan.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use maproom_core::{DataType, ResourceDescriptor, DESCRIPTOR_SEPARATOR};

/// One node of the resource catalog: a resource-type root or a directory
/// segment, holding child categories and leaf resources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryNode {
    name: String,
    categories: BTreeMap<String, CategoryNode>,
    resources: BTreeMap<String, ResourceDescriptor>,
}

impl CategoryNode {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Segment name (the resource-type directory name for a top-level node)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child categories, sorted by name
    pub fn categories(&self) -> &BTreeMap<String, CategoryNode> {
        &self.categories
    }

    /// A direct child category, if present
    pub fn category(&self, name: &str) -> Option<&CategoryNode> {
        self.categories.get(name)
    }

    /// Leaf resources of this node, keyed and sorted by file name
    pub fn resources(&self) -> &BTreeMap<String, ResourceDescriptor> {
        &self.resources
    }

    /// A direct leaf resource looked up by file name, if present
    pub fn resource(&self, file_name: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(file_name)
    }

    /// Whether this node has neither child categories nor resources
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.resources.is_empty()
    }

    /// Total number of resources in this node and all descendants
    pub fn resource_count(&self) -> usize {
        self.resources.len()
            + self
                .categories
                .values()
                .map(CategoryNode::resource_count)
                .sum::<usize>()
    }

    fn find_path(&self, segments: &[&str]) -> Option<&CategoryNode> {
        match segments.split_first() {
            None => Some(self),
            Some((head, rest)) => self.categories.get(*head)?.find_path(rest),
        }
    }

    fn find_path_mut(&mut self, segments: &[&str]) -> Option<&mut CategoryNode> {
        match segments.split_first() {
            None => Some(self),
            Some((head, rest)) => self.categories.get_mut(*head)?.find_path_mut(rest),
        }
    }

    fn ensure_path(&mut self, segments: &[&str]) -> &mut CategoryNode {
        match segments.split_first() {
            None => self,
            Some((head, rest)) => self
                .categories
                .entry((*head).to_string())
                .or_insert_with(|| CategoryNode::named(*head))
                .ensure_path(rest),
        }
    }
}

/// The full resource catalog, one subtree per resource data type
#[derive(Debug, Clone, Default)]
pub struct ResourceTree {
    roots: BTreeMap<DataType, CategoryNode>,
}

impl ResourceTree {
    /// Create an empty, unindexed tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all indexed content
    pub fn clear(&mut self) {
        self.roots.clear();
    }

    /// Rebuild the whole tree from the resource directories under
    /// `context_root`, inserting a top-level node for every resource type
    /// whether or not its directory exists
    pub fn index(&mut self, context_root: &Path) {
        self.roots.clear();
        for &data_type in DataType::resource_types() {
            self.roots.insert(data_type, scan_type(context_root, data_type));
        }
    }

    /// Top-level node for a resource type
    pub fn root(&self, data_type: DataType) -> Option<&CategoryNode> {
        self.roots.get(&data_type)
    }

    /// Node at a `:`-separated category path under a type root; an empty
    /// category names the root itself
    pub fn find_category(&self, data_type: DataType, category: &str) -> Option<&CategoryNode> {
        self.roots
            .get(&data_type)?
            .find_path(&split_category(category))
    }

    /// Remove a category node; `false` when the path names nothing (the type
    /// root itself cannot be removed)
    pub fn remove_category(&mut self, data_type: DataType, category: &str) -> bool {
        let segments = split_category(category);
        let Some((leaf, parents)) = segments.split_last() else {
            return false;
        };
        let Some(root) = self.roots.get_mut(&data_type) else {
            return false;
        };
        let Some(parent) = root.find_path_mut(parents) else {
            return false;
        };
        parent.categories.remove(*leaf).is_some()
    }

    /// Re-scan one category subtree from disk after a filesystem change,
    /// keeping the rest of the tree untouched. A vanished directory removes
    /// the node; an empty category path re-scans the whole type root.
    pub fn rescan_category(&mut self, context_root: &Path, data_type: DataType, category: &str) {
        let Some(dir_name) = data_type.directory_name() else {
            return;
        };
        let segments = split_category(category);
        let Some((leaf, parents)) = segments.split_last() else {
            self.roots.insert(data_type, scan_type(context_root, data_type));
            return;
        };

        let mut dir = context_root.join(dir_name);
        for segment in &segments {
            dir.push(segment);
        }
        if dir.is_dir() {
            let mut prefix = dir_name.to_string();
            for segment in &segments {
                prefix.push(DESCRIPTOR_SEPARATOR);
                prefix.push_str(segment);
            }
            let node = scan_dir(&dir, data_type, &prefix, leaf);
            let root = self
                .roots
                .entry(data_type)
                .or_insert_with(|| CategoryNode::named(dir_name));
            root.ensure_path(parents)
                .categories
                .insert((*leaf).to_string(), node);
        } else {
            self.remove_category(data_type, category);
        }
    }
}

fn split_category(category: &str) -> Vec<&str> {
    category
        .split(DESCRIPTOR_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect()
}

fn scan_type(context_root: &Path, data_type: DataType) -> CategoryNode {
    let Some(dir_name) = data_type.directory_name() else {
        return CategoryNode::default();
    };
    let dir = context_root.join(dir_name);
    if !dir.is_dir() {
        return CategoryNode::named(dir_name);
    }
    scan_dir(&dir, data_type, dir_name, dir_name)
}

fn scan_dir(dir: &Path, data_type: DataType, identifier_prefix: &str, name: &str) -> CategoryNode {
    let mut node = CategoryNode::named(name);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot scan resource directory {}: {e}", dir.display());
            return node;
        }
    };
    for entry in entries {
        if let Err(e) = scan_entry(&mut node, entry, data_type, identifier_prefix) {
            warn!(
                "skipping unreadable entry under {}: {e}",
                dir.display()
            );
        }
    }
    node
}

fn scan_entry(
    node: &mut CategoryNode,
    entry: io::Result<fs::DirEntry>,
    data_type: DataType,
    identifier_prefix: &str,
) -> io::Result<()> {
    let entry = entry?;
    let file_type = entry.file_type()?;
    let name_os = entry.file_name();
    let Some(name) = name_os.to_str() else {
        warn!("skipping non-UTF-8 entry under {}", identifier_prefix);
        return Ok(());
    };

    if file_type.is_dir() {
        let child_prefix = format!("{}{}{}", identifier_prefix, DESCRIPTOR_SEPARATOR, name);
        let child = scan_dir(&entry.path(), data_type, &child_prefix, name);
        node.categories.insert(name.to_string(), child);
    } else if file_type.is_file() {
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) if data_type.handles_extension(ext) => {
                let display = Path::new(name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name)
                    .to_string();
                let identifier =
                    format!("{}{}{}", identifier_prefix, DESCRIPTOR_SEPARATOR, name);
                // Keyed by the full file name so same-stem files with
                // different handled extensions stay distinct entries.
                node.resources
                    .insert(name.to_string(), ResourceDescriptor::new(display, identifier));
            }
            _ => debug!(
                "ignoring {} (extension not handled for {})",
                entry.path().display(),
                data_type
            ),
        }
    }
    Ok(())
}
