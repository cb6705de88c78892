//! The map entity and its on-disk document form
//!
//! A `Map` is a named scene-description document: header metadata, an ordered
//! list of plugin-library dependencies, and a set of actor proxies. The same
//! struct is the serde schema for the document file; runtime-only bookkeeping
//! (saved name, file name, dirty flag, missing-dependency diagnostics) is
//! skipped during serialization and rebuilt by the loader.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{ActorProxy, ActorType};

/// Canonical file extension for map documents (without the dot)
pub const MAP_EXTENSION: &str = "map";

/// Legacy extension still accepted when scanning a maps directory
pub const LEGACY_MAP_EXTENSION: &str = "xml";

/// Current map document format version
pub const MAP_FORMAT_VERSION: u32 = 2;

fn default_format_version() -> u32 {
    1
}

/// A plugin library the map depends on, with the version it was authored against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Library name as registered with the library manager
    pub name: String,
    /// Version string recorded at authoring time
    pub version: String,
}

impl LibraryEntry {
    /// Create a library entry
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Header metadata of a map document, readable without building the entity graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapHeader {
    /// Logical map name declared inside the document
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Author name
    #[serde(default)]
    pub author: String,
    /// Free-text comment
    #[serde(default)]
    pub comment: String,
    /// Copyright notice
    #[serde(default)]
    pub copyright: String,
    /// Creation timestamp (RFC 3339), stamped when the map is first created
    #[serde(default)]
    pub created: String,
}

/// A named scene-description document and its in-memory bookkeeping
///
/// The logical `name` is mutable at any time; `saved_name` is the name the map
/// is currently registered and persisted under. They diverge while a
/// rename-via-save is in flight and converge again after a successful save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    /// Document identity, stable across save/load
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    /// Document format version; older versions are upgraded on the next save
    #[serde(default = "default_format_version")]
    format_version: u32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    copyright: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    libraries: Vec<LibraryEntry>,
    #[serde(default)]
    proxies: Vec<ActorProxy>,
    /// Proxy acting as the environment container, if any
    #[serde(default)]
    environment_actor: Option<Uuid>,

    // Runtime bookkeeping, never persisted.
    #[serde(skip)]
    saved_name: String,
    #[serde(skip)]
    file_name: String,
    #[serde(skip)]
    modified: bool,
    #[serde(skip)]
    missing_libraries: Vec<String>,
    #[serde(skip)]
    missing_actor_types: Vec<ActorType>,
}

impl Map {
    /// Create a new, empty, not-yet-persisted map
    ///
    /// New maps start modified: they do not exist on disk until saved.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            format_version: MAP_FORMAT_VERSION,
            saved_name: name.clone(),
            name,
            description: String::new(),
            author: String::new(),
            comment: String::new(),
            copyright: String::new(),
            created: String::new(),
            libraries: Vec::new(),
            proxies: Vec::new(),
            environment_actor: None,
            file_name: String::new(),
            modified: true,
            missing_libraries: Vec::new(),
            missing_actor_types: Vec::new(),
        }
    }

    /// Document identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Document format version currently held in memory
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Set the in-memory format version (used by the loader when upgrading)
    pub fn set_format_version(&mut self, version: u32) {
        self.format_version = version;
    }

    /// Logical (display) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the map; takes effect on disk at the next save
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified = true;
    }

    /// Name the map is currently registered and persisted under
    pub fn saved_name(&self) -> &str {
        &self.saved_name
    }

    /// Record the registered name (loader/saver bookkeeping, not a rename)
    pub fn set_saved_name(&mut self, name: impl Into<String>) {
        self.saved_name = name.into();
    }

    /// Relative on-disk file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Record the on-disk file name (loader/saver bookkeeping)
    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    /// Free-text description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Set the description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.modified = true;
    }

    /// Author name
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Set the author
    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
        self.modified = true;
    }

    /// Free-text comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the comment
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.modified = true;
    }

    /// Copyright notice
    pub fn copyright(&self) -> &str {
        &self.copyright
    }

    /// Set the copyright notice
    pub fn set_copyright(&mut self, copyright: impl Into<String>) {
        self.copyright = copyright.into();
        self.modified = true;
    }

    /// Creation timestamp (RFC 3339), empty until stamped
    pub fn created(&self) -> &str {
        &self.created
    }

    /// Stamp the creation timestamp
    pub fn set_created(&mut self, created: impl Into<String>) {
        self.created = created.into();
        self.modified = true;
    }

    /// Header metadata snapshot
    pub fn header(&self) -> MapHeader {
        MapHeader {
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            comment: self.comment.clone(),
            copyright: self.copyright.clone(),
            created: self.created.clone(),
        }
    }

    /// Whether the map has unsaved changes
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Set or clear the dirty flag
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// All proxies in the map
    pub fn proxies(&self) -> &[ActorProxy] {
        &self.proxies
    }

    /// Add a proxy; a proxy with the same ID is replaced
    pub fn add_proxy(&mut self, proxy: ActorProxy) {
        match self.proxies.iter().position(|p| p.id == proxy.id) {
            Some(idx) => self.proxies[idx] = proxy,
            None => self.proxies.push(proxy),
        }
        self.modified = true;
    }

    /// Remove a proxy by ID
    pub fn remove_proxy(&mut self, id: Uuid) -> Option<ActorProxy> {
        let idx = self.proxies.iter().position(|p| p.id == id)?;
        self.modified = true;
        if self.environment_actor == Some(id) {
            self.environment_actor = None;
        }
        Some(self.proxies.remove(idx))
    }

    /// Look up a proxy by ID
    pub fn proxy(&self, id: Uuid) -> Option<&ActorProxy> {
        self.proxies.iter().find(|p| p.id == id)
    }

    /// Look up a proxy by ID for mutation; marks the map modified
    pub fn proxy_mut(&mut self, id: Uuid) -> Option<&mut ActorProxy> {
        let proxy = self.proxies.iter_mut().find(|p| p.id == id)?;
        self.modified = true;
        Some(proxy)
    }

    /// ID of the environment container actor, if one is set
    pub fn environment_actor(&self) -> Option<Uuid> {
        self.environment_actor
    }

    /// Set or clear the environment container actor
    pub fn set_environment_actor(&mut self, id: Option<Uuid>) {
        self.environment_actor = id;
        self.modified = true;
    }

    /// Ordered library dependency list
    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.libraries
    }

    /// Record a library dependency; an existing entry has its version updated
    pub fn add_library(&mut self, name: impl Into<String>, version: impl Into<String>) {
        let name = name.into();
        let version = version.into();
        match self.libraries.iter_mut().find(|l| l.name == name) {
            Some(entry) => entry.version = version,
            None => self.libraries.push(LibraryEntry::new(name, version)),
        }
        self.modified = true;
    }

    /// Drop a library dependency; returns false if it was not listed
    pub fn remove_library(&mut self, name: &str) -> bool {
        let Some(idx) = self.libraries.iter().position(|l| l.name == name) else {
            return false;
        };
        self.libraries.remove(idx);
        self.modified = true;
        true
    }

    /// Whether the map lists a library dependency
    pub fn has_library(&self, name: &str) -> bool {
        self.libraries.iter().any(|l| l.name == name)
    }

    /// Version the map was authored against for a listed library
    pub fn library_version(&self, name: &str) -> Option<&str> {
        self.libraries
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.version.as_str())
    }

    /// Libraries referenced by the document but unavailable at load time
    pub fn missing_libraries(&self) -> &[String] {
        &self.missing_libraries
    }

    /// Record an unavailable library (load diagnostics, not a content change)
    pub fn add_missing_library(&mut self, name: impl Into<String>) {
        self.missing_libraries.push(name.into());
    }

    /// Actor types referenced by the document but unresolvable at load time
    pub fn missing_actor_types(&self) -> &[ActorType] {
        &self.missing_actor_types
    }

    /// Record an unresolvable actor type (load diagnostics, not a content change)
    pub fn add_missing_actor_type(&mut self, actor_type: ActorType) {
        self.missing_actor_types.push(actor_type);
    }

    /// Check structural consistency of the map data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("map name is empty".to_string());
        }
        for (i, proxy) in self.proxies.iter().enumerate() {
            if self.proxies[..i].iter().any(|p| p.id == proxy.id) {
                return Err(format!("duplicate proxy id {}", proxy.id));
            }
        }
        if let Some(env) = self.environment_actor {
            if self.proxy(env).is_none() {
                return Err(format!("environment actor {env} is not in the map"));
            }
        }
        Ok(())
    }
}

/// Append the canonical map extension unless the name already carries one
///
/// Legacy ".xml" names are kept as-is so re-saving a legacy map does not
/// silently change its file name.
pub fn normalized_file_name(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.ends_with(&format!(".{MAP_EXTENSION}"))
        || lower.ends_with(&format!(".{LEGACY_MAP_EXTENSION}"))
    {
        raw.to_string()
    } else {
        format!("{raw}.{MAP_EXTENSION}")
    }
}

/// Strip the map extension (canonical or legacy) from a file name, if present
pub fn file_name_stem(file_name: &str) -> &str {
    let lower = file_name.to_lowercase();
    for ext in [MAP_EXTENSION, LEGACY_MAP_EXTENSION] {
        let suffix = format!(".{ext}");
        if lower.ends_with(&suffix) {
            return &file_name[..file_name.len() - suffix.len()];
        }
    }
    file_name
}
