//! Project context orchestration
//!
//! A [`Project`] is an explicit context object owning everything that belongs
//! to one open project: the map catalog, the open map instances, the resource
//! catalog, the search path, and the actor library manager. Several projects
//! can coexist in one process; nothing here is global. Until `set_context`
//! succeeds the context is invalid and every other operation fails with
//! [`ProjectError::ContextInvalid`].

mod maps;
mod resources;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use maproom_core::Map;

use crate::error::ProjectError;
use crate::file_system::{FileSystem, FileType};
use crate::libraries::LibraryManager;
use crate::map_io::MapParser;
use crate::resources::ResourceTree;
use crate::search_path::SearchPath;

/// Directory under the context root holding map documents
pub const MAPS_DIRECTORY: &str = "maps";
/// Directory under [`MAPS_DIRECTORY`] holding map backups
pub const BACKUP_SUBDIRECTORY: &str = "backups";
/// Suffix of the temporary file written during a primary save
pub const SAVING_SUFFIX: &str = ".saving";
/// Suffix of a finished map backup
pub const BACKUP_SUFFIX: &str = ".backup";
/// Suffix of the temporary file written during a backup save; one left
/// behind by a crash is garbage, not a backup
pub const BACKUP_SAVING_SUFFIX: &str = ".backupsaving";

/// An open project: a validated context directory plus all per-project state
pub struct Project {
    context_path: Option<PathBuf>,
    read_only: bool,
    /// Map name -> relative file name under `maps/`
    map_catalog: BTreeMap<String, String>,
    /// Saved name -> open map instance
    open_maps: HashMap<String, Map>,
    resources: ResourceTree,
    resources_indexed: bool,
    search_path: SearchPath,
    libraries: LibraryManager,
    file_system: FileSystem,
    parser: Option<MapParser>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// Create a project with no context set
    pub fn new() -> Self {
        Self {
            context_path: None,
            read_only: false,
            map_catalog: BTreeMap::new(),
            open_maps: HashMap::new(),
            resources: ResourceTree::new(),
            resources_indexed: false,
            search_path: SearchPath::new(),
            libraries: LibraryManager::new(),
            file_system: FileSystem::new(),
            parser: None,
        }
    }

    /// Prepare a directory to become a project context
    ///
    /// Creates the directory (recursively) if absent and ensures the `maps`
    /// subdirectory exists. Idempotent: an already-initialized context passes
    /// untouched. Does not set any context on any project.
    pub fn create_context(path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        let file_system = FileSystem::new();
        match file_system.file_info(path).file_type {
            FileType::NotFound => file_system.make_directories(path)?,
            FileType::RegularFile => {
                return Err(ProjectError::WrongType(format!(
                    "cannot create a project context at {}: it is a file",
                    path.display()
                )));
            }
            FileType::Directory => {}
        }

        let _guard = file_system.scoped(path)?;
        match file_system.file_info(Path::new(MAPS_DIRECTORY)).file_type {
            FileType::NotFound => file_system.make_directory(Path::new(MAPS_DIRECTORY))?,
            FileType::RegularFile => {
                return Err(ProjectError::WrongType(format!(
                    "\"{}\" in {} is a file, expected a directory",
                    MAPS_DIRECTORY,
                    path.display()
                )));
            }
            FileType::Directory => {}
        }
        Ok(())
    }

    /// Open a context directory, replacing any currently open context
    ///
    /// Switching discards all prior in-memory state unconditionally, unsaved
    /// changes included; asking the user is a UI concern. On any validation
    /// failure the project is left with no context set.
    pub fn set_context(
        &mut self,
        path: impl AsRef<Path>,
        read_only: bool,
    ) -> Result<(), ProjectError> {
        let path = path.as_ref();
        if self.context_path.is_some() {
            self.clear_context();
        }

        let info = self.file_system.file_info(path);
        if !info.exists() {
            return Err(ProjectError::ContextInvalid(format!(
                "context {} does not exist",
                path.display()
            )));
        }
        if !info.is_directory() {
            return Err(ProjectError::ContextInvalid(format!(
                "context {} is not a directory",
                path.display()
            )));
        }
        let canonical = std::fs::canonicalize(path).map_err(|e| {
            ProjectError::IoFailure(format!("resolving context path {}: {e}", path.display()))
        })?;

        {
            let _guard = self.file_system.scoped(&canonical)?;
            let entries = self.file_system.dir_files(Path::new("."), &[])?;
            if entries.is_empty() {
                return Err(ProjectError::ContextInvalid(format!(
                    "context {} is empty",
                    canonical.display()
                )));
            }
            if !self
                .file_system
                .file_info(Path::new(MAPS_DIRECTORY))
                .is_directory()
            {
                return Err(ProjectError::ContextInvalid(format!(
                    "context {} has no \"{}\" directory",
                    canonical.display(),
                    MAPS_DIRECTORY
                )));
            }
        }

        self.search_path.add(canonical.clone());
        self.context_path = Some(canonical);
        self.read_only = read_only;
        if self.parser.is_none() {
            self.parser = Some(MapParser::new());
        }
        if let Err(e) = self.scan_map_catalog() {
            self.clear_context();
            return Err(e);
        }
        info!(
            "project context set to {} ({})",
            self.context_path.as_deref().unwrap_or(Path::new("")).display(),
            if read_only { "read-only" } else { "read-write" }
        );
        Ok(())
    }

    /// Re-read the map catalog and drop the resource index
    ///
    /// Open maps are not reloaded; they keep their in-memory state.
    pub fn refresh(&mut self) -> Result<(), ProjectError> {
        self.require_valid()?;
        self.map_catalog.clear();
        self.resources.clear();
        self.resources_indexed = false;
        self.scan_map_catalog()
    }

    /// Whether a context is currently set
    pub fn is_valid(&self) -> bool {
        self.context_path.is_some()
    }

    /// Whether the context was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the context is a packed archive rather than a directory
    ///
    /// Always false: archives are a stated boundary of this layer, not a
    /// supported context form.
    pub fn is_archive(&self) -> bool {
        false
    }

    /// Canonical absolute path of the context root, when valid
    pub fn context_path(&self) -> Option<&Path> {
        self.context_path.as_deref()
    }

    /// Display name of the context (the root directory's file stem)
    pub fn context_name(&self) -> Option<String> {
        self.context_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
    }

    /// The ordered data search path; the context root is appended on
    /// `set_context` and removed when the context is replaced
    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Mutable access to the search path for callers adding data directories
    pub fn search_path_mut(&mut self) -> &mut SearchPath {
        &mut self.search_path
    }

    /// The actor library manager
    pub fn libraries(&self) -> &LibraryManager {
        &self.libraries
    }

    /// Mutable access to the library manager: registering actor libraries
    /// and external actor holds happens through this
    pub fn libraries_mut(&mut self) -> &mut LibraryManager {
        &mut self.libraries
    }

    fn clear_context(&mut self) {
        self.open_maps.clear();
        self.map_catalog.clear();
        self.resources.clear();
        self.resources_indexed = false;
        if let Some(old) = self.context_path.take() {
            if !self.search_path.remove(&old) {
                warn!(
                    "previous context {} was not on the search path",
                    old.display()
                );
            }
        }
    }

    fn require_valid(&self) -> Result<PathBuf, ProjectError> {
        self.context_path
            .clone()
            .ok_or_else(|| ProjectError::ContextInvalid("no project context is set".to_string()))
    }

    fn require_writable(&self) -> Result<PathBuf, ProjectError> {
        let root = self.require_valid()?;
        if self.read_only {
            return Err(ProjectError::ReadOnly(format!(
                "context {} is open read-only",
                root.display()
            )));
        }
        Ok(root)
    }
}
