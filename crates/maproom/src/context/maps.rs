//! Map catalog and lifecycle operations
//!
//! The catalog maps each declared map name to its relative file name under
//! `maps/`. It is populated by scanning the directory and probing each
//! document for its declared name; names are what callers use everywhere,
//! file names are an on-disk detail. Saves are two-phase (write a `.saving`
//! sibling, then rename over the destination) so an interrupted save never
//! corrupts the last good copy.

use std::path::Path;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use maproom_core::{
    file_name_stem, normalized_file_name, ActorProxy, Map, MapHeader, LEGACY_MAP_EXTENSION,
    MAP_EXTENSION,
};

use crate::error::ProjectError;
use crate::map_io::{MapParser, MapWriter};
use crate::scene::{self, SceneSink};

use super::{
    Project, BACKUP_SAVING_SUFFIX, BACKUP_SUBDIRECTORY, BACKUP_SUFFIX, MAPS_DIRECTORY,
    SAVING_SUFFIX,
};

impl Project {
    /// All map names known to the project, sorted
    ///
    /// Scans the `maps` directory when the catalog is empty; files whose
    /// name probe fails are logged and skipped, never fatal to the scan.
    pub fn map_names(&mut self) -> Result<Vec<String>, ProjectError> {
        self.require_valid()?;
        self.ensure_catalog()?;
        Ok(self.map_catalog.keys().cloned().collect())
    }

    /// Whether a map is currently open in memory
    pub fn is_map_open(&self, name: &str) -> bool {
        self.open_maps.contains_key(name)
    }

    /// Names of all currently open maps, sorted
    pub fn open_map_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.open_maps.keys().cloned().collect();
        names.sort();
        names
    }

    /// The open instance of a map, without loading anything
    pub fn get_open_map(&self, name: &str) -> Option<&Map> {
        self.open_maps.get(name)
    }

    /// Header metadata of a cataloged map, read without opening it
    pub fn get_map_header(&mut self, name: &str) -> Result<MapHeader, ProjectError> {
        let root = self.require_valid()?;
        self.ensure_catalog()?;
        let file = self.catalog_file(name)?;
        let parser = self.parser.as_ref().ok_or_else(|| {
            ProjectError::InternalConsistency("the document parser is not constructed".to_string())
        })?;
        let _guard = self.file_system.scoped(&root)?;
        let relative = Path::new(MAPS_DIRECTORY).join(&file);
        Ok(parser.parse_map_header(&relative)?)
    }

    /// Whether `path` holds a readable map document
    pub fn is_valid_map_file(&self, path: impl AsRef<Path>) -> bool {
        MapParser::new().parse_map_header(path.as_ref()).is_ok()
    }

    /// The map registered under `name`, loading it from disk on first access
    ///
    /// A map is parsed at most once; repeated calls return the one open
    /// instance, mutations included.
    pub fn get_map(&mut self, name: &str) -> Result<&Map, ProjectError> {
        self.open_map(name)?;
        self.open_maps.get(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!("map \"{}\" vanished after loading", name))
        })
    }

    /// Mutable access to the map registered under `name`, loading it from
    /// disk on first access
    pub fn get_map_mut(&mut self, name: &str) -> Result<&mut Map, ProjectError> {
        self.open_map(name)?;
        self.open_maps.get_mut(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!("map \"{}\" vanished after loading", name))
        })
    }

    /// Load a map's backup copy, superseding any open instance
    ///
    /// The result is always marked modified: a backup only exists because
    /// the map had unsaved changes, and saving is how it stops being one.
    pub fn open_map_backup(&mut self, name: &str) -> Result<&mut Map, ProjectError> {
        self.require_valid()?;
        self.ensure_catalog()?;
        let file = self.catalog_file(name)?;
        let backup_relative = Path::new(MAPS_DIRECTORY)
            .join(BACKUP_SUBDIRECTORY)
            .join(format!("{}{}", file, BACKUP_SUFFIX));
        if self.open_maps.remove(name).is_some() {
            info!("replacing open map \"{}\" with its backup", name);
        }
        self.load_map(name, &backup_relative, false)?;
        let map = self.open_maps.get_mut(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!("map \"{}\" vanished after loading", name))
        })?;
        map.set_file_name(&file);
        map.set_modified(true);
        Ok(map)
    }

    /// Create a new map and save it immediately
    ///
    /// `file_name` gets the map extension appended unless it already carries
    /// one. The map exists on disk before this returns; the open instance is
    /// returned for further editing.
    pub fn create_map(&mut self, name: &str, file_name: &str) -> Result<&mut Map, ProjectError> {
        let root = self.require_writable()?;
        if name.is_empty() {
            return Err(ProjectError::InternalConsistency(
                "a map needs a non-empty name".to_string(),
            ));
        }
        if file_name.is_empty() {
            return Err(ProjectError::InternalConsistency(
                "a map needs a non-empty file name".to_string(),
            ));
        }
        self.ensure_catalog()?;

        let file = normalized_file_name(file_name);
        let stem = file_name_stem(&file).to_string();
        for (existing_name, existing_file) in &self.map_catalog {
            if existing_name == name {
                return Err(ProjectError::NameCollision(format!(
                    "a map named \"{}\" already exists (file {})",
                    name, existing_file
                )));
            }
            if file_name_stem(existing_file).eq_ignore_ascii_case(&stem) {
                return Err(ProjectError::NameCollision(format!(
                    "map file \"{}\" is already used by map \"{}\"",
                    file, existing_name
                )));
            }
        }

        let mut map = Map::new(name);
        map.set_file_name(&file);
        map.set_created(chrono::Utc::now().to_rfc3339());
        self.internal_save(&mut map, name, &root)?;
        self.open_maps.insert(name.to_string(), map);
        self.open_maps.get_mut(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!("map \"{}\" vanished after creation", name))
        })
    }

    /// Save an open map, re-keying it if its name was changed in memory
    pub fn save_map(&mut self, name: &str) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        let mut map = self.open_maps.remove(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!(
                "cannot save \"{}\": it is not an open map",
                name
            ))
        })?;
        let result = self.internal_save(&mut map, name, &root);
        // Re-register under the saved name whether or not the save worked;
        // on failure that is still the old name.
        let key = map.saved_name().to_string();
        self.open_maps.insert(key, map);
        result
    }

    /// Save an open map under a new name and file, keeping the old file as
    /// a distinct catalog entry
    pub fn save_map_as(
        &mut self,
        name: &str,
        new_name: &str,
        new_file_name: &str,
    ) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        if new_name.is_empty() || new_file_name.is_empty() {
            return Err(ProjectError::InternalConsistency(
                "save-as needs a non-empty name and file name".to_string(),
            ));
        }
        let map = self.open_maps.get(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!(
                "cannot save \"{}\" under a new name: it is not an open map",
                name
            ))
        })?;
        let old_name = map.saved_name().to_string();
        let old_file = map.file_name().to_string();
        if new_name == old_name {
            return Err(ProjectError::NameCollision(format!(
                "save-as for \"{}\" needs a different map name",
                old_name
            )));
        }
        let new_file = normalized_file_name(new_file_name);
        let new_stem = file_name_stem(&new_file).to_string();
        if new_stem.eq_ignore_ascii_case(file_name_stem(&old_file)) {
            return Err(ProjectError::NameCollision(format!(
                "save-as for \"{}\" needs a different file name",
                old_name
            )));
        }
        for (other_name, other_file) in &self.map_catalog {
            if other_name == &old_name {
                continue;
            }
            if other_name == new_name {
                return Err(ProjectError::NameCollision(format!(
                    "a map named \"{}\" already exists",
                    new_name
                )));
            }
            if file_name_stem(other_file).eq_ignore_ascii_case(&new_stem) {
                return Err(ProjectError::NameCollision(format!(
                    "map file \"{}\" is already used by map \"{}\"",
                    new_file, other_name
                )));
            }
        }

        let mut map = self.open_maps.remove(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!(
                "cannot save \"{}\" under a new name: it is not an open map",
                name
            ))
        })?;
        map.set_name(new_name);
        map.set_file_name(&new_file);
        match self.internal_save(&mut map, &old_name, &root) {
            Ok(()) => {
                self.open_maps.insert(new_name.to_string(), map);
                // The old file stays behind as its own map.
                self.map_catalog.insert(old_name.clone(), old_file.clone());
                if let Err(e) = self.clear_backup_files(&root, &old_file) {
                    warn!(
                        "clearing backups for \"{}\" after save-as failed: {e}",
                        old_name
                    );
                }
                Ok(())
            }
            Err(e) => {
                map.set_name(&old_name);
                map.set_file_name(&old_file);
                self.open_maps.insert(old_name, map);
                Err(e)
            }
        }
    }

    /// Write a crash-safety backup of an open map; no-op when unmodified
    pub fn save_map_backup(&mut self, name: &str) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        let map = self.open_maps.get(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!(
                "cannot back up \"{}\": it is not an open map",
                name
            ))
        })?;
        if !map.is_modified() {
            debug!("map \"{}\" is unmodified; skipping backup", name);
            return Ok(());
        }
        let file = backing_file_name(map);

        let _guard = self.file_system.scoped(&root)?;
        let backup_dir = Path::new(MAPS_DIRECTORY).join(BACKUP_SUBDIRECTORY);
        self.file_system.make_directories(&backup_dir)?;
        let temp = backup_dir.join(format!("{}{}", file, BACKUP_SAVING_SUFFIX));
        let dest = backup_dir.join(format!("{}{}", file, BACKUP_SUFFIX));
        MapWriter::new().save(map, &temp)?;
        self.file_system.move_file(&temp, &dest, true)?;
        Ok(())
    }

    /// Whether a cataloged map currently has a backup on disk
    pub fn has_backup(&mut self, name: &str) -> Result<bool, ProjectError> {
        let root = self.require_valid()?;
        self.ensure_catalog()?;
        let file = self.catalog_file(name)?;
        let backup = root
            .join(MAPS_DIRECTORY)
            .join(BACKUP_SUBDIRECTORY)
            .join(format!("{}{}", file, BACKUP_SUFFIX));
        Ok(self.file_system.file_info(&backup).is_regular_file())
    }

    /// Delete the on-disk backup files of a cataloged map
    pub fn clear_backup(&mut self, name: &str) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        self.ensure_catalog()?;
        let file = self.catalog_file(name)?;
        self.clear_backup_files(&root, &file)
    }

    /// Close an open map, optionally unloading actor libraries only it used
    ///
    /// Closing a name that is not an open map is a consistency error: after
    /// a rename-via-save the map lives under its new name, and a caller
    /// still holding the old one must find out rather than silently no-op.
    pub fn close_map(&mut self, name: &str, unload_libraries: bool) -> Result<(), ProjectError> {
        let root = self.require_valid()?;
        let map = self.open_maps.remove(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!(
                "cannot close \"{}\": it is not an open map",
                name
            ))
        })?;
        if unload_libraries {
            self.unload_unused_libraries(&map);
        }
        if !self.read_only {
            let file = backing_file_name(&map);
            if let Err(e) = self.clear_backup_files(&root, &file) {
                warn!("clearing backup while closing \"{}\" failed: {e}", name);
            }
        }
        Ok(())
    }

    /// Close every open map, best-effort; the open set is empty afterwards
    pub fn close_all_maps(&mut self, unload_libraries: bool) -> Result<(), ProjectError> {
        self.require_valid()?;
        let mut names: Vec<String> = self.open_maps.keys().cloned().collect();
        names.sort();
        for name in names {
            if let Err(e) = self.close_map(&name, unload_libraries) {
                warn!("closing map \"{}\" reported: {e}", name);
            }
        }
        Ok(())
    }

    /// Delete a map from the catalog and from disk, closing it first if open
    pub fn delete_map(&mut self, name: &str, unload_libraries: bool) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        self.ensure_catalog()?;
        let Some(file) = self.map_catalog.get(name).cloned() else {
            return Err(ProjectError::FileNotFound(format!(
                "no map named \"{}\" in this project",
                name
            )));
        };
        if self.open_maps.contains_key(name) {
            self.close_map(name, unload_libraries)?;
        } else if let Err(e) = self.clear_backup_files(&root, &file) {
            warn!("clearing orphan backup for \"{}\" failed: {e}", name);
        }
        self.map_catalog.remove(name);

        let map_path = root.join(MAPS_DIRECTORY).join(&file);
        if self.file_system.file_info(&map_path).exists() {
            self.file_system.delete_file(&map_path)?;
        } else {
            warn!(
                "map file {} was already missing when \"{}\" was deleted",
                map_path.display(),
                name
            );
        }
        Ok(())
    }

    /// Unload actor libraries used by a closing map that nothing else needs
    ///
    /// A library survives when another open map depends on it or when it
    /// supplied an actor some collaborator still holds externally (counted
    /// holds registered through the library manager).
    pub fn unload_unused_libraries(&mut self, closing_map: &Map) {
        let held: Vec<&ActorProxy> = closing_map
            .proxies()
            .iter()
            .filter(|proxy| self.libraries.is_externally_held(proxy.id))
            .collect();
        for entry in closing_map.libraries() {
            let used_elsewhere = self.open_maps.values().any(|other| {
                other.saved_name() != closing_map.saved_name() && other.has_library(&entry.name)
            });
            if used_elsewhere {
                debug!(
                    "library \"{}\" is used by another open map; keeping it",
                    entry.name
                );
                continue;
            }
            let supplies_held_actor = held.iter().any(|proxy| {
                self.libraries
                    .registry_for_library(&entry.name)
                    .map_or(false, |registry| registry.supports(&proxy.actor_type))
            });
            if supplies_held_actor {
                debug!(
                    "library \"{}\" supplies an externally held actor; keeping it",
                    entry.name
                );
                continue;
            }
            if self.libraries.unload_registry(&entry.name) {
                info!("unloaded actor library \"{}\"", entry.name);
            }
        }
    }

    /// Which map owns the actor with this ID, if any
    ///
    /// Checks a document currently being parsed first, then all open maps.
    /// `None` is a normal answer; callers use this as an existence probe.
    pub fn map_for_actor(&self, id: Uuid) -> Option<&Map> {
        if let Some(parser) = &self.parser {
            if let Some(in_flight) = parser.map_being_parsed() {
                if in_flight.proxy(id).is_some() {
                    return Some(in_flight);
                }
            }
        }
        self.open_maps.values().find(|map| map.proxy(id).is_some())
    }

    /// Load a map (opening it if needed) and deliver its proxies to a scene
    pub fn load_map_into_scene(
        &mut self,
        name: &str,
        sink: &mut dyn SceneSink,
        include_billboards: bool,
    ) -> Result<(), ProjectError> {
        self.open_map(name)?;
        let map = self.open_maps.get(name).ok_or_else(|| {
            ProjectError::InternalConsistency(format!("map \"{}\" vanished after loading", name))
        })?;
        scene::deliver_map(map, sink, include_billboards);
        Ok(())
    }

    pub(super) fn scan_map_catalog(&mut self) -> Result<(), ProjectError> {
        let root = self.require_valid()?;
        let parser = self.parser.as_ref().ok_or_else(|| {
            ProjectError::InternalConsistency("the document parser is not constructed".to_string())
        })?;

        let mut discovered: Vec<(String, String)> = Vec::new();
        {
            let _guard = self.file_system.scoped(&root)?;
            let files = self.file_system.dir_files(
                Path::new(MAPS_DIRECTORY),
                &[MAP_EXTENSION, LEGACY_MAP_EXTENSION],
            )?;
            for file in files {
                let path = Path::new(MAPS_DIRECTORY).join(&file);
                match parser.parse_map_name(&path) {
                    Ok(name) => discovered.push((name, file)),
                    Err(e) => warn!("skipping unreadable map file {}: {e}", path.display()),
                }
            }
        }

        self.map_catalog.clear();
        for (name, file) in discovered {
            let unique = self.disambiguated_name(name, &file);
            self.map_catalog.insert(unique, file);
        }
        Ok(())
    }

    fn ensure_catalog(&mut self) -> Result<(), ProjectError> {
        if self.map_catalog.is_empty() {
            self.scan_map_catalog()?;
        }
        Ok(())
    }

    fn catalog_file(&self, name: &str) -> Result<String, ProjectError> {
        self.map_catalog.get(name).cloned().ok_or_else(|| {
            ProjectError::FileNotFound(format!("no map named \"{}\" in this project", name))
        })
    }

    fn disambiguated_name(&self, name: String, file: &str) -> String {
        if !self.map_catalog.contains_key(&name) {
            return name;
        }
        let first_file = self.map_catalog.get(&name).cloned().unwrap_or_default();
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{}{}", name, suffix);
            if !self.map_catalog.contains_key(&candidate) {
                warn!(
                    "map file {} declares name \"{}\" already taken by {}; cataloging it as \"{}\"",
                    file, name, first_file, candidate
                );
                return candidate;
            }
            suffix += 1;
        }
    }

    fn open_map(&mut self, name: &str) -> Result<(), ProjectError> {
        self.require_valid()?;
        if self.open_maps.contains_key(name) {
            return Ok(());
        }
        self.ensure_catalog()?;
        let file = self.catalog_file(name)?;
        let relative = Path::new(MAPS_DIRECTORY).join(&file);
        self.load_map(name, &relative, true)?;
        if let Some(map) = self.open_maps.get_mut(name) {
            map.set_file_name(&file);
        }
        Ok(())
    }

    fn load_map(
        &mut self,
        name: &str,
        relative_path: &Path,
        clear_modified: bool,
    ) -> Result<(), ProjectError> {
        let root = self.require_valid()?;
        let _guard = self.file_system.scoped(&root)?;
        if !self.file_system.file_info(relative_path).is_regular_file() {
            return Err(ProjectError::FileNotFound(format!(
                "map file {} does not exist",
                relative_path.display()
            )));
        }
        let parser = self.parser.as_mut().ok_or_else(|| {
            ProjectError::InternalConsistency("the document parser is not constructed".to_string())
        })?;
        let mut map = match parser.parse(relative_path, &self.libraries) {
            Ok(map) => map,
            Err(e) => {
                error!(
                    "failed to load map \"{}\" from {}: {e}",
                    name,
                    relative_path.display()
                );
                return Err(e.into());
            }
        };
        if clear_modified {
            map.set_modified(false);
        }
        if parser.used_deprecated_format() {
            // An old format version loads fine but should be rewritten at
            // the current one on the next save.
            map.set_modified(true);
        }
        if !map.missing_libraries().is_empty() || !map.missing_actor_types().is_empty() {
            warn!(
                "map \"{}\" loaded with {} unresolved libraries and {} unresolved actor types",
                name,
                map.missing_libraries().len(),
                map.missing_actor_types().len()
            );
        }
        map.set_saved_name(name);
        self.open_maps.insert(name.to_string(), map);
        Ok(())
    }

    fn internal_save(
        &mut self,
        map: &mut Map,
        old_name: &str,
        root: &Path,
    ) -> Result<(), ProjectError> {
        let new_name = map.name().to_string();
        if new_name.is_empty() {
            return Err(ProjectError::InternalConsistency(
                "a map cannot be saved with an empty name".to_string(),
            ));
        }
        if new_name != old_name
            && (self.open_maps.contains_key(&new_name)
                || self.map_catalog.contains_key(&new_name))
        {
            return Err(ProjectError::NameCollision(format!(
                "cannot rename map \"{}\" to \"{}\": that name is already in use",
                old_name, new_name
            )));
        }
        let file = if map.file_name().is_empty() {
            normalized_file_name(&new_name)
        } else {
            map.file_name().to_string()
        };

        {
            let _guard = self.file_system.scoped(root)?;
            let temp = Path::new(MAPS_DIRECTORY).join(format!("{}{}", file, SAVING_SUFFIX));
            let dest = Path::new(MAPS_DIRECTORY).join(&file);
            MapWriter::new().save(map, &temp)?;
            self.file_system.move_file(&temp, &dest, true)?;
        }

        if new_name != old_name {
            self.map_catalog.remove(old_name);
        }
        self.map_catalog.insert(new_name.clone(), file.clone());
        map.set_saved_name(&new_name);
        map.set_file_name(&file);
        map.set_modified(false);

        match self.clear_backup_files(root, &file) {
            Ok(()) => {}
            Err(ProjectError::FileNotFound(msg)) => {
                debug!("no backup to clear after saving \"{}\": {}", new_name, msg);
            }
            Err(e) => warn!("clearing backup after saving \"{}\" failed: {e}", new_name),
        }
        Ok(())
    }

    fn clear_backup_files(&self, root: &Path, file: &str) -> Result<(), ProjectError> {
        let backup_dir = root.join(MAPS_DIRECTORY).join(BACKUP_SUBDIRECTORY);
        self.file_system
            .delete_file(backup_dir.join(format!("{}{}", file, BACKUP_SUFFIX)))?;
        self.file_system
            .delete_file(backup_dir.join(format!("{}{}", file, BACKUP_SAVING_SUFFIX)))?;
        Ok(())
    }
}

fn backing_file_name(map: &Map) -> String {
    if map.file_name().is_empty() {
        normalized_file_name(map.name())
    } else {
        map.file_name().to_string()
    }
}
