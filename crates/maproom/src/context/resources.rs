//! Resource catalog operations
//!
//! Resources live in one directory per resource type under the context
//! root, organized into nested category folders. The in-memory tree is a
//! cache of that layout, built lazily on the first query and kept current
//! by per-category rescans after each mutation.

use std::path::{Path, PathBuf};

use tracing::error;

use maproom_core::{DataType, ResourceDescriptor, DESCRIPTOR_SEPARATOR};

use crate::error::ProjectError;
use crate::resources::CategoryNode;

use super::Project;

impl Project {
    /// Build the resource tree by walking every resource directory
    ///
    /// Indexing happens at most once per context; mutating operations keep
    /// the tree current afterwards. `refresh` discards it for a full rescan.
    pub fn index_resources(&mut self) -> Result<(), ProjectError> {
        if self.resources_indexed {
            return Ok(());
        }
        let root = self.require_valid()?;
        let _guard = self.file_system.scoped(&root)?;
        self.resources.index(Path::new("."));
        self.resources_indexed = true;
        Ok(())
    }

    /// The category tree for one resource type, indexing on first use
    pub fn resources_of_type(
        &mut self,
        data_type: DataType,
    ) -> Result<&CategoryNode, ProjectError> {
        self.require_valid()?;
        let dir_name = resource_directory(data_type)?;
        self.index_resources()?;
        match self.resources.root(data_type) {
            Some(node) => Ok(node),
            None => {
                error!("the resource tree is missing its {} root", dir_name);
                Err(ProjectError::InternalConsistency(format!(
                    "the resource tree is missing its {} root",
                    dir_name
                )))
            }
        }
    }

    /// Create a (possibly nested) resource category directory
    pub fn create_resource_category(
        &mut self,
        category: &str,
        data_type: DataType,
    ) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        let dir_name = resource_directory(data_type)?;
        let _guard = self.file_system.scoped(&root)?;
        let relative = category_path(dir_name, category);
        self.file_system.make_directories(&relative)?;
        if self.resources_indexed {
            self.resources
                .rescan_category(Path::new("."), data_type, category);
        }
        Ok(())
    }

    /// Remove a resource category directory
    ///
    /// A non-empty category is only removed when `recursive` is set; the
    /// return value reports whether the directory is gone.
    pub fn remove_resource_category(
        &mut self,
        category: &str,
        data_type: DataType,
        recursive: bool,
    ) -> Result<bool, ProjectError> {
        let root = self.require_writable()?;
        let dir_name = resource_directory(data_type)?;
        let _guard = self.file_system.scoped(&root)?;
        let relative = category_path(dir_name, category);
        let removed = self.file_system.delete_dir(&relative, recursive)?;
        if self.resources_indexed {
            self.resources
                .rescan_category(Path::new("."), data_type, category);
        }
        Ok(removed)
    }

    /// Copy a file into the project as a cataloged resource
    ///
    /// `source_file` may be relative to the caller's working directory; it
    /// is resolved before the operation enters the context. The stored file
    /// keeps the source's extension but takes `name` as its stem.
    pub fn add_resource(
        &mut self,
        name: &str,
        category: &str,
        source_file: impl AsRef<Path>,
        data_type: DataType,
    ) -> Result<ResourceDescriptor, ProjectError> {
        let root = self.require_writable()?;
        let dir_name = resource_directory(data_type)?;
        if name.is_empty() {
            return Err(ProjectError::InternalConsistency(
                "a resource needs a non-empty name".to_string(),
            ));
        }
        let source = source_file.as_ref();
        let info = self.file_system.file_info(source);
        if !info.exists() {
            return Err(ProjectError::FileNotFound(format!(
                "resource source file {} does not exist",
                source.display()
            )));
        }
        if !info.is_regular_file() {
            return Err(ProjectError::WrongType(format!(
                "resource source {} is not a regular file",
                source.display()
            )));
        }
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .filter(|ext| data_type.handles_extension(ext))
            .ok_or_else(|| {
                ProjectError::WrongType(format!(
                    "{} is not a recognized {} file",
                    source.display(),
                    data_type
                ))
            })?;
        // Resolve before changing directory; a relative source is relative
        // to the caller's working directory, not the context root.
        let source = std::fs::canonicalize(source).map_err(|err| {
            ProjectError::IoFailure(format!(
                "failed to resolve resource source {}: {err}",
                source.display()
            ))
        })?;

        let _guard = self.file_system.scoped(&root)?;
        let category_dir = category_path(dir_name, category);
        self.file_system.make_directories(&category_dir)?;
        let file_name = format!("{}.{}", name, extension);
        let destination = category_dir.join(&file_name);
        if self.file_system.file_info(&destination).exists() {
            return Err(ProjectError::NameCollision(format!(
                "a resource file named {} already exists in {}",
                file_name,
                category_dir.display()
            )));
        }
        self.file_system.copy_file(&source, &destination, false)?;

        let mut identifier = String::from(dir_name);
        for segment in split_segments(category) {
            identifier.push(DESCRIPTOR_SEPARATOR);
            identifier.push_str(segment);
        }
        identifier.push(DESCRIPTOR_SEPARATOR);
        identifier.push_str(&file_name);
        if self.resources_indexed {
            self.resources
                .rescan_category(Path::new("."), data_type, category);
        }
        Ok(ResourceDescriptor::new(name, identifier))
    }

    /// Delete a cataloged resource's file; an already-absent file succeeds
    pub fn remove_resource(
        &mut self,
        descriptor: &ResourceDescriptor,
    ) -> Result<(), ProjectError> {
        let root = self.require_writable()?;
        let data_type = descriptor.data_type().ok_or_else(|| {
            ProjectError::WrongType(format!(
                "resource identifier \"{}\" does not name a resource type",
                descriptor.identifier
            ))
        })?;
        let _guard = self.file_system.scoped(&root)?;
        self.file_system.delete_file(descriptor.relative_path())?;
        if self.resources_indexed {
            self.resources
                .rescan_category(Path::new("."), data_type, &descriptor.category());
        }
        Ok(())
    }

    /// Absolute path of a cataloged resource's file
    pub fn resource_path(&self, descriptor: &ResourceDescriptor) -> Result<PathBuf, ProjectError> {
        let root = self.require_valid()?;
        let path = root.join(descriptor.relative_path());
        let info = self.file_system.file_info(&path);
        if info.is_regular_file() {
            Ok(path)
        } else if info.exists() {
            Err(ProjectError::WrongType(format!(
                "resource path {} is not a regular file",
                path.display()
            )))
        } else {
            Err(ProjectError::FileNotFound(format!(
                "resource {} has no file at {}",
                descriptor.identifier,
                path.display()
            )))
        }
    }
}

fn resource_directory(data_type: DataType) -> Result<&'static str, ProjectError> {
    data_type
        .directory_name()
        .ok_or_else(|| ProjectError::WrongType(format!("{} is not a resource data type", data_type)))
}

fn category_path(dir_name: &str, category: &str) -> PathBuf {
    let mut path = PathBuf::from(dir_name);
    for segment in split_segments(category) {
        path.push(segment);
    }
    path
}

fn split_segments(category: &str) -> impl Iterator<Item = &str> {
    category
        .split(DESCRIPTOR_SEPARATOR)
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::cwd_lock;
    use std::fs;
    use tempfile::TempDir;

    fn open_project(dir: &TempDir) -> Project {
        Project::create_context(dir.path()).unwrap();
        let mut project = Project::new();
        project.set_context(dir.path(), false).unwrap();
        project
    }

    fn write_source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"payload").unwrap();
        path
    }

    #[test]
    fn test_index_always_creates_a_root_per_type() {
        let _cwd = cwd_lock();
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        for &data_type in DataType::resource_types() {
            let node = project.resources_of_type(data_type).unwrap();
            assert_eq!(Some(node.name()), data_type.directory_name());
            assert!(node.is_empty());
        }
    }

    #[test]
    fn test_resources_of_type_rejects_primitive_types() {
        let _cwd = cwd_lock();
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        let err = project.resources_of_type(DataType::Boolean).unwrap_err();
        assert!(matches!(err, ProjectError::WrongType(_)));
        let err = project.resources_of_type(DataType::Unknown).unwrap_err();
        assert!(matches!(err, ProjectError::WrongType(_)));
    }

    #[test]
    fn test_add_resource_copies_file_and_catalogs_it() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let source = write_source(&source_dir, "original.PNG");
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        let descriptor = project
            .add_resource("icons", "ui:hud", &source, DataType::Texture)
            .unwrap();
        assert_eq!(descriptor.display_name, "icons");
        assert_eq!(descriptor.identifier, "Textures:ui:hud:icons.png");

        let stored = dir.path().join("Textures/ui/hud/icons.png");
        assert!(stored.is_file());
        assert_eq!(fs::read(&stored).unwrap(), b"payload");
        assert_eq!(
            project.resource_path(&descriptor).unwrap(),
            stored.canonicalize().unwrap()
        );

        let root = project.resources_of_type(DataType::Texture).unwrap();
        let hud = root.category("ui").and_then(|ui| ui.category("hud")).unwrap();
        assert_eq!(hud.resource("icons.png"), Some(&descriptor));
    }

    #[test]
    fn test_add_resource_validates_source() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        let err = project
            .add_resource("ghost", "", source_dir.path().join("absent.png"), DataType::Texture)
            .unwrap_err();
        assert!(matches!(err, ProjectError::FileNotFound(_)));

        let err = project
            .add_resource("dir", "", source_dir.path(), DataType::Texture)
            .unwrap_err();
        assert!(matches!(err, ProjectError::WrongType(_)));

        let wrong_kind = write_source(&source_dir, "noise.wav");
        let err = project
            .add_resource("noise", "", &wrong_kind, DataType::Texture)
            .unwrap_err();
        assert!(matches!(err, ProjectError::WrongType(_)));
        assert!(!dir.path().join("Textures/noise.wav").exists());
    }

    #[test]
    fn test_add_resource_rejects_duplicate_file() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let source = write_source(&source_dir, "tile.png");
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        project
            .add_resource("tile", "ground", &source, DataType::Texture)
            .unwrap();
        let err = project
            .add_resource("tile", "ground", &source, DataType::Texture)
            .unwrap_err();
        assert!(matches!(err, ProjectError::NameCollision(_)));
    }

    #[test]
    fn test_remove_resource_deletes_file_and_updates_tree() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let source = write_source(&source_dir, "theme.ogg");
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        let descriptor = project
            .add_resource("theme", "music", &source, DataType::Sound)
            .unwrap();
        assert_eq!(
            project.resources_of_type(DataType::Sound).unwrap().resource_count(),
            1
        );

        project.remove_resource(&descriptor).unwrap();
        assert!(!dir.path().join("Sounds/music/theme.ogg").exists());
        assert_eq!(
            project.resources_of_type(DataType::Sound).unwrap().resource_count(),
            0
        );
        // Removing it again is a quiet success.
        project.remove_resource(&descriptor).unwrap();

        let err = project.resource_path(&descriptor).unwrap_err();
        assert!(matches!(err, ProjectError::FileNotFound(_)));
    }

    #[test]
    fn test_category_lifecycle() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let source = write_source(&source_dir, "crate.obj");
        let dir = TempDir::new().unwrap();
        let mut project = open_project(&dir);

        project
            .create_resource_category("props:industrial", DataType::StaticMesh)
            .unwrap();
        assert!(dir.path().join("StaticMeshes/props/industrial").is_dir());
        let root = project.resources_of_type(DataType::StaticMesh).unwrap();
        assert!(root
            .category("props")
            .and_then(|props| props.category("industrial"))
            .is_some());

        project
            .add_resource("crate", "props:industrial", &source, DataType::StaticMesh)
            .unwrap();
        // Non-recursive removal refuses a populated category.
        let removed = project
            .remove_resource_category("props:industrial", DataType::StaticMesh, false)
            .unwrap();
        assert!(!removed);
        assert!(dir.path().join("StaticMeshes/props/industrial/crate.obj").is_file());

        let removed = project
            .remove_resource_category("props:industrial", DataType::StaticMesh, true)
            .unwrap();
        assert!(removed);
        assert!(!dir.path().join("StaticMeshes/props/industrial").exists());
        let root = project.resources_of_type(DataType::StaticMesh).unwrap();
        assert!(root
            .category("props")
            .and_then(|props| props.category("industrial"))
            .is_none());
    }

    #[test]
    fn test_index_merges_preexisting_files() {
        let _cwd = cwd_lock();
        let dir = TempDir::new().unwrap();
        Project::create_context(dir.path()).unwrap();
        let textures = dir.path().join("Textures/terrain");
        fs::create_dir_all(&textures).unwrap();
        fs::write(textures.join("grass.png"), b"g").unwrap();
        fs::write(textures.join("readme.txt"), b"ignored").unwrap();
        let mut project = Project::new();
        project.set_context(dir.path(), false).unwrap();

        let root = project.resources_of_type(DataType::Texture).unwrap();
        let terrain = root.category("terrain").unwrap();
        assert_eq!(terrain.resources().len(), 1);
        let grass = terrain.resource("grass.png").unwrap();
        assert_eq!(grass.identifier, "Textures:terrain:grass.png");
    }

    #[test]
    fn test_resource_path_rejects_directories() {
        let _cwd = cwd_lock();
        let dir = TempDir::new().unwrap();
        Project::create_context(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("Textures/ui")).unwrap();
        let mut project = Project::new();
        project.set_context(dir.path(), false).unwrap();

        let descriptor = ResourceDescriptor::new("ui", "Textures:ui");
        let err = project.resource_path(&descriptor).unwrap_err();
        assert!(matches!(err, ProjectError::WrongType(_)));
    }

    #[test]
    fn test_read_only_context_rejects_resource_mutations() {
        let _cwd = cwd_lock();
        let source_dir = TempDir::new().unwrap();
        let source = write_source(&source_dir, "tile.png");
        let dir = TempDir::new().unwrap();
        Project::create_context(dir.path()).unwrap();
        let mut project = Project::new();
        project.set_context(dir.path(), true).unwrap();

        assert!(matches!(
            project
                .add_resource("tile", "", &source, DataType::Texture)
                .unwrap_err(),
            ProjectError::ReadOnly(_)
        ));
        assert!(matches!(
            project
                .create_resource_category("ui", DataType::Texture)
                .unwrap_err(),
            ProjectError::ReadOnly(_)
        ));
        assert!(matches!(
            project
                .remove_resource_category("ui", DataType::Texture, true)
                .unwrap_err(),
            ProjectError::ReadOnly(_)
        ));
        assert!(matches!(
            project
                .remove_resource(&ResourceDescriptor::new("tile", "Textures:tile.png"))
                .unwrap_err(),
            ProjectError::ReadOnly(_)
        ));
        // Browsing stays available.
        assert!(project.resources_of_type(DataType::Texture).is_ok());
    }
}
