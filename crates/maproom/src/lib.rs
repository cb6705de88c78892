//! Project context and map persistence for maproom
//!
//! This crate manages a project on disk: a validated context directory with
//! a `maps/` subdirectory for scene documents and one directory per resource
//! type for typed assets. Everything hangs off an explicit [`Project`]
//! instance; several projects can coexist in one process.
//!
//! - `Project` - The context object: map catalog, open maps, resources
//! - `FileSystem` - Path probing, atomic moves, and scoped directory changes
//! - `MapParser` / `MapWriter` - Map document reading and writing
//! - `LibraryManager` - Actor libraries and the types they supply
//! - `ResourceTree` - Indexed view of the on-disk resource catalog
//! - `SceneSink` - Consumer interface for delivering a loaded map to a scene

pub mod context;
pub mod error;
pub mod file_system;
pub mod libraries;
pub mod map_io;
pub mod resources;
pub mod scene;
pub mod search_path;

pub use maproom_core::{
    ActorProxy, ActorType, DataType, LibraryEntry, Map, MapHeader, RenderMode, ResourceDescriptor,
    LEGACY_MAP_EXTENSION, MAP_EXTENSION, MAP_FORMAT_VERSION,
};

pub use context::{
    Project, BACKUP_SAVING_SUFFIX, BACKUP_SUBDIRECTORY, BACKUP_SUFFIX, MAPS_DIRECTORY,
    SAVING_SUFFIX,
};
pub use error::ProjectError;
pub use file_system::{FileError, FileInfo, FileSystem, FileType, ScopedDir};
pub use libraries::{ActorRegistry, LibraryManager};
pub use map_io::{DocumentError, MapParser, MapWriter};
pub use resources::{CategoryNode, ResourceTree};
pub use scene::SceneSink;
pub use search_path::{SearchPath, PATH_LIST_DELIMITER};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that change the process working directory. The guard
    /// must be held for the whole test body; a poisoned lock is recovered
    /// since the directory is restored per-operation anyway.
    pub fn cwd_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
