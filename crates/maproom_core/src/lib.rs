//! Core data structures for maproom
//!
//! This crate provides the fundamental types for representing scene maps:
//! - `Map` - A named scene-description document with proxies and libraries
//! - `MapHeader` - Document metadata readable without a full parse
//! - `ActorProxy` - A placed actor instance with a property bag
//! - `ActorType` - Category-qualified actor type identifier
//! - `RenderMode` - Per-proxy drawing hint for scene consumers
//! - `DataType` / `ResourceDescriptor` - Typed on-disk asset identification

mod actor;
mod map;
mod resource;

pub use actor::{ActorProxy, ActorType, RenderMode};
pub use map::{
    file_name_stem, normalized_file_name, LibraryEntry, Map, MapHeader, LEGACY_MAP_EXTENSION,
    MAP_EXTENSION, MAP_FORMAT_VERSION,
};
pub use resource::{DataType, ResourceDescriptor, DESCRIPTOR_SEPARATOR};
