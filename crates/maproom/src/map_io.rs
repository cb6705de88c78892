//! Map document parsing and writing
//!
//! Documents are pretty-printed JSON. The parser offers a cheap header probe
//! (name/metadata only) and a full parse that resolves every proxy's actor
//! type against the loaded libraries, collecting unresolvable libraries and
//! actor types as diagnostics instead of failing the parse. While a full
//! parse is resolving, the in-flight map is observable through
//! [`MapParser::map_being_parsed`] so ID lookups can consult proxies that are
//! not yet part of any registered map.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use maproom_core::{Map, MapHeader, MAP_FORMAT_VERSION};

use crate::error::ProjectError;
use crate::libraries::LibraryManager;

/// Errors raised while reading or writing map documents
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document file could not be read
    #[error("reading map document: {0}")]
    Read(String),
    /// The document is not valid JSON or not a map document
    #[error("malformed map document: {0}")]
    Syntax(String),
    /// The document declares a format version newer than this build supports
    #[error("map document {path} has format version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        /// Document path for diagnostics
        path: String,
        /// Version declared by the document
        found: u32,
        /// Newest version this build can read
        supported: u32,
    },
    /// The document parsed but is unusable (e.g. no declared name)
    #[error("unusable map document: {0}")]
    Malformed(String),
    /// The document could not be written
    #[error("writing map document: {0}")]
    Write(String),
}

impl From<DocumentError> for ProjectError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Write(msg) => ProjectError::IoFailure(msg),
            other => ProjectError::ParsingFailure(other.to_string()),
        }
    }
}

fn default_format_version() -> u32 {
    1
}

#[derive(serde::Deserialize)]
struct VersionProbe {
    #[serde(default = "default_format_version")]
    format_version: u32,
}

/// Parses map documents into `Map` entities
#[derive(Debug, Default)]
pub struct MapParser {
    current: Option<Map>,
    deprecated_format: bool,
}

impl MapParser {
    /// Create an idle parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full parse is currently resolving
    pub fn is_parsing(&self) -> bool {
        self.current.is_some()
    }

    /// The document under resolution, when a parse is in flight
    pub fn map_being_parsed(&self) -> Option<&Map> {
        self.current.as_ref()
    }

    /// Whether the last successful parse read an older format version
    pub fn used_deprecated_format(&self) -> bool {
        self.deprecated_format
    }

    /// Read only the declared name of a map document
    pub fn parse_map_name(&self, path: impl AsRef<Path>) -> Result<String, DocumentError> {
        Ok(self.parse_map_header(path)?.name)
    }

    /// Read the header metadata of a map document without building proxies
    pub fn parse_map_header(&self, path: impl AsRef<Path>) -> Result<MapHeader, DocumentError> {
        let path = path.as_ref();
        let text = read_document(path)?;
        let header: MapHeader = serde_json::from_str(&text)
            .map_err(|e| DocumentError::Syntax(format!("{}: {e}", path.display())))?;
        if header.name.is_empty() {
            return Err(DocumentError::Malformed(format!(
                "{} declares no map name",
                path.display()
            )));
        }
        Ok(header)
    }

    /// Fully parse a map document, resolving actor types against `libraries`
    ///
    /// Proxies whose actor type no loaded library supports are dropped and
    /// recorded in the map's missing-actor-types list; library dependencies
    /// that are not loaded are recorded in missing-libraries. Both are
    /// diagnostics: the rest of the map loads normally.
    pub fn parse(
        &mut self,
        path: impl AsRef<Path>,
        libraries: &LibraryManager,
    ) -> Result<Map, DocumentError> {
        let path = path.as_ref();
        let text = read_document(path)?;

        let probe: VersionProbe = serde_json::from_str(&text)
            .map_err(|e| DocumentError::Syntax(format!("{}: {e}", path.display())))?;
        if probe.format_version > MAP_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                path: path.display().to_string(),
                found: probe.format_version,
                supported: MAP_FORMAT_VERSION,
            });
        }
        self.deprecated_format = probe.format_version < MAP_FORMAT_VERSION;

        let mut map: Map = serde_json::from_str(&text)
            .map_err(|e| DocumentError::Syntax(format!("{}: {e}", path.display())))?;
        if map.name().is_empty() {
            return Err(DocumentError::Malformed(format!(
                "{} declares no map name",
                path.display()
            )));
        }
        if self.deprecated_format {
            map.set_format_version(MAP_FORMAT_VERSION);
        }

        // Drain the raw proxies, then re-add them one by one so the document
        // under resolution is observable through map_being_parsed(). Removing
        // proxies clears a matching environment reference, so it is saved
        // here and restored once the survivors are back in.
        let pending: Vec<_> = map.proxies().to_vec();
        let environment = map.environment_actor();
        let shell = {
            let mut m = map;
            while let Some(p) = m.proxies().first().map(|p| p.id) {
                m.remove_proxy(p);
            }
            m
        };
        self.current = Some(shell);
        if let Some(current) = self.current.as_mut() {
            for library in current.libraries().to_vec() {
                if libraries.registry_for_library(&library.name).is_none() {
                    warn!(
                        "map \"{}\" references library \"{}\" which is not loaded",
                        current.name(),
                        library.name
                    );
                    current.add_missing_library(library.name);
                }
            }
            for proxy in pending {
                if libraries.is_type_supported(&proxy.actor_type) {
                    current.add_proxy(proxy);
                } else {
                    warn!(
                        "map \"{}\" contains actor \"{}\" of unknown type {}; skipped",
                        current.name(),
                        proxy.name,
                        proxy.actor_type
                    );
                    if !current.missing_actor_types().contains(&proxy.actor_type) {
                        current.add_missing_actor_type(proxy.actor_type.clone());
                    }
                }
            }
            current.set_environment_actor(environment);
            if let Some(env) = current.environment_actor() {
                if current.proxy(env).is_none() {
                    current.set_environment_actor(None);
                }
            }
        }

        match self.current.take() {
            Some(map) => Ok(map),
            None => Err(DocumentError::Malformed(format!(
                "{}: document state lost during resolution",
                path.display()
            ))),
        }
    }
}

/// Writes `Map` entities to map documents
///
/// The writer does not guarantee atomicity; callers wanting crash safety
/// write to a temporary sibling and rename over the destination.
#[derive(Debug, Default)]
pub struct MapWriter;

impl MapWriter {
    /// Create a writer
    pub fn new() -> Self {
        Self
    }

    /// Serialize a map to `path`, replacing any existing file
    pub fn save(&self, map: &Map, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let mut json = serde_json::to_string_pretty(map)
            .map_err(|e| DocumentError::Write(format!("{}: {e}", path.display())))?;
        json.push('\n');
        fs::write(path, json)
            .map_err(|e| DocumentError::Write(format!("{}: {e}", path.display())))
    }
}

fn read_document(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|e| DocumentError::Read(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libraries::ActorRegistry;
    use maproom_core::{ActorProxy, ActorType};
    use tempfile::TempDir;

    fn light_type() -> ActorType {
        ActorType::new("core.lights", "SpotLight")
    }

    fn manager_with_lights() -> LibraryManager {
        let mut mgr = LibraryManager::new();
        mgr.register(ActorRegistry::new("core_actors", "1.0").with_type(light_type()));
        mgr
    }

    fn sample_map() -> Map {
        let mut map = Map::new("Harbor");
        map.set_description("waterfront scene");
        map.add_library("core_actors", "1.0");
        map.add_proxy(ActorProxy::new("lamp", light_type()));
        map
    }

    #[test]
    fn test_header_probe() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harbor.map");
        MapWriter::new().save(&sample_map(), &path).unwrap();

        let parser = MapParser::new();
        assert_eq!(parser.parse_map_name(&path).unwrap(), "Harbor");
        let header = parser.parse_map_header(&path).unwrap();
        assert_eq!(header.description, "waterfront scene");
    }

    #[test]
    fn test_probe_rejects_nameless_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.map");
        fs::write(&path, "{ \"name\": \"\" }\n").unwrap();

        let parser = MapParser::new();
        let err = parser.parse_map_name(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));
    }

    #[test]
    fn test_probe_rejects_non_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.map");
        fs::write(&path, "this is not json").unwrap();

        let parser = MapParser::new();
        let err = parser.parse_map_name(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Syntax(_)));
    }

    #[test]
    fn test_parse_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harbor.map");
        let map = sample_map();
        MapWriter::new().save(&map, &path).unwrap();

        let mut parser = MapParser::new();
        let loaded = parser.parse(&path, &manager_with_lights()).unwrap();
        assert_eq!(loaded.name(), "Harbor");
        assert_eq!(loaded.id(), map.id());
        assert_eq!(loaded.proxies().len(), 1);
        assert_eq!(loaded.proxies()[0].name, "lamp");
        assert!(loaded.missing_libraries().is_empty());
        assert!(loaded.missing_actor_types().is_empty());
        assert!(!parser.used_deprecated_format());
    }

    #[test]
    fn test_parse_collects_missing_libraries_and_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harbor.map");
        let mut map = sample_map();
        map.add_library("vehicles", "0.9");
        let ghost_type = ActorType::new("vehicles", "Truck");
        map.add_proxy(ActorProxy::new("truck1", ghost_type.clone()));
        map.add_proxy(ActorProxy::new("truck2", ghost_type.clone()));
        MapWriter::new().save(&map, &path).unwrap();

        let mut parser = MapParser::new();
        let loaded = parser.parse(&path, &manager_with_lights()).unwrap();
        // The resolvable proxy is intact; both trucks are dropped.
        assert_eq!(loaded.proxies().len(), 1);
        assert_eq!(loaded.missing_libraries(), &["vehicles".to_string()]);
        assert_eq!(loaded.missing_actor_types(), &[ghost_type]);
        // The dependency list itself is preserved for the next save.
        assert!(loaded.has_library("vehicles"));
    }

    #[test]
    fn test_parse_rejects_newer_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.map");
        fs::write(
            &path,
            format!(
                "{{ \"name\": \"Future\", \"format_version\": {} }}\n",
                MAP_FORMAT_VERSION + 1
            ),
        )
        .unwrap();

        let mut parser = MapParser::new();
        let err = parser.parse(&path, &LibraryManager::new()).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_parse_flags_deprecated_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.map");
        fs::write(&path, "{ \"name\": \"Old\", \"format_version\": 1 }\n").unwrap();

        let mut parser = MapParser::new();
        let loaded = parser.parse(&path, &LibraryManager::new()).unwrap();
        assert!(parser.used_deprecated_format());
        // Upgraded in memory so the next save rewrites at the current version.
        assert_eq!(loaded.format_version(), MAP_FORMAT_VERSION);
    }

    #[test]
    fn test_parse_drops_dangling_environment_reference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.map");
        let mut map = Map::new("EnvTest");
        let env = ActorProxy::new("world", ActorType::new("vehicles", "Truck"));
        let env_id = env.id;
        map.add_proxy(env);
        map.set_environment_actor(Some(env_id));
        MapWriter::new().save(&map, &path).unwrap();

        // The environment proxy's type is unknown, so the proxy is dropped
        // and the environment reference cleared with it.
        let mut parser = MapParser::new();
        let loaded = parser.parse(&path, &manager_with_lights()).unwrap();
        assert!(loaded.proxies().is_empty());
        assert_eq!(loaded.environment_actor(), None);
    }

    #[test]
    fn test_parser_is_idle_between_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harbor.map");
        MapWriter::new().save(&sample_map(), &path).unwrap();

        let mut parser = MapParser::new();
        assert!(!parser.is_parsing());
        assert!(parser.map_being_parsed().is_none());
        parser.parse(&path, &manager_with_lights()).unwrap();
        assert!(!parser.is_parsing());
        assert!(parser.map_being_parsed().is_none());
    }

    #[test]
    fn test_writer_output_is_pretty_json_with_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harbor.map");
        MapWriter::new().save(&sample_map(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\n  \"name\": \"Harbor\""));
        serde_json::from_str::<serde_json::Value>(&text).unwrap();
    }
}
