//! Actor plugin libraries and their lifecycle
//!
//! Each loaded library contributes an actor registry: the set of actor types
//! it can instantiate. The manager also carries an explicit external-holder
//! count per actor ID, registered by collaborators that retain a proxy beyond
//! its owning map; unload decisions consult these counts instead of guessing
//! from ownership snapshots.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use maproom_core::{ActorProxy, ActorType};

/// The actor types one plugin library can instantiate
#[derive(Debug, Clone)]
pub struct ActorRegistry {
    name: String,
    version: String,
    types: Vec<ActorType>,
}

impl ActorRegistry {
    /// Create an empty registry for a library
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            types: Vec::new(),
        }
    }

    /// Add a supported actor type (builder style)
    pub fn with_type(mut self, actor_type: ActorType) -> Self {
        self.add_type(actor_type);
        self
    }

    /// Add a supported actor type
    pub fn add_type(&mut self, actor_type: ActorType) {
        if !self.types.contains(&actor_type) {
            self.types.push(actor_type);
        }
    }

    /// Library name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Library version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Supported actor types
    pub fn actor_types(&self) -> &[ActorType] {
        &self.types
    }

    /// Whether this library can instantiate the given type
    pub fn supports(&self, actor_type: &ActorType) -> bool {
        self.types.contains(actor_type)
    }

    /// Instantiate a proxy of a supported type; `None` if unsupported
    pub fn create_actor(&self, name: &str, actor_type: &ActorType) -> Option<ActorProxy> {
        if self.supports(actor_type) {
            Some(ActorProxy::new(name, actor_type.clone()))
        } else {
            None
        }
    }
}

/// Tracks loaded actor registries and external proxy holds
#[derive(Debug, Default)]
pub struct LibraryManager {
    // Load order matters: the first registry supporting a type owns it.
    registries: Vec<ActorRegistry>,
    external_holds: HashMap<Uuid, usize>,
}

impl LibraryManager {
    /// Create a manager with no libraries loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry; returns false (and changes nothing) if a library of
    /// the same name is already loaded
    pub fn register(&mut self, registry: ActorRegistry) -> bool {
        if self.registry_for_library(registry.name()).is_some() {
            warn!("library \"{}\" is already loaded", registry.name());
            return false;
        }
        self.registries.push(registry);
        true
    }

    /// Unload a registry by library name; returns false if not loaded
    pub fn unload_registry(&mut self, name: &str) -> bool {
        let Some(idx) = self.registries.iter().position(|r| r.name() == name) else {
            return false;
        };
        self.registries.remove(idx);
        true
    }

    /// Registry loaded under a library name
    pub fn registry_for_library(&self, name: &str) -> Option<&ActorRegistry> {
        self.registries.iter().find(|r| r.name() == name)
    }

    /// First loaded registry that supports an actor type
    pub fn registry_owning_type(&self, actor_type: &ActorType) -> Option<&ActorRegistry> {
        self.registries.iter().find(|r| r.supports(actor_type))
    }

    /// Whether any loaded library supports an actor type
    pub fn is_type_supported(&self, actor_type: &ActorType) -> bool {
        self.registry_owning_type(actor_type).is_some()
    }

    /// Instantiate a proxy through the library owning its type
    pub fn create_actor(&self, name: &str, actor_type: &ActorType) -> Option<ActorProxy> {
        self.registry_owning_type(actor_type)?
            .create_actor(name, actor_type)
    }

    /// Names of all loaded libraries, in load order
    pub fn library_names(&self) -> Vec<&str> {
        self.registries.iter().map(|r| r.name()).collect()
    }

    /// Record that a collaborator holds a proxy beyond its owning map
    pub fn retain_actor(&mut self, id: Uuid) {
        *self.external_holds.entry(id).or_insert(0) += 1;
    }

    /// Release a previously registered hold
    pub fn release_actor(&mut self, id: Uuid) {
        match self.external_holds.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.external_holds.remove(&id);
            }
            None => warn!("release of actor {id} that was never retained"),
        }
    }

    /// Whether any collaborator currently holds the proxy
    pub fn is_externally_held(&self, id: Uuid) -> bool {
        self.external_holds.contains_key(&id)
    }

    /// Number of registered holds on the proxy
    pub fn external_hold_count(&self, id: Uuid) -> usize {
        self.external_holds.get(&id).copied().unwrap_or(0)
    }
}
