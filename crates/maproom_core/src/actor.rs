//! Actor proxies and actor types
//!
//! Actor proxies are the payload of a map: opaque entities with a unique ID,
//! a category-qualified actor type, a render mode, and a free-form property
//! bag. Their behavior lives in plugin libraries; the data model only records
//! what is needed to persist and re-create them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fully-qualified actor type: a dot-separated category plus a type name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorType {
    /// Dot-separated category chain, e.g. "core.lights"
    pub category: String,
    /// Type name within the category, e.g. "SpotLight"
    pub name: String,
}

impl ActorType {
    /// Create an actor type from a category chain and a name
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Full "category.name" form used in logs and diagnostics
    pub fn full_name(&self) -> String {
        if self.category.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.category, self.name)
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// How the consuming scene layer should draw a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Draw the underlying actor
    #[default]
    Actor,
    /// Draw a billboard icon standing in for the actor
    Billboard,
    /// Draw both the actor and its billboard icon
    ActorAndBillboard,
    /// Let the consumer decide; treated as `Actor` by the persistence layer
    Auto,
}

impl RenderMode {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            RenderMode::Actor => "Actor",
            RenderMode::Billboard => "Billboard",
            RenderMode::ActorAndBillboard => "Actor and Billboard",
            RenderMode::Auto => "Auto",
        }
    }

    /// Returns all render mode variants for UI enumeration
    pub fn all() -> &'static [RenderMode] {
        &[
            RenderMode::Actor,
            RenderMode::Billboard,
            RenderMode::ActorAndBillboard,
            RenderMode::Auto,
        ]
    }
}

/// A single persisted actor instance owned by a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProxy {
    /// Unique ID for this proxy, stable across save/load
    pub id: Uuid,
    /// Display name, not required to be unique
    pub name: String,
    /// Type used to re-create the actor through its plugin library
    pub actor_type: ActorType,
    /// How the scene layer should draw this proxy
    #[serde(default)]
    pub render_mode: RenderMode,
    /// Free-form property values keyed by property name
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ActorProxy {
    /// Create a proxy with a fresh ID, default render mode, and no properties
    pub fn new(name: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            actor_type,
            render_mode: RenderMode::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Set a property value, replacing any previous value
    pub fn set_property(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(name.into(), value);
    }

    /// Get a property value by name
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    /// Remove a property by name, returning its previous value
    pub fn remove_property(&mut self, name: &str) -> Option<serde_json::Value> {
        self.properties.remove(name)
    }
}
