//! Resource types and descriptors
//!
//! Resources are typed, named on-disk assets cataloged under one directory
//! per resource data type. A `ResourceDescriptor` identifies a cataloged
//! resource independently of the platform path separator.

use serde::{Deserialize, Serialize};

/// Separator used inside resource identifiers instead of a path separator
pub const DESCRIPTOR_SEPARATOR: char = ':';

/// Data types known to the property and resource systems
///
/// Only some variants are resource-capable; the primitive kinds exist for
/// property typing and are rejected by every resource operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    /// Unset/unusable type
    Unknown,
    /// Boolean property value
    Boolean,
    /// Integer property value
    Int,
    /// Floating-point property value
    Float,
    /// String property value
    String,
    /// 3-component vector property value
    Vec3,
    /// Audio clip resource
    Sound,
    /// Non-animated mesh resource
    StaticMesh,
    /// Rigged, animatable mesh resource
    SkeletalMesh,
    /// Terrain data resource
    Terrain,
    /// Image resource
    Texture,
    /// Particle system definition resource
    ParticleSystem,
    /// Reusable actor-group definition resource
    Prefab,
    /// Shader program resource
    Shader,
    /// Scripted logic graph resource
    Director,
}

impl DataType {
    /// Whether this type names an on-disk asset kind
    pub fn is_resource(&self) -> bool {
        self.directory_name().is_some()
    }

    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            DataType::Unknown => "Unknown",
            DataType::Boolean => "Boolean",
            DataType::Int => "Int",
            DataType::Float => "Float",
            DataType::String => "String",
            DataType::Vec3 => "Vec3",
            DataType::Sound => "Sound",
            DataType::StaticMesh => "Static Mesh",
            DataType::SkeletalMesh => "Skeletal Mesh",
            DataType::Terrain => "Terrain",
            DataType::Texture => "Texture",
            DataType::ParticleSystem => "Particle System",
            DataType::Prefab => "Prefab",
            DataType::Shader => "Shader",
            DataType::Director => "Director",
        }
    }

    /// Directory under the context root holding this kind of resource
    pub fn directory_name(&self) -> Option<&'static str> {
        match self {
            DataType::Sound => Some("Sounds"),
            DataType::StaticMesh => Some("StaticMeshes"),
            DataType::SkeletalMesh => Some("SkeletalMeshes"),
            DataType::Terrain => Some("Terrains"),
            DataType::Texture => Some("Textures"),
            DataType::ParticleSystem => Some("Particles"),
            DataType::Prefab => Some("Prefabs"),
            DataType::Shader => Some("Shaders"),
            DataType::Director => Some("Directors"),
            _ => None,
        }
    }

    /// File extensions (lowercase, no dot) accepted for this resource kind
    pub fn handled_extensions(&self) -> &'static [&'static str] {
        match self {
            DataType::Sound => &["wav", "ogg", "flac", "aiff"],
            DataType::StaticMesh => &["obj", "gltf", "glb", "fbx", "dae"],
            DataType::SkeletalMesh => &["gltf", "glb", "fbx"],
            DataType::Terrain => &["terrain", "hgt"],
            DataType::Texture => &["png", "jpg", "jpeg", "tga", "dds", "bmp"],
            DataType::ParticleSystem => &["particle"],
            DataType::Prefab => &["prefab"],
            DataType::Shader => &["wgsl", "glsl", "vert", "frag"],
            DataType::Director => &["director"],
            _ => &[],
        }
    }

    /// Whether a file extension (without dot) is accepted for this kind
    pub fn handles_extension(&self, extension: &str) -> bool {
        let lower = extension.to_lowercase();
        self.handled_extensions().contains(&lower.as_str())
    }

    /// All resource-capable types, in catalog order
    pub fn resource_types() -> &'static [DataType] {
        &[
            DataType::Sound,
            DataType::StaticMesh,
            DataType::SkeletalMesh,
            DataType::Terrain,
            DataType::Texture,
            DataType::ParticleSystem,
            DataType::Prefab,
            DataType::Shader,
            DataType::Director,
        ]
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Identifies a cataloged resource: a display name plus a `:`-separated
/// identifier of the form `TypeDir:category:...:file.ext`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Human-readable name shown in browsers and pickers
    pub display_name: String,
    /// Location-encoding identifier, portable across platforms
    pub identifier: String,
}

impl ResourceDescriptor {
    /// Create a descriptor from a display name and identifier
    pub fn new(display_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            identifier: identifier.into(),
        }
    }

    /// Relative path of the resource under the context root
    pub fn relative_path(&self) -> String {
        self.identifier.replace(DESCRIPTOR_SEPARATOR, "/")
    }

    /// Resource data type derived from the identifier's leading segment
    pub fn data_type(&self) -> Option<DataType> {
        let first = self.identifier.split(DESCRIPTOR_SEPARATOR).next()?;
        DataType::resource_types()
            .iter()
            .copied()
            .find(|t| t.directory_name() == Some(first))
    }

    /// Category portion of the identifier (segments between type and file)
    pub fn category(&self) -> String {
        let segments: Vec<&str> = self.identifier.split(DESCRIPTOR_SEPARATOR).collect();
        if segments.len() <= 2 {
            String::new()
        } else {
            segments[1..segments.len() - 1].join(&DESCRIPTOR_SEPARATOR.to_string())
        }
    }

    /// File name portion of the identifier
    pub fn file_name(&self) -> &str {
        self.identifier
            .rsplit(DESCRIPTOR_SEPARATOR)
            .next()
            .unwrap_or(&self.identifier)
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)
    }
}
