//! Persisted scene records
//!
//! Scenes and object templates are stored as plain serde records in JSON or
//! RON (Rusty Object Notation). Objects and components are identified by
//! their registered type names; component state is a map of named fields,
//! so fields can be added or removed without breaking older files.
//!
//! Only owning links are persisted (object → children, object →
//! components). Parent and owner back-references and world matrices are
//! rebuilt when the record is spawned into a scene.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::object::Object;
use super::transform::Transform;
use crate::reflect::registry;

/// Current version written to scene and template files.
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Type name used for objects whose record omits one.
pub const DEFAULT_OBJECT_TYPE: &str = "Object";

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during scene operations
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// A record names a type that is not registered
    #[error("Unknown {kind} type '{name}'")]
    UnknownType {
        /// "object" or "component"
        kind: &'static str,
        /// The unregistered name
        name: String,
    },
    /// A record was written by a newer format version
    #[error("Unsupported scene format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
    /// The referenced object does not exist in the scene
    #[error("No such object: {0}")]
    NoSuchObject(String),
}

// ============================================================================
// File format
// ============================================================================

/// Text format of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SceneFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Pretty-printed RON
    Ron,
}

impl SceneFormat {
    /// Pick the format for `path` by extension, sniffing the content for
    /// engine extensions (`.scn`, `.jobj`) shared by both formats.
    #[must_use]
    pub fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            Some("ron") => Self::Ron,
            _ if content.trim_start().starts_with('{') => Self::Json,
            _ => Self::Ron,
        }
    }

    /// Serialize `value` to a string in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_text<T: Serialize>(self, value: &T) -> Result<String, SceneError> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| SceneError::Serialize(e.to_string())),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| SceneError::Serialize(e.to_string())),
        }
    }

    /// Deserialize `content` in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, SceneError> {
        match self {
            Self::Json => {
                serde_json::from_str(content).map_err(|e| SceneError::Deserialize(e.to_string()))
            }
            Self::Ron => ron::from_str(content).map_err(|e| SceneError::Deserialize(e.to_string())),
        }
    }
}

/// Read and parse a record file, detecting its format.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub fn read_record<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, SceneError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    SceneFormat::detect(path, &content).parse(&content)
}

/// Serialize and write a record file.
///
/// # Errors
///
/// Returns an error if serialization fails or the file cannot be written
pub fn write_record<T: Serialize>(
    path: impl AsRef<Path>,
    record: &T,
    format: SceneFormat,
) -> Result<(), SceneError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, format.to_text(record)?)?;
    Ok(())
}

// ============================================================================
// Named-field helpers
// ============================================================================

/// Turn component or object state into a named-field record.
///
/// Serialization failures are logged and produce an empty record.
#[must_use]
pub fn save_fields<T: Serialize>(state: &T) -> Value {
    serde_json::to_value(state).unwrap_or_else(|e| {
        log::error!("Failed to serialize fields: {e}");
        Value::Null
    })
}

/// Rebuild state from a named-field record.
///
/// A missing record (`null`) is treated as an empty one, so every field
/// falls back to its serde default.
///
/// # Errors
///
/// Returns an error if a required field is missing or has the wrong type
pub fn load_fields<T: DeserializeOwned>(fields: &Value) -> Result<T, SceneError> {
    let fields = if fields.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        fields.clone()
    };
    serde_json::from_value(fields).map_err(|e| SceneError::Deserialize(e.to_string()))
}

// ============================================================================
// Records
// ============================================================================

fn default_version() -> u32 {
    SCENE_FORMAT_VERSION
}

fn default_object_type() -> String {
    DEFAULT_OBJECT_TYPE.to_string()
}

/// A persisted component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Registered component type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type-specific named fields
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub fields: Value,
}

/// A persisted object with its components and children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Registered object type name
    #[serde(rename = "type", default = "default_object_type")]
    pub type_name: String,
    /// Instance name
    pub name: String,
    /// Local transform
    #[serde(default)]
    pub transform: Transform,
    /// Template file the object was instantiated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    /// Object-specific named fields
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub fields: Value,
    /// Components in attach order
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    /// Children in update order
    #[serde(default)]
    pub children: Vec<ObjectRecord>,
}

impl ObjectRecord {
    /// Capture a pending object tree.
    ///
    /// Unregistered component types are skipped with a warning.
    #[must_use]
    pub fn from_object(object: &Object) -> Self {
        Self::capture(object, object.pending_children().iter().map(Self::from_object).collect())
    }

    /// Capture one object with already captured children.
    pub(crate) fn capture(object: &Object, children: Vec<ObjectRecord>) -> Self {
        let type_name = object.type_name().unwrap_or_else(|| {
            log::warn!(
                "Object '{}' has an unregistered type, saving as '{DEFAULT_OBJECT_TYPE}'",
                object.name()
            );
            default_object_type()
        });

        let components = object
            .components()
            .filter_map(|(_, component)| {
                let Some(type_name) = registry::component_type_name(component.concrete_type_id())
                else {
                    log::warn!(
                        "Skipping unregistered component on '{}' while saving",
                        object.name()
                    );
                    return None;
                };
                Some(ComponentRecord {
                    type_name,
                    fields: component.save(),
                })
            })
            .collect();

        Self {
            type_name,
            name: object.name().to_string(),
            transform: object.transform().clone(),
            template_path: object.template_path().map(str::to_string),
            fields: object.behavior_dyn().map_or(Value::Null, |b| b.save()),
            components,
            children,
        }
    }

    /// Build a pending object tree from this record.
    ///
    /// Unknown or malformed components are logged and skipped. A child that
    /// fails to instantiate is logged and dropped with its subtree, so one
    /// bad record never aborts its siblings.
    ///
    /// # Errors
    ///
    /// Returns an error if this object's type is unknown or its own fields
    /// are malformed
    pub fn instantiate(&self) -> Result<Object, SceneError> {
        let mut object = registry::instantiate_object_by_name(&self.type_name).ok_or_else(|| {
            SceneError::UnknownType {
                kind: "object",
                name: self.type_name.clone(),
            }
        })?;

        object.set_name(self.name.clone());
        *object.transform_mut() = self.transform.clone();
        object.set_template_path(self.template_path.clone());

        if let Some(behavior) = object.behavior.as_deref_mut() {
            behavior.load(&self.fields)?;
        }

        for record in &self.components {
            let Some(mut component) = registry::instantiate_component_by_name(&record.type_name)
            else {
                continue;
            };
            match component.load(&record.fields) {
                Ok(()) => {
                    object.add_boxed_component(component);
                }
                Err(e) => log::error!(
                    "Dropping component '{}' on '{}': {e}",
                    record.type_name,
                    self.name
                ),
            }
        }

        for child in &self.children {
            match child.instantiate() {
                Ok(child) => object.push_child(child),
                Err(e) => log::error!("Dropping child '{}' of '{}': {e}", child.name, self.name),
            }
        }

        Ok(object)
    }

    /// Load a standalone object template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        read_record(path)
    }

    /// Save as a standalone object template file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn save(&self, path: impl AsRef<Path>, format: SceneFormat) -> Result<(), SceneError> {
        write_record(path, self, format)
    }
}

/// A persisted scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene name
    pub name: String,
    /// Format version for compatibility
    #[serde(default = "default_version")]
    pub version: u32,
    /// Root objects in update order
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

impl SceneRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: SCENE_FORMAT_VERSION,
            objects: Vec::new(),
        }
    }

    /// Load a scene record, rejecting newer format versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is too new
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let record: Self = read_record(path)?;
        if record.version > SCENE_FORMAT_VERSION {
            return Err(SceneError::UnsupportedVersion {
                found: record.version,
                supported: SCENE_FORMAT_VERSION,
            });
        }
        Ok(record)
    }

    /// Save the record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn save(&self, path: impl AsRef<Path>, format: SceneFormat) -> Result<(), SceneError> {
        write_record(path, self, format)
    }

    /// Number of objects in the whole tree.
    #[must_use]
    pub fn object_count(&self) -> usize {
        fn count(record: &ObjectRecord) -> usize {
            1 + record.children.iter().map(count).sum::<usize>()
        }
        self.objects.iter().map(count).sum()
    }
}
