//! Process-wide type registry
//!
//! Maps stable type names to factories for object behaviours, components
//! and resources. These names are the wire format for polymorphic
//! instantiation: scene files and editor menus refer to types only by the
//! names registered here.
//!
//! The tables follow a write-then-read discipline. Registration happens
//! during startup (see [`register_builtin_types`]); after that the tables are
//! only read. A name can be registered once; a second registration is
//! reported and the first factory is kept.

use std::any::{Any, TypeId};
use std::path::Path;
use std::sync::{Once, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;

use crate::assets::{Resource, ResourceError};
use crate::scene::{Component, Object, ObjectBehavior};

/// Factory for a registered object type
pub type ObjectFactory = fn() -> Object;
/// Factory for a registered component type
pub type ComponentFactory = fn() -> Box<dyn Component>;
/// Loader for a registered resource type
pub type ResourceLoader = fn(&Path) -> Result<Box<dyn Any + Send + Sync>, ResourceError>;

/// Errors reported by registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The name is already taken in that table
    #[error("{kind} type '{name}' is already registered")]
    DuplicateName {
        /// "object", "component" or "resource"
        kind: &'static str,
        /// The duplicated name
        name: String,
    },
    /// The concrete type is already registered under another name
    #[error("{kind} type is already registered as '{existing}'")]
    DuplicateType {
        /// "object", "component" or "resource"
        kind: &'static str,
        /// Name the type was first registered under
        existing: String,
    },
}

/// Metadata kept for a registered resource type
#[derive(Debug, Clone)]
pub struct ResourceTypeInfo {
    /// Registered name
    pub name: String,
    /// Canonical file extension, without the dot
    pub extension: String,
    /// Loader producing the type-erased resource
    pub loader: ResourceLoader,
}

/// One name → factory table with a reverse `TypeId` → name index
struct Table<F> {
    factories: FxHashMap<String, F>,
    names: FxHashMap<TypeId, String>,
}

impl<F> Default for Table<F> {
    fn default() -> Self {
        Self {
            factories: FxHashMap::default(),
            names: FxHashMap::default(),
        }
    }
}

impl<F> Table<F> {
    fn insert(
        &mut self,
        kind: &'static str,
        name: &str,
        type_id: TypeId,
        factory: F,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        if let Some(existing) = self.names.get(&type_id) {
            return Err(RegistryError::DuplicateType {
                kind,
                existing: existing.clone(),
            });
        }
        self.factories.insert(name.to_string(), factory);
        self.names.insert(type_id, name.to_string());
        Ok(())
    }

    fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Default)]
struct TypeRegistry {
    objects: Table<ObjectFactory>,
    components: Table<ComponentFactory>,
    resources: Table<ResourceTypeInfo>,
}

static REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn read() -> RwLockReadGuard<'static, TypeRegistry> {
    // Built-in registration only writes, so this never re-enters itself
    register_builtin_types();
    REGISTRY
        .get_or_init(RwLock::default)
        .read()
        .unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, TypeRegistry> {
    REGISTRY
        .get_or_init(RwLock::default)
        .write()
        .unwrap_or_else(PoisonError::into_inner)
}

fn report(result: Result<(), RegistryError>, kind: &str, name: &str) -> Result<(), RegistryError> {
    match &result {
        Ok(()) => log::debug!("{name} {kind} registered"),
        Err(e) => log::error!("{e}"),
    }
    result
}

// ============================================================================
// Registration
// ============================================================================

fn make_object<T: ObjectBehavior + Default>() -> Object {
    Object::from_boxed_behavior("", Box::new(T::default()))
}

fn make_component<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

fn load_resource<T: Resource>(path: &Path) -> Result<Box<dyn Any + Send + Sync>, ResourceError> {
    Ok(Box::new(T::load(path)?))
}

/// Register an object behaviour under `name`.
///
/// # Errors
///
/// Returns an error if the name or the type is already registered
pub fn register_object_type<T: ObjectBehavior + Default>(name: &str) -> Result<(), RegistryError> {
    let result = write()
        .objects
        .insert("object", name, TypeId::of::<T>(), make_object::<T>);
    report(result, "object", name)
}

/// Register a component type under `name`.
///
/// # Errors
///
/// Returns an error if the name or the type is already registered
pub fn register_component_type<T: Component + Default>(name: &str) -> Result<(), RegistryError> {
    let result =
        write()
            .components
            .insert("component", name, TypeId::of::<T>(), make_component::<T>);
    report(result, "component", name)
}

/// Register a resource type under `name` with its canonical file extension.
///
/// # Errors
///
/// Returns an error if the name or the type is already registered
pub fn register_resource_type<T: Resource>(name: &str, extension: &str) -> Result<(), RegistryError> {
    let info = ResourceTypeInfo {
        name: name.to_string(),
        extension: extension.trim_start_matches('.').to_string(),
        loader: load_resource::<T>,
    };
    let result = write()
        .resources
        .insert("resource", name, TypeId::of::<T>(), info);
    report(result, "resource", name)
}

// ============================================================================
// Instantiation
// ============================================================================

/// Create an object of the registered type `name`.
///
/// The new object is named after its type. Logs an error and returns
/// `None` for unregistered names.
#[must_use]
pub fn instantiate_object_by_name(name: &str) -> Option<Object> {
    let factory = read().objects.factories.get(name).copied();
    let Some(factory) = factory else {
        log::error!("Attempting to instantiate unregistered object type '{name}'");
        return None;
    };
    let mut object = factory();
    object.set_name(name);
    Some(object)
}

/// Create a component of the registered type `name`.
///
/// Logs an error and returns `None` for unregistered names.
#[must_use]
pub fn instantiate_component_by_name(name: &str) -> Option<Box<dyn Component>> {
    let factory = read().components.factories.get(name).copied();
    let Some(factory) = factory else {
        log::error!("Attempting to instantiate unregistered component type '{name}'");
        return None;
    };
    Some(factory())
}

/// Load a file with the loader of the resource type registered for its
/// extension.
///
/// Returns the resource type name with the loaded value. Unknown extensions
/// and load failures are logged and yield `None`.
#[must_use]
pub fn instantiate_resource_from_file(path: &Path) -> Option<(String, Box<dyn Any + Send + Sync>)> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let Some(info) = resource_type_for_extension(extension) else {
        log::error!("No resource type registered for '{}'", path.display());
        return None;
    };
    match (info.loader)(path) {
        Ok(resource) => Some((info.name, resource)),
        Err(e) => {
            log::warn!("Failed to load {} '{}': {e}", info.name, path.display());
            None
        }
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Registered name of the object behaviour with `type_id`.
#[must_use]
pub fn object_type_name(type_id: TypeId) -> Option<String> {
    read().objects.names.get(&type_id).cloned()
}

/// Registered name of the component type with `type_id`.
#[must_use]
pub fn component_type_name(type_id: TypeId) -> Option<String> {
    read().components.names.get(&type_id).cloned()
}

/// Registered name of the component type `T`.
#[must_use]
pub fn component_type_name_of<T: Component>() -> Option<String> {
    component_type_name(TypeId::of::<T>())
}

/// Resource type registered for `extension` (with or without the dot).
#[must_use]
pub fn resource_type_for_extension(extension: &str) -> Option<ResourceTypeInfo> {
    let extension = extension.trim_start_matches('.');
    read()
        .resources
        .factories
        .values()
        .find(|info| info.extension == extension)
        .cloned()
}

/// Canonical file extension of the resource type `name`.
#[must_use]
pub fn resource_extension(name: &str) -> Option<String> {
    read()
        .resources
        .factories
        .get(name)
        .map(|info| info.extension.clone())
}

/// Canonical file extension of the resource type `T`.
#[must_use]
pub fn resource_extension_of<T: Resource>() -> Option<String> {
    let registry = read();
    let name = registry.resources.names.get(&TypeId::of::<T>())?;
    registry
        .resources
        .factories
        .get(name)
        .map(|info| info.extension.clone())
}

/// All registered object type names, sorted.
#[must_use]
pub fn registered_object_types() -> Vec<String> {
    read().objects.sorted_names()
}

/// All registered component type names, sorted.
#[must_use]
pub fn registered_component_types() -> Vec<String> {
    read().components.sorted_names()
}

/// All registered resource type names, sorted.
#[must_use]
pub fn registered_resource_types() -> Vec<String> {
    read().resources.sorted_names()
}

// ============================================================================
// Built-in types
// ============================================================================

/// Register the engine's own types. Safe to call any number of times.
pub fn register_builtin_types() {
    static BUILTINS: Once = Once::new();

    BUILTINS.call_once(|| {
        use crate::assets::ObjectTemplate;
        use crate::components::{Lifetime, MeshRenderer, Sprite, Text, Velocity};
        use crate::scene::{PlainObject, SceneRecord};

        let results = [
            register_object_type::<PlainObject>(crate::scene::DEFAULT_OBJECT_TYPE),
            register_component_type::<Sprite>("Sprite"),
            register_component_type::<MeshRenderer>("MeshRenderer"),
            register_component_type::<Text>("Text"),
            register_component_type::<Velocity>("Velocity"),
            register_component_type::<Lifetime>("Lifetime"),
            register_resource_type::<SceneRecord>("Scene", "scn"),
            register_resource_type::<ObjectTemplate>("ObjectTemplate", "jobj"),
        ];

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            log::warn!("{failed} built-in types were already registered");
        }
        log::debug!("Built-in types registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::record::SceneError;
    use serde_json::Value;

    #[derive(Default)]
    struct Tagged {
        tag: String,
    }

    impl Component for Tagged {
        fn load(&mut self, fields: &Value) -> Result<(), SceneError> {
            self.tag = fields["tag"].as_str().unwrap_or_default().to_string();
            Ok(())
        }
    }

    #[derive(Default)]
    struct Boss;

    impl ObjectBehavior for Boss {}

    fn register_test_types() {
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            register_builtin_types();
            register_component_type::<Tagged>("RegistryTestTagged").unwrap();
            register_object_type::<Boss>("RegistryTestBoss").unwrap();
        });
    }

    #[test]
    fn test_instantiate_component_by_name() {
        register_test_types();

        let component = instantiate_component_by_name("RegistryTestTagged");
        assert!(component.is_some_and(|c| c.is::<Tagged>()));
        assert_eq!(
            component_type_name_of::<Tagged>().as_deref(),
            Some("RegistryTestTagged")
        );
    }

    #[test]
    fn test_instantiate_object_by_name() {
        register_test_types();

        let object = instantiate_object_by_name("RegistryTestBoss").unwrap();
        assert_eq!(object.name(), "RegistryTestBoss");
        assert!(object.behavior::<Boss>().is_some());
        assert_eq!(object.type_name().as_deref(), Some("RegistryTestBoss"));
    }

    #[test]
    fn test_unregistered_names_yield_nothing() {
        register_test_types();

        assert!(instantiate_component_by_name("NeverRegistered").is_none());
        assert!(instantiate_object_by_name("NeverRegistered").is_none());
        assert!(resource_extension("NeverRegistered").is_none());
    }

    #[test]
    fn test_duplicate_registration_is_reported() {
        register_test_types();

        let result = register_component_type::<Tagged>("RegistryTestTagged");
        assert!(matches!(result, Err(RegistryError::DuplicateName { .. })));

        let result = register_component_type::<Tagged>("RegistryTestTaggedAlias");
        assert!(matches!(result, Err(RegistryError::DuplicateType { .. })));

        // The first registration still resolves
        assert!(instantiate_component_by_name("RegistryTestTagged").is_some());
        assert!(instantiate_component_by_name("RegistryTestTaggedAlias").is_none());
    }

    #[test]
    fn test_instantiate_resource_from_file_uses_extension() {
        register_test_types();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("arena.scn");
        std::fs::write(&file, r#"{ "name": "Arena" }"#).unwrap();

        let (name, resource) = instantiate_resource_from_file(&file).unwrap();
        assert_eq!(name, "Scene");
        let record = resource.downcast_ref::<crate::scene::SceneRecord>().unwrap();
        assert_eq!(record.name, "Arena");

        assert!(instantiate_resource_from_file(&dir.path().join("notes.txt")).is_none());
        assert!(instantiate_resource_from_file(&dir.path().join("missing.scn")).is_none());
    }

    #[test]
    fn test_builtin_types_listed() {
        register_test_types();

        let components = registered_component_types();
        assert!(components.contains(&"Sprite".to_string()));
        assert!(components.contains(&"Velocity".to_string()));
        assert!(registered_object_types().contains(&"Object".to_string()));
        assert_eq!(resource_extension("Scene").as_deref(), Some("scn"));
        assert_eq!(
            resource_type_for_extension(".jobj").map(|info| info.name).as_deref(),
            Some("ObjectTemplate")
        );
    }
}
