//! Runtime type reflection
//!
//! Name-based instantiation of objects, components and resources, used by
//! scene deserialization and by editor "add new" menus.

pub mod registry;

pub use registry::{
    RegistryError, ResourceTypeInfo, instantiate_component_by_name, instantiate_object_by_name,
    register_builtin_types, register_component_type, register_object_type,
    register_resource_type,
};
