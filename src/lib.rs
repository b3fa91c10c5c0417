//! A scene-graph runtime for games and editors
//!
//! This engine provides:
//! - A tree of objects with polymorphic components and a deterministic
//!   start/update/destroy lifecycle
//! - Name-based type registration for objects, components and resources
//! - Hierarchical transforms with world-matrix propagation
//! - Scene and object-template persistence in JSON or RON

pub mod assets;
pub mod components;
pub mod core;
pub mod reflect;
pub mod render;
pub mod scene;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{AssetHandle, ObjectTemplate, Resource, Resources};
    pub use crate::components::{Lifetime, MeshRenderer, Sprite, Text, Velocity};
    pub use crate::core::{Engine, EngineConfig, FrameStats, Game, RunMode, TickStats, Time};
    pub use crate::reflect::{register_builtin_types, register_component_type, register_object_type};
    pub use crate::render::{DrawCommand, DrawQueue};
    pub use crate::scene::{
        Component, ComponentId, Object, ObjectBehavior, ObjectId, Scene, SceneContext,
        SceneError, SceneHooks, Transform,
    };
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
}
