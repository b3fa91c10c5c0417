//! Built-in component types
//!
//! All of them are registered by [`register_builtin_types`] and persist as
//! named fields with defaults, so older files keep loading when fields are
//! added.
//!
//! [`register_builtin_types`]: crate::reflect::register_builtin_types

mod motion;
mod visual;

pub use motion::{Lifetime, Velocity};
pub use visual::{MeshRenderer, Sprite, Text};
