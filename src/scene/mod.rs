//! Scene graph
//!
//! Objects, components, transforms and the scene that drives their
//! lifecycle. Objects live in a generational [`Arena`] owned by the
//! [`Scene`] and are addressed by [`ObjectId`]; components live inside their
//! object and are addressed by [`ComponentId`].

mod arena;
mod component;
mod context;
mod object;
pub mod record;
#[allow(clippy::module_inception)]
mod scene;
mod transform;

use std::sync::atomic::{AtomicU64, Ordering};

pub use arena::{Arena, ObjectId};
pub use component::{AsAny, Component, ComponentId};
pub use context::{ObjectMut, SceneContext};
pub use object::{Object, ObjectBehavior, ObjectState, PlainObject};
pub use record::{
    ComponentRecord, DEFAULT_OBJECT_TYPE, ObjectRecord, SCENE_FORMAT_VERSION, SceneError,
    SceneFormat, SceneRecord,
};
pub use scene::{Scene, SceneHooks};
pub use transform::Transform;

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

impl SceneId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}
