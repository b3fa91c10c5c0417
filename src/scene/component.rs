//! Component trait and per-object component storage
//!
//! A component is a polymorphic unit of behaviour attached to exactly one
//! object. The owning object stores it in a [`ComponentSlot`]; while one of
//! its callbacks runs, the component is lent out of the slot so that the
//! callback can freely mutate the rest of the scene through its
//! [`SceneContext`].
//!
//! Lifecycle of a component:
//!
//! 1. constructed (by a registered factory or directly) and attached
//! 2. `start` once, at the next activation boundary of the scene
//! 3. `update(dt)` once per tick until destroyed
//! 4. removed at the end of the update pass over its object after `destroy`

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SceneContext;
use super::record::SceneError;

/// Global counter for component ids
static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Type erasure helpers
// ============================================================================

/// Access to the concrete type behind a trait object.
///
/// Implemented for every `'static` type; never call it on a `Box`, only on
/// the `dyn` value itself.
pub trait AsAny: Any {
    /// Borrow as `dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Component Id
// ============================================================================

/// Process-unique identity of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(u64);

impl ComponentId {
    pub(crate) fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// ============================================================================
// Component trait
// ============================================================================

/// Behaviour attached to an object.
///
/// Every hook has a no-op default. Persistent components override
/// [`save`](Component::save) / [`load`](Component::load) with named fields;
/// the helpers in [`record`](super::record) turn a serde struct with
/// `#[serde(default)]` into such a record.
pub trait Component: AsAny {
    /// Called once before the first update.
    fn start(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// Called once per tick after `start`.
    fn update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {}

    /// Called once per tick while the scene is driven by the editor.
    fn editor_update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {}

    /// Called when the editor draws selection gizmos.
    fn editor_gizmo(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// Serialize state to named fields.
    fn save(&self) -> Value {
        Value::Null
    }

    /// Restore state from named fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or has the wrong type.
    fn load(&mut self, _fields: &Value) -> Result<(), SceneError> {
        Ok(())
    }
}

impl dyn Component {
    /// `TypeId` of the concrete component type.
    #[must_use]
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Check whether the concrete type is `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete component type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete component type.
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("type_id", &self.concrete_type_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Component Slot
// ============================================================================

/// Storage for one attached component.
#[derive(Debug)]
pub(crate) struct ComponentSlot {
    pub(crate) id: ComponentId,
    /// Concrete type, readable while the component is lent out
    pub(crate) type_id: TypeId,
    /// `None` while one of the component's own callbacks is running
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) started: bool,
    pub(crate) pending_destroy: bool,
}

impl ComponentSlot {
    pub(crate) fn new(component: Box<dyn Component>) -> Self {
        Self {
            id: ComponentId::next(),
            type_id: component.concrete_type_id(),
            component: Some(component),
            started: false,
            pending_destroy: false,
        }
    }

    /// Whether the slot still takes part in queries and updates.
    pub(crate) fn is_alive(&self) -> bool {
        !self.pending_destroy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Marker {
        value: i32,
    }

    impl Component for Marker {}

    #[derive(Default)]
    struct Other;

    impl Component for Other {}

    #[test]
    fn test_downcast_through_box() {
        let mut boxed: Box<dyn Component> = Box::new(Marker { value: 3 });

        assert!(boxed.is::<Marker>());
        assert!(!boxed.is::<Other>());
        assert_eq!(boxed.downcast_ref::<Marker>().map(|m| m.value), Some(3));

        if let Some(marker) = boxed.downcast_mut::<Marker>() {
            marker.value = 9;
        }
        assert_eq!(boxed.downcast_ref::<Marker>().map(|m| m.value), Some(9));
    }

    #[test]
    fn test_slot_records_concrete_type() {
        let slot = ComponentSlot::new(Box::new(Other));
        assert_eq!(slot.type_id, TypeId::of::<Other>());
        assert!(!slot.started);
        assert!(slot.is_alive());
    }

    #[test]
    fn test_component_ids_unique() {
        let a = ComponentId::next();
        let b = ComponentId::next();
        assert_ne!(a, b);
    }
}
