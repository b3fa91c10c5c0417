//! Scene objects
//!
//! An [`Object`] is a node of the scene tree. It owns its transform, an
//! ordered list of components and (through the scene arena) an ordered list
//! of child objects. Ownership only flows downward; the parent link and the
//! scene link are plain ids that the scene rebuilds after every bulk load.
//!
//! Objects that are not yet part of a scene (`Pending`) hold their children
//! by value, which is how loaders and templates assemble whole subtrees
//! before handing them to [`Scene::spawn`](super::Scene::spawn).

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use smallvec::SmallVec;

use super::arena::ObjectId;
use super::component::{AsAny, Component, ComponentId, ComponentSlot};
use super::record::SceneError;
use super::transform::Transform;
use super::{SceneContext, SceneId};
use crate::reflect::registry;

/// Global counter for object instance ids
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Object behaviour
// ============================================================================

/// Polymorphic object type.
///
/// Registered object types are spawned by name and persisted under that
/// name. Hooks run before the object's own components.
pub trait ObjectBehavior: AsAny {
    /// Called once when the object becomes live.
    fn start(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// Called once per tick after `start`.
    fn update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {}

    /// Called once per tick while the scene is driven by the editor.
    fn editor_update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {}

    /// Serialize object-specific state to named fields.
    fn save(&self) -> Value {
        Value::Null
    }

    /// Restore object-specific state from named fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or malformed.
    fn load(&mut self, _fields: &Value) -> Result<(), SceneError> {
        Ok(())
    }
}

impl dyn ObjectBehavior {
    /// `TypeId` of the concrete behaviour.
    #[must_use]
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Downcast to a concrete behaviour.
    #[must_use]
    pub fn downcast_ref<T: ObjectBehavior>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete behaviour.
    pub fn downcast_mut<T: ObjectBehavior>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Behaviour of a plain object, registered as `"Object"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainObject;

impl ObjectBehavior for PlainObject {}

// ============================================================================
// Object state
// ============================================================================

/// Lifecycle state of an object relative to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Constructed, not part of any scene
    Pending,
    /// In a scene, waiting for the activation pass
    Staged,
    /// Started and receiving updates
    Live,
    /// Removed from its scene with its subtree intact
    Detached,
}

// ============================================================================
// Object
// ============================================================================

/// A node of the scene tree.
pub struct Object {
    name: String,
    instance_id: u64,
    transform: Transform,
    template_path: Option<String>,

    /// `None` only while a behaviour hook is running
    pub(crate) behavior: Option<Box<dyn ObjectBehavior>>,
    behavior_type: TypeId,

    pub(crate) components: Vec<ComponentSlot>,
    pub(crate) children: SmallVec<[ObjectId; 8]>,
    /// Children held by value until the object is spawned
    pub(crate) pending_children: Vec<Object>,

    pub(crate) parent: Option<ObjectId>,
    pub(crate) scene: Option<SceneId>,
    pub(crate) state: ObjectState,
    pub(crate) started: bool,
    pub(crate) pending_destroy: bool,
    /// A component was attached and has not been started yet
    pub(crate) needs_start: bool,
    /// Update pass that last visited this object
    pub(crate) last_update: u64,
}

impl Object {
    /// Create a plain object.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_behavior(name, PlainObject)
    }

    /// Create an object with a custom behaviour.
    #[must_use]
    pub fn with_behavior(name: impl Into<String>, behavior: impl ObjectBehavior) -> Self {
        Self::from_boxed_behavior(name, Box::new(behavior))
    }

    pub(crate) fn from_boxed_behavior(
        name: impl Into<String>,
        behavior: Box<dyn ObjectBehavior>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            transform: Transform::default(),
            template_path: None,
            behavior_type: behavior.concrete_type_id(),
            behavior: Some(behavior),
            components: Vec::new(),
            children: SmallVec::new(),
            pending_children: Vec::new(),
            parent: None,
            scene: None,
            state: ObjectState::Pending,
            started: false,
            pending_destroy: false,
            needs_start: false,
            last_update: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Builders for pending objects
    // -------------------------------------------------------------------------

    /// Attach a component (builder form).
    #[must_use]
    pub fn with_component(mut self, component: impl Component) -> Self {
        self.add_boxed_component(Box::new(component));
        self
    }

    /// Append a child (builder form).
    #[must_use]
    pub fn with_child(mut self, child: Object) -> Self {
        self.push_child(child);
        self
    }

    /// Set the transform (builder form).
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Append a child held by value.
    ///
    /// The child is inserted into the scene together with this object. On an
    /// object already in a scene, reached through
    /// [`Scene::object_mut`](super::Scene::object_mut), the child joins the
    /// scene when the guard is dropped.
    pub fn push_child(&mut self, child: Object) {
        self.pending_children.push(child);
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the instance.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Process-unique identity used to tag draw submissions.
    #[must_use]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Registered type name of the behaviour, if any.
    #[must_use]
    pub fn type_name(&self) -> Option<String> {
        registry::object_type_name(self.behavior_type)
    }

    /// Template file this object was instantiated from.
    #[must_use]
    pub fn template_path(&self) -> Option<&str> {
        self.template_path.as_deref()
    }

    /// Record the template file this object was instantiated from.
    pub fn set_template_path(&mut self, path: Option<String>) {
        self.template_path = path;
    }

    // -------------------------------------------------------------------------
    // Tree links
    // -------------------------------------------------------------------------

    /// Parent object, `None` for roots.
    #[must_use]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Children in update order.
    #[must_use]
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Children held by value (pending objects only).
    #[must_use]
    pub fn pending_children(&self) -> &[Object] {
        &self.pending_children
    }

    /// Scene this object is registered in.
    #[must_use]
    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Whether `start` has run on this object.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the object is marked for removal.
    #[must_use]
    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    // -------------------------------------------------------------------------
    // Transform
    // -------------------------------------------------------------------------

    /// The object's transform.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The object's transform, mutably.
    ///
    /// World matrices are refreshed by the next propagation pass.
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    // -------------------------------------------------------------------------
    // Behaviour
    // -------------------------------------------------------------------------

    /// Concrete behaviour, if it is a `T`.
    #[must_use]
    pub fn behavior<T: ObjectBehavior>(&self) -> Option<&T> {
        self.behavior.as_deref().and_then(|b| b.downcast_ref::<T>())
    }

    /// Concrete behaviour, mutably, if it is a `T`.
    pub fn behavior_mut<T: ObjectBehavior>(&mut self) -> Option<&mut T> {
        self.behavior.as_deref_mut().and_then(|b| b.downcast_mut::<T>())
    }

    pub(crate) fn behavior_dyn(&self) -> Option<&dyn ObjectBehavior> {
        self.behavior.as_deref()
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    /// Fetch the component of type `T`, creating it if absent.
    ///
    /// At most one component per type is created through this entry point.
    /// A new component is started at the next activation boundary. Returns
    /// `None` only when the existing `T` is the component whose callback is
    /// currently running.
    pub fn add_component<T: Component + Default>(&mut self) -> Option<&mut T> {
        let index = match self.slot_index_of(TypeId::of::<T>()) {
            Some(index) => index,
            None => {
                self.add_boxed_component(Box::new(T::default()));
                self.components.len() - 1
            }
        };
        self.components[index]
            .component
            .as_deref_mut()
            .and_then(|c| c.downcast_mut::<T>())
    }

    /// Attach an already constructed component.
    ///
    /// Unlike [`add_component`](Self::add_component) this always appends.
    pub fn add_boxed_component(&mut self, component: Box<dyn Component>) -> ComponentId {
        let slot = ComponentSlot::new(component);
        let id = slot.id;
        self.components.push(slot);
        self.needs_start = true;
        id
    }

    /// Attach a component resolved through the type registry.
    ///
    /// Logs an error and attaches nothing when `name` is not registered.
    pub fn add_component_by_name(&mut self, name: &str) -> Option<ComponentId> {
        let component = registry::instantiate_component_by_name(name)?;
        Some(self.add_boxed_component(component))
    }

    /// First live component of type `T`.
    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .filter(|slot| slot.is_alive())
            .find_map(|slot| slot.component.as_deref()?.downcast_ref::<T>())
    }

    /// First live component of type `T`, mutably.
    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .filter(|slot| slot.is_alive())
            .find_map(|slot| slot.component.as_deref_mut()?.downcast_mut::<T>())
    }

    /// First live component accepted by `predicate`.
    ///
    /// Used for capability queries spanning several concrete types.
    pub fn find_component(
        &self,
        mut predicate: impl FnMut(&dyn Component) -> bool,
    ) -> Option<&dyn Component> {
        self.components
            .iter()
            .filter(|slot| slot.is_alive())
            .filter_map(|slot| slot.component.as_deref())
            .find(|c| predicate(*c))
    }

    /// Id of the first live component of type `T`.
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.slot_index_of(TypeId::of::<T>())
            .map(|index| self.components[index].id)
    }

    /// Component by id.
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|slot| slot.id == id)
            .and_then(|slot| slot.component.as_deref())
    }

    /// Live components in attach order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &dyn Component)> {
        self.components
            .iter()
            .filter(|slot| slot.is_alive())
            .filter_map(|slot| Some((slot.id, slot.component.as_deref()?)))
    }

    /// Ids of live components in attach order.
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .filter(|slot| slot.is_alive())
            .map(|slot| slot.id)
            .collect()
    }

    /// Number of live components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.iter().filter(|slot| slot.is_alive()).count()
    }

    /// Whether component `id` has been started.
    #[must_use]
    pub fn is_component_started(&self, id: ComponentId) -> bool {
        self.components
            .iter()
            .any(|slot| slot.id == id && slot.started)
    }

    /// Remove a component.
    ///
    /// Objects outside a scene drop it right away. Inside a scene the
    /// component is only marked; it stops receiving callbacks and is removed
    /// at the end of the current update pass over this object.
    pub fn destroy_component(&mut self, id: ComponentId) -> bool {
        let Some(index) = self.components.iter().position(|slot| slot.id == id) else {
            log::warn!("Object '{}' has no component {:?}", self.name, id);
            return false;
        };

        if self.scene.is_none() {
            self.components.remove(index);
        } else {
            self.components[index].pending_destroy = true;
        }
        true
    }

    /// Physically drop components marked for removal.
    ///
    /// Scans back to front so that erasing keeps the remaining indices valid.
    pub(crate) fn sweep_components(&mut self) -> Vec<ComponentId> {
        let mut removed = Vec::new();
        for index in (0..self.components.len()).rev() {
            let slot = &self.components[index];
            // A component lent out to a running callback is swept later
            if slot.pending_destroy && slot.component.is_some() {
                removed.push(self.components.remove(index).id);
            }
        }
        removed
    }

    fn slot_index_of(&self, type_id: TypeId) -> Option<usize> {
        self.components
            .iter()
            .position(|slot| slot.is_alive() && slot.type_id == type_id)
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("state", &self.state)
            .field("components", &self.components.len())
            .field("children", &self.children)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
