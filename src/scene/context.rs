//! Callback context and mutable object guard

use std::ops::{Deref, DerefMut};

use glam::Mat4;

use super::arena::ObjectId;
use super::component::{Component, ComponentId};
use super::object::{Object, ObjectBehavior};
use super::scene::Scene;
use super::transform::Transform;
use crate::assets::Resources;
use crate::render::{DrawCommand, DrawQueue};

// ============================================================================
// Scene context
// ============================================================================

/// What a lifecycle callback sees of the world.
///
/// Created by the scene for the duration of one `start`, `update` or gizmo
/// call. The component (or object behaviour) being called is lent out of
/// its slot, so every other part of the scene is reachable from here.
pub struct SceneContext<'a> {
    scene: &'a mut Scene,
    object: ObjectId,
    component: Option<ComponentId>,
}

impl<'a> SceneContext<'a> {
    pub(crate) fn new(scene: &'a mut Scene, object: ObjectId, component: Option<ComponentId>) -> Self {
        Self {
            scene,
            object,
            component,
        }
    }

    /// Object owning the running callback.
    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        self.object
    }

    /// Component whose callback is running, `None` for object behaviours.
    #[must_use]
    pub fn component_id(&self) -> Option<ComponentId> {
        self.component
    }

    /// Read access to the whole scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// The owning object.
    #[must_use]
    pub fn object(&self) -> Option<&Object> {
        self.scene.object(self.object)
    }

    /// Any object of the scene.
    #[must_use]
    pub fn object_by_id(&self, id: ObjectId) -> Option<&Object> {
        self.scene.object(id)
    }

    /// Any object of the scene, mutably.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<ObjectMut<'_>> {
        self.scene.object_mut(id)
    }

    /// Instance id of the owning object, used to tag draw submissions.
    #[must_use]
    pub fn instance_id(&self) -> u64 {
        self.object().map_or(0, Object::instance_id)
    }

    /// Owning object's transform.
    #[must_use]
    pub fn transform(&self) -> Option<&Transform> {
        self.object().map(Object::transform)
    }

    /// Owning object's transform, mutably.
    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.scene.transform_mut(self.object)
    }

    /// Current world matrix of the owning object.
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        self.scene.world_matrix(self.object).unwrap_or(Mat4::IDENTITY)
    }

    /// First object named `name`.
    #[must_use]
    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.scene.find_object_by_name(name)
    }

    // -------------------------------------------------------------------------
    // Components of the owning object
    // -------------------------------------------------------------------------

    /// Sibling component `T`.
    ///
    /// The component whose callback is running is not visible here.
    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.scene.get_component::<T>(self.object)
    }

    /// Sibling component `T`, mutably.
    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.scene.get_component_mut::<T>(self.object)
    }

    /// Fetch the sibling component `T`, creating it if absent.
    pub fn add_component<T: Component + Default>(&mut self) -> Option<&mut T> {
        self.scene.add_component::<T>(self.object)
    }

    /// Fetch a component this one depends on, creating it if absent.
    ///
    /// A created dependency is started at the next activation boundary,
    /// not in the middle of the running callback.
    pub fn add_dependency_component<T: Component + Default>(&mut self) -> Option<&mut T> {
        self.add_component::<T>()
    }

    /// Attach a component of the registered type `name`.
    pub fn add_component_by_name(&mut self, name: &str) -> Option<ComponentId> {
        self.scene.add_component_by_name(self.object, name)
    }

    // -------------------------------------------------------------------------
    // Destruction
    // -------------------------------------------------------------------------

    /// Destroy the running component, or the object when called from an
    /// object behaviour.
    pub fn destroy(&mut self) {
        match self.component {
            Some(component) => {
                self.scene.destroy_component(self.object, component);
            }
            None => self.scene.destroy_object(self.object),
        }
    }

    /// Destroy the owning object and its subtree.
    pub fn destroy_object(&mut self) {
        self.scene.destroy_object(self.object);
    }

    /// Destroy any object of the scene.
    pub fn destroy_other(&mut self, id: ObjectId) {
        self.scene.destroy_object(id);
    }

    /// Destroy a component of the owning object.
    pub fn destroy_component(&mut self, component: ComponentId) -> bool {
        self.scene.destroy_component(self.object, component)
    }

    // -------------------------------------------------------------------------
    // Spawning
    // -------------------------------------------------------------------------

    /// Stage an object; it starts at the next activation boundary.
    pub fn spawn(&mut self, object: Object) -> ObjectId {
        self.scene.spawn(object)
    }

    /// Spawn a root object with behaviour `T`.
    pub fn spawn_object<T: ObjectBehavior + Default>(&mut self) -> ObjectId {
        self.scene.spawn_object::<T>()
    }

    /// Spawn a root object of the registered type `type_name`.
    pub fn spawn_object_by_name(&mut self, type_name: &str) -> Option<ObjectId> {
        self.scene.spawn_object_by_name(type_name)
    }

    /// Spawn a plain root object named `name`.
    pub fn spawn_object_with_name(&mut self, name: &str) -> ObjectId {
        self.scene.spawn_object_with_name(name)
    }

    /// Spawn an object with behaviour `T` under the owning object.
    pub fn spawn_child_object<T: ObjectBehavior + Default>(&mut self) -> Option<ObjectId> {
        self.scene.spawn_child_object::<T>(self.object)
    }

    /// Spawn an object of type `type_name` under the owning object.
    pub fn spawn_child_object_by_name(&mut self, type_name: &str) -> Option<ObjectId> {
        self.scene.spawn_child_object_by_name(self.object, type_name)
    }

    /// Spawn an object from a template file.
    pub fn spawn_template(&mut self, path: &str) -> Option<ObjectId> {
        self.scene.spawn_template(path)
    }

    /// Move `child` under the owning object.
    pub fn attach_child_object(&mut self, child: ObjectId) -> bool {
        self.scene.attach_child_object(self.object, child)
    }

    // -------------------------------------------------------------------------
    // Rendering and resources
    // -------------------------------------------------------------------------

    /// Draw submissions of the scene.
    pub fn draw_queue(&mut self) -> &mut DrawQueue {
        self.scene.draw_queue_mut()
    }

    /// Submit a draw command tagged with the owning object's instance id.
    pub fn draw(&mut self, command: DrawCommand) {
        let instance_id = self.instance_id();
        self.scene.draw_queue_mut().submit(instance_id, command);
    }

    /// Resource cache of the scene.
    pub fn resources(&mut self) -> &mut Resources {
        self.scene.resources()
    }
}

// ============================================================================
// Object guard
// ============================================================================

/// Mutable access to a scene object.
///
/// When the guard is dropped, components attached through it are indexed
/// and queued for `start`, and children pushed through it move into the
/// scene under the object.
pub struct ObjectMut<'a> {
    id: ObjectId,
    scene: &'a mut Scene,
}

impl<'a> ObjectMut<'a> {
    /// `id` must be an object of `scene`.
    pub(crate) fn new(id: ObjectId, scene: &'a mut Scene) -> Self {
        Self { id, scene }
    }

    /// Id of the guarded object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl Deref for ObjectMut<'_> {
    type Target = Object;

    fn deref(&self) -> &Object {
        match self.scene.object(self.id) {
            Some(object) => object,
            None => unreachable!("the guarded object stays in the arena while the guard lives"),
        }
    }
}

impl DerefMut for ObjectMut<'_> {
    fn deref_mut(&mut self) -> &mut Object {
        match self.scene.arena_object_mut(self.id) {
            Some(object) => object,
            None => unreachable!("the guarded object stays in the arena while the guard lives"),
        }
    }
}

impl Drop for ObjectMut<'_> {
    fn drop(&mut self) {
        self.scene.sync_object(self.id);
    }
}
