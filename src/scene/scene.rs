//! Scene: owner of the object tree and driver of the per-tick lifecycle
//!
//! Each tick runs in a fixed order:
//!
//! 1. [`Scene::process_new_scene_objects`] drains the staging queue. Newly
//!    staged objects join the live tree and are started in pre-order (the
//!    object, its components in attach order, then its children). Objects
//!    and components created while this runs are processed in the same pass,
//!    so nothing is ever updated before it has been started.
//! 2. [`Scene::update_scene_objects`] walks the live tree in the same
//!    pre-order and updates every started component. Destruction requested
//!    during the walk only marks; marked components and children are swept
//!    once the walk over their owner completes.
//! 3. The scene hook (`update_scene` or `update_scene_editor`) runs when the
//!    driving loop asks for it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use glam::Mat4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::arena::{Arena, ObjectId};
use super::component::{Component, ComponentId};
use super::object::{Object, ObjectBehavior, ObjectState};
use super::record::{ObjectRecord, SceneError, SceneFormat, SceneRecord};
use super::transform::Transform;
use super::{ObjectMut, SceneContext, SceneId};
use crate::assets::{ObjectTemplate, Resources};
use crate::core::{EngineConfig, TickStats};
use crate::reflect::registry;
use crate::render::DrawQueue;

// ============================================================================
// Scene hooks
// ============================================================================

/// Scene-level callbacks supplied by the game or editor layer.
pub trait SceneHooks {
    /// Called once when the hooks are installed.
    fn on_scene_creation(&mut self, _scene: &mut Scene) {}

    /// Called once per runtime tick, after the object pass.
    fn update_scene(&mut self, _scene: &mut Scene) {}

    /// Called once per editor tick, after the object pass.
    fn update_scene_editor(&mut self, _scene: &mut Scene) {}

    /// Called once when the scene is marked for destruction.
    fn on_scene_destruction(&mut self, _scene: &mut Scene) {}
}

/// Settings a scene takes from the engine configuration.
#[derive(Debug, Clone)]
struct SceneSettings {
    scenes_dir: PathBuf,
    format: SceneFormat,
    max_activations_per_tick: usize,
}

impl From<&EngineConfig> for SceneSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            scenes_dir: config.scenes_dir.clone(),
            format: config.scene_format,
            max_activations_per_tick: config.max_activations_per_tick.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateMode {
    Runtime,
    Editor,
}

// ============================================================================
// Scene
// ============================================================================

/// A forest of objects with its activation queue and persistence.
pub struct Scene {
    id: SceneId,
    name: String,
    file_path: Option<PathBuf>,
    settings: SceneSettings,

    objects: Arena<Object>,
    /// Live root objects in update order
    roots: Vec<ObjectId>,
    /// Objects staged for activation
    new_objects: VecDeque<ObjectId>,
    /// Live objects holding components that still need `start`
    start_queue: VecDeque<ObjectId>,
    /// Component → owning object back-references
    component_owners: FxHashMap<ComponentId, ObjectId>,

    draw_queue: DrawQueue,
    resources: Resources,
    hooks: Option<Box<dyn SceneHooks>>,

    update_tick: u64,
    stats: TickStats,
    pending_destruction: bool,
    destruction_notified: bool,
}

impl Scene {
    /// Create an empty scene with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &EngineConfig::default())
    }

    /// Create an empty scene using `config` for paths and limits.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        registry::register_builtin_types();

        let name = name.into();
        log::debug!("Scene '{name}' created");
        Self {
            id: SceneId::next(),
            name,
            file_path: None,
            settings: SceneSettings::from(config),
            objects: Arena::new(),
            roots: Vec::new(),
            new_objects: VecDeque::new(),
            start_queue: VecDeque::new(),
            component_owners: FxHashMap::default(),
            draw_queue: DrawQueue::new(),
            resources: Resources::with_roots(config.resource_roots.clone()),
            hooks: None,
            update_tick: 0,
            stats: TickStats::default(),
            pending_destruction: false,
            destruction_notified: false,
        }
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Unique id of this scene.
    #[must_use]
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Scene name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the scene.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// File the scene was last saved to or loaded from.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Whether the owning layer should drop this scene.
    #[must_use]
    pub fn is_pending_destruction(&self) -> bool {
        self.pending_destruction
    }

    // -------------------------------------------------------------------------
    // Object access
    // -------------------------------------------------------------------------

    /// Object by id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    /// Object by id, mutably.
    ///
    /// Components attached and children pushed through the returned guard
    /// join the scene when the guard is dropped.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<ObjectMut<'_>> {
        if !self.objects.contains(id) {
            return None;
        }
        Some(ObjectMut::new(id, self))
    }

    pub(crate) fn arena_object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    /// Pick up changes made through an [`ObjectMut`] guard.
    pub(crate) fn sync_object(&mut self, id: ObjectId) {
        self.adopt_pending_children(id);

        let Some(object) = self.objects.get(id) else {
            return;
        };
        if !object.needs_start {
            return;
        }
        for slot in &object.components {
            self.component_owners.entry(slot.id).or_insert(id);
        }
        if !self.start_queue.contains(&id) {
            self.start_queue.push_back(id);
        }
    }

    /// Move children pushed onto an object already in the arena under it.
    fn adopt_pending_children(&mut self, id: ObjectId) {
        let pending = match self.objects.get_mut(id) {
            Some(object) if !object.pending_children.is_empty() => {
                std::mem::take(&mut object.pending_children)
            }
            _ => return,
        };

        for child in pending {
            let child_id = self.insert_subtree(child);
            self.relink_subtree(child_id, None);
            self.attach_child_object(id, child_id);
            log::trace!("Object {child_id} adopted by {id} in scene '{}'", self.name);
        }
    }

    /// Transform of object `id`, mutably.
    ///
    /// World matrices are refreshed at the end of the update pass, or right
    /// away through [`propagate_subtree`](Self::propagate_subtree).
    pub fn transform_mut(&mut self, id: ObjectId) -> Option<&mut Transform> {
        self.objects.get_mut(id).map(Object::transform_mut)
    }

    /// Live root objects in update order.
    #[must_use]
    pub fn scene_objects(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Objects waiting for the next activation pass.
    pub fn new_scene_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.new_objects.iter().copied()
    }

    /// Number of objects owned by the scene, in any state.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Object owning component `id`.
    #[must_use]
    pub fn component_owner(&self, id: ComponentId) -> Option<ObjectId> {
        self.component_owners.get(&id).copied()
    }

    /// First object named `name`, searching live objects in pre-order and
    /// then staged ones.
    #[must_use]
    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        let mut ids = self.pre_order_ids();
        for staged in &self.new_objects {
            self.walk_subtree(*staged, 0, &mut |id, _, _| ids.push(id));
        }
        ids.into_iter()
            .find(|id| self.objects.get(*id).is_some_and(|o| o.name() == name))
    }

    /// Child `index` of `parent`.
    ///
    /// Out-of-range indices are logged and yield `None`.
    #[must_use]
    pub fn child_at(&self, parent: ObjectId, index: usize) -> Option<ObjectId> {
        let child = self.objects.get(parent)?.children().get(index).copied();
        if child.is_none() {
            log::warn!("Child index {index} out of bounds for object {parent}");
        }
        child
    }

    /// Visit live objects depth-first: an object, then its children in
    /// order. The callback receives the tree depth of each object.
    pub fn visit_pre_order(&self, mut visit: impl FnMut(ObjectId, &Object, usize)) {
        for root in &self.roots {
            self.walk_subtree(*root, 0, &mut visit);
        }
    }

    fn walk_subtree(
        &self,
        id: ObjectId,
        depth: usize,
        visit: &mut dyn FnMut(ObjectId, &Object, usize),
    ) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        visit(id, object, depth);
        for child in object.children() {
            self.walk_subtree(*child, depth + 1, visit);
        }
    }

    /// Ids of live objects in pre-order.
    #[must_use]
    pub fn pre_order_ids(&self) -> Vec<ObjectId> {
        let mut ids = Vec::with_capacity(self.objects.len());
        self.visit_pre_order(|id, _, _| ids.push(id));
        ids
    }

    // -------------------------------------------------------------------------
    // Spawning
    // -------------------------------------------------------------------------

    /// Stage an object (and the children it holds by value).
    ///
    /// The object joins the live tree at the next activation pass.
    pub fn spawn(&mut self, object: Object) -> ObjectId {
        let id = self.insert_subtree(object);
        self.relink_subtree(id, None);
        self.propagate_subtree(id);
        self.new_objects.push_back(id);
        log::trace!("Object {id} staged in scene '{}'", self.name);
        id
    }

    /// Spawn an object with behaviour `T`, named after its registered type.
    pub fn spawn_object<T: ObjectBehavior + Default>(&mut self) -> ObjectId {
        let type_name = registry::object_type_name(std::any::TypeId::of::<T>())
            .unwrap_or_else(|| super::DEFAULT_OBJECT_TYPE.to_string());
        let name = self.unique_name(&type_name);
        self.spawn(Object::with_behavior(name, T::default()))
    }

    /// Spawn an object of the registered type `type_name`.
    ///
    /// Logs an error and spawns nothing for unregistered names.
    pub fn spawn_object_by_name(&mut self, type_name: &str) -> Option<ObjectId> {
        let mut object = registry::instantiate_object_by_name(type_name)?;
        object.set_name(self.unique_name(type_name));
        Some(self.spawn(object))
    }

    /// Spawn a plain object named `name` (made unique within the scene).
    pub fn spawn_object_with_name(&mut self, name: &str) -> ObjectId {
        let name = self.unique_name(name);
        self.spawn(Object::new(name))
    }

    /// Spawn an object with behaviour `T` as the last child of `parent`.
    pub fn spawn_child_object<T: ObjectBehavior + Default>(
        &mut self,
        parent: ObjectId,
    ) -> Option<ObjectId> {
        if !self.objects.contains(parent) {
            log::error!("Cannot spawn child under missing object {parent}");
            return None;
        }
        let child = self.spawn_object::<T>();
        self.attach_child_object(parent, child);
        Some(child)
    }

    /// Spawn an object of the registered type `type_name` as the last child
    /// of `parent`.
    pub fn spawn_child_object_by_name(
        &mut self,
        parent: ObjectId,
        type_name: &str,
    ) -> Option<ObjectId> {
        if !self.objects.contains(parent) {
            log::error!("Cannot spawn child under missing object {parent}");
            return None;
        }
        let child = self.spawn_object_by_name(type_name)?;
        self.attach_child_object(parent, child);
        Some(child)
    }

    /// Spawn an object from a template file.
    ///
    /// A template that fails to load or instantiate is logged and spawns
    /// nothing; the rest of the scene is unaffected.
    pub fn spawn_template(&mut self, path: &str) -> Option<ObjectId> {
        let template = self.resources.load::<ObjectTemplate>(path)?;
        match template.record.instantiate() {
            Ok(mut object) => {
                object.set_template_path(Some(path.to_string()));
                Some(self.spawn(object))
            }
            Err(e) => {
                log::error!("Failed to instantiate template '{path}': {e}");
                None
            }
        }
    }

    /// Save the subtree rooted at `id` as a template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or writing fails
    pub fn save_object_template(
        &self,
        id: ObjectId,
        path: impl AsRef<Path>,
    ) -> Result<(), SceneError> {
        let mut record = self
            .capture_object(id)
            .ok_or_else(|| SceneError::NoSuchObject(id.to_string()))?;
        record.template_path = None;
        let path = self.resources.resolve(path.as_ref());
        record.save(path, self.settings.format)
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |name: &str| self.objects.iter().any(|(_, o)| o.name() == name);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    // -------------------------------------------------------------------------
    // Tree structure
    // -------------------------------------------------------------------------

    /// Move `child` (with its subtree) to the end of `parent`'s children.
    ///
    /// World matrices of the moved subtree are recomputed. Rejects
    /// attachments that would create a cycle.
    pub fn attach_child_object(&mut self, parent: ObjectId, child: ObjectId) -> bool {
        if parent == child || !self.objects.contains(parent) || !self.objects.contains(child) {
            log::error!("Invalid attachment of {child} under {parent}");
            return false;
        }
        if self.is_ancestor(child, parent) {
            log::error!("Attaching {child} under its descendant {parent} would create a cycle");
            return false;
        }

        self.unlink_from_parent(child);
        let parent_started = match self.objects.get_mut(parent) {
            Some(p) => {
                p.children.push(child);
                p.started
            }
            None => false,
        };
        let child_started = match self.objects.get_mut(child) {
            Some(c) => {
                c.parent = Some(parent);
                c.started
            }
            None => false,
        };

        // An unstarted object moved under a live parent is otherwise never reached
        if parent_started && !child_started && !self.new_objects.contains(&child) {
            self.new_objects.push_back(child);
        }

        self.propagate_subtree(child);
        true
    }

    /// Move `id` (with its subtree) to the end of the root list.
    pub fn attach_to_root(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get(id) else {
            log::error!("Cannot move missing object {id} to the root");
            return false;
        };
        if object.parent.is_none() {
            return true;
        }
        let started = object.started;

        self.unlink_from_parent(id);
        if let Some(object) = self.objects.get_mut(id) {
            object.parent = None;
        }
        if started {
            self.roots.push(id);
        } else if !self.new_objects.contains(&id) {
            self.new_objects.push_back(id);
        }
        self.propagate_subtree(id);
        true
    }

    /// Remove `id` and its subtree from the scene without destroying it.
    ///
    /// The returned object holds its children by value, with every back
    /// reference cleared. It can be spawned again into any scene; parts
    /// that were already started are not started twice.
    pub fn detach_object(&mut self, id: ObjectId) -> Option<Object> {
        if !self.objects.contains(id) {
            log::warn!("Cannot detach missing object {id}");
            return None;
        }
        self.unlink_from_parent(id);
        self.new_objects.retain(|queued| *queued != id);
        self.extract_subtree(id)
    }

    /// Mark `id` for destruction.
    ///
    /// The object stops receiving callbacks and is removed with its subtree
    /// at the next safe point of the tick.
    pub fn destroy_object(&mut self, id: ObjectId) {
        match self.objects.get_mut(id) {
            Some(object) => object.pending_destroy = true,
            None => log::warn!("Cannot destroy missing object {id}"),
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.objects.get(node).and_then(|o| o.parent);
        }
        false
    }

    fn unlink_from_parent(&mut self, id: ObjectId) {
        match self.objects.get(id).and_then(|o| o.parent) {
            Some(parent) => {
                if let Some(parent) = self.objects.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Move an object tree held by value into the arena.
    ///
    /// Only owning links (parent → children) are established here; back
    /// references are rebuilt by [`relink_subtree`](Self::relink_subtree).
    fn insert_subtree(&mut self, mut object: Object) -> ObjectId {
        let pending = std::mem::take(&mut object.pending_children);
        object.children.clear();
        object.state = ObjectState::Staged;
        object.last_update = 0;

        let id = self.objects.insert(object);
        for child in pending {
            let child_id = self.insert_subtree(child);
            if let Some(object) = self.objects.get_mut(id) {
                object.children.push(child_id);
            }
        }
        id
    }

    /// Rebuild parent, scene and component-owner back references for the
    /// subtree rooted at `id`.
    fn relink_subtree(&mut self, id: ObjectId, parent: Option<ObjectId>) {
        let scene = self.id;
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        object.parent = parent;
        object.scene = Some(scene);
        for slot in &object.components {
            self.component_owners.insert(slot.id, id);
        }

        let children = object.children.clone();
        for child in children {
            self.relink_subtree(child, Some(id));
        }
    }

    /// Take the subtree rooted at `id` out of the arena.
    fn extract_subtree(&mut self, id: ObjectId) -> Option<Object> {
        let mut object = self.objects.remove(id)?;
        for slot in &object.components {
            self.component_owners.remove(&slot.id);
        }

        let children = std::mem::take(&mut object.children);
        for child in children {
            if let Some(child) = self.extract_subtree(child) {
                object.pending_children.push(child);
            }
        }

        object.parent = None;
        object.scene = None;
        object.state = ObjectState::Detached;
        Some(object)
    }

    /// Drop the subtree rooted at `id`.
    fn free_subtree(&mut self, id: ObjectId) {
        let Some(object) = self.objects.remove(id) else {
            return;
        };
        for slot in &object.components {
            self.component_owners.remove(&slot.id);
        }
        self.stats.objects_destroyed += 1;
        log::trace!("Object '{}' removed from scene '{}'", object.name(), self.name);

        for child in object.children.iter().copied() {
            self.free_subtree(child);
        }
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    /// Fetch the component `T` of object `id`, creating it if absent.
    ///
    /// A created component is started at the next activation boundary.
    pub fn add_component<T: Component + Default>(&mut self, id: ObjectId) -> Option<&mut T> {
        let Some(object) = self.objects.get_mut(id) else {
            log::error!("Cannot add component to missing object {id}");
            return None;
        };
        if object.component_id::<T>().is_none() {
            let component_id = object.add_boxed_component(Box::new(T::default()));
            self.component_owners.insert(component_id, id);
            self.start_queue.push_back(id);
        }
        self.objects.get_mut(id)?.get_component_mut::<T>()
    }

    /// Attach an already constructed component to object `id`.
    pub fn add_boxed_component(
        &mut self,
        id: ObjectId,
        component: Box<dyn Component>,
    ) -> Option<ComponentId> {
        let Some(object) = self.objects.get_mut(id) else {
            log::error!("Cannot add component to missing object {id}");
            return None;
        };
        let component_id = object.add_boxed_component(component);
        self.component_owners.insert(component_id, id);
        self.start_queue.push_back(id);
        Some(component_id)
    }

    /// Attach a component of the registered type `name` to object `id`.
    ///
    /// Logs an error and attaches nothing for unregistered names.
    pub fn add_component_by_name(&mut self, id: ObjectId, name: &str) -> Option<ComponentId> {
        if !self.objects.contains(id) {
            log::error!("Cannot add component '{name}' to missing object {id}");
            return None;
        }
        let component = registry::instantiate_component_by_name(name)?;
        self.add_boxed_component(id, component)
    }

    /// First live component `T` of object `id`.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: ObjectId) -> Option<&T> {
        self.objects.get(id)?.get_component::<T>()
    }

    /// First live component `T` of object `id`, mutably.
    pub fn get_component_mut<T: Component>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.objects.get_mut(id)?.get_component_mut::<T>()
    }

    /// Mark component `component` of object `id` for removal.
    pub fn destroy_component(&mut self, id: ObjectId, component: ComponentId) -> bool {
        match self.objects.get_mut(id) {
            Some(object) => object.destroy_component(component),
            None => {
                log::warn!("Cannot destroy component of missing object {id}");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Activation pass
    // -------------------------------------------------------------------------

    /// Drain the staging queue to a fixed point.
    ///
    /// Every staged object joins the live tree and is started in pre-order.
    /// Objects staged and components attached while this runs are handled
    /// before it returns.
    pub fn process_new_scene_objects(&mut self) {
        let limit = self.settings.max_activations_per_tick;
        let mut processed = 0;

        loop {
            if let Some(id) = self.new_objects.pop_front() {
                self.activate(id);
            } else if let Some(id) = self.start_queue.pop_front() {
                self.start_components(id);
            } else {
                break;
            }

            processed += 1;
            let drained = self.new_objects.is_empty() && self.start_queue.is_empty();
            if processed >= limit && !drained {
                log::warn!(
                    "Scene '{}' hit the activation limit ({limit}); {} objects deferred",
                    self.name,
                    self.new_objects.len()
                );
                break;
            }
        }
    }

    fn activate(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get(id) else {
            return;
        };

        if object.pending_destroy {
            self.unlink_from_parent(id);
            self.free_subtree(id);
            return;
        }

        match object.parent {
            None => {
                if !self.roots.contains(&id) {
                    self.roots.push(id);
                }
            }
            // Started by its parent, which runs first in pre-order
            Some(parent) if !self.objects.get(parent).is_some_and(|p| p.started) => return,
            Some(_) => {}
        }

        self.start_object(id);
    }

    /// Start the object, then its components, then its children.
    fn start_object(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        if object.pending_destroy {
            return;
        }

        object.state = ObjectState::Live;
        if !object.started {
            object.started = true;
            self.stats.objects_started += 1;
            self.with_behavior(id, |behavior, ctx| behavior.start(ctx));
        }

        self.start_components(id);

        let children: SmallVec<[ObjectId; 8]> = match self.objects.get(id) {
            Some(object) => object.children.clone(),
            None => return,
        };
        for child in children {
            self.start_object(child);
        }
    }

    /// Start every component of a live object that has not started yet.
    fn start_components(&mut self, id: ObjectId) {
        let mut index = 0;
        loop {
            let Some(object) = self.objects.get_mut(id) else {
                return;
            };
            if !object.started {
                return;
            }
            // Components attached by a `start` below are picked up by this loop
            let Some(slot) = object.components.get_mut(index) else {
                object.needs_start = false;
                return;
            };
            index += 1;

            if slot.started || slot.pending_destroy || slot.component.is_none() {
                continue;
            }
            slot.started = true;
            let component = slot.id;

            self.with_component(id, component, |component, ctx| component.start(ctx));
            self.stats.components_started += 1;
        }
    }

    // -------------------------------------------------------------------------
    // Update pass
    // -------------------------------------------------------------------------

    /// Update every live object and component once, in pre-order.
    pub fn update_scene_objects(&mut self, dt: f32) {
        self.run_update(dt, UpdateMode::Runtime);
    }

    /// Editor variant of [`update_scene_objects`](Self::update_scene_objects),
    /// calling `editor_update` instead of `update`.
    pub fn update_scene_objects_editor(&mut self, dt: f32) {
        self.run_update(dt, UpdateMode::Editor);
    }

    fn run_update(&mut self, dt: f32, mode: UpdateMode) {
        let dt = dt.max(0.0);
        self.update_tick += 1;

        let roots = self.roots.clone();
        for id in roots {
            self.update_object(id, dt, mode);
        }
        self.sweep_roots();
        self.propagate_transforms();
    }

    fn update_object(&mut self, id: ObjectId, dt: f32, mode: UpdateMode) {
        let tick = self.update_tick;
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        // Objects moved during the pass could otherwise be visited twice
        if !object.started || object.pending_destroy || object.last_update == tick {
            return;
        }
        object.last_update = tick;

        self.with_behavior(id, |behavior, ctx| match mode {
            UpdateMode::Runtime => behavior.update(ctx, dt),
            UpdateMode::Editor => behavior.editor_update(ctx, dt),
        });

        let count = self.objects.get(id).map_or(0, |o| o.components.len());
        for index in 0..count {
            let Some(slot) = self.objects.get(id).and_then(|o| o.components.get(index)) else {
                break;
            };
            if !slot.started || slot.pending_destroy {
                continue;
            }
            let component = slot.id;

            self.with_component(id, component, |component, ctx| match mode {
                UpdateMode::Runtime => component.update(ctx, dt),
                UpdateMode::Editor => component.editor_update(ctx, dt),
            });
            self.stats.component_updates += 1;
        }
        self.sweep_components(id);

        let children: SmallVec<[ObjectId; 8]> = match self.objects.get(id) {
            Some(object) if !object.pending_destroy => object.children.clone(),
            _ => return,
        };
        for child in children {
            self.update_object(child, dt, mode);
        }
        self.sweep_children(id);
    }

    fn sweep_components(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        for component in object.sweep_components() {
            self.component_owners.remove(&component);
            self.stats.components_destroyed += 1;
        }
    }

    /// Erase marked children of `id`, back to front.
    fn sweep_children(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        let children = object.children.clone();

        for index in (0..children.len()).rev() {
            let child = children[index];
            if self.objects.get(child).is_none_or(|c| c.pending_destroy) {
                if let Some(object) = self.objects.get_mut(id) {
                    object.children.remove(index);
                }
                self.free_subtree(child);
            }
        }
    }

    /// Erase marked root objects, back to front.
    fn sweep_roots(&mut self) {
        for index in (0..self.roots.len()).rev() {
            let root = self.roots[index];
            if self.objects.get(root).is_none_or(|o| o.pending_destroy) {
                self.roots.remove(index);
                self.free_subtree(root);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Editor
    // -------------------------------------------------------------------------

    /// Call `editor_gizmo` on every started component: an object's own
    /// components first, then its children in order.
    pub fn render_editor_gizmos(&mut self) {
        for id in self.pre_order_ids() {
            let components: Vec<ComponentId> = match self.objects.get(id) {
                Some(object) => object
                    .components
                    .iter()
                    .filter(|slot| slot.started && !slot.pending_destroy)
                    .map(|slot| slot.id)
                    .collect(),
                None => continue,
            };
            for component in components {
                self.with_component(id, component, |component, ctx| component.editor_gizmo(ctx));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lending
    // -------------------------------------------------------------------------

    /// Run `f` on a component lent out of its slot.
    fn with_component<R>(
        &mut self,
        id: ObjectId,
        component: ComponentId,
        f: impl FnOnce(&mut dyn Component, &mut SceneContext<'_>) -> R,
    ) -> Option<R> {
        let mut lent = self
            .objects
            .get_mut(id)?
            .components
            .iter_mut()
            .find(|slot| slot.id == component)?
            .component
            .take()?;

        let result = {
            let mut ctx = SceneContext::new(self, id, Some(component));
            f(&mut *lent, &mut ctx)
        };

        let slot = self
            .objects
            .get_mut(id)
            .and_then(|o| o.components.iter_mut().find(|slot| slot.id == component));
        match slot {
            Some(slot) => slot.component = Some(lent),
            None => log::error!("Component {component:?} lost its slot during a callback"),
        }
        Some(result)
    }

    /// Run `f` on an object behaviour lent out of its object.
    fn with_behavior<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut dyn ObjectBehavior, &mut SceneContext<'_>) -> R,
    ) -> Option<R> {
        let mut lent = self.objects.get_mut(id)?.behavior.take()?;

        let result = {
            let mut ctx = SceneContext::new(self, id, None);
            f(&mut *lent, &mut ctx)
        };

        match self.objects.get_mut(id) {
            Some(object) => object.behavior = Some(lent),
            None => log::error!("Object {id} vanished during its own callback"),
        }
        Some(result)
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    /// Recompute world matrices for every root-level subtree.
    pub fn propagate_transforms(&mut self) {
        let roots: Vec<ObjectId> = self
            .roots
            .iter()
            .chain(self.new_objects.iter())
            .copied()
            .filter(|id| self.objects.get(*id).is_some_and(|o| o.parent.is_none()))
            .collect();
        for id in roots {
            self.propagate_from(id, Mat4::IDENTITY);
        }
    }

    /// Recompute world matrices for the subtree rooted at `id`.
    pub fn propagate_subtree(&mut self, id: ObjectId) {
        let parent_world = self
            .objects
            .get(id)
            .and_then(|o| o.parent)
            .and_then(|parent| self.world_matrix(parent))
            .unwrap_or(Mat4::IDENTITY);
        self.propagate_from(id, parent_world);
    }

    fn propagate_from(&mut self, id: ObjectId, parent_world: Mat4) {
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        let world = object.transform_mut().propagate(parent_world);
        let children = object.children.clone();
        for child in children {
            self.propagate_from(child, world);
        }
    }

    /// World matrix of `id` computed from the local transforms up the tree,
    /// independent of any pending propagation.
    #[must_use]
    pub fn world_matrix(&self, id: ObjectId) -> Option<Mat4> {
        let mut object = self.objects.get(id)?;
        let mut world = object.transform().local_matrix();
        while let Some(parent) = object.parent.and_then(|p| self.objects.get(p)) {
            world = parent.transform().local_matrix() * world;
            object = parent;
        }
        Some(world)
    }

    // -------------------------------------------------------------------------
    // Scene hooks
    // -------------------------------------------------------------------------

    /// Install scene hooks and run their creation callback.
    pub fn set_hooks(&mut self, hooks: impl SceneHooks + 'static) {
        self.hooks = Some(Box::new(hooks));
        self.with_hooks(|hooks, scene| hooks.on_scene_creation(scene));
    }

    /// Run the runtime scene hook.
    pub fn update_scene(&mut self) {
        self.with_hooks(|hooks, scene| hooks.update_scene(scene));
    }

    /// Run the editor scene hook.
    pub fn update_scene_editor(&mut self) {
        self.with_hooks(|hooks, scene| hooks.update_scene_editor(scene));
    }

    /// Mark the scene for destruction by the owning layer.
    ///
    /// The destruction hook runs once, right away or (when called from a
    /// hook) as soon as that hook returns.
    pub fn destroy_scene(&mut self) {
        if self.pending_destruction {
            return;
        }
        self.pending_destruction = true;
        log::info!("Scene '{}' marked for destruction", self.name);
        self.with_hooks(|_, _| {});
    }

    fn with_hooks(&mut self, f: impl FnOnce(&mut dyn SceneHooks, &mut Scene)) {
        let Some(mut hooks) = self.hooks.take() else {
            return;
        };
        f(&mut *hooks, self);

        if self.pending_destruction && !self.destruction_notified {
            self.destruction_notified = true;
            hooks.on_scene_destruction(self);
        }
        if self.hooks.is_none() {
            self.hooks = Some(hooks);
        }
    }

    // -------------------------------------------------------------------------
    // Draw submissions, resources and statistics
    // -------------------------------------------------------------------------

    /// Draw submissions collected since the last drain.
    #[must_use]
    pub fn draw_queue(&self) -> &DrawQueue {
        &self.draw_queue
    }

    /// Draw submissions, mutably.
    pub fn draw_queue_mut(&mut self) -> &mut DrawQueue {
        &mut self.draw_queue
    }

    /// Resource cache of this scene.
    pub fn resources(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Counters accumulated since the last call, which resets them.
    pub fn take_stats(&mut self) -> TickStats {
        std::mem::take(&mut self.stats)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Capture the scene as a record.
    ///
    /// Root objects are written in update order, followed by staged roots
    /// that have not been activated yet. Objects marked for destruction are
    /// left out.
    #[must_use]
    pub fn to_record(&self) -> SceneRecord {
        let staged_roots = self
            .new_objects
            .iter()
            .filter(|id| !self.roots.contains(id))
            .filter(|id| self.objects.get(**id).is_some_and(|o| o.parent.is_none()));

        let mut record = SceneRecord::new(self.name.clone());
        record.objects = self
            .roots
            .iter()
            .chain(staged_roots)
            .filter_map(|id| self.capture_object(*id))
            .collect();
        record
    }

    fn capture_object(&self, id: ObjectId) -> Option<ObjectRecord> {
        let object = self.objects.get(id)?;
        if object.pending_destroy {
            return None;
        }
        let children = object
            .children
            .iter()
            .filter_map(|child| self.capture_object(*child))
            .collect();
        Some(ObjectRecord::capture(object, children))
    }

    /// Build a scene from a record.
    ///
    /// Objects that fail to instantiate are logged and skipped. Every loaded
    /// object is staged and starts at the first activation pass.
    #[must_use]
    pub fn from_record(record: &SceneRecord, config: &EngineConfig) -> Self {
        let mut scene = Self::with_config(record.name.clone(), config);
        for object in &record.objects {
            match object.instantiate() {
                Ok(instance) => {
                    scene.spawn(instance);
                }
                Err(e) => log::error!(
                    "Skipping object '{}' while loading scene '{}': {e}",
                    object.name,
                    record.name
                ),
            }
        }
        scene
    }

    /// Load a scene file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let record = SceneRecord::load(path)?;
        let mut scene = Self::from_record(&record, config);
        scene.file_path = Some(path.to_path_buf());
        log::info!(
            "Loaded scene '{}' ({} objects) from {}",
            scene.name,
            scene.object_count(),
            path.display()
        );
        Ok(scene)
    }

    /// Save to the scene's file, choosing `<scenes_dir>/<name>.scn` the
    /// first time.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn save_to_file(&mut self) -> Result<PathBuf, SceneError> {
        let path = match &self.file_path {
            Some(path) => path.clone(),
            None => {
                let extension = registry::resource_extension_of::<SceneRecord>()
                    .unwrap_or_else(|| "scn".to_string());
                self.settings
                    .scenes_dir
                    .join(format!("{}.{extension}", self.name))
            }
        };
        self.save_to_path(&path)?;
        Ok(path)
    }

    /// Save to `path` and remember it as the scene's file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn save_to_path(&mut self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let path = path.as_ref();
        self.to_record().save(path, self.settings.format)?;
        self.file_path = Some(path.to_path_buf());
        log::info!("Saved scene '{}' to {}", self.name, path.display());
        Ok(())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("objects", &self.objects.len())
            .field("roots", &self.roots)
            .field("staged", &self.new_objects.len())
            .field("pending_destruction", &self.pending_destruction)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::Once;

    use glam::Vec3;

    use super::*;
    use crate::components::{Sprite, Velocity};
    use crate::reflect::{register_component_type, register_object_type};
    use crate::render::DrawCommand;
    use crate::scene::record::{ComponentRecord, load_fields, save_fields};

    thread_local! {
        static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(entry: String) {
        LOG.with(|log| log.borrow_mut().push(entry));
    }

    fn take_log() -> Vec<String> {
        LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
    }

    #[derive(Default, serde::Serialize, serde::Deserialize)]
    #[serde(default)]
    struct Recorder {
        label: String,
        destroy_self: bool,
        #[serde(skip)]
        spawn_on_start: bool,
        #[serde(skip)]
        spawn_on_update: bool,
    }

    impl Recorder {
        fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                ..Self::default()
            }
        }
    }

    impl Component for Recorder {
        fn start(&mut self, ctx: &mut SceneContext<'_>) {
            record(format!("start:{}", self.label));
            if self.spawn_on_start {
                ctx.spawn(Object::new("Late").with_component(Recorder::new("late")));
            }
        }

        fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
            record(format!("update:{}", self.label));
            if std::mem::take(&mut self.spawn_on_update) {
                ctx.spawn(Object::new("Spawned").with_component(Recorder::new("spawned")));
            }
            if self.destroy_self {
                ctx.destroy();
            }
        }

        fn editor_update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {
            record(format!("editor:{}", self.label));
        }

        fn save(&self) -> serde_json::Value {
            save_fields(self)
        }

        fn load(&mut self, fields: &serde_json::Value) -> Result<(), SceneError> {
            *self = load_fields(fields)?;
            Ok(())
        }
    }

    /// Destroys another object when updated
    #[derive(Default)]
    struct Assassin {
        target: Option<ObjectId>,
    }

    impl Component for Assassin {
        fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
            if let Some(target) = self.target.take() {
                ctx.destroy_other(target);
            }
        }
    }

    #[derive(Default)]
    struct Counter {
        updates: u32,
    }

    impl ObjectBehavior for Counter {
        fn start(&mut self, _ctx: &mut SceneContext<'_>) {
            record("start:counter".to_string());
        }

        fn update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {
            self.updates += 1;
        }
    }

    fn setup() {
        static REGISTER: Once = Once::new();
        REGISTER.call_once(|| {
            registry::register_builtin_types();
            let _ = register_component_type::<Recorder>("SceneTestRecorder");
            let _ = register_object_type::<Counter>("SceneTestCounter");
        });
        take_log();
    }

    #[test]
    fn test_start_runs_before_first_update_in_pre_order() {
        setup();
        let mut scene = Scene::new("Order");
        scene.spawn(
            Object::new("Root")
                .with_component(Recorder::new("r1"))
                .with_component(Recorder::new("r2"))
                .with_child(Object::new("Child").with_component(Recorder::new("c1"))),
        );

        scene.process_new_scene_objects();
        assert_eq!(take_log(), vec!["start:r1", "start:r2", "start:c1"]);

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:r1", "update:r2", "update:c1"]);
    }

    #[test]
    fn test_objects_spawned_during_start_start_in_same_pass() {
        setup();
        let mut scene = Scene::new("Cascade");
        scene.spawn(Object::new("Spawner").with_component(Recorder {
            label: "spawner".into(),
            spawn_on_start: true,
            ..Recorder::default()
        }));

        scene.process_new_scene_objects();
        assert_eq!(take_log(), vec!["start:spawner", "start:late"]);
        assert_eq!(scene.scene_objects().len(), 2);
        assert_eq!(scene.new_scene_objects().count(), 0);
    }

    #[test]
    fn test_component_added_to_live_object_waits_for_activation() {
        setup();
        let mut scene = Scene::new("Late add");
        let id = scene.spawn(Object::new("Host").with_component(Recorder::new("host")));
        scene.process_new_scene_objects();
        take_log();

        if let Some(mut object) = scene.object_mut(id) {
            object.add_boxed_component(Box::new(Recorder::new("added")));
        }
        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:host"]);

        scene.process_new_scene_objects();
        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["start:added", "update:host", "update:added"]);
    }

    #[test]
    fn test_object_spawned_during_update_starts_before_its_first_update() {
        setup();
        let mut scene = Scene::new("Mid tick");
        scene.spawn(Object::new("Spawner").with_component(Recorder {
            label: "spawner".into(),
            spawn_on_update: true,
            ..Recorder::default()
        }));
        scene.process_new_scene_objects();
        take_log();

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:spawner"]);
        let spawned = scene.find_object_by_name("Spawned").unwrap();
        assert!(!scene.object(spawned).unwrap().is_started());
        assert_eq!(scene.new_scene_objects().collect::<Vec<_>>(), vec![spawned]);

        scene.process_new_scene_objects();
        assert_eq!(take_log(), vec!["start:spawned"]);
        assert!(scene.object(spawned).unwrap().is_started());

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:spawner", "update:spawned"]);
    }

    #[test]
    fn test_child_pushed_onto_live_object_joins_scene() {
        setup();
        let mut scene = Scene::new("Adopt");
        let root = scene.spawn(Object::new("Root").with_component(Recorder::new("root")));
        scene.process_new_scene_objects();
        take_log();

        if let Some(mut object) = scene.object_mut(root) {
            object.push_child(
                Object::new("Adopted")
                    .with_component(Recorder::new("adopted"))
                    .with_child(Object::new("Grandchild")),
            );
        }

        let adopted = scene.find_object_by_name("Adopted").unwrap();
        assert_eq!(scene.object(root).unwrap().children(), &[adopted]);
        assert_eq!(scene.object(adopted).unwrap().parent(), Some(root));
        assert!(scene.object(root).unwrap().pending_children().is_empty());
        assert_eq!(scene.object_count(), 3);

        scene.process_new_scene_objects();
        scene.update_scene_objects(0.1);
        assert_eq!(
            take_log(),
            vec!["start:adopted", "update:root", "update:adopted"]
        );

        let record = scene.to_record();
        assert_eq!(record.objects[0].children.len(), 1);
        assert_eq!(record.objects[0].children[0].name, "Adopted");
        assert_eq!(record.objects[0].children[0].children[0].name, "Grandchild");
    }

    #[test]
    fn test_add_component_is_at_most_one_per_type() {
        setup();
        let mut scene = Scene::new("Unique");
        let id = scene.spawn_object_with_name("Holder");

        assert!(scene.add_component::<Velocity>(id).is_some());
        if let Some(velocity) = scene.add_component::<Velocity>(id) {
            velocity.linear = Vec3::X;
        }

        let object = scene.object(id).unwrap();
        assert_eq!(object.component_count(), 1);
        assert_eq!(object.get_component::<Velocity>().unwrap().linear, Vec3::X);
        let component = object.component_id::<Velocity>().unwrap();
        assert_eq!(scene.component_owner(component), Some(id));
    }

    #[test]
    fn test_self_destroy_during_update() {
        setup();
        let mut scene = Scene::new("Self destroy");
        let id = scene.spawn(
            Object::new("Host")
                .with_component(Recorder {
                    label: "a".into(),
                    destroy_self: true,
                    ..Recorder::default()
                })
                .with_component(Recorder::new("b"))
                .with_component(Recorder {
                    label: "c".into(),
                    destroy_self: true,
                    ..Recorder::default()
                })
                .with_component(Recorder::new("d")),
        );
        scene.process_new_scene_objects();
        take_log();

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:a", "update:b", "update:c", "update:d"]);
        assert_eq!(scene.object(id).unwrap().component_count(), 2);

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:b", "update:d"]);
        assert_eq!(scene.take_stats().components_destroyed, 2);
    }

    #[test]
    fn test_destroyed_sibling_is_skipped_and_swept() {
        setup();
        let mut scene = Scene::new("Sibling");
        let killer = scene.spawn(Object::new("Killer").with_component(Recorder::new("killer")));
        let victim = scene.spawn(Object::new("Victim").with_component(Recorder::new("victim")));
        scene.process_new_scene_objects();

        scene.object_mut(killer).unwrap().add_boxed_component(Box::new(Assassin {
            target: Some(victim),
        }));
        scene.process_new_scene_objects();
        take_log();

        scene.update_scene_objects(0.1);
        assert_eq!(take_log(), vec!["update:killer"]);
        assert!(scene.object(victim).is_none());
        assert_eq!(scene.scene_objects(), &[killer]);

        let replacement = scene.spawn_object_with_name("Replacement");
        assert_ne!(replacement, victim);
        assert!(scene.object(victim).is_none());
    }

    #[test]
    fn test_destroying_parent_removes_subtree() {
        setup();
        let mut scene = Scene::new("Subtree");
        let root = scene.spawn(
            Object::new("Root")
                .with_child(Object::new("Child").with_component(Recorder::new("child"))),
        );
        scene.process_new_scene_objects();
        let child = scene.object(root).unwrap().children()[0];
        take_log();

        scene.destroy_object(root);
        scene.update_scene_objects(0.1);

        assert!(take_log().is_empty());
        assert!(scene.object(root).is_none());
        assert!(scene.object(child).is_none());
        assert_eq!(scene.object_count(), 0);
    }

    #[test]
    fn test_round_trip_preserves_tree_and_components() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels").join("round_trip.scn");

        let make = |name: &str, n: f32| {
            Object::new(name)
                .with_transform(Transform::from_position(Vec3::splat(n)))
                .with_component(Sprite {
                    texture: format!("GR:/sprite_{n}.png"),
                    size: glam::Vec2::splat(n),
                    ..Sprite::default()
                })
                .with_component(Velocity {
                    linear: Vec3::new(n, 0.0, 0.0),
                    angular: Vec3::ZERO,
                })
        };

        let mut scene = Scene::new("Round trip");
        scene.spawn(
            make("Root", 1.0)
                .with_child(make("A", 2.0))
                .with_child(make("B", 3.0)),
        );
        scene.process_new_scene_objects();
        scene.save_to_path(&path).unwrap();

        let mut loaded = Scene::load_from_file(&path, &EngineConfig::default()).unwrap();
        assert_eq!(loaded.name(), "Round trip");
        assert_eq!(loaded.object_count(), 3);
        assert_eq!(loaded.to_record(), scene.to_record());
        // Children of staged roots are reachable before activation
        assert!(loaded.find_object_by_name("B").is_some());

        loaded.process_new_scene_objects();
        let root_id = loaded.scene_objects()[0];
        let root = loaded.object(root_id).unwrap();
        assert_eq!(root.parent(), None);

        let names: Vec<&str> = root
            .children()
            .iter()
            .map(|child| loaded.object(*child).unwrap().name())
            .collect();
        assert_eq!(names, ["A", "B"]);
        for child in root.children() {
            assert_eq!(loaded.object(*child).unwrap().parent(), Some(root_id));
        }

        for id in loaded.pre_order_ids() {
            let object = loaded.object(id).unwrap();
            assert_eq!(object.scene(), Some(loaded.id()));
            assert_eq!(object.component_count(), 2);
            for component in object.component_ids() {
                assert_eq!(loaded.component_owner(component), Some(id));
            }
        }

        let b = loaded.object(root.children()[1]).unwrap();
        assert_eq!(b.get_component::<Sprite>().unwrap().texture, "GR:/sprite_3.png");
        assert_eq!(b.get_component::<Velocity>().unwrap().linear.x, 3.0);
    }

    #[test]
    fn test_round_trip_in_ron() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default()
            .with_scenes_dir(dir.path())
            .with_scene_format(SceneFormat::Ron);

        let mut scene = Scene::with_config("Ron level", &config);
        scene.spawn(Object::new("Recorded").with_component(Recorder::new("saved")));
        let path = scene.save_to_file().unwrap();
        assert_eq!(path, dir.path().join("Ron level.scn"));

        let loaded = Scene::load_from_file(&path, &config).unwrap();
        assert_eq!(loaded.to_record(), scene.to_record());
    }

    #[test]
    fn test_unregistered_names_are_rejected_safely() {
        setup();
        let mut scene = Scene::new("Unknown");
        assert!(scene.spawn_object_by_name("SceneTestMissingObject").is_none());
        assert_eq!(scene.object_count(), 0);

        let id = scene.spawn_object_with_name("Host");
        assert!(scene.add_component_by_name(id, "SceneTestMissingComponent").is_none());
        assert_eq!(scene.object(id).unwrap().component_count(), 0);

        let mut record = ObjectRecord::from_object(&Object::new("Loaded").with_component(Sprite::default()));
        record.components.insert(
            0,
            ComponentRecord {
                type_name: "SceneTestMissingComponent".into(),
                fields: serde_json::Value::Null,
            },
        );
        let object = record.instantiate().unwrap();
        assert_eq!(object.component_count(), 1);
        assert!(object.get_component::<Sprite>().is_some());
    }

    #[test]
    fn test_reparent_recomputes_world_position() {
        setup();
        let mut scene = Scene::new("Reparent");
        let parent = scene.spawn(
            Object::new("Parent").with_transform(Transform::from_position(Vec3::new(5.0, 5.0, 0.0))),
        );
        let child = scene.spawn(
            Object::new("Child").with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0))),
        );
        scene.process_new_scene_objects();

        assert!(scene.attach_child_object(parent, child));

        let world = scene.object(child).unwrap().transform().world_position();
        assert!(world.abs_diff_eq(Vec3::new(6.0, 5.0, 0.0), 1e-5));
        assert_eq!(scene.object(child).unwrap().parent(), Some(parent));
        assert_eq!(scene.scene_objects(), &[parent]);

        // Cycles are rejected
        assert!(!scene.attach_child_object(child, parent));
        assert!(!scene.attach_child_object(parent, parent));
    }

    #[test]
    fn test_attach_to_root_keeps_local_transform() {
        setup();
        let mut scene = Scene::new("Unparent");
        let root = scene.spawn(
            Object::new("Root")
                .with_transform(Transform::from_position(Vec3::new(5.0, 0.0, 0.0)))
                .with_child(Object::new("Child").with_transform(Transform::from_position(Vec3::Y))),
        );
        scene.process_new_scene_objects();
        let child = scene.object(root).unwrap().children()[0];

        assert!(scene.attach_to_root(child));
        assert_eq!(scene.scene_objects(), &[root, child]);
        let world = scene.world_matrix(child).unwrap().w_axis.truncate();
        assert!(world.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_detach_and_respawn_does_not_restart() {
        setup();
        let mut first = Scene::new("First");
        let id = first.spawn(
            Object::new("Traveller")
                .with_component(Recorder::new("traveller"))
                .with_child(Object::new("Passenger").with_component(Recorder::new("passenger"))),
        );
        first.process_new_scene_objects();
        take_log();

        let detached = first.detach_object(id).unwrap();
        assert_eq!(detached.state(), ObjectState::Detached);
        assert!(detached.scene().is_none());
        assert_eq!(detached.pending_children().len(), 1);
        assert_eq!(first.object_count(), 0);

        let mut second = Scene::new("Second");
        let moved = second.spawn(detached);
        second.process_new_scene_objects();
        second.update_scene_objects(0.1);

        assert_eq!(take_log(), vec!["update:traveller", "update:passenger"]);
        assert_eq!(second.object(moved).unwrap().state(), ObjectState::Live);
        assert_eq!(second.object(moved).unwrap().scene(), Some(second.id()));
    }

    #[test]
    fn test_object_behavior_starts_before_components() {
        setup();
        let mut scene = Scene::new("Behaviours");
        let first = scene.spawn_object::<Counter>();
        scene.add_boxed_component(first, Box::new(Recorder::new("on_counter")));
        let second = scene.spawn_object::<Counter>();

        assert_eq!(scene.object(first).unwrap().name(), "SceneTestCounter");
        assert_eq!(scene.object(second).unwrap().name(), "SceneTestCounter_1");

        scene.process_new_scene_objects();
        assert_eq!(
            take_log(),
            vec!["start:counter", "start:on_counter", "start:counter"]
        );

        scene.update_scene_objects(0.1);
        let counter = scene.object(first).unwrap().behavior::<Counter>().unwrap();
        assert_eq!(counter.updates, 1);
        assert_eq!(
            scene.object(first).unwrap().type_name().as_deref(),
            Some("SceneTestCounter")
        );
    }

    #[test]
    fn test_spawn_child_by_name() {
        setup();
        let mut scene = Scene::new("Children");
        let parent = scene.spawn_object_with_name("Parent");
        let child = scene.spawn_child_object_by_name(parent, "SceneTestCounter").unwrap();
        scene.process_new_scene_objects();

        assert_eq!(scene.object(parent).unwrap().children(), &[child]);
        assert!(scene.object(child).unwrap().is_started());
        assert_eq!(scene.child_at(parent, 0), Some(child));
        assert_eq!(scene.child_at(parent, 3), None);

        let mut depths = Vec::new();
        scene.visit_pre_order(|_, object, depth| depths.push((object.name().to_string(), depth)));
        assert_eq!(
            depths,
            vec![("Parent".to_string(), 0), ("SceneTestCounter".to_string(), 1)]
        );
    }

    #[test]
    fn test_activation_limit_defers_remaining_objects() {
        setup();
        let config = EngineConfig::default().with_max_activations(1);
        let mut scene = Scene::with_config("Limited", &config);
        scene.spawn(Object::new("A"));
        scene.spawn(Object::new("B"));

        scene.process_new_scene_objects();
        assert_eq!(scene.scene_objects().len(), 1);
        assert_eq!(scene.new_scene_objects().count(), 1);

        scene.process_new_scene_objects();
        assert_eq!(scene.scene_objects().len(), 2);
    }

    #[test]
    fn test_staged_objects_are_saved() {
        setup();
        let mut scene = Scene::new("Staged");
        scene.spawn(Object::new("Live"));
        scene.process_new_scene_objects();
        scene.spawn(Object::new("Waiting"));

        let record = scene.to_record();
        let names: Vec<&str> = record.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Live", "Waiting"]);
    }

    #[test]
    fn test_templates_spawn_and_isolate_failures() {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("crate.jobj");

        let mut scene = Scene::new("Templates");
        let source = scene.spawn(
            Object::new("Crate")
                .with_component(Sprite::default())
                .with_child(Object::new("Lid")),
        );
        scene.save_object_template(source, &template_path).unwrap();

        let path = template_path.to_str().unwrap();
        let spawned = scene.spawn_template(path).unwrap();
        scene.process_new_scene_objects();

        let object = scene.object(spawned).unwrap();
        assert_eq!(object.template_path(), Some(path));
        assert_eq!(object.children().len(), 1);
        assert!(object.get_component::<Sprite>().is_some());

        let broken = dir.path().join("broken.jobj");
        std::fs::write(&broken, "{ \"type\": \"Object\" ").unwrap();
        let before = scene.object_count();
        assert!(scene.spawn_template(broken.to_str().unwrap()).is_none());
        assert_eq!(scene.object_count(), before);
    }

    #[test]
    fn test_editor_pass_and_gizmos() {
        setup();
        let mut scene = Scene::new("Editor");
        let id = scene.spawn(
            Object::new("Edited")
                .with_component(Recorder::new("edited"))
                .with_component(Sprite::default()),
        );
        scene.process_new_scene_objects();
        take_log();

        scene.update_scene_objects_editor(0.1);
        assert_eq!(take_log(), vec!["editor:edited"]);

        scene.draw_queue_mut().clear();
        scene.render_editor_gizmos();
        let instance = scene.object(id).unwrap().instance_id();
        let lines = scene
            .draw_queue()
            .commands_for(instance)
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
            .count();
        assert_eq!(lines, 4);
    }

    struct Hooks;

    impl SceneHooks for Hooks {
        fn on_scene_creation(&mut self, scene: &mut Scene) {
            record(format!("created:{}", scene.name()));
        }

        fn update_scene(&mut self, _scene: &mut Scene) {
            record("hook:update".to_string());
        }

        fn on_scene_destruction(&mut self, _scene: &mut Scene) {
            record("destroyed".to_string());
        }
    }

    #[test]
    fn test_scene_hooks() {
        setup();
        let mut scene = Scene::new("Hooked");
        scene.set_hooks(Hooks);
        scene.update_scene();
        scene.update_scene_editor();
        scene.destroy_scene();
        scene.destroy_scene();

        assert!(scene.is_pending_destruction());
        assert_eq!(take_log(), vec!["created:Hooked", "hook:update", "destroyed"]);
    }
}
