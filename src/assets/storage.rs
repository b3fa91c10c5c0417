//! Resource storage and loading

use std::any::{Any, TypeId};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::handle::AssetHandle;
use super::path::{ResourceRoots, VirtualPath};
use super::{Resource, ResourceError};
use crate::reflect::registry;

/// Storage for every loaded resource of one type
pub struct Assets<T> {
    assets: FxHashMap<u64, AssetHandle<T>>,
    /// Resolved path to handle id, for de-duplication
    path_to_id: FxHashMap<PathBuf, u64>,
}

impl<T> Assets<T> {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            assets: FxHashMap::default(),
            path_to_id: FxHashMap::default(),
        }
    }

    /// Store a value that has no file.
    pub fn add(&mut self, asset: T) -> AssetHandle<T> {
        let handle = AssetHandle::new(asset);
        self.assets.insert(handle.id(), handle.clone());
        handle
    }

    /// Store a value loaded from `path`.
    ///
    /// If `path` is already stored, the existing handle is returned and
    /// `asset` is dropped.
    pub fn add_with_path(&mut self, asset: T, path: impl AsRef<Path>) -> AssetHandle<T> {
        let path = path.as_ref();
        if let Some(handle) = self.get_by_path(path) {
            return handle;
        }

        let handle = AssetHandle::with_path(asset, Some(path.to_path_buf()));
        self.path_to_id.insert(path.to_path_buf(), handle.id());
        self.assets.insert(handle.id(), handle.clone());
        handle
    }

    /// Handle by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<AssetHandle<T>> {
        self.assets.get(&id).cloned()
    }

    /// Handle by resolved path.
    #[must_use]
    pub fn get_by_path(&self, path: impl AsRef<Path>) -> Option<AssetHandle<T>> {
        self.path_to_id
            .get(path.as_ref())
            .and_then(|id| self.get(*id))
    }

    /// Drop the storage's handle. Returns whether it was present.
    pub fn remove(&mut self, id: u64) -> bool {
        let Some(handle) = self.assets.remove(&id) else {
            return false;
        };
        if let Some(path) = handle.path() {
            self.path_to_id.remove(path);
        }
        true
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Drop every stored handle.
    pub fn clear(&mut self) {
        self.assets.clear();
        self.path_to_id.clear();
    }
}

impl<T> Default for Assets<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource loader and cache for one scene.
///
/// Paths may use the `GR:/` and `ER:/` prefixes. Each resolved file is
/// loaded once per type; failures are logged and yield `None`.
pub struct Resources {
    roots: ResourceRoots,
    storages: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Create a loader with default roots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roots(ResourceRoots::default())
    }

    /// Create a loader resolving virtual paths against `roots`.
    #[must_use]
    pub fn with_roots(roots: ResourceRoots) -> Self {
        Self {
            roots,
            storages: FxHashMap::default(),
        }
    }

    /// Directories the virtual prefixes resolve to.
    #[must_use]
    pub fn roots(&self) -> &ResourceRoots {
        &self.roots
    }

    /// File-system path for a possibly virtual `path`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        VirtualPath::resolve_path(path, &self.roots)
    }

    /// Storage for resources of type `T`, created on first use.
    pub fn storage<T: Resource>(&mut self) -> &mut Assets<T> {
        let entry = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Assets::<T>::new()));
        match entry.downcast_mut::<Assets<T>>() {
            Some(storage) => storage,
            None => unreachable!("resource storages are keyed by their own TypeId"),
        }
    }

    /// Load (or fetch the cached) resource `T` at `path`.
    pub fn load<T: Resource>(&mut self, path: &str) -> Option<AssetHandle<T>> {
        let resolved = self.resolve(Path::new(path));
        if let Some(handle) = self.storage::<T>().get_by_path(&resolved) {
            return Some(handle);
        }

        match T::load(&resolved) {
            Ok(resource) => {
                log::debug!("Loaded resource {}", resolved.display());
                Some(self.storage::<T>().add_with_path(resource, &resolved))
            }
            Err(e) => {
                log::warn!("Failed to load resource '{path}': {e}");
                None
            }
        }
    }

    /// Load a file through the resource type registered for its extension.
    ///
    /// The result is not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if no type is registered for the extension or the
    /// loader fails
    pub fn load_untyped(&self, path: &str) -> Result<Box<dyn Any + Send + Sync>, ResourceError> {
        let resolved = self.resolve(Path::new(path));
        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let info = registry::resource_type_for_extension(&extension)
            .ok_or(ResourceError::UnknownExtension(extension))?;
        (info.loader)(&resolved)
    }

    /// Forget every cached resource.
    pub fn clear(&mut self) {
        self.storages.clear();
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}
