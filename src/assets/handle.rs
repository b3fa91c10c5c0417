//! Shared resource handles

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
struct Shared<T> {
    value: T,
    /// Resolved file the value was loaded from
    path: Option<PathBuf>,
}

/// A strong, cloneable handle to a loaded resource.
///
/// The resource lives as long as any handle does; clones compare equal.
#[derive(Debug)]
pub struct AssetHandle<T> {
    id: u64,
    inner: Arc<Shared<T>>,
}

impl<T> AssetHandle<T> {
    /// Wrap a value that was not loaded from a file.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_path(value, None)
    }

    pub(crate) fn with_path(value: T, path: Option<PathBuf>) -> Self {
        Self {
            id: next_id(),
            inner: Arc::new(Shared { value, path }),
        }
    }

    /// Unique id of the resource.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The resource.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.inner.value
    }

    /// File the resource was loaded from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// A handle that does not keep the resource alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakAssetHandle<T> {
        WeakAssetHandle {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of strong handles.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for AssetHandle<T> {}

impl<T> Hash for AssetHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> std::ops::Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

/// A handle that lets the resource be dropped.
#[derive(Debug)]
pub struct WeakAssetHandle<T> {
    id: u64,
    inner: Weak<Shared<T>>,
}

impl<T> WeakAssetHandle<T> {
    /// Unique id of the resource.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Strong handle, if the resource is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<AssetHandle<T>> {
        self.inner
            .upgrade()
            .map(|inner| AssetHandle { id: self.id, inner })
    }

    /// Whether any strong handle remains.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakAssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_resource() {
        let first = AssetHandle::new(String::from("atlas"));
        let second = first.clone();

        assert_eq!(first, second);
        assert_eq!(first.strong_count(), 2);
        assert_eq!(second.get(), "atlas");
        assert!(first.path().is_none());
    }

    #[test]
    fn test_handle_remembers_path() {
        let handle = AssetHandle::with_path(3_u8, Some(PathBuf::from("res/player.jobj")));
        assert_eq!(handle.path(), Some(Path::new("res/player.jobj")));
    }

    #[test]
    fn test_weak_handle_expires() {
        let strong = AssetHandle::new(7_u32);
        let weak = strong.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.upgrade().map(|h| *h), Some(7));

        drop(strong);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }
}
