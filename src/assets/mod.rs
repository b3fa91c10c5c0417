//! Resource management
//!
//! Provides handle-based resource management with:
//! - Shared, path-tagged resource handles
//! - Per-type storage with path de-duplication
//! - A loader that resolves virtual paths (`GR:/`, `ER:/`) and caches results

mod handle;
mod path;
mod storage;
mod template;

use std::path::Path;

use thiserror::Error;

use crate::scene::{SceneError, SceneRecord};

pub use handle::{AssetHandle, WeakAssetHandle};
pub use path::{ResourceRoots, VirtualPath};
pub use storage::{Assets, Resources};
pub use template::ObjectTemplate;

/// Errors raised while loading a resource file
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The file could not be read
    #[error("failed to read resource: {0}")]
    Io(#[from] std::io::Error),

    /// The file content is malformed
    #[error("malformed resource: {0}")]
    Malformed(#[from] SceneError),

    /// No resource type is registered for the file extension
    #[error("no resource type registered for extension '{0}'")]
    UnknownExtension(String),
}

/// A value that can be loaded from a file.
pub trait Resource: Send + Sync + Sized + 'static {
    /// Load the resource from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    fn load(path: &Path) -> Result<Self, ResourceError>;
}

impl Resource for SceneRecord {
    fn load(path: &Path) -> Result<Self, ResourceError> {
        Ok(SceneRecord::load(path)?)
    }
}
