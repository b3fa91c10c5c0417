//! Object templates
//!
//! A template is a saved object subtree (`.jobj`) that can be spawned any
//! number of times.

use std::path::Path;

use super::{Resource, ResourceError};
use crate::scene::{Object, ObjectRecord, SceneError};

/// A loaded object template
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTemplate {
    /// The saved subtree
    pub record: ObjectRecord,
}

impl ObjectTemplate {
    /// Build a fresh, pending copy of the template.
    ///
    /// # Errors
    ///
    /// Returns an error if the root object cannot be instantiated
    pub fn instantiate(&self) -> Result<Object, SceneError> {
        self.record.instantiate()
    }
}

impl Resource for ObjectTemplate {
    fn load(path: &Path) -> Result<Self, ResourceError> {
        Ok(Self {
            record: ObjectRecord::load(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::registry;

    #[test]
    fn test_template_loads_from_json() {
        registry::register_builtin_types();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("crate.jobj");
        std::fs::write(
            &file,
            r#"{ "name": "Crate", "components": [{ "type": "Sprite" }] }"#,
        )
        .unwrap();

        let template = <ObjectTemplate as Resource>::load(&file).unwrap();
        let object = template.instantiate().unwrap();
        assert_eq!(object.name(), "Crate");
        assert_eq!(object.component_count(), 1);
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.jobj");
        std::fs::write(&file, "{ not json").unwrap();

        assert!(matches!(
            <ObjectTemplate as Resource>::load(&file),
            Err(ResourceError::Malformed(_))
        ));
    }
}
