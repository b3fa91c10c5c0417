//! Object transform
//!
//! Every object owns exactly one transform. It stores the local
//! position/rotation/scale (the only part that is persisted) together with
//! the world matrix produced by the last propagation pass over the object
//! tree.
//!
//! Setters only mark the transform dirty. The owning [`Scene`] recomputes
//! world matrices top-down in [`Scene::propagate_transforms`] and whenever a
//! subtree is re-parented.
//!
//! [`Scene`]: super::Scene
//! [`Scene::propagate_transforms`]: super::Scene::propagate_transforms

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local transform plus the propagated world matrix.
///
/// Equality compares the local values only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Position relative to the parent object
    position: Vec3,
    /// Rotation relative to the parent object
    rotation: Quat,
    /// Scale relative to the parent object
    scale: Vec3,

    /// World matrix from the last propagation pass
    #[serde(skip)]
    world_matrix: Mat4,

    /// Local values changed since the last propagation pass
    #[serde(skip)]
    dirty: bool,
}

impl Transform {
    /// Create an identity transform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a local position.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from local position, rotation and scale.
    #[must_use]
    pub fn from_parts(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            world_matrix: Mat4::IDENTITY,
            dirty: true,
        }
    }

    // -------------------------------------------------------------------------
    // Local values
    // -------------------------------------------------------------------------

    /// Local position.
    #[must_use]
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation.
    #[must_use]
    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale.
    #[must_use]
    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the local position.
    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    /// Set the local rotation.
    #[inline]
    pub fn set_rotation(&mut self, rotation: Quat) {
        if self.rotation != rotation {
            self.rotation = rotation;
            self.dirty = true;
        }
    }

    /// Set the local scale.
    #[inline]
    pub fn set_scale(&mut self, scale: Vec3) {
        if self.scale != scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    /// Translate by a local-space delta.
    #[inline]
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.dirty = true;
    }

    /// Apply a rotation on top of the current one.
    #[inline]
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = rotation * self.rotation;
        self.dirty = true;
    }

    /// Rotate by euler angles (in radians).
    #[inline]
    pub fn rotate_euler(&mut self, euler: Vec3) {
        self.rotate(Quat::from_euler(glam::EulerRot::XYZ, euler.x, euler.y, euler.z));
    }

    /// Matrix built from the local values only.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    // -------------------------------------------------------------------------
    // World values (valid after propagation)
    // -------------------------------------------------------------------------

    /// World matrix from the last propagation pass.
    #[must_use]
    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// World position from the last propagation pass.
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }

    /// Forward direction in world space (negative Z).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.world_matrix.transform_vector3(Vec3::NEG_Z).normalize_or_zero()
    }

    /// Whether local values changed since the last propagation pass.
    #[must_use]
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recompute the world matrix against `parent_world` and return it.
    pub(crate) fn propagate(&mut self, parent_world: Mat4) -> Mat4 {
        self.world_matrix = parent_world * self.local_matrix();
        self.dirty = false;
        self.world_matrix
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world_matrix: Mat4::IDENTITY,
            dirty: true,
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_default() {
        let t = Transform::new();

        assert_eq!(t.position(), Vec3::ZERO);
        assert_eq!(t.rotation(), Quat::IDENTITY);
        assert_eq!(t.scale(), Vec3::ONE);
        assert!(t.is_dirty());
    }

    #[test]
    fn test_propagate_against_parent() {
        let mut t = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let parent = Mat4::from_translation(Vec3::new(5.0, 5.0, 0.0));

        t.propagate(parent);

        assert!(t.world_position().abs_diff_eq(Vec3::new(6.0, 5.0, 0.0), 1e-5));
        assert!(!t.is_dirty());
    }

    #[test]
    fn test_setter_marks_dirty_only_on_change() {
        let mut t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        t.propagate(Mat4::IDENTITY);

        t.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(!t.is_dirty());

        t.set_position(Vec3::new(2.0, 2.0, 3.0));
        assert!(t.is_dirty());
    }

    #[test]
    fn test_persisted_fields_are_local_only() {
        let mut t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        t.propagate(Mat4::from_translation(Vec3::splat(10.0)));

        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("position").is_some());
        assert!(json.get("world_matrix").is_none());

        let restored: Transform = serde_json::from_value(json).unwrap();
        assert_eq!(restored.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(restored.world_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_missing_fields_default() {
        let restored: Transform =
            serde_json::from_str(r#"{ "position": [1.0, 0.0, 0.0] }"#).unwrap();
        assert_eq!(restored.scale(), Vec3::ONE);
        assert_eq!(restored.rotation(), Quat::IDENTITY);
    }
}
