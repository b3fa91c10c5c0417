//! Components that move or expire their object

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scene::record::{load_fields, save_fields};
use crate::scene::{Component, SceneContext, SceneError};

/// Linear and angular motion applied to the object's transform each tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Velocity {
    /// Units per second
    pub linear: Vec3,
    /// Euler radians per second
    pub angular: Vec3,
}

impl Component for Velocity {
    fn update(&mut self, ctx: &mut SceneContext<'_>, dt: f32) {
        if let Some(transform) = ctx.transform_mut() {
            transform.translate(self.linear * dt);
            if self.angular != Vec3::ZERO {
                transform.rotate_euler(self.angular * dt);
            }
        }
    }

    fn save(&self) -> Value {
        save_fields(self)
    }

    fn load(&mut self, fields: &Value) -> Result<(), SceneError> {
        *self = load_fields(fields)?;
        Ok(())
    }
}

/// Destroys its object once `duration` seconds have passed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lifetime {
    pub duration: f32,
    pub elapsed: f32,
}

impl Default for Lifetime {
    fn default() -> Self {
        Self {
            duration: 1.0,
            elapsed: 0.0,
        }
    }
}

impl Lifetime {
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
        }
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }
}

impl Component for Lifetime {
    fn update(&mut self, ctx: &mut SceneContext<'_>, dt: f32) {
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            log::trace!("Lifetime of object {} expired", ctx.object_id());
            ctx.destroy_object();
        }
    }

    fn save(&self) -> Value {
        save_fields(self)
    }

    fn load(&mut self, fields: &Value) -> Result<(), SceneError> {
        *self = load_fields(fields)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Object, Scene};

    #[test]
    fn test_velocity_moves_transform() {
        let mut scene = Scene::new("Motion");
        let id = scene.spawn(Object::new("Mover").with_component(Velocity {
            linear: Vec3::new(2.0, 0.0, 0.0),
            angular: Vec3::ZERO,
        }));

        scene.process_new_scene_objects();
        scene.update_scene_objects(0.5);
        scene.update_scene_objects(0.5);

        let position = scene.object(id).unwrap().transform().position();
        assert!(position.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_lifetime_destroys_object() {
        let mut scene = Scene::new("Expiry");
        let id = scene.spawn(Object::new("Spark").with_component(Lifetime::new(1.0)));
        scene.process_new_scene_objects();

        scene.update_scene_objects(0.6);
        assert!(scene.object(id).is_some());

        scene.update_scene_objects(0.6);
        assert!(scene.object(id).is_none());
        assert!(scene.scene_objects().is_empty());
    }

    #[test]
    fn test_lifetime_remaining_never_negative() {
        let lifetime = Lifetime {
            duration: 1.0,
            elapsed: 3.0,
        };
        assert_eq!(lifetime.remaining(), 0.0);
    }
}
