//! Components that submit draw commands

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::render::DrawCommand;
use crate::scene::record::{load_fields, save_fields};
use crate::scene::{Component, SceneContext, SceneError};

/// Textured quad centred on the object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sprite {
    /// Texture path, may be virtual (`GR:/...`)
    pub texture: String,
    /// Size in world units
    pub size: Vec2,
    /// Tint colour (RGBA)
    pub color: Vec4,
    pub visible: bool,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            texture: String::new(),
            size: Vec2::ONE,
            color: Vec4::ONE,
            visible: true,
        }
    }
}

impl Sprite {
    fn submit(&self, ctx: &mut SceneContext<'_>) {
        if !self.visible {
            return;
        }
        let world = ctx.world_matrix();
        ctx.draw(DrawCommand::Quad {
            texture: self.texture.clone(),
            size: self.size,
            color: self.color,
            world,
        });
    }
}

impl Component for Sprite {
    fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        self.submit(ctx);
    }

    fn editor_update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        self.submit(ctx);
    }

    fn editor_gizmo(&mut self, ctx: &mut SceneContext<'_>) {
        // Outline of the quad in world space
        let world = ctx.world_matrix();
        let half = self.size * 0.5;
        let corners = [
            Vec3::new(-half.x, -half.y, 0.0),
            Vec3::new(half.x, -half.y, 0.0),
            Vec3::new(half.x, half.y, 0.0),
            Vec3::new(-half.x, half.y, 0.0),
        ]
        .map(|corner| world.transform_point3(corner));

        for i in 0..corners.len() {
            ctx.draw(DrawCommand::Line {
                start: corners[i],
                end: corners[(i + 1) % corners.len()],
                color: Vec4::new(1.0, 0.6, 0.0, 1.0),
            });
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

/// Mesh drawn with a material at the object's world transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshRenderer {
    pub mesh: String,
    pub material: String,
    pub visible: bool,
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self {
            mesh: String::new(),
            material: String::new(),
            visible: true,
        }
    }
}

impl MeshRenderer {
    fn submit(&self, ctx: &mut SceneContext<'_>) {
        if !self.visible || self.mesh.is_empty() {
            return;
        }
        let world = ctx.world_matrix();
        ctx.draw(DrawCommand::Mesh {
            mesh: self.mesh.clone(),
            material: self.material.clone(),
            world,
        });
    }
}

impl Component for MeshRenderer {
    fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        self.submit(ctx);
    }

    fn editor_update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        self.submit(ctx);
    }

    fn save(&self) -> Value {
        save_fields(self)
    }

    fn load(&mut self, fields: &Value) -> Result<(), SceneError> {
        *self = load_fields(fields)?;
        Ok(())
    }
}

/// Text label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Text {
    pub text: String,
    pub font_size: f32,
    pub color: Vec4,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 16.0,
            color: Vec4::ONE,
        }
    }
}

impl Component for Text {
    fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        if self.text.is_empty() {
            return;
        }
        let world = ctx.world_matrix();
        ctx.draw(DrawCommand::Text {
            text: self.text.clone(),
            font_size: self.font_size,
            color: self.color,
            world,
        });
    }

    fn save(&self) -> Value {
        save_fields(self)
    }

    fn load(&mut self, fields: &Value) -> Result<(), SceneError> {
        *self = load_fields(fields)?;
        Ok(())
    }
}
