use glam::{Mat4, Vec2, Vec3, Vec4};

/// One thing to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Textured quad
    Quad {
        texture: String,
        size: Vec2,
        color: Vec4,
        world: Mat4,
    },
    /// Mesh with a material
    Mesh {
        mesh: String,
        material: String,
        world: Mat4,
    },
    /// Text label
    Text {
        text: String,
        font_size: f32,
        color: Vec4,
        world: Mat4,
    },
    /// Debug or gizmo line in world space
    Line { start: Vec3, end: Vec3, color: Vec4 },
}

/// A command tagged with the object that submitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// `instance_id` of the submitting object, used for picking
    pub instance_id: u64,
    pub command: DrawCommand,
}

/// Draw commands collected during a tick, in submission order.
#[derive(Debug, Default)]
pub struct DrawQueue {
    submissions: Vec<Submission>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, instance_id: u64, command: DrawCommand) {
        self.submissions.push(Submission {
            instance_id,
            command,
        });
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Commands submitted by one object.
    pub fn commands_for(&self, instance_id: u64) -> impl Iterator<Item = &DrawCommand> {
        self.submissions
            .iter()
            .filter(move |s| s.instance_id == instance_id)
            .map(|s| &s.command)
    }

    /// Hand every submission to `draw`, in order.
    pub fn execute<F>(&self, mut draw: F)
    where
        F: FnMut(&Submission),
    {
        for submission in &self.submissions {
            draw(submission);
        }
    }

    /// Take every submission, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.submissions)
    }

    pub fn clear(&mut self) {
        self.submissions.clear();
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}
