//! Draw submission
//!
//! Components describe what to draw each tick; a host renderer drains the
//! queue afterwards.

mod queue;

pub use queue::{DrawCommand, DrawQueue, Submission};
