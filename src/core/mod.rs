//! Core engine module
//!
//! Contains the headless engine driver, configuration, timing and tick
//! statistics

mod config;
mod engine;
mod stats;
mod time;

pub use config::{ConfigError, EngineConfig, RunMode};
pub use engine::{Engine, Game};
pub use stats::{FrameStats, TickStats};
pub use time::Time;
