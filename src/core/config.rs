//! Engine configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::ResourceRoots;
use crate::scene::SceneFormat;

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(String),
}

/// Which update path the engine drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// `update` on every component
    #[default]
    Game,
    /// `editor_update` on every component, plus gizmos
    Editor,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application name, used in log output
    pub title: String,
    pub run_mode: RunMode,
    /// Where scenes without a file are saved
    pub scenes_dir: PathBuf,
    /// Format written by scene and template saves
    pub scene_format: SceneFormat,
    /// Targets of the `GR:/` and `ER:/` prefixes
    pub resource_roots: ResourceRoots,
    /// Cap on objects and components activated in one tick
    pub max_activations_per_tick: usize,
    /// Fixed step used by [`Engine::frame`](super::Engine::frame) (0 for real time)
    pub fixed_delta: f32,
    /// `env_logger` filter applied when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("Engine"),
            run_mode: RunMode::Game,
            scenes_dir: PathBuf::from("scenes"),
            scene_format: SceneFormat::Json,
            resource_roots: ResourceRoots::default(),
            max_activations_per_tick: 65_536,
            fixed_delta: 0.0,
            log_filter: String::from("info"),
        }
    }
}

impl EngineConfig {
    /// Load a RON or JSON config file. Absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        SceneFormat::detect(path, &content)
            .parse(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Set the application name
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the run mode
    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    /// Set the default scene directory
    pub fn with_scenes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scenes_dir = dir.into();
        self
    }

    /// Set the format written by saves
    pub fn with_scene_format(mut self, format: SceneFormat) -> Self {
        self.scene_format = format;
        self
    }

    /// Set the virtual path roots
    pub fn with_resource_roots(mut self, roots: ResourceRoots) -> Self {
        self.resource_roots = roots;
        self
    }

    /// Set the activation cap per tick
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations_per_tick = max;
        self
    }

    /// Use a fixed tick length in seconds
    pub fn with_fixed_delta(mut self, dt: f32) -> Self {
        self.fixed_delta = dt;
        self
    }

    /// Set the default log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ron_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");
        fs::write(&path, "(title: \"Demo\", run_mode: Editor)").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.title, "Demo");
        assert_eq!(config.run_mode, RunMode::Editor);
        assert_eq!(config.max_activations_per_tick, 65_536);
        assert_eq!(config.scenes_dir, PathBuf::from("scenes"));
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "scene_format": "Ron", "fixed_delta": 0.5 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.scene_format, SceneFormat::Ron);
        assert_eq!(config.fixed_delta, 0.5);
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, "{ \"title\": 5 }").unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            EngineConfig::load(dir.path().join("missing.ron")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_title("Editor")
            .with_run_mode(RunMode::Editor)
            .with_max_activations(8);
        assert_eq!(config.title, "Editor");
        assert_eq!(config.max_activations_per_tick, 8);
    }
}
