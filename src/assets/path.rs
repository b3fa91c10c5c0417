//! Virtual resource paths
//!
//! `GR:/` addresses the game's resource directory and `ER:/` the engine's
//! own resources. Any other path is used as given.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const GAME_PREFIX: &str = "GR:";
const ENGINE_PREFIX: &str = "ER:";

/// Directories the virtual prefixes resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRoots {
    /// Target of `GR:/`
    pub game: PathBuf,
    /// Target of `ER:/`
    pub engine: PathBuf,
}

impl Default for ResourceRoots {
    fn default() -> Self {
        Self {
            game: PathBuf::from("res"),
            engine: PathBuf::from("engine_res"),
        }
    }
}

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    /// Relative to the game resource root
    Game(PathBuf),
    /// Relative to the engine resource root
    Engine(PathBuf),
    /// A plain file-system path
    Plain(PathBuf),
}

impl VirtualPath {
    /// Split off a virtual prefix, if any.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let strip = |rest: &str| PathBuf::from(rest.trim_start_matches(['/', '\\']));

        if let Some(rest) = path.strip_prefix(GAME_PREFIX) {
            Self::Game(strip(rest))
        } else if let Some(rest) = path.strip_prefix(ENGINE_PREFIX) {
            Self::Engine(strip(rest))
        } else {
            Self::Plain(PathBuf::from(path))
        }
    }

    /// File-system path under `roots`.
    #[must_use]
    pub fn resolve(&self, roots: &ResourceRoots) -> PathBuf {
        match self {
            Self::Game(rest) => roots.game.join(rest),
            Self::Engine(rest) => roots.engine.join(rest),
            Self::Plain(path) => path.clone(),
        }
    }

    /// Parse and resolve in one step. Non-UTF-8 paths are used as given.
    #[must_use]
    pub fn resolve_path(path: &Path, roots: &ResourceRoots) -> PathBuf {
        match path.to_str() {
            Some(text) => Self::parse(text).resolve(roots),
            None => path.to_path_buf(),
        }
    }
}
