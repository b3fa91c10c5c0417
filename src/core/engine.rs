//! Engine: owns the scenes and drives their ticks

use std::path::Path;
use std::time::{Duration, Instant};

use crate::core::config::{EngineConfig, RunMode};
use crate::core::stats::{FrameStats, TickStats};
use crate::core::Time;
use crate::reflect::registry;
use crate::scene::{Scene, SceneError};

/// Game trait that users implement
pub trait Game: 'static {
    /// Called once before the first frame
    fn init(&mut self, engine: &mut Engine);

    /// Called after every frame
    fn update(&mut self, _engine: &mut Engine) {}

    /// Called when the engine stops
    fn shutdown(&mut self, _engine: &mut Engine) {}
}

/// Headless engine driving a set of scenes
pub struct Engine {
    config: EngineConfig,
    time: Time,
    stats: FrameStats,
    scenes: Vec<Scene>,
    should_quit: bool,
}

impl Engine {
    /// Create an engine with no scenes
    pub fn new(config: EngineConfig) -> Self {
        registry::register_builtin_types();
        log::info!("Starting engine: {}", config.title);
        Self {
            config,
            time: Time::new(),
            stats: FrameStats::new(),
            scenes: Vec::new(),
            should_quit: false,
        }
    }

    /// Install the `env_logger` backend, using the config's filter unless
    /// `RUST_LOG` is set. Later calls are ignored.
    pub fn init_logging(config: &EngineConfig) {
        let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
        if env_logger::Builder::from_env(env).try_init().is_err() {
            log::debug!("Logger already initialized");
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Scenes
    // -------------------------------------------------------------------------

    /// Create an empty scene and make it part of the tick
    pub fn create_scene(&mut self, name: impl Into<String>) -> &mut Scene {
        let scene = Scene::with_config(name, &self.config);
        self.add_scene(scene)
    }

    /// Make an existing scene part of the tick
    pub fn add_scene(&mut self, scene: Scene) -> &mut Scene {
        log::info!("Scene '{}' added", scene.name());
        let index = self.scenes.len();
        self.scenes.push(scene);
        &mut self.scenes[index]
    }

    /// Load a scene file and make it part of the tick
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_scene(&mut self, path: impl AsRef<Path>) -> Result<&mut Scene, SceneError> {
        let scene = Scene::load_from_file(path, &self.config)?;
        Ok(self.add_scene(scene))
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut [Scene] {
        &mut self.scenes
    }

    /// First scene named `name`
    pub fn scene_by_name(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|scene| scene.name() == name)
    }

    // -------------------------------------------------------------------------
    // Ticking
    // -------------------------------------------------------------------------

    /// Advance every scene by `dt` seconds.
    ///
    /// Per scene: activation pass, object update (editor or runtime), scene
    /// hook. Scenes marked for destruction are dropped afterwards.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.time
            .advance(Duration::try_from_secs_f32(dt).unwrap_or_default());
        self.step(dt);
    }

    /// Run one tick using the configured fixed step, or the wall-clock time
    /// since the previous frame
    pub fn frame(&mut self) {
        if self.config.fixed_delta > 0.0 {
            self.tick(self.config.fixed_delta);
        } else {
            self.time.update();
            self.step(self.time.delta_seconds());
        }
    }

    fn step(&mut self, dt: f32) {
        let started = Instant::now();
        let mut stats = TickStats::default();

        for scene in &mut self.scenes {
            scene.draw_queue_mut().clear();
            scene.process_new_scene_objects();
            match self.config.run_mode {
                RunMode::Game => {
                    scene.update_scene_objects(dt);
                    scene.update_scene();
                }
                RunMode::Editor => {
                    scene.update_scene_objects_editor(dt);
                    scene.render_editor_gizmos();
                    scene.update_scene_editor();
                }
            }
            stats += scene.take_stats();
        }

        self.scenes.retain(|scene| {
            let keep = !scene.is_pending_destruction();
            if !keep {
                log::info!("Scene '{}' destroyed", scene.name());
            }
            keep
        });

        self.stats.record_tick(started.elapsed(), stats);
        log::trace!("{}", self.stats.format_stats());
    }

    /// Request the run loop to stop
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Run frames until the game quits or `max_frames` have run
    pub fn run<G: Game>(mut self, mut game: G, max_frames: Option<u64>) -> Self {
        game.init(&mut self);

        let mut frames = 0;
        while !self.should_quit && max_frames.is_none_or(|max| frames < max) {
            self.frame();
            game.update(&mut self);
            frames += 1;
        }

        game.shutdown(&mut self);
        log::info!("Engine stopped after {frames} frames");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Lifetime;
    use crate::scene::{Object, SceneHooks};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingHooks {
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl SceneHooks for CountingHooks {
        fn update_scene(&mut self, scene: &mut Scene) {
            self.calls.borrow_mut().push("update");
            if scene.object_count() == 0 {
                scene.destroy_scene();
            }
        }

        fn update_scene_editor(&mut self, _scene: &mut Scene) {
            self.calls.borrow_mut().push("editor");
        }

        fn on_scene_destruction(&mut self, _scene: &mut Scene) {
            self.calls.borrow_mut().push("destroyed");
        }
    }

    #[test]
    fn test_tick_runs_pipeline_and_drops_destroyed_scenes() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::new(EngineConfig::default());

        let scene = engine.create_scene("Level");
        scene.set_hooks(CountingHooks {
            calls: Rc::clone(&calls),
        });
        scene.spawn(Object::new("Spark").with_component(Lifetime::new(0.5)));

        engine.tick(0.25);
        assert_eq!(engine.scenes().len(), 1);
        assert_eq!(engine.stats().last().objects_started, 1);

        // Lifetime expires, the hook sees an empty scene and destroys it
        engine.tick(0.5);
        assert!(engine.scenes().is_empty());
        assert_eq!(*calls.borrow(), vec!["update", "update", "destroyed"]);
        assert_eq!(engine.time().frame_count(), 2);
    }

    #[test]
    fn test_editor_mode_uses_editor_hook() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::new(EngineConfig::default().with_run_mode(RunMode::Editor));
        engine.create_scene("Editing").set_hooks(CountingHooks {
            calls: Rc::clone(&calls),
        });

        engine.tick(0.1);
        assert_eq!(*calls.borrow(), vec!["editor"]);
    }

    struct QuitAfter(u64);

    impl Game for QuitAfter {
        fn init(&mut self, engine: &mut Engine) {
            engine.create_scene("Main");
        }

        fn update(&mut self, engine: &mut Engine) {
            if engine.time().frame_count() >= self.0 {
                engine.quit();
            }
        }
    }

    #[test]
    fn test_run_stops_on_quit() {
        let engine = Engine::new(EngineConfig::default().with_fixed_delta(0.01));
        let engine = engine.run(QuitAfter(3), Some(100));
        assert_eq!(engine.time().frame_count(), 3);
        assert!(engine.should_quit());
    }
}
