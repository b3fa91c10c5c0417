//! Headless demo: a small scene that spawns, moves and expires objects

use scene_engine::prelude::*;

/// Spawns a short-lived spark every half second
#[derive(Default)]
struct Emitter {
    cooldown: f32,
    spawned: u32,
}

impl Component for Emitter {
    fn update(&mut self, ctx: &mut SceneContext<'_>, dt: f32) {
        self.cooldown -= dt;
        if self.cooldown > 0.0 {
            return;
        }
        self.cooldown = 0.5;
        self.spawned += 1;

        let Some(spark) = ctx.spawn_child_object_by_name("Object") else {
            return;
        };
        if let Some(mut spark) = ctx.object_mut(spark) {
            spark.set_name(format!("Spark_{}", self.spawned));
            spark.add_boxed_component(Box::new(Lifetime::new(1.2)));
            spark.add_boxed_component(Box::new(Velocity {
                linear: Vec3::new(0.0, 2.0, 0.0),
                angular: Vec3::ZERO,
            }));
        }
    }
}

struct Demo;

impl Game for Demo {
    fn init(&mut self, engine: &mut Engine) {
        if let Err(e) = register_component_type::<Emitter>("Emitter") {
            log::warn!("{e}");
        }

        let scene = engine.create_scene("Demo");
        let root = scene.spawn(
            Object::new("Fountain")
                .with_transform(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))
                .with_component(Sprite {
                    texture: "GR:/fountain.png".into(),
                    ..Sprite::default()
                })
                .with_component(Emitter::default()),
        );
        log::info!("Spawned fountain {root}");
    }

    fn update(&mut self, engine: &mut Engine) {
        if engine.time().frame_count() % 30 == 0 {
            log::info!("{}", engine.stats().format_stats());
        }
        if engine.time().elapsed_seconds() >= 3.0 {
            engine.quit();
        }
    }

    fn shutdown(&mut self, engine: &mut Engine) {
        let dir = std::env::temp_dir().join("scene_engine_demo");
        for scene in engine.scenes_mut() {
            match scene.save_to_path(dir.join(format!("{}.scn", scene.name()))) {
                Ok(()) => log::info!(
                    "Saved '{}' with {} objects",
                    scene.name(),
                    scene.object_count()
                ),
                Err(e) => log::error!("Failed to save '{}': {e}", scene.name()),
            }
        }
    }
}

fn main() {
    let config = EngineConfig::default()
        .with_title("Scene demo")
        .with_fixed_delta(1.0 / 60.0);
    Engine::init_logging(&config);

    Engine::new(config).run(Demo, Some(10_000));
}
