//! # engine_app — demo runner
//!
//! Builds an [`EngineContext`] and a [`World`], populates a demo scene and
//! drives it with a fixed-timestep tick loop.
//!
//! ## Startup Sequence
//!
//! 1. Load the JSON config (optional) and apply command-line overrides.
//! 2. Build the worker pool and the world with the kinematic solver.
//! 3. Register the demo systems and spawn the scene.
//! 4. Run the tick loop until `--max-ticks` is reached (or forever).

mod config;
mod demo;
mod tick;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use engine_ecs::{EngineContext, NetworkBridge, World};
use engine_math::Transform;
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use demo::{KinematicSolver, LogBridge, Stats, StatsHooks};
use tick::{TickConfig, TickLoop};

#[derive(Debug, Parser)]
#[command(name = "engine_app", about = "Runs a demo scene on the ECS runtime")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of entities to spawn
    #[arg(short, long)]
    entities: Option<usize>,

    /// Stop after this many ticks (0 = run forever)
    #[arg(short, long)]
    max_ticks: Option<u64>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Worker thread count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Disable the physics link systems
    #[arg(long)]
    no_physics: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(entities) = self.entities {
            config.entities = entities;
        }
        if let Some(max_ticks) = self.max_ticks {
            config.max_ticks = max_ticks;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(workers) = self.workers {
            config.engine.worker_threads = Some(workers);
        }
        if self.no_physics {
            config.physics = false;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(?config, "engine starting");

    let context = EngineContext::new(config.engine.clone())?
        .with_network(Arc::new(LogBridge) as Arc<dyn NetworkBridge>);
    let stats = Arc::new(Stats::default());
    let world = World::builder(Arc::new(context))
        .solver(Arc::new(KinematicSolver::default()))
        .hooks(StatsHooks::new(Arc::clone(&stats)))
        .render_type::<Transform>()
        .build();

    if config.physics {
        world.init_physics();
    }
    demo::register_systems(
        &world,
        stats,
        Duration::from_millis(config.report_interval_ms),
    );
    demo::populate(&world, config.entities);

    let tick_config = TickConfig {
        tick_rate: config.tick_rate,
        max_ticks: config.max_ticks,
        time_scale: config.time_scale,
    };
    let mut tick_loop = TickLoop::new(Arc::clone(&world), tick_config).on_frame(|frame| {
        trace!(tick = frame.tick, items = frame.len(), "frame published");
    });
    tick_loop.run()?;

    info!(ticks = tick_loop.ticks(), entities = world.entity_count(), "engine shut down");
    Ok(())
}
