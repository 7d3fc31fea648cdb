//! Fixed-timestep tick loop.
//!
//! Each iteration calls [`World::tick`] with the frame delta (scaled by the
//! configured time scale), hands a freshly published render frame to the
//! frame sink, and sleeps off whatever is left of the frame budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use engine_ecs::{FrameData, World};
use tracing::{debug, info, warn};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Multiplier applied to the frame delta.
    pub time_scale: f32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            time_scale: 1.0,
        }
    }
}

type FrameSink = Box<dyn FnMut(&FrameData)>;

/// Drives a world at a fixed rate.
pub struct TickLoop {
    ticks: u64,
    config: TickConfig,
    world: Arc<World>,
    sink: Option<FrameSink>,
}

impl TickLoop {
    #[must_use]
    pub fn new(world: Arc<World>, config: TickConfig) -> Self {
        Self {
            ticks: 0,
            config,
            world,
            sink: None,
        }
    }

    /// Receive every newly published render frame.
    #[must_use]
    pub fn on_frame(mut self, sink: impl FnMut(&FrameData) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Ticks completed by this loop.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    fn budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.tick_rate)
    }

    /// Run a single tick with the given delta in seconds.
    ///
    /// # Errors
    ///
    /// Propagates the world's tick failure.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        let scale = dt * self.config.time_scale;
        self.world
            .tick(scale)
            .with_context(|| format!("tick {} failed", self.ticks + 1))?;
        self.ticks += 1;

        if self.world.take_new_frame()
            && let Some(sink) = self.sink.as_mut()
        {
            sink(&self.world.frame());
        }
        debug!(tick = self.ticks, scale, "tick complete");
        Ok(())
    }

    /// Tick until `max_ticks` is reached, or forever when it is 0.
    ///
    /// # Errors
    ///
    /// Stops at the first failed tick.
    pub fn run(&mut self) -> Result<()> {
        let budget = self.budget();
        let warn_over_budget = self.world.context().config().tick_budget_warn;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            time_scale = self.config.time_scale,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            self.tick(budget.as_secs_f32())?;

            if self.config.max_ticks > 0 && self.ticks >= self.config.max_ticks {
                info!(ticks = self.ticks, "tick loop complete");
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            } else if warn_over_budget {
                warn!(
                    tick = self.ticks,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
