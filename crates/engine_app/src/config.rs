//! Runner configuration: a JSON file, then command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use engine_ecs::EngineConfig;
use serde::{Deserialize, Serialize};

/// Everything the runner needs to build and drive a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Ticks to run before exiting (0 = unlimited).
    pub max_ticks: u64,
    /// Multiplier applied to the frame delta handed to systems.
    pub time_scale: f32,
    /// Entities spawned into the demo scene.
    pub entities: usize,
    /// Install the physics link systems.
    pub physics: bool,
    /// Interval of the statistics reporter, in milliseconds.
    pub report_interval_ms: u64,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            time_scale: 1.0,
            entities: 256,
            physics: true,
            report_interval_ms: 1000,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid JSON.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or out-of-range values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the tick loop cannot run with.
    ///
    /// # Errors
    ///
    /// Fails if the tick rate or time scale is not positive.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick_rate must be positive, got {}",
            self.tick_rate
        );
        anyhow::ensure!(
            self.time_scale.is_finite() && self.time_scale > 0.0,
            "time_scale must be positive, got {}",
            self.time_scale
        );
        Ok(())
    }
}
