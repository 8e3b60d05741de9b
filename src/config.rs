//! Load-time configuration.
//!
//! Every tunable constant lives here and is built once at startup, validated,
//! then passed down by reference. Values can be overridden from a TOML file:
//!
//! ```toml
//! [game]
//! gravity = 1440.0
//! scroll_speed = 150.0
//!
//! [evolution]
//! population_size = 30
//! mutation_rate = 0.1
//! noise = "gaussian"
//! ```
//!
//! Physics units are pixels and seconds. Defaults reproduce the classic
//! per-frame feel (0.4 px/frame² gravity, -7 px/frame flap) at 60 ticks/s.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// World geometry, physics and scoring.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    /// Downward acceleration (px/s²)
    pub gravity: f32,
    /// Velocity set on a flap (px/s, negative is up)
    pub flap_impulse: f32,
    /// Velocity magnitude cap (px/s), also the velocity sensor scale
    pub max_fall_speed: f32,
    /// Leftward pipe speed (px/s)
    pub scroll_speed: f32,
    pub pipe_width: f32,
    pub pipe_gap: f32,
    /// Seconds of scrolling between consecutive pipes
    pub pipe_spawn_interval: f32,
    /// Left edge of the first pipe after a reset
    pub first_pipe_x: f32,
    pub gap_center_min: f32,
    pub gap_center_max: f32,
    pub bird_x: f32,
    pub bird_radius: f32,
    pub bird_start_y: f32,
    /// Fixed simulation step (s)
    pub tick_dt: f32,
    /// Tick budget for one training generation
    pub max_ticks: u64,
    /// Fitness = survival seconds + score * score_weight
    pub score_weight: f32,
    /// Pipes whose left edge is up to this far behind the bird still count as "ahead"
    pub sensor_lookbehind: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: 800.0,
            screen_height: 600.0,
            gravity: 1440.0,
            flap_impulse: -420.0,
            max_fall_speed: 600.0,
            scroll_speed: 150.0,
            pipe_width: 80.0,
            pipe_gap: 200.0,
            pipe_spawn_interval: 4.0 / 3.0,
            first_pipe_x: 400.0,
            gap_center_min: 150.0,
            gap_center_max: 450.0,
            bird_x: 100.0,
            bird_radius: 12.0,
            bird_start_y: 300.0,
            tick_dt: 1.0 / 60.0,
            max_ticks: 1000,
            score_weight: 10.0,
            sensor_lookbehind: 50.0,
        }
    }
}

impl GameConfig {
    /// Horizontal distance between consecutive pipes
    pub fn pipe_spacing(&self) -> f32 {
        self.scroll_speed * self.pipe_spawn_interval
    }
}

/// Distribution used for mutation noise
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    /// Uniform in [-strength, strength]
    #[default]
    Uniform,
    /// Normal with standard deviation `strength`
    Gaussian,
}

/// Genetic algorithm parameters
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generation_count: u32,
    /// Per-weight probability of perturbation
    pub mutation_rate: f32,
    pub mutation_strength: f32,
    pub noise: NoiseKind,
    /// Mutated weights are clamped to [-weight_limit, weight_limit]
    pub weight_limit: f32,
    pub elite_count: usize,
    pub tournament_size: usize,
    pub initial_weight_span: f32,
    pub initial_bias_span: f32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generation_count: 20,
            mutation_rate: 0.15,
            mutation_strength: 0.3,
            noise: NoiseKind::Uniform,
            weight_limit: 3.0,
            elite_count: 3,
            tournament_size: 3,
            initial_weight_span: 2.0,
            initial_bias_span: 1.0,
        }
    }
}

/// Human-vs-AI match setup
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PlayConfig {
    pub human_start_y: f32,
    /// One AI opponent per entry
    pub opponent_start_ys: Vec<f32>,
    pub opponent_weight_span: f32,
    pub opponent_bias_span: f32,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            human_start_y: 250.0,
            opponent_start_ys: vec![300.0, 350.0, 200.0],
            opponent_weight_span: 1.5,
            opponent_bias_span: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub evolution: EvolutionConfig,
    pub play: PlayConfig,
}

impl Config {
    /// Read a TOML config. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let evo = &self.evolution;
        if evo.population_size < evo.elite_count + 1 {
            return Err(ConfigError::PopulationTooSmall {
                population: evo.population_size,
                elites: evo.elite_count,
            });
        }
        if evo.tournament_size == 0 {
            return Err(ConfigError::EmptyTournament);
        }
        if !(0.0..=1.0).contains(&evo.mutation_rate) {
            return Err(ConfigError::MutationRate(evo.mutation_rate));
        }

        let g = &self.game;
        let positive = [
            ("screen_width", g.screen_width),
            ("screen_height", g.screen_height),
            ("tick_dt", g.tick_dt),
            ("max_fall_speed", g.max_fall_speed),
            ("scroll_speed", g.scroll_speed),
            ("pipe_width", g.pipe_width),
            ("pipe_gap", g.pipe_gap),
            ("pipe_spawn_interval", g.pipe_spawn_interval),
            ("bird_radius", g.bird_radius),
            ("weight_limit", evo.weight_limit),
        ];
        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        let half_gap = g.pipe_gap / 2.0;
        if g.gap_center_min > g.gap_center_max
            || g.gap_center_min - half_gap < 0.0
            || g.gap_center_max + half_gap > g.screen_height
        {
            return Err(ConfigError::GapBand {
                min: g.gap_center_min,
                max: g.gap_center_max,
                gap: g.pipe_gap,
                height: g.screen_height,
            });
        }
        Ok(())
    }
}
