//! Error and diagnostic types.
//!
//! Only configuration problems are fatal. Everything that can go wrong inside
//! a tick is handled locally and surfaced as a [`SimWarning`].

use thiserror::Error;

/// Invalid startup configuration. Raised before any simulation runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("population size {population} must exceed elite count {elites}")]
    PopulationTooSmall { population: usize, elites: usize },

    #[error("tournament size must be at least 1")]
    EmptyTournament,

    #[error("mutation rate {0} outside [0, 1]")]
    MutationRate(f32),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("gap centre band [{min}, {max}] does not fit a {gap}px gap inside a {height}px screen")]
    GapBand {
        min: f32,
        max: f32,
        gap: f32,
        height: f32,
    },

    #[error("genome must have {expected} parameters, got {actual}")]
    GenomeLength { expected: usize, actual: usize },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Non-fatal diagnostics raised during a tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimWarning {
    #[error("sensor {index} out of range ({value}), clamped")]
    SensorRange { index: usize, value: f32 },

    /// A living bird whose box sat fully inside a pipe on two consecutive ticks.
    /// Collision handling should make this impossible.
    #[error("bird {bird} still alive inside an obstacle at tick {tick}")]
    CollisionInvariant { bird: usize, tick: u64 },
}

/// Failures saving or loading a training checkpoint.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint json error: {0}")]
    Json(#[from] serde_json::Error),
}
