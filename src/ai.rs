use crate::config::GameConfig;
use crate::error::{ConfigError, SimWarning};
use crate::pipes::PipeField;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sensor inputs, in order: bird height, bird velocity,
/// distance to the next pipe, that pipe's gap centre
pub const NUM_INPUTS: usize = 4;

/// Input weights followed by a single bias
pub const GENOME_SIZE: usize = NUM_INPUTS + 1;

/// Expected range of each normalized sensor; values outside are clamped
const SENSOR_RANGES: [(f32, f32); NUM_INPUTS] =
    [(0.0, 1.0), (-1.0, 1.0), (-1.0, 1.0), (0.0, 1.0)];

/// Weights and bias of a single-layer perceptron
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Genome {
    pub(crate) weights: Vec<f32>,
}

impl Genome {
    /// Build from raw parameters; the length must be exactly [`GENOME_SIZE`]
    pub fn from_weights(weights: Vec<f32>) -> Result<Self, ConfigError> {
        if weights.len() != GENOME_SIZE {
            return Err(ConfigError::GenomeLength {
                expected: GENOME_SIZE,
                actual: weights.len(),
            });
        }
        Ok(Self { weights })
    }

    /// Random weights in [-weight_span, weight_span], bias in [-bias_span, bias_span]
    pub fn random(rng: &mut impl Rng, weight_span: f32, bias_span: f32) -> Self {
        let mut weights: Vec<f32> = (0..NUM_INPUTS)
            .map(|_| sample_span(rng, weight_span))
            .collect();
        weights.push(sample_span(rng, bias_span));
        Self { weights }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> f32 {
        self.weights[NUM_INPUTS]
    }
}

impl TryFrom<Vec<f32>> for Genome {
    type Error = ConfigError;

    fn try_from(weights: Vec<f32>) -> Result<Self, Self::Error> {
        Self::from_weights(weights)
    }
}

impl From<Genome> for Vec<f32> {
    fn from(genome: Genome) -> Self {
        genome.weights
    }
}

fn sample_span(rng: &mut impl Rng, span: f32) -> f32 {
    if span > 0.0 {
        rng.gen_range(-span..=span)
    } else {
        0.0
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Flap controller driven by a genome
#[derive(Clone, Debug, PartialEq)]
pub struct NeuralController {
    genome: Genome,
}

impl NeuralController {
    pub fn new(genome: Genome) -> Self {
        Self { genome }
    }

    #[cfg(test)]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Weighted sum plus bias, squashed through the logistic function
    pub fn activation(&self, inputs: &[f32; NUM_INPUTS]) -> f32 {
        let w = self.genome.weights();
        let sum: f32 = inputs.iter().zip(w).map(|(x, w)| x * w).sum();
        // exp overflows well before 500, keep the sigmoid finite
        sigmoid((sum + self.genome.bias()).clamp(-500.0, 500.0))
    }

    /// Flap iff the activation exceeds one half
    pub fn decide(&self, inputs: &[f32; NUM_INPUTS]) -> bool {
        self.activation(inputs) > 0.5
    }
}

/// Normalized sensor vector plus any clamping that happened while building it
#[derive(Clone, Debug)]
pub struct Sensors {
    pub inputs: [f32; NUM_INPUTS],
    pub warnings: Vec<SimWarning>,
}

/// Read the four sensors for a bird at (`x`, `y`) moving at `vel`.
///
///   0: y / screen height
///   1: velocity / max fall speed
///   2: (next pipe x - bird x) / screen width, 1.0 with no pipe ahead
///   3: next gap centre / screen height, 0.5 with no pipe ahead
pub fn sense(x: f32, y: f32, vel: f32, pipes: &PipeField, cfg: &GameConfig) -> Sensors {
    let (distance, gap) = match pipes.nearest_ahead(x, cfg.sensor_lookbehind) {
        Some(pipe) => (
            (pipe.x - x) / cfg.screen_width,
            pipe.gap_center / cfg.screen_height,
        ),
        None => (1.0, 0.5),
    };

    let raw = [
        y / cfg.screen_height,
        vel / cfg.max_fall_speed,
        distance,
        gap,
    ];

    let mut inputs = [0.0; NUM_INPUTS];
    let mut warnings = Vec::new();
    for (index, (&value, &(lo, hi))) in raw.iter().zip(&SENSOR_RANGES).enumerate() {
        let clamped = value.clamp(lo, hi);
        if clamped != value {
            tracing::trace!(index, value, "sensor clamped");
            warnings.push(SimWarning::SensorRange { index, value });
        }
        inputs[index] = clamped;
    }

    Sensors { inputs, warnings }
}
