use crate::ai::{self, NeuralController};
use crate::config::GameConfig;
use crate::error::SimWarning;
use crate::physics::{self, Aabb};
use crate::pipes::PipeField;

/// What decides a bird's flaps
#[derive(Clone, Debug, PartialEq)]
pub enum Pilot {
    /// Flaps come from the player's input
    Human,
    Neural(NeuralController),
}

/// How a bird's run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Death {
    OutOfBounds,
    Pipe,
}

/// A simulated bird and its fitness accumulators
#[derive(Clone, Debug)]
pub struct Bird {
    pub x: f32,
    pub y: f32,
    pub vel: f32,
    pub alive: bool,
    pub death: Option<Death>,
    /// Pipes passed
    pub score: u32,
    /// Seconds survived
    pub survival_time: f32,
    pub fitness: f32,
    pub pilot: Pilot,
    /// Id of the most recent pipe credited to this bird
    last_scored: Option<u64>,
    /// Ticks in a row spent alive with the box fully inside a pipe
    embedded_ticks: u32,
}

impl Bird {
    pub fn new(x: f32, y: f32, pilot: Pilot) -> Self {
        Self {
            x,
            y,
            vel: 0.0,
            alive: true,
            death: None,
            score: 0,
            survival_time: 0.0,
            fitness: 0.0,
            pilot,
            last_scored: None,
            embedded_ticks: 0,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self.pilot, Pilot::Human)
    }

    pub fn bounds(&self, cfg: &GameConfig) -> Aabb {
        Aabb::around(self.x, self.y, cfg.bird_radius)
    }

    /// Flap decision for this tick. Humans use `human_flap`, neural birds read
    /// their sensors; any clamped sensor is reported through `warnings`.
    pub fn wants_flap(
        &self,
        human_flap: bool,
        pipes: &PipeField,
        cfg: &GameConfig,
        warnings: &mut Vec<SimWarning>,
    ) -> bool {
        match &self.pilot {
            Pilot::Human => human_flap,
            Pilot::Neural(brain) => {
                let sensors = ai::sense(self.x, self.y, self.vel, pipes, cfg);
                warnings.extend(sensors.warnings);
                brain.decide(&sensors.inputs)
            }
        }
    }

    /// Integrate one step of physics. Dead birds do not move.
    pub fn integrate(&mut self, flap: bool, dt: f32, cfg: &GameConfig) {
        if !self.alive {
            return;
        }
        let (y, vel) = physics::integrate(self.y, self.vel, flap, dt, cfg);
        self.y = y;
        self.vel = vel;
    }

    /// Check bounds and pipes after integration. Returns true if this tick killed the bird.
    pub fn check_collisions(&mut self, pipes: &PipeField, cfg: &GameConfig) -> bool {
        if !self.alive {
            return false;
        }
        if physics::out_of_bounds(self.y, cfg) {
            self.kill(Death::OutOfBounds, cfg);
            return true;
        }
        let body = self.bounds(cfg);
        if pipes.pipes().any(|p| p.collides(&body)) {
            self.kill(Death::Pipe, cfg);
            return true;
        }
        false
    }

    /// Credit every pipe whose centre the bird has passed, once each.
    /// Returns the number of newly credited pipes.
    pub fn update_score(&mut self, pipes: &PipeField) -> u32 {
        if !self.alive {
            return 0;
        }
        let mut gained = 0;
        for pipe in pipes.pipes() {
            if pipe.center_x() >= self.x {
                break;
            }
            if self.last_scored.map_or(true, |id| pipe.id > id) {
                self.last_scored = Some(pipe.id);
                self.score += 1;
                gained += 1;
            }
        }
        gained
    }

    /// Track consecutive ticks alive inside solid pipe. Two in a row means
    /// collision handling missed something.
    pub fn audit_embedding(&mut self, pipes: &PipeField, cfg: &GameConfig) -> bool {
        if !self.alive {
            self.embedded_ticks = 0;
            return false;
        }
        let body = self.bounds(cfg);
        if pipes.pipes().any(|p| p.engulfs(&body)) {
            self.embedded_ticks += 1;
        } else {
            self.embedded_ticks = 0;
        }
        self.embedded_ticks >= 2
    }

    /// Accumulate survival time for a tick the bird lived through
    pub fn survive(&mut self, dt: f32) {
        if self.alive {
            self.survival_time += dt;
        }
    }

    /// Terminal: a dead bird never comes back
    pub fn kill(&mut self, cause: Death, cfg: &GameConfig) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.death = Some(cause);
        self.finalize_fitness(cfg);
    }

    /// survival seconds + score * score_weight
    pub fn finalize_fitness(&mut self, cfg: &GameConfig) {
        self.fitness = self.survival_time + self.score as f32 * cfg.score_weight;
    }
}
