use crate::ai::{Genome, NeuralController};
use crate::bird::{Bird, Pilot};
use crate::config::{Config, GameConfig};
use crate::error::SimWarning;
use crate::pipes::{Pipe, PipeField};
use rand::Rng;

/// Which game the world is running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// A population of neural birds, evaluated for fitness
    Training,
    /// One human against a few neural opponents
    Playable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldState {
    Running,
    /// Training: every bird is dead or the tick budget ran out
    GenerationComplete,
    /// Playable: the human died
    MatchOver,
}

/// Player input sampled once per tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickInput {
    pub flap: bool,
    pub restart: bool,
}

/// Final standing of one bird in a playable match
#[derive(Clone, Debug, PartialEq)]
pub struct Standing {
    pub bird: usize,
    pub human: bool,
    pub score: u32,
}

/// Read-only view of a bird for drawing
#[derive(Clone, Debug, PartialEq)]
pub struct BirdView {
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub human: bool,
    pub score: u32,
}

/// Everything presentation needs for one frame
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub mode: Mode,
    pub state: WorldState,
    pub tick: u64,
    pub birds: Vec<BirdView>,
    pub pipes: Vec<Pipe>,
    pub standings: Option<Vec<Standing>>,
}

impl Snapshot {
    pub fn alive_count(&self) -> usize {
        self.birds.iter().filter(|b| b.alive).count()
    }
}

/// Birds and pipes for one generation or one match
pub struct World {
    pub mode: Mode,
    pub state: WorldState,
    pub birds: Vec<Bird>,
    pub pipes: PipeField,
    pub tick: u64,
    /// Training tick budget; None runs until every bird is dead
    pub max_ticks: Option<u64>,
    /// Playable restarts draw fresh random opponents when set
    pub reroll_on_restart: bool,
    config: Config,
    /// Genomes the current birds were built from, reused on restart
    genomes: Vec<Genome>,
    sensor_warnings: u64,
    violations: Vec<SimWarning>,
}

impl World {
    /// A training world with one neural bird per genome, all at the same start
    pub fn training(config: &Config, genomes: Vec<Genome>, rng: &mut impl Rng) -> Self {
        let mut world = Self::empty(config, Mode::Training, genomes);
        world.max_ticks = Some(config.game.max_ticks);
        world.reset(rng);
        world
    }

    /// A playable world: the human is bird 0, then one neural opponent per genome
    pub fn playable(config: &Config, opponents: Vec<Genome>, rng: &mut impl Rng) -> Self {
        let mut world = Self::empty(config, Mode::Playable, opponents);
        world.reset(rng);
        world
    }

    fn empty(config: &Config, mode: Mode, genomes: Vec<Genome>) -> Self {
        Self {
            mode,
            state: WorldState::Running,
            birds: Vec::new(),
            pipes: PipeField::empty(),
            tick: 0,
            max_ticks: None,
            reroll_on_restart: true,
            config: config.clone(),
            genomes,
            sensor_warnings: 0,
            violations: Vec::new(),
        }
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.config.game
    }

    /// Rebuild birds and pipes from scratch. Nothing from the previous run survives.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        let cfg = &self.config.game;
        let neural = |g: &Genome, y: f32| {
            Bird::new(cfg.bird_x, y, Pilot::Neural(NeuralController::new(g.clone())))
        };

        self.birds = match self.mode {
            Mode::Training => self
                .genomes
                .iter()
                .map(|g| neural(g, cfg.bird_start_y))
                .collect(),
            Mode::Playable => {
                let play = &self.config.play;
                let mut birds = vec![Bird::new(cfg.bird_x, play.human_start_y, Pilot::Human)];
                birds.extend(
                    self.genomes
                        .iter()
                        .zip(&play.opponent_start_ys)
                        .map(|(g, &y)| neural(g, y)),
                );
                birds
            }
        };
        self.pipes = PipeField::new(cfg, rng);
        self.tick = 0;
        self.state = WorldState::Running;
        self.sensor_warnings = 0;
        self.violations.clear();
    }

    /// Start over with a fresh field; playable opponents are re-rolled unless pinned
    pub fn restart(&mut self, rng: &mut impl Rng) {
        if self.mode == Mode::Playable && self.reroll_on_restart {
            let play = &self.config.play;
            self.genomes = (0..self.genomes.len())
                .map(|_| Genome::random(rng, play.opponent_weight_span, play.opponent_bias_span))
                .collect();
        }
        tracing::debug!(mode = ?self.mode, "world restarted");
        self.reset(rng);
    }

    pub fn is_running(&self) -> bool {
        self.state == WorldState::Running
    }

    pub fn alive_count(&self) -> usize {
        self.birds.iter().filter(|b| b.alive).count()
    }

    pub fn human(&self) -> Option<&Bird> {
        self.birds.iter().find(|b| b.is_human())
    }

    pub fn sensor_warnings(&self) -> u64 {
        self.sensor_warnings
    }

    /// Collision invariant violations seen so far; expected to stay empty
    pub fn violations(&self) -> &[SimWarning] {
        &self.violations
    }

    /// Advance the world by one tick.
    ///
    /// A restart is handled first and replaces the tick. Otherwise pipes
    /// scroll, every living bird decides against the same post-scroll field,
    /// then each bird moves, collides and scores on its own.
    pub fn step(&mut self, input: TickInput, dt: f32, rng: &mut impl Rng) {
        if input.restart {
            self.restart(rng);
            return;
        }
        if !self.is_running() {
            return;
        }

        let cfg = &self.config.game;
        self.pipes.advance(dt, cfg, rng);

        // Decide first so no bird sees another bird's update this tick
        let mut warnings = Vec::new();
        let flaps: Vec<bool> = self
            .birds
            .iter()
            .map(|b| b.alive && b.wants_flap(input.flap, &self.pipes, cfg, &mut warnings))
            .collect();
        self.sensor_warnings += warnings.len() as u64;

        for (i, (bird, flap)) in self.birds.iter_mut().zip(flaps).enumerate() {
            if !bird.alive {
                continue;
            }
            bird.integrate(flap, dt, cfg);
            if bird.check_collisions(&self.pipes, cfg) {
                tracing::debug!(
                    bird = i,
                    tick = self.tick,
                    score = bird.score,
                    fitness = bird.fitness,
                    cause = ?bird.death,
                    "bird died"
                );
                continue;
            }
            bird.update_score(&self.pipes);
            bird.survive(dt);

            if bird.audit_embedding(&self.pipes, cfg) {
                let violation = SimWarning::CollisionInvariant {
                    bird: i,
                    tick: self.tick,
                };
                tracing::error!("{violation}");
                self.violations.push(violation);
            }
        }

        self.tick += 1;
        self.update_state();
    }

    fn update_state(&mut self) {
        match self.mode {
            Mode::Training => {
                let timed_out = self.max_ticks.is_some_and(|max| self.tick >= max);
                if self.alive_count() == 0 || timed_out {
                    let cfg = &self.config.game;
                    for bird in self.birds.iter_mut().filter(|b| b.alive) {
                        bird.finalize_fitness(cfg);
                    }
                    self.state = WorldState::GenerationComplete;
                }
            }
            Mode::Playable => {
                if self.human().map_or(true, |h| !h.alive) {
                    for bird in self.birds.iter_mut().filter(|b| b.alive) {
                        bird.finalize_fitness(&self.config.game);
                    }
                    self.state = WorldState::MatchOver;
                    if let Some(winner) = self.standings().first() {
                        tracing::info!(
                            winner = winner.bird,
                            human = winner.human,
                            score = winner.score,
                            "match over"
                        );
                    }
                }
            }
        }
    }

    /// Run until the world stops running
    pub fn run_to_end(&mut self, rng: &mut impl Rng) {
        let dt = self.config.game.tick_dt;
        while self.is_running() {
            self.step(TickInput::default(), dt, rng);
        }
    }

    /// Birds ranked by score, highest first; ties keep bird order (human first)
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .birds
            .iter()
            .enumerate()
            .map(|(i, b)| Standing {
                bird: i,
                human: b.is_human(),
                score: b.score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    /// Final fitness per bird, in bird order
    pub fn fitnesses(&self) -> Vec<f32> {
        self.birds.iter().map(|b| b.fitness).collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode,
            state: self.state,
            tick: self.tick,
            birds: self
                .birds
                .iter()
                .map(|b| BirdView {
                    x: b.x,
                    y: b.y,
                    alive: b.alive,
                    human: b.is_human(),
                    score: b.score,
                })
                .collect(),
            pipes: self.pipes.pipes().cloned().collect(),
            standings: (self.state == WorldState::MatchOver).then(|| self.standings()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bird::Death;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPSILON: f32 = 1e-3;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    impl TickInput {
        fn flap() -> Self {
            Self {
                flap: true,
                ..Default::default()
            }
        }

        fn restart() -> Self {
            Self {
                restart: true,
                ..Default::default()
            }
        }
    }

    fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn genome(weights: [f32; 5]) -> Genome {
        Genome::from_weights(weights.to_vec()).unwrap()
    }

    fn never_flap() -> Genome {
        genome([0.0, 0.0, 0.0, 0.0, -1.0])
    }

    fn random_genomes(n: usize, rng: &mut StdRng) -> Vec<Genome> {
        (0..n).map(|_| Genome::random(rng, 2.0, 1.0)).collect()
    }

    /// Pipes placed far to the right so nothing scrolls in during short tests
    fn far_pipes_config() -> Config {
        let mut cfg = Config::default();
        cfg.game.first_pipe_x = 5000.0;
        cfg
    }

    // --- End-to-end scenarios ---

    #[test]
    fn single_bird_falls_under_gravity() {
        let mut cfg = far_pipes_config();
        cfg.game.gravity = 10.0;
        cfg.game.flap_impulse = -5.0;
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap()], &mut rng);
        world.pipes = PipeField::empty();

        let y0 = world.birds[0].y;
        world.step(TickInput::default(), 1.0, &mut rng);

        let bird = &world.birds[0];
        assert!(bird.alive);
        assert!(approx_eq(bird.vel, 10.0));
        assert!(approx_eq(bird.y - y0, 10.0));
    }

    #[test]
    fn bird_at_ceiling_moving_up_dies_with_zero_fitness() {
        let cfg = far_pipes_config();
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap()], &mut rng);
        world.birds[0].y = 0.0;
        world.birds[0].vel = -300.0;

        world.step(TickInput::default(), cfg.game.tick_dt, &mut rng);

        let bird = &world.birds[0];
        assert!(!bird.alive);
        assert_eq!(bird.death, Some(Death::OutOfBounds));
        assert_eq!(bird.survival_time, 0.0);
        assert_eq!(bird.score, 0);
        assert_eq!(bird.fitness, 0.0);
        assert_eq!(world.state, WorldState::GenerationComplete);
    }

    // --- State machine ---

    #[test]
    fn training_ends_when_all_dead() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap(); 5], &mut rng);
        world.run_to_end(&mut rng);
        assert_eq!(world.state, WorldState::GenerationComplete);
        assert_eq!(world.alive_count(), 0);
        assert!(world.tick < cfg.game.max_ticks);
    }

    #[test]
    fn training_ends_on_tick_budget() {
        let mut cfg = far_pipes_config();
        cfg.game.max_ticks = 10;
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap()], &mut rng);
        world.run_to_end(&mut rng);
        assert_eq!(world.tick, 10);
        assert_eq!(world.state, WorldState::GenerationComplete);

        // Survivor gets fitness from its survival time
        let bird = &world.birds[0];
        assert!(bird.alive);
        assert!(approx_eq(bird.fitness, 10.0 * cfg.game.tick_dt));
    }

    #[test]
    fn finished_world_ignores_steps() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap()], &mut rng);
        world.run_to_end(&mut rng);
        let tick = world.tick;
        world.step(TickInput::flap(), cfg.game.tick_dt, &mut rng);
        assert_eq!(world.tick, tick);
    }

    #[test]
    fn human_death_ends_match() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let mut world = World::playable(&cfg, random_genomes(3, &mut rng), &mut rng);
        assert_eq!(world.birds.len(), 4);
        assert!(world.birds[0].is_human());

        // Never flapping, the human hits the ground
        world.run_to_end(&mut rng);
        assert_eq!(world.state, WorldState::MatchOver);
        assert!(!world.birds[0].alive);

        let snap = world.snapshot();
        let standings = snap.standings.unwrap();
        assert_eq!(standings.len(), 4);
        assert!(standings.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn playable_keeps_running_while_human_lives() {
        let cfg = far_pipes_config();
        let mut rng = seeded_rng();
        let mut world = World::playable(&cfg, vec![never_flap(); 3], &mut rng);
        for _ in 0..200 {
            // Keep the human airborne by flapping whenever it drops below its start
            let flap = world.birds[0].y > cfg.play.human_start_y;
            world.step(TickInput { flap, restart: false }, cfg.game.tick_dt, &mut rng);
        }
        assert!(world.birds[0].alive);
        assert!(world.is_running());
        // The opponents never flap and are on the ground by now
        assert!(world.birds[1..].iter().all(|b| !b.alive));
    }

    #[test]
    fn restart_rebuilds_everything() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let mut world = World::playable(&cfg, random_genomes(3, &mut rng), &mut rng);
        world.run_to_end(&mut rng);
        assert_eq!(world.state, WorldState::MatchOver);

        world.step(TickInput::restart(), cfg.game.tick_dt, &mut rng);
        assert!(world.is_running());
        assert_eq!(world.tick, 0);
        assert_eq!(world.birds.len(), 4);
        assert!(world.birds.iter().all(|b| b.alive && b.score == 0));
        assert!(approx_eq(world.birds[0].y, cfg.play.human_start_y));
        assert!(approx_eq(world.pipes.pipes().next().unwrap().x, cfg.game.first_pipe_x));
    }

    #[test]
    fn pinned_opponents_survive_restart() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let genomes = random_genomes(3, &mut rng);
        let mut world = World::playable(&cfg, genomes.clone(), &mut rng);
        world.reroll_on_restart = false;
        world.step(TickInput::restart(), cfg.game.tick_dt, &mut rng);

        let brains: Vec<&Genome> = world.birds[1..]
            .iter()
            .filter_map(|b| match &b.pilot {
                Pilot::Neural(c) => Some(c.genome()),
                Pilot::Human => None,
            })
            .collect();
        assert_eq!(brains, genomes.iter().collect::<Vec<_>>());
    }

    #[test]
    fn restart_rerolls_opponents_by_default() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let genomes = random_genomes(3, &mut rng);
        let mut world = World::playable(&cfg, genomes.clone(), &mut rng);
        world.restart(&mut rng);
        match &world.birds[1].pilot {
            Pilot::Neural(c) => assert_ne!(c.genome(), &genomes[0]),
            Pilot::Human => panic!("bird 1 should be an opponent"),
        }
    }

    #[test]
    fn restart_applies_in_training_too() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let genomes = random_genomes(4, &mut rng);
        let mut world = World::training(&cfg, genomes.clone(), &mut rng);
        for _ in 0..30 {
            world.step(TickInput::default(), cfg.game.tick_dt, &mut rng);
        }
        world.step(TickInput::restart(), cfg.game.tick_dt, &mut rng);

        assert_eq!(world.tick, 0);
        assert!(world.birds.iter().all(|b| b.alive && b.survival_time == 0.0));
        // Training genomes are never re-rolled
        match &world.birds[0].pilot {
            Pilot::Neural(c) => assert_eq!(c.genome(), &genomes[0]),
            Pilot::Human => panic!("training has no human"),
        }
    }

    // --- Invariants ---

    #[test]
    fn dead_birds_stay_dead_and_living_birds_stay_in_bounds() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let genomes = random_genomes(20, &mut rng);
        let mut world = World::training(&cfg, genomes, &mut rng);

        let mut was_alive = vec![true; 20];
        let mut scores = vec![0u32; 20];
        while world.is_running() {
            world.step(TickInput::default(), cfg.game.tick_dt, &mut rng);
            for (i, bird) in world.birds.iter().enumerate() {
                if !was_alive[i] {
                    assert!(!bird.alive, "bird {i} came back to life");
                }
                if bird.alive {
                    assert!(bird.y > 0.0 && bird.y < cfg.game.screen_height);
                }
                assert!(bird.score >= scores[i]);
                assert!(bird.score - scores[i] <= 1);
                was_alive[i] = bird.alive;
                scores[i] = bird.score;
            }
        }
        assert!(world.violations().is_empty());
    }

    #[test]
    fn order_of_birds_does_not_change_outcome() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let genomes = random_genomes(10, &mut rng);
        let mut reversed = genomes.clone();
        reversed.reverse();

        let mut a = World::training(&cfg, genomes, &mut StdRng::seed_from_u64(5));
        let mut b = World::training(&cfg, reversed, &mut StdRng::seed_from_u64(5));
        a.run_to_end(&mut StdRng::seed_from_u64(6));
        b.run_to_end(&mut StdRng::seed_from_u64(6));

        let fa = a.fitnesses();
        let mut fb = b.fitnesses();
        fb.reverse();
        assert_eq!(fa, fb);
    }

    #[test]
    fn same_seed_same_generation() {
        let cfg = Config::default();
        let genomes = random_genomes(10, &mut seeded_rng());
        let run = || {
            let mut rng = StdRng::seed_from_u64(77);
            let mut world = World::training(&cfg, genomes.clone(), &mut rng);
            world.run_to_end(&mut rng);
            (world.tick, world.fitnesses())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn snapshot_reflects_post_update_state() {
        let cfg = Config::default();
        let mut rng = seeded_rng();
        let mut world = World::training(&cfg, vec![never_flap(); 2], &mut rng);
        world.step(TickInput::default(), cfg.game.tick_dt, &mut rng);

        let snap = world.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.alive_count(), 2);
        assert_eq!(snap.birds[0].y, world.birds[0].y);
        assert_eq!(snap.pipes.len(), world.pipes.pipes().count());
        assert!(snap.standings.is_none());
    }
}
