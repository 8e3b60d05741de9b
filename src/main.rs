mod ai;
mod bird;
mod config;
mod error;
mod evolution;
mod game;
mod physics;
mod pipes;
mod render;

use ::rand::rngs::StdRng;
use ::rand::SeedableRng;
use ai::Genome;
use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use evolution::{Checkpoint, Population, TrainingSession};
use game::{TickInput, World};
use macroquad::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Cap on simulation steps per rendered frame, so a stalled frame cannot snowball
const MAX_STEPS_PER_FRAME: u32 = 5;

/// Training speed multipliers cycled with Up/Down
const SPEED_LEVELS: [u32; 5] = [1, 2, 4, 8, 16];

#[derive(Parser, Debug)]
#[command(author, version, about = "Flappy bird with evolved neural opponents", long_about = None)]
struct Args {
    /// Play against AI birds, or watch a population evolve
    #[arg(short, long, value_enum, default_value = "play")]
    mode: RunMode,

    /// TOML config file; defaults apply if it does not exist
    #[arg(short, long, default_value = "flappy.toml")]
    config: PathBuf,

    /// Seed for pipe placement, initial genomes and mutation
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of training generations
    #[arg(long)]
    generations: Option<u32>,

    /// Train without opening a window
    #[arg(long)]
    headless: bool,

    /// Training: resume from and save to this file. Play: take opponents from it.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RunMode {
    Play,
    Train,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "flappy_evolve=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    if let Some(generations) = args.generations {
        config.evolution.generation_count = generations;
    }
    config.validate().context("invalid configuration")?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match (args.mode, args.headless) {
        (RunMode::Train, true) => {
            train_headless(&config, args.checkpoint.as_deref(), rng);
            Ok(())
        }
        (RunMode::Play, true) => anyhow::bail!("play mode needs a window, drop --headless"),
        (RunMode::Train, false) => {
            macroquad::Window::from_config(
                window_conf(&config),
                train_window(config, args.checkpoint, rng),
            );
            Ok(())
        }
        (RunMode::Play, false) => {
            macroquad::Window::from_config(
                window_conf(&config),
                play_window(config, args.checkpoint, rng),
            );
            Ok(())
        }
    }
}

fn window_conf(config: &Config) -> Conf {
    Conf {
        window_title: "Flappy Evolve".to_string(),
        window_width: config.game.screen_width as i32,
        window_height: config.game.screen_height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

/// Turns variable frame times into a whole number of fixed ticks
struct FixedStep {
    dt: f32,
    acc: f32,
}

impl FixedStep {
    fn new(dt: f32) -> Self {
        Self { dt, acc: 0.0 }
    }

    fn ticks(&mut self, frame_time: f32) -> u32 {
        self.acc = (self.acc + frame_time).min(self.dt * MAX_STEPS_PER_FRAME as f32);
        let n = (self.acc / self.dt) as u32;
        self.acc -= n as f32 * self.dt;
        n
    }
}

/// Fold this frame's Space/R presses into the input waiting for the next tick
fn sample_keys(pending: &mut TickInput, pressed: impl Fn(KeyCode) -> bool) {
    pending.flap |= pressed(KeyCode::Space);
    pending.restart |= pressed(KeyCode::R);
}

/// Resume from a checkpoint whose population fits the config, else start fresh
fn start_session(config: &Config, checkpoint: Option<&Path>, rng: &mut StdRng) -> TrainingSession {
    let Some(path) = checkpoint.filter(|p| p.exists()) else {
        return TrainingSession::new(config, rng);
    };
    match Checkpoint::load(path) {
        Ok(cp) if cp.genomes.len() == config.evolution.population_size => {
            tracing::info!(
                generation = cp.generation,
                genomes = cp.genomes.len(),
                "resuming from checkpoint"
            );
            TrainingSession::with_population(config, Population::from_genomes(cp.genomes, cp.generation))
        }
        Ok(cp) => {
            tracing::warn!(
                found = cp.genomes.len(),
                expected = config.evolution.population_size,
                "checkpoint population size mismatch, starting fresh"
            );
            TrainingSession::new(config, rng)
        }
        Err(e) => {
            tracing::warn!("failed to load checkpoint: {e}, starting fresh");
            TrainingSession::new(config, rng)
        }
    }
}

fn save_session(session: &TrainingSession, path: Option<&Path>) {
    let Some(path) = path else { return };
    match session.to_checkpoint().save(path) {
        Ok(()) => tracing::info!(
            generation = session.generation(),
            "saved checkpoint to {}",
            path.display()
        ),
        Err(e) => tracing::error!("failed to save checkpoint: {e}"),
    }
}

/// Opponents for a playable match: the best checkpoint genomes if available,
/// otherwise random brains. The flag says whether they came from a checkpoint.
fn opponent_genomes(config: &Config, checkpoint: Option<&Path>, rng: &mut StdRng) -> (Vec<Genome>, bool) {
    let count = config.play.opponent_start_ys.len();
    if let Some(path) = checkpoint {
        match Checkpoint::load(path) {
            Ok(cp) if !cp.genomes.is_empty() => {
                tracing::info!("opponents loaded from {}", path.display());
                let genomes = cp.genomes.iter().cycle().take(count).cloned().collect();
                return (genomes, true);
            }
            Ok(_) => tracing::warn!("checkpoint has no genomes, using random opponents"),
            Err(e) => tracing::warn!("failed to load checkpoint: {e}, using random opponents"),
        }
    }
    let play = &config.play;
    let genomes = (0..count)
        .map(|_| Genome::random(rng, play.opponent_weight_span, play.opponent_bias_span))
        .collect();
    (genomes, false)
}

fn train_headless(config: &Config, checkpoint: Option<&Path>, mut rng: StdRng) {
    let mut session = start_session(config, checkpoint, &mut rng);
    tracing::info!(
        population = session.population.len(),
        generations = config.evolution.generation_count,
        "starting evolution"
    );
    session.run(&mut rng);
    tracing::info!(best = session.best_fitness, "evolution complete");
    save_session(&session, checkpoint);
}

async fn train_window(config: Config, checkpoint: Option<PathBuf>, mut rng: StdRng) {
    let mut session = start_session(&config, checkpoint.as_deref(), &mut rng);
    let mut world = session.spawn_world(&mut rng);
    let dt = config.game.tick_dt;
    let mut clock = FixedStep::new(dt);
    let mut speed_index = 0;
    // R restarts the current generation from scratch
    let mut pending = TickInput::default();

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        if is_key_pressed(KeyCode::Up) && speed_index < SPEED_LEVELS.len() - 1 {
            speed_index += 1;
        }
        if is_key_pressed(KeyCode::Down) && speed_index > 0 {
            speed_index -= 1;
        }
        sample_keys(&mut pending, is_key_pressed);

        if !session.is_finished() {
            let steps = clock.ticks(get_frame_time()) * SPEED_LEVELS[speed_index];
            for _ in 0..steps {
                world.step(std::mem::take(&mut pending), dt, &mut rng);
                if world.is_running() {
                    continue;
                }
                session.complete_generation(&world, &mut rng);
                if session.is_finished() {
                    tracing::info!(best = session.best_fitness, "evolution complete");
                    save_session(&session, checkpoint.as_deref());
                    break;
                }
                world = session.spawn_world(&mut rng);
            }
        }

        let snap = world.snapshot();
        render::draw_world(&snap, world.game_config());
        render::draw_training_hud(
            session.generation(),
            snap.alive_count(),
            session.best_fitness,
            snap.tick,
            SPEED_LEVELS[speed_index],
            session.history.last(),
        );
        if session.is_finished() {
            render::draw_training_done(session.history.len(), session.best_fitness);
        }

        next_frame().await;
    }
}

async fn play_window(config: Config, checkpoint: Option<PathBuf>, mut rng: StdRng) {
    let (opponents, pinned) = opponent_genomes(&config, checkpoint.as_deref(), &mut rng);
    let mut world = World::playable(&config, opponents, &mut rng);
    world.reroll_on_restart = !pinned;

    let dt = config.game.tick_dt;
    let mut clock = FixedStep::new(dt);
    // At most one flap and one restart carried to the next tick
    let mut pending = TickInput::default();

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        sample_keys(&mut pending, is_key_pressed);

        for _ in 0..clock.ticks(get_frame_time()) {
            world.step(std::mem::take(&mut pending), dt, &mut rng);
        }

        let snap = world.snapshot();
        render::draw_world(&snap, world.game_config());
        render::draw_scores(&snap);
        if let Some(standings) = &snap.standings {
            render::draw_match_over(standings);
        }

        next_frame().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_accumulates_partial_frames() {
        let mut clock = FixedStep::new(0.01);
        assert_eq!(clock.ticks(0.004), 0);
        assert_eq!(clock.ticks(0.004), 0);
        assert_eq!(clock.ticks(0.004), 1);
    }

    #[test]
    fn fixed_step_caps_long_frames() {
        let mut clock = FixedStep::new(0.01);
        assert_eq!(clock.ticks(10.0), MAX_STEPS_PER_FRAME);
        assert_eq!(clock.ticks(0.0), 0);
    }

    #[test]
    fn keys_accumulate_until_consumed() {
        let mut pending = TickInput::default();
        sample_keys(&mut pending, |k| k == KeyCode::R);
        sample_keys(&mut pending, |_| false);
        assert!(pending.restart);
        assert!(!pending.flap);

        sample_keys(&mut pending, |k| k == KeyCode::Space);
        let taken = std::mem::take(&mut pending);
        assert!(taken.flap && taken.restart);
        assert_eq!(pending, TickInput::default());
    }

    #[test]
    fn training_restart_resets_generation() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = Config::default();
        let session = TrainingSession::new(&config, &mut rng);
        let mut world = session.spawn_world(&mut rng);
        for _ in 0..20 {
            world.step(TickInput::default(), config.game.tick_dt, &mut rng);
        }

        let mut pending = TickInput::default();
        sample_keys(&mut pending, |k| k == KeyCode::R);
        world.step(std::mem::take(&mut pending), config.game.tick_dt, &mut rng);

        assert_eq!(world.tick, 0);
        assert_eq!(world.alive_count(), config.evolution.population_size);
    }

    #[test]
    fn args_parse_training_flags() {
        let args = Args::try_parse_from([
            "flappy-evolve",
            "--mode",
            "train",
            "--headless",
            "--seed",
            "42",
            "--generations",
            "5",
        ])
        .unwrap();
        assert_eq!(args.mode, RunMode::Train);
        assert!(args.headless);
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.generations, Some(5));
        assert!(args.checkpoint.is_none());
    }

    #[test]
    fn args_default_to_play() {
        let args = Args::try_parse_from(["flappy-evolve"]).unwrap();
        assert_eq!(args.mode, RunMode::Play);
        assert_eq!(args.config, PathBuf::from("flappy.toml"));
    }

    #[test]
    fn fresh_session_without_checkpoint() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = Config::default();
        let session = start_session(&config, Some(Path::new("missing.json")), &mut rng);
        assert_eq!(session.population.len(), config.evolution.population_size);
        assert_eq!(session.generation(), 0);
    }

    #[test]
    fn random_opponents_without_checkpoint() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = Config::default();
        let (genomes, pinned) = opponent_genomes(&config, None, &mut rng);
        assert_eq!(genomes.len(), 3);
        assert!(!pinned);
    }

    #[test]
    fn checkpoint_opponents_are_pinned() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut config = Config::default();
        config.evolution.generation_count = 1;
        let mut session = TrainingSession::new(&config, &mut rng);
        session.run(&mut rng);

        let path = std::env::temp_dir().join(format!("flappy_opponents_{}.json", std::process::id()));
        save_session(&session, Some(&path));
        let (genomes, pinned) = opponent_genomes(&config, Some(&path), &mut rng);
        std::fs::remove_file(&path).ok();

        assert!(pinned);
        assert_eq!(genomes.len(), 3);
        assert_eq!(genomes[0], session.to_checkpoint().genomes[0]);
    }
}
