use crate::ai::Genome;
use crate::config::{Config, EvolutionConfig, NoiseKind};
use crate::error::CheckpointError;
use crate::game::World;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Statistics for a single generation
#[derive(Clone, Debug)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f32,
    pub avg_fitness: f32,
    pub worst_fitness: f32,
    pub best_score: u32,
    pub ticks: u64,
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gen {:>4} | Best: {:>7.2} | Avg: {:>7.2} | Worst: {:>7.2} | Pipes: {:>3} | Ticks: {}",
            self.generation,
            self.best_fitness,
            self.avg_fitness,
            self.worst_fitness,
            self.best_score,
            self.ticks,
        )
    }
}

/// A single individual in the population with its fitness
#[derive(Clone, Debug)]
pub struct Individual {
    pub genome: Genome,
    pub fitness: f32,
}

impl Individual {
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: 0.0,
        }
    }
}

/// Fixed-size set of genomes evolved between generations
#[derive(Clone, Debug)]
pub struct Population {
    pub individuals: Vec<Individual>,
    pub generation: u32,
}

impl Population {
    /// Create a new random population
    pub fn new(cfg: &EvolutionConfig, rng: &mut impl Rng) -> Self {
        let individuals = (0..cfg.population_size)
            .map(|_| {
                Individual::new(Genome::random(
                    rng,
                    cfg.initial_weight_span,
                    cfg.initial_bias_span,
                ))
            })
            .collect();

        Self {
            individuals,
            generation: 0,
        }
    }

    /// Wrap existing genomes, e.g. from a checkpoint
    pub fn from_genomes(genomes: Vec<Genome>, generation: u32) -> Self {
        Self {
            individuals: genomes.into_iter().map(Individual::new).collect(),
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn genomes(&self) -> Vec<Genome> {
        self.individuals.iter().map(|i| i.genome.clone()).collect()
    }

    /// Record the fitness each individual earned, in population order
    pub fn assign_fitness(&mut self, fitnesses: &[f32]) {
        for (ind, &fitness) in self.individuals.iter_mut().zip(fitnesses) {
            ind.fitness = fitness;
        }
    }

    /// Individual indices, fittest first; equal fitness keeps population order
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        // Stable sort, so ties stay in index order
        order.sort_by(|&a, &b| by_fitness_desc(self.individuals[a].fitness, self.individuals[b].fitness));
        order
    }

    /// Fittest of `tournament_size` uniform draws with replacement.
    /// Ties go to the lower index.
    pub fn tournament_select(&self, tournament_size: usize, rng: &mut impl Rng) -> &Genome {
        let n = self.individuals.len();
        let mut best_idx = rng.gen_range(0..n);
        for _ in 1..tournament_size {
            let idx = rng.gen_range(0..n);
            let (cand, best) = (&self.individuals[idx], &self.individuals[best_idx]);
            if cand.fitness > best.fitness || (cand.fitness == best.fitness && idx < best_idx) {
                best_idx = idx;
            }
        }
        &self.individuals[best_idx].genome
    }

    /// Perturb each weight with probability `mutation_rate`.
    /// Only perturbed weights are clamped, everything else is left bit-identical.
    pub fn mutate(genome: &mut Genome, cfg: &EvolutionConfig, rng: &mut impl Rng) {
        let gaussian = match cfg.noise {
            NoiseKind::Gaussian if cfg.mutation_strength > 0.0 => {
                Normal::new(0.0, cfg.mutation_strength).ok()
            }
            _ => None,
        };
        for w in genome.weights.iter_mut() {
            if rng.gen::<f32>() < cfg.mutation_rate {
                let noise = match (&gaussian, cfg.mutation_strength > 0.0) {
                    (Some(normal), _) => normal.sample(rng),
                    (None, true) => rng.gen_range(-cfg.mutation_strength..=cfg.mutation_strength),
                    (None, false) => 0.0,
                };
                *w = (*w + noise).clamp(-cfg.weight_limit, cfg.weight_limit);
            }
        }
    }

    /// Create the next generation: elites carried over unchanged, the rest
    /// bred by tournament selection and mutation. Fitness resets to zero.
    pub fn next_generation(&mut self, cfg: &EvolutionConfig, rng: &mut impl Rng) {
        let size = self.individuals.len();
        let ranking = self.ranking();

        let mut next_gen: Vec<Individual> = Vec::with_capacity(size);

        // Keep elites
        for &i in ranking.iter().take(cfg.elite_count.min(size)) {
            next_gen.push(Individual::new(self.individuals[i].genome.clone()));
        }

        // Fill the rest with mutated copies of tournament winners
        while next_gen.len() < size {
            let mut child = self.tournament_select(cfg.tournament_size, rng).clone();
            Population::mutate(&mut child, cfg, rng);
            next_gen.push(Individual::new(child));
        }

        self.individuals = next_gen;
        self.generation += 1;
    }
}

fn by_fitness_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Saved training progress
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub generation: u32,
    /// Fittest first
    pub genomes: Vec<Genome>,
    pub best_fitness_history: Vec<f32>,
}

impl Checkpoint {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Training state across generations: the population, the generation
/// counter and the all-time best, owned explicitly instead of globally.
pub struct TrainingSession {
    pub population: Population,
    pub history: Vec<GenerationStats>,
    pub best_fitness: f32,
    config: Config,
}

impl TrainingSession {
    pub fn new(config: &Config, rng: &mut impl Rng) -> Self {
        Self::with_population(config, Population::new(&config.evolution, rng))
    }

    pub fn with_population(config: &Config, population: Population) -> Self {
        Self {
            population,
            history: Vec::new(),
            best_fitness: 0.0,
            config: config.clone(),
        }
    }

    pub fn generation(&self) -> u32 {
        self.population.generation
    }

    /// True once the configured number of generations has been evaluated
    pub fn is_finished(&self) -> bool {
        self.history.len() as u32 >= self.config.evolution.generation_count
    }

    /// Fresh world for the current population
    pub fn spawn_world(&self, rng: &mut impl Rng) -> World {
        World::training(&self.config, self.population.genomes(), rng)
    }

    /// Consume a finished world: record fitness and stats, then breed the next
    /// generation unless this was the last one.
    pub fn complete_generation(&mut self, world: &World, rng: &mut impl Rng) -> GenerationStats {
        let fitnesses = world.fitnesses();
        self.population.assign_fitness(&fitnesses);

        let best = fitnesses.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let worst = fitnesses.iter().cloned().fold(f32::INFINITY, f32::min);
        let avg = fitnesses.iter().sum::<f32>() / fitnesses.len().max(1) as f32;
        let stats = GenerationStats {
            generation: self.population.generation,
            best_fitness: best,
            avg_fitness: avg,
            worst_fitness: worst,
            best_score: world.birds.iter().map(|b| b.score).max().unwrap_or(0),
            ticks: world.tick,
        };

        if !world.violations().is_empty() {
            tracing::warn!(
                count = world.violations().len(),
                "collision invariant violated during generation"
            );
        }
        tracing::debug!(sensor_warnings = world.sensor_warnings(), "sensor clamps");

        self.best_fitness = self.best_fitness.max(best);
        self.history.push(stats.clone());
        tracing::info!(all_time_best = self.best_fitness, "{stats}");

        if !self.is_finished() {
            self.population.next_generation(&self.config.evolution, rng);
        }
        stats
    }

    /// Simulate one generation headless and evolve
    pub fn run_generation(&mut self, rng: &mut impl Rng) -> GenerationStats {
        let mut world = self.spawn_world(rng);
        world.run_to_end(rng);
        self.complete_generation(&world, rng)
    }

    /// Run every remaining generation
    pub fn run(&mut self, rng: &mut impl Rng) {
        while !self.is_finished() {
            self.run_generation(rng);
        }
    }

    pub fn to_checkpoint(&self) -> Checkpoint {
        let ranking = self.population.ranking();
        Checkpoint {
            generation: self.population.generation,
            genomes: ranking
                .iter()
                .map(|&i| self.population.individuals[i].genome.clone())
                .collect(),
            best_fitness_history: self.history.iter().map(|s| s.best_fitness).collect(),
        }
    }
}
