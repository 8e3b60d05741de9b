use crate::config::GameConfig;
use crate::physics::Aabb;
use rand::Rng;
use std::collections::VecDeque;

/// One obstacle column: a top and a bottom segment around a gap
#[derive(Clone, Debug, PartialEq)]
pub struct Pipe {
    /// Unique within a field, increasing in spawn order
    pub id: u64,
    /// Left edge
    pub x: f32,
    pub gap_center: f32,
    pub gap_size: f32,
    pub width: f32,
}

impl Pipe {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn gap_top(&self) -> f32 {
        self.gap_center - self.gap_size / 2.0
    }

    pub fn gap_bottom(&self) -> f32 {
        self.gap_center + self.gap_size / 2.0
    }

    /// Upper solid segment, from the ceiling to the gap
    pub fn top_segment(&self) -> Aabb {
        Aabb::new(self.x, f32::NEG_INFINITY, self.right(), self.gap_top())
    }

    /// Lower solid segment, from the gap to the floor
    pub fn bottom_segment(&self) -> Aabb {
        Aabb::new(self.x, self.gap_bottom(), self.right(), f32::INFINITY)
    }

    /// Bird box hits the pipe when it shares columns and pokes out of the gap
    pub fn collides(&self, bird: &Aabb) -> bool {
        self.top_segment().overlaps(bird) || self.bottom_segment().overlaps(bird)
    }

    /// Bird box lies entirely within one solid segment
    pub fn engulfs(&self, bird: &Aabb) -> bool {
        self.top_segment().contains(bird) || self.bottom_segment().contains(bird)
    }
}

/// Scrolling queue of pipes, oldest (leftmost) at the front
#[derive(Clone, Debug, Default)]
pub struct PipeField {
    pipes: VecDeque<Pipe>,
    next_id: u64,
}

impl PipeField {
    /// A field pre-filled from `first_pipe_x` up to the right edge
    pub fn new(cfg: &GameConfig, rng: &mut impl Rng) -> Self {
        let mut field = Self::empty();
        field.push(cfg.first_pipe_x, cfg, rng);
        field.refill(cfg, rng);
        field
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pipes(&self) -> impl Iterator<Item = &Pipe> {
        self.pipes.iter()
    }

    /// Append a pipe with a random gap centre inside the safe band
    pub fn push(&mut self, x: f32, cfg: &GameConfig, rng: &mut impl Rng) {
        let gap_center = if cfg.gap_center_max > cfg.gap_center_min {
            rng.gen_range(cfg.gap_center_min..=cfg.gap_center_max)
        } else {
            cfg.gap_center_min
        };
        self.push_pipe(x, gap_center, cfg);
    }

    /// Append a pipe with a fixed gap centre
    pub fn push_pipe(&mut self, x: f32, gap_center: f32, cfg: &GameConfig) {
        let pipe = Pipe {
            id: self.next_id,
            x,
            gap_center,
            gap_size: cfg.pipe_gap,
            width: cfg.pipe_width,
        };
        self.next_id += 1;
        self.pipes.push_back(pipe);
    }

    /// Scroll every pipe left, drop the ones fully off screen, spawn at the tail.
    pub fn advance(&mut self, dt: f32, cfg: &GameConfig, rng: &mut impl Rng) {
        let dx = cfg.scroll_speed * dt;
        for pipe in self.pipes.iter_mut() {
            pipe.x -= dx;
        }

        while self.pipes.front().is_some_and(|p| p.right() < 0.0) {
            self.pipes.pop_front();
        }

        self.refill(cfg, rng);
    }

    /// Spawn at the configured spacing until the next slot is past the right edge
    fn refill(&mut self, cfg: &GameConfig, rng: &mut impl Rng) {
        let spacing = cfg.pipe_spacing();
        loop {
            let next_x = match self.pipes.back() {
                Some(last) => last.x + spacing,
                None => cfg.screen_width,
            };
            if next_x > cfg.screen_width {
                break;
            }
            self.push(next_x, cfg, rng);
        }
    }

    /// Nearest pipe whose left edge is still ahead of `bird_x - lookbehind`
    pub fn nearest_ahead(&self, bird_x: f32, lookbehind: f32) -> Option<&Pipe> {
        // Sorted by x, so the first match is the closest
        self.pipes.iter().find(|p| p.x > bird_x - lookbehind)
    }
}
