use crate::config::GameConfig;
use crate::evolution::GenerationStats;
use crate::game::{BirdView, Mode, Snapshot, Standing};
use crate::pipes::Pipe;
use macroquad::prelude::*;

const SKY_TOP: Color = Color::new(0.53, 0.81, 0.92, 1.0);
const PIPE_COLOR: Color = Color::new(0.0, 0.5, 0.0, 1.0);
const PIPE_SHADOW: Color = Color::new(0.0, 0.39, 0.0, 1.0);
const HUMAN_COLOR: Color = Color::new(1.0, 0.39, 0.39, 1.0);
const OPPONENT_COLORS: [Color; 3] = [
    Color::new(0.39, 0.39, 1.0, 1.0),
    Color::new(0.39, 1.0, 0.39, 1.0),
    Color::new(1.0, 1.0, 0.39, 1.0),
];
const BEAK_COLOR: Color = ORANGE;

/// Maps world pixels onto the current window
#[derive(Clone, Copy)]
struct View {
    sx: f32,
    sy: f32,
}

impl View {
    fn new(cfg: &GameConfig) -> Self {
        Self {
            sx: screen_width() / cfg.screen_width,
            sy: screen_height() / cfg.screen_height,
        }
    }
}

fn draw_pipe(pipe: &Pipe, cfg: &GameConfig, v: View) {
    let x = pipe.x * v.sx;
    let w = pipe.width * v.sx;
    let top_h = pipe.gap_top() * v.sy;
    let bottom_y = pipe.gap_bottom() * v.sy;
    let bottom_h = (cfg.screen_height - pipe.gap_bottom()) * v.sy;

    draw_rectangle(x, 0.0, w, top_h, PIPE_COLOR);
    draw_rectangle(x, 0.0, 5.0 * v.sx, top_h, PIPE_SHADOW);
    draw_rectangle(x, bottom_y, w, bottom_h, PIPE_COLOR);
    draw_rectangle(x, bottom_y, 5.0 * v.sx, bottom_h, PIPE_SHADOW);
}

fn bird_color(index: usize, bird: &BirdView, mode: Mode) -> Color {
    match mode {
        Mode::Playable if bird.human => HUMAN_COLOR,
        Mode::Playable => OPPONENT_COLORS[(index.saturating_sub(1)) % OPPONENT_COLORS.len()],
        // Leader in yellow, the rest of the flock in white
        Mode::Training if index == 0 => YELLOW,
        Mode::Training => Color::new(1.0, 1.0, 1.0, 0.6),
    }
}

fn draw_bird(bird: &BirdView, color: Color, cfg: &GameConfig, v: View) {
    if !bird.alive {
        return;
    }
    let (x, y) = (bird.x * v.sx, bird.y * v.sy);
    let r = cfg.bird_radius * v.sx;
    draw_circle(x, y, r, color);
    // Eye
    draw_circle(x + r / 3.0, y - r / 3.0, r / 4.0, BLACK);
    // Beak
    draw_triangle(
        vec2(x + r, y),
        vec2(x + r * 1.5, y + r / 6.0),
        vec2(x + r, y + r / 3.0),
        BEAK_COLOR,
    );
}

/// Draw pipes and birds
pub fn draw_world(snap: &Snapshot, cfg: &GameConfig) {
    clear_background(SKY_TOP);
    let v = View::new(cfg);

    for pipe in &snap.pipes {
        draw_pipe(pipe, cfg, v);
    }

    match snap.mode {
        Mode::Training => {
            // First living bird gets the leader colour
            for (rank, bird) in snap.birds.iter().filter(|b| b.alive).enumerate() {
                draw_bird(bird, bird_color(rank, bird, snap.mode), cfg, v);
            }
        }
        Mode::Playable => {
            for (i, bird) in snap.birds.iter().enumerate() {
                draw_bird(bird, bird_color(i, bird, snap.mode), cfg, v);
            }
        }
    }
}

fn player_name(index: usize, human: bool) -> String {
    if human {
        "Human".to_string()
    } else {
        const NAMES: [&str; 3] = ["AI-Blue", "AI-Green", "AI-Yellow"];
        NAMES
            .get(index.saturating_sub(1))
            .map_or_else(|| format!("AI-{index}"), |n| n.to_string())
    }
}

/// Scoreboard for a playable match
pub fn draw_scores(snap: &Snapshot) {
    let mut y = 30.0;
    for (i, bird) in snap.birds.iter().enumerate() {
        let color = bird_color(i, bird, snap.mode);
        let text = format!("{}: {}", player_name(i, bird.human), bird.score);
        draw_text(&text, 10.0, y, 30.0, color);
        y += 32.0;
    }
    draw_text(
        "SPACE = Flap | R = Restart | ESC = Quit",
        10.0,
        screen_height() - 15.0,
        24.0,
        BLACK,
    );
}

fn draw_centered(text: &str, y: f32, size: f32, color: Color) {
    let dims = measure_text(text, None, size as u16, 1.0);
    draw_text(text, (screen_width() - dims.width) / 2.0, y, size, color);
}

/// Dimmed overlay naming the winner
pub fn draw_match_over(standings: &[Standing]) {
    draw_rectangle(
        0.0,
        0.0,
        screen_width(),
        screen_height(),
        Color::new(0.0, 0.0, 0.0, 0.5),
    );
    let mid = screen_height() / 2.0;
    draw_centered("GAME OVER!", mid - 100.0, 48.0, WHITE);
    if let Some(winner) = standings.first() {
        let text = format!(
            "Winner: {} ({} points)",
            player_name(winner.bird, winner.human),
            winner.score
        );
        draw_centered(&text, mid - 50.0, 32.0, YELLOW);
    }
    draw_centered("Press R to Restart | ESC to Quit", mid + 50.0, 28.0, WHITE);
}

/// Training overlay with generation info
pub fn draw_training_hud(
    generation: u32,
    alive: usize,
    all_time_best: f32,
    tick: u64,
    speed: u32,
    last: Option<&GenerationStats>,
) {
    let text = format!(
        "Gen: {}  Alive: {}  Best: {:.1}",
        generation + 1,
        alive,
        all_time_best
    );
    draw_text(&text, 10.0, 28.0, 30.0, BLACK);
    draw_text(
        &format!("Tick: {tick}  Speed: x{speed}"),
        10.0,
        58.0,
        26.0,
        BLACK,
    );
    if let Some(stats) = last {
        draw_text(
            &format!(
                "Last gen: best {:.1}  avg {:.1}  pipes {}",
                stats.best_fitness, stats.avg_fitness, stats.best_score
            ),
            10.0,
            86.0,
            22.0,
            DARKGRAY,
        );
    }
    draw_text(
        "UP/DOWN: speed | R: restart generation | ESC: quit",
        10.0,
        screen_height() - 15.0,
        22.0,
        DARKGRAY,
    );
}

/// Shown once every generation has run
pub fn draw_training_done(generations: usize, all_time_best: f32) {
    draw_rectangle(
        0.0,
        0.0,
        screen_width(),
        screen_height(),
        Color::new(0.0, 0.0, 0.0, 0.5),
    );
    let mid = screen_height() / 2.0;
    draw_centered("Evolution complete!", mid - 40.0, 44.0, WHITE);
    draw_centered(
        &format!("{generations} generations, best fitness {all_time_best:.1}"),
        mid + 10.0,
        28.0,
        YELLOW,
    );
    draw_centered("ESC to quit", mid + 60.0, 24.0, WHITE);
}
