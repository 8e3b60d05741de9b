use crate::config::GameConfig;

/// Axis-aligned box in screen coordinates (y grows downward)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Aabb {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Square box of half-size `half` centred on (x, y)
    pub fn around(x: f32, y: f32, half: f32) -> Self {
        Self::new(x - half, y - half, x + half, y + half)
    }

    /// Strict overlap on both axes; touching edges do not count
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.right > other.left
            && self.left < other.right
            && self.bottom > other.top
            && self.top < other.bottom
    }

    /// True if `other` lies entirely within this box
    pub fn contains(&self, other: &Aabb) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }
}

/// Advance a vertical body by one step.
///
/// Gravity accumulates first, then a flap replaces the velocity outright,
/// then the speed is capped and the position integrated.
/// Returns the new (position, velocity).
pub fn integrate(y: f32, vel: f32, flap: bool, dt: f32, cfg: &GameConfig) -> (f32, f32) {
    let mut vel = vel + cfg.gravity * dt;
    if flap {
        vel = cfg.flap_impulse;
    }
    let vel = vel.clamp(-cfg.max_fall_speed, cfg.max_fall_speed);
    (y + vel * dt, vel)
}

/// A bird touching the ceiling or the ground is out
pub fn out_of_bounds(y: f32, cfg: &GameConfig) -> bool {
    y <= 0.0 || y >= cfg.screen_height
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn unit_cfg() -> GameConfig {
        GameConfig {
            gravity: 10.0,
            flap_impulse: -5.0,
            max_fall_speed: 100.0,
            ..GameConfig::default()
        }
    }

    #[test]
    fn gravity_accumulates_without_flap() {
        let (y, v) = integrate(300.0, 0.0, false, 1.0, &unit_cfg());
        assert!(approx_eq(v, 10.0));
        assert!(approx_eq(y, 310.0));
    }

    #[test]
    fn flap_overrides_velocity() {
        // Falling fast, a flap still sets exactly the impulse
        let (y, v) = integrate(300.0, 80.0, true, 1.0, &unit_cfg());
        assert!(approx_eq(v, -5.0));
        assert!(approx_eq(y, 295.0));
    }

    #[test]
    fn velocity_is_capped() {
        let cfg = unit_cfg();
        let (_, v) = integrate(300.0, 95.0, false, 1.0, &cfg);
        assert!(approx_eq(v, cfg.max_fall_speed));

        let (_, v) = integrate(300.0, -500.0, false, 1.0, &cfg);
        assert!(approx_eq(v, -cfg.max_fall_speed));
    }

    #[test]
    fn bounds_are_fatal_at_the_edges() {
        let cfg = GameConfig::default();
        assert!(out_of_bounds(0.0, &cfg));
        assert!(out_of_bounds(-1.0, &cfg));
        assert!(out_of_bounds(cfg.screen_height, &cfg));
        assert!(!out_of_bounds(1.0, &cfg));
        assert!(!out_of_bounds(cfg.screen_height - 1.0, &cfg));
    }

    #[test]
    fn aabb_overlap_is_strict() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let touching = Aabb::new(10.0, 0.0, 20.0, 10.0);
        let inside = Aabb::new(2.0, 2.0, 8.0, 8.0);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&inside));
        assert!(a.contains(&inside));
        assert!(!inside.contains(&a));
    }

    #[test]
    fn aabb_around_centre() {
        let b = Aabb::around(100.0, 50.0, 12.0);
        assert!(approx_eq(b.left, 88.0));
        assert!(approx_eq(b.right, 112.0));
        assert!(approx_eq(b.top, 38.0));
        assert!(approx_eq(b.bottom, 62.0));
    }
}
