use serde::{Deserialize, Serialize};

/// Simulation ticks per second that per-tick velocities are expressed against.
pub const REFERENCE_TICK_RATE: f32 = 60.0;

/// Slack for countdown timers so accumulated `f32` error does not keep a
/// timer alive one tick past its nominal duration.
pub const TIME_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn distance_squared(self, other: Vec2) -> f32 {
        (other - self).length_squared()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn scale(self, factor: f32) -> Vec2 {
        Vec2 {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Unit vector in the same direction, or `None` for (near) zero-length input.
    pub fn try_normalize(self) -> Option<Vec2> {
        let length = self.length();
        if length <= f32::EPSILON || !length.is_finite() {
            return None;
        }
        Some(self.scale(1.0 / length))
    }

    pub fn normalize_or(self, fallback: Vec2) -> Vec2 {
        self.try_normalize().unwrap_or(fallback)
    }

    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn from_angle(radians: f32) -> Vec2 {
        Vec2 {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    pub fn lerp(self, target: Vec2, factor: f32) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * factor,
            y: self.y + (target.y - self.y) * factor,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Converts a speed in pixels per second into the per-tick displacement stored on transforms.
pub fn per_tick_velocity(direction: Vec2, speed_per_second: f32) -> Vec2 {
    direction.scale(speed_per_second / REFERENCE_TICK_RATE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.x + self.width, self.y),
            Vec2::new(self.x, self.y + self.height),
            Vec2::new(self.x + self.width, self.y + self.height),
        ]
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_does_not_normalize() {
        assert_eq!(Vec2::ZERO.try_normalize(), None);
        assert_eq!(Vec2::ZERO.normalize_or(Vec2::new(0.0, -1.0)), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn per_tick_velocity_divides_by_reference_rate() {
        let velocity = per_tick_velocity(Vec2::new(1.0, 0.0), 120.0);
        assert!((velocity.x - 2.0).abs() < 1e-6);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn rect_corners_include_far_edge() {
        let rect = Rect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 4.0,
        };
        assert!(rect.contains(Vec2::new(10.0, 4.0)));
        assert!(!rect.contains(Vec2::new(10.1, 4.0)));
        assert_eq!(rect.corners()[3], Vec2::new(10.0, 4.0));
    }
}
