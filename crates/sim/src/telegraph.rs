use crate::ecs::BossAttackKind;
use crate::math::{Vec2, TIME_EPSILON};

pub const TELEGRAPH_FLASH_INTERVAL: f32 = 0.1;
pub const DASH_TELEGRAPH_WIDTH: f32 = 40.0;
pub const SLAM_TELEGRAPH_ANGLE_DEGREES: f32 = 120.0;
pub const SLAM_TELEGRAPH_RANGE: f32 = 200.0;
pub const SUMMON_TELEGRAPH_RADIUS: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelegraphShape {
    Line {
        start: Vec2,
        end: Vec2,
        width: f32,
    },
    Cone {
        center: Vec2,
        direction: Vec2,
        angle_degrees: f32,
        range: f32,
    },
    Circle {
        center: Vec2,
        radius: f32,
    },
}

/// Advisory warning drawn ahead of a boss attack. It never applies damage itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telegraph {
    pub attack: BossAttackKind,
    pub shape: TelegraphShape,
    pub duration: f32,
    pub remaining: f32,
    pub visible: bool,
    since_flash: f32,
}

impl Telegraph {
    pub fn new(attack: BossAttackKind, shape: TelegraphShape, duration: f32) -> Self {
        Self {
            attack,
            shape,
            duration,
            remaining: duration,
            visible: true,
            since_flash: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.remaining -= dt;
        self.since_flash += dt;
        if self.since_flash + TIME_EPSILON >= TELEGRAPH_FLASH_INTERVAL {
            self.visible = !self.visible;
            self.since_flash = 0.0;
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > TIME_EPSILON
    }

    /// Remaining fraction for the renderer's alpha, 0 when expired.
    pub fn alpha_ratio(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TelegraphBoard {
    active: Vec<Telegraph>,
}

impl TelegraphBoard {
    pub fn add(&mut self, telegraph: Telegraph) {
        self.active.push(telegraph);
    }

    pub fn add_dash(&mut self, from: Vec2, to: Vec2, duration: f32) {
        self.add(Telegraph::new(
            BossAttackKind::Dash,
            TelegraphShape::Line {
                start: from,
                end: to,
                width: DASH_TELEGRAPH_WIDTH,
            },
            duration,
        ));
    }

    pub fn add_slam(&mut self, center: Vec2, direction: Vec2, duration: f32) {
        self.add(Telegraph::new(
            BossAttackKind::Slam,
            TelegraphShape::Cone {
                center,
                direction,
                angle_degrees: SLAM_TELEGRAPH_ANGLE_DEGREES,
                range: SLAM_TELEGRAPH_RANGE,
            },
            duration,
        ));
    }

    pub fn add_summon(&mut self, center: Vec2, duration: f32) {
        self.add(Telegraph::new(
            BossAttackKind::Summon,
            TelegraphShape::Circle {
                center,
                radius: SUMMON_TELEGRAPH_RADIUS,
            },
            duration,
        ));
    }

    /// Ticks every telegraph and purges the expired ones.
    pub fn update(&mut self, dt: f32) {
        for telegraph in &mut self.active {
            telegraph.update(dt);
        }
        self.active.retain(Telegraph::is_active);
    }

    pub fn active(&self) -> &[Telegraph] {
        &self.active
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn half_second_telegraph_is_purged_after_thirty_ticks() {
        let mut board = TelegraphBoard::default();
        board.add_summon(Vec2::ZERO, 0.5);

        for _ in 0..29 {
            board.update(DT);
        }
        assert_eq!(board.active().len(), 1);
        assert!(board.active()[0].is_active());

        board.update(DT);
        assert!(board.active().is_empty());
    }

    #[test]
    fn standalone_telegraph_reports_inactive_after_duration() {
        let mut telegraph = Telegraph::new(
            BossAttackKind::Dash,
            TelegraphShape::Circle {
                center: Vec2::ZERO,
                radius: 10.0,
            },
            0.5,
        );
        for _ in 0..30 {
            telegraph.update(DT);
        }
        assert!(!telegraph.is_active());
        assert_eq!(telegraph.alpha_ratio(), 0.0);
    }

    #[test]
    fn visibility_flashes_on_interval() {
        let mut telegraph = Telegraph::new(
            BossAttackKind::Slam,
            TelegraphShape::Circle {
                center: Vec2::ZERO,
                radius: 10.0,
            },
            1.0,
        );
        let mut toggles = 0;
        let mut last = telegraph.visible;
        for _ in 0..30 {
            telegraph.update(DT);
            if telegraph.visible != last {
                toggles += 1;
                last = telegraph.visible;
            }
        }
        assert_eq!(toggles, 5);
        assert!((telegraph.alpha_ratio() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn slam_telegraph_uses_cone_shape() {
        let mut board = TelegraphBoard::default();
        board.add_slam(Vec2::ZERO, Vec2::new(1.0, 0.0), 1.5);
        match board.active()[0].shape {
            TelegraphShape::Cone {
                angle_degrees,
                range,
                ..
            } => {
                assert_eq!(angle_degrees, 120.0);
                assert_eq!(range, 200.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
