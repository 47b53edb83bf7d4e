use crate::ecs::{ComponentKind, EntityStore, Faction, Transform};
use crate::math::{Vec2, TIME_EPSILON};
use crate::status::{StatusEffects, StatusKind};

pub const CONTACT_PUDDLE_RADIUS: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Puddle {
    pub position: Vec2,
    pub radius: f32,
    pub duration: f32,
    pub remaining: f32,
    pub slow_amount: f32,
}

impl Puddle {
    pub fn is_active(&self) -> bool {
        self.remaining > TIME_EPSILON
    }

    pub fn contains(&self, point: Vec2) -> bool {
        self.position.distance_squared(point) <= self.radius * self.radius
    }

    pub fn alpha_ratio(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

/// Slowing hazards left behind by slime contact damage.
#[derive(Debug, Clone, Default)]
pub struct PuddleField {
    puddles: Vec<Puddle>,
}

impl PuddleField {
    pub fn add(&mut self, position: Vec2, radius: f32, duration: f32, slow_amount: f32) {
        if duration <= 0.0 {
            return;
        }
        self.puddles.push(Puddle {
            position,
            radius,
            duration,
            remaining: duration,
            slow_amount,
        });
    }

    pub fn puddles(&self) -> &[Puddle] {
        &self.puddles
    }

    /// Decays puddles, drops expired ones, then refreshes a single "slowed"
    /// status on every player-faction entity standing in one. Overlapping
    /// puddles never stack; the first containing puddle wins.
    pub fn update(&mut self, dt: f32, store: &mut EntityStore) {
        for puddle in &mut self.puddles {
            puddle.remaining -= dt;
        }
        self.puddles.retain(Puddle::is_active);
        if self.puddles.is_empty() {
            return;
        }

        let candidates = store.query(&[
            ComponentKind::Transform,
            ComponentKind::Faction,
            ComponentKind::StatusEffects,
        ]);
        for id in candidates {
            if store.get::<Faction>(id).copied() != Some(Faction::Player) {
                continue;
            }
            let Some(position) = store.get::<Transform>(id).map(|t| t.position) else {
                continue;
            };
            let Some(puddle) = self.puddles.iter().find(|puddle| puddle.contains(position)) else {
                continue;
            };
            if let Some(statuses) = store.get_mut::<StatusEffects>(id) {
                statuses.refresh(StatusKind::Slowed, puddle.duration, puddle.slow_amount);
            }
        }
    }

    pub fn clear(&mut self) {
        self.puddles.clear();
    }
}
