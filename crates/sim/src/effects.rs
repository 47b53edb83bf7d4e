//! Hit feedback published to the render boundary: floating damage numbers,
//! particles and camera shake. Purely cosmetic; nothing here feeds back into
//! the simulation.

use crate::math::{Vec2, TIME_EPSILON};
use crate::rng::SimRng;

const DAMAGE_NUMBER_DURATION: f32 = 1.0;
const CRIT_DAMAGE_NUMBER_DURATION: f32 = 1.5;
const DAMAGE_NUMBER_GRAVITY: f32 = 50.0;
const PARTICLE_FRICTION: f32 = 0.95;
const HIT_PARTICLES: usize = 5;
const CRIT_PARTICLES: usize = 10;
const CRIT_SHAKE: (f32, f32) = (3.0, 0.1);
const HIT_SHAKE: (f32, f32) = (1.5, 0.05);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageNumber {
    pub position: Vec2,
    pub velocity: Vec2,
    pub amount: u32,
    pub is_crit: bool,
    pub duration: f32,
    pub remaining: f32,
}

impl DamageNumber {
    pub fn alpha_ratio(&self) -> f32 {
        (self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub is_crit: bool,
    pub duration: f32,
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraShake {
    intensity: f32,
    duration: f32,
    remaining: f32,
    offset: Vec2,
}

impl CameraShake {
    /// Starts a shake unless a stronger one is already running.
    pub fn start(&mut self, intensity: f32, duration: f32) {
        if self.remaining > TIME_EPSILON && self.intensity > intensity {
            return;
        }
        self.intensity = intensity;
        self.duration = duration;
        self.remaining = duration;
    }

    pub fn update(&mut self, dt: f32, rng: &mut SimRng) {
        if self.remaining <= TIME_EPSILON {
            self.remaining = 0.0;
            self.offset = Vec2::ZERO;
            return;
        }
        self.remaining -= dt;
        let strength = if self.duration > 0.0 {
            self.intensity * (self.remaining / self.duration).max(0.0)
        } else {
            0.0
        };
        self.offset = Vec2::new(
            rng.range_f32(-strength, strength),
            rng.range_f32(-strength, strength),
        );
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn is_active(&self) -> bool {
        self.remaining > TIME_EPSILON
    }
}

#[derive(Debug, Clone, Default)]
pub struct HitEffects {
    damage_numbers: Vec<DamageNumber>,
    particles: Vec<Particle>,
    shake: CameraShake,
}

impl HitEffects {
    pub fn on_damage(&mut self, position: Vec2, amount: u32, is_crit: bool, rng: &mut SimRng) {
        let duration = if is_crit {
            CRIT_DAMAGE_NUMBER_DURATION
        } else {
            DAMAGE_NUMBER_DURATION
        };
        self.damage_numbers.push(DamageNumber {
            position: position + Vec2::new(rng.range_f32(-10.0, 10.0), -20.0),
            velocity: Vec2::new(rng.range_f32(-20.0, 20.0), rng.range_f32(-60.0, -40.0)),
            amount,
            is_crit,
            duration,
            remaining: duration,
        });

        let count = if is_crit { CRIT_PARTICLES } else { HIT_PARTICLES };
        for _ in 0..count {
            let angle = rng.range_f32(0.0, std::f32::consts::TAU);
            let speed = rng.range_f32(50.0, 150.0);
            let life = rng.range_f32(0.3, 0.6);
            self.particles.push(Particle {
                position,
                velocity: Vec2::from_angle(angle).scale(speed),
                is_crit,
                duration: life,
                remaining: life,
            });
        }

        let (intensity, duration) = if is_crit { CRIT_SHAKE } else { HIT_SHAKE };
        self.shake.start(intensity, duration);
    }

    pub fn update(&mut self, dt: f32, rng: &mut SimRng) {
        for number in &mut self.damage_numbers {
            number.position += number.velocity.scale(dt);
            number.velocity.y += DAMAGE_NUMBER_GRAVITY * dt;
            number.remaining -= dt;
        }
        self.damage_numbers
            .retain(|number| number.remaining > TIME_EPSILON);

        for particle in &mut self.particles {
            particle.position += particle.velocity.scale(dt);
            particle.velocity = particle.velocity.scale(PARTICLE_FRICTION);
            particle.remaining -= dt;
        }
        self.particles
            .retain(|particle| particle.remaining > TIME_EPSILON);

        self.shake.update(dt, rng);
    }

    pub fn damage_numbers(&self) -> &[DamageNumber] {
        &self.damage_numbers
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn shake(&self) -> &CameraShake {
        &self.shake
    }
}
