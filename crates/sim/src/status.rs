use serde::{Deserialize, Serialize};

use crate::math::TIME_EPSILON;

pub const DEFAULT_STATUS_TICK_RATE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Slow,
    Slowed,
    Poison,
    Burn,
    Freeze,
    Stun,
    Regen,
    SpeedBoost,
    Invulnerable,
}

impl StatusKind {
    pub fn is_debuff(self) -> bool {
        !matches!(
            self,
            StatusKind::Regen | StatusKind::SpeedBoost | StatusKind::Invulnerable
        )
    }
}

/// Status a successful hit applies to its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnHitStatus {
    pub kind: StatusKind,
    pub duration: f32,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveStatus {
    pub kind: StatusKind,
    pub remaining: f32,
    pub value: f32,
    pub tick_rate: f32,
    since_tick: f32,
}

impl ActiveStatus {
    fn new(kind: StatusKind, duration: f32, value: f32) -> Self {
        Self {
            kind,
            remaining: duration.max(0.0),
            value,
            tick_rate: DEFAULT_STATUS_TICK_RATE,
            since_tick: 0.0,
        }
    }
}

/// Periodic effect produced while ticking statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPulse {
    Damage { kind: StatusKind, amount: u32 },
    Heal { amount: u32 },
}

/// At most one active effect per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusEffects {
    active: Vec<ActiveStatus>,
}

impl StatusEffects {
    /// Adds an effect; an existing effect of the same kind only gets its duration refreshed.
    pub fn add(&mut self, kind: StatusKind, duration: f32, value: f32) {
        if duration <= 0.0 {
            return;
        }
        match self.active.iter_mut().find(|status| status.kind == kind) {
            Some(existing) => existing.remaining = duration,
            None => self.active.push(ActiveStatus::new(kind, duration, value)),
        }
    }

    /// Adds or overwrites both duration and value.
    pub fn refresh(&mut self, kind: StatusKind, duration: f32, value: f32) {
        if duration <= 0.0 {
            return;
        }
        match self.active.iter_mut().find(|status| status.kind == kind) {
            Some(existing) => {
                existing.remaining = duration;
                existing.value = value;
            }
            None => self.active.push(ActiveStatus::new(kind, duration, value)),
        }
    }

    pub fn remove(&mut self, kind: StatusKind) -> bool {
        let before = self.active.len();
        self.active.retain(|status| status.kind != kind);
        before != self.active.len()
    }

    pub fn get(&self, kind: StatusKind) -> Option<&ActiveStatus> {
        self.active.iter().find(|status| status.kind == kind)
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveStatus> {
        self.active.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_invulnerable(&self) -> bool {
        self.has(StatusKind::Invulnerable)
    }

    pub fn is_immobilized(&self) -> bool {
        self.has(StatusKind::Freeze) || self.has(StatusKind::Stun)
    }

    /// Combined movement speed factor of every active effect.
    pub fn speed_multiplier(&self) -> f32 {
        let mut multiplier = 1.0f32;
        for status in &self.active {
            match status.kind {
                StatusKind::Slow | StatusKind::Slowed => {
                    multiplier *= (1.0 - status.value).clamp(0.0, 1.0);
                }
                StatusKind::SpeedBoost => multiplier *= 1.0 + status.value.max(0.0),
                StatusKind::Freeze | StatusKind::Stun => multiplier = 0.0,
                _ => {}
            }
        }
        multiplier
    }

    /// Counts every effect down by `dt`, returning damage-over-time and regen
    /// pulses that fell due. Expired effects are removed.
    pub fn tick(&mut self, dt: f32) -> Vec<StatusPulse> {
        let mut pulses = Vec::new();
        for status in &mut self.active {
            if matches!(
                status.kind,
                StatusKind::Poison | StatusKind::Burn | StatusKind::Regen
            ) && status.tick_rate > 0.0
            {
                status.since_tick += dt;
                while status.since_tick + TIME_EPSILON >= status.tick_rate {
                    status.since_tick -= status.tick_rate;
                    let amount = status.value.max(0.0).round() as u32;
                    if amount == 0 {
                        continue;
                    }
                    pulses.push(match status.kind {
                        StatusKind::Regen => StatusPulse::Heal { amount },
                        kind => StatusPulse::Damage { kind, amount },
                    });
                }
            }
            status.remaining -= dt;
        }
        self.active.retain(|status| status.remaining > TIME_EPSILON);
        pulses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn duplicate_add_refreshes_duration_without_changing_value() {
        let mut statuses = StatusEffects::default();
        statuses.add(StatusKind::Slow, 1.0, 0.3);
        statuses.tick(0.5);
        statuses.add(StatusKind::Slow, 2.0, 0.9);

        let slow = statuses.get(StatusKind::Slow).copied().expect("slow");
        assert_eq!(slow.remaining, 2.0);
        assert_eq!(slow.value, 0.3);
        assert_eq!(statuses.iter().count(), 1);
    }

    #[test]
    fn refresh_overwrites_value() {
        let mut statuses = StatusEffects::default();
        statuses.refresh(StatusKind::Slowed, 1.0, 0.3);
        statuses.refresh(StatusKind::Slowed, 3.0, 0.5);
        let slowed = statuses.get(StatusKind::Slowed).copied().expect("slowed");
        assert_eq!((slowed.remaining, slowed.value), (3.0, 0.5));
    }

    #[test]
    fn effects_expire_after_their_duration() {
        let mut statuses = StatusEffects::default();
        statuses.add(StatusKind::Stun, 0.5, 0.0);
        for _ in 0..29 {
            statuses.tick(DT);
        }
        assert!(statuses.has(StatusKind::Stun));
        statuses.tick(DT);
        assert!(statuses.is_empty());
    }

    #[test]
    fn speed_multiplier_combines_effects() {
        let mut statuses = StatusEffects::default();
        assert_eq!(statuses.speed_multiplier(), 1.0);
        statuses.add(StatusKind::Slowed, 1.0, 0.4);
        statuses.add(StatusKind::SpeedBoost, 1.0, 0.5);
        assert!((statuses.speed_multiplier() - 0.9).abs() < 1e-5);
        statuses.add(StatusKind::Freeze, 1.0, 0.0);
        assert_eq!(statuses.speed_multiplier(), 0.0);
    }

    #[test]
    fn poison_pulses_once_per_tick_rate() {
        let mut statuses = StatusEffects::default();
        statuses.add(StatusKind::Poison, 3.0, 4.0);
        let mut total = 0;
        for _ in 0..180 {
            for pulse in statuses.tick(DT) {
                if let StatusPulse::Damage { amount, .. } = pulse {
                    total += amount;
                }
            }
        }
        assert_eq!(total, 12);
        assert!(!statuses.has(StatusKind::Poison));
    }

    #[test]
    fn zero_duration_add_is_ignored() {
        let mut statuses = StatusEffects::default();
        statuses.add(StatusKind::Burn, 0.0, 5.0);
        assert!(statuses.is_empty());
    }
}
