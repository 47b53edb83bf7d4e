use crate::ecs::{EntityId, WeaponKind};
use crate::events::GameEvent;

/// Per-run counters fed from the drained event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub kills: u32,
    pub total_damage: u32,
    pub damage_taken: u32,
    pub levels_gained: u32,
    pub elapsed_seconds: f64,
    damage_by_weapon: [u32; 3],
}

impl RunStats {
    pub fn advance(&mut self, dt: f32) {
        self.elapsed_seconds += f64::from(dt);
    }

    pub fn damage_with(&self, kind: WeaponKind) -> u32 {
        weapon_index(kind)
            .map(|index| self.damage_by_weapon[index])
            .unwrap_or(0)
    }

    pub fn record(&mut self, event: &GameEvent, player: Option<EntityId>) {
        match event {
            GameEvent::DamageTaken {
                target,
                amount,
                source,
                weapon,
                ..
            } => {
                if player.is_some() && *source == player {
                    self.total_damage = self.total_damage.saturating_add(*amount);
                    if let Some(index) = weapon.and_then(weapon_index) {
                        self.damage_by_weapon[index] =
                            self.damage_by_weapon[index].saturating_add(*amount);
                    }
                } else if Some(*target) == player {
                    self.damage_taken = self.damage_taken.saturating_add(*amount);
                }
            }
            GameEvent::EnemyKilled { .. } => self.kills = self.kills.saturating_add(1),
            GameEvent::LevelUp { entity, .. } if Some(*entity) == player => {
                self.levels_gained = self.levels_gained.saturating_add(1)
            }
            _ => {}
        }
    }

    /// Elapsed time as `MM:SS`.
    pub fn format_time(&self) -> String {
        let total = self.elapsed_seconds.max(0.0) as u64;
        format!("{:02}:{:02}", total / 60, total % 60)
    }
}

fn weapon_index(kind: WeaponKind) -> Option<usize> {
    WeaponKind::ALL.iter().position(|candidate| *candidate == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Faction;
    use crate::math::Vec2;

    fn hit(target: u64, source: u64, amount: u32, weapon: Option<WeaponKind>) -> GameEvent {
        GameEvent::DamageTaken {
            target: EntityId(target),
            amount,
            source: Some(EntityId(source)),
            is_crit: false,
            weapon,
            position: Vec2::ZERO,
        }
    }

    #[test]
    fn damage_is_split_by_weapon_and_direction() {
        let player = Some(EntityId(1));
        let mut stats = RunStats::default();
        stats.record(&hit(2, 1, 15, Some(WeaponKind::Sword)), player);
        stats.record(&hit(3, 1, 25, Some(WeaponKind::Crossbow)), player);
        stats.record(&hit(1, 2, 8, None), player);

        assert_eq!(stats.total_damage, 40);
        assert_eq!(stats.damage_with(WeaponKind::Sword), 15);
        assert_eq!(stats.damage_with(WeaponKind::Spear), 0);
        assert_eq!(stats.damage_with(WeaponKind::Crossbow), 25);
        assert_eq!(stats.damage_taken, 8);
    }

    #[test]
    fn kills_and_levels_are_counted() {
        let player = Some(EntityId(1));
        let mut stats = RunStats::default();
        stats.record(
            &GameEvent::EnemyKilled {
                entity: EntityId(4),
                killer: player,
                faction: Faction::Enemy,
                enemy_type: Some("goblin".to_string()),
                position: Vec2::ZERO,
            },
            player,
        );
        stats.record(
            &GameEvent::LevelUp {
                entity: EntityId(1),
                level: 2,
            },
            player,
        );
        stats.record(
            &GameEvent::LevelUp {
                entity: EntityId(9),
                level: 2,
            },
            player,
        );
        assert_eq!(stats.kills, 1);
        assert_eq!(stats.levels_gained, 1);
    }

    #[test]
    fn time_formats_as_minutes_and_seconds() {
        let mut stats = RunStats::default();
        for _ in 0..(125 * 60) {
            stats.advance(1.0 / 60.0);
        }
        assert_eq!(stats.format_time(), "02:05");
    }
}
