//! Damage application, death handling and attack declarations.

use tracing::{debug, info};

use crate::ecs::{
    ComponentKind, Damage, Enemy, EntityId, EntityStore, Faction, Health, Transform, Weapon,
    WeaponKind,
};
use crate::events::{EventQueue, GameEvent};
use crate::hitbox::{HitboxManager, HitboxShape};
use crate::inventory::{Experience, SkillTree};
use crate::math::Vec2;
use crate::perks::PerkBonuses;
use crate::projectile::{spawn_projectile, ProjectileSpawn};
use crate::rng::SimRng;
use crate::status::{OnHitStatus, StatusEffects};
use crate::weapons::{definition, AttackProfile};

/// Chance that any enemy-faction entity shrugs off an incoming hit.
pub const ENEMY_DODGE_CHANCE: f32 = 0.10;
pub const BASE_KILL_XP: u32 = 10;
pub const BOSS_XP_MULTIPLIER: u32 = 3;

const MIN_AIM_VELOCITY: f32 = 0.1;
const DEFAULT_FACING: Vec2 = Vec2 { x: 0.0, y: -1.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatRules {
    pub enemy_dodge_enabled: bool,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            enemy_dodge_enabled: true,
        }
    }
}

/// XP awarded for killing an entity of `enemy_level`:
/// `floor(10 * (1 + level * 0.1))`, tripled for bosses.
pub fn kill_xp(enemy_level: u32, faction: Faction) -> u32 {
    let xp = BASE_KILL_XP.saturating_mul(10u32.saturating_add(enemy_level)) / 10;
    if faction == Faction::Boss {
        xp.saturating_mul(BOSS_XP_MULTIPLIER)
    } else {
        xp
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponAttackOutcome {
    Unavailable,
    OnCooldown,
    Swung { direction: Vec2 },
    Fired { projectile: EntityId },
}

/// Borrowed view of the state combat resolution mutates.
pub struct Combat<'a> {
    pub store: &'a mut EntityStore,
    pub events: &'a mut EventQueue,
    pub rng: &'a mut SimRng,
    pub rules: CombatRules,
}

impl Combat<'_> {
    /// Applies `amount` to `target` and returns the hit points actually removed.
    ///
    /// Enemy-faction targets dodge 10% of hits outright; dodged or absorbed
    /// hits emit nothing. A hit that empties the health bar runs death handling.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
        is_crit: bool,
    ) -> u32 {
        self.apply_damage_from(target, amount, source, is_crit, None)
    }

    fn apply_damage_from(
        &mut self,
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
        is_crit: bool,
        weapon: Option<WeaponKind>,
    ) -> u32 {
        let Some(health) = self.store.get::<Health>(target) else {
            return 0;
        };
        if !health.is_alive() {
            return 0;
        }
        let faction = self.store.get::<Faction>(target).copied();
        if faction == Some(Faction::Enemy)
            && self.rules.enemy_dodge_enabled
            && self.rng.chance(ENEMY_DODGE_CHANCE)
        {
            debug!(target = target.0, "enemy_dodged");
            return 0;
        }
        if self
            .store
            .get::<StatusEffects>(target)
            .is_some_and(StatusEffects::is_invulnerable)
        {
            return 0;
        }

        let reduction = self
            .store
            .get::<PerkBonuses>(target)
            .map(|bonuses| bonuses.damage_reduction)
            .unwrap_or(0.0);
        let amount = if reduction > 0.0 {
            (amount as f32 * (1.0 - reduction)).floor() as u32
        } else {
            amount
        };

        let Some(health) = self.store.get_mut::<Health>(target) else {
            return 0;
        };
        let actual = health.take_damage(amount);
        let died = !health.is_alive();
        if actual == 0 {
            return 0;
        }

        let position = self.position_of(target);
        self.events.emit(GameEvent::DamageTaken {
            target,
            amount: actual,
            source,
            is_crit,
            weapon,
            position,
        });
        if died {
            self.handle_death(target, source);
        }
        actual
    }

    /// Weapon hit: damage plus lifesteal and on-hit statuses of the attacker.
    pub fn apply_hit(
        &mut self,
        target: EntityId,
        amount: u32,
        attacker: EntityId,
        is_crit: bool,
        weapon: Option<WeaponKind>,
    ) -> u32 {
        let actual = self.apply_damage_from(target, amount, Some(attacker), is_crit, weapon);
        if actual == 0 {
            return 0;
        }

        let (weapon_status, weapon_lifesteal) = self
            .store
            .get::<Weapon>(attacker)
            .map(|weapon| (weapon.on_hit, weapon.lifesteal))
            .unwrap_or((None, 0.0));
        let bonuses = self.store.get::<PerkBonuses>(attacker).cloned();
        let perk_burn = bonuses.as_ref().and_then(|bonuses| bonuses.on_hit_burn);
        let lifesteal = weapon_lifesteal
            + bonuses
                .as_ref()
                .map(|bonuses| bonuses.lifesteal)
                .unwrap_or(0.0);

        for status in [weapon_status, perk_burn].into_iter().flatten() {
            self.apply_status(target, status);
        }

        let heal = (actual as f32 * lifesteal).floor() as u32;
        if heal > 0 {
            self.heal(attacker, heal);
        }
        actual
    }

    /// Adds `status` to `target`, shortened by the target's status resistance.
    pub fn apply_status(&mut self, target: EntityId, status: OnHitStatus) {
        let resistance = self
            .store
            .get::<PerkBonuses>(target)
            .map(|bonuses| bonuses.status_resistance)
            .unwrap_or(0.0);
        let duration = if status.kind.is_debuff() {
            status.duration * (1.0 - resistance).max(0.0)
        } else {
            status.duration
        };
        if let Some(statuses) = self.store.get_mut::<StatusEffects>(target) {
            statuses.add(status.kind, duration, status.value);
        }
    }

    pub fn heal(&mut self, target: EntityId, amount: u32) -> u32 {
        let Some(health) = self.store.get_mut::<Health>(target) else {
            return 0;
        };
        if !health.is_alive() {
            return 0;
        }
        let actual = health.heal(amount);
        if actual > 0 {
            self.events.emit(GameEvent::Healed {
                target,
                amount: actual,
            });
        }
        actual
    }

    /// Radial attack around `target_point`, gated by the attacker's weapon
    /// cooldown. Returns the ids that took damage.
    pub fn perform_attack(
        &mut self,
        attacker: EntityId,
        target_point: Vec2,
        now: f64,
    ) -> Vec<EntityId> {
        let Some(weapon) = self.store.get::<Weapon>(attacker).cloned() else {
            return Vec::new();
        };
        let Some(damage) = self.store.get::<Damage>(attacker).copied() else {
            return Vec::new();
        };
        let Some(faction) = self.store.get::<Faction>(attacker).copied() else {
            return Vec::new();
        };
        if !self.store.has::<Transform>(attacker) || !weapon.can_attack(now) {
            return Vec::new();
        }
        if let Some(weapon) = self.store.get_mut::<Weapon>(attacker) {
            weapon.last_attack_time = Some(now);
        }

        let range = weapon.effective_range();
        let range_squared = range * range;
        let candidates = self.store.query(&[
            ComponentKind::Transform,
            ComponentKind::Health,
            ComponentKind::Faction,
        ]);
        let mut hits = Vec::new();

        for target in candidates {
            if target == attacker {
                continue;
            }
            let Some(target_faction) = self.store.get::<Faction>(target).copied() else {
                continue;
            };
            if !faction.is_hostile_to(target_faction) {
                continue;
            }
            let Some(position) = self.store.get::<Transform>(target).map(|t| t.position) else {
                continue;
            };
            if position.distance_squared(target_point) > range_squared {
                continue;
            }

            let (amount, is_crit) = damage.roll(self.rng);
            let actual = self.apply_hit(target, amount, attacker, is_crit, Some(weapon.kind));
            if actual > 0 {
                hits.push(target);
            }
            if weapon.penetration > 0 && hits.len() as u32 >= weapon.penetration + 1 {
                break;
            }
        }
        hits
    }

    /// Declares a weapon swing. Sword and spear spawn frame-windowed hitboxes;
    /// the crossbow fires a projectile carrying damage and crit rolled now.
    pub fn perform_weapon_attack(
        &mut self,
        hitboxes: &mut HitboxManager,
        attacker: EntityId,
        now: f64,
        aim_point: Option<Vec2>,
    ) -> WeaponAttackOutcome {
        let Some(weapon) = self.store.get::<Weapon>(attacker).cloned() else {
            return WeaponAttackOutcome::Unavailable;
        };
        let Some(transform) = self.store.get::<Transform>(attacker).copied() else {
            return WeaponAttackOutcome::Unavailable;
        };
        let Some(faction) = self.store.get::<Faction>(attacker).copied() else {
            return WeaponAttackOutcome::Unavailable;
        };
        if !weapon.can_attack(now) {
            return WeaponAttackOutcome::OnCooldown;
        }
        if let Some(weapon) = self.store.get_mut::<Weapon>(attacker) {
            weapon.last_attack_time = Some(now);
        }

        let origin = transform.position;
        let direction = attack_direction(origin, transform.velocity, aim_point);
        let range = weapon.effective_range();
        let max_targets = (weapon.penetration > 0).then(|| weapon.penetration as usize + 1);

        match definition(weapon.kind).attack {
            AttackProfile::Arc {
                arc_degrees,
                start_frame,
                end_frame,
            } => {
                let arc_angle = arc_degrees.to_radians();
                let shape = HitboxShape::Arc {
                    center: origin,
                    radius: range,
                    start_angle: direction.angle() - arc_angle * 0.5,
                    arc_angle,
                };
                hitboxes.spawn(attacker, faction, shape, start_frame, end_frame, Some(weapon.kind));
                if let Some(limit) = max_targets {
                    hitboxes.limit_last_targets(limit);
                }
                WeaponAttackOutcome::Swung { direction }
            }
            AttackProfile::Cone {
                cone_degrees,
                start_frame,
                end_frame,
            } => {
                let width = range * (cone_degrees.to_radians() * 0.5).tan() * 2.0;
                let shape = HitboxShape::Line {
                    start: origin,
                    end: origin + direction.scale(range),
                    width,
                };
                hitboxes.spawn(attacker, faction, shape, start_frame, end_frame, Some(weapon.kind));
                if let Some(limit) = max_targets {
                    hitboxes.limit_last_targets(limit);
                }
                WeaponAttackOutcome::Swung { direction }
            }
            AttackProfile::Projectile {
                speed,
                width,
                height,
                lifetime,
            } => {
                let (damage, is_crit) = self
                    .store
                    .get::<Damage>(attacker)
                    .copied()
                    .map(|damage| damage.roll(self.rng))
                    .unwrap_or((0, false));
                let projectile = spawn_projectile(
                    self.store,
                    ProjectileSpawn {
                        owner: attacker,
                        owner_faction: faction,
                        origin,
                        target: origin + direction.scale(range),
                        speed,
                        damage,
                        is_crit,
                        width,
                        height,
                        lifetime,
                        penetration: weapon.penetration,
                        weapon: Some(weapon.kind),
                    },
                );
                WeaponAttackOutcome::Fired { projectile }
            }
        }
    }

    /// Applies every hit the active hitboxes register this frame.
    pub fn resolve_hitbox_hits(&mut self, hitboxes: &mut HitboxManager) -> usize {
        let hits = hitboxes.collect_hits(self.store);
        let mut landed = 0;
        for hit in hits {
            let Some(damage) = self.store.get::<Damage>(hit.owner).copied() else {
                continue;
            };
            let (amount, is_crit) = damage.roll(self.rng);
            if self.apply_hit(hit.target, amount, hit.owner, is_crit, hit.weapon) > 0 {
                landed += 1;
            }
        }
        landed
    }

    pub fn grant_xp(&mut self, entity: EntityId, amount: u32) {
        let Some(experience) = self.store.get_mut::<Experience>(entity) else {
            return;
        };
        let gained = experience.add_xp(amount);
        let level = experience.level;
        self.events.emit(GameEvent::XpGained { entity, amount });
        if gained == 0 {
            return;
        }
        if let Some(tree) = self.store.get_mut::<SkillTree>(entity) {
            tree.available_points = tree.available_points.saturating_add(gained);
        }
        info!(entity_id = entity.0, level, "level_up");
        self.events.emit(GameEvent::LevelUp { entity, level });
    }

    fn handle_death(&mut self, target: EntityId, killer: Option<EntityId>) {
        let faction = self
            .store
            .get::<Faction>(target)
            .copied()
            .unwrap_or(Faction::Neutral);
        let position = self.position_of(target);

        match faction {
            Faction::Player => {
                info!(entity_id = target.0, "player_died");
                self.events.emit(GameEvent::PlayerDied { entity: target });
            }
            Faction::Enemy | Faction::Boss => {
                let enemy = self.store.get::<Enemy>(target).cloned();
                if let Some(killer) = killer {
                    let level = enemy.as_ref().map(|enemy| enemy.level).unwrap_or(1);
                    if self.store.has::<Experience>(killer) {
                        self.grant_xp(killer, kill_xp(level, faction));
                    }
                }
                debug!(entity_id = target.0, ?faction, "enemy_killed");
                self.events.emit(GameEvent::EnemyKilled {
                    entity: target,
                    killer,
                    faction,
                    enemy_type: enemy.map(|enemy| enemy.type_key),
                    position,
                });
                if faction == Faction::Enemy {
                    self.store.remove(target);
                }
            }
            Faction::Neutral => {
                self.store.remove(target);
            }
        }
    }

    fn position_of(&self, id: EntityId) -> Vec2 {
        self.store
            .get::<Transform>(id)
            .map(|transform| transform.position)
            .unwrap_or_default()
    }
}

/// Aim point if given, else the current movement direction, else facing up.
pub fn attack_direction(origin: Vec2, velocity: Vec2, aim_point: Option<Vec2>) -> Vec2 {
    if let Some(direction) = aim_point.and_then(|aim| (aim - origin).try_normalize()) {
        return direction;
    }
    if velocity.length() > MIN_AIM_VELOCITY {
        return velocity.normalize_or(DEFAULT_FACING);
    }
    DEFAULT_FACING
}
