//! Weapon base definitions and the rarity/special modifiers layered on top.

use serde::{Deserialize, Serialize};

use crate::ecs::{Damage, EntityId, EntityStore, Weapon, WeaponKind};
use crate::inventory::WeaponItem;
use crate::perks::PerkBonuses;
use crate::status::{OnHitStatus, StatusKind};

/// Shape a weapon produces when it swings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackProfile {
    Arc {
        arc_degrees: f32,
        start_frame: u64,
        end_frame: u64,
    },
    Cone {
        cone_degrees: f32,
        start_frame: u64,
        end_frame: u64,
    },
    Projectile {
        speed: f32,
        width: f32,
        height: f32,
        lifetime: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponDefinition {
    pub kind: WeaponKind,
    pub damage: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub range: f32,
    pub attack_delay: f32,
    pub penetration: u32,
    pub attack: AttackProfile,
}

pub fn definition(kind: WeaponKind) -> WeaponDefinition {
    match kind {
        WeaponKind::Sword => WeaponDefinition {
            kind,
            damage: 15,
            crit_chance: 0.1,
            crit_multiplier: 2.0,
            range: 60.0,
            attack_delay: 0.5,
            penetration: 0,
            attack: AttackProfile::Arc {
                arc_degrees: 60.0,
                start_frame: 0,
                end_frame: 3,
            },
        },
        WeaponKind::Spear => WeaponDefinition {
            kind,
            damage: 20,
            crit_chance: 0.15,
            crit_multiplier: 2.2,
            range: 90.0,
            attack_delay: 0.7,
            penetration: 1,
            attack: AttackProfile::Cone {
                cone_degrees: 30.0,
                start_frame: 2,
                end_frame: 5,
            },
        },
        WeaponKind::Crossbow => WeaponDefinition {
            kind,
            damage: 25,
            crit_chance: 0.2,
            crit_multiplier: 2.5,
            range: 400.0,
            attack_delay: 1.5,
            penetration: 0,
            attack: AttackProfile::Projectile {
                speed: 400.0,
                width: 8.0,
                height: 8.0,
                lifetime: 5.0,
            },
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RarityModifiers {
    pub damage_multiplier: f32,
    pub crit_chance_bonus: f32,
    pub crit_multiplier_bonus: f32,
    pub range_multiplier: f32,
    pub attack_speed_multiplier: f32,
}

impl Rarity {
    pub fn modifiers(self) -> RarityModifiers {
        let (damage, crit_chance, crit_multiplier, range, attack_speed) = match self {
            Rarity::Common => (1.0, 0.0, 0.0, 1.0, 1.0),
            Rarity::Rare => (1.15, 0.05, 0.2, 1.0, 1.0),
            Rarity::Epic => (1.3, 0.1, 0.4, 1.1, 1.0),
            Rarity::Legendary => (1.5, 0.15, 0.6, 1.2, 1.1),
        };
        RarityModifiers {
            damage_multiplier: damage,
            crit_chance_bonus: crit_chance,
            crit_multiplier_bonus: crit_multiplier,
            range_multiplier: range,
            attack_speed_multiplier: attack_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialModifier {
    Fire,
    Ice,
    Poison,
    Lifesteal,
    Chain,
}

impl SpecialModifier {
    fn damage_multiplier(self) -> f32 {
        match self {
            SpecialModifier::Fire => 1.1,
            _ => 1.0,
        }
    }

    fn on_hit(self) -> Option<OnHitStatus> {
        let (kind, duration, value) = match self {
            SpecialModifier::Fire => (StatusKind::Burn, 3.0, 2.0),
            SpecialModifier::Ice => (StatusKind::Slow, 2.0, 0.3),
            SpecialModifier::Poison => (StatusKind::Poison, 5.0, 1.0),
            SpecialModifier::Lifesteal | SpecialModifier::Chain => return None,
        };
        Some(OnHitStatus {
            kind,
            duration,
            value,
        })
    }

    fn lifesteal(self) -> f32 {
        match self {
            SpecialModifier::Lifesteal => 0.1,
            _ => 0.0,
        }
    }

    fn extra_penetration(self) -> u32 {
        match self {
            SpecialModifier::Chain => 1,
            _ => 0,
        }
    }
}

/// Final stats of one weapon item after rarity and special modifiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub kind: WeaponKind,
    pub damage: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub range: f32,
    pub attack_delay: f32,
    pub penetration: u32,
    pub attack: AttackProfile,
    pub on_hit: Option<OnHitStatus>,
    pub lifesteal: f32,
}

pub fn weapon_stats(item: WeaponItem) -> WeaponStats {
    let base = definition(item.kind);
    let rarity = item.rarity.modifiers();
    let special_multiplier = item
        .special
        .map(SpecialModifier::damage_multiplier)
        .unwrap_or(1.0);

    let damage =
        (base.damage as f32 * rarity.damage_multiplier * special_multiplier).floor() as u32;
    let attack_speed = rarity.attack_speed_multiplier.max(f32::EPSILON);

    WeaponStats {
        kind: item.kind,
        damage,
        crit_chance: (base.crit_chance + rarity.crit_chance_bonus).min(1.0),
        crit_multiplier: base.crit_multiplier + rarity.crit_multiplier_bonus,
        range: base.range * rarity.range_multiplier,
        attack_delay: base.attack_delay / attack_speed,
        penetration: base.penetration
            + item.special.map(SpecialModifier::extra_penetration).unwrap_or(0),
        attack: base.attack,
        on_hit: item.special.and_then(SpecialModifier::on_hit),
        lifesteal: item.special.map(SpecialModifier::lifesteal).unwrap_or(0.0),
    }
}

impl WeaponStats {
    pub fn projectile_speed(&self) -> Option<f32> {
        match self.attack {
            AttackProfile::Projectile { speed, .. } => Some(speed),
            _ => None,
        }
    }
}

/// Installs `item` as the entity's weapon and rewrites its Damage from the
/// weapon stats plus any perk bonuses. The previous cooldown stamp is kept so
/// switching weapons cannot skip a cooldown.
pub fn equip_weapon(store: &mut EntityStore, entity: EntityId, item: WeaponItem) -> bool {
    if !store.contains(entity) {
        return false;
    }
    let stats = weapon_stats(item);
    let bonuses = store
        .get::<PerkBonuses>(entity)
        .cloned()
        .unwrap_or_default();
    let last_attack_time = store
        .get::<Weapon>(entity)
        .and_then(|weapon| weapon.last_attack_time);
    let bonus_damage = store.get::<Damage>(entity).map(|damage| damage.bonus).unwrap_or(0);

    let weapon = Weapon {
        kind: stats.kind,
        attack_delay: stats.attack_delay * bonuses.attack_delay_multiplier,
        range: stats.range,
        range_multiplier: 1.0,
        penetration: stats.penetration.saturating_add(bonuses.extra_penetration),
        projectile_speed: stats.projectile_speed(),
        reload_time: None,
        ammo: None,
        last_attack_time,
        on_hit: stats.on_hit,
        lifesteal: stats.lifesteal,
    };
    let damage = Damage {
        base: (stats.damage as f32 * bonuses.damage_multiplier).floor() as u32,
        crit_chance: (stats.crit_chance + bonuses.crit_chance).clamp(0.0, 1.0),
        crit_multiplier: stats.crit_multiplier + bonuses.crit_multiplier,
        bonus: bonus_damage,
    };
    store.add(entity, weapon);
    store.add(entity, damage);
    true
}
