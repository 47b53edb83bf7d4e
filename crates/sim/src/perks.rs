use tracing::info;

use crate::ecs::{EntityId, EntityStore, Health, Weapon};
use crate::inventory::{Inventory, SkillTree, WeaponItem};
use crate::rng::SimRng;
use crate::status::{OnHitStatus, StatusEffects, StatusKind};
use crate::weapons::equip_weapon;

pub const DEFAULT_PERK_OFFER: usize = 3;
const MAX_DAMAGE_REDUCTION: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerkCategory {
    Weapon,
    Survival,
    Chivalry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerkRarity {
    Common,
    Rare,
    Epic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerkEffect {
    DamageMultiplier(f32),
    AttackDelayMultiplier(f32),
    Penetration(u32),
    CritChance(f32),
    CritMultiplier(f32),
    OnHitBurn { damage: f32, duration: f32 },
    MaxHp(u32),
    DamageReduction(f32),
    HpRegen(f32),
    StatusResistance(f32),
    Lifesteal(f32),
    DashDistanceMultiplier(f32),
    DashCooldownMultiplier(f32),
    DashDamage(u32),
    BattleCry { stun_duration: f32, cooldown: f32 },
    Aura { damage_bonus: f32, speed_bonus: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerkDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub category: PerkCategory,
    pub rarity: PerkRarity,
    pub effects: &'static [PerkEffect],
}

const fn perk(
    id: &'static str,
    name: &'static str,
    category: PerkCategory,
    rarity: PerkRarity,
    effects: &'static [PerkEffect],
) -> PerkDefinition {
    PerkDefinition {
        id,
        name,
        category,
        rarity,
        effects,
    }
}

use PerkCategory::{Chivalry, Survival, Weapon as WeaponTree};
use PerkRarity::{Common, Epic, Rare};

pub static PERKS: [PerkDefinition; 19] = [
    perk("weapon_damage_1", "Sharp Blade", WeaponTree, Common, &[PerkEffect::DamageMultiplier(1.2)]),
    perk("weapon_damage_2", "Master Forge", WeaponTree, Rare, &[PerkEffect::DamageMultiplier(1.4)]),
    perk("weapon_speed_1", "Swift Strikes", WeaponTree, Common, &[PerkEffect::AttackDelayMultiplier(0.75)]),
    perk("weapon_speed_2", "Lightning Fast", WeaponTree, Rare, &[PerkEffect::AttackDelayMultiplier(0.5)]),
    perk("weapon_penetration", "Piercing Strike", WeaponTree, Rare, &[PerkEffect::Penetration(1)]),
    perk("weapon_crit_1", "Critical Eye", WeaponTree, Common, &[PerkEffect::CritChance(0.15)]),
    perk(
        "weapon_crit_2",
        "Death Strike",
        WeaponTree,
        Epic,
        &[PerkEffect::CritChance(0.30), PerkEffect::CritMultiplier(0.5)],
    ),
    perk(
        "weapon_burn",
        "Flaming Weapon",
        WeaponTree,
        Rare,
        &[PerkEffect::OnHitBurn { damage: 5.0, duration: 3.0 }],
    ),
    perk("survival_hp_1", "Tough", Survival, Common, &[PerkEffect::MaxHp(25)]),
    perk("survival_hp_2", "Iron Constitution", Survival, Rare, &[PerkEffect::MaxHp(50)]),
    perk("survival_armor", "Armor Plating", Survival, Rare, &[PerkEffect::DamageReduction(0.2)]),
    perk("survival_regen", "Regeneration", Survival, Rare, &[PerkEffect::HpRegen(2.0)]),
    perk("survival_resist", "Resistance", Survival, Common, &[PerkEffect::StatusResistance(0.5)]),
    perk("survival_vampire", "Vampiric Strike", Survival, Epic, &[PerkEffect::Lifesteal(0.1)]),
    perk(
        "chivalry_dash_distance",
        "Long Dash",
        Chivalry,
        Common,
        &[PerkEffect::DashDistanceMultiplier(1.5)],
    ),
    perk(
        "chivalry_dash_cooldown",
        "Quick Recovery",
        Chivalry,
        Rare,
        &[PerkEffect::DashCooldownMultiplier(0.5)],
    ),
    perk("chivalry_dash_damage", "Dash Strike", Chivalry, Rare, &[PerkEffect::DashDamage(50)]),
    perk(
        "chivalry_battle_cry",
        "Battle Cry",
        Chivalry,
        Epic,
        &[PerkEffect::BattleCry { stun_duration: 2.0, cooldown: 30.0 }],
    ),
    perk(
        "chivalry_aura",
        "Aura of Might",
        Chivalry,
        Epic,
        &[PerkEffect::Aura { damage_bonus: 0.1, speed_bonus: 0.1 }],
    ),
];

pub fn find_perk(id: &str) -> Option<&'static PerkDefinition> {
    PERKS.iter().find(|perk| perk.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BattleCry {
    pub stun_duration: f32,
    pub cooldown: f32,
}

/// Accumulated perk effects read by combat, weapons and the player controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PerkBonuses {
    pub damage_multiplier: f32,
    pub attack_delay_multiplier: f32,
    pub extra_penetration: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub on_hit_burn: Option<OnHitStatus>,
    pub damage_reduction: f32,
    pub hp_regen: f32,
    pub status_resistance: f32,
    pub lifesteal: f32,
    pub dash_distance_multiplier: f32,
    pub dash_cooldown_multiplier: f32,
    pub dash_damage: u32,
    pub battle_cry: Option<BattleCry>,
    pub move_speed_bonus: f32,
}

impl Default for PerkBonuses {
    fn default() -> Self {
        Self {
            damage_multiplier: 1.0,
            attack_delay_multiplier: 1.0,
            extra_penetration: 0,
            crit_chance: 0.0,
            crit_multiplier: 0.0,
            on_hit_burn: None,
            damage_reduction: 0.0,
            hp_regen: 0.0,
            status_resistance: 0.0,
            lifesteal: 0.0,
            dash_distance_multiplier: 1.0,
            dash_cooldown_multiplier: 1.0,
            dash_damage: 0,
            battle_cry: None,
            move_speed_bonus: 0.0,
        }
    }
}

impl PerkBonuses {
    fn absorb(&mut self, effect: PerkEffect) {
        match effect {
            PerkEffect::DamageMultiplier(factor) => self.damage_multiplier *= factor,
            PerkEffect::AttackDelayMultiplier(factor) => self.attack_delay_multiplier *= factor,
            PerkEffect::Penetration(extra) => {
                self.extra_penetration = self.extra_penetration.saturating_add(extra)
            }
            PerkEffect::CritChance(bonus) => self.crit_chance += bonus,
            PerkEffect::CritMultiplier(bonus) => self.crit_multiplier += bonus,
            PerkEffect::OnHitBurn { damage, duration } => {
                self.on_hit_burn = Some(OnHitStatus {
                    kind: StatusKind::Burn,
                    duration,
                    value: damage,
                })
            }
            PerkEffect::MaxHp(_) => {}
            PerkEffect::DamageReduction(amount) => {
                self.damage_reduction = (self.damage_reduction + amount).min(MAX_DAMAGE_REDUCTION)
            }
            PerkEffect::HpRegen(amount) => self.hp_regen += amount,
            PerkEffect::StatusResistance(amount) => {
                self.status_resistance = (self.status_resistance + amount).min(1.0)
            }
            PerkEffect::Lifesteal(amount) => self.lifesteal += amount,
            PerkEffect::DashDistanceMultiplier(factor) => self.dash_distance_multiplier *= factor,
            PerkEffect::DashCooldownMultiplier(factor) => self.dash_cooldown_multiplier *= factor,
            PerkEffect::DashDamage(amount) => {
                self.dash_damage = self.dash_damage.saturating_add(amount)
            }
            PerkEffect::BattleCry {
                stun_duration,
                cooldown,
            } => {
                self.battle_cry = Some(BattleCry {
                    stun_duration,
                    cooldown,
                })
            }
            PerkEffect::Aura {
                damage_bonus,
                speed_bonus,
            } => {
                self.damage_multiplier *= 1.0 + damage_bonus;
                self.move_speed_bonus += speed_bonus;
            }
        }
    }
}

/// Rolls up to `count` distinct perks, weighting rarity 70/25/5 and falling
/// back to any remaining perk when the rolled rarity is exhausted.
pub fn roll_perks(
    rng: &mut SimRng,
    count: usize,
    exclude: &[String],
) -> Vec<&'static PerkDefinition> {
    let mut available: Vec<&'static PerkDefinition> = PERKS
        .iter()
        .filter(|perk| !exclude.iter().any(|excluded| excluded == perk.id))
        .collect();
    let mut rolled = Vec::with_capacity(count);

    for _ in 0..count {
        if available.is_empty() {
            break;
        }
        let roll = rng.roll();
        let rarity = if roll < 0.70 {
            PerkRarity::Common
        } else if roll < 0.95 {
            PerkRarity::Rare
        } else {
            PerkRarity::Epic
        };

        let matching: Vec<usize> = available
            .iter()
            .enumerate()
            .filter(|(_, perk)| perk.rarity == rarity)
            .map(|(index, _)| index)
            .collect();
        let chosen = if matching.is_empty() {
            rng.index(available.len())
        } else {
            rng.index(matching.len()).map(|pick| matching[pick])
        };
        let Some(chosen) = chosen else {
            break;
        };
        rolled.push(available.remove(chosen));
    }
    rolled
}

/// Applies `perk_id` to `entity` once. Returns `false` for unknown or
/// already unlocked perks and for missing entities.
pub fn apply_perk(store: &mut EntityStore, entity: EntityId, perk_id: &str) -> bool {
    let Some(perk) = find_perk(perk_id) else {
        return false;
    };
    if !store.contains(entity) {
        return false;
    }
    if store
        .get::<SkillTree>(entity)
        .is_some_and(|tree| tree.is_unlocked(perk.id))
    {
        return false;
    }

    let mut bonuses = store.get::<PerkBonuses>(entity).cloned().unwrap_or_default();
    for effect in perk.effects {
        bonuses.absorb(*effect);
        if let PerkEffect::MaxHp(amount) = effect {
            if let Some(health) = store.get_mut::<Health>(entity) {
                health.grow_max_hp(*amount);
            }
        }
    }
    if bonuses.hp_regen > 0.0 {
        if let Some(statuses) = store.get_mut::<StatusEffects>(entity) {
            statuses.refresh(StatusKind::Regen, f32::INFINITY, bonuses.hp_regen);
        }
    }
    store.add(entity, bonuses);

    let current_item = store
        .get::<Inventory>(entity)
        .and_then(Inventory::active_weapon)
        .or_else(|| {
            store
                .get::<Weapon>(entity)
                .map(|weapon| WeaponItem::common(weapon.kind))
        });
    if let Some(item) = current_item {
        equip_weapon(store, entity, item);
    }

    if !store.has::<SkillTree>(entity) {
        store.add(entity, SkillTree::default());
    }
    if let Some(tree) = store.get_mut::<SkillTree>(entity) {
        tree.unlock(perk.id);
    }
    info!(entity_id = entity.0, perk_id = perk.id, "perk_applied");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Damage, WeaponKind};

    fn armed_entity(store: &mut EntityStore) -> EntityId {
        let id = store.create();
        store.add(id, Health::new(100));
        store.add(id, StatusEffects::default());
        equip_weapon(store, id, WeaponItem::common(WeaponKind::Sword));
        id
    }

    #[test]
    fn perk_ids_are_unique() {
        for (index, perk) in PERKS.iter().enumerate() {
            assert!(
                PERKS.iter().skip(index + 1).all(|other| other.id != perk.id),
                "duplicate perk id {}",
                perk.id
            );
        }
    }

    #[test]
    fn roll_never_repeats_or_returns_excluded() {
        let mut rng = SimRng::seeded(11);
        let exclude = vec!["weapon_damage_1".to_string()];
        for _ in 0..50 {
            let rolled = roll_perks(&mut rng, 3, &exclude);
            assert_eq!(rolled.len(), 3);
            assert!(rolled.iter().all(|perk| perk.id != "weapon_damage_1"));
            assert_ne!(rolled[0].id, rolled[1].id);
            assert_ne!(rolled[1].id, rolled[2].id);
            assert_ne!(rolled[0].id, rolled[2].id);
        }
    }

    #[test]
    fn roll_stops_when_pool_is_exhausted() {
        let mut rng = SimRng::seeded(5);
        let exclude: Vec<String> = PERKS.iter().skip(1).map(|perk| perk.id.to_string()).collect();
        let rolled = roll_perks(&mut rng, 3, &exclude);
        assert_eq!(rolled.len(), 1);
        assert_eq!(rolled[0].id, PERKS[0].id);
    }

    #[test]
    fn damage_perk_scales_weapon_damage() {
        let mut store = EntityStore::new();
        let id = armed_entity(&mut store);
        assert!(apply_perk(&mut store, id, "weapon_damage_1"));
        assert_eq!(store.get::<Damage>(id).map(|damage| damage.base), Some(18));
        assert!(!apply_perk(&mut store, id, "weapon_damage_1"));
    }

    #[test]
    fn max_hp_perk_heals_by_same_amount() {
        let mut store = EntityStore::new();
        let id = armed_entity(&mut store);
        if let Some(health) = store.get_mut::<Health>(id) {
            health.take_damage(40);
        }
        assert!(apply_perk(&mut store, id, "survival_hp_1"));
        let health = store.get::<Health>(id).copied().expect("health");
        assert_eq!((health.max_hp(), health.hp()), (125, 85));
    }

    #[test]
    fn speed_perk_shortens_attack_delay() {
        let mut store = EntityStore::new();
        let id = armed_entity(&mut store);
        assert!(apply_perk(&mut store, id, "weapon_speed_2"));
        let delay = store.get::<Weapon>(id).map(|weapon| weapon.attack_delay);
        assert_eq!(delay, Some(0.25));
    }

    #[test]
    fn regen_perk_installs_permanent_regen() {
        let mut store = EntityStore::new();
        let id = armed_entity(&mut store);
        assert!(apply_perk(&mut store, id, "survival_regen"));
        let statuses = store.get::<StatusEffects>(id).expect("statuses");
        assert!(statuses.has(StatusKind::Regen));
    }

    #[test]
    fn unknown_perk_is_rejected() {
        let mut store = EntityStore::new();
        let id = armed_entity(&mut store);
        assert!(!apply_perk(&mut store, id, "does_not_exist"));
        assert!(store.get::<SkillTree>(id).is_none());
    }
}
