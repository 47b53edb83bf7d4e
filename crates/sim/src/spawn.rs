use tracing::{debug, info, warn};

use crate::config::{BalanceConfig, PlayerTuning};
use crate::ecs::{
    Ai, Collider, Damage, Enemy, EntityId, EntityStore, Faction, Health, Transform, Visual,
    WeaponKind,
};
use crate::inventory::{Experience, Inventory, Item, SkillTree, WeaponItem};
use crate::math::Vec2;
use crate::perks::PerkBonuses;
use crate::status::StatusEffects;
use crate::weapons::equip_weapon;

pub const PLAYER_SPRITE: &str = "player";
pub const PLAYER_COLLIDER_SIZE: f32 = 28.0;
pub const STARTING_POTION_HEAL: u32 = 50;
pub const STARTING_POTIONS: u32 = 3;
const PLAYER_Z: i32 = 0;
const ENEMY_Z: i32 = 3;
const ENEMY_CRIT_MULTIPLIER: f32 = 1.5;

/// Player with the three starting weapons slotted, the sword equipped and a
/// stack of healing potions.
pub fn spawn_player(store: &mut EntityStore, position: Vec2, tuning: &PlayerTuning) -> EntityId {
    let id = store.create();
    store.add(id, Transform::at(position));
    store.add(id, Health::new(tuning.max_hp));
    store.add(id, Faction::Player);
    store.add(
        id,
        Collider::centered(PLAYER_COLLIDER_SIZE, PLAYER_COLLIDER_SIZE),
    );
    store.add(id, Visual::new(PLAYER_SPRITE, PLAYER_Z));
    store.add(id, StatusEffects::default());
    store.add(id, PerkBonuses::default());
    store.add(id, Experience::default());
    store.add(id, SkillTree::default());

    let mut inventory = Inventory::default();
    for (slot, kind) in WeaponKind::ALL.into_iter().enumerate() {
        inventory.set_weapon(slot, Some(WeaponItem::common(kind)));
    }
    inventory.set_consumable(0, Item::healing_potion(STARTING_POTION_HEAL), STARTING_POTIONS);
    store.add(id, inventory);
    equip_weapon(store, id, WeaponItem::common(WeaponKind::Sword));

    info!(entity_id = id.0, x = position.x, y = position.y, "player_spawned");
    id
}

/// Enemy of `enemy_type`; unknown types spawn as the fallback record with a
/// warning. Boss archetypes join the boss faction.
pub fn spawn_enemy(
    store: &mut EntityStore,
    balance: &BalanceConfig,
    enemy_type: &str,
    position: Vec2,
) -> EntityId {
    if !balance.contains(enemy_type) {
        warn!(enemy_type, "enemy_config_missing");
    }
    let config = balance.enemy(enemy_type);
    let faction = if config.is_boss() {
        Faction::Boss
    } else {
        Faction::Enemy
    };

    let id = store.create();
    store.add(id, Transform::at(position));
    store.add(id, Health::new(config.health));
    store.add(id, Damage::new(config.damage, 0.0, ENEMY_CRIT_MULTIPLIER));
    store.add(id, faction);
    let mut collider = Collider::centered(config.collider_size, config.collider_size);
    collider.solid = false;
    store.add(id, collider);
    let mut ai = Ai::new(config.agro_radius, config.attack_range);
    ai.patrol_center = Some(position);
    store.add(id, ai);
    store.add(
        id,
        Enemy {
            type_key: enemy_type.to_string(),
            level: config.level,
        },
    );
    store.add(id, Visual::new(format!("enemy_{enemy_type}"), ENEMY_Z));
    store.add(id, StatusEffects::default());

    if faction == Faction::Boss {
        info!(entity_id = id.0, enemy_type, "boss_spawned");
    } else {
        debug!(entity_id = id.0, enemy_type, "enemy_spawned");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Weapon;

    #[test]
    fn player_starts_with_sword_and_potions() {
        let mut store = EntityStore::new();
        let player = spawn_player(&mut store, Vec2::ZERO, &PlayerTuning::default());
        assert_eq!(store.get::<Health>(player).map(Health::hp), Some(100));
        assert_eq!(
            store.get::<Weapon>(player).map(|weapon| weapon.kind),
            Some(WeaponKind::Sword)
        );
        assert_eq!(store.get::<Damage>(player).map(|damage| damage.base), Some(15));
        let inventory = store.get::<Inventory>(player).cloned().unwrap_or_default();
        assert_eq!(inventory.consumable(0).map(|stack| stack.count), Some(3));
        assert_eq!(inventory.slot_of_weapon(WeaponKind::Crossbow), Some(2));
    }

    #[test]
    fn enemies_take_config_stats_and_faction() {
        let mut store = EntityStore::new();
        let balance = BalanceConfig::default();
        let goblin = spawn_enemy(&mut store, &balance, "goblin", Vec2::ZERO);
        let chief = spawn_enemy(&mut store, &balance, "goblin_chief", Vec2::ZERO);
        let small = spawn_enemy(&mut store, &balance, "slime_small", Vec2::ZERO);

        assert_eq!(store.get::<Health>(goblin).map(Health::max_hp), Some(30));
        assert_eq!(store.get::<Faction>(goblin), Some(&Faction::Enemy));
        assert_eq!(store.get::<Faction>(chief), Some(&Faction::Boss));
        assert_eq!(store.get::<Collider>(small).map(|c| c.width), Some(20.0));
        assert_eq!(
            store.get::<Visual>(goblin).map(|visual| visual.sprite.as_str()),
            Some("enemy_goblin")
        );
    }

    #[test]
    fn unknown_type_spawns_fallback_stats() {
        let mut store = EntityStore::new();
        let balance = BalanceConfig::default();
        let id = spawn_enemy(&mut store, &balance, "wyvern", Vec2::ZERO);
        assert_eq!(store.get::<Health>(id).map(Health::max_hp), Some(30));
        assert_eq!(
            store.get::<Enemy>(id).map(|enemy| enemy.type_key.as_str()),
            Some("wyvern")
        );
    }
}
