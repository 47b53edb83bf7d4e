use tracing::debug;

use crate::ecs::{ComponentKind, EntityId, EntityStore, Faction, Loot, Transform, Visual};
use crate::events::{EventQueue, GameEvent};
use crate::inventory::{Inventory, Item, ItemKind};
use crate::math::Vec2;
use crate::rng::SimRng;

pub const LOOT_SPRITE: &str = "loot";
const LOOT_Z: i32 = 1;
const GOLD_PER_LEVEL: (u32, u32) = (5, 15);

pub fn spawn_loot(store: &mut EntityStore, position: Vec2, item: Item) -> EntityId {
    let id = store.create();
    store.add(id, Transform::at(position));
    store.add(id, Loot { item });
    store.add(id, Visual::new(LOOT_SPRITE, LOOT_Z));
    id
}

/// Random bag item worth 5 to 50 gold; potions heal 10 to 50.
pub fn random_item(rng: &mut SimRng) -> Item {
    const KINDS: [ItemKind; 4] = [
        ItemKind::Weapon,
        ItemKind::Armor,
        ItemKind::Potion,
        ItemKind::Consumable,
    ];
    let kind = rng
        .index(KINDS.len())
        .map(|index| KINDS[index])
        .unwrap_or(ItemKind::Consumable);
    let name = match kind {
        ItemKind::Weapon => "weapon",
        ItemKind::Armor => "armor",
        ItemKind::Potion => "potion",
        ItemKind::Gold | ItemKind::Consumable => "consumable",
    };
    let value = rng.range_u32(5, 50);
    let heal_amount = if kind == ItemKind::Potion {
        rng.range_u32(10, 50)
    } else {
        0
    };
    Item {
        name: name.to_string(),
        kind,
        value,
        heal_amount,
    }
}

/// Rolls the drop for a killed enemy. Bosses always drop; everything else
/// drops gold scaled by level with probability `drop_chance`.
pub fn roll_enemy_drop(
    rng: &mut SimRng,
    faction: Faction,
    enemy_level: u32,
    drop_chance: f32,
) -> Option<Item> {
    if faction != Faction::Boss && !rng.chance(drop_chance) {
        return None;
    }
    let (min, max) = GOLD_PER_LEVEL;
    let amount = rng.range_u32(min, max).saturating_mul(enemy_level.max(1));
    Some(Item::gold(amount))
}

pub fn drop_enemy_loot(
    store: &mut EntityStore,
    events: &mut EventQueue,
    rng: &mut SimRng,
    faction: Faction,
    enemy_level: u32,
    position: Vec2,
    drop_chance: f32,
) -> Option<EntityId> {
    let item = roll_enemy_drop(rng, faction, enemy_level, drop_chance)?;
    let id = spawn_loot(store, position, item.clone());
    debug!(loot_id = id.0, value = item.value, "loot_dropped");
    events.emit(GameEvent::ItemDropped { position, item });
    Some(id)
}

/// Collects every loot entity within `range` of `collector`. Gold goes to the
/// purse; other items stay on the floor when the bag is full.
pub fn auto_pickup(
    store: &mut EntityStore,
    events: &mut EventQueue,
    collector: EntityId,
    range: f32,
) -> usize {
    let Some(origin) = store.get::<Transform>(collector).map(|t| t.position) else {
        return 0;
    };
    if !store.has::<Inventory>(collector) {
        return 0;
    }

    let range_squared = range * range;
    let mut picked = 0;
    for loot_id in store.query(&[ComponentKind::Loot, ComponentKind::Transform]) {
        let Some(position) = store.get::<Transform>(loot_id).map(|t| t.position) else {
            continue;
        };
        if position.distance_squared(origin) > range_squared {
            continue;
        }
        let Some(item) = store.get::<Loot>(loot_id).map(|loot| loot.item.clone()) else {
            continue;
        };
        let Some(inventory) = store.get_mut::<Inventory>(collector) else {
            break;
        };
        let taken = if item.kind == ItemKind::Gold {
            inventory.add_gold(item.value);
            true
        } else {
            inventory.add_item(item.clone())
        };
        if !taken {
            continue;
        }
        store.remove(loot_id);
        events.emit(GameEvent::ItemPickedUp {
            entity: collector,
            item,
        });
        picked += 1;
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MAX_INVENTORY_ITEMS;

    fn collector(store: &mut EntityStore) -> EntityId {
        let id = store.create();
        store.add(id, Transform::at(Vec2::new(100.0, 100.0)));
        store.add(id, Inventory::default());
        id
    }

    #[test]
    fn gold_in_range_is_collected_into_purse() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let player = collector(&mut store);
        let near = spawn_loot(&mut store, Vec2::new(120.0, 100.0), Item::gold(12));
        let far = spawn_loot(&mut store, Vec2::new(200.0, 100.0), Item::gold(7));

        assert_eq!(auto_pickup(&mut store, &mut events, player, 30.0), 1);
        assert_eq!(store.get::<Inventory>(player).map(|inv| inv.gold), Some(12));
        assert!(!store.contains(near));
        assert!(store.contains(far));
        assert_eq!(events.pending_len(), 1);
    }

    #[test]
    fn full_bag_leaves_items_on_the_floor() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let player = collector(&mut store);
        if let Some(inventory) = store.get_mut::<Inventory>(player) {
            for _ in 0..MAX_INVENTORY_ITEMS {
                assert!(inventory.add_item(Item::healing_potion(10)));
            }
        }
        let potion = spawn_loot(&mut store, Vec2::new(100.0, 100.0), Item::healing_potion(30));

        assert_eq!(auto_pickup(&mut store, &mut events, player, 30.0), 0);
        assert!(store.contains(potion));
        assert_eq!(events.pending_len(), 0);
    }

    #[test]
    fn bosses_always_drop() {
        let mut rng = SimRng::seeded(1);
        for _ in 0..50 {
            assert!(roll_enemy_drop(&mut rng, Faction::Boss, 5, 0.0).is_some());
            assert!(roll_enemy_drop(&mut rng, Faction::Enemy, 1, 0.0).is_none());
        }
    }

    #[test]
    fn random_items_stay_in_value_range() {
        let mut rng = SimRng::seeded(3);
        for _ in 0..200 {
            let item = random_item(&mut rng);
            assert!((5..=50).contains(&item.value));
            if item.kind == ItemKind::Potion {
                assert!((10..=50).contains(&item.heal_amount));
            }
        }
    }
}
