use serde::{Deserialize, Serialize};

use crate::ecs::WeaponKind;
use crate::weapons::{Rarity, SpecialModifier};

pub const MAX_INVENTORY_ITEMS: usize = 20;
pub const WEAPON_SLOT_COUNT: usize = 3;
pub const CONSUMABLE_SLOT_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Gold,
    Weapon,
    Armor,
    Potion,
    Consumable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub value: u32,
    #[serde(default)]
    pub heal_amount: u32,
}

impl Item {
    pub fn gold(amount: u32) -> Self {
        Self {
            name: "gold".to_string(),
            kind: ItemKind::Gold,
            value: amount,
            heal_amount: 0,
        }
    }

    pub fn healing_potion(heal_amount: u32) -> Self {
        Self {
            name: "healing_potion".to_string(),
            kind: ItemKind::Potion,
            value: 25,
            heal_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponItem {
    pub kind: WeaponKind,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub special: Option<SpecialModifier>,
}

impl WeaponItem {
    pub fn common(kind: WeaponKind) -> Self {
        Self {
            kind,
            rarity: Rarity::Common,
            special: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableStack {
    pub item: Item,
    pub count: u32,
}

/// Bag, gold purse and the fixed weapon/consumable slots. Slot indices out of
/// range make the operation fail instead of panicking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    items: Vec<Item>,
    pub gold: u32,
    pub weapon_slots: [Option<WeaponItem>; WEAPON_SLOT_COUNT],
    pub active_weapon_slot: usize,
    pub consumable_slots: [Option<ConsumableStack>; CONSUMABLE_SLOT_COUNT],
}

impl Inventory {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn add_item(&mut self, item: Item) -> bool {
        if self.items.len() >= MAX_INVENTORY_ITEMS {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove_item(&mut self, index: usize) -> Option<Item> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index))
    }

    pub fn add_gold(&mut self, amount: u32) {
        self.gold = self.gold.saturating_add(amount);
    }

    pub fn spend_gold(&mut self, amount: u32) -> bool {
        if self.gold < amount {
            return false;
        }
        self.gold -= amount;
        true
    }

    pub fn set_weapon(&mut self, slot: usize, weapon: Option<WeaponItem>) -> bool {
        let Some(target) = self.weapon_slots.get_mut(slot) else {
            return false;
        };
        *target = weapon;
        true
    }

    pub fn active_weapon(&self) -> Option<WeaponItem> {
        self.weapon_slots
            .get(self.active_weapon_slot)
            .copied()
            .flatten()
    }

    /// Selects `slot` if it holds a weapon.
    pub fn switch_weapon_slot(&mut self, slot: usize) -> bool {
        match self.weapon_slots.get(slot) {
            Some(Some(_)) => {
                self.active_weapon_slot = slot;
                true
            }
            _ => false,
        }
    }

    pub fn slot_of_weapon(&self, kind: WeaponKind) -> Option<usize> {
        self.weapon_slots
            .iter()
            .position(|slot| slot.is_some_and(|weapon| weapon.kind == kind))
    }

    pub fn set_consumable(&mut self, slot: usize, item: Item, count: u32) -> bool {
        let Some(target) = self.consumable_slots.get_mut(slot) else {
            return false;
        };
        *target = (count > 0).then_some(ConsumableStack { item, count });
        true
    }

    pub fn consumable(&self, slot: usize) -> Option<&ConsumableStack> {
        self.consumable_slots.get(slot)?.as_ref()
    }

    /// Takes one item from `slot`, clearing the slot when the stack runs out.
    pub fn use_consumable(&mut self, slot: usize) -> Option<Item> {
        let entry = self.consumable_slots.get_mut(slot)?;
        let stack = entry.as_mut()?;
        let item = stack.item.clone();
        stack.count = stack.count.saturating_sub(1);
        if stack.count == 0 {
            *entry = None;
        }
        Some(item)
    }
}

pub const STARTING_NEXT_XP: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Experience {
    pub level: u32,
    pub xp: u32,
    pub next_xp: u32,
    pub xp_multiplier: f32,
}

impl Default for Experience {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            next_xp: STARTING_NEXT_XP,
            xp_multiplier: 1.0,
        }
    }
}

impl Experience {
    /// Adds experience and returns how many levels were gained.
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        let scaled = (amount as f32 * self.xp_multiplier).floor().max(0.0) as u32;
        self.xp = self.xp.saturating_add(scaled);
        let mut gained = 0;
        while self.next_xp > 0 && self.xp >= self.next_xp {
            self.xp -= self.next_xp;
            self.level = self.level.saturating_add(1);
            self.next_xp = (self.next_xp as f32 * 1.5).floor() as u32;
            gained += 1;
        }
        gained
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillTree {
    pub unlocked: Vec<String>,
    pub available_points: u32,
}

impl SkillTree {
    pub fn is_unlocked(&self, perk_id: &str) -> bool {
        self.unlocked.iter().any(|unlocked| unlocked == perk_id)
    }

    pub fn unlock(&mut self, perk_id: &str) -> bool {
        if self.is_unlocked(perk_id) {
            return false;
        }
        self.unlocked.push(perk_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_rejects_items_past_capacity() {
        let mut inventory = Inventory::default();
        for _ in 0..MAX_INVENTORY_ITEMS {
            assert!(inventory.add_item(Item::gold(1)));
        }
        assert!(!inventory.add_item(Item::gold(1)));
        assert!(inventory.remove_item(MAX_INVENTORY_ITEMS).is_none());
        assert!(inventory.remove_item(0).is_some());
    }

    #[test]
    fn invalid_slot_indices_fail_softly() {
        let mut inventory = Inventory::default();
        assert!(!inventory.set_weapon(3, Some(WeaponItem::common(WeaponKind::Sword))));
        assert!(!inventory.switch_weapon_slot(7));
        assert!(!inventory.set_consumable(2, Item::healing_potion(50), 1));
        assert!(inventory.use_consumable(5).is_none());
    }

    #[test]
    fn switching_requires_an_occupied_slot() {
        let mut inventory = Inventory::default();
        inventory.set_weapon(0, Some(WeaponItem::common(WeaponKind::Sword)));
        assert!(!inventory.switch_weapon_slot(1));
        inventory.set_weapon(1, Some(WeaponItem::common(WeaponKind::Spear)));
        assert!(inventory.switch_weapon_slot(1));
        assert_eq!(
            inventory.active_weapon().map(|weapon| weapon.kind),
            Some(WeaponKind::Spear)
        );
    }

    #[test]
    fn last_consumable_use_returns_item_and_clears_slot() {
        let mut inventory = Inventory::default();
        inventory.set_consumable(0, Item::healing_potion(50), 2);
        assert!(inventory.use_consumable(0).is_some());
        assert_eq!(inventory.consumable(0).map(|stack| stack.count), Some(1));
        assert_eq!(
            inventory.use_consumable(0).map(|item| item.heal_amount),
            Some(50)
        );
        assert!(inventory.consumable(0).is_none());
        assert!(inventory.use_consumable(0).is_none());
    }

    #[test]
    fn gold_cannot_go_negative() {
        let mut inventory = Inventory::default();
        inventory.add_gold(10);
        assert!(!inventory.spend_gold(11));
        assert!(inventory.spend_gold(10));
        assert_eq!(inventory.gold, 0);
    }

    #[test]
    fn add_xp_rolls_over_multiple_levels() {
        let mut experience = Experience::default();
        assert_eq!(experience.add_xp(49), 0);
        assert_eq!(experience.add_xp(1 + 75), 2);
        assert_eq!(experience.level, 3);
        assert_eq!(experience.xp, 0);
        assert_eq!(experience.next_xp, 112);
    }
}
