//! Persistent progression. Only level, experience, purse, perks and slot
//! contents survive a save; positions, cooldowns and AI state never do.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ecs::{EntityId, EntityStore};
use crate::inventory::{
    ConsumableStack, Experience, Inventory, SkillTree, WeaponItem, CONSUMABLE_SLOT_COUNT,
    WEAPON_SLOT_COUNT,
};
use crate::perks::{apply_perk, find_perk, PerkBonuses};
use crate::weapons::equip_weapon;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("failed to read save {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse save json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unsupported save_version: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("invalid {field}: expected {expected} slots, got {actual}")]
    SlotCount {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid active_weapon_slot {slot}")]
    ActiveSlot { slot: usize },
    #[error("unknown perk id '{perk_id}'")]
    UnknownPerk { perk_id: String },
    #[error("no player entity to capture or restore")]
    NoPlayer,
    #[error("entity {entity} is missing {component}")]
    MissingComponent {
        entity: u64,
        component: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSnapshot {
    pub save_version: u32,
    pub level: u32,
    pub xp: u32,
    pub next_xp: u32,
    pub gold: u32,
    #[serde(default)]
    pub skill_points: u32,
    pub unlocked_perks: Vec<String>,
    pub weapon_slots: Vec<Option<WeaponItem>>,
    #[serde(default)]
    pub active_weapon_slot: usize,
    pub consumable_slots: Vec<Option<ConsumableStack>>,
}

impl ProgressionSnapshot {
    pub fn capture(store: &EntityStore, player: EntityId) -> Result<Self, ProgressionError> {
        let experience = store
            .get::<Experience>(player)
            .ok_or(missing(player, "Experience"))?;
        let inventory = store
            .get::<Inventory>(player)
            .ok_or(missing(player, "Inventory"))?;
        let tree = store.get::<SkillTree>(player).cloned().unwrap_or_default();

        Ok(Self {
            save_version: SAVE_VERSION,
            level: experience.level,
            xp: experience.xp,
            next_xp: experience.next_xp,
            gold: inventory.gold,
            skill_points: tree.available_points,
            unlocked_perks: tree.unlocked,
            weapon_slots: inventory.weapon_slots.to_vec(),
            active_weapon_slot: inventory.active_weapon_slot,
            consumable_slots: inventory.consumable_slots.to_vec(),
        })
    }

    pub fn validate(&self) -> Result<(), ProgressionError> {
        if self.save_version != SAVE_VERSION {
            return Err(ProgressionError::VersionMismatch {
                expected: SAVE_VERSION,
                actual: self.save_version,
            });
        }
        if self.weapon_slots.len() != WEAPON_SLOT_COUNT {
            return Err(ProgressionError::SlotCount {
                field: "weapon_slots",
                expected: WEAPON_SLOT_COUNT,
                actual: self.weapon_slots.len(),
            });
        }
        if self.consumable_slots.len() != CONSUMABLE_SLOT_COUNT {
            return Err(ProgressionError::SlotCount {
                field: "consumable_slots",
                expected: CONSUMABLE_SLOT_COUNT,
                actual: self.consumable_slots.len(),
            });
        }
        if self.active_weapon_slot >= WEAPON_SLOT_COUNT {
            return Err(ProgressionError::ActiveSlot {
                slot: self.active_weapon_slot,
            });
        }
        if let Some(perk_id) = self
            .unlocked_perks
            .iter()
            .find(|perk_id| find_perk(perk_id).is_none())
        {
            return Err(ProgressionError::UnknownPerk {
                perk_id: perk_id.clone(),
            });
        }
        Ok(())
    }

    /// Restores progression onto a freshly spawned player. Perks are
    /// re-applied from scratch so their stat effects come back too.
    pub fn apply(&self, store: &mut EntityStore, player: EntityId) -> Result<(), ProgressionError> {
        self.validate()?;
        if !store.has::<Experience>(player) {
            return Err(missing(player, "Experience"));
        }
        if !store.has::<Inventory>(player) {
            return Err(missing(player, "Inventory"));
        }

        if let Some(experience) = store.get_mut::<Experience>(player) {
            experience.level = self.level;
            experience.xp = self.xp;
            experience.next_xp = self.next_xp;
        }
        let mut active = None;
        if let Some(inventory) = store.get_mut::<Inventory>(player) {
            inventory.gold = self.gold;
            for (target, weapon) in inventory.weapon_slots.iter_mut().zip(&self.weapon_slots) {
                *target = *weapon;
            }
            for (target, stack) in inventory
                .consumable_slots
                .iter_mut()
                .zip(&self.consumable_slots)
            {
                *target = stack.clone().filter(|stack| stack.count > 0);
            }
            if !inventory.switch_weapon_slot(self.active_weapon_slot) {
                inventory.active_weapon_slot = self.active_weapon_slot;
            }
            active = inventory.active_weapon();
        }

        store.add(player, PerkBonuses::default());
        store.add(
            player,
            SkillTree {
                unlocked: Vec::new(),
                available_points: self.skill_points,
            },
        );
        for perk_id in &self.unlocked_perks {
            apply_perk(store, player, perk_id);
        }
        if let Some(item) = active {
            equip_weapon(store, player, item);
        }
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ProgressionError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let snapshot: Self =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let path = error.path().to_string();
                ProgressionError::Parse {
                    path: if path.is_empty() { ".".to_string() } else { path },
                    source: error.into_inner(),
                }
            })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, ProgressionError> {
        serde_json::to_string_pretty(self).map_err(ProgressionError::Encode)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ProgressionError> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ProgressionError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| ProgressionError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ProgressionError> {
        let raw = fs::read_to_string(path).map_err(|source| ProgressionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

fn missing(player: EntityId, component: &'static str) -> ProgressionError {
    ProgressionError::MissingComponent {
        entity: player.0,
        component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerTuning;
    use crate::ecs::{Damage, Health, Weapon, WeaponKind};
    use crate::math::Vec2;
    use crate::spawn::spawn_player;

    fn progressed_player(store: &mut EntityStore) -> EntityId {
        let player = spawn_player(store, Vec2::ZERO, &PlayerTuning::default());
        if let Some(experience) = store.get_mut::<Experience>(player) {
            experience.level = 3;
            experience.xp = 12;
            experience.next_xp = 112;
        }
        if let Some(inventory) = store.get_mut::<Inventory>(player) {
            inventory.add_gold(140);
            inventory.use_consumable(0);
            inventory.switch_weapon_slot(1);
        }
        assert!(apply_perk(store, player, "weapon_damage_1"));
        assert!(apply_perk(store, player, "survival_hp_1"));
        player
    }

    #[test]
    fn capture_then_apply_restores_progression_only() {
        let mut store = EntityStore::new();
        let player = progressed_player(&mut store);
        let snapshot = ProgressionSnapshot::capture(&store, player).expect("capture");
        assert_eq!(snapshot.unlocked_perks, vec!["weapon_damage_1".to_string(), "survival_hp_1".to_string()]);

        let mut fresh_store = EntityStore::new();
        let fresh = spawn_player(&mut fresh_store, Vec2::new(50.0, 50.0), &PlayerTuning::default());
        snapshot.apply(&mut fresh_store, fresh).expect("apply");

        let experience = fresh_store.get::<Experience>(fresh).copied().expect("experience");
        assert_eq!((experience.level, experience.xp, experience.next_xp), (3, 12, 112));
        let inventory = fresh_store.get::<Inventory>(fresh).cloned().expect("inventory");
        assert_eq!(inventory.gold, 140);
        assert_eq!(inventory.consumable(0).map(|stack| stack.count), Some(2));
        assert_eq!(
            fresh_store.get::<Weapon>(fresh).map(|weapon| weapon.kind),
            Some(WeaponKind::Spear)
        );
        assert_eq!(
            fresh_store.get::<Damage>(fresh).map(|damage| damage.base),
            store.get::<Damage>(player).map(|damage| damage.base)
        );
        assert_eq!(fresh_store.get::<Health>(fresh).map(Health::hp), Some(125));
    }

    #[test]
    fn json_round_trip_through_file() {
        let mut store = EntityStore::new();
        let player = progressed_player(&mut store);
        let snapshot = ProgressionSnapshot::capture(&store, player).expect("capture");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("saves").join("progress.json");
        snapshot.save_to_path(&path).expect("save");
        let loaded = ProgressionSnapshot::load_from_path(&path).expect("load");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut store = EntityStore::new();
        let player = progressed_player(&mut store);
        let mut snapshot = ProgressionSnapshot::capture(&store, player).expect("capture");
        snapshot.save_version = 99;
        let raw = snapshot.to_json_pretty().expect("encode");
        assert!(matches!(
            ProgressionSnapshot::from_json_str(&raw),
            Err(ProgressionError::VersionMismatch {
                expected: 1,
                actual: 99
            })
        ));
    }

    #[test]
    fn slot_count_mismatch_is_rejected() {
        let mut store = EntityStore::new();
        let player = progressed_player(&mut store);
        let mut snapshot = ProgressionSnapshot::capture(&store, player).expect("capture");
        snapshot.weapon_slots.pop();
        let error = snapshot.apply(&mut store, player).expect_err("must fail");
        assert!(matches!(
            error,
            ProgressionError::SlotCount {
                field: "weapon_slots",
                ..
            }
        ));
    }

    #[test]
    fn parse_errors_name_the_field() {
        let raw = r#"{ "save_version": 1, "level": "three" }"#;
        let error = ProgressionSnapshot::from_json_str(raw).expect_err("must fail");
        assert!(error.to_string().contains("level"), "{error}");
    }
}
