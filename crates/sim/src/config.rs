//! Balance data and simulation tuning.
//!
//! Enemy balance is a JSON object keyed by enemy type. Every type the
//! simulation spawns has a built-in record so the core runs without files;
//! a loaded file replaces the built-ins wholesale.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::combat::CombatRules;

pub const FALLBACK_ENEMY_TYPE: &str = "goblin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read balance config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse balance json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("balance config defines no enemy types")]
    Empty,
    #[error("invalid balance config at {enemy_type}.{field}: {reason}")]
    Invalid {
        enemy_type: String,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyArchetype {
    #[default]
    Grunt,
    Slime,
    Boss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveStateTuning {
    pub speed_multiplier: f32,
}

impl Default for MoveStateTuning {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackStateTuning {
    pub dash_speed: f32,
    pub dash_duration: f32,
    pub attack_cooldown: f32,
}

impl Default for AttackStateTuning {
    fn default() -> Self {
        Self {
            dash_speed: 200.0,
            dash_duration: 0.3,
            attack_cooldown: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateTuning {
    pub patrol: MoveStateTuning,
    pub chase: MoveStateTuning,
    pub attack: AttackStateTuning,
}

impl Default for StateTuning {
    fn default() -> Self {
        Self {
            patrol: MoveStateTuning {
                speed_multiplier: 0.5,
            },
            chase: MoveStateTuning::default(),
            attack: AttackStateTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashAttackTuning {
    pub cooldown: f32,
    pub telegraph_duration: f32,
    pub dash_speed: f32,
    pub dash_duration: f32,
}

impl Default for DashAttackTuning {
    fn default() -> Self {
        Self {
            cooldown: 4.0,
            telegraph_duration: 0.5,
            dash_speed: 400.0,
            dash_duration: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlamAttackTuning {
    pub cooldown: f32,
    pub telegraph_duration: f32,
    pub damage: u32,
    pub range: f32,
    pub phase_2_damage_multiplier: f32,
    pub phase_2_range_multiplier: f32,
}

impl Default for SlamAttackTuning {
    fn default() -> Self {
        Self {
            cooldown: 3.0,
            telegraph_duration: 1.5,
            damage: 20,
            range: 150.0,
            phase_2_damage_multiplier: 1.5,
            phase_2_range_multiplier: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummonAttackTuning {
    pub cooldown: f32,
    pub telegraph_duration: f32,
    pub waves: u32,
    pub enemies_per_wave: u32,
    pub enemy_type: String,
    pub spawn_radius: f32,
}

impl Default for SummonAttackTuning {
    fn default() -> Self {
        Self {
            cooldown: 10.0,
            telegraph_duration: 1.0,
            waves: 2,
            enemies_per_wave: 3,
            enemy_type: FALLBACK_ENEMY_TYPE.to_string(),
            spawn_radius: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossAttackTuning {
    pub dash: DashAttackTuning,
    pub slam: SlamAttackTuning,
    pub summon: SummonAttackTuning,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaTuning {
    pub width: f32,
    pub height: f32,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroTuning {
    pub duration: f32,
}

impl Default for IntroTuning {
    fn default() -> Self {
        Self { duration: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyConfig {
    pub name: String,
    #[serde(default)]
    pub archetype: EnemyArchetype,
    pub health: u32,
    pub damage: u32,
    pub speed: f32,
    pub agro_radius: f32,
    pub attack_range: f32,
    #[serde(default = "default_attack_delay")]
    pub attack_delay: f32,
    #[serde(default)]
    pub dodge_chance: f32,
    #[serde(default)]
    pub dodge_duration: f32,
    #[serde(default = "default_pathfinding_update_interval")]
    pub pathfinding_update_interval: f32,
    #[serde(default)]
    pub contact_damage: bool,
    #[serde(default = "default_contact_damage_cooldown")]
    pub contact_damage_cooldown: f32,
    #[serde(default)]
    pub slime_puddle_duration: f32,
    #[serde(default)]
    pub slime_puddle_slow: f32,
    #[serde(default)]
    pub split_chance: f32,
    #[serde(default = "default_split_count")]
    pub split_count: u32,
    #[serde(default = "default_split_size_multiplier")]
    pub split_size_multiplier: f32,
    #[serde(default = "default_split_into")]
    pub split_into: String,
    #[serde(default = "default_collider_size")]
    pub collider_size: f32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub states: StateTuning,
    #[serde(default)]
    pub attacks: BossAttackTuning,
    #[serde(default)]
    pub arena: ArenaTuning,
    #[serde(default)]
    pub intro: IntroTuning,
    #[serde(default = "default_phase_2_threshold")]
    pub phase_2_threshold: f32,
    #[serde(default = "default_phase_2_speed_multiplier")]
    pub phase_2_speed_multiplier: f32,
}

fn default_attack_delay() -> f32 {
    1.0
}

fn default_pathfinding_update_interval() -> f32 {
    0.5
}

fn default_contact_damage_cooldown() -> f32 {
    1.0
}

fn default_split_count() -> u32 {
    2
}

fn default_split_size_multiplier() -> f32 {
    0.7
}

fn default_split_into() -> String {
    "slime_small".to_string()
}

fn default_collider_size() -> f32 {
    28.0
}

fn default_level() -> u32 {
    1
}

fn default_phase_2_threshold() -> f32 {
    0.4
}

fn default_phase_2_speed_multiplier() -> f32 {
    1.0
}

impl EnemyConfig {
    /// Record with every optional field at its default.
    pub fn base(
        name: &str,
        health: u32,
        damage: u32,
        speed: f32,
        agro_radius: f32,
        attack_range: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            archetype: EnemyArchetype::Grunt,
            health,
            damage,
            speed,
            agro_radius,
            attack_range,
            attack_delay: default_attack_delay(),
            dodge_chance: 0.0,
            dodge_duration: 0.0,
            pathfinding_update_interval: default_pathfinding_update_interval(),
            contact_damage: false,
            contact_damage_cooldown: default_contact_damage_cooldown(),
            slime_puddle_duration: 0.0,
            slime_puddle_slow: 0.0,
            split_chance: 0.0,
            split_count: default_split_count(),
            split_size_multiplier: default_split_size_multiplier(),
            split_into: default_split_into(),
            collider_size: default_collider_size(),
            level: default_level(),
            states: StateTuning::default(),
            attacks: BossAttackTuning::default(),
            arena: ArenaTuning::default(),
            intro: IntroTuning::default(),
            phase_2_threshold: default_phase_2_threshold(),
            phase_2_speed_multiplier: default_phase_2_speed_multiplier(),
        }
    }

    pub fn is_boss(&self) -> bool {
        self.archetype == EnemyArchetype::Boss
    }

    fn validate(&self, enemy_type: &str) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| ConfigError::Invalid {
            enemy_type: enemy_type.to_string(),
            field,
            reason,
        };

        if self.health == 0 {
            return Err(invalid("health", "must be greater than 0".to_string()));
        }
        for (field, value) in [
            ("speed", self.speed),
            ("agro_radius", self.agro_radius),
            ("attack_range", self.attack_range),
            ("attack_delay", self.attack_delay),
            ("dodge_duration", self.dodge_duration),
            (
                "pathfinding_update_interval",
                self.pathfinding_update_interval,
            ),
            ("contact_damage_cooldown", self.contact_damage_cooldown),
            ("slime_puddle_duration", self.slime_puddle_duration),
            ("collider_size", self.collider_size),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(
                    field,
                    format!("expected finite non-negative number, got {value}"),
                ));
            }
        }
        for (field, value) in [
            ("dodge_chance", self.dodge_chance),
            ("slime_puddle_slow", self.slime_puddle_slow),
            ("split_chance", self.split_chance),
            ("phase_2_threshold", self.phase_2_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("expected value in [0, 1], got {value}")));
            }
        }
        if !self.phase_2_speed_multiplier.is_finite() || self.phase_2_speed_multiplier <= 0.0 {
            return Err(invalid(
                "phase_2_speed_multiplier",
                format!(
                    "expected positive number, got {}",
                    self.phase_2_speed_multiplier
                ),
            ));
        }
        Ok(())
    }
}

/// Enemy balance keyed by type. Unknown types resolve to the goblin record.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceConfig {
    enemies: BTreeMap<String, EnemyConfig>,
    fallback: EnemyConfig,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        let goblin = builtin_goblin();

        let mut slime = EnemyConfig::base("Slime", 40, 6, 50.0, 180.0, 30.0);
        slime.archetype = EnemyArchetype::Slime;
        slime.contact_damage = true;
        slime.slime_puddle_duration = 3.0;
        slime.slime_puddle_slow = 0.4;
        slime.split_chance = 0.5;

        let mut slime_small = EnemyConfig::base("Small Slime", 15, 4, 70.0, 180.0, 25.0);
        slime_small.archetype = EnemyArchetype::Slime;
        slime_small.contact_damage = true;
        slime_small.slime_puddle_duration = 2.0;
        slime_small.slime_puddle_slow = 0.3;
        slime_small.collider_size = 20.0;

        let mut chief = EnemyConfig::base("Goblin Chief", 500, 15, 80.0, 600.0, 60.0);
        chief.archetype = EnemyArchetype::Boss;
        chief.level = 5;
        chief.phase_2_speed_multiplier = 1.5;

        let enemies = BTreeMap::from([
            (FALLBACK_ENEMY_TYPE.to_string(), goblin.clone()),
            ("slime".to_string(), slime),
            ("slime_small".to_string(), slime_small),
            ("goblin_chief".to_string(), chief),
        ]);
        Self {
            enemies,
            fallback: goblin,
        }
    }
}

fn builtin_goblin() -> EnemyConfig {
    let mut goblin = EnemyConfig::base("Goblin", 30, 8, 90.0, 200.0, 40.0);
    goblin.dodge_chance = 0.1;
    goblin.dodge_duration = 0.3;
    goblin
}

impl BalanceConfig {
    pub fn from_enemies(enemies: BTreeMap<String, EnemyConfig>) -> Result<Self, ConfigError> {
        if enemies.is_empty() {
            return Err(ConfigError::Empty);
        }
        for (enemy_type, config) in &enemies {
            config.validate(enemy_type)?;
            if config.split_chance > 0.0 && !enemies.contains_key(&config.split_into) {
                return Err(ConfigError::Invalid {
                    enemy_type: enemy_type.clone(),
                    field: "split_into",
                    reason: format!("unknown enemy type '{}'", config.split_into),
                });
            }
            if config.is_boss() && !enemies.contains_key(&config.attacks.summon.enemy_type) {
                return Err(ConfigError::Invalid {
                    enemy_type: enemy_type.clone(),
                    field: "attacks.summon.enemy_type",
                    reason: format!("unknown enemy type '{}'", config.attacks.summon.enemy_type),
                });
            }
        }
        let fallback = match enemies.get(FALLBACK_ENEMY_TYPE) {
            Some(goblin) => goblin.clone(),
            None => {
                warn!(
                    fallback = FALLBACK_ENEMY_TYPE,
                    "balance_fallback_missing_using_builtin"
                );
                builtin_goblin()
            }
        };
        Ok(Self { enemies, fallback })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let enemies: BTreeMap<String, EnemyConfig> =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let path = error.path().to_string();
                ConfigError::Parse {
                    path: if path.is_empty() { ".".to_string() } else { path },
                    source: error.into_inner(),
                }
            })?;
        Self::from_enemies(enemies)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn contains(&self, enemy_type: &str) -> bool {
        self.enemies.contains_key(enemy_type)
    }

    /// Record for `enemy_type`, or the goblin record for unknown types.
    pub fn enemy(&self, enemy_type: &str) -> &EnemyConfig {
        self.enemies.get(enemy_type).unwrap_or(&self.fallback)
    }

    pub fn enemy_types(&self) -> impl Iterator<Item = &str> {
        self.enemies.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    pub max_hp: u32,
    pub move_speed: f32,
    pub dodge_speed: f32,
    pub dodge_duration: f32,
    pub dodge_cooldown: f32,
    pub potion_cooldown: f32,
    pub attack_buffer: f32,
    pub input_smoothing: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_hp: 100,
            move_speed: 140.0,
            dodge_speed: 300.0,
            dodge_duration: 0.2,
            dodge_cooldown: 1.2,
            potion_cooldown: 10.0,
            attack_buffer: 0.3,
            input_smoothing: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub fixed_dt_seconds: f32,
    pub tile_size: f32,
    pub rng_seed: u64,
    pub enemy_dodge_enabled: bool,
    pub loot_drop_chance: f32,
    pub pickup_range: f32,
    pub max_events_per_tick: usize,
    pub player: PlayerTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_dt_seconds: 1.0 / 60.0,
            tile_size: crate::level::DEFAULT_TILE_SIZE,
            rng_seed: 0,
            enemy_dodge_enabled: true,
            loot_drop_chance: 0.3,
            pickup_range: 30.0,
            max_events_per_tick: 4096,
            player: PlayerTuning::default(),
        }
    }
}

impl SimulationConfig {
    pub fn combat_rules(&self) -> CombatRules {
        CombatRules {
            enemy_dodge_enabled: self.enemy_dodge_enabled,
        }
    }
}
