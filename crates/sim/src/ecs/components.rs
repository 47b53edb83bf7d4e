use serde::{Deserialize, Serialize};

use crate::inventory::Item;
use crate::math::{Rect, Vec2};
use crate::rng::SimRng;
use crate::status::OnHitStatus;

use super::store::EntityId;

const ATTACK_TIME_EPSILON: f64 = 1e-6;

/// Position plus per-tick displacement. Velocity is already scaled to one
/// reference tick (see [`crate::math::per_tick_velocity`]).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }
}

/// Hit points with `0 <= hp <= max_hp` held on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    max_hp: u32,
    hp: u32,
}

impl Health {
    pub fn new(max_hp: u32) -> Self {
        Self { max_hp, hp: max_hp }
    }

    pub fn with_hp(max_hp: u32, hp: u32) -> Self {
        Self {
            max_hp,
            hp: hp.min(max_hp),
        }
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn fraction(&self) -> f32 {
        if self.max_hp == 0 {
            return 0.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    /// Returns the hit points actually removed.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.hp);
        self.hp -= actual;
        actual
    }

    /// Returns the hit points actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.max_hp - self.hp);
        self.hp += actual;
        actual
    }

    /// Raises both the cap and current hp by `amount`.
    pub fn grow_max_hp(&mut self, amount: u32) {
        self.max_hp = self.max_hp.saturating_add(amount);
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damage {
    pub base: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub bonus: u32,
}

impl Damage {
    pub fn new(base: u32, crit_chance: f32, crit_multiplier: f32) -> Self {
        Self {
            base,
            crit_chance: crit_chance.clamp(0.0, 1.0),
            crit_multiplier,
            bonus: 0,
        }
    }

    pub fn amount_for(&self, is_crit: bool) -> u32 {
        let raw = self.base.saturating_add(self.bonus);
        if is_crit {
            (raw as f32 * self.crit_multiplier).round().max(0.0) as u32
        } else {
            raw
        }
    }

    /// One independent crit trial.
    pub fn roll(&self, rng: &mut SimRng) -> (u32, bool) {
        let is_crit = rng.chance(self.crit_chance);
        (self.amount_for(is_crit), is_crit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Player,
    Enemy,
    Boss,
    Neutral,
}

impl Faction {
    pub fn is_hostile_to(self, other: Faction) -> bool {
        match self {
            Faction::Player => matches!(other, Faction::Enemy | Faction::Boss),
            Faction::Enemy | Faction::Boss => other == Faction::Player,
            Faction::Neutral => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Sword,
    Spear,
    Crossbow,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 3] = [WeaponKind::Sword, WeaponKind::Spear, WeaponKind::Crossbow];

    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "sword" => Some(Self::Sword),
            "spear" => Some(Self::Spear),
            "crossbow" => Some(Self::Crossbow),
            _ => None,
        }
    }

    /// Unknown keys fall back to the sword.
    pub fn from_key_or_default(key: &str) -> Self {
        match Self::parse(key) {
            Some(kind) => kind,
            None => {
                tracing::warn!(weapon_type = key, fallback = "sword", "weapon_config_missing");
                Self::Sword
            }
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Sword => "sword",
            Self::Spear => "spear",
            Self::Crossbow => "crossbow",
        }
    }

    pub fn cycled(self, step: i32) -> Self {
        let len = Self::ALL.len() as i32;
        let index = Self::ALL.iter().position(|kind| *kind == self).unwrap_or(0) as i32;
        Self::ALL[(index + step).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub attack_delay: f32,
    pub range: f32,
    pub range_multiplier: f32,
    pub penetration: u32,
    pub projectile_speed: Option<f32>,
    pub reload_time: Option<f32>,
    pub ammo: Option<u32>,
    pub last_attack_time: Option<f64>,
    pub on_hit: Option<OnHitStatus>,
    pub lifesteal: f32,
}

impl Weapon {
    pub fn can_attack(&self, now: f64) -> bool {
        match self.last_attack_time {
            None => true,
            Some(last) => now - last + ATTACK_TIME_EPSILON >= self.attack_delay as f64,
        }
    }

    pub fn effective_range(&self) -> f32 {
        self.range * self.range_multiplier
    }
}

/// Axis-aligned box; `offset` is the top-left corner relative to the
/// entity position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub width: f32,
    pub height: f32,
    pub offset: Vec2,
    pub solid: bool,
}

impl Collider {
    /// Box centred on the entity position.
    pub fn centered(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            offset: Vec2::new(-width * 0.5, -height * 0.5),
            solid: true,
        }
    }

    pub fn rect(&self, transform: &Transform) -> Rect {
        Rect {
            x: transform.position.x.floor() + self.offset.x,
            y: transform.position.y.floor() + self.offset.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn center(&self, transform: &Transform) -> Vec2 {
        self.rect(transform).center()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AiState {
    #[default]
    Idle,
    Patrol,
    Chase,
    Attack,
    Retreat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BossAttackKind {
    Dash,
    Slam,
    Summon,
}

impl BossAttackKind {
    pub const PRIORITY: [BossAttackKind; 3] =
        [BossAttackKind::Dash, BossAttackKind::Slam, BossAttackKind::Summon];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTelegraph {
    pub kind: BossAttackKind,
    pub duration: f32,
    pub remaining: f32,
    pub anchor: Vec2,
}

/// World-space waypoints from one path request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathState {
    pub waypoints: Vec<Vec2>,
    pub next_index: usize,
}

impl PathState {
    pub fn new(waypoints: Vec<Vec2>) -> Self {
        Self {
            waypoints,
            next_index: 0,
        }
    }

    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.waypoints.get(self.next_index).copied()
    }

    pub fn advance(&mut self) {
        if self.next_index < self.waypoints.len() {
            self.next_index = self.next_index.saturating_add(1);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.waypoints.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ai {
    pub state: AiState,
    pub agro_radius: f32,
    pub attack_range: f32,
    pub patrol_radius: f32,
    pub patrol_center: Option<Vec2>,
    pub target: Option<EntityId>,
    pub state_timer: f32,
    pub telegraph: Option<PendingTelegraph>,
    pub attack_cooldown: f32,
    pub dodge_timer: f32,
    pub contact_damage_timer: f32,
    pub path_refresh_timer: f32,
    pub strike_remaining: f32,
    pub path: Option<PathState>,
}

impl Ai {
    pub fn new(agro_radius: f32, attack_range: f32) -> Self {
        Self {
            state: AiState::Idle,
            agro_radius,
            attack_range,
            patrol_radius: 0.0,
            patrol_center: None,
            target: None,
            state_timer: 0.0,
            telegraph: None,
            attack_cooldown: 0.0,
            dodge_timer: 0.0,
            contact_damage_timer: 0.0,
            path_refresh_timer: 0.0,
            strike_remaining: 0.0,
            path: None,
        }
    }

    /// Switches state and resets the state timer only on an actual change.
    pub fn set_state(&mut self, next: AiState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        self.state_timer = 0.0;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileShape {
    Capsule,
    Rect,
    Ray,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub owner: EntityId,
    pub owner_faction: Faction,
    pub damage: u32,
    pub is_crit: bool,
    pub lifetime: f32,
    pub penetration: u32,
    pub shape: ProjectileShape,
    pub width: f32,
    pub height: f32,
    pub weapon: Option<WeaponKind>,
    pub already_hit: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enemy {
    pub type_key: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loot {
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visual {
    pub sprite: String,
    pub z: i32,
}

impl Visual {
    pub fn new(sprite: impl Into<String>, z: i32) -> Self {
        Self {
            sprite: sprite.into(),
            z,
        }
    }
}
