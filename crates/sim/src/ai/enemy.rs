use tracing::debug;

use crate::combat::Combat;
use crate::config::{BalanceConfig, EnemyArchetype, EnemyConfig};
use crate::ecs::{
    Ai, AiState, Collider, ComponentKind, Damage, Enemy, EntityId, EntityStore, Faction, Health,
    PathState, QueryBuffers, Transform,
};
use crate::level::LevelGrid;
use crate::math::{per_tick_velocity, Vec2, TIME_EPSILON};
use crate::pathfinding::{is_direct_fallback, Pathfinder};
use crate::puddle::{PuddleField, CONTACT_PUDDLE_RADIUS};
use crate::rng::SimRng;
use crate::spawn::spawn_enemy;
use crate::status::{StatusEffects, StatusKind};

pub const WAYPOINT_REACHED_DISTANCE: f32 = 10.0;
const SPLIT_JITTER: f32 = 20.0;

/// Shared, read-only inputs of one AI pass.
pub struct EnemyWorld<'a> {
    pub balance: &'a BalanceConfig,
    pub level: Option<&'a LevelGrid>,
    pub player: Option<EntityId>,
}

/// Runs the state machine of every non-boss enemy, in id order.
pub fn update_enemies(
    combat: &mut Combat<'_>,
    puddles: &mut PuddleField,
    world: &EnemyWorld<'_>,
    buffers: &mut QueryBuffers,
    dt: f32,
) {
    let target = world.player.and_then(|player| {
        let alive = combat
            .store
            .get::<Health>(player)
            .is_some_and(Health::is_alive);
        let position = combat.store.get::<Transform>(player).map(|t| t.position)?;
        alive.then_some((player, position))
    });

    combat.store.query_into(
        &[
            ComponentKind::Enemy,
            ComponentKind::Transform,
            ComponentKind::Ai,
            ComponentKind::Faction,
        ],
        &mut buffers.subjects,
    );
    for &id in &buffers.subjects {
        if combat.store.get::<Faction>(id) != Some(&Faction::Enemy) {
            continue;
        }
        let Some(type_key) = combat.store.get::<Enemy>(id).map(|e| e.type_key.clone()) else {
            continue;
        };
        let config = world.balance.enemy(&type_key);
        update_enemy(combat, puddles, world.level, id, config, target, dt);
    }
}

fn update_enemy(
    combat: &mut Combat<'_>,
    puddles: &mut PuddleField,
    level: Option<&LevelGrid>,
    id: EntityId,
    config: &EnemyConfig,
    target: Option<(EntityId, Vec2)>,
    dt: f32,
) {
    let Some(position) = combat.store.get::<Transform>(id).map(|t| t.position) else {
        return;
    };
    let (speed_multiplier, immobilized) = combat
        .store
        .get::<StatusEffects>(id)
        .map(|statuses| (statuses.speed_multiplier(), statuses.is_immobilized()))
        .unwrap_or((1.0, false));
    let Some(ai) = combat.store.get_mut::<Ai>(id) else {
        return;
    };
    ai.state_timer += dt;
    ai.attack_cooldown = (ai.attack_cooldown - dt).max(0.0);
    ai.dodge_timer = (ai.dodge_timer - dt).max(0.0);
    ai.contact_damage_timer = (ai.contact_damage_timer - dt).max(0.0);
    ai.path_refresh_timer += dt;

    if immobilized {
        ai.strike_remaining = 0.0;
        set_velocity(combat.store, id, Vec2::ZERO);
        return;
    }

    if ai.strike_remaining > TIME_EPSILON {
        ai.strike_remaining -= dt;
        return;
    }
    ai.strike_remaining = 0.0;

    let Some((player, player_position)) = target else {
        ai.target = None;
        if ai.set_state(AiState::Idle) {
            debug!(entity_id = id.0, state = ?AiState::Idle, "ai_state_changed");
        }
        set_velocity(combat.store, id, Vec2::ZERO);
        return;
    };
    ai.target = Some(player);

    let distance = position.distance(player_position);
    let next = if distance <= config.agro_radius {
        if distance <= config.attack_range && ai.attack_cooldown <= 0.0 {
            AiState::Attack
        } else {
            AiState::Chase
        }
    } else {
        AiState::Patrol
    };
    if ai.set_state(next) {
        if next == AiState::Chase {
            ai.path_refresh_timer = config.pathfinding_update_interval;
        }
        debug!(entity_id = id.0, state = ?next, "ai_state_changed");
    }

    match next {
        AiState::Patrol => patrol(combat.store, id, position, config, speed_multiplier),
        AiState::Chase => match config.archetype {
            EnemyArchetype::Slime => {
                let direction = (player_position - position).normalize_or(Vec2::ZERO);
                let speed = config.speed * config.states.chase.speed_multiplier * speed_multiplier;
                set_velocity(combat.store, id, per_tick_velocity(direction, speed));
            }
            EnemyArchetype::Grunt | EnemyArchetype::Boss => chase(
                combat.store,
                level,
                id,
                position,
                player_position,
                config,
                speed_multiplier,
            ),
        },
        AiState::Attack => attack(combat, id, position, player, player_position, config),
        AiState::Idle | AiState::Retreat => set_velocity(combat.store, id, Vec2::ZERO),
    }

    if config.contact_damage {
        contact_damage(combat, puddles, id, position, player, player_position, config);
    }
}

/// Walks back toward the spawn point and idles once inside the patrol radius.
fn patrol(
    store: &mut EntityStore,
    id: EntityId,
    position: Vec2,
    config: &EnemyConfig,
    speed_multiplier: f32,
) {
    let Some(ai) = store.get::<Ai>(id) else {
        return;
    };
    let center = ai.patrol_center.unwrap_or(position);
    let leash = ai.patrol_radius.max(WAYPOINT_REACHED_DISTANCE);
    let velocity = if position.distance(center) > leash {
        let speed = config.speed * config.states.patrol.speed_multiplier * speed_multiplier;
        per_tick_velocity((center - position).normalize_or(Vec2::ZERO), speed)
    } else {
        Vec2::ZERO
    };
    set_velocity(store, id, velocity);
}

fn chase(
    store: &mut EntityStore,
    level: Option<&LevelGrid>,
    id: EntityId,
    position: Vec2,
    player_position: Vec2,
    config: &EnemyConfig,
    speed_multiplier: f32,
) {
    let speed = config.speed * config.states.chase.speed_multiplier * speed_multiplier;
    let Some(ai) = store.get_mut::<Ai>(id) else {
        return;
    };

    if let Some(grid) = level {
        if ai.path_refresh_timer >= config.pathfinding_update_interval {
            let path = Pathfinder::new(grid).find_path(position, player_position);
            ai.path = if is_direct_fallback(&path, player_position) {
                None
            } else {
                Some(PathState::new(path))
            };
            ai.path_refresh_timer = 0.0;
            debug!(entity_id = id.0, has_path = ai.path.is_some(), "path_requested");
        }
    }

    let mut waypoint = None;
    if let Some(path) = ai.path.as_mut() {
        while let Some(next) = path.current_waypoint() {
            if next.distance(position) < WAYPOINT_REACHED_DISTANCE {
                path.advance();
                continue;
            }
            waypoint = Some(next);
            break;
        }
        if path.is_complete() {
            ai.path = None;
        }
    }

    let goal = waypoint.unwrap_or(player_position);
    let direction = (goal - position).normalize_or(Vec2::ZERO);
    set_velocity(store, id, per_tick_velocity(direction, speed));
}

fn attack(
    combat: &mut Combat<'_>,
    id: EntityId,
    position: Vec2,
    player: EntityId,
    player_position: Vec2,
    config: &EnemyConfig,
) {
    set_velocity(combat.store, id, Vec2::ZERO);
    let ready = combat
        .store
        .get::<Ai>(id)
        .is_some_and(|ai| ai.attack_cooldown <= 0.0);
    if !ready {
        return;
    }

    let tuning = config.states.attack;
    let direction = (player_position - position).normalize_or(Vec2::ZERO);
    set_velocity(
        combat.store,
        id,
        per_tick_velocity(direction, tuning.dash_speed),
    );
    if let Some(ai) = combat.store.get_mut::<Ai>(id) {
        ai.strike_remaining = tuning.dash_duration;
        ai.attack_cooldown = tuning.attack_cooldown.max(config.attack_delay);
    }

    if config.archetype == EnemyArchetype::Grunt
        && position.distance(player_position) <= config.attack_range
    {
        if let Some(damage) = combat.store.get::<Damage>(id).copied() {
            let (amount, is_crit) = damage.roll(combat.rng);
            combat.apply_damage(player, amount, Some(id), is_crit);
        }
    }

    if config.dodge_chance > 0.0 && combat.rng.chance(config.dodge_chance) {
        if let Some(ai) = combat.store.get_mut::<Ai>(id) {
            ai.dodge_timer = config.dodge_duration;
        }
        if let Some(statuses) = combat.store.get_mut::<StatusEffects>(id) {
            statuses.add(StatusKind::Invulnerable, config.dodge_duration, 0.0);
        }
        debug!(entity_id = id.0, "enemy_dodge_roll");
    }
}

fn contact_damage(
    combat: &mut Combat<'_>,
    puddles: &mut PuddleField,
    id: EntityId,
    position: Vec2,
    player: EntityId,
    player_position: Vec2,
    config: &EnemyConfig,
) {
    if position.distance(player_position) > config.attack_range {
        return;
    }
    let Some(ai) = combat.store.get_mut::<Ai>(id) else {
        return;
    };
    if ai.contact_damage_timer > 0.0 {
        return;
    }
    ai.contact_damage_timer = config.contact_damage_cooldown;
    combat.apply_damage(player, config.damage, Some(id), false);
    if config.slime_puddle_duration > 0.0 {
        puddles.add(
            position,
            CONTACT_PUDDLE_RADIUS,
            config.slime_puddle_duration,
            config.slime_puddle_slow,
        );
    }
}

/// On-death split of a slime-type enemy. Children are the `split_into` type,
/// scattered within 20 px, with colliders scaled by `split_size_multiplier`.
/// A type never splits into itself.
pub fn split_slime(
    store: &mut EntityStore,
    rng: &mut SimRng,
    balance: &BalanceConfig,
    parent_type: &str,
    position: Vec2,
) -> Vec<EntityId> {
    if !balance.contains(parent_type) {
        return Vec::new();
    }
    let parent = balance.enemy(parent_type);
    if parent.archetype != EnemyArchetype::Slime
        || parent.split_chance <= 0.0
        || parent.split_into == parent_type
    {
        return Vec::new();
    }
    if !rng.chance(parent.split_chance) {
        return Vec::new();
    }

    let size = parent.collider_size * parent.split_size_multiplier;
    let mut children = Vec::with_capacity(parent.split_count as usize);
    for _ in 0..parent.split_count {
        let offset = Vec2::new(
            rng.range_f32(-SPLIT_JITTER, SPLIT_JITTER),
            rng.range_f32(-SPLIT_JITTER, SPLIT_JITTER),
        );
        let child = spawn_enemy(store, balance, &parent.split_into, position + offset);
        if let Some(collider) = store.get_mut::<Collider>(child) {
            collider.width = size;
            collider.height = size;
            collider.offset = Vec2::new(-size * 0.5, -size * 0.5);
        }
        children.push(child);
    }
    debug!(parent_type, count = children.len(), "slime_split");
    children
}

fn set_velocity(store: &mut EntityStore, id: EntityId, velocity: Vec2) {
    if let Some(transform) = store.get_mut::<Transform>(id) {
        transform.velocity = velocity;
    }
}
