use tracing::debug;

use crate::combat::Combat;
use crate::ecs::{
    ComponentKind, EntityId, EntityStore, Faction, Health, Projectile, ProjectileShape,
    QueryBuffers, Transform, Visual, WeaponKind,
};
use crate::hitbox::{collider_rect, HitboxShape};
use crate::level::LevelGrid;
use crate::math::{per_tick_velocity, Vec2, TIME_EPSILON};

pub const PROJECTILE_SPRITE: &str = "projectile_bolt";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpawn {
    pub owner: EntityId,
    pub owner_faction: Faction,
    pub origin: Vec2,
    pub target: Vec2,
    pub speed: f32,
    pub damage: u32,
    pub is_crit: bool,
    pub width: f32,
    pub height: f32,
    pub lifetime: f32,
    pub penetration: u32,
    pub weapon: Option<WeaponKind>,
}

/// Spawns a capsule projectile travelling from `origin` toward `target` at a
/// constant per-tick velocity.
pub fn spawn_projectile(store: &mut EntityStore, spawn: ProjectileSpawn) -> EntityId {
    let direction = (spawn.target - spawn.origin).normalize_or(Vec2::new(0.0, -1.0));
    let id = store.create();
    store.add(
        id,
        Transform {
            position: spawn.origin,
            velocity: per_tick_velocity(direction, spawn.speed),
        },
    );
    store.add(
        id,
        Projectile {
            owner: spawn.owner,
            owner_faction: spawn.owner_faction,
            damage: spawn.damage,
            is_crit: spawn.is_crit,
            lifetime: spawn.lifetime,
            penetration: spawn.penetration,
            shape: ProjectileShape::Capsule,
            width: spawn.width,
            height: spawn.height,
            weapon: spawn.weapon,
            already_hit: Vec::new(),
        },
    );
    store.add(id, Visual::new(PROJECTILE_SPRITE, 5));
    debug!(projectile = id.0, owner = spawn.owner.0, "projectile_spawned");
    id
}

/// Ages every projectile, resolves collisions against hostile colliders and
/// removes projectiles that expired, stopped or hit a wall. Targets are
/// gathered once per tick; ones killed mid-pass fail the liveness check.
pub fn update_projectiles(
    combat: &mut Combat<'_>,
    buffers: &mut QueryBuffers,
    dt: f32,
    level: Option<&LevelGrid>,
) {
    let QueryBuffers { subjects, targets } = buffers;
    combat.store.query_into(
        &[ComponentKind::Projectile, ComponentKind::Transform],
        subjects,
    );
    if subjects.is_empty() {
        return;
    }
    combat.store.query_into(
        &[
            ComponentKind::Transform,
            ComponentKind::Health,
            ComponentKind::Faction,
        ],
        targets,
    );

    for &projectile_id in subjects.iter() {
        let Some(mut projectile) = combat.store.get::<Projectile>(projectile_id).cloned() else {
            continue;
        };
        let Some(transform) = combat.store.get::<Transform>(projectile_id).copied() else {
            continue;
        };

        projectile.lifetime -= dt;
        if projectile.lifetime <= TIME_EPSILON {
            combat.store.remove(projectile_id);
            continue;
        }
        if level.is_some_and(|level| !level.is_walkable_world(transform.position)) {
            debug!(projectile = projectile_id.0, "projectile_hit_wall");
            combat.store.remove(projectile_id);
            continue;
        }

        let shape = HitboxShape::Projectile {
            position: transform.position,
            direction: transform.velocity.normalize_or(Vec2::ZERO),
            shape: projectile.shape,
            width: projectile.width,
            height: projectile.height,
        };
        let mut destroyed = false;
        for &target in targets.iter() {
            if target == projectile_id
                || target == projectile.owner
                || projectile.already_hit.contains(&target)
            {
                continue;
            }
            let Some(faction) = combat.store.get::<Faction>(target).copied() else {
                continue;
            };
            if !projectile.owner_faction.is_hostile_to(faction) {
                continue;
            }
            if !combat.store.get::<Health>(target).is_some_and(Health::is_alive) {
                continue;
            }
            let Some(position) = combat.store.get::<Transform>(target).map(|t| t.position) else {
                continue;
            };
            if !shape.hits(position, collider_rect(combat.store, target)) {
                continue;
            }

            projectile.already_hit.push(target);
            combat.apply_hit(
                target,
                projectile.damage,
                projectile.owner,
                projectile.is_crit,
                projectile.weapon,
            );
            if projectile.penetration > 0 {
                projectile.penetration -= 1;
                continue;
            }
            destroyed = true;
            break;
        }

        if destroyed {
            combat.store.remove(projectile_id);
        } else if let Some(stored) = combat.store.get_mut::<Projectile>(projectile_id) {
            *stored = projectile;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatRules;
    use crate::ecs::Collider;
    use crate::events::EventQueue;
    use crate::rng::SimRng;

    fn target(store: &mut EntityStore, position: Vec2, faction: Faction) -> EntityId {
        let id = store.create();
        store.add(id, Transform::at(position));
        store.add(id, Health::new(50));
        store.add(id, faction);
        store.add(id, Collider::centered(28.0, 28.0));
        id
    }

    fn shot(owner: EntityId, origin: Vec2, penetration: u32, lifetime: f32) -> ProjectileSpawn {
        ProjectileSpawn {
            owner,
            owner_faction: Faction::Player,
            origin,
            target: origin + Vec2::new(100.0, 0.0),
            speed: 400.0,
            damage: 25,
            is_crit: false,
            width: 8.0,
            height: 8.0,
            lifetime,
            penetration,
            weapon: Some(WeaponKind::Crossbow),
        }
    }

    fn run(store: &mut EntityStore, events: &mut EventQueue, rng: &mut SimRng) {
        let mut combat = Combat {
            store,
            events,
            rng,
            rules: CombatRules {
                enemy_dodge_enabled: false,
            },
        };
        update_projectiles(&mut combat, &mut QueryBuffers::default(), 1.0 / 60.0, None);
    }

    #[test]
    fn projectile_damages_hostile_and_self_destructs() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let mut rng = SimRng::seeded(1);
        let owner = target(&mut store, Vec2::new(-100.0, 0.0), Faction::Player);
        let enemy = target(&mut store, Vec2::ZERO, Faction::Enemy);
        let bolt = spawn_projectile(&mut store, shot(owner, Vec2::new(2.0, 0.0), 0, 5.0));

        run(&mut store, &mut events, &mut rng);
        assert_eq!(store.get::<Health>(enemy).map(Health::hp), Some(25));
        assert!(!store.contains(bolt));
    }

    #[test]
    fn penetrating_projectile_survives_first_hit() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let mut rng = SimRng::seeded(1);
        let owner = target(&mut store, Vec2::new(-100.0, 0.0), Faction::Player);
        target(&mut store, Vec2::ZERO, Faction::Enemy);
        let bolt = spawn_projectile(&mut store, shot(owner, Vec2::ZERO, 1, 5.0));

        run(&mut store, &mut events, &mut rng);
        assert!(store.contains(bolt));
        assert_eq!(store.get::<Projectile>(bolt).map(|p| p.penetration), Some(0));

        run(&mut store, &mut events, &mut rng);
        assert!(store.contains(bolt), "same target is not hit twice");
    }

    #[test]
    fn projectile_ignores_owner_and_friends() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let mut rng = SimRng::seeded(1);
        let owner = target(&mut store, Vec2::ZERO, Faction::Player);
        let ally = target(&mut store, Vec2::new(1.0, 0.0), Faction::Player);
        let bolt = spawn_projectile(&mut store, shot(owner, Vec2::ZERO, 0, 5.0));

        run(&mut store, &mut events, &mut rng);
        assert!(store.contains(bolt));
        assert_eq!(store.get::<Health>(ally).map(Health::hp), Some(50));
        assert_eq!(store.get::<Health>(owner).map(Health::hp), Some(50));
    }

    #[test]
    fn projectile_expires_with_lifetime() {
        let mut store = EntityStore::new();
        let mut events = EventQueue::default();
        let mut rng = SimRng::seeded(1);
        let owner = target(&mut store, Vec2::ZERO, Faction::Player);
        let bolt = spawn_projectile(&mut store, shot(owner, Vec2::new(500.0, 0.0), 0, 0.01));
        run(&mut store, &mut events, &mut rng);
        assert!(!store.contains(bolt));
    }
}
