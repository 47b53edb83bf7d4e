use std::f32::consts::TAU;

use tracing::debug;

use crate::ecs::{
    Collider, ComponentKind, EntityId, EntityStore, Faction, Health, ProjectileShape, Transform,
    WeaponKind,
};
use crate::math::{Rect, Vec2};

const ARC_ANGLE_EPSILON: f32 = 1e-5;
const RAY_HIT_DISTANCE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitboxShape {
    Arc {
        center: Vec2,
        radius: f32,
        start_angle: f32,
        arc_angle: f32,
    },
    Line {
        start: Vec2,
        end: Vec2,
        width: f32,
    },
    Projectile {
        position: Vec2,
        direction: Vec2,
        shape: ProjectileShape,
        width: f32,
        height: f32,
    },
}

impl HitboxShape {
    pub fn contains_point(&self, point: Vec2) -> bool {
        match *self {
            HitboxShape::Arc {
                center,
                radius,
                start_angle,
                arc_angle,
            } => {
                let offset = point - center;
                let distance = offset.length();
                if distance > radius {
                    return false;
                }
                if distance == 0.0 || arc_angle >= TAU {
                    return true;
                }
                let swept = (offset.angle() - start_angle).rem_euclid(TAU);
                swept <= arc_angle + ARC_ANGLE_EPSILON
            }
            HitboxShape::Line { start, end, width } => {
                let segment = end - start;
                let length_squared = segment.length_squared();
                if length_squared == 0.0 {
                    return false;
                }
                let t = (point - start).dot(segment) / length_squared;
                if !(0.0..=1.0).contains(&t) {
                    return false;
                }
                let closest = start + segment.scale(t);
                point.distance(closest) <= width * 0.5
            }
            HitboxShape::Projectile {
                position,
                shape,
                width,
                height,
                ..
            } => match shape {
                ProjectileShape::Capsule => position.distance(point) <= width.min(height) * 0.5,
                ProjectileShape::Rect => {
                    (point.x - position.x).abs() <= width * 0.5
                        && (point.y - position.y).abs() <= height * 0.5
                }
                ProjectileShape::Ray => position.distance(point) <= RAY_HIT_DISTANCE,
            },
        }
    }

    /// Entity centre first, then each collider corner. A projectile sitting
    /// inside the collider also counts so small shots cannot slip through a box.
    pub fn hits(&self, center: Vec2, collider: Option<Rect>) -> bool {
        if self.contains_point(center) {
            return true;
        }
        let Some(rect) = collider else {
            return false;
        };
        if rect.corners().into_iter().any(|corner| self.contains_point(corner)) {
            return true;
        }
        match *self {
            HitboxShape::Projectile { position, .. } => rect.contains(position),
            _ => false,
        }
    }
}

/// Collision box of `id` derived from its current transform, if it has both.
pub fn collider_rect(store: &EntityStore, id: EntityId) -> Option<Rect> {
    let transform = store.get::<Transform>(id)?;
    let collider = store.get::<Collider>(id)?;
    Some(collider.rect(transform))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hitbox {
    pub owner: EntityId,
    pub owner_faction: Faction,
    pub shape: HitboxShape,
    pub start_frame: u64,
    pub end_frame: u64,
    pub weapon: Option<WeaponKind>,
    pub max_targets: Option<usize>,
    already_hit: Vec<EntityId>,
}

impl Hitbox {
    pub fn is_active(&self, frame: u64) -> bool {
        self.start_frame <= frame && frame <= self.end_frame
    }

    pub fn hit_count(&self) -> usize {
        self.already_hit.len()
    }

    fn is_saturated(&self) -> bool {
        self.max_targets
            .is_some_and(|limit| self.already_hit.len() >= limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitboxHit {
    pub owner: EntityId,
    pub target: EntityId,
    pub weapon: Option<WeaponKind>,
}

/// Transient attack shapes plus the frame counter their windows refer to.
/// The counter advances exactly once per simulation tick.
#[derive(Debug, Default)]
pub struct HitboxManager {
    frame: u64,
    hitboxes: Vec<Hitbox>,
    candidates: Vec<EntityId>,
}

impl HitboxManager {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    /// Registers a hitbox whose window is `[now + start_offset, now + end_offset]`.
    pub fn spawn(
        &mut self,
        owner: EntityId,
        owner_faction: Faction,
        shape: HitboxShape,
        start_offset: u64,
        end_offset: u64,
        weapon: Option<WeaponKind>,
    ) {
        let start_frame = self.frame.saturating_add(start_offset);
        let end_frame = self.frame.saturating_add(end_offset.max(start_offset));
        self.spawn_window(owner, owner_faction, shape, start_frame, end_frame, weapon, None);
    }

    /// Registers a hitbox with an absolute window.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_window(
        &mut self,
        owner: EntityId,
        owner_faction: Faction,
        shape: HitboxShape,
        start_frame: u64,
        end_frame: u64,
        weapon: Option<WeaponKind>,
        max_targets: Option<usize>,
    ) {
        debug!(
            owner = owner.0,
            start_frame,
            end_frame,
            frame = self.frame,
            "hitbox_spawned"
        );
        self.hitboxes.push(Hitbox {
            owner,
            owner_faction,
            shape,
            start_frame,
            end_frame,
            weapon,
            max_targets,
            already_hit: Vec::new(),
        });
    }

    pub fn limit_last_targets(&mut self, max_targets: usize) {
        if let Some(last) = self.hitboxes.last_mut() {
            last.max_targets = Some(max_targets);
        }
    }

    /// Advances the frame counter and purges hitboxes whose window closed.
    pub fn advance_frame(&mut self) {
        self.frame = self.frame.saturating_add(1);
        let frame = self.frame;
        self.hitboxes.retain(|hitbox| hitbox.end_frame >= frame);
    }

    pub fn clear_owner(&mut self, owner: EntityId) {
        self.hitboxes.retain(|hitbox| hitbox.owner != owner);
    }

    /// Hits registered by every hitbox active at the current frame. Targets
    /// must be alive, hostile to the owner and not yet hit by that hitbox.
    pub fn collect_hits(&mut self, store: &EntityStore) -> Vec<HitboxHit> {
        let frame = self.frame;
        let mut hits = Vec::new();
        if !self.hitboxes.iter().any(|hitbox| hitbox.is_active(frame)) {
            return hits;
        }
        store.query_into(
            &[
                ComponentKind::Transform,
                ComponentKind::Health,
                ComponentKind::Faction,
            ],
            &mut self.candidates,
        );

        for hitbox in &mut self.hitboxes {
            if !hitbox.is_active(frame) {
                continue;
            }
            for target in &self.candidates {
                if hitbox.is_saturated() {
                    break;
                }
                let target = *target;
                if target == hitbox.owner || hitbox.already_hit.contains(&target) {
                    continue;
                }
                let Some(faction) = store.get::<Faction>(target).copied() else {
                    continue;
                };
                if !hitbox.owner_faction.is_hostile_to(faction) {
                    continue;
                }
                if !store.get::<Health>(target).is_some_and(Health::is_alive) {
                    continue;
                }
                let Some(transform) = store.get::<Transform>(target) else {
                    continue;
                };
                if !hitbox
                    .shape
                    .hits(transform.position, collider_rect(store, target))
                {
                    continue;
                }
                hitbox.already_hit.push(target);
                hits.push(HitboxHit {
                    owner: hitbox.owner,
                    target,
                    weapon: hitbox.weapon,
                });
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword_arc(center: Vec2) -> HitboxShape {
        let arc_angle = 60f32.to_radians();
        HitboxShape::Arc {
            center,
            radius: 60.0,
            start_angle: -arc_angle * 0.5,
            arc_angle,
        }
    }

    fn spawn_target(store: &mut EntityStore, position: Vec2, faction: Faction) -> EntityId {
        let id = store.create();
        store.add(id, Transform::at(position));
        store.add(id, Health::new(30));
        store.add(id, faction);
        id
    }

    #[test]
    fn arc_contains_bisector_point_within_radius_only() {
        let arc = sword_arc(Vec2::ZERO);
        assert!(arc.contains_point(Vec2::new(60.0, 0.0)));
        assert!(arc.contains_point(Vec2::new(30.0, 0.0)));
        assert!(!arc.contains_point(Vec2::new(60.0 + 1e-3, 0.0)));
    }

    #[test]
    fn arc_rejects_points_outside_sweep() {
        let arc = sword_arc(Vec2::ZERO);
        assert!(!arc.contains_point(Vec2::new(0.0, 40.0)));
        assert!(!arc.contains_point(Vec2::new(-40.0, 0.0)));
        assert!(arc.contains_point(Vec2::ZERO));
    }

    #[test]
    fn arc_handles_sweep_across_negative_x_axis() {
        let arc_angle = 90f32.to_radians();
        let arc = HitboxShape::Arc {
            center: Vec2::ZERO,
            radius: 50.0,
            start_angle: std::f32::consts::PI - arc_angle * 0.5,
            arc_angle,
        };
        assert!(arc.contains_point(Vec2::new(-30.0, 0.0)));
        assert!(arc.contains_point(Vec2::new(-30.0, -10.0)));
        assert!(!arc.contains_point(Vec2::new(30.0, 0.0)));
    }

    #[test]
    fn line_uses_projection_and_half_width() {
        let line = HitboxShape::Line {
            start: Vec2::ZERO,
            end: Vec2::new(100.0, 0.0),
            width: 20.0,
        };
        assert!(line.contains_point(Vec2::new(50.0, 10.0)));
        assert!(!line.contains_point(Vec2::new(50.0, 10.5)));
        assert!(!line.contains_point(Vec2::new(-1.0, 0.0)));

        let degenerate = HitboxShape::Line {
            start: Vec2::ZERO,
            end: Vec2::ZERO,
            width: 20.0,
        };
        assert!(!degenerate.contains_point(Vec2::ZERO));
    }

    #[test]
    fn collider_corner_counts_as_hit() {
        let line = HitboxShape::Line {
            start: Vec2::ZERO,
            end: Vec2::new(100.0, 0.0),
            width: 4.0,
        };
        let rect = Rect {
            x: 40.0,
            y: 1.0,
            width: 20.0,
            height: 20.0,
        };
        assert!(!line.contains_point(rect.center()));
        assert!(line.hits(rect.center(), Some(rect)));
    }

    #[test]
    fn projectile_inside_collider_registers() {
        let shot = HitboxShape::Projectile {
            position: Vec2::new(5.0, 5.0),
            direction: Vec2::new(1.0, 0.0),
            shape: ProjectileShape::Capsule,
            width: 8.0,
            height: 8.0,
        };
        let rect = Rect {
            x: -14.0,
            y: -14.0,
            width: 28.0,
            height: 28.0,
        };
        assert!(shot.hits(Vec2::new(20.0, 20.0), Some(rect)));
    }

    #[test]
    fn hitbox_registers_only_inside_frame_window() {
        let mut store = EntityStore::new();
        let owner = spawn_target(&mut store, Vec2::ZERO, Faction::Player);
        spawn_target(&mut store, Vec2::new(30.0, 0.0), Faction::Enemy);

        let mut manager = HitboxManager::default();
        manager.spawn_window(owner, Faction::Player, sword_arc(Vec2::ZERO), 5, 7, None, None);
        for _ in 0..4 {
            manager.advance_frame();
        }
        assert_eq!(manager.frame(), 4);
        assert!(manager.collect_hits(&store).is_empty());

        manager.advance_frame();
        assert_eq!(manager.collect_hits(&store).len(), 1);
    }

    #[test]
    fn each_target_is_hit_once_per_hitbox() {
        let mut store = EntityStore::new();
        let owner = spawn_target(&mut store, Vec2::ZERO, Faction::Player);
        spawn_target(&mut store, Vec2::new(30.0, 0.0), Faction::Enemy);

        let mut manager = HitboxManager::default();
        manager.spawn(owner, Faction::Player, sword_arc(Vec2::ZERO), 0, 3, None);
        assert_eq!(manager.collect_hits(&store).len(), 1);
        manager.advance_frame();
        assert!(manager.collect_hits(&store).is_empty());
    }

    #[test]
    fn hits_skip_owner_and_friendly_factions() {
        let mut store = EntityStore::new();
        let owner = spawn_target(&mut store, Vec2::ZERO, Faction::Enemy);
        spawn_target(&mut store, Vec2::new(20.0, 0.0), Faction::Enemy);
        spawn_target(&mut store, Vec2::new(25.0, 0.0), Faction::Boss);
        let player = spawn_target(&mut store, Vec2::new(30.0, 0.0), Faction::Player);

        let mut manager = HitboxManager::default();
        manager.spawn(owner, Faction::Enemy, sword_arc(Vec2::ZERO), 0, 0, None);
        let hits = manager.collect_hits(&store);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, player);
    }

    #[test]
    fn expired_hitboxes_are_purged() {
        let mut manager = HitboxManager::default();
        manager.spawn(
            EntityId(0),
            Faction::Player,
            sword_arc(Vec2::ZERO),
            0,
            1,
            None,
        );
        manager.advance_frame();
        assert_eq!(manager.hitboxes().len(), 1);
        manager.advance_frame();
        assert!(manager.hitboxes().is_empty());
    }

    #[test]
    fn target_limit_caps_hits() {
        let mut store = EntityStore::new();
        let owner = spawn_target(&mut store, Vec2::ZERO, Faction::Player);
        for offset in [10.0, 20.0, 30.0] {
            spawn_target(&mut store, Vec2::new(offset, 0.0), Faction::Enemy);
        }
        let mut manager = HitboxManager::default();
        manager.spawn(owner, Faction::Player, sword_arc(Vec2::ZERO), 0, 0, None);
        manager.limit_last_targets(2);
        assert_eq!(manager.collect_hits(&store).len(), 2);
    }
}
