use crate::ecs::{ComponentKind, EntityId, EntityStore, Transform, Visual};
use crate::effects::{DamageNumber, HitEffects, Particle};
use crate::events::GameEvent;
use crate::math::Vec2;
use crate::puddle::Puddle;
use crate::telegraph::Telegraph;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderable<'a> {
    pub id: EntityId,
    pub position: Vec2,
    pub sprite: &'a str,
    pub z: i32,
}

/// Everything a renderer may read after a tick. Borrowed; nothing here can
/// mutate simulation state.
#[derive(Debug, Clone)]
pub struct RenderView<'a> {
    pub renderables: Vec<Renderable<'a>>,
    pub camera_focus: Vec2,
    pub shake_offset: Vec2,
    pub telegraphs: &'a [Telegraph],
    pub puddles: &'a [Puddle],
    pub damage_numbers: &'a [DamageNumber],
    pub particles: &'a [Particle],
    pub events: &'a [GameEvent],
}

impl<'a> RenderView<'a> {
    pub(super) fn build(
        store: &'a EntityStore,
        camera_focus: Vec2,
        effects: &'a HitEffects,
        telegraphs: &'a [Telegraph],
        puddles: &'a [Puddle],
        events: &'a [GameEvent],
    ) -> Self {
        let mut renderables: Vec<Renderable<'a>> = store
            .query(&[ComponentKind::Transform, ComponentKind::Visual])
            .into_iter()
            .filter_map(|id| {
                let transform = store.get::<Transform>(id)?;
                let visual = store.get::<Visual>(id)?;
                Some(Renderable {
                    id,
                    position: transform.position,
                    sprite: visual.sprite.as_str(),
                    z: visual.z,
                })
            })
            .collect();
        renderables.sort_by_key(|renderable| (renderable.z, renderable.id));

        Self {
            renderables,
            camera_focus,
            shake_offset: effects.shake().offset(),
            telegraphs,
            puddles,
            damage_numbers: effects.damage_numbers(),
            particles: effects.particles(),
            events,
        }
    }
}
