//! Scripted stand-in for a human player: hunt the nearest hostile, swing when
//! close, drink a potion when hurt and roll away from enemies that crowd in.

use sim::ecs::{ComponentKind, EntityId, EntityStore, Faction, Health, Transform};
use sim::pathfinding::Pathfinder;
use sim::{AttackTrigger, PlayerIntent, Simulation, Vec2};

const REPATH_INTERVAL_SECONDS: f32 = 0.5;
const ENGAGE_DISTANCE: f32 = 45.0;
const CROWDED_DISTANCE: f32 = 30.0;
const LOW_HEALTH_FRACTION: f32 = 0.4;
const WAYPOINT_REACHED_DISTANCE: f32 = 8.0;

#[derive(Debug, Default)]
pub(crate) struct Autopilot {
    target: Option<EntityId>,
    path: Vec<Vec2>,
    repath_in: f32,
}

impl Autopilot {
    pub(crate) fn next_intent(&mut self, sim: &Simulation) -> PlayerIntent {
        self.repath_in -= sim.config().fixed_dt_seconds;
        let mut intent = PlayerIntent::default();
        let Some(player) = sim.player() else {
            return intent;
        };
        let store = sim.store();
        let Some(health) = store.get::<Health>(player).copied() else {
            return intent;
        };
        if !health.is_alive() {
            return intent;
        }
        let Some(position) = store.get::<Transform>(player).map(|t| t.position) else {
            return intent;
        };

        if health.fraction() < LOW_HEALTH_FRACTION && sim.controller().potion_cooldown().is_ready()
        {
            intent.consumable_slot = Some(0);
        }

        let Some((target, target_position)) = nearest_hostile(store, position) else {
            self.target = None;
            self.path.clear();
            return intent;
        };
        if self.target != Some(target) {
            self.target = Some(target);
            self.repath_in = 0.0;
        }

        let distance = position.distance(target_position);
        if distance <= ENGAGE_DISTANCE {
            intent.attack = Some(AttackTrigger {
                timestamp: sim.time(),
                aim_point: Some(target_position),
            });
            if distance < CROWDED_DISTANCE && sim.controller().dodge_cooldown().is_ready() {
                let away = (position - target_position).normalize_or(Vec2::new(0.0, 1.0));
                intent.movement = away;
                intent.dodge = Some(sim.time());
            }
            return intent;
        }

        intent.movement = self.steer(sim, position, target_position);
        intent
    }

    fn steer(&mut self, sim: &Simulation, position: Vec2, goal: Vec2) -> Vec2 {
        let Some(level) = sim.level() else {
            return (goal - position).normalize_or(Vec2::ZERO);
        };
        if self.repath_in <= 0.0 || self.path.is_empty() {
            self.path = Pathfinder::new(level).find_path(position, goal);
            self.repath_in = REPATH_INTERVAL_SECONDS;
        }
        while self
            .path
            .first()
            .is_some_and(|waypoint| waypoint.distance(position) <= WAYPOINT_REACHED_DISTANCE)
        {
            self.path.remove(0);
        }
        let waypoint = self.path.first().copied().unwrap_or(goal);
        (waypoint - position).normalize_or(Vec2::ZERO)
    }
}

fn nearest_hostile(store: &EntityStore, origin: Vec2) -> Option<(EntityId, Vec2)> {
    store
        .query(&[
            ComponentKind::Faction,
            ComponentKind::Health,
            ComponentKind::Transform,
        ])
        .into_iter()
        .filter(|id| {
            matches!(
                store.get::<Faction>(*id),
                Some(Faction::Enemy | Faction::Boss)
            ) && store.get::<Health>(*id).is_some_and(Health::is_alive)
        })
        .filter_map(|id| Some((id, store.get::<Transform>(id)?.position)))
        .min_by(|(_, a), (_, b)| a.distance(origin).total_cmp(&b.distance(origin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim::{BalanceConfig, SimulationConfig};

    fn simulation() -> Simulation {
        Simulation::new(SimulationConfig::default(), BalanceConfig::default(), None)
    }

    #[test]
    fn idles_without_hostiles() {
        let mut sim = simulation();
        sim.spawn_player(Vec2::new(100.0, 100.0));
        let intent = Autopilot::default().next_intent(&sim);
        assert_eq!(intent, PlayerIntent::default());
    }

    #[test]
    fn walks_toward_distant_enemy() {
        let mut sim = simulation();
        sim.spawn_player(Vec2::new(100.0, 100.0));
        sim.spawn_enemy("goblin", Vec2::new(400.0, 100.0));
        let intent = Autopilot::default().next_intent(&sim);
        assert!(intent.movement.x > 0.99);
        assert!(intent.attack.is_none());
    }

    #[test]
    fn swings_at_enemy_in_reach() {
        let mut sim = simulation();
        sim.spawn_player(Vec2::new(100.0, 100.0));
        sim.spawn_enemy("goblin", Vec2::new(140.0, 100.0));
        let intent = Autopilot::default().next_intent(&sim);
        let attack = intent.attack.expect("attack");
        assert_eq!(attack.aim_point, Some(Vec2::new(140.0, 100.0)));
        assert!(intent.dodge.is_none());
    }

    #[test]
    fn rolls_away_when_crowded() {
        let mut sim = simulation();
        sim.spawn_player(Vec2::new(100.0, 100.0));
        sim.spawn_enemy("goblin", Vec2::new(120.0, 100.0));
        let intent = Autopilot::default().next_intent(&sim);
        assert!(intent.dodge.is_some());
        assert!(intent.movement.x < -0.99);
    }
}
