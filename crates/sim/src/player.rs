//! Player intent resolution: buffered attacks, dodge rolls, potions, weapon
//! switching and smoothed movement.

use tracing::{debug, warn};

use crate::combat::{Combat, WeaponAttackOutcome};
use crate::config::PlayerTuning;
use crate::ecs::{ComponentKind, EntityId, Faction, Health, Transform, Weapon, WeaponKind};
use crate::hitbox::{collider_rect, HitboxManager};
use crate::inventory::{Inventory, ItemKind, WeaponItem};
use crate::math::{per_tick_velocity, Vec2, TIME_EPSILON};
use crate::perks::PerkBonuses;
use crate::status::{StatusEffects, StatusKind};
use crate::weapons::equip_weapon;

const DEFAULT_DODGE_DIRECTION: Vec2 = Vec2 { x: 0.0, y: -1.0 };
const MIN_DODGE_VELOCITY: f32 = 0.1;
pub const BATTLE_CRY_RADIUS: f32 = 120.0;

/// Countdown that is ready at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cooldown {
    duration: f32,
    remaining: f32,
}

impl Cooldown {
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            remaining: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn is_ready(&self) -> bool {
        self.remaining <= TIME_EPSILON
    }

    /// Starts the cooldown if it is ready.
    pub fn trigger(&mut self) -> bool {
        self.trigger_for(self.duration)
    }

    pub fn trigger_for(&mut self, duration: f32) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.remaining = duration.max(0.0);
        true
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// 0 right after triggering, 1 when ready.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (1.0 - self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackTrigger {
    pub timestamp: f64,
    pub aim_point: Option<Vec2>,
}

/// Input already resolved by the device layer for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerIntent {
    pub movement: Vec2,
    pub attack: Option<AttackTrigger>,
    pub dodge: Option<f64>,
    pub weapon_switch: i32,
    pub consumable_slot: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputReport {
    pub attack: Option<WeaponAttackOutcome>,
    pub dodged: bool,
    pub healed: u32,
    pub switched_to: Option<WeaponKind>,
    pub battle_cry_targets: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct DodgeRoll {
    direction: Vec2,
    speed: f32,
    remaining: f32,
    touched: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub struct PlayerController {
    tuning: PlayerTuning,
    dodge_cooldown: Cooldown,
    potion_cooldown: Cooldown,
    battle_cry_cooldown: Cooldown,
    buffered_attack: Option<AttackTrigger>,
    smoothed_input: Vec2,
    dodge: Option<DodgeRoll>,
}

impl PlayerController {
    pub fn new(tuning: PlayerTuning) -> Self {
        Self {
            tuning,
            dodge_cooldown: Cooldown::new(tuning.dodge_cooldown),
            potion_cooldown: Cooldown::new(tuning.potion_cooldown),
            battle_cry_cooldown: Cooldown::default(),
            buffered_attack: None,
            smoothed_input: Vec2::ZERO,
            dodge: None,
        }
    }

    pub fn is_dodging(&self) -> bool {
        self.dodge.is_some()
    }

    pub fn dodge_cooldown(&self) -> &Cooldown {
        &self.dodge_cooldown
    }

    pub fn potion_cooldown(&self) -> &Cooldown {
        &self.potion_cooldown
    }

    pub fn has_buffered_attack(&self) -> bool {
        self.buffered_attack.is_some()
    }

    /// Applies one tick of intent to `player` and sets its velocity.
    pub fn resolve(
        &mut self,
        combat: &mut Combat<'_>,
        hitboxes: &mut HitboxManager,
        player: EntityId,
        intent: &PlayerIntent,
        now: f64,
        dt: f32,
    ) -> InputReport {
        let mut report = InputReport::default();
        self.dodge_cooldown.update(dt);
        self.potion_cooldown.update(dt);
        self.battle_cry_cooldown.update(dt);

        let alive = combat
            .store
            .get::<Health>(player)
            .is_some_and(Health::is_alive);
        if !alive {
            self.buffered_attack = None;
            if let Some(transform) = combat.store.get_mut::<Transform>(player) {
                transform.velocity = Vec2::ZERO;
            }
            return report;
        }

        if intent.weapon_switch != 0 {
            report.switched_to = self.switch_weapon(combat, player, intent.weapon_switch);
        }
        if let Some(slot) = intent.consumable_slot {
            report.healed = self.use_potion(combat, player, slot);
        }
        if intent.dodge.is_some() {
            report.dodged = self.try_dodge(combat, player);
        }
        if let Some(trigger) = intent.attack {
            self.buffered_attack = Some(trigger);
        }
        report.attack = self.consume_buffered_attack(combat, hitboxes, player, now);

        self.apply_movement(combat, player, intent.movement, dt);
        report.battle_cry_targets = self.try_battle_cry(combat, player);
        report
    }

    fn consume_buffered_attack(
        &mut self,
        combat: &mut Combat<'_>,
        hitboxes: &mut HitboxManager,
        player: EntityId,
        now: f64,
    ) -> Option<WeaponAttackOutcome> {
        let trigger = self.buffered_attack?;
        if now - trigger.timestamp > f64::from(self.tuning.attack_buffer) {
            debug!(entity_id = player.0, "attack_buffer_expired");
            self.buffered_attack = None;
            return None;
        }
        let ready = combat
            .store
            .get::<Weapon>(player)
            .is_some_and(|weapon| weapon.can_attack(now));
        if !ready {
            return None;
        }
        self.buffered_attack = None;
        Some(combat.perform_weapon_attack(hitboxes, player, now, trigger.aim_point))
    }

    fn switch_weapon(
        &mut self,
        combat: &mut Combat<'_>,
        player: EntityId,
        step: i32,
    ) -> Option<WeaponKind> {
        let current = combat.store.get::<Weapon>(player)?.kind;
        let next = current.cycled(step);
        let item = match combat.store.get_mut::<Inventory>(player) {
            Some(inventory) => match inventory.slot_of_weapon(next) {
                Some(slot) if inventory.switch_weapon_slot(slot) => inventory
                    .active_weapon()
                    .unwrap_or_else(|| WeaponItem::common(next)),
                _ => WeaponItem::common(next),
            },
            None => WeaponItem::common(next),
        };
        if !equip_weapon(combat.store, player, item) {
            return None;
        }
        debug!(entity_id = player.0, weapon = next.key(), "weapon_switched");
        Some(next)
    }

    fn use_potion(&mut self, combat: &mut Combat<'_>, player: EntityId, slot: usize) -> u32 {
        if !self.potion_cooldown.is_ready() {
            return 0;
        }
        let Some(inventory) = combat.store.get_mut::<Inventory>(player) else {
            return 0;
        };
        let heal = match inventory.consumable(slot) {
            Some(stack) if stack.item.kind == ItemKind::Potion && stack.item.heal_amount > 0 => {
                stack.item.heal_amount
            }
            Some(_) => return 0,
            None => {
                warn!(entity_id = player.0, slot, "consumable_slot_empty_or_invalid");
                return 0;
            }
        };
        if inventory.use_consumable(slot).is_none() {
            return 0;
        }
        self.potion_cooldown.trigger();
        combat.heal(player, heal)
    }

    fn try_dodge(&mut self, combat: &mut Combat<'_>, player: EntityId) -> bool {
        if self.dodge.is_some() || !self.dodge_cooldown.is_ready() {
            return false;
        }
        let Some(velocity) = combat.store.get::<Transform>(player).map(|t| t.velocity) else {
            return false;
        };
        let bonuses = combat
            .store
            .get::<PerkBonuses>(player)
            .cloned()
            .unwrap_or_default();

        let direction = if velocity.x.abs() < MIN_DODGE_VELOCITY
            && velocity.y.abs() < MIN_DODGE_VELOCITY
        {
            DEFAULT_DODGE_DIRECTION
        } else {
            velocity.normalize_or(DEFAULT_DODGE_DIRECTION)
        };
        let duration = self.tuning.dodge_duration;
        self.dodge = Some(DodgeRoll {
            direction,
            speed: self.tuning.dodge_speed * bonuses.dash_distance_multiplier,
            remaining: duration,
            touched: Vec::new(),
        });
        self.dodge_cooldown
            .trigger_for(self.tuning.dodge_cooldown * bonuses.dash_cooldown_multiplier);
        if let Some(statuses) = combat.store.get_mut::<StatusEffects>(player) {
            statuses.add(StatusKind::Invulnerable, duration, 0.0);
        }
        true
    }

    fn apply_movement(
        &mut self,
        combat: &mut Combat<'_>,
        player: EntityId,
        movement: Vec2,
        dt: f32,
    ) {
        if let Some(mut roll) = self.dodge.take() {
            if let Some(transform) = combat.store.get_mut::<Transform>(player) {
                transform.velocity = per_tick_velocity(roll.direction, roll.speed);
            }
            self.apply_dash_damage(combat, player, &mut roll);
            roll.remaining -= dt;
            if roll.remaining > TIME_EPSILON {
                self.dodge = Some(roll);
            }
            return;
        }

        let target = if movement.length_squared() > 1.0 {
            movement.normalize_or(Vec2::ZERO)
        } else {
            movement
        };
        self.smoothed_input = self
            .smoothed_input
            .lerp(target, self.tuning.input_smoothing);

        let status_multiplier = combat
            .store
            .get::<StatusEffects>(player)
            .map(StatusEffects::speed_multiplier)
            .unwrap_or(1.0);
        let perk_bonus = combat
            .store
            .get::<PerkBonuses>(player)
            .map(|bonuses| bonuses.move_speed_bonus)
            .unwrap_or(0.0);
        let speed = self.tuning.move_speed * status_multiplier * (1.0 + perk_bonus);
        if let Some(transform) = combat.store.get_mut::<Transform>(player) {
            transform.velocity = per_tick_velocity(self.smoothed_input, speed);
        }
    }

    fn apply_dash_damage(&self, combat: &mut Combat<'_>, player: EntityId, roll: &mut DodgeRoll) {
        let damage = combat
            .store
            .get::<PerkBonuses>(player)
            .map(|bonuses| bonuses.dash_damage)
            .unwrap_or(0);
        if damage == 0 {
            return;
        }
        let Some(player_rect) = collider_rect(combat.store, player) else {
            return;
        };
        for target in hostiles_of(combat, player) {
            if roll.touched.contains(&target) {
                continue;
            }
            let touching =
                collider_rect(combat.store, target).is_some_and(|rect| rect.intersects(&player_rect));
            if touching {
                roll.touched.push(target);
                combat.apply_damage(target, damage, Some(player), false);
            }
        }
    }

    fn try_battle_cry(&mut self, combat: &mut Combat<'_>, player: EntityId) -> usize {
        let Some(cry) = combat
            .store
            .get::<PerkBonuses>(player)
            .and_then(|bonuses| bonuses.battle_cry)
        else {
            return 0;
        };
        if !self.battle_cry_cooldown.is_ready() {
            return 0;
        }
        let Some(origin) = combat.store.get::<Transform>(player).map(|t| t.position) else {
            return 0;
        };

        let radius_squared = BATTLE_CRY_RADIUS * BATTLE_CRY_RADIUS;
        let targets: Vec<EntityId> = hostiles_of(combat, player)
            .into_iter()
            .filter(|target| {
                combat
                    .store
                    .get::<Transform>(*target)
                    .is_some_and(|t| t.position.distance_squared(origin) <= radius_squared)
            })
            .collect();
        if targets.is_empty() {
            return 0;
        }
        for target in &targets {
            if let Some(statuses) = combat.store.get_mut::<StatusEffects>(*target) {
                statuses.add(StatusKind::Stun, cry.stun_duration, 0.0);
            }
        }
        self.battle_cry_cooldown.trigger_for(cry.cooldown);
        debug!(entity_id = player.0, targets = targets.len(), "battle_cry");
        targets.len()
    }
}

fn hostiles_of(combat: &Combat<'_>, player: EntityId) -> Vec<EntityId> {
    let faction = combat
        .store
        .get::<Faction>(player)
        .copied()
        .unwrap_or(Faction::Player);
    combat
        .store
        .query(&[
            ComponentKind::Transform,
            ComponentKind::Health,
            ComponentKind::Faction,
        ])
        .into_iter()
        .filter(|id| {
            *id != player
                && combat
                    .store
                    .get::<Faction>(*id)
                    .is_some_and(|other| faction.is_hostile_to(*other))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Collider, EntityStore};
    use crate::events::EventQueue;
    use crate::inventory::Item;
    use crate::perks::BattleCry;
    use crate::rng::SimRng;

    const DT: f32 = 1.0 / 60.0;

    struct Fixture {
        store: EntityStore,
        events: EventQueue,
        rng: SimRng,
        hitboxes: HitboxManager,
        player: EntityId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = EntityStore::new();
            let player = store.create();
            store.add(player, Transform::at(Vec2::new(100.0, 100.0)));
            store.add(player, Health::new(100));
            store.add(player, Faction::Player);
            store.add(player, Collider::centered(28.0, 28.0));
            store.add(player, StatusEffects::default());
            store.add(player, PerkBonuses::default());
            let mut inventory = Inventory::default();
            for (slot, kind) in WeaponKind::ALL.into_iter().enumerate() {
                inventory.set_weapon(slot, Some(WeaponItem::common(kind)));
            }
            inventory.set_consumable(0, Item::healing_potion(50), 3);
            store.add(player, inventory);
            equip_weapon(&mut store, player, WeaponItem::common(WeaponKind::Sword));
            Self {
                store,
                events: EventQueue::default(),
                rng: SimRng::seeded(11),
                hitboxes: HitboxManager::default(),
                player,
            }
        }

        fn resolve(
            &mut self,
            controller: &mut PlayerController,
            intent: &PlayerIntent,
            now: f64,
        ) -> InputReport {
            let mut combat = Combat {
                store: &mut self.store,
                events: &mut self.events,
                rng: &mut self.rng,
                rules: Default::default(),
            };
            controller.resolve(&mut combat, &mut self.hitboxes, self.player, intent, now, DT)
        }

        fn velocity(&self) -> Vec2 {
            self.store
                .get::<Transform>(self.player)
                .map(|t| t.velocity)
                .unwrap_or_default()
        }
    }

    #[test]
    fn cooldown_progress_and_readiness() {
        let mut cooldown = Cooldown::new(1.0);
        assert!(cooldown.trigger());
        assert!(!cooldown.trigger());
        assert_eq!(cooldown.progress(), 0.0);
        cooldown.update(0.5);
        assert!((cooldown.progress() - 0.5).abs() < 1e-6);
        cooldown.update(0.6);
        assert!(cooldown.is_ready());
        assert_eq!(cooldown.remaining(), 0.0);
    }

    #[test]
    fn movement_is_smoothed_and_diagonals_normalised() {
        let mut fixture = Fixture::new();
        let mut controller = PlayerController::new(PlayerTuning::default());
        let intent = PlayerIntent {
            movement: Vec2::new(1.0, 1.0),
            ..Default::default()
        };
        fixture.resolve(&mut controller, &intent, 0.0);
        let first = fixture.velocity();
        let expected = 0.2 * std::f32::consts::FRAC_1_SQRT_2 * 140.0 / 60.0;
        assert!((first.x - expected).abs() < 1e-4);

        for tick in 1..120 {
            fixture.resolve(&mut controller, &intent, f64::from(tick) / 60.0);
        }
        let settled = fixture.velocity();
        assert!((settled.length() - 140.0 / 60.0).abs() < 1e-3);
    }

    #[test]
    fn dodge_grants_invulnerability_and_respects_cooldown() {
        let mut fixture = Fixture::new();
        let mut controller = PlayerController::new(PlayerTuning::default());
        let dodge = PlayerIntent {
            dodge: Some(0.0),
            ..Default::default()
        };
        let report = fixture.resolve(&mut controller, &dodge, 0.0);
        assert!(report.dodged);
        assert!(controller.is_dodging());
        assert!(fixture
            .store
            .get::<StatusEffects>(fixture.player)
            .is_some_and(StatusEffects::is_invulnerable));
        assert!((fixture.velocity().y + 300.0 / 60.0).abs() < 1e-4);

        for tick in 1..12 {
            fixture.resolve(&mut controller, &PlayerIntent::default(), f64::from(tick) / 60.0);
        }
        assert!(!controller.is_dodging());
        let again = fixture.resolve(&mut controller, &dodge, 12.0 / 60.0);
        assert!(!again.dodged);
    }

    #[test]
    fn buffered_attack_fires_once_weapon_is_ready() {
        let mut fixture = Fixture::new();
        let mut controller = PlayerController::new(PlayerTuning::default());
        let attack = PlayerIntent {
            attack: Some(AttackTrigger {
                timestamp: 0.0,
                aim_point: Some(Vec2::new(150.0, 100.0)),
            }),
            ..Default::default()
        };
        let first = fixture.resolve(&mut controller, &attack, 0.0);
        assert!(matches!(first.attack, Some(WeaponAttackOutcome::Swung { .. })));

        let buffered = PlayerIntent {
            attack: Some(AttackTrigger {
                timestamp: 0.3,
                aim_point: None,
            }),
            ..Default::default()
        };
        let early = fixture.resolve(&mut controller, &buffered, 0.3);
        assert_eq!(early.attack, None);
        assert!(controller.has_buffered_attack());

        let late = fixture.resolve(&mut controller, &PlayerIntent::default(), 0.5);
        assert!(matches!(late.attack, Some(WeaponAttackOutcome::Swung { .. })));
        assert!(!controller.has_buffered_attack());
    }

    #[test]
    fn stale_buffered_attack_is_dropped() {
        let mut fixture = Fixture::new();
        let mut controller = PlayerController::new(PlayerTuning::default());
        if let Some(weapon) = fixture.store.get_mut::<Weapon>(fixture.player) {
            weapon.last_attack_time = Some(0.0);
        }
        let attack = PlayerIntent {
            attack: Some(AttackTrigger {
                timestamp: 0.0,
                aim_point: None,
            }),
            ..Default::default()
        };
        fixture.resolve(&mut controller, &attack, 0.0);
        let report = fixture.resolve(&mut controller, &PlayerIntent::default(), 0.4);
        assert_eq!(report.attack, None);
        assert!(!controller.has_buffered_attack());
    }

    #[test]
    fn potion_heals_and_starts_cooldown() {
        let mut fixture = Fixture::new();
        if let Some(health) = fixture.store.get_mut::<Health>(fixture.player) {
            health.take_damage(70);
        }
        let mut controller = PlayerController::new(PlayerTuning::default());
        let drink = PlayerIntent {
            consumable_slot: Some(0),
            ..Default::default()
        };
        assert_eq!(fixture.resolve(&mut controller, &drink, 0.0).healed, 50);
        assert_eq!(fixture.resolve(&mut controller, &drink, 0.1).healed, 0);
        let stack = fixture
            .store
            .get::<Inventory>(fixture.player)
            .and_then(|inventory| inventory.consumable(0).cloned());
        assert_eq!(stack.map(|stack| stack.count), Some(2));

        let invalid = PlayerIntent {
            consumable_slot: Some(9),
            ..Default::default()
        };
        let mut fresh = PlayerController::new(PlayerTuning::default());
        assert_eq!(fixture.resolve(&mut fresh, &invalid, 0.2).healed, 0);
    }

    #[test]
    fn weapon_switch_cycles_and_syncs_slot() {
        let mut fixture = Fixture::new();
        let mut controller = PlayerController::new(PlayerTuning::default());
        let next = PlayerIntent {
            weapon_switch: 1,
            ..Default::default()
        };
        let report = fixture.resolve(&mut controller, &next, 0.0);
        assert_eq!(report.switched_to, Some(WeaponKind::Spear));
        assert_eq!(
            fixture.store.get::<Weapon>(fixture.player).map(|w| w.kind),
            Some(WeaponKind::Spear)
        );
        assert_eq!(
            fixture
                .store
                .get::<Inventory>(fixture.player)
                .map(|inventory| inventory.active_weapon_slot),
            Some(1)
        );

        let back = PlayerIntent {
            weapon_switch: -2,
            ..Default::default()
        };
        let report = fixture.resolve(&mut controller, &back, 0.1);
        assert_eq!(report.switched_to, Some(WeaponKind::Crossbow));
    }

    #[test]
    fn battle_cry_stuns_nearby_hostiles() {
        let mut fixture = Fixture::new();
        if let Some(bonuses) = fixture.store.get_mut::<PerkBonuses>(fixture.player) {
            bonuses.battle_cry = Some(BattleCry {
                stun_duration: 1.0,
                cooldown: 10.0,
            });
        }
        let near = fixture.store.create();
        fixture.store.add(near, Transform::at(Vec2::new(150.0, 100.0)));
        fixture.store.add(near, Health::new(30));
        fixture.store.add(near, Faction::Enemy);
        fixture.store.add(near, StatusEffects::default());
        let far = fixture.store.create();
        fixture.store.add(far, Transform::at(Vec2::new(400.0, 100.0)));
        fixture.store.add(far, Health::new(30));
        fixture.store.add(far, Faction::Enemy);
        fixture.store.add(far, StatusEffects::default());

        let mut controller = PlayerController::new(PlayerTuning::default());
        let report = fixture.resolve(&mut controller, &PlayerIntent::default(), 0.0);
        assert_eq!(report.battle_cry_targets, 1);
        assert!(fixture
            .store
            .get::<StatusEffects>(near)
            .is_some_and(|statuses| statuses.has(StatusKind::Stun)));
        assert!(fixture
            .store
            .get::<StatusEffects>(far)
            .is_some_and(|statuses| !statuses.has(StatusKind::Stun)));

        let again = fixture.resolve(&mut controller, &PlayerIntent::default(), 0.1);
        assert_eq!(again.battle_cry_targets, 0);
    }
}
