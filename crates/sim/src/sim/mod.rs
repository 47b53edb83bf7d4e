//! Simulation context. Owns the entity store, event queue, RNG and every
//! subsystem, and advances them in a fixed order once per tick.

mod view;


pub use view::{RenderView, Renderable};

use tracing::{debug, info, warn};

use crate::ai::{split_slime, update_enemies, BossDirector, EnemyWorld};
use crate::combat::Combat;
use crate::config::{BalanceConfig, SimulationConfig};
use crate::ecs::{
    Ai, Collider, ComponentKind, EntityId, EntityStore, Faction, Health, Projectile, QueryBuffers,
    Transform,
};
use crate::effects::HitEffects;
use crate::events::{EventQueue, GameEvent, GameEventKind};
use crate::hitbox::HitboxManager;
use crate::inventory::{Experience, SkillTree};
use crate::level::LevelGrid;
use crate::loot::{auto_pickup, drop_enemy_loot, random_item, spawn_loot};
use crate::math::{Vec2, REFERENCE_TICK_RATE};
use crate::perks::{apply_perk, roll_perks, PerkDefinition, DEFAULT_PERK_OFFER};
use crate::player::{InputReport, PlayerController, PlayerIntent};
use crate::progression::{ProgressionError, ProgressionSnapshot};
use crate::projectile::update_projectiles;
use crate::puddle::PuddleField;
use crate::rng::SimRng;
use crate::spawn::{spawn_enemy, spawn_player};
use crate::stats::RunStats;
use crate::status::{StatusEffects, StatusPulse};
use crate::telegraph::TelegraphBoard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemId {
    InputResolution,
    Movement,
    AttackFrames,
    StatusEffects,
    Ai,
    Hazards,
    WallCollision,
    AutoPickup,
    Camera,
    EventDrain,
}

impl SystemId {
    pub fn name(self) -> &'static str {
        match self {
            Self::InputResolution => "InputResolution",
            Self::Movement => "Movement",
            Self::AttackFrames => "AttackFrames",
            Self::StatusEffects => "StatusEffects",
            Self::Ai => "Ai",
            Self::Hazards => "Hazards",
            Self::WallCollision => "WallCollision",
            Self::AutoPickup => "AutoPickup",
            Self::Camera => "Camera",
            Self::EventDrain => "EventDrain",
        }
    }
}

pub const SYSTEM_ORDER: [SystemId; 10] = [
    SystemId::InputResolution,
    SystemId::Movement,
    SystemId::AttackFrames,
    SystemId::StatusEffects,
    SystemId::Ai,
    SystemId::Hazards,
    SystemId::WallCollision,
    SystemId::AutoPickup,
    SystemId::Camera,
    SystemId::EventDrain,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunOutcome {
    #[default]
    InProgress,
    Victory,
    Defeat,
}

pub struct Simulation {
    config: SimulationConfig,
    balance: BalanceConfig,
    level: Option<LevelGrid>,
    store: EntityStore,
    events: EventQueue,
    rng: SimRng,
    hitboxes: HitboxManager,
    telegraphs: TelegraphBoard,
    puddles: PuddleField,
    effects: HitEffects,
    boss: BossDirector,
    controller: PlayerController,
    stats: RunStats,
    player: Option<EntityId>,
    camera_focus: Vec2,
    time: f64,
    tick_count: u64,
    perk_offer: Vec<&'static PerkDefinition>,
    outcome: RunOutcome,
    last_tick_order: Vec<SystemId>,
    last_input: InputReport,
    moved_from: Vec<(EntityId, Vec2)>,
    buffers: QueryBuffers,
}

impl Simulation {
    pub fn new(config: SimulationConfig, balance: BalanceConfig, level: Option<LevelGrid>) -> Self {
        info!(
            seed = config.rng_seed,
            enemy_types = balance.enemy_types().count(),
            has_level = level.is_some(),
            "simulation_created"
        );
        Self {
            rng: SimRng::seeded(config.rng_seed),
            controller: PlayerController::new(config.player),
            config,
            balance,
            level,
            store: EntityStore::new(),
            events: EventQueue::default(),
            hitboxes: HitboxManager::default(),
            telegraphs: TelegraphBoard::default(),
            puddles: PuddleField::default(),
            effects: HitEffects::default(),
            boss: BossDirector::default(),
            stats: RunStats::default(),
            player: None,
            camera_focus: Vec2::ZERO,
            time: 0.0,
            tick_count: 0,
            perk_offer: Vec::new(),
            outcome: RunOutcome::InProgress,
            last_tick_order: Vec::with_capacity(SYSTEM_ORDER.len()),
            last_input: InputReport::default(),
            moved_from: Vec::new(),
            buffers: QueryBuffers::default(),
        }
    }

    /// Spawns the controlled player. An existing player entity is replaced.
    pub fn spawn_player(&mut self, position: Vec2) -> EntityId {
        if let Some(previous) = self.player.take() {
            warn!(entity_id = previous.0, "player_replaced");
            self.store.remove(previous);
            self.hitboxes.clear_owner(previous);
        }
        let player = spawn_player(&mut self.store, position, &self.config.player);
        self.player = Some(player);
        self.controller = PlayerController::new(self.config.player);
        self.camera_focus = position;
        player
    }

    pub fn spawn_enemy(&mut self, enemy_type: &str, position: Vec2) -> EntityId {
        spawn_enemy(&mut self.store, &self.balance, enemy_type, position)
    }

    /// Seals an arena around `arena_center` and starts the fight with `boss`.
    pub fn start_boss_fight(&mut self, boss: EntityId, arena_center: Vec2) -> bool {
        self.boss
            .start_boss_fight(&self.store, &mut self.events, &self.balance, boss, arena_center)
    }

    /// Runs one fixed step. Every event emitted during the step is drained
    /// before it returns.
    pub fn tick(&mut self, intent: &PlayerIntent) {
        let dt = self.config.fixed_dt_seconds;
        let now = self.time;

        self.last_tick_order.clear();
        for system_id in SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            self.run_system(system_id, intent, dt, now);
        }
        self.events.finish_tick();

        self.stats.advance(dt);
        self.time += f64::from(dt);
        self.tick_count = self.tick_count.saturating_add(1);
    }

    fn run_system(&mut self, system_id: SystemId, intent: &PlayerIntent, dt: f32, now: f64) {
        match system_id {
            SystemId::InputResolution => self.resolve_input(intent, now, dt),
            SystemId::Movement => self.integrate_movement(dt),
            SystemId::AttackFrames => self.update_attack_frames(dt),
            SystemId::StatusEffects => self.update_status_effects(dt),
            SystemId::Ai => self.update_ai(dt),
            SystemId::Hazards => self.update_hazards(dt),
            SystemId::WallCollision => self.correct_wall_collisions(),
            SystemId::AutoPickup => self.collect_loot(),
            SystemId::Camera => self.update_camera(dt),
            SystemId::EventDrain => self.drain_events(),
        }
    }

    fn resolve_input(&mut self, intent: &PlayerIntent, now: f64, dt: f32) {
        let Some(player) = self.player else {
            return;
        };
        let mut combat = Combat {
            store: &mut self.store,
            events: &mut self.events,
            rng: &mut self.rng,
            rules: self.config.combat_rules(),
        };
        self.last_input =
            self.controller
                .resolve(&mut combat, &mut self.hitboxes, player, intent, now, dt);
    }

    /// Velocities are per reference tick, so a 1/60 s step moves by exactly
    /// one velocity.
    fn integrate_movement(&mut self, dt: f32) {
        let scale = dt * REFERENCE_TICK_RATE;
        self.moved_from.clear();
        self.store
            .query_into(&[ComponentKind::Transform], &mut self.buffers.subjects);
        for &id in &self.buffers.subjects {
            let Some(transform) = self.store.get_mut::<Transform>(id) else {
                continue;
            };
            if transform.velocity == Vec2::ZERO {
                continue;
            }
            self.moved_from.push((id, transform.position));
            transform.position = transform.position + transform.velocity.scale(scale);
        }
    }

    fn update_attack_frames(&mut self, dt: f32) {
        let mut combat = Combat {
            store: &mut self.store,
            events: &mut self.events,
            rng: &mut self.rng,
            rules: self.config.combat_rules(),
        };
        combat.resolve_hitbox_hits(&mut self.hitboxes);
        self.hitboxes.advance_frame();
        update_projectiles(&mut combat, &mut self.buffers, dt, self.level.as_ref());
    }

    fn update_status_effects(&mut self, dt: f32) {
        let mut combat = Combat {
            store: &mut self.store,
            events: &mut self.events,
            rng: &mut self.rng,
            rules: self.config.combat_rules(),
        };
        for id in combat.store.query(&[ComponentKind::StatusEffects]) {
            let Some(pulses) = combat
                .store
                .get_mut::<StatusEffects>(id)
                .map(|statuses| statuses.tick(dt))
            else {
                continue;
            };
            for pulse in pulses {
                match pulse {
                    StatusPulse::Damage { amount, .. } => {
                        combat.apply_damage(id, amount, None, false);
                    }
                    StatusPulse::Heal { amount } => {
                        combat.heal(id, amount);
                    }
                }
            }
        }
    }

    fn update_ai(&mut self, dt: f32) {
        let mut combat = Combat {
            store: &mut self.store,
            events: &mut self.events,
            rng: &mut self.rng,
            rules: self.config.combat_rules(),
        };
        let world = EnemyWorld {
            balance: &self.balance,
            level: self.level.as_ref(),
            player: self.player,
        };
        update_enemies(&mut combat, &mut self.puddles, &world, &mut self.buffers, dt);
    }

    fn update_hazards(&mut self, dt: f32) {
        self.puddles.update(dt, &mut self.store);
        self.telegraphs.update(dt);
        self.engage_boss_in_range();

        let mut combat = Combat {
            store: &mut self.store,
            events: &mut self.events,
            rng: &mut self.rng,
            rules: self.config.combat_rules(),
        };
        self.boss
            .update(&mut combat, &mut self.telegraphs, &self.balance, self.player, dt);
    }

    /// A living boss starts its fight once the player walks into its agro
    /// radius. The arena is centred on the boss.
    fn engage_boss_in_range(&mut self) {
        if self.boss.boss().is_some() {
            return;
        }
        let Some(player_position) = self.living_player_position() else {
            return;
        };
        let store = &self.store;
        let engaged = store
            .query(&[ComponentKind::Ai, ComponentKind::Transform, ComponentKind::Faction])
            .into_iter()
            .find_map(|id| {
                if store.get::<Faction>(id) != Some(&Faction::Boss)
                    || !store.get::<Health>(id).is_some_and(Health::is_alive)
                {
                    return None;
                }
                let position = store.get::<Transform>(id)?.position;
                let agro_radius = store.get::<Ai>(id)?.agro_radius;
                (position.distance(player_position) <= agro_radius).then_some((id, position))
            });
        if let Some((boss, arena_center)) = engaged {
            self.start_boss_fight(boss, arena_center);
        }
    }

    /// Reverts the blocked axis of any move that pushed a collider into a
    /// wall or a closed arena gate. Colliders already overlapping an obstacle
    /// may move out of it.
    fn correct_wall_collisions(&mut self) {
        let moved = std::mem::take(&mut self.moved_from);
        for &(id, previous) in &moved {
            if self.store.has::<Projectile>(id) {
                continue;
            }
            let Some(collider) = self.store.get::<Collider>(id).copied() else {
                continue;
            };
            let Some(transform) = self.store.get::<Transform>(id).copied() else {
                continue;
            };
            let current = transform.position;
            if !self.is_blocked(&collider, previous, current) {
                continue;
            }

            let slide_x = Vec2::new(current.x, previous.y);
            let slide_y = Vec2::new(previous.x, current.y);
            let (position, velocity) = if !self.is_blocked(&collider, previous, slide_x) {
                (slide_x, Vec2::new(transform.velocity.x, 0.0))
            } else if !self.is_blocked(&collider, previous, slide_y) {
                (slide_y, Vec2::new(0.0, transform.velocity.y))
            } else {
                (previous, Vec2::ZERO)
            };
            debug!(entity_id = id.0, "wall_collision_corrected");
            if let Some(transform) = self.store.get_mut::<Transform>(id) {
                transform.position = position;
                transform.velocity = velocity;
            }
        }
        self.moved_from = moved;
    }

    fn is_blocked(&self, collider: &Collider, from: Vec2, to: Vec2) -> bool {
        let origin = collider.rect(&Transform::at(from));
        let target = collider.rect(&Transform::at(to));
        if let Some(level) = &self.level {
            if !level.rect_is_clear(&target) && level.rect_is_clear(&origin) {
                return true;
            }
        }
        self.boss.arena().is_some_and(|arena| {
            arena.gates.iter().any(|gate| {
                gate.closed && gate.rect.intersects(&target) && !gate.rect.intersects(&origin)
            })
        })
    }

    fn collect_loot(&mut self) {
        let Some(player) = self.player else {
            return;
        };
        if self.living_player_position().is_none() {
            return;
        }
        auto_pickup(
            &mut self.store,
            &mut self.events,
            player,
            self.config.pickup_range,
        );
    }

    fn update_camera(&mut self, dt: f32) {
        self.effects.update(dt, &mut self.rng);
        if let Some(position) = self
            .player
            .and_then(|player| self.store.get::<Transform>(player))
            .map(|transform| transform.position)
        {
            self.camera_focus = position;
        }
    }

    fn drain_events(&mut self) {
        let limit = self.config.max_events_per_tick.max(1);
        let mut handled = 0usize;
        let mut dropped = 0usize;
        let mut dropped_kinds: Vec<GameEventKind> = Vec::new();
        loop {
            // Past the limit only run-critical events are handled, including
            // the ones their handlers emit.
            if handled >= limit {
                for kind in self.events.discard_pending(GameEventKind::is_run_critical) {
                    dropped = dropped.saturating_add(1);
                    if !dropped_kinds.contains(&kind) {
                        dropped_kinds.push(kind);
                    }
                }
            }
            let Some(event) = self.events.pop_front() else {
                break;
            };
            self.handle_event(&event);
            handled = handled.saturating_add(1);
        }
        if dropped > 0 {
            warn!(handled, dropped, ?dropped_kinds, "event_drain_truncated");
        }
    }

    fn handle_event(&mut self, event: &GameEvent) {
        self.stats.record(event, self.player);
        match event {
            GameEvent::DamageTaken {
                amount,
                is_crit,
                position,
                ..
            } => {
                self.effects
                    .on_damage(*position, *amount, *is_crit, &mut self.rng);
            }
            GameEvent::EnemyKilled {
                entity,
                faction,
                enemy_type,
                position,
                ..
            } => self.on_enemy_killed(*entity, *faction, enemy_type.as_deref(), *position),
            GameEvent::LevelUp { entity, level } if Some(*entity) == self.player => {
                self.offer_perks(*level);
            }
            GameEvent::PlayerDied { entity } => {
                if self.outcome == RunOutcome::InProgress {
                    info!(entity_id = entity.0, elapsed = %self.stats.format_time(), "run_lost");
                    self.outcome = RunOutcome::Defeat;
                }
            }
            GameEvent::Victory => {
                if self.outcome == RunOutcome::InProgress {
                    info!(elapsed = %self.stats.format_time(), kills = self.stats.kills, "run_won");
                    self.outcome = RunOutcome::Victory;
                }
            }
            _ => {}
        }
    }

    fn on_enemy_killed(
        &mut self,
        entity: EntityId,
        faction: Faction,
        enemy_type: Option<&str>,
        position: Vec2,
    ) {
        self.hitboxes.clear_owner(entity);
        let level = enemy_type
            .map(|key| self.balance.enemy(key).level)
            .unwrap_or(1);

        if faction == Faction::Boss {
            if !self.boss.on_boss_killed(
                &mut self.store,
                &mut self.events,
                &mut self.telegraphs,
                entity,
            ) {
                self.store.remove(entity);
            }
            drop_enemy_loot(
                &mut self.store,
                &mut self.events,
                &mut self.rng,
                faction,
                level,
                position,
                1.0,
            );
            let bonus = random_item(&mut self.rng);
            spawn_loot(&mut self.store, position, bonus.clone());
            self.events.emit(GameEvent::ItemDropped {
                position,
                item: bonus,
            });
            return;
        }

        if let Some(enemy_type) = enemy_type {
            split_slime(
                &mut self.store,
                &mut self.rng,
                &self.balance,
                enemy_type,
                position,
            );
        }
        drop_enemy_loot(
            &mut self.store,
            &mut self.events,
            &mut self.rng,
            faction,
            level,
            position,
            self.config.loot_drop_chance,
        );
    }

    /// Opens a perk offer unless one is already waiting to be chosen.
    fn offer_perks(&mut self, level: u32) {
        let Some(player) = self.player else {
            return;
        };
        if !self.perk_offer.is_empty() {
            return;
        }
        let unlocked = self
            .store
            .get::<SkillTree>(player)
            .map(|tree| tree.unlocked.clone())
            .unwrap_or_default();
        self.perk_offer = roll_perks(&mut self.rng, DEFAULT_PERK_OFFER, &unlocked);
        info!(
            level,
            offered = self.perk_offer.len(),
            "perk_offer_opened"
        );
    }

    /// Applies perk `index` of the open offer and spends a skill point. The
    /// PerkUnlocked event is drained with the next tick.
    pub fn choose_perk(&mut self, index: usize) -> Option<&'static str> {
        let player = self.player?;
        let perk = *self.perk_offer.get(index)?;
        let points = self
            .store
            .get::<SkillTree>(player)
            .map(|tree| tree.available_points)
            .unwrap_or(0);
        if points == 0 {
            warn!(perk_id = perk.id, "perk_choice_without_points");
            return None;
        }
        if !apply_perk(&mut self.store, player, perk.id) {
            return None;
        }

        let remaining = match self.store.get_mut::<SkillTree>(player) {
            Some(tree) => {
                tree.available_points = tree.available_points.saturating_sub(1);
                tree.available_points
            }
            None => 0,
        };
        self.events.emit(GameEvent::PerkUnlocked {
            entity: player,
            perk_id: perk.id.to_string(),
        });
        self.perk_offer.clear();
        if remaining > 0 {
            let level = self
                .store
                .get::<Experience>(player)
                .map(|experience| experience.level)
                .unwrap_or(1);
            self.offer_perks(level);
        }
        Some(perk.id)
    }

    pub fn capture_progression(&self) -> Result<ProgressionSnapshot, ProgressionError> {
        let player = self.player.ok_or(ProgressionError::NoPlayer)?;
        ProgressionSnapshot::capture(&self.store, player)
    }

    pub fn apply_progression(
        &mut self,
        snapshot: &ProgressionSnapshot,
    ) -> Result<(), ProgressionError> {
        let player = self.player.ok_or(ProgressionError::NoPlayer)?;
        snapshot.apply(&mut self.store, player)?;
        info!(
            level = snapshot.level,
            perks = snapshot.unlocked_perks.len(),
            "progression_applied"
        );
        Ok(())
    }

    pub fn render_view(&self) -> RenderView<'_> {
        RenderView::build(
            &self.store,
            self.camera_focus,
            &self.effects,
            self.telegraphs.active(),
            self.puddles.puddles(),
            self.events.last_tick_events(),
        )
    }

    fn living_player_position(&self) -> Option<Vec2> {
        let player = self.player?;
        if !self.store.get::<Health>(player).is_some_and(Health::is_alive) {
            return None;
        }
        self.store.get::<Transform>(player).map(|transform| transform.position)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn balance(&self) -> &BalanceConfig {
        &self.balance
    }

    pub fn level(&self) -> Option<&LevelGrid> {
        self.level.as_ref()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    pub fn perk_offer(&self) -> &[&'static PerkDefinition] {
        &self.perk_offer
    }

    pub fn boss_director(&self) -> &BossDirector {
        &self.boss
    }

    pub fn controller(&self) -> &PlayerController {
        &self.controller
    }

    pub fn last_input(&self) -> &InputReport {
        &self.last_input
    }

    pub fn last_tick_order(&self) -> &[SystemId] {
        &self.last_tick_order
    }

    pub fn last_tick_events(&self) -> &[GameEvent] {
        self.events.last_tick_events()
    }
}
