//! Boss fight lifecycle: arena gates, intro, phase switch and telegraphed
//! attacks chosen by a fixed priority list.

use tracing::{debug, info};

use crate::combat::Combat;
use crate::config::{BalanceConfig, EnemyConfig};
use crate::ecs::{
    Ai, AiState, BossAttackKind, Damage, Enemy, EntityId, EntityStore, Health, PendingTelegraph,
    Transform,
};
use crate::events::{EventQueue, GameEvent};
use crate::hitbox::collider_rect;
use crate::math::{per_tick_velocity, Rect, Vec2, TIME_EPSILON};
use crate::spawn::spawn_enemy;
use crate::status::StatusEffects;
use crate::telegraph::TelegraphBoard;

pub const ARENA_GATE_WIDTH: f32 = 80.0;
pub const ARENA_GATE_DEPTH: f32 = 40.0;
pub const ARENA_GATE_CLOSE_TIME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossGate {
    pub rect: Rect,
    pub closed: bool,
    pub close_progress: f32,
}

impl BossGate {
    fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            rect: Rect {
                x,
                y,
                width,
                height,
            },
            closed: false,
            close_progress: 0.0,
        }
    }

    fn update(&mut self, dt: f32) {
        if self.closed && self.close_progress < 1.0 {
            self.close_progress = (self.close_progress + dt / ARENA_GATE_CLOSE_TIME).min(1.0);
        }
    }

    pub fn is_fully_closed(&self) -> bool {
        self.closed && self.close_progress + TIME_EPSILON >= 1.0
    }
}

/// Rectangle around the fight with one gate centred on each edge.
#[derive(Debug, Clone, PartialEq)]
pub struct BossArena {
    pub center: Vec2,
    pub width: f32,
    pub height: f32,
    pub gates: [BossGate; 4],
    pub active: bool,
}

impl BossArena {
    pub fn new(center: Vec2, width: f32, height: f32) -> Self {
        let (half_w, half_h) = (width * 0.5, height * 0.5);
        let gates = [
            BossGate::new(
                center.x - ARENA_GATE_WIDTH * 0.5,
                center.y - half_h,
                ARENA_GATE_WIDTH,
                ARENA_GATE_DEPTH,
            ),
            BossGate::new(
                center.x - ARENA_GATE_WIDTH * 0.5,
                center.y + half_h - ARENA_GATE_DEPTH,
                ARENA_GATE_WIDTH,
                ARENA_GATE_DEPTH,
            ),
            BossGate::new(
                center.x - half_w,
                center.y - ARENA_GATE_DEPTH * 0.5,
                ARENA_GATE_DEPTH,
                ARENA_GATE_WIDTH,
            ),
            BossGate::new(
                center.x + half_w - ARENA_GATE_DEPTH,
                center.y - ARENA_GATE_DEPTH * 0.5,
                ARENA_GATE_DEPTH,
                ARENA_GATE_WIDTH,
            ),
        ];
        Self {
            center,
            width,
            height,
            gates,
            active: false,
        }
    }

    pub fn close_gates(&mut self) {
        for gate in &mut self.gates {
            gate.closed = true;
        }
        self.active = true;
    }

    pub fn open_gates(&mut self) {
        for gate in &mut self.gates {
            gate.closed = false;
            gate.close_progress = 0.0;
        }
        self.active = false;
    }

    pub fn update(&mut self, dt: f32) {
        for gate in &mut self.gates {
            gate.update(dt);
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.gates.iter().all(BossGate::is_fully_closed)
    }
}

fn attack_index(kind: BossAttackKind) -> usize {
    match kind {
        BossAttackKind::Dash => 0,
        BossAttackKind::Slam => 1,
        BossAttackKind::Summon => 2,
    }
}

#[derive(Debug, Clone, Default)]
struct BossDash {
    remaining: f32,
    landed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BossDirector {
    boss: Option<EntityId>,
    boss_type: String,
    arena: Option<BossArena>,
    intro_remaining: f32,
    phase_two: bool,
    since_attack: [f32; 3],
    dash: Option<BossDash>,
}

impl BossDirector {
    pub fn boss(&self) -> Option<EntityId> {
        self.boss
    }

    pub fn arena(&self) -> Option<&BossArena> {
        self.arena.as_ref()
    }

    pub fn is_intro_active(&self) -> bool {
        self.boss.is_some() && self.intro_remaining > TIME_EPSILON
    }

    pub fn phase(&self) -> u8 {
        if self.phase_two {
            2
        } else {
            1
        }
    }

    /// Seals the arena around `arena_center` and starts the intro. Returns
    /// `false` when `boss` is not a living boss-type enemy.
    pub fn start_boss_fight(
        &mut self,
        store: &EntityStore,
        events: &mut EventQueue,
        balance: &BalanceConfig,
        boss: EntityId,
        arena_center: Vec2,
    ) -> bool {
        let Some(enemy) = store.get::<Enemy>(boss) else {
            return false;
        };
        if !store.get::<Health>(boss).is_some_and(Health::is_alive) {
            return false;
        }
        let config = balance.enemy(&enemy.type_key);

        let mut arena = BossArena::new(arena_center, config.arena.width, config.arena.height);
        arena.close_gates();
        *self = Self {
            boss: Some(boss),
            boss_type: enemy.type_key.clone(),
            arena: Some(arena),
            intro_remaining: config.intro.duration,
            phase_two: false,
            since_attack: [0.0; 3],
            dash: None,
        };
        info!(boss_id = boss.0, boss_type = %self.boss_type, "boss_fight_started");
        events.emit(GameEvent::BossFightStarted { boss });
        true
    }

    pub fn update(
        &mut self,
        combat: &mut Combat<'_>,
        telegraphs: &mut TelegraphBoard,
        balance: &BalanceConfig,
        player: Option<EntityId>,
        dt: f32,
    ) {
        let Some(boss) = self.boss else {
            return;
        };
        if let Some(arena) = self.arena.as_mut() {
            arena.update(dt);
        }
        let Some((hp, max_hp)) = combat
            .store
            .get::<Health>(boss)
            .map(|health| (health.hp(), health.max_hp()))
        else {
            self.finish();
            return;
        };
        if hp == 0 {
            set_velocity(combat.store, boss, Vec2::ZERO);
            return;
        }
        let config = balance.enemy(&self.boss_type);

        if self.intro_remaining > TIME_EPSILON {
            self.intro_remaining -= dt;
            set_velocity(combat.store, boss, Vec2::ZERO);
            return;
        }

        if !self.phase_two && hp as f32 <= max_hp as f32 * config.phase_2_threshold {
            self.phase_two = true;
            info!(boss_id = boss.0, hp, "boss_phase_two");
            combat.events.emit(GameEvent::BossPhaseChanged { boss, phase: 2 });
        }
        for timer in &mut self.since_attack {
            *timer += dt;
        }

        let target = player.and_then(|player| {
            let alive = combat
                .store
                .get::<Health>(player)
                .is_some_and(Health::is_alive);
            let position = combat.store.get::<Transform>(player)?.position;
            alive.then_some((player, position))
        });

        if let Some(mut dash) = self.dash.take() {
            if let Some((player, _)) = target {
                if !dash.landed && touches(combat.store, boss, player) {
                    dash.landed = true;
                    let amount = combat
                        .store
                        .get::<Damage>(boss)
                        .map(|damage| damage.amount_for(false))
                        .unwrap_or(0);
                    combat.apply_damage(player, amount, Some(boss), false);
                }
            }
            dash.remaining -= dt;
            if dash.remaining > TIME_EPSILON {
                self.dash = Some(dash);
            } else {
                set_velocity(combat.store, boss, Vec2::ZERO);
            }
            return;
        }

        let pending = combat.store.get::<Ai>(boss).and_then(|ai| ai.telegraph);
        if let Some(mut pending) = pending {
            pending.remaining -= dt;
            let expired = pending.remaining <= TIME_EPSILON;
            if let Some(ai) = combat.store.get_mut::<Ai>(boss) {
                ai.telegraph = (!expired).then_some(pending);
            }
            if expired {
                self.execute(combat, balance, config, boss, pending, target);
            }
            return;
        }

        let Some((_, player_position)) = target else {
            set_velocity(combat.store, boss, Vec2::ZERO);
            return;
        };
        let Some(position) = combat.store.get::<Transform>(boss).map(|t| t.position) else {
            return;
        };

        if let Some(kind) = self.next_attack(config) {
            self.start_telegraph(combat.store, telegraphs, config, boss, kind, position, player_position);
            return;
        }

        let velocity = if position.distance(player_position) > config.attack_range {
            let phase_multiplier = if self.phase_two {
                config.phase_2_speed_multiplier
            } else {
                1.0
            };
            let status_multiplier = combat
                .store
                .get::<StatusEffects>(boss)
                .map(StatusEffects::speed_multiplier)
                .unwrap_or(1.0);
            per_tick_velocity(
                (player_position - position).normalize_or(Vec2::ZERO),
                config.speed * phase_multiplier * status_multiplier,
            )
        } else {
            Vec2::ZERO
        };
        if let Some(ai) = combat.store.get_mut::<Ai>(boss) {
            ai.set_state(if velocity == Vec2::ZERO {
                AiState::Idle
            } else {
                AiState::Chase
            });
        }
        set_velocity(combat.store, boss, velocity);
    }

    /// First attack in priority order whose cooldown has elapsed. Slam and
    /// summon unlock in phase two, which also shortens every cooldown.
    fn next_attack(&self, config: &EnemyConfig) -> Option<BossAttackKind> {
        let divisor = if self.phase_two {
            config.phase_2_speed_multiplier
        } else {
            1.0
        };
        BossAttackKind::PRIORITY.into_iter().find(|kind| {
            let cooldown = match kind {
                BossAttackKind::Dash => config.attacks.dash.cooldown,
                BossAttackKind::Slam if self.phase_two => config.attacks.slam.cooldown,
                BossAttackKind::Summon if self.phase_two => config.attacks.summon.cooldown,
                BossAttackKind::Slam | BossAttackKind::Summon => return false,
            };
            self.since_attack[attack_index(*kind)] + TIME_EPSILON >= cooldown / divisor
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn start_telegraph(
        &mut self,
        store: &mut EntityStore,
        telegraphs: &mut TelegraphBoard,
        config: &EnemyConfig,
        boss: EntityId,
        kind: BossAttackKind,
        position: Vec2,
        player_position: Vec2,
    ) {
        let duration = match kind {
            BossAttackKind::Dash => {
                let duration = config.attacks.dash.telegraph_duration;
                telegraphs.add_dash(position, player_position, duration);
                duration
            }
            BossAttackKind::Slam => {
                let duration = config.attacks.slam.telegraph_duration;
                let direction = (player_position - position).normalize_or(Vec2::new(0.0, 1.0));
                telegraphs.add_slam(position, direction, duration);
                duration
            }
            BossAttackKind::Summon => {
                let duration = config.attacks.summon.telegraph_duration;
                telegraphs.add_summon(position, duration);
                duration
            }
        };
        if let Some(ai) = store.get_mut::<Ai>(boss) {
            ai.set_state(AiState::Attack);
            ai.telegraph = Some(PendingTelegraph {
                kind,
                duration,
                remaining: duration,
                anchor: player_position,
            });
        }
        set_velocity(store, boss, Vec2::ZERO);
        debug!(boss_id = boss.0, attack = ?kind, duration, "boss_telegraph");
    }

    fn execute(
        &mut self,
        combat: &mut Combat<'_>,
        balance: &BalanceConfig,
        config: &EnemyConfig,
        boss: EntityId,
        pending: PendingTelegraph,
        target: Option<(EntityId, Vec2)>,
    ) {
        self.since_attack[attack_index(pending.kind)] = 0.0;
        let Some(position) = combat.store.get::<Transform>(boss).map(|t| t.position) else {
            return;
        };
        debug!(boss_id = boss.0, attack = ?pending.kind, "boss_attack");

        match pending.kind {
            BossAttackKind::Dash => {
                let tuning = config.attacks.dash;
                let direction = (pending.anchor - position).normalize_or(Vec2::ZERO);
                set_velocity(
                    combat.store,
                    boss,
                    per_tick_velocity(direction, tuning.dash_speed),
                );
                self.dash = Some(BossDash {
                    remaining: tuning.dash_duration,
                    landed: false,
                });
            }
            BossAttackKind::Slam => {
                let tuning = config.attacks.slam;
                let (damage, range) = if self.phase_two {
                    (
                        (tuning.damage as f32 * tuning.phase_2_damage_multiplier).floor() as u32,
                        tuning.range * tuning.phase_2_range_multiplier,
                    )
                } else {
                    (tuning.damage, tuning.range)
                };
                if let Some((player, player_position)) = target {
                    if position.distance(player_position) <= range {
                        combat.apply_damage(player, damage, Some(boss), false);
                    }
                }
            }
            BossAttackKind::Summon => {
                let tuning = &config.attacks.summon;
                let mut summoned = 0u32;
                for _ in 0..tuning.waves {
                    for _ in 0..tuning.enemies_per_wave {
                        let angle = combat.rng.range_f32(0.0, std::f32::consts::TAU);
                        let spawn_at = position + Vec2::from_angle(angle).scale(tuning.spawn_radius);
                        spawn_enemy(combat.store, balance, &tuning.enemy_type, spawn_at);
                        summoned += 1;
                    }
                }
                info!(boss_id = boss.0, summoned, "boss_summoned");
            }
        }
    }

    /// Consumes the boss death: opens the gates, removes the boss entity and
    /// emits Victory. Returns `false` for any other entity.
    pub fn on_boss_killed(
        &mut self,
        store: &mut EntityStore,
        events: &mut EventQueue,
        telegraphs: &mut TelegraphBoard,
        entity: EntityId,
    ) -> bool {
        if self.boss != Some(entity) {
            return false;
        }
        store.remove(entity);
        telegraphs.clear();
        self.finish();
        info!(boss_id = entity.0, "boss_defeated");
        events.emit(GameEvent::Victory);
        true
    }

    fn finish(&mut self) {
        if let Some(arena) = self.arena.as_mut() {
            arena.open_gates();
        }
        self.boss = None;
        self.dash = None;
    }
}

fn touches(store: &EntityStore, a: EntityId, b: EntityId) -> bool {
    match (collider_rect(store, a), collider_rect(store, b)) {
        (Some(first), Some(second)) => first.intersects(&second),
        _ => false,
    }
}

fn set_velocity(store: &mut EntityStore, id: EntityId, velocity: Vec2) {
    if let Some(transform) = store.get_mut::<Transform>(id) {
        transform.velocity = velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatRules;
    use crate::config::PlayerTuning;
    use crate::ecs::{ComponentKind, Faction};
    use crate::events::GameEventKind;
    use crate::rng::SimRng;
    use crate::spawn::spawn_player;

    const DT: f32 = 1.0 / 60.0;

    struct Fixture {
        store: EntityStore,
        events: EventQueue,
        rng: SimRng,
        telegraphs: TelegraphBoard,
        balance: BalanceConfig,
        director: BossDirector,
        player: EntityId,
        boss: EntityId,
    }

    impl Fixture {
        fn new(player_at: Vec2) -> Self {
            let mut store = EntityStore::new();
            let balance = BalanceConfig::default();
            let player = spawn_player(&mut store, player_at, &PlayerTuning::default());
            let boss = spawn_enemy(&mut store, &balance, "goblin_chief", Vec2::new(400.0, 300.0));
            let mut events = EventQueue::default();
            let mut director = BossDirector::default();
            assert!(director.start_boss_fight(
                &store,
                &mut events,
                &balance,
                boss,
                Vec2::new(400.0, 300.0)
            ));
            Self {
                store,
                events,
                rng: SimRng::seeded(21),
                telegraphs: TelegraphBoard::default(),
                balance,
                director,
                player,
                boss,
            }
        }

        fn tick(&mut self) {
            let mut combat = Combat {
                store: &mut self.store,
                events: &mut self.events,
                rng: &mut self.rng,
                rules: CombatRules::default(),
            };
            self.telegraphs.update(DT);
            self.director
                .update(&mut combat, &mut self.telegraphs, &self.balance, Some(self.player), DT);
        }

        fn run(&mut self, seconds: f32) {
            let ticks = (seconds * 60.0).round() as u32;
            for _ in 0..ticks {
                self.tick();
            }
        }

        fn pending(&self) -> Option<PendingTelegraph> {
            self.store.get::<Ai>(self.boss).and_then(|ai| ai.telegraph)
        }

        fn set_boss_hp(&mut self, hp: u32) {
            if let Some(health) = self.store.get_mut::<Health>(self.boss) {
                let max = health.max_hp();
                *health = Health::with_hp(max, hp);
            }
        }

        fn drain_kinds(&mut self) -> Vec<GameEventKind> {
            let mut kinds = Vec::new();
            while let Some(event) = self.events.pop_front() {
                kinds.push(event.kind());
            }
            kinds
        }
    }

    #[test]
    fn fight_start_seals_arena_over_one_second() {
        let mut fixture = Fixture::new(Vec2::new(700.0, 300.0));
        assert_eq!(fixture.drain_kinds(), vec![GameEventKind::BossFightStarted]);
        let arena = fixture.director.arena().cloned().expect("arena");
        assert_eq!(arena.gates[0].rect.width, 80.0);
        assert_eq!(arena.gates[2].rect.height, 80.0);
        assert!(!arena.is_sealed());

        fixture.run(1.0);
        assert!(fixture.director.arena().is_some_and(BossArena::is_sealed));
    }

    #[test]
    fn boss_holds_still_during_intro() {
        let mut fixture = Fixture::new(Vec2::new(700.0, 300.0));
        fixture.run(1.0);
        assert!(fixture.director.is_intro_active());
        assert_eq!(
            fixture.store.get::<Transform>(fixture.boss).map(|t| t.velocity),
            Some(Vec2::ZERO)
        );
        assert!(fixture.telegraphs.active().is_empty());
    }

    #[test]
    fn phase_one_only_dashes_after_cooldown() {
        let mut fixture = Fixture::new(Vec2::new(700.0, 300.0));
        fixture.run(2.0 + 3.9);
        assert!(fixture.pending().is_none());

        fixture.run(0.2);
        let pending = fixture.pending().expect("dash telegraph");
        assert_eq!(pending.kind, BossAttackKind::Dash);
        assert_eq!(fixture.telegraphs.active().len(), 1);
    }

    #[test]
    fn telegraph_then_dash_execution() {
        let mut fixture = Fixture::new(Vec2::new(700.0, 300.0));
        fixture.run(2.0 + 4.05);
        assert!(fixture.pending().is_some());
        fixture.run(0.5);
        assert!(fixture.pending().is_none());
        let velocity = fixture
            .store
            .get::<Transform>(fixture.boss)
            .map(|t| t.velocity)
            .unwrap_or_default();
        assert!((velocity.x - 400.0 / 60.0).abs() < 1e-3);
    }

    #[test]
    fn phase_two_emits_once_and_unlocks_slam() {
        let mut fixture = Fixture::new(Vec2::new(450.0, 300.0));
        fixture.run(2.0);
        fixture.drain_kinds();
        fixture.set_boss_hp(100);
        fixture.tick();
        fixture.tick();
        let kinds = fixture.drain_kinds();
        assert_eq!(
            kinds.iter().filter(|kind| **kind == GameEventKind::BossPhaseChanged).count(),
            1
        );
        assert_eq!(fixture.director.phase(), 2);

        // Cooldowns shrink by 1.5x: slam is ready after 2 s, dash after 2.67 s.
        fixture.run(2.0);
        assert_eq!(fixture.pending().map(|p| p.kind), Some(BossAttackKind::Slam));
        fixture.run(1.5);
        let hp = fixture.store.get::<Health>(fixture.player).map(Health::hp);
        assert_eq!(hp, Some(100 - 30));
    }

    #[test]
    fn ready_attacks_resolve_in_dash_slam_summon_order() {
        let mut fixture = Fixture::new(Vec2::new(450.0, 300.0));
        fixture.run(2.0);
        fixture.set_boss_hp(100);
        fixture.director.since_attack = [10.0, 10.0, 10.0];
        fixture.tick();
        assert_eq!(fixture.director.phase(), 2);
        assert_eq!(fixture.pending().map(|p| p.kind), Some(BossAttackKind::Dash));
        assert_eq!(fixture.telegraphs.active().len(), 1);
    }

    #[test]
    fn pending_telegraph_blocks_a_second_choice() {
        let mut fixture = Fixture::new(Vec2::new(450.0, 300.0));
        fixture.run(2.0);
        fixture.set_boss_hp(100);
        fixture.director.since_attack = [10.0, 10.0, 10.0];
        fixture.tick();
        let first = fixture.pending().expect("dash telegraph");

        let mut ticks = 0;
        while fixture.pending().is_some() {
            let slam = attack_index(BossAttackKind::Slam);
            let summon = attack_index(BossAttackKind::Summon);
            fixture.director.since_attack[slam] = 10.0;
            fixture.director.since_attack[summon] = 10.0;
            fixture.tick();
            ticks += 1;
            assert!(ticks < 600, "telegraph never resolved");
            if let Some(pending) = fixture.pending() {
                assert_eq!(pending.kind, first.kind);
                assert!(pending.remaining < first.remaining);
                assert!(fixture.telegraphs.active().len() <= 1);
            }
        }
        assert!(fixture.director.since_attack[attack_index(BossAttackKind::Dash)] < DT);
    }

    #[test]
    fn summon_spawns_waves_around_boss() {
        let mut fixture = Fixture::new(Vec2::new(450.0, 300.0));
        fixture.run(2.0);
        fixture.set_boss_hp(100);
        fixture.director.since_attack = [0.0, 0.0, 10.0];
        fixture.tick();
        assert_eq!(fixture.pending().map(|p| p.kind), Some(BossAttackKind::Summon));
        fixture.run(1.0);
        let goblins = fixture
            .store
            .query(&[ComponentKind::Enemy])
            .into_iter()
            .filter(|id| fixture.store.get::<Faction>(*id) == Some(&Faction::Enemy))
            .count();
        assert_eq!(goblins, 6);
    }

    #[test]
    fn boss_death_opens_gates_and_signals_victory() {
        let mut fixture = Fixture::new(Vec2::new(700.0, 300.0));
        fixture.drain_kinds();
        let handled = fixture.director.on_boss_killed(
            &mut fixture.store,
            &mut fixture.events,
            &mut fixture.telegraphs,
            fixture.boss,
        );
        assert!(handled);
        assert!(!fixture.store.contains(fixture.boss));
        assert!(fixture.director.boss().is_none());
        assert!(fixture.director.arena().is_some_and(|arena| !arena.active));
        assert_eq!(fixture.drain_kinds(), vec![GameEventKind::Victory]);
    }
}
