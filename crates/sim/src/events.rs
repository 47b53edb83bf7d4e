use std::collections::VecDeque;

use crate::ecs::{EntityId, Faction, WeaponKind};
use crate::inventory::Item;
use crate::math::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    DamageTaken {
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
        is_crit: bool,
        weapon: Option<WeaponKind>,
        position: Vec2,
    },
    Healed {
        target: EntityId,
        amount: u32,
    },
    XpGained {
        entity: EntityId,
        amount: u32,
    },
    LevelUp {
        entity: EntityId,
        level: u32,
    },
    ItemPickedUp {
        entity: EntityId,
        item: Item,
    },
    ItemDropped {
        position: Vec2,
        item: Item,
    },
    EnemyKilled {
        entity: EntityId,
        killer: Option<EntityId>,
        faction: Faction,
        enemy_type: Option<String>,
        position: Vec2,
    },
    PlayerDied {
        entity: EntityId,
    },
    BossFightStarted {
        boss: EntityId,
    },
    BossPhaseChanged {
        boss: EntityId,
        phase: u8,
    },
    PerkUnlocked {
        entity: EntityId,
        perk_id: String,
    },
    Victory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEventKind {
    DamageTaken,
    Healed,
    XpGained,
    LevelUp,
    ItemPickedUp,
    ItemDropped,
    EnemyKilled,
    PlayerDied,
    BossFightStarted,
    BossPhaseChanged,
    PerkUnlocked,
    Victory,
}

impl GameEventKind {
    /// Kinds that decide the run or finish an entity's death. The event drain
    /// handles these even after it hits its per-tick limit.
    pub fn is_run_critical(self) -> bool {
        matches!(self, Self::EnemyKilled | Self::PlayerDied | Self::Victory)
    }
}

impl GameEvent {
    pub fn kind(&self) -> GameEventKind {
        match self {
            Self::DamageTaken { .. } => GameEventKind::DamageTaken,
            Self::Healed { .. } => GameEventKind::Healed,
            Self::XpGained { .. } => GameEventKind::XpGained,
            Self::LevelUp { .. } => GameEventKind::LevelUp,
            Self::ItemPickedUp { .. } => GameEventKind::ItemPickedUp,
            Self::ItemDropped { .. } => GameEventKind::ItemDropped,
            Self::EnemyKilled { .. } => GameEventKind::EnemyKilled,
            Self::PlayerDied { .. } => GameEventKind::PlayerDied,
            Self::BossFightStarted { .. } => GameEventKind::BossFightStarted,
            Self::BossPhaseChanged { .. } => GameEventKind::BossPhaseChanged,
            Self::PerkUnlocked { .. } => GameEventKind::PerkUnlocked,
            Self::Victory => GameEventKind::Victory,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameEventCounts {
    pub total: u32,
    pub damage_taken: u32,
    pub healed: u32,
    pub enemy_killed: u32,
    pub player_died: u32,
    pub level_up: u32,
    pub items: u32,
    pub boss: u32,
}

impl GameEventCounts {
    fn record(&mut self, kind: GameEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            GameEventKind::DamageTaken => self.damage_taken = self.damage_taken.saturating_add(1),
            GameEventKind::Healed => self.healed = self.healed.saturating_add(1),
            GameEventKind::EnemyKilled => self.enemy_killed = self.enemy_killed.saturating_add(1),
            GameEventKind::PlayerDied => self.player_died = self.player_died.saturating_add(1),
            GameEventKind::LevelUp => self.level_up = self.level_up.saturating_add(1),
            GameEventKind::ItemPickedUp | GameEventKind::ItemDropped => {
                self.items = self.items.saturating_add(1)
            }
            GameEventKind::BossFightStarted
            | GameEventKind::BossPhaseChanged
            | GameEventKind::Victory => self.boss = self.boss.saturating_add(1),
            GameEventKind::XpGained | GameEventKind::PerkUnlocked => {}
        }
    }
}

/// Single in-tick FIFO. Everything emitted during a tick is consumed from the
/// front before the tick ends; consumed events are kept as the tick's log.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<GameEvent>,
    drained: Vec<GameEvent>,
    last_tick_events: Vec<GameEvent>,
    last_tick_counts: GameEventCounts,
}

impl EventQueue {
    pub fn emit(&mut self, event: GameEvent) {
        self.pending.push_back(event);
    }

    pub fn pop_front(&mut self) -> Option<GameEvent> {
        let event = self.pending.pop_front()?;
        self.drained.push(event.clone());
        Some(event)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn iter_pending(&self) -> impl Iterator<Item = &GameEvent> {
        self.pending.iter()
    }

    /// Removes pending events whose kind fails `keep` without logging them.
    /// Returns the removed kinds in queue order.
    pub fn discard_pending(&mut self, keep: impl Fn(GameEventKind) -> bool) -> Vec<GameEventKind> {
        let mut discarded = Vec::new();
        self.pending.retain(|event| {
            let kind = event.kind();
            let kept = keep(kind);
            if !kept {
                discarded.push(kind);
            }
            kept
        });
        discarded
    }

    /// Drops anything still pending and publishes the drained log as the last tick's events.
    pub fn finish_tick(&mut self) {
        self.pending.clear();
        let mut counts = GameEventCounts::default();
        for event in &self.drained {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.last_tick_events = std::mem::take(&mut self.drained);
    }

    pub fn last_tick_events(&self) -> &[GameEvent] {
        &self.last_tick_events
    }

    pub fn last_tick_counts(&self) -> GameEventCounts {
        self.last_tick_counts
    }
}
