//! Deterministic combat and AI core of a top-down action roguelike. The
//! crate has no rendering, audio or input handling; a driver feeds resolved
//! intents into [`Simulation::tick`] and reads [`RenderView`] back.

pub mod ai;
pub mod combat;
pub mod config;
pub mod ecs;
pub mod effects;
pub mod events;
pub mod hitbox;
pub mod inventory;
pub mod level;
pub mod loop_runner;
pub mod loot;
pub mod math;
pub mod pathfinding;
pub mod perks;
pub mod player;
pub mod progression;
pub mod projectile;
pub mod puddle;
pub mod rng;
pub mod sim;
pub mod spawn;
pub mod stats;
pub mod status;
pub mod telegraph;
pub mod weapons;

pub use config::{BalanceConfig, ConfigError, EnemyConfig, PlayerTuning, SimulationConfig};
pub use ecs::{EntityId, EntityStore};
pub use events::{GameEvent, GameEventKind};
pub use level::{LevelGrid, LevelGridError, RoomRect, TileCoord, TileKind};
pub use loop_runner::{FixedStepClock, FramePlan, LoopConfig};
pub use math::Vec2;
pub use player::{AttackTrigger, PlayerIntent};
pub use progression::{ProgressionError, ProgressionSnapshot};
pub use sim::{RenderView, Renderable, RunOutcome, Simulation, SystemId, SYSTEM_ORDER};
pub use stats::RunStats;
