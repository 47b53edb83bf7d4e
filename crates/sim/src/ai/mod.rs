//! Enemy and boss behaviour. Both run inside the Ai step of a tick and only
//! touch the world through `Combat`, so deaths they cause flow through the
//! event queue like any other hit.

pub mod boss;
pub mod enemy;

pub use boss::{BossArena, BossDirector, BossGate, ARENA_GATE_CLOSE_TIME};
pub use enemy::{split_slime, update_enemies, EnemyWorld, WAYPOINT_REACHED_DISTANCE};
