mod components;
mod store;

pub use components::{
    Ai, AiState, BossAttackKind, Collider, Damage, Enemy, Faction, Health, Loot, PathState,
    PendingTelegraph, Projectile, ProjectileShape, Transform, Visual, Weapon, WeaponKind,
};
pub use store::{
    Component, ComponentColumn, ComponentKind, EntityId, EntityStore, QueryBuffers,
};
