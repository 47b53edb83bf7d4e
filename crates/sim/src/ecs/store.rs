use serde::{Deserialize, Serialize};

use crate::inventory::{Experience, Inventory, SkillTree};
use crate::perks::PerkBonuses;
use crate::status::StatusEffects;

use super::components::{
    Ai, Collider, Damage, Enemy, Faction, Health, Loot, Projectile, Transform, Visual, Weapon,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    Health,
    Damage,
    Faction,
    Weapon,
    Collider,
    Ai,
    Projectile,
    Enemy,
    Loot,
    Inventory,
    Experience,
    SkillTree,
    StatusEffects,
    PerkBonuses,
    Visual,
}

/// Sparse per-kind storage indexed directly by entity id.
#[derive(Debug, Clone)]
pub struct ComponentColumn<T> {
    slots: Vec<Option<T>>,
    len: usize,
}

impl<T> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }
}

impl<T> ComponentColumn<T> {
    fn slot_index(id: EntityId) -> Option<usize> {
        usize::try_from(id.0).ok()
    }

    fn insert(&mut self, id: EntityId, value: T) -> Option<T> {
        let Some(index) = Self::slot_index(id) else {
            return None;
        };
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let previous = self.slots[index].replace(value);
        if previous.is_none() {
            self.len = self.len.saturating_add(1);
        }
        previous
    }

    fn remove(&mut self, id: EntityId) -> Option<T> {
        let index = Self::slot_index(id)?;
        let removed = self.slots.get_mut(index)?.take();
        if removed.is_some() {
            self.len = self.len.saturating_sub(1);
        }
        removed
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        let index = Self::slot_index(id)?;
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let index = Self::slot_index(id)?;
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Id buffers owned by the simulation and refilled by per-tick systems.
#[derive(Debug, Default)]
pub struct QueryBuffers {
    pub subjects: Vec<EntityId>,
    pub targets: Vec<EntityId>,
}

pub trait Component: Sized {
    const KIND: ComponentKind;

    fn column(store: &EntityStore) -> &ComponentColumn<Self>;
    fn column_mut(store: &mut EntityStore) -> &mut ComponentColumn<Self>;
}

macro_rules! impl_component {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;

            fn column(store: &EntityStore) -> &ComponentColumn<Self> {
                &store.$field
            }

            fn column_mut(store: &mut EntityStore) -> &mut ComponentColumn<Self> {
                &mut store.$field
            }
        }
    };
}

/// Owns every entity id and all component data.
///
/// Ids come from a monotonic counter and are never handed out twice. Every
/// operation on an unknown or removed id is a no-op that reports "not found".
/// Live ids are kept in a compact ascending list, so iteration and queries
/// never visit removed entities.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityIdAllocator,
    live: Vec<EntityId>,
    transforms: ComponentColumn<Transform>,
    healths: ComponentColumn<Health>,
    damages: ComponentColumn<Damage>,
    factions: ComponentColumn<Faction>,
    weapons: ComponentColumn<Weapon>,
    colliders: ComponentColumn<Collider>,
    ais: ComponentColumn<Ai>,
    projectiles: ComponentColumn<Projectile>,
    enemies: ComponentColumn<Enemy>,
    loots: ComponentColumn<Loot>,
    inventories: ComponentColumn<Inventory>,
    experiences: ComponentColumn<Experience>,
    skill_trees: ComponentColumn<SkillTree>,
    status_effects: ComponentColumn<StatusEffects>,
    perk_bonuses: ComponentColumn<PerkBonuses>,
    visuals: ComponentColumn<Visual>,
}

impl_component!(Transform, Transform, transforms);
impl_component!(Health, Health, healths);
impl_component!(Damage, Damage, damages);
impl_component!(Faction, Faction, factions);
impl_component!(Weapon, Weapon, weapons);
impl_component!(Collider, Collider, colliders);
impl_component!(Ai, Ai, ais);
impl_component!(Projectile, Projectile, projectiles);
impl_component!(Enemy, Enemy, enemies);
impl_component!(Loot, Loot, loots);
impl_component!(Inventory, Inventory, inventories);
impl_component!(Experience, Experience, experiences);
impl_component!(SkillTree, SkillTree, skill_trees);
impl_component!(StatusEffects, StatusEffects, status_effects);
impl_component!(PerkBonuses, PerkBonuses, perk_bonuses);
impl_component!(Visual, Visual, visuals);

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> EntityId {
        let id = self.allocator.allocate();
        // Monotonic ids keep the list sorted on push.
        self.live.push(id);
        id
    }

    /// Drops every component of `id`. Returns `false` when the id was not alive.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Ok(position) = self.live.binary_search(&id) else {
            return false;
        };
        self.live.remove(position);

        self.transforms.remove(id);
        self.healths.remove(id);
        self.damages.remove(id);
        self.factions.remove(id);
        self.weapons.remove(id);
        self.colliders.remove(id);
        self.ais.remove(id);
        self.projectiles.remove(id);
        self.enemies.remove(id);
        self.loots.remove(id);
        self.inventories.remove(id);
        self.experiences.remove(id);
        self.skill_trees.remove(id);
        self.status_effects.remove(id);
        self.perk_bonuses.remove(id);
        self.visuals.remove(id);
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.live.binary_search(&id).is_ok()
    }

    pub fn entity_count(&self) -> usize {
        self.live.len()
    }

    /// Attaches `component`, replacing any previous instance of the same kind.
    /// Returns `false` (and drops the component) when the id is not alive.
    pub fn add<T: Component>(&mut self, id: EntityId, component: T) -> bool {
        if !self.contains(id) {
            return false;
        }
        T::column_mut(self).insert(id, component);
        true
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        T::column(self).get(id)
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        T::column_mut(self).get_mut(id)
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        T::column(self).contains(id)
    }

    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Option<T> {
        T::column_mut(self).remove(id)
    }

    pub fn has_kind(&self, id: EntityId, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transforms.contains(id),
            ComponentKind::Health => self.healths.contains(id),
            ComponentKind::Damage => self.damages.contains(id),
            ComponentKind::Faction => self.factions.contains(id),
            ComponentKind::Weapon => self.weapons.contains(id),
            ComponentKind::Collider => self.colliders.contains(id),
            ComponentKind::Ai => self.ais.contains(id),
            ComponentKind::Projectile => self.projectiles.contains(id),
            ComponentKind::Enemy => self.enemies.contains(id),
            ComponentKind::Loot => self.loots.contains(id),
            ComponentKind::Inventory => self.inventories.contains(id),
            ComponentKind::Experience => self.experiences.contains(id),
            ComponentKind::SkillTree => self.skill_trees.contains(id),
            ComponentKind::StatusEffects => self.status_effects.contains(id),
            ComponentKind::PerkBonuses => self.perk_bonuses.contains(id),
            ComponentKind::Visual => self.visuals.contains(id),
        }
    }

    fn kind_len(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Transform => self.transforms.len(),
            ComponentKind::Health => self.healths.len(),
            ComponentKind::Damage => self.damages.len(),
            ComponentKind::Faction => self.factions.len(),
            ComponentKind::Weapon => self.weapons.len(),
            ComponentKind::Collider => self.colliders.len(),
            ComponentKind::Ai => self.ais.len(),
            ComponentKind::Projectile => self.projectiles.len(),
            ComponentKind::Enemy => self.enemies.len(),
            ComponentKind::Loot => self.loots.len(),
            ComponentKind::Inventory => self.inventories.len(),
            ComponentKind::Experience => self.experiences.len(),
            ComponentKind::SkillTree => self.skill_trees.len(),
            ComponentKind::StatusEffects => self.status_effects.len(),
            ComponentKind::PerkBonuses => self.perk_bonuses.len(),
            ComponentKind::Visual => self.visuals.len(),
        }
    }

    /// Live entity ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Ids of every live entity holding all of `kinds`, ascending.
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.query_into(kinds, &mut out);
        out
    }

    /// Same as [`EntityStore::query`], but refills `out` so per-tick systems
    /// can keep one buffer instead of allocating on every call.
    pub fn query_into(&self, kinds: &[ComponentKind], out: &mut Vec<EntityId>) {
        out.clear();
        if kinds.iter().any(|kind| self.kind_len(*kind) == 0) {
            return;
        }
        out.extend(
            self.live
                .iter()
                .copied()
                .filter(|id| kinds.iter().all(|kind| self.has_kind(*id, *kind))),
        );
    }

    pub fn column<T: Component>(&self) -> &ComponentColumn<T> {
        T::column(self)
    }
}
