// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Entity management
//!
//! Entities are elements of the world's entity pool. An [`Entity`] is the
//! pool handle for that element; the element itself is an [`EntityRecord`],
//! which maps each component type to the slot holding the entity's data.

use crate::ecs::ComponentId;
use crate::pool::{PoolId, SlotHandle};
use std::fmt;

/// Entity handle with generational index support for safe references
///
/// Copying an entity never allocates. A handle to a destroyed entity stays
/// stale even after its slot is reused by a new entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    slot: SlotHandle,
}

impl Entity {
    pub(crate) fn from_slot(slot: SlotHandle) -> Self {
        Entity { slot }
    }

    /// Get the underlying entity pool handle
    pub fn slot(&self) -> SlotHandle {
        self.slot
    }

    /// Get the index of the entity's slot
    pub fn index(&self) -> usize {
        self.slot.index()
    }

    /// Get the generation number
    pub fn generation(&self) -> u32 {
        self.slot.generation()
    }

    /// Identity of the entity pool (and therefore the world) that created this entity
    pub fn pool(&self) -> PoolId {
        self.slot.pool()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.index(), self.generation())
    }
}

/// Per-entity bookkeeping stored in the entity pool
///
/// The component table is the single source of truth for "does this entity
/// have component C": entry `C` is either unused (`None`) or the handle of the
/// entity's record in C's storage. Entries for component types registered after
/// the entity was created read as unused.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    components: Vec<Option<SlotHandle>>,
    marked_for_deletion: bool,
    being_destroyed: bool,
}

impl EntityRecord {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Slot of this entity's data in the storage for `id`, if attached
    pub fn component_slot(&self, id: ComponentId) -> Option<SlotHandle> {
        self.components.get(id.index()).copied().flatten()
    }

    /// Check if the component `id` is attached
    pub fn has_component(&self, id: ComponentId) -> bool {
        self.component_slot(id).is_some()
    }

    /// Ids of all attached components, in registration order
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| ComponentId::from_index(index))
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.components.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if the entity is waiting for deferred deletion
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    pub(crate) fn set_marked_for_deletion(&mut self, marked: bool) {
        self.marked_for_deletion = marked;
    }

    /// Check if the entity's components are being torn down
    ///
    /// Set from the start of [`World::destroy_entity`](crate::ecs::World::destroy_entity)
    /// until the entity is gone. No component can be attached meanwhile.
    pub fn is_being_destroyed(&self) -> bool {
        self.being_destroyed
    }

    pub(crate) fn set_being_destroyed(&mut self, destroying: bool) {
        self.being_destroyed = destroying;
    }

    pub(crate) fn set_component_slot(&mut self, id: ComponentId, slot: SlotHandle) {
        let index = id.index();
        if index >= self.components.len() {
            self.components.resize(index + 1, None);
        }
        self.components[index] = Some(slot);
    }

    /// Reset the entry for `id` to unused, but only if it still points at `slot`
    pub(crate) fn clear_component_slot(&mut self, id: ComponentId, slot: SlotHandle) -> bool {
        match self.components.get_mut(id.index()) {
            Some(entry) if *entry == Some(slot) => {
                *entry = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{AllocationLocation, SlotPool};

    #[test]
    fn test_entity_accessors() {
        let mut pool = SlotPool::new();
        let slot = pool.allocate((), AllocationLocation::Back).unwrap();
        let entity = Entity::from_slot(slot);

        assert_eq!(entity.index(), 0);
        assert_eq!(entity.generation(), 0);
        assert_eq!(entity.pool(), pool.id());
        assert_eq!(entity.to_string(), "Entity(0, gen: 0)");
    }

    #[test]
    fn test_entity_equality() {
        let mut pool = SlotPool::new();
        let first = pool.allocate((), AllocationLocation::Back).unwrap();
        pool.free(first);
        let second = pool.allocate((), AllocationLocation::Back).unwrap();

        let e1 = Entity::from_slot(first);
        let e2 = Entity::from_slot(first);
        let e3 = Entity::from_slot(second);
        assert_eq!(e1, e2);
        assert_eq!(e1.index(), e3.index());
        assert_ne!(e1, e3);
    }

    #[test]
    fn test_record_starts_unused() {
        let record = EntityRecord::new();
        assert_eq!(record.component_count(), 0);
        assert!(!record.has_component(ComponentId::new(0)));
        assert!(!record.has_component(ComponentId::new(29)));
        assert!(!record.is_marked_for_deletion());
        assert!(!record.is_being_destroyed());
    }

    #[test]
    fn test_record_component_table() {
        let mut pool = SlotPool::new();
        let slot = pool.allocate(1, AllocationLocation::Back).unwrap();
        let mut record = EntityRecord::new();

        record.set_component_slot(ComponentId::new(3), slot);
        assert_eq!(record.component_slot(ComponentId::new(3)), Some(slot));
        assert!(!record.has_component(ComponentId::new(2)));
        assert_eq!(
            record.component_ids().collect::<Vec<_>>(),
            vec![ComponentId::new(3)]
        );

        assert!(record.clear_component_slot(ComponentId::new(3), slot));
        assert!(!record.has_component(ComponentId::new(3)));
        assert!(!record.clear_component_slot(ComponentId::new(3), slot));
    }

    #[test]
    fn test_clear_ignores_mismatched_slot() {
        let mut pool = SlotPool::new();
        let old = pool.allocate(1, AllocationLocation::Back).unwrap();
        pool.free(old);
        let new = pool.allocate(2, AllocationLocation::Back).unwrap();

        let mut record = EntityRecord::new();
        record.set_component_slot(ComponentId::new(0), new);
        assert!(!record.clear_component_slot(ComponentId::new(0), old));
        assert_eq!(record.component_slot(ComponentId::new(0)), Some(new));
    }
}
