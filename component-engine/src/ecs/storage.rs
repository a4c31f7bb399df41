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
//! Per-type component storage
//!
//! [`ComponentStorage`] binds one [`Component`] type to a [`SlotPool`] of
//! records and to the entity component tables of a [`World`]. It turns
//! entity-shaped requests (attach, detach, lookup) into slot operations and
//! keeps the entity's table entry in step with the pool.
//!
//! The world only knows storages through the type-erased [`AnyStorage`]
//! interface, which is what lets it drive destruction, ticking and teardown
//! across component types it has no static knowledge of.

use crate::ecs::{Component, ComponentId, ComponentRecord, DeltaTime, Entity, World};
use crate::error::EcsError;
use crate::pool::{AllocationLocation, PoolConfig, SlotHandle, SlotPool};
use std::any::{type_name, Any};

/// Storage for every record of one component type
///
/// Data references handed out by the storage are not stable across
/// attachments: adding a record may grow the pool and move existing records.
/// Keep the [`Entity`] or the record's [`SlotHandle`] instead.
pub struct ComponentStorage<C: Component> {
    id: ComponentId,
    component: C,
    records: SlotPool<ComponentRecord<C::Data>>,
}

impl<C: Component> ComponentStorage<C> {
    pub(crate) fn new(id: ComponentId, component: C, config: PoolConfig) -> Self {
        ComponentStorage {
            id,
            component,
            records: SlotPool::with_config(config),
        }
    }

    /// Id of the component type stored here
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The component type's shared state
    pub fn component(&self) -> &C {
        &self.component
    }

    /// The component type's shared state, mutably
    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    /// The underlying record pool
    pub fn records(&self) -> &SlotPool<ComponentRecord<C::Data>> {
        &self.records
    }

    /// Number of attached records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no entity has this component
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Attach this component to `entity`, appending it to the iteration order
    ///
    /// See [`attach_at`](Self::attach_at).
    pub fn attach(&mut self, entity: Entity, world: &mut World) -> Result<&mut C::Data, EcsError> {
        self.attach_at(entity, AllocationLocation::Back, world)
    }

    /// Attach this component to `entity`
    ///
    /// If the entity already has the component, its existing data is returned
    /// unchanged and nothing is allocated. Otherwise a record is allocated at
    /// `location`, registered in the entity's component table, and passed to
    /// [`Component::initialize_entity`]. If that hook fails the record is
    /// released again and the error returned.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if `entity` is not alive in `world`
    /// - [`EcsError::EntityBeingDestroyed`] if `entity` is being destroyed
    /// - [`EcsError::Pool`] if the record pool is full
    /// - any error returned by `initialize_entity`
    pub fn attach_at(
        &mut self,
        entity: Entity,
        location: AllocationLocation,
        world: &mut World,
    ) -> Result<&mut C::Data, EcsError> {
        let id = self.id;
        let entity_record = world
            .entity_record(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        if entity_record.is_being_destroyed() {
            return Err(EcsError::EntityBeingDestroyed(entity));
        }
        let existing = entity_record.component_slot(id);

        if let Some(slot) = existing {
            if self.records.contains(slot) {
                return self
                    .records
                    .get_mut(slot)
                    .map(|record| &mut record.data)
                    .ok_or(EcsError::StaleEntity(entity));
            }
            log::warn!(
                "{entity} pointed at a released `{}` record; attaching a fresh one",
                type_name::<C>()
            );
        }

        let slot = self
            .records
            .allocate(ComponentRecord::new(entity, C::Data::default()), location)?;
        if let Some(entity_record) = world.entity_record_mut(entity) {
            entity_record.set_component_slot(id, slot);
        }
        log::trace!("attached `{}` to {entity} at {slot}", type_name::<C>());

        let Self {
            component, records, ..
        } = &mut *self;
        let initialized = match records.get_mut(slot) {
            Some(record) => component.initialize_entity(entity, &mut record.data, world),
            None => Ok(()),
        };
        if let Err(err) = initialized {
            records.free(slot);
            if let Some(entity_record) = world.entity_record_mut(entity) {
                entity_record.clear_component_slot(id, slot);
            }
            log::warn!(
                "rolled back `{}` on {entity}: initialization failed: {err}",
                type_name::<C>()
            );
            return Err(err);
        }

        self.records
            .get_mut(slot)
            .map(|record| &mut record.data)
            .ok_or(EcsError::StaleEntity(entity))
    }

    /// Detach this component from `entity`
    ///
    /// Runs [`Component::cleanup_entity`], releases the record and resets the
    /// entity's table entry. Returns `false` if the entity does not have the
    /// component.
    pub fn detach(&mut self, entity: Entity, world: &mut World) -> bool {
        let slot = match world
            .entity_record(entity)
            .and_then(|record| record.component_slot(self.id))
        {
            Some(slot) => slot,
            None => return false,
        };

        if !self.records.contains(slot) {
            if let Some(entity_record) = world.entity_record_mut(entity) {
                entity_record.clear_component_slot(self.id, slot);
            }
            return false;
        }

        self.release(slot, world);
        true
    }

    /// Detach the record at `cursor` and return the record after it
    ///
    /// Use this to remove records while walking the storage with
    /// [`first`](Self::first) and [`next`](Self::next): feeding the returned
    /// cursor back into the loop visits every remaining record exactly once.
    /// Returns `None` at the end of the storage or if `cursor` is stale.
    pub fn detach_at(&mut self, cursor: SlotHandle, world: &mut World) -> Option<SlotHandle> {
        if !self.records.contains(cursor) {
            return None;
        }
        self.release(cursor, world)
    }

    /// Detach every record, returning how many were removed
    ///
    /// Equivalent to calling [`detach_at`](Self::detach_at) on the first
    /// record until the storage is empty, so every record gets its cleanup hook.
    pub fn clear(&mut self, world: &mut World) -> usize {
        let mut removed = 0;
        while let Some(first) = self.records.first() {
            self.detach_at(first, world);
            removed += 1;
        }
        removed
    }

    /// Get the data attached to `entity`
    pub fn get(&self, entity: Entity, world: &World) -> Option<&C::Data> {
        let slot = world.entity_record(entity)?.component_slot(self.id)?;
        self.records
            .get(slot)
            .filter(|record| record.entity() == entity)
            .map(|record| &record.data)
    }

    /// Get the data attached to `entity`, mutably
    pub fn get_mut(&mut self, entity: Entity, world: &World) -> Option<&mut C::Data> {
        let slot = world.entity_record(entity)?.component_slot(self.id)?;
        self.records
            .get_mut(slot)
            .filter(|record| record.entity() == entity)
            .map(|record| &mut record.data)
    }

    /// Check if `entity` has this component
    pub fn contains(&self, entity: Entity, world: &World) -> bool {
        self.get(entity, world).is_some()
    }

    /// Get the record at `slot`
    pub fn record(&self, slot: SlotHandle) -> Option<&ComponentRecord<C::Data>> {
        self.records.get(slot)
    }

    /// Get the record at `slot`, mutably
    pub fn record_mut(&mut self, slot: SlotHandle) -> Option<&mut ComponentRecord<C::Data>> {
        self.records.get_mut(slot)
    }

    /// Cursor to the first record in iteration order
    pub fn first(&self) -> Option<SlotHandle> {
        self.records.first()
    }

    /// Cursor to the record after `cursor`
    pub fn next(&self, cursor: SlotHandle) -> Option<SlotHandle> {
        self.records.next(cursor)
    }

    /// Iterate over all records in iteration order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentRecord<C::Data>> + '_ {
        self.records.iter().map(|(_, record)| record)
    }

    /// Iterate over the entities that have this component
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.iter().map(|record| record.entity())
    }

    /// Visit every record mutably, in iteration order, alongside the shared component state
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut C, &mut ComponentRecord<C::Data>),
    {
        let Self {
            component, records, ..
        } = &mut *self;
        records.for_each_mut(|_, record| f(component, record));
    }

    /// Visit every record mutably across the Rayon thread pool
    ///
    /// Order is unspecified. The shared component state is available read-only.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_mut<F>(&mut self, f: F)
    where
        C: Sync,
        C::Data: Send,
        F: Fn(&C, &mut ComponentRecord<C::Data>) + Sync + Send,
    {
        let Self {
            component, records, ..
        } = &mut *self;
        let component: &C = component;
        records.par_for_each_mut(|record| f(component, record));
    }

    /// Export the data of `entity` as opaque bytes
    ///
    /// `None` if the entity lacks the component or the component does not
    /// support export.
    pub fn export_raw(&self, entity: Entity, world: &World) -> Option<Vec<u8>> {
        let data = self.get(entity, world)?;
        self.component.export_raw(entity, data)
    }

    /// Attach this component to `entity` and populate it from opaque bytes
    ///
    /// If the entity did not have the component before and the import fails,
    /// the new record is detached again.
    pub fn import_raw(
        &mut self,
        entity: Entity,
        raw: &[u8],
        world: &mut World,
    ) -> Result<(), EcsError> {
        let was_attached = self.contains(entity, world);
        self.attach(entity, world)?;

        let slot = world
            .entity_record(entity)
            .and_then(|record| record.component_slot(self.id))
            .ok_or(EcsError::StaleEntity(entity))?;
        let Self {
            component, records, ..
        } = &mut *self;
        let result = match records.get_mut(slot) {
            Some(record) => component.import_raw(entity, &mut record.data, raw),
            None => Err(EcsError::StaleEntity(entity)),
        };

        if result.is_err() && !was_attached {
            self.detach(entity, world);
        }
        result
    }

    /// Run cleanup for the record at `slot`, free it and reset the owner's table entry
    fn release(&mut self, slot: SlotHandle, world: &mut World) -> Option<SlotHandle> {
        let id = self.id;
        let Self {
            component, records, ..
        } = &mut *self;

        let entity = {
            let record = records.get_mut(slot)?;
            let entity = record.entity();
            component.cleanup_entity(entity, &mut record.data, world);
            entity
        };
        let next = records.free_and_advance(slot);
        if let Some(entity_record) = world.entity_record_mut(entity) {
            entity_record.clear_component_slot(id, slot);
        }
        log::trace!("detached `{}` from {entity}", type_name::<C>());
        next
    }
}

/// Type-erased view of a [`ComponentStorage`] used by the world
pub(crate) trait AnyStorage {
    fn name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn initialize(&mut self, world: &mut World);

    fn cleanup(&mut self, world: &mut World);

    fn attach_erased(&mut self, entity: Entity, world: &mut World) -> Result<(), EcsError>;

    fn detach_erased(&mut self, entity: Entity, world: &mut World) -> bool;

    fn update_all(&mut self, world: &mut World, delta: DeltaTime);

    fn clear(&mut self, world: &mut World) -> usize;

    fn data_as_any<'a>(&'a self, entity: Entity, world: &World) -> Option<&'a dyn Any>;

    fn export_raw(&self, entity: Entity, world: &World) -> Option<Vec<u8>>;

    fn import_raw(&mut self, entity: Entity, raw: &[u8], world: &mut World) -> Result<(), EcsError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> AnyStorage for ComponentStorage<C> {
    fn name(&self) -> &'static str {
        type_name::<C>()
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn initialize(&mut self, world: &mut World) {
        self.component.initialize(world);
    }

    fn cleanup(&mut self, world: &mut World) {
        self.component.cleanup(world);
    }

    fn attach_erased(&mut self, entity: Entity, world: &mut World) -> Result<(), EcsError> {
        self.attach(entity, world).map(|_| ())
    }

    fn detach_erased(&mut self, entity: Entity, world: &mut World) -> bool {
        self.detach(entity, world)
    }

    fn update_all(&mut self, world: &mut World, delta: DeltaTime) {
        C::update_all(self, world, delta);
    }

    fn clear(&mut self, world: &mut World) -> usize {
        ComponentStorage::clear(self, world)
    }

    fn data_as_any<'a>(&'a self, entity: Entity, world: &World) -> Option<&'a dyn Any> {
        self.get(entity, world).map(|data| data as &dyn Any)
    }

    fn export_raw(&self, entity: Entity, world: &World) -> Option<Vec<u8>> {
        ComponentStorage::export_raw(self, entity, world)
    }

    fn import_raw(&mut self, entity: Entity, raw: &[u8], world: &mut World) -> Result<(), EcsError> {
        ComponentStorage::import_raw(self, entity, raw, world)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Health {
        cleaned: Vec<Entity>,
    }

    impl Component for Health {
        type Data = i32;

        fn initialize_entity(
            &mut self,
            _entity: Entity,
            data: &mut i32,
            _world: &mut World,
        ) -> Result<(), EcsError> {
            *data = 100;
            Ok(())
        }

        fn cleanup_entity(&mut self, entity: Entity, _data: &mut i32, _world: &mut World) {
            self.cleaned.push(entity);
        }
    }

    #[derive(Default)]
    struct Fragile;

    impl Component for Fragile {
        type Data = ();

        fn initialize_entity(
            &mut self,
            _entity: Entity,
            _data: &mut (),
            _world: &mut World,
        ) -> Result<(), EcsError> {
            Err(EcsError::InvalidRawData {
                component: "Fragile",
                reason: "refuses to initialize".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct Counter {
        imports: Rc<RefCell<usize>>,
    }

    impl Component for Counter {
        type Data = u8;

        fn export_raw(&self, _entity: Entity, data: &u8) -> Option<Vec<u8>> {
            Some(vec![*data])
        }

        fn import_raw(&mut self, _entity: Entity, data: &mut u8, raw: &[u8]) -> Result<(), EcsError> {
            *self.imports.borrow_mut() += 1;
            match raw {
                [value] => {
                    *data = *value;
                    Ok(())
                }
                _ => Err(EcsError::InvalidRawData {
                    component: "Counter",
                    reason: format!("expected 1 byte, got {}", raw.len()),
                }),
            }
        }
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut world = World::new();
        let entity = world.create_entity();

        world
            .with_storage::<Health, _>(|storage, world| {
                *storage.attach(entity, world).unwrap() = 42;
                let again = *storage.attach(entity, world).unwrap();
                assert_eq!(again, 42);
                assert_eq!(storage.len(), 1);
            })
            .unwrap();
    }

    #[test]
    fn test_initialize_entity_sees_new_data() {
        let mut world = World::new();
        let entity = world.create_entity();

        let value = world
            .with_storage::<Health, _>(|storage, world| *storage.attach(entity, world).unwrap())
            .unwrap();
        assert_eq!(value, 100);
    }

    #[test]
    fn test_detach_runs_cleanup_and_clears_table() {
        let mut world = World::new();
        let entity = world.create_entity();

        world
            .with_storage::<Health, _>(|storage, world| {
                storage.attach(entity, world).unwrap();
                assert!(storage.detach(entity, world));
                assert!(!storage.detach(entity, world));
                assert!(storage.get(entity, world).is_none());
                assert_eq!(storage.component().cleaned, vec![entity]);
            })
            .unwrap();

        let id = world.component_id::<Health>().unwrap();
        assert!(!world.entity_record(entity).unwrap().has_component(id));
    }

    #[test]
    fn test_detach_at_during_traversal() {
        let mut world = World::new();
        let entities: Vec<_> = (0..6).map(|_| world.create_entity()).collect();

        world
            .with_storage::<Health, _>(|storage, world| {
                for (i, entity) in entities.iter().enumerate() {
                    *storage.attach(*entity, world).unwrap() = i as i32;
                }

                let mut seen = Vec::new();
                let mut cursor = storage.first();
                while let Some(slot) = cursor {
                    let record = storage.record(slot).unwrap();
                    seen.push(record.entity());
                    cursor = if record.data % 2 == 0 {
                        storage.detach_at(slot, world)
                    } else {
                        storage.next(slot)
                    };
                }

                assert_eq!(seen, entities);
                assert_eq!(storage.len(), 3);
                let remaining: Vec<_> = storage.entities().collect();
                assert_eq!(remaining, vec![entities[1], entities[3], entities[5]]);
            })
            .unwrap();

        assert!(!world.has_component::<Health>(entities[0]));
        assert!(world.has_component::<Health>(entities[1]));
    }

    #[test]
    fn test_clear_detaches_everything() {
        let mut world = World::new();
        let entities: Vec<_> = (0..4).map(|_| world.create_entity()).collect();

        world
            .with_storage::<Health, _>(|storage, world| {
                for entity in &entities {
                    storage.attach(*entity, world).unwrap();
                }
                assert_eq!(storage.clear(world), 4);
                assert!(storage.is_empty());
                assert_eq!(storage.component().cleaned, entities);
            })
            .unwrap();

        for entity in entities {
            assert!(!world.has_component::<Health>(entity));
        }
    }

    #[test]
    fn test_attach_at_front() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();

        world
            .with_storage::<Health, _>(|storage, world| {
                storage.attach(a, world).unwrap();
                storage.attach_at(b, AllocationLocation::Front, world).unwrap();
                assert_eq!(storage.entities().collect::<Vec<_>>(), vec![b, a]);
            })
            .unwrap();
    }

    #[test]
    fn test_failed_initialization_rolls_back() {
        let mut world = World::new();
        let entity = world.create_entity();

        let result = world.with_storage::<Fragile, _>(|storage, world| {
            let result = storage.attach(entity, world).map(|_| ());
            assert!(storage.is_empty());
            result
        });

        assert!(matches!(result, Ok(Err(EcsError::InvalidRawData { .. }))));
        assert!(!world.has_component::<Fragile>(entity));
    }

    #[test]
    fn test_stale_entity_is_rejected() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.destroy_entity(entity);

        let result = world
            .with_storage::<Health, _>(|storage, world| storage.attach(entity, world).map(|_| ()))
            .unwrap();
        assert_eq!(result, Err(EcsError::StaleEntity(entity)));
    }

    #[test]
    fn test_import_rolls_back_new_record_on_failure() {
        let mut world = World::new();
        let entity = world.create_entity();

        world
            .with_storage::<Counter, _>(|storage, world| {
                assert!(storage.import_raw(entity, &[1, 2], world).is_err());
                assert!(!storage.contains(entity, world));

                storage.import_raw(entity, &[7], world).unwrap();
                assert_eq!(storage.get(entity, world), Some(&7));
                assert_eq!(storage.export_raw(entity, world), Some(vec![7]));

                // Existing records survive a failed import
                assert!(storage.import_raw(entity, &[], world).is_err());
                assert_eq!(storage.get(entity, world), Some(&7));
                assert_eq!(*storage.component().imports.borrow(), 3);
            })
            .unwrap();
    }

    #[test]
    fn test_for_each_mut_sees_component_state() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();

        world
            .with_storage::<Health, _>(|storage, world| {
                storage.attach(a, world).unwrap();
                storage.attach(b, world).unwrap();
                storage.for_each_mut(|component, record| {
                    record.data -= component.cleaned.len() as i32 + 1;
                });
                assert_eq!(storage.get(a, world), Some(&99));
                assert_eq!(storage.get(b, world), Some(&99));
            })
            .unwrap();
    }
}
