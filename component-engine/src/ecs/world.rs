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
//! World management
//!
//! The World is the central container for all ECS data. It owns every entity
//! (as records in a slot pool), one storage per registered component type,
//! and the order in which those storages are ticked.
//!
//! Component types are registered lazily the first time they are attached, or
//! explicitly with [`World::register_component`] / [`World::register_with`].
//! Registration order is the update order of [`World::tick`] and the
//! detachment order of [`World::destroy_entity`].

use crate::ecs::storage::AnyStorage;
use crate::ecs::{
    Component, ComponentId, ComponentStorage, ComponentTypeRegistry, DeltaTime, Entity,
    EntityRecord, DEFAULT_MAX_COMPONENT_TYPES,
};
use crate::error::EcsError;
use crate::pool::{AllocationLocation, PoolConfig, SlotPool};
use std::any::{type_name, Any};
use std::fmt;

/// Configuration for a [`World`]
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Pool settings for the entity pool
    pub entity_pool: PoolConfig,
    /// Pool settings used for every component storage
    pub component_pool: PoolConfig,
    /// Maximum number of distinct component types
    pub max_component_types: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            entity_pool: PoolConfig::default(),
            component_pool: PoolConfig::default(),
            max_component_types: DEFAULT_MAX_COMPONENT_TYPES,
        }
    }
}

impl WorldConfig {
    /// Set the entity pool configuration
    pub fn with_entity_pool(mut self, config: PoolConfig) -> Self {
        self.entity_pool = config;
        self
    }

    /// Set the configuration used for component storages
    pub fn with_component_pool(mut self, config: PoolConfig) -> Self {
        self.component_pool = config;
        self
    }

    /// Set the maximum number of component types
    pub fn with_max_component_types(mut self, limit: usize) -> Self {
        self.max_component_types = limit;
        self
    }
}

/// One component of an exported entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    /// Id of the component type in the exporting world
    pub component: ComponentId,
    /// Type name of the component
    pub name: &'static str,
    /// Bytes produced by [`Component::export_raw`]
    pub bytes: Vec<u8>,
}

/// The main ECS world container
///
/// World manages entity lifecycles, owns one [`ComponentStorage`] per
/// component type, and drives the per-tick update pass.
pub struct World {
    config: WorldConfig,
    entities: SlotPool<EntityRecord>,
    component_types: ComponentTypeRegistry,
    // `None` while the storage is checked out to run a hook
    storages: Vec<Option<Box<dyn AnyStorage>>>,
    pending_deletion: Vec<Entity>,
    tick_count: u64,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a new empty world with custom configuration
    pub fn with_config(config: WorldConfig) -> Self {
        World {
            entities: SlotPool::with_config(config.entity_pool.clone()),
            component_types: ComponentTypeRegistry::new(config.max_component_types),
            storages: Vec::new(),
            pending_deletion: Vec::new(),
            tick_count: 0,
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Create a new entity with no components
    ///
    /// # Panics
    ///
    /// Panics if the entity pool has reached its maximum capacity. Use
    /// [`try_create_entity`](Self::try_create_entity) to handle that case.
    pub fn create_entity(&mut self) -> Entity {
        match self.try_create_entity() {
            Ok(entity) => entity,
            Err(err) => panic!("failed to create entity: {err}"),
        }
    }

    /// Create a new entity with no components, failing if the entity pool is full
    pub fn try_create_entity(&mut self) -> Result<Entity, EcsError> {
        let slot = self
            .entities
            .allocate(EntityRecord::new(), AllocationLocation::Back)?;
        let entity = Entity::from_slot(slot);
        log::trace!("created {entity}");
        Ok(entity)
    }

    /// Destroy an entity
    ///
    /// Every attached component is detached in registration order, running its
    /// cleanup hook, and then the entity slot is freed. Returns `false` if the
    /// entity was not alive.
    ///
    /// Once destruction starts, attaching anything to the entity fails with
    /// [`EcsError::EntityBeingDestroyed`], so a single pass strips every
    /// record even when cleanup hooks try to re-attach components. Destroying
    /// an entity that is already being destroyed is a no-op returning `true`.
    ///
    /// If one of the entity's component storages is checked out (the entity is
    /// being destroyed from inside that component's own hook or update), the
    /// remaining components cannot be detached yet. The entity is marked for
    /// deletion instead and removed by the next
    /// [`delete_marked_entities`](Self::delete_marked_entities).
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let attached: Vec<ComponentId> = match self.entities.get_mut(entity.slot()) {
            Some(record) if record.is_being_destroyed() => return true,
            Some(record) => {
                record.set_being_destroyed(true);
                record.component_ids().collect()
            }
            None => return false,
        };

        for id in attached {
            if let Err(err) = self.detach_by_id(entity, id) {
                log::warn!("deferring destruction of {entity}: {err}");
                if let Some(record) = self.entity_record_mut(entity) {
                    record.set_being_destroyed(false);
                }
                self.mark_for_deletion(entity);
                return true;
            }
        }

        debug_assert_eq!(
            self.entity_record(entity).map(EntityRecord::component_count),
            Some(0)
        );
        self.entities.free(entity.slot());
        log::trace!("destroyed {entity}");
        true
    }

    /// Check if an entity is alive
    pub fn is_entity_alive(&self, entity: Entity) -> bool {
        self.entities.contains(entity.slot())
    }

    /// Get the number of alive entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Get an iterator over all alive entities, in creation order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().map(|(slot, _)| Entity::from_slot(slot))
    }

    /// Get the bookkeeping record of a live entity
    pub fn entity_record(&self, entity: Entity) -> Option<&EntityRecord> {
        self.entities.get(entity.slot())
    }

    pub(crate) fn entity_record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.entities.get_mut(entity.slot())
    }

    /// Register component type `C` with a default instance
    ///
    /// Registering an already known type returns its id and does nothing else.
    pub fn register_component<C: Component>(&mut self) -> Result<ComponentId, EcsError> {
        if let Some(id) = self.component_types.id_of::<C>() {
            return Ok(id);
        }
        self.register_with(C::default())
    }

    /// Register component type `C` using a preconfigured instance
    ///
    /// Calls [`Component::initialize`] before returning. If `C` is already
    /// registered the instance is dropped and the existing id returned.
    pub fn register_with<C: Component>(&mut self, component: C) -> Result<ComponentId, EcsError> {
        if let Some(id) = self.component_types.id_of::<C>() {
            log::warn!(
                "`{}` is already registered as {id}; keeping the existing instance",
                type_name::<C>()
            );
            return Ok(id);
        }

        let id = self.component_types.register::<C>()?;
        let mut storage: Box<dyn AnyStorage> = Box::new(ComponentStorage::new(
            id,
            component,
            self.config.component_pool.clone(),
        ));
        debug_assert_eq!(self.storages.len(), id.index());
        self.storages.push(None);

        storage.initialize(self);
        self.restore_storage(id, storage);
        log::debug!("registered component `{}` as {id}", type_name::<C>());
        Ok(id)
    }

    /// Get the id of `C` if it is registered
    pub fn component_id<C: Component>(&self) -> Option<ComponentId> {
        self.component_types.id_of::<C>()
    }

    /// Get the component type registry
    pub fn component_types(&self) -> &ComponentTypeRegistry {
        &self.component_types
    }

    /// Attach component `C` to `entity` and return its data
    ///
    /// Registers `C` on first use. Attaching a component the entity already
    /// has returns the existing data.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if the entity is not alive
    /// - [`EcsError::ReentrantAccess`] if called from inside one of `C`'s own hooks
    /// - [`EcsError::TooManyComponentTypes`] if `C` cannot be registered
    /// - any error raised by `C`'s `initialize_entity` hook
    pub fn attach<C: Component>(&mut self, entity: Entity) -> Result<&mut C::Data, EcsError> {
        self.attach_at::<C>(entity, AllocationLocation::Back)
    }

    /// Attach component `C` to `entity` at the given position in `C`'s iteration order
    pub fn attach_at<C: Component>(
        &mut self,
        entity: Entity,
        location: AllocationLocation,
    ) -> Result<&mut C::Data, EcsError> {
        self.with_storage::<C, _>(|storage, world| {
            storage.attach_at(entity, location, world).map(|_| ())
        })??;
        self.get_mut::<C>(entity)
            .ok_or(EcsError::StaleEntity(entity))
    }

    /// Attach the component registered as `id` to `entity`
    pub fn attach_by_id(&mut self, entity: Entity, id: ComponentId) -> Result<(), EcsError> {
        let mut storage = self.take_storage(id)?;
        let result = storage.attach_erased(entity, self);
        self.restore_storage(id, storage);
        result
    }

    /// Detach component `C` from `entity`
    ///
    /// Returns `Ok(false)` if the entity is not alive, lacks the component, or
    /// `C` was never registered.
    pub fn detach<C: Component>(&mut self, entity: Entity) -> Result<bool, EcsError> {
        match self.component_types.id_of::<C>() {
            Some(id) => self.detach_by_id(entity, id),
            None => Ok(false),
        }
    }

    /// Detach the component registered as `id` from `entity`
    pub fn detach_by_id(&mut self, entity: Entity, id: ComponentId) -> Result<bool, EcsError> {
        let mut storage = self.take_storage(id)?;
        let detached = storage.detach_erased(entity, self);
        self.restore_storage(id, storage);
        Ok(detached)
    }

    /// Get the `C` data of `entity`
    ///
    /// `None` if `C` is not registered, the entity lacks it, or `C`'s storage
    /// is currently checked out. In the last case [`has_component`](Self::has_component)
    /// still reports the component, since it only reads the entity's table.
    pub fn get<C: Component>(&self, entity: Entity) -> Option<&C::Data> {
        self.storage::<C>()?.get(entity, self)
    }

    /// Get the `C` data of `entity`, mutably
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C::Data> {
        let id = self.component_types.id_of::<C>()?;
        let slot = self.entities.get(entity.slot())?.component_slot(id)?;
        let storage = self
            .storages
            .get_mut(id.index())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<C>>()?;
        storage
            .record_mut(slot)
            .filter(|record| record.entity() == entity)
            .map(|record| &mut record.data)
    }

    /// Check if `entity` has component `C`
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        match (self.component_types.id_of::<C>(), self.entity_record(entity)) {
            (Some(id), Some(record)) => record.has_component(id),
            _ => false,
        }
    }

    /// Get the data of the component registered as `id`, type-erased
    ///
    /// Downcast the result to the component's `Data` type.
    pub fn component_data_by_id(&self, entity: Entity, id: ComponentId) -> Option<&dyn Any> {
        self.storages
            .get(id.index())?
            .as_ref()?
            .data_as_any(entity, self)
    }

    /// Get the storage of component `C`
    ///
    /// `None` if `C` is not registered or its storage is checked out.
    pub fn storage<C: Component>(&self) -> Option<&ComponentStorage<C>> {
        let id = self.component_types.id_of::<C>()?;
        self.storages
            .get(id.index())?
            .as_ref()?
            .as_any()
            .downcast_ref::<ComponentStorage<C>>()
    }

    /// Get the shared state of component type `C`
    pub fn component<C: Component>(&self) -> Option<&C> {
        self.storage::<C>().map(ComponentStorage::component)
    }

    /// Get the shared state of component type `C`, mutably
    pub fn component_mut<C: Component>(&mut self) -> Option<&mut C> {
        let id = self.component_types.id_of::<C>()?;
        self.storages
            .get_mut(id.index())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<C>>()
            .map(ComponentStorage::component_mut)
    }

    /// Run `f` with exclusive access to `C`'s storage and the rest of the world
    ///
    /// Registers `C` on first use. While `f` runs the storage is checked out:
    /// reaching it again through the world fails with
    /// [`EcsError::ReentrantAccess`] and lookups of `C` return `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use component_engine::ecs::{Component, World};
    ///
    /// #[derive(Default)]
    /// struct Score;
    /// impl Component for Score {
    ///     type Data = u32;
    /// }
    ///
    /// let mut world = World::new();
    /// let a = world.create_entity();
    /// let b = world.create_entity();
    /// world.attach::<Score>(a).unwrap();
    /// world.attach::<Score>(b).unwrap();
    ///
    /// let total = world
    ///     .with_storage::<Score, _>(|scores, _world| {
    ///         scores.for_each_mut(|_, record| record.data += 5);
    ///         scores.iter().map(|record| record.data).sum::<u32>()
    ///     })
    ///     .unwrap();
    /// assert_eq!(total, 10);
    /// ```
    pub fn with_storage<C, R>(
        &mut self,
        f: impl FnOnce(&mut ComponentStorage<C>, &mut World) -> R,
    ) -> Result<R, EcsError>
    where
        C: Component,
    {
        let id = self.register_component::<C>()?;
        let mut storage = self.take_storage(id)?;
        let result = match storage.as_any_mut().downcast_mut::<ComponentStorage<C>>() {
            Some(typed) => Ok(f(typed, self)),
            None => Err(EcsError::StorageTypeMismatch(type_name::<C>())),
        };
        self.restore_storage(id, storage);
        result
    }

    /// Advance the simulation by one tick
    ///
    /// Calls [`Component::update_all`] on every storage in registration order,
    /// then deletes entities marked for deletion. Storages that are checked
    /// out (`tick` called from inside a hook) are skipped.
    pub fn tick(&mut self, delta: DeltaTime) {
        let mut index = 0;
        while index < self.storages.len() {
            let id = ComponentId::from_index(index);
            match self.take_storage(id) {
                Ok(mut storage) => {
                    storage.update_all(self, delta);
                    self.restore_storage(id, storage);
                }
                Err(err) => log::warn!("skipping update of {id}: {err}"),
            }
            index += 1;
        }

        self.tick_count += 1;
        let deleted = self.delete_marked_entities();
        if deleted > 0 {
            log::trace!("tick {} deleted {deleted} marked entities", self.tick_count);
        }
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Mark `entity` for deferred deletion at the end of the current tick
    ///
    /// Returns `false` if the entity is not alive. Marking twice is harmless.
    pub fn mark_for_deletion(&mut self, entity: Entity) -> bool {
        let record = match self.entities.get_mut(entity.slot()) {
            Some(record) => record,
            None => return false,
        };
        if !record.is_marked_for_deletion() {
            record.set_marked_for_deletion(true);
            self.pending_deletion.push(entity);
        }
        true
    }

    /// Destroy every entity marked for deletion, returning how many were destroyed
    pub fn delete_marked_entities(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_deletion);
        let mut deleted = 0;
        for entity in pending {
            let marked = self
                .entity_record_mut(entity)
                .map(|record| {
                    let marked = record.is_marked_for_deletion();
                    record.set_marked_for_deletion(false);
                    marked
                })
                .unwrap_or(false);
            if marked {
                self.destroy_entity(entity);
                if !self.is_entity_alive(entity) {
                    deleted += 1;
                }
            }
        }
        deleted
    }

    /// Export every component of `entity` that supports raw export
    ///
    /// Components whose [`Component::export_raw`] returns `None` are skipped.
    pub fn export_entity(&self, entity: Entity) -> Result<Vec<RawComponent>, EcsError> {
        let record = self
            .entity_record(entity)
            .ok_or(EcsError::StaleEntity(entity))?;

        let mut exported = Vec::new();
        for id in record.component_ids() {
            let storage = self.storage_ref(id)?;
            if let Some(bytes) = storage.export_raw(entity, self) {
                exported.push(RawComponent {
                    component: id,
                    name: storage.name(),
                    bytes,
                });
            }
        }
        Ok(exported)
    }

    /// Attach component `C` to `entity` and populate it from raw bytes
    pub fn import_component<C: Component>(&mut self, entity: Entity, raw: &[u8]) -> Result<(), EcsError> {
        self.with_storage::<C, _>(|storage, world| storage.import_raw(entity, raw, world))?
    }

    /// Attach the component registered as `id` to `entity` and populate it from raw bytes
    pub fn import_component_by_id(
        &mut self,
        entity: Entity,
        id: ComponentId,
        raw: &[u8],
    ) -> Result<(), EcsError> {
        let mut storage = self.take_storage(id)?;
        let result = storage.import_raw(entity, raw, self);
        self.restore_storage(id, storage);
        result
    }

    /// Import components produced by [`export_entity`](Self::export_entity), stopping at the first failure
    ///
    /// Each entry is routed by its type name, so the exporting world may have
    /// registered its component types in a different order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponentName`] for an entry whose type is
    /// not registered in this world, before any entry is imported.
    pub fn import_entity(&mut self, entity: Entity, components: &[RawComponent]) -> Result<(), EcsError> {
        let routed = components
            .iter()
            .map(|raw| {
                self.component_types
                    .id_by_name(raw.name)
                    .map(|id| (id, raw.bytes.as_slice()))
                    .ok_or(EcsError::UnknownComponentName(raw.name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (id, bytes) in routed {
            self.import_component_by_id(entity, id, bytes)?;
        }
        Ok(())
    }

    /// Detach `C` from every entity, returning how many records were removed
    pub fn clear_components<C: Component>(&mut self) -> Result<usize, EcsError> {
        match self.component_types.id_of::<C>() {
            Some(id) => {
                let mut storage = self.take_storage(id)?;
                let removed = storage.clear(self);
                self.restore_storage(id, storage);
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    /// Detach every component from every entity, in registration order
    ///
    /// Entities stay alive. Storages that are checked out are skipped.
    pub fn clear_all_components(&mut self) -> usize {
        let mut removed = 0;
        for index in 0..self.storages.len() {
            let id = ComponentId::from_index(index);
            match self.take_storage(id) {
                Ok(mut storage) => {
                    removed += storage.clear(self);
                    self.restore_storage(id, storage);
                }
                Err(err) => log::warn!("cannot clear {id}: {err}"),
            }
        }
        removed
    }

    /// Detach all components and destroy all entities
    ///
    /// Component types stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ReentrantAccess`] without touching anything if a
    /// storage is checked out, i.e. when called from inside a hook.
    pub fn clear(&mut self) -> Result<(), EcsError> {
        if let Some(index) = self.storages.iter().position(Option::is_none) {
            let id = ComponentId::from_index(index);
            log::warn!("cannot clear the world while {id} is in use");
            return Err(EcsError::ReentrantAccess(self.component_name(id)));
        }

        let removed = self.clear_all_components();
        let entities = self.entities.len();
        self.entities.clear();
        self.pending_deletion.clear();
        log::debug!("cleared world: {removed} component records, {entities} entities");
        Ok(())
    }

    fn storage_ref(&self, id: ComponentId) -> Result<&dyn AnyStorage, EcsError> {
        match self.storages.get(id.index()) {
            Some(Some(storage)) => Ok(&**storage),
            Some(None) => Err(EcsError::ReentrantAccess(self.component_name(id))),
            None => Err(EcsError::UnknownComponent(id)),
        }
    }

    fn take_storage(&mut self, id: ComponentId) -> Result<Box<dyn AnyStorage>, EcsError> {
        let name = self.component_name(id);
        match self.storages.get_mut(id.index()) {
            Some(slot) => slot.take().ok_or(EcsError::ReentrantAccess(name)),
            None => Err(EcsError::UnknownComponent(id)),
        }
    }

    fn restore_storage(&mut self, id: ComponentId, storage: Box<dyn AnyStorage>) {
        if let Some(slot) = self.storages.get_mut(id.index()) {
            *slot = Some(storage);
        }
    }

    fn component_name(&self, id: ComponentId) -> &'static str {
        self.component_types.name(id).unwrap_or("<unregistered>")
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field(
                "components",
                &self
                    .storages
                    .iter()
                    .flatten()
                    .map(|storage| (storage.name(), storage.len()))
                    .collect::<Vec<_>>(),
            )
            .field("tick_count", &self.tick_count)
            .finish()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.clear_all_components();
        for index in (0..self.storages.len()).rev() {
            let id = ComponentId::from_index(index);
            if let Ok(mut storage) = self.take_storage(id) {
                storage.cleanup(self);
                self.restore_storage(id, storage);
            }
        }
    }
}
