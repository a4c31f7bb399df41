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
//! Component capability set
//!
//! A component type is a struct implementing [`Component`]. The struct itself
//! holds state shared by the whole type (services, caches, settings), and
//! [`Component::Data`] is the payload stored once per entity. The world keeps
//! one instance of each component type inside its
//! [`ComponentStorage`](crate::ecs::ComponentStorage) and calls the hooks below
//! at the matching points of the lifecycle. Every hook has a default, so a
//! plain data component only needs to name its payload type.

use crate::ecs::{ComponentStorage, Entity, World};
use crate::error::EcsError;
use std::any::type_name;

/// Simulation time elapsed since the previous tick, in seconds
pub type DeltaTime = f64;

/// A component payload together with the entity that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord<T> {
    entity: Entity,
    /// The per-entity payload
    pub data: T,
}

impl<T> ComponentRecord<T> {
    pub(crate) fn new(entity: Entity, data: T) -> Self {
        ComponentRecord { entity, data }
    }

    /// Entity this record belongs to
    pub fn entity(&self) -> Entity {
        self.entity
    }
}

/// Trait implemented by every component type
///
/// # Hooks and the world
///
/// Hooks receive `&mut World` so they can reach other component types, for
/// example attaching a transform from [`initialize_entity`](Self::initialize_entity)
/// to declare that rendering depends on it. While a hook of type `C` runs,
/// `C`'s own storage is checked out of the world: going back through the
/// world to attach or detach `C` fails with [`EcsError::ReentrantAccess`].
/// Use the `data` argument (or the storage passed to
/// [`update_all`](Self::update_all)) to work with `C`'s own records.
///
/// # Example
///
/// ```
/// use component_engine::ecs::{Component, Entity, World};
/// use component_engine::error::EcsError;
///
/// #[derive(Default)]
/// struct Transform;
/// impl Component for Transform {
///     type Data = [f32; 3];
/// }
///
/// #[derive(Default)]
/// struct RenderMesh;
/// impl Component for RenderMesh {
///     type Data = String;
///
///     fn initialize_entity(
///         &mut self,
///         entity: Entity,
///         _data: &mut String,
///         world: &mut World,
///     ) -> Result<(), EcsError> {
///         world.attach::<Transform>(entity)?;
///         Ok(())
///     }
/// }
///
/// let mut world = World::new();
/// let entity = world.create_entity();
/// world.attach::<RenderMesh>(entity).unwrap();
/// assert!(world.has_component::<Transform>(entity));
/// ```
pub trait Component: Default + 'static {
    /// Payload stored for each entity that has this component
    type Data: Default + 'static;

    /// Called once when the component type is registered with a world
    fn initialize(&mut self, _world: &mut World) {}

    /// Called after a record has been created for `entity`
    ///
    /// Attach dependencies here. Returning an error rolls the new record back.
    ///
    /// While this runs, `Self`'s storage is checked out. Hooks of other
    /// components reached from here (a dependency's own `initialize_entity`)
    /// see [`World::has_component`] return `true` for `Self` on `entity`,
    /// but [`World::get`] and [`World::storage`] return `None` for `Self`
    /// until this hook returns. Pass values to dependencies through their data
    /// after attaching them rather than reading `Self` back from the world.
    fn initialize_entity(
        &mut self,
        _entity: Entity,
        _data: &mut Self::Data,
        _world: &mut World,
    ) -> Result<(), EcsError> {
        Ok(())
    }

    /// Called before the record for `entity` is released
    ///
    /// Attaching components to `entity` from here fails with
    /// [`EcsError::EntityBeingDestroyed`] when the entity is being destroyed.
    fn cleanup_entity(&mut self, _entity: Entity, _data: &mut Self::Data, _world: &mut World) {}

    /// Per-tick work over every record of this type
    ///
    /// Called by [`World::tick`] in registration order. The storage may remove
    /// the record it is visiting with
    /// [`ComponentStorage::detach_at`]; allocating new records of this type
    /// during the traversal is unsupported.
    fn update_all(_storage: &mut ComponentStorage<Self>, _world: &mut World, _delta: DeltaTime) {}

    /// Export the record of `entity` as opaque bytes
    ///
    /// `None` means the component does not support export.
    fn export_raw(&self, _entity: Entity, _data: &Self::Data) -> Option<Vec<u8>> {
        None
    }

    /// Populate the record of `entity` from bytes produced by [`export_raw`](Self::export_raw)
    fn import_raw(
        &mut self,
        _entity: Entity,
        _data: &mut Self::Data,
        _raw: &[u8],
    ) -> Result<(), EcsError> {
        Err(EcsError::Unsupported(type_name::<Self>()))
    }

    /// Called once when the world is torn down, after all records were released
    fn cleanup(&mut self, _world: &mut World) {}
}
