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
//! Dense component type ids
//!
//! Every component type registered with a world gets a small integer id, in
//! registration order, starting at zero. Ids index straight into the per-entity
//! component table and the world's storage list, so no type lookup happens on
//! the hot path. The mapping lives in the world that created it; two worlds may
//! number the same type differently.

use crate::error::EcsError;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Default limit on distinct component types per world
pub const DEFAULT_MAX_COMPONENT_TYPES: usize = 30;

/// Dense id of a registered component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u16);

impl ComponentId {
    /// Create a component id from a raw value
    pub fn new(raw: u16) -> Self {
        ComponentId(raw)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index <= u16::MAX as usize);
        ComponentId(index as u16)
    }

    /// Get the raw id value
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Get the id as an array offset
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Assigns and remembers component type ids
#[derive(Debug)]
pub struct ComponentTypeRegistry {
    ids: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
    limit: usize,
}

impl ComponentTypeRegistry {
    /// Create an empty registry accepting at most `limit` types
    ///
    /// The limit is capped at the number of values a [`ComponentId`] can hold.
    pub fn new(limit: usize) -> Self {
        ComponentTypeRegistry {
            ids: HashMap::new(),
            names: Vec::new(),
            limit: limit.min(u16::MAX as usize + 1),
        }
    }

    /// Get the id of `T`, registering it if it has not been seen yet
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponentTypes`] if `T` is new and the
    /// registry is full.
    pub fn register<T: 'static>(&mut self) -> Result<ComponentId, EcsError> {
        if let Some(id) = self.id_of::<T>() {
            return Ok(id);
        }
        let name = type_name::<T>();
        if self.names.len() >= self.limit {
            return Err(EcsError::TooManyComponentTypes {
                name,
                limit: self.limit,
            });
        }
        let id = ComponentId::from_index(self.names.len());
        self.ids.insert(TypeId::of::<T>(), id);
        self.names.push(name);
        Ok(id)
    }

    /// Get the id of `T` if it is registered
    pub fn id_of<T: 'static>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Get the id of the type registered under `name`
    pub fn id_by_name(&self, name: &str) -> Option<ComponentId> {
        self.names
            .iter()
            .position(|registered| *registered == name)
            .map(ComponentId::from_index)
    }

    /// Get the type name registered under `id`
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no types are registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Maximum number of types this registry accepts
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Iterate over registered types in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &'static str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (ComponentId::from_index(index), *name))
    }
}

impl Default for ComponentTypeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPONENT_TYPES)
    }
}
