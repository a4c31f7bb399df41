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
//! Error types
//!
//! Lookups on stale handles or missing components are not errors: they return
//! `None` or do nothing, and the caller decides what that means. The types
//! here cover failures a caller cannot rule out by checking first: exhausted
//! pools, misconfigured dependency graphs, and components that do not support
//! an optional capability.

use crate::ecs::{ComponentId, Entity};
use thiserror::Error;

/// Errors raised by [`SlotPool`](crate::pool::SlotPool)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool reached its configured maximum number of slots
    #[error("pool capacity of {capacity} slots exhausted")]
    CapacityExhausted {
        /// The limit that was hit
        capacity: usize,
    },
}

/// Errors raised by the world and component storages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// The entity handle does not refer to a live entity of this world
    #[error("{0} is stale or belongs to another world")]
    StaleEntity(Entity),

    /// A storage was reached again while it was already executing a hook or update
    ///
    /// Usually a dependency cycle: component A attaches B on init and B attaches A.
    #[error("component `{0}` is already in use further up the call stack; reentrant access is not allowed")]
    ReentrantAccess(&'static str),

    /// Components cannot be attached to an entity whose destruction is under way
    ///
    /// Usually cleanup hooks that re-attach each other's components.
    #[error("{0} is being destroyed; no components can be attached to it")]
    EntityBeingDestroyed(Entity),

    /// Registering another component type would exceed the configured limit
    #[error("cannot register `{name}`: component type limit of {limit} reached")]
    TooManyComponentTypes {
        /// Type that failed to register
        name: &'static str,
        /// Configured maximum
        limit: usize,
    },

    /// No component type is registered under this id
    #[error("no component type registered as {0}")]
    UnknownComponent(ComponentId),

    /// No component type with this name is registered
    #[error("no component type registered under the name `{0}`")]
    UnknownComponentName(&'static str),

    /// The storage registered for a type is not the storage that type expects
    #[error("storage registered for `{0}` has an unexpected type")]
    StorageTypeMismatch(&'static str),

    /// The component does not implement raw data import
    #[error("component `{0}` does not support raw data import")]
    Unsupported(&'static str),

    /// The component rejected the raw data it was given
    #[error("invalid raw data for `{component}`: {reason}")]
    InvalidRawData {
        /// Component that rejected the data
        component: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A pool could not provide a slot
    #[error(transparent)]
    Pool(#[from] PoolError),
}
