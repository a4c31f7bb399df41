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
//! # Component Engine
//!
//! The storage and lifecycle core of an entity/component runtime: entities
//! aggregate typed component records, each component type owns a slot pool
//! of records, and a world drives a per-tick update pass over every type in
//! registration order.
//!
//! ## Features
//!
//! - **Slot pools**: contiguous storage with generational handles that reject
//!   stale references after a slot is reused
//! - **Component lifecycle hooks**: per-type initialization, per-entity setup
//!   and cleanup, per-tick updates, and opaque raw import/export
//! - **Dependencies at attach time**: a component can attach the components it
//!   needs from its own initialization hook
//! - **Parallelization**: optional Rayon integration for per-record work
//!   inside a component's update
//!
//! ## Example
//!
//! ```rust
//! use component_engine::ecs::{Component, ComponentStorage, DeltaTime, World};
//!
//! #[derive(Default)]
//! struct Lifetime;
//!
//! impl Component for Lifetime {
//!     type Data = f64;
//!
//!     fn update_all(storage: &mut ComponentStorage<Self>, world: &mut World, delta: DeltaTime) {
//!         storage.for_each_mut(|_, record| record.data -= delta);
//!         let expired: Vec<_> = storage
//!             .iter()
//!             .filter(|record| record.data <= 0.0)
//!             .map(|record| record.entity())
//!             .collect();
//!         for entity in expired {
//!             world.mark_for_deletion(entity);
//!         }
//!     }
//! }
//!
//! let mut world = World::new();
//! let entity = world.create_entity();
//! *world.attach::<Lifetime>(entity).unwrap() = 1.5;
//!
//! world.tick(1.0);
//! assert!(world.is_entity_alive(entity));
//! world.tick(1.0);
//! assert!(!world.is_entity_alive(entity));
//! ```

#![warn(missing_docs)]

/// Entity Component System implementation
pub mod ecs;

/// Error types
pub mod error;

/// Slot pools with generational handles
pub mod pool;

pub use ecs::{Component, Entity, World};
pub use error::{EcsError, PoolError};
