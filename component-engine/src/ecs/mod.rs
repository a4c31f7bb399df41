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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Entity handles and per-entity component tables
//! - Dense component type ids owned by each world
//! - Per-type component storage with lifecycle hooks
//! - The world, which owns entities and storages and drives ticks

mod component;
mod component_id;
mod entity;
mod storage;
mod world;

pub use component::{Component, ComponentRecord, DeltaTime};
pub use component_id::{ComponentId, ComponentTypeRegistry, DEFAULT_MAX_COMPONENT_TYPES};
pub use entity::{Entity, EntityRecord};
pub use storage::ComponentStorage;
pub use world::{RawComponent, World, WorldConfig};
