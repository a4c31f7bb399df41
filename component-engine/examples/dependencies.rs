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
//! Component dependency example
//!
//! A mesh renderer needs a transform, so attaching the renderer attaches a
//! transform first. The renderer reads transform data during its update,
//! and a lifetime component schedules entities for deferred deletion.

use component_engine::ecs::{Component, ComponentStorage, DeltaTime, Entity, World};
use component_engine::error::EcsError;

#[derive(Debug, Default, Clone, Copy)]
struct TransformData {
    x: f64,
    y: f64,
    speed: f64,
}

#[derive(Default)]
struct Transform;

impl Component for Transform {
    type Data = TransformData;

    fn update_all(storage: &mut ComponentStorage<Self>, _world: &mut World, delta: DeltaTime) {
        storage.for_each_mut(|_, record| record.data.x += record.data.speed * delta);
    }
}

#[derive(Default)]
struct MeshRenderer {
    frames: usize,
}

impl Component for MeshRenderer {
    type Data = &'static str;

    fn initialize(&mut self, _world: &mut World) {
        println!("  [MeshRenderer] registered");
    }

    fn initialize_entity(
        &mut self,
        entity: Entity,
        data: &mut &'static str,
        world: &mut World,
    ) -> Result<(), EcsError> {
        world.attach::<Transform>(entity)?;
        *data = "cube";
        println!("  [MeshRenderer] {} now renders a {}", entity, data);
        Ok(())
    }

    fn cleanup_entity(&mut self, entity: Entity, _data: &mut &'static str, _world: &mut World) {
        println!("  [MeshRenderer] released mesh of {}", entity);
    }

    fn update_all(storage: &mut ComponentStorage<Self>, world: &mut World, _delta: DeltaTime) {
        storage.component_mut().frames += 1;
        let frame = storage.component().frames;
        for record in storage.iter() {
            if let Some(transform) = world.get::<Transform>(record.entity()) {
                println!(
                    "  [frame {}] {} {} at ({:.2}, {:.2})",
                    frame,
                    record.entity(),
                    record.data,
                    transform.x,
                    transform.y
                );
            }
        }
    }
}

#[derive(Default)]
struct Lifetime;

impl Component for Lifetime {
    type Data = f64;

    fn update_all(storage: &mut ComponentStorage<Self>, world: &mut World, delta: DeltaTime) {
        storage.for_each_mut(|_, record| record.data -= delta);
        for record in storage.iter().filter(|record| record.data <= 0.0) {
            println!("  [Lifetime] {} expired", record.entity());
            world.mark_for_deletion(record.entity());
        }
    }
}

fn main() -> Result<(), EcsError> {
    println!("Component Engine - Dependency Example");
    println!("=====================================\n");

    let mut world = World::new();

    // Registration order is update order: transforms move before they are drawn
    world.register_component::<Transform>()?;
    world.register_component::<MeshRenderer>()?;
    world.register_component::<Lifetime>()?;

    let ship = world.create_entity();
    let debris = world.create_entity();

    world.attach::<MeshRenderer>(ship)?;
    if let Some(transform) = world.get_mut::<Transform>(ship) {
        transform.speed = 2.0;
    }

    world.attach::<MeshRenderer>(debris)?;
    *world.attach::<Lifetime>(debris)? = 0.25;
    if let Some(transform) = world.get_mut::<Transform>(debris) {
        transform.y = 1.0;
        transform.speed = -1.0;
    }

    println!("\nCreated {} entities", world.entity_count());
    for entity in world.entities() {
        if let Some(record) = world.entity_record(entity) {
            let names: Vec<_> = record
                .component_ids()
                .filter_map(|id| world.component_types().name(id))
                .collect();
            println!("  - {}: {:?}", entity, names);
        }
    }

    println!("\nRunning 3 ticks:");
    for _ in 0..3 {
        world.tick(0.1);
    }

    println!("\nAfter ticking:");
    println!("  entities alive: {}", world.entity_count());
    println!("  debris alive:   {}", world.is_entity_alive(debris));

    println!("\nDestroying {}", ship);
    world.destroy_entity(ship);
    println!("  entities alive: {}", world.entity_count());

    Ok(())
}
