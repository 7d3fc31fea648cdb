//! Frame scheduler: turns the systems selected for a frame into a task graph.
//!
//! For each frame the scheduler:
//!
//! 1. snapshots the world's component set for every queried type, once per
//!    type, so systems querying the same type share one view;
//! 2. creates one parallel for-each task per (system, query type) that ticks
//!    the system with each component's owner, skipping expired owners;
//! 3. wires precedence edges from each system's declared before/after sets
//!    (only towards systems present this frame), the physics
//!    write → solve → read chain, and the render extraction stage that
//!    follows script ticking;
//!
//! and hands the graph back to the world, which runs it on its pool.

use std::collections::HashMap;
use std::sync::Arc;

use engine_component::{ComponentRef, ComponentTypeId};
use rayon::prelude::*;
use tracing::trace;

use crate::entity::Entity;
use crate::error::EcsError;
use crate::frame::RenderItem;
use crate::graph::{TaskGraph, TaskId};
use crate::physics::{PhysicsLinkSystemRead, PhysicsLinkSystemWrite};
use crate::registry::SystemEntry;
use crate::script::ScriptSystem;
use crate::system::SystemId;
use crate::world::World;

type Snapshot = Arc<[ComponentRef<Entity>]>;

/// Builds one frame's task graph.
pub struct FrameScheduler<'w> {
    world: &'w World,
    scale: f32,
    snapshots: HashMap<ComponentTypeId, Snapshot>,
    tasks: HashMap<SystemId, Vec<TaskId>>,
    graph: TaskGraph<'w>,
}

impl<'w> FrameScheduler<'w> {
    /// Build the task graph for `systems` over `world`'s current components.
    #[must_use]
    pub fn build(world: &'w World, systems: &[SystemEntry], scale: f32) -> TaskGraph<'w> {
        let mut scheduler = Self {
            world,
            scale,
            snapshots: HashMap::new(),
            tasks: HashMap::new(),
            graph: TaskGraph::new(),
        };

        for entry in systems {
            scheduler.add_system(entry);
        }
        for entry in systems {
            scheduler.wire_declared(entry);
        }
        if world.is_physics_active() {
            scheduler.wire_physics();
        }
        if !world.render_types().is_empty() {
            scheduler.wire_render();
        }

        trace!(
            systems = systems.len(),
            snapshots = scheduler.snapshots.len(),
            tasks = scheduler.graph.len(),
            edges = scheduler.graph.edge_count(),
            "built frame graph"
        );
        scheduler.graph
    }

    fn snapshot(&mut self, type_id: ComponentTypeId) -> Snapshot {
        let world = self.world;
        Arc::clone(
            self.snapshots
                .entry(type_id)
                .or_insert_with(|| world.components().snapshot_of_type(type_id)),
        )
    }

    fn add_system(&mut self, entry: &SystemEntry) {
        let mut ids = Vec::with_capacity(entry.query_types.len());
        for &query in &entry.query_types {
            let cells = self.snapshot(query);
            let system = Arc::clone(&entry.system);
            let name = entry.name.clone();
            let scale = self.scale;
            let task = self
                .graph
                .add_task(format!("{}[{query}]", entry.name), move || {
                    cells[..].par_iter().try_for_each(|cell| match cell.owner() {
                        Some(entity) => system.tick(scale, &entity).map_err(|source| {
                            EcsError::SystemFailed {
                                system: name.clone(),
                                source,
                            }
                        }),
                        None => Ok(()),
                    })
                });
            ids.push(task);
        }
        self.tasks.entry(entry.id).or_default().extend(ids);
    }

    fn tasks_of(&self, id: SystemId) -> Vec<TaskId> {
        self.tasks.get(&id).cloned().unwrap_or_default()
    }

    fn wire_declared(&mut self, entry: &SystemEntry) {
        let own = self.tasks_of(entry.id);
        for &other in &entry.must_run_before {
            for target in self.tasks_of(other) {
                for &task in &own {
                    self.graph.precede(task, target);
                }
            }
        }
        for &other in &entry.must_run_after {
            for source in self.tasks_of(other) {
                for &task in &own {
                    self.graph.succeed(task, source);
                }
            }
        }
    }

    fn wire_physics(&mut self) {
        let solver = Arc::clone(self.world.solver());
        let scale = self.scale;
        let solve = self.graph.add_task("physics.solve", move || {
            solver.tick(scale);
            Ok(())
        });
        for write in self.tasks_of(SystemId::of::<PhysicsLinkSystemWrite>()) {
            self.graph.precede(write, solve);
        }
        for read in self.tasks_of(SystemId::of::<PhysicsLinkSystemRead>()) {
            self.graph.precede(solve, read);
        }
    }

    fn wire_render(&mut self) {
        let world = self.world;
        let frames = world.frames();
        let tick = world.tick_count();
        let setup = self.graph.add_task("render.setup", move || {
            frames.write_back(|frame| {
                frame.clear();
                frame.tick = tick;
            });
            Ok(())
        });
        let swap = self.graph.add_task("render.swap", move || {
            frames.swap();
            Ok(())
        });
        let scripts = self.tasks_of(SystemId::of::<ScriptSystem>());

        for &type_id in world.render_types() {
            let cells = self.snapshot(type_id);
            let extract = self
                .graph
                .add_task(format!("render.extract[{type_id}]"), move || {
                    let items: Vec<RenderItem> = cells
                        .iter()
                        .filter_map(|cell| {
                            cell.owner().map(|owner| RenderItem {
                                entity: owner.id(),
                                component: Arc::clone(cell),
                            })
                        })
                        .collect();
                    frames.write_back(|frame| {
                        for item in items {
                            frame.push(type_id, item);
                        }
                    });
                    Ok(())
                });
            self.graph.precede(setup, extract);
            self.graph.precede(extract, swap);
            for &script in &scripts {
                self.graph.precede(script, extract);
            }
        }
        self.graph.precede(setup, swap);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use engine_component::Component;

    use super::*;
    use crate::context::{EngineConfig, EngineContext};
    use crate::system::FnSystem;

    struct Foo;

    impl Component for Foo {
        fn type_name() -> &'static str {
            "Foo"
        }
    }

    struct Bar;

    impl Component for Bar {
        fn type_name() -> &'static str {
            "Bar"
        }
    }

    fn world() -> Arc<World> {
        let ctx = EngineContext::new(EngineConfig {
            worker_threads: Some(2),
            ..EngineConfig::default()
        })
        .unwrap();
        World::new(Arc::new(ctx))
    }

    fn select(world: &World) -> Vec<SystemEntry> {
        world.with_registry(|registry| registry.select_for_frame(Instant::now()))
    }

    #[test]
    fn test_one_task_per_system_and_query_type() {
        let world = world();
        world.register_system(Arc::new(
            FnSystem::new("both", |_, _| Ok(())).query::<Foo>().query::<Bar>(),
        ));
        world.register_system(Arc::new(FnSystem::new("foo", |_, _| Ok(())).query::<Foo>()));

        let systems = select(&world);
        let graph = FrameScheduler::build(&world, &systems, 1.0);
        // ScriptSystem contributes one task as well.
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_edges_only_towards_present_systems() {
        let world = world();
        world.register_system(Arc::new(
            FnSystem::new("a", |_, _| Ok(()))
                .query::<Foo>()
                .query::<Bar>()
                .before(SystemId::from_name("b"))
                .after(SystemId::from_name("missing")),
        ));
        world.register_system(Arc::new(FnSystem::new("b", |_, _| Ok(())).query::<Foo>()));

        let systems = select(&world);
        let graph = FrameScheduler::build(&world, &systems, 1.0);
        // Both of a's tasks precede b's single task.
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_physics_chain_is_wired() {
        let world = world();
        assert!(world.init_physics());
        let systems = select(&world);
        let graph = FrameScheduler::build(&world, &systems, 1.0);
        // script + write(2) + read + solve
        assert_eq!(graph.len(), 5);
        // write(2) -> solve, solve -> read, read -> script
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.validate().is_ok());
    }
}
