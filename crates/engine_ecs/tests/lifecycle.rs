//! Entity and world lifecycle: spawn/destroy, merge, hooks.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use engine_component::{Component, ComponentTypeId};
use engine_ecs::{
    ChildEntity, EngineConfig, EngineContext, Entity, EntityBehavior, NetworkBridge,
    NetworkIdentity, PhysicsSolver, RigidBodyDynamic, Script, ScriptComponent, SystemError, World,
};
use parking_lot::Mutex;

struct Foo;

impl Component for Foo {
    fn type_name() -> &'static str {
        "Foo"
    }
}

struct SelfFoo;

impl Component for SelfFoo {
    fn type_name() -> &'static str {
        "SelfFoo"
    }

    fn alternate_types() -> Vec<ComponentTypeId> {
        vec![Self::component_type_id()]
    }
}

struct Collider;

impl Component for Collider {
    fn type_name() -> &'static str {
        "Collider"
    }
}

struct SphereCollider;

impl Component for SphereCollider {
    fn type_name() -> &'static str {
        "SphereCollider"
    }

    fn alternate_types() -> Vec<ComponentTypeId> {
        vec![Collider::component_type_id()]
    }
}

fn context() -> EngineContext {
    EngineContext::new(EngineConfig {
        worker_threads: Some(2),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn world() -> Arc<World> {
    World::new(Arc::new(context()))
}

#[test]
fn test_spawn_and_destroy_are_idempotent() {
    let world = world();
    let e = Entity::new();
    assert!(world.spawn(&e));
    assert!(!world.spawn(&e));
    assert_eq!(world.entity_count(), 1);

    assert!(world.destroy(&e));
    assert!(!world.destroy(&e));
    assert_eq!(world.entity_count(), 0);

    // Destroyed entities may be spawned again.
    assert!(world.spawn(&e));
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn test_exact_and_subclass_queries_after_spawn() {
    let world = world();
    let e1 = Entity::new();
    let foo = e1.emplace_component(Foo);
    let self_foo = e1.emplace_component(SelfFoo);
    world.spawn(&e1);

    let exact = world.get_all_components_of_type::<Foo>();
    assert_eq!(exact.len(), 1);
    assert!(Arc::ptr_eq(&exact[0], &foo));
    assert!(!world.components().has_component_of_subclass::<Foo>());
    assert!(world.get_all_components_of_subclass::<Foo>().is_empty());

    let subclass = world.get_all_components_of_subclass::<SelfFoo>();
    assert_eq!(subclass.len(), 1);
    assert!(subclass[0].wraps(&self_foo));
    assert!(world.components().has_component_of_subclass::<SelfFoo>());
}

#[test]
fn test_world_store_symmetry() {
    let world = world();
    let e = Entity::new();
    let sphere = e.emplace_component(SphereCollider);
    world.spawn(&e);

    let bases = world.components().get_all_of_subclass_id(Collider::component_type_id());
    assert_eq!(bases.len(), 1);
    assert!(bases[0].wraps(&sphere));

    e.remove_component(&sphere);
    assert!(!world.components().has_component_of_subclass::<Collider>());
    assert!(world.get_all_components_of_type::<SphereCollider>().is_empty());
    assert!(world.components().is_empty());
}

#[test]
fn test_merge_unmerge_restore_world_buckets() {
    let world = world();
    let resident = Entity::new();
    resident.emplace_component(Foo);
    resident.emplace_component(SphereCollider);
    world.spawn(&resident);

    let keys = |world: &World| -> (HashSet<ComponentTypeId>, HashSet<usize>) {
        let types = world.components().type_ids().into_iter().collect();
        let cells = world.components().cells().iter().map(|c| c.key()).collect();
        (types, cells)
    };
    let before = keys(&world);

    let visitor = Entity::new();
    visitor.emplace_component(Foo);
    visitor.emplace_component(SelfFoo);
    world.spawn(&visitor);
    assert_ne!(keys(&world), before);
    world.destroy(&visitor);

    assert_eq!(keys(&world), before);
}

#[test]
fn test_start_runs_before_merge() {
    struct Probe(Arc<Mutex<Option<(bool, usize)>>>);

    impl EntityBehavior for Probe {
        fn start(&self, entity: &Arc<Entity>) {
            let world = entity.world();
            let merged = world
                .as_ref()
                .map_or(0, |w| w.get_all_components_of_type::<Foo>().len());
            *self.0.lock() = Some((world.is_some(), merged));
        }
    }

    let seen = Arc::new(Mutex::new(None));
    let world = world();
    let e = Entity::with_behavior(Probe(Arc::clone(&seen)));
    e.emplace_component(Foo);
    world.spawn(&e);

    // The world back-reference is set, the components are not merged yet.
    assert_eq!(*seen.lock(), Some((true, 0)));
    assert_eq!(world.get_all_components_of_type::<Foo>().len(), 1);
}

#[test]
fn test_stop_runs_once_per_destroy() {
    #[derive(Default)]
    struct Count {
        start: AtomicUsize,
        stop: AtomicUsize,
    }

    struct Counted(Arc<Count>);

    impl EntityBehavior for Counted {
        fn start(&self, _entity: &Arc<Entity>) {
            self.0.start.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self, _entity: &Arc<Entity>) {
            self.0.stop.fetch_add(1, Ordering::SeqCst);
        }
    }

    let count = Arc::new(Count::default());
    let world = world();
    let e = Entity::with_behavior(Counted(Arc::clone(&count)));
    world.spawn(&e);
    world.spawn(&e);
    world.destroy(&e);
    world.destroy(&e);
    assert_eq!(count.start.load(Ordering::SeqCst), 1);
    assert_eq!(count.stop.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct Lifecycle {
    started: AtomicUsize,
    stopped: AtomicUsize,
}

struct Tracked(Arc<Lifecycle>);

impl Script for Tracked {
    fn start(&self, _entity: &Arc<Entity>) {
        self.0.started.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self, _entity: &Arc<Entity>) {
        self.0.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn tick(&self, _entity: &Arc<Entity>, _scale: f32) -> Result<(), SystemError> {
        Ok(())
    }
}

#[test]
fn test_script_hooks_fire_once_per_transition() {
    let lifecycle = Arc::new(Lifecycle::default());
    let world = world();
    let e = Entity::new();
    let script = e.emplace_component(ScriptComponent::new(Tracked(Arc::clone(&lifecycle))));

    // Not spawned: no world hook.
    assert_eq!(lifecycle.started.load(Ordering::SeqCst), 0);

    world.spawn(&e);
    world.spawn(&e);
    assert_eq!(lifecycle.started.load(Ordering::SeqCst), 1);

    // Removing from a spawned entity stops it; re-adding starts it again.
    e.remove_component(&script);
    assert_eq!(lifecycle.stopped.load(Ordering::SeqCst), 1);
    e.add_component(Arc::clone(&script));
    assert_eq!(lifecycle.started.load(Ordering::SeqCst), 2);

    world.destroy(&e);
    world.destroy(&e);
    assert_eq!(lifecycle.stopped.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct CountingSolver {
    spawned: AtomicUsize,
    destroyed: AtomicUsize,
}

impl PhysicsSolver for CountingSolver {
    fn spawn(&self, _entity: &Arc<Entity>) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self, _entity: &Arc<Entity>) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn tick(&self, _scale: f32) {}
}

#[test]
fn test_physics_bodies_reach_solver() {
    let solver = Arc::new(CountingSolver::default());
    let world = World::builder(Arc::new(context()))
        .solver(Arc::clone(&solver) as Arc<dyn PhysicsSolver>)
        .build();

    let e = Entity::new();
    e.emplace_component(RigidBodyDynamic { mass: 2.0 });
    e.emplace_component(Foo);
    world.spawn(&e);
    world.spawn(&e);
    assert_eq!(solver.spawned.load(Ordering::SeqCst), 1);

    world.destroy(&e);
    assert_eq!(solver.destroyed.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct RecordingBridge {
    events: Mutex<Vec<(&'static str, uuid::Uuid)>>,
}

impl NetworkBridge for RecordingBridge {
    fn spawn(&self, _entity: &Arc<Entity>, identity: &NetworkIdentity) {
        self.events.lock().push(("spawn", identity.network_id()));
    }

    fn destroy(&self, _entity: &Arc<Entity>, identity: &NetworkIdentity) {
        self.events.lock().push(("destroy", identity.network_id()));
    }
}

#[test]
fn test_network_identities_notify_bridge() {
    let bridge = Arc::new(RecordingBridge::default());
    let ctx = context().with_network(Arc::clone(&bridge) as Arc<dyn NetworkBridge>);
    let world = World::new(Arc::new(ctx));

    let loud = Entity::new();
    let identity = loud.emplace_component(NetworkIdentity::new());
    let quiet = Entity::new();
    quiet.emplace_component(NetworkIdentity::new().silent());

    world.spawn(&loud);
    world.spawn(&quiet);
    world.destroy(&loud);
    world.destroy(&quiet);

    let events = bridge.events.lock().clone();
    assert_eq!(
        events,
        vec![
            ("spawn", identity.network_id()),
            ("destroy", identity.network_id())
        ]
    );
}

#[test]
fn test_children_follow_parent() {
    let world = world();
    let parent = Entity::new();
    let child = Entity::new();
    let grandchild = Entity::new();
    child.emplace_component(ChildEntity::new(Arc::clone(&grandchild)));
    parent.emplace_component(ChildEntity::new(Arc::clone(&child)));

    world.spawn(&parent);
    assert_eq!(world.entity_count(), 3);
    assert!(world.contains(&grandchild));

    world.destroy(&parent);
    assert_eq!(world.entity_count(), 0);
    assert!(!child.is_in_world());
    assert!(!grandchild.is_in_world());
}

#[test]
fn test_child_attached_after_spawn() {
    let world = world();
    let parent = Entity::new();
    world.spawn(&parent);

    let child = Entity::new();
    let link = parent.emplace_component(ChildEntity::new(Arc::clone(&child)));
    assert!(world.contains(&child));

    parent.remove_component(&link);
    assert!(!world.contains(&child));
}

#[test]
fn test_concurrent_spawns_register_each_entity_once() {
    let world = world();
    let entities: Vec<_> = (0..64)
        .map(|_| {
            let e = Entity::new();
            e.emplace_component(Foo);
            e
        })
        .collect();
    let spawned = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for e in &entities {
                    if world.spawn(e) {
                        spawned.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(spawned.load(Ordering::SeqCst), 64);
    assert_eq!(world.entity_count(), 64);
    assert_eq!(world.get_all_components_of_type::<Foo>().len(), 64);
}
