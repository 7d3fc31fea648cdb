//! Demo scene: bouncing rigid bodies, drifting kinematic props, a bobbing
//! script and a periodic statistics reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use engine_component::{Component, ComponentTypeId};
use engine_ecs::{
    ChildEntity, Entity, EntityId, NetworkBridge, NetworkIdentity, PhysicsSolver,
    RigidBodyDynamic, RigidBodyStatic, Script, ScriptComponent, ScriptSystem, System,
    SystemError, SystemId, World, WorldHooks,
};
use engine_math::{Motion, Transform, Transform3D, Vec3, Velocity};
use parking_lot::Mutex;
use tracing::{debug, info};

const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);
const RESTITUTION: f32 = 0.8;

#[derive(Debug, Clone, Copy)]
struct Body {
    transform: Transform3D,
    motion: Motion,
}

/// A point-mass solver: gravity plus an elastic floor at `y = 0`.
#[derive(Debug, Default)]
pub struct KinematicSolver {
    bodies: DashMap<EntityId, Body>,
}

impl KinematicSolver {
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl PhysicsSolver for KinematicSolver {
    fn spawn(&self, entity: &Arc<Entity>) {
        // Static bodies only collide; the floor is implicit.
        if !entity.has_component_of_type::<RigidBodyDynamic>() {
            return;
        }
        let transform = entity
            .get_component::<Transform>()
            .map(|t| t.get())
            .unwrap_or_default();
        let motion = entity
            .get_component::<Velocity>()
            .map(|v| v.get())
            .unwrap_or_default();
        self.bodies.insert(entity.id(), Body { transform, motion });
    }

    fn destroy(&self, entity: &Arc<Entity>) {
        self.bodies.remove(&entity.id());
    }

    fn write_entity(&self, entity: &Arc<Entity>) {
        if let Some(mut body) = self.bodies.get_mut(&entity.id()) {
            if let Ok(transform) = entity.get_component::<Transform>() {
                body.transform = transform.get();
            }
            if let Ok(velocity) = entity.get_component::<Velocity>() {
                body.motion = velocity.get();
            }
        }
    }

    fn read_entity(&self, entity: &Arc<Entity>) {
        if let Some(body) = self.bodies.get(&entity.id()) {
            if let Ok(transform) = entity.get_component::<Transform>() {
                transform.set(body.transform);
            }
            if let Ok(velocity) = entity.get_component::<Velocity>() {
                velocity.set(body.motion);
            }
        }
    }

    fn tick(&self, scale: f32) {
        for mut body in self.bodies.iter_mut() {
            let body = body.value_mut();
            body.motion.linear += GRAVITY * scale;
            body.transform = body.motion.integrate(body.transform, scale);
            if body.transform.position.y < 0.0 {
                body.transform.position.y = -body.transform.position.y;
                body.motion.linear.y = -body.motion.linear.y * RESTITUTION;
            }
        }
    }
}

/// Moves entities with a [`Velocity`] that the solver does not own.
#[derive(Debug, Default)]
pub struct DriftSystem;

impl System for DriftSystem {
    fn name(&self) -> &str {
        "DriftSystem"
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        vec![Velocity::component_type_id()]
    }

    fn must_run_before(&self) -> Vec<SystemId> {
        vec![SystemId::of::<ScriptSystem>()]
    }

    fn tick(&self, scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        if entity.has_component_of_type::<RigidBodyDynamic>() {
            return Ok(());
        }
        let motion = entity.get_component::<Velocity>()?.get();
        entity
            .get_component::<Transform>()?
            .update(|t| *t = motion.integrate(*t, scale));
        Ok(())
    }
}

/// Oscillates its entity's scale.
#[derive(Debug)]
pub struct Bobber {
    phase: Mutex<f32>,
    speed: f32,
}

impl Bobber {
    #[must_use]
    pub fn new(speed: f32) -> Self {
        Self {
            phase: Mutex::new(0.0),
            speed,
        }
    }
}

impl Script for Bobber {
    fn start(&self, entity: &Arc<Entity>) {
        debug!(entity = %entity.id(), "bobber started");
    }

    fn tick(&self, entity: &Arc<Entity>, scale: f32) -> Result<(), SystemError> {
        let phase = {
            let mut phase = self.phase.lock();
            *phase += scale * self.speed;
            *phase
        };
        let factor = 1.0 + 0.25 * phase.sin();
        entity
            .get_component::<Transform>()?
            .update(|t| t.scale = Vec3::splat(factor));
        Ok(())
    }
}

/// Accumulates scene statistics when its timed system fires.
#[derive(Debug, Default)]
pub struct Stats {
    samples: AtomicU64,
    height_milli: AtomicU64,
}

impl Stats {
    /// Take the accumulated sample count and mean height.
    pub fn take(&self) -> Option<(u64, f64)> {
        let samples = self.samples.swap(0, Ordering::AcqRel);
        let height = self.height_milli.swap(0, Ordering::AcqRel);
        (samples > 0).then(|| (samples, height as f64 / 1000.0 / samples as f64))
    }
}

/// Samples every transform; registered as a timed system.
#[derive(Debug)]
pub struct StatsSystem {
    stats: Arc<Stats>,
}

impl StatsSystem {
    #[must_use]
    pub fn new(stats: Arc<Stats>) -> Self {
        Self { stats }
    }
}

impl System for StatsSystem {
    fn name(&self) -> &str {
        "StatsSystem"
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        vec![Transform::component_type_id()]
    }

    fn must_run_after(&self) -> Vec<SystemId> {
        vec![SystemId::of::<DriftSystem>()]
    }

    fn tick(&self, _scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        let height = entity.get_component::<Transform>()?.get().position.y.max(0.0);
        self.stats.samples.fetch_add(1, Ordering::Relaxed);
        self.stats
            .height_milli
            .fetch_add((height * 1000.0) as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Logs a statistics line after every tick the reporter ran in.
pub struct StatsHooks {
    stats: Arc<Stats>,
}

impl StatsHooks {
    #[must_use]
    pub fn new(stats: Arc<Stats>) -> Self {
        Self { stats }
    }
}

impl WorldHooks for StatsHooks {
    fn posttick(&self, world: &World, _scale: f32) {
        if let Some((samples, mean_height)) = self.stats.take() {
            info!(
                tick = world.tick_count(),
                entities = world.entity_count(),
                samples,
                mean_height,
                "scene stats"
            );
        }
    }
}

/// Logs replication events instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct LogBridge;

impl NetworkBridge for LogBridge {
    fn spawn(&self, entity: &Arc<Entity>, identity: &NetworkIdentity) {
        debug!(entity = %entity.id(), network_id = %identity.network_id(), "replicate spawn");
    }

    fn destroy(&self, entity: &Arc<Entity>, identity: &NetworkIdentity) {
        debug!(entity = %entity.id(), network_id = %identity.network_id(), "replicate destroy");
    }
}

/// Register the demo systems. The reporter runs every `report_interval`.
pub fn register_systems(world: &World, stats: Arc<Stats>, report_interval: Duration) {
    world.register_system(Arc::new(DriftSystem));
    world.register_timed_system(Arc::new(StatsSystem::new(stats)), report_interval);
}

/// Spawn `count` entities laid out on a grid.
///
/// Even entities are rigid bodies dropped from a height, odd ones drift
/// sideways. Every fourth carries a bobbing script and a child marker, and
/// every eighth is replicated over the network bridge.
pub fn populate(world: &World, count: usize) -> Vec<Arc<Entity>> {
    let side = (count as f32).sqrt().ceil().max(1.0) as usize;
    let floor = Entity::new();
    floor.emplace_component(Transform::default());
    floor.emplace_component(RigidBodyStatic);
    world.spawn(&floor);

    let mut spawned = Vec::with_capacity(count);
    for i in 0..count {
        let (x, z) = ((i % side) as f32, (i / side) as f32);
        let e = Entity::new();
        if i % 2 == 0 {
            e.emplace_component(Transform::new(Transform3D::from_position(Vec3::new(
                x,
                5.0 + (i % 7) as f32,
                z,
            ))));
            e.emplace_component(Velocity::default());
            e.emplace_component(RigidBodyDynamic { mass: 1.0 + (i % 3) as f32 });
        } else {
            e.emplace_component(Transform::new(Transform3D::from_position(Vec3::new(
                x, 1.0, z,
            ))));
            e.emplace_component(Velocity::new(Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)));
        }
        if i % 4 == 0 {
            e.emplace_component(ScriptComponent::new(Bobber::new(2.0)));
            let marker = Entity::new();
            marker.emplace_component(Transform::default());
            e.emplace_component(ChildEntity::new(marker));
        }
        if i % 8 == 0 {
            e.emplace_component(NetworkIdentity::new());
        }
        world.spawn(&e);
        spawned.push(e);
    }

    info!(
        requested = count,
        spawned = world.entity_count(),
        "scene populated"
    );
    spawned
}

#[cfg(test)]
mod tests {
    use engine_ecs::{EngineConfig, EngineContext};

    use super::*;

    fn world(solver: Arc<KinematicSolver>, stats: Arc<Stats>) -> Arc<World> {
        let ctx = EngineContext::new(EngineConfig {
            worker_threads: Some(2),
            ..EngineConfig::default()
        })
        .unwrap();
        World::builder(Arc::new(ctx))
            .solver(solver)
            .hooks(StatsHooks::new(stats))
            .render_type::<Transform>()
            .build()
    }

    #[test]
    fn test_populate_spawns_children_and_bodies() {
        let solver = Arc::new(KinematicSolver::default());
        let world = world(Arc::clone(&solver), Arc::default());
        let spawned = populate(&world, 8);

        assert_eq!(spawned.len(), 8);
        // floor + 8 + two child markers
        assert_eq!(world.entity_count(), 11);
        // only the four dynamic bodies are simulated
        assert_eq!(solver.body_count(), 4);
    }

    #[test]
    fn test_bodies_fall_and_stay_above_floor() {
        let solver = Arc::new(KinematicSolver::default());
        let world = world(Arc::clone(&solver), Arc::default());
        assert!(world.init_physics());
        let spawned = populate(&world, 2);
        let body = &spawned[0];
        let start = body.get_component::<Transform>().unwrap().get().position.y;

        for _ in 0..10 {
            world.tick(1.0 / 60.0).unwrap();
        }
        let y = body.get_component::<Transform>().unwrap().get().position.y;
        assert!(y < start);
        assert!(y >= 0.0);

        for _ in 0..600 {
            world.tick(1.0 / 60.0).unwrap();
        }
        assert!(body.get_component::<Transform>().unwrap().get().position.y >= 0.0);
    }

    #[test]
    fn test_drift_moves_non_bodies_only() {
        let world = world(Arc::default(), Arc::default());
        register_systems(&world, Arc::default(), Duration::from_secs(1));
        let spawned = populate(&world, 2);
        let body_x = spawned[0].get_component::<Transform>().unwrap().get().position.x;
        let prop_x = spawned[1].get_component::<Transform>().unwrap().get().position.x;

        world.tick(1.0).unwrap();
        // Physics is not initialised, so the body stays put.
        let body = spawned[0].get_component::<Transform>().unwrap().get();
        let prop = spawned[1].get_component::<Transform>().unwrap().get();
        assert_eq!(body.position.x, body_x);
        assert!((prop.position.x - (prop_x + 0.5)).abs() < 1e-5);
    }

    #[test]
    fn test_stats_sampled_on_first_tick_then_throttled() {
        let stats = Arc::new(Stats::default());
        let world = world(Arc::default(), Arc::default());
        register_systems(&world, Arc::clone(&stats), Duration::from_secs(3600));
        populate(&world, 4);
        assert!(stats.take().is_none());

        world.tick(1.0 / 60.0).unwrap();
        let (samples, mean) = stats.take().unwrap();
        // floor + 4 + one child marker
        assert_eq!(samples, 6);
        assert!(mean >= 0.0);

        world.tick(1.0 / 60.0).unwrap();
        assert!(stats.take().is_none());
    }

    #[test]
    fn test_bobber_scales_transform() {
        let world = world(Arc::default(), Arc::default());
        let e = Entity::new();
        e.emplace_component(Transform::default());
        e.emplace_component(ScriptComponent::new(Bobber::new(std::f32::consts::PI)));
        world.spawn(&e);
        // Half a second at pi rad/s lands on sin(pi/2) = 1.
        world.tick(0.5).unwrap();
        let scale = e.get_component::<Transform>().unwrap().get().scale;
        assert!((scale.x - 1.25).abs() < 1e-4);
        assert!(world.take_new_frame());
    }
}
