//! # Reconciliation Engine
//!
//! Keeps every peer's view of the shared bodies convergent:
//!
//! - local writes to shared obstacles become outbound [`ObjectDeltaEvent`]s
//! - remote kinematic state is blended in over several ticks
//! - remote property changes are applied immediately
//! - periodic [`SnapshotEvent`]s cover a rotating window plus the fastest movers
//!
//! All network-driven writes go through [`SharedGuard`] so they are never
//! echoed back onto the wire.

use crate::config::{InterpolationConfig, SnapshotConfig};
use crate::error::{Result, SyncError};
use crate::physics::factory::ObstacleFactory;
use crate::physics::guard::SharedGuard;
use crate::physics::ids::{IdAllocator, ObjectId, INIT_OWNER};
use crate::physics::interpolator::{step_count, InterpolationTarget, KinematicState};
use crate::physics::obstacle::{BodyType, BoolConsts, FloatConsts, Obstacle, Vec2};
use crate::physics::world::ObstacleWorld;
use crate::protocol::event::{EventMeta, NetEvent, ObjectDeltaEvent, SnapshotEvent};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outbound traffic produced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsEvent {
    Snapshot(SnapshotEvent),
    ObjectDelta(ObjectDeltaEvent),
}

impl<A> From<PhysicsEvent> for NetEvent<A> {
    fn from(event: PhysicsEvent) -> Self {
        match event {
            PhysicsEvent::Snapshot(s) => NetEvent::Snapshot(s),
            PhysicsEvent::ObjectDelta(d) => NetEvent::ObjectDelta(d),
        }
    }
}

/// Counters describing interpolation activity since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpolationStats {
    pub started: u64,
    pub replaced: u64,
    pub completed: u64,
    pub total_steps: u64,
}

impl InterpolationStats {
    /// Mean planned step count per started interpolation
    pub fn average_steps(&self) -> f64 {
        if self.started == 0 {
            0.0
        } else {
            self.total_steps as f64 / self.started as f64
        }
    }
}

/// Called after a remotely created obstacle has been inserted
pub type CreateHook = Box<dyn FnMut(ObjectId, &Obstacle)>;

pub struct NetPhysicsController {
    interpolation: InterpolationConfig,
    snapshot: SnapshotConfig,
    factories: Vec<Box<dyn ObstacleFactory>>,
    targets: HashMap<ObjectId, InterpolationTarget>,
    ids: IdAllocator,
    init_ids: IdAllocator,
    cursor: usize,
    snapshot_capacity: usize,
    on_remote_create: Option<CreateHook>,
    outbound: Vec<PhysicsEvent>,
    stats: InterpolationStats,
}

impl NetPhysicsController {
    pub fn new(interpolation: InterpolationConfig, snapshot: SnapshotConfig) -> Self {
        Self {
            interpolation,
            snapshot,
            factories: Vec::new(),
            targets: HashMap::new(),
            ids: IdAllocator::new(INIT_OWNER),
            init_ids: IdAllocator::new(INIT_OWNER),
            cursor: 0,
            snapshot_capacity: usize::MAX,
            on_remote_create: None,
            outbound: Vec::new(),
            stats: InterpolationStats::default(),
        }
    }

    /// Caps every packed snapshot so its frame fits in `max_frame_bytes`
    pub fn with_snapshot_budget(mut self, max_frame_bytes: usize) -> Self {
        self.snapshot_capacity = SnapshotEvent::capacity_for(max_frame_bytes);
        self
    }

    /// Registers a factory and returns its id. Ids follow registration order.
    pub fn register_factory<F: ObstacleFactory + 'static>(&mut self, factory: F) -> u32 {
        self.factories.push(Box::new(factory));
        (self.factories.len() - 1) as u32
    }

    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }

    /// Binds locally created ids to this peer's short id
    pub fn set_owner(&mut self, short_id: u32) {
        if self.ids.owner() != short_id {
            self.ids.set_owner(short_id);
        }
    }

    pub fn set_on_remote_create<F>(&mut self, hook: F)
    where
        F: FnMut(ObjectId, &Obstacle) + 'static,
    {
        self.on_remote_create = Some(Box::new(hook));
    }

    fn build(&self, factory_id: u32, params: &[u8]) -> Result<Obstacle> {
        let factory = self
            .factories
            .get(factory_id as usize)
            .ok_or(SyncError::UnknownFactory(factory_id))?;
        factory.create(params)
    }

    /// Creates a shared obstacle owned by this peer and queues its `Create` delta
    pub fn create_shared<W: ObstacleWorld>(
        &mut self,
        world: &mut W,
        factory_id: u32,
        params: Vec<u8>,
    ) -> Result<ObjectId> {
        if self.ids.owner() == INIT_OWNER {
            return Err(SyncError::NoShortId);
        }

        let mut obstacle = self.build(factory_id, &params)?;
        obstacle.set_shared(true);

        let object_id = self.ids.next_id();
        if !world.insert(object_id, obstacle) {
            return Err(SyncError::DuplicateObject(object_id));
        }

        debug!(%object_id, factory_id, "Created shared obstacle");
        self.outbound
            .push(PhysicsEvent::ObjectDelta(ObjectDeltaEvent::Create {
                factory_id,
                object_id,
                params,
            }));
        Ok(object_id)
    }

    /// Creates a shared obstacle that every peer builds identically during
    /// scene setup. Nothing is sent; the ids agree because the call order does.
    pub fn create_init<W: ObstacleWorld>(
        &mut self,
        world: &mut W,
        factory_id: u32,
        params: &[u8],
    ) -> Result<ObjectId> {
        let mut obstacle = self.build(factory_id, params)?;
        obstacle.set_shared(true);

        let object_id = self.init_ids.next_id();
        if !world.insert(object_id, obstacle) {
            return Err(SyncError::DuplicateObject(object_id));
        }
        Ok(object_id)
    }

    /// Removes a shared obstacle locally and queues its `Delete` delta
    pub fn delete_shared<W: ObstacleWorld>(&mut self, world: &mut W, object_id: ObjectId) -> Result<Obstacle> {
        let obstacle = world
            .remove(object_id)
            .ok_or(SyncError::UnknownObject(object_id))?;
        self.targets.remove(&object_id);
        self.outbound
            .push(PhysicsEvent::ObjectDelta(ObjectDeltaEvent::Delete { object_id }));
        Ok(obstacle)
    }

    /// Applies one remote delta. Returns `false` when the delta was ignored.
    pub fn handle_delta<W: ObstacleWorld>(
        &mut self,
        world: &mut W,
        delta: ObjectDeltaEvent,
        meta: &EventMeta,
    ) -> bool {
        match delta {
            ObjectDeltaEvent::Create {
                factory_id,
                object_id,
                params,
            } => self.apply_create(world, factory_id, object_id, &params),
            ObjectDeltaEvent::Delete { object_id } => {
                self.targets.remove(&object_id);
                world.remove(object_id).is_some()
            }
            ObjectDeltaEvent::BodyType {
                object_id,
                body_type,
            } => match BodyType::from_code(body_type) {
                Some(body_type) => {
                    self.apply_property(world, object_id, |body| body.set_body_type(body_type))
                }
                None => {
                    warn!(%object_id, body_type, "Ignoring unknown body type");
                    false
                }
            },
            ObjectDeltaEvent::BoolConsts { object_id, values } => {
                self.apply_property(world, object_id, |body| {
                    body.set_bool_consts(BoolConsts::from_array(values))
                })
            }
            ObjectDeltaEvent::FloatConsts { object_id, values } => {
                self.apply_property(world, object_id, |body| {
                    body.set_float_consts(FloatConsts::from_array(values))
                })
            }
            ObjectDeltaEvent::Position { object_id, x, y } => {
                self.schedule(world, object_id, meta, |end| end.position = Vec2::new(x, y))
            }
            ObjectDeltaEvent::Velocity { object_id, vx, vy } => {
                self.schedule(world, object_id, meta, |end| end.velocity = Vec2::new(vx, vy))
            }
            ObjectDeltaEvent::Angle { object_id, angle } => {
                self.schedule(world, object_id, meta, |end| end.angle = angle)
            }
            ObjectDeltaEvent::AngularVelocity {
                object_id,
                angular_velocity,
            } => self.schedule(world, object_id, meta, |end| {
                end.angular_velocity = angular_velocity
            }),
        }
    }

    /// Schedules every entry of a remote snapshot. Returns how many were accepted.
    pub fn handle_snapshot<W: ObstacleWorld>(
        &mut self,
        world: &mut W,
        snapshot: &SnapshotEvent,
        meta: &EventMeta,
    ) -> usize {
        snapshot
            .entries()
            .iter()
            .filter(|entry| {
                self.schedule(world, entry.object_id, meta, |end| {
                    *end = KinematicState {
                        position: Vec2::new(entry.x, entry.y),
                        velocity: Vec2::new(entry.vx, entry.vy),
                        angle: entry.angle,
                        angular_velocity: entry.angular_velocity,
                    }
                })
            })
            .count()
    }

    fn apply_create<W: ObstacleWorld>(
        &mut self,
        world: &mut W,
        factory_id: u32,
        object_id: ObjectId,
        params: &[u8],
    ) -> bool {
        if world.contains(object_id) {
            debug!(%object_id, "Ignoring duplicate create");
            return false;
        }

        let mut obstacle = match self.build(factory_id, params) {
            Ok(obstacle) => obstacle,
            Err(e) => {
                warn!(%object_id, factory_id, error = %e, "Ignoring remote create");
                return false;
            }
        };
        obstacle.set_shared(true);

        if !world.insert(object_id, obstacle) {
            return false;
        }
        if let (Some(hook), Some(obstacle)) = (self.on_remote_create.as_mut(), world.get(object_id)) {
            hook(object_id, obstacle);
        }
        true
    }

    fn apply_property<W, F>(&mut self, world: &mut W, object_id: ObjectId, write: F) -> bool
    where
        W: ObstacleWorld,
        F: FnOnce(&mut Obstacle),
    {
        match world.get_mut(object_id) {
            Some(obstacle) if obstacle.is_shared() => {
                let mut body = SharedGuard::new(obstacle);
                write(&mut *body);
                true
            }
            _ => false,
        }
    }

    /// Installs or replaces the interpolation target of one object.
    ///
    /// `merge` writes the remote channels into the end state, which starts
    /// from the in-flight target if there is one.
    fn schedule<W, F>(&mut self, world: &W, object_id: ObjectId, meta: &EventMeta, merge: F) -> bool
    where
        W: ObstacleWorld,
        F: FnOnce(&mut KinematicState),
    {
        if meta.is_local() {
            return false;
        }
        let current = match world.get(object_id) {
            Some(obstacle) if obstacle.is_shared() => KinematicState::of(obstacle),
            _ => return false,
        };

        let previous = self.targets.get(&object_id);
        let mut end = previous.map_or(current, |t| t.end);
        merge(&mut end);

        if previous.is_some_and(|t| t.end == end) {
            return true;
        }
        if end == current {
            self.targets.remove(&object_id);
            return true;
        }

        let total = step_count(&self.interpolation, &current, &end);
        let mut target = InterpolationTarget::new(end, total);
        if let Some(previous) = self.targets.remove(&object_id) {
            target.inherit(&previous);
            self.stats.replaced += 1;
        }
        self.stats.started += 1;
        self.stats.total_steps += u64::from(total);
        self.targets.insert(object_id, target);
        true
    }

    /// One fixed tick: drain local writes into deltas, then advance every
    /// in-flight interpolation.
    pub fn fixed_update<W: ObstacleWorld>(&mut self, world: &mut W) {
        for object_id in world.ids() {
            let Some(obstacle) = world.get_mut(object_id) else {
                continue;
            };
            if !obstacle.is_shared() || !obstacle.has_changes() {
                continue;
            }
            for change in obstacle.take_changes() {
                self.outbound.push(PhysicsEvent::ObjectDelta(ObjectDeltaEvent::from_change(
                    object_id, change,
                )));
            }
        }

        let mut finished = Vec::new();
        for (object_id, target) in self.targets.iter_mut() {
            match world.get_mut(*object_id) {
                Some(obstacle) => {
                    if target.advance(obstacle) {
                        finished.push(*object_id);
                    }
                }
                None => finished.push(*object_id),
            }
        }
        for object_id in finished {
            if self.targets.remove(&object_id).is_some_and(|t| t.steps_left() == 0) {
                self.stats.completed += 1;
            }
        }
    }

    /// Builds the next snapshot: a rotating window over the shared objects
    /// plus the fastest movers.
    ///
    /// When the frame budget cannot hold both, the fast movers keep their
    /// places and the window shrinks.
    pub fn pack_snapshot<W: ObstacleWorld>(&mut self, world: &W) -> SnapshotEvent {
        let shared: Vec<(ObjectId, &Obstacle)> = world
            .ids()
            .into_iter()
            .filter_map(|id| world.get(id).filter(|o| o.is_shared()).map(|o| (id, o)))
            .collect();

        let mut snapshot = SnapshotEvent::new();
        if shared.is_empty() {
            return snapshot;
        }

        let fast = self.snapshot.fast_objects.min(self.snapshot_capacity);
        let window = self
            .snapshot
            .rotation_window
            .min(self.snapshot_capacity - fast)
            .min(shared.len());
        let start = self.cursor % shared.len();
        for i in 0..window {
            let (id, obstacle) = shared[(start + i) % shared.len()];
            snapshot.add_obstacle(id, obstacle);
        }
        self.cursor = (start + window) % shared.len();

        let mut by_speed: Vec<&(ObjectId, &Obstacle)> = shared.iter().collect();
        by_speed.sort_by(|a, b| {
            b.1.linear_velocity()
                .length()
                .total_cmp(&a.1.linear_velocity().length())
        });
        for (id, obstacle) in by_speed.into_iter().take(fast) {
            snapshot.add_obstacle(*id, obstacle);
        }

        snapshot
    }

    /// Takes the deltas and snapshots produced since the last call
    pub fn take_outbound(&mut self) -> Vec<PhysicsEvent> {
        std::mem::take(&mut self.outbound)
    }

    pub fn target(&self, object_id: ObjectId) -> Option<&InterpolationTarget> {
        self.targets.get(&object_id)
    }

    pub fn active_interpolations(&self) -> usize {
        self.targets.len()
    }

    pub fn stats(&self) -> InterpolationStats {
        self.stats
    }

    /// Drops all in-flight interpolations, queued output and statistics
    pub fn reset(&mut self) {
        self.targets.clear();
        self.outbound.clear();
        self.stats = InterpolationStats::default();
        self.cursor = 0;
    }

    /// Restarts init ids so a rebuilt scene numbers its obstacles like a
    /// fresh peer does
    pub fn reset_init_ids(&mut self) {
        self.init_ids.reset();
    }
}
