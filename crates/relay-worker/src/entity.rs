use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec3};
use relay_buffer::RecordStore;
use relay_core::constants::POSE_EPSILON;
use relay_core::math::vec3_approx_eq;
use relay_core::{
    BodyChanges, BodyId, BodyOptions, BodyType, BodyUpdate, ConstraintId, ConstraintOptions, Pose,
    CoreError, ShapeDesc, ShapeGeometry, ShapeKind, ShapeOptions, ShapesId,
};
use relay_engine::{BodyDesc, BodyHandle, ConstraintHandle, PhysicsEngine, ShapeHandle, Velocity};
use tracing::{debug, warn};

use crate::allocator::SlotAllocator;
use crate::collision::CollisionTracker;
use crate::error::{WorkerError, WorkerResult};

/// Progress of a body that starts out dynamic towards physics control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSync {
    /// Write-back skipped so far on this many ticks.
    Waiting {
        /// Number of ticks skipped so far.
        skipped: u32,
    },
    /// Physics drives the body (or never needed to wait).
    Done,
}

#[derive(Debug, Clone)]
struct AttachedShapes {
    /// Unscaled; rescaled whenever the body scale changes.
    desc: ShapeDesc,
    handle: ShapeHandle,
}

#[derive(Debug, Clone, Copy)]
struct ConstraintLink {
    handle: ConstraintHandle,
    body: BodyId,
    target: BodyId,
}

/// One live body: its slot, engine handle, options, and attached shapes.
#[derive(Debug, Clone)]
pub struct Entity {
    id: BodyId,
    slot: usize,
    handle: BodyHandle,
    options: BodyOptions,
    scale: Vec3,
    shapes: BTreeMap<ShapesId, AttachedShapes>,
    sync: InitialSync,
}

impl Entity {
    /// Host identifier.
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Buffer slot.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Engine handle.
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    /// Current options.
    pub fn options(&self) -> &BodyOptions {
        &self.options
    }

    /// Scale taken from the host matrix.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Number of attached shape batches.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Initial-sync progress.
    pub fn sync(&self) -> InitialSync {
        self.sync
    }
}

/// Counts from one write-back pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteBack {
    /// Dynamic bodies read from the engine.
    pub from_physics: usize,
    /// Static and kinematic bodies pushed into the engine.
    pub to_physics: usize,
    /// Bodies still waiting for their first host pose.
    pub waiting: usize,
    /// Bodies re-seated after their wait.
    pub reset: usize,
}

/// Owns the engine and every body, shape, and constraint handle in it.
///
/// The rest of the worker refers to bodies by [`BodyId`] or slot only.
#[derive(Debug)]
pub struct EntityManager<E> {
    engine: E,
    allocator: SlotAllocator,
    entities: HashMap<BodyId, Entity>,
    slots_by_handle: HashMap<BodyHandle, usize>,
    constraints: HashMap<ConstraintId, ConstraintLink>,
}

impl<E: PhysicsEngine> EntityManager<E> {
    /// A manager with room for `capacity` bodies.
    pub fn new(engine: E, capacity: usize) -> Self {
        Self {
            engine,
            allocator: SlotAllocator::new(capacity),
            entities: HashMap::new(),
            slots_by_handle: HashMap::new(),
            constraints: HashMap::new(),
        }
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The engine, mutably.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// A live body.
    pub fn get(&self, id: BodyId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: BodyId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Slot of a live body.
    pub fn slot_of(&self, id: BodyId) -> Option<usize> {
        self.allocator.slot_of(id)
    }

    /// Slot of the body behind an engine handle.
    pub fn slot_for_handle(&self, handle: BodyHandle) -> Option<usize> {
        self.slots_by_handle.get(&handle).copied()
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no body is live.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Body capacity.
    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    /// Number of live constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Create a body at `matrix` and bind it to a slot.
    pub fn create(&mut self, id: BodyId, matrix: &Mat4, options: BodyOptions) -> WorkerResult<usize> {
        let (pose, scale) = pose_from_matrix(matrix)
            .ok_or_else(|| CoreError::MalformedTransform("degenerate matrix".into()))?;
        let slot = self.allocator.allocate(id)?;
        let handle = match self.engine.add_body(&BodyDesc {
            pose,
            options: options.clone(),
        }) {
            Ok(handle) => handle,
            Err(e) => {
                self.allocator.release(id)?;
                return Err(e.into());
            }
        };
        let sync = if options.body_type == BodyType::Dynamic {
            InitialSync::Waiting { skipped: 0 }
        } else {
            InitialSync::Done
        };
        self.slots_by_handle.insert(handle, slot);
        self.entities.insert(
            id,
            Entity {
                id,
                slot,
                handle,
                options,
                scale,
                shapes: BTreeMap::new(),
                sync,
            },
        );
        Ok(slot)
    }

    /// Destroy a body with everything attached to it. Returns its freed slot.
    pub fn destroy(&mut self, id: BodyId) -> WorkerResult<usize> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(WorkerError::UnknownIdentifier(id))?;

        let engine = &mut self.engine;
        self.constraints.retain(|_, link| {
            let touches = link.body == id || link.target == id;
            if touches {
                engine.remove_constraint(link.handle);
            }
            !touches
        });
        for shapes in entity.shapes.values() {
            self.engine.remove_shape(entity.handle, shapes.handle);
        }
        self.engine.remove_body(entity.handle);
        self.slots_by_handle.remove(&entity.handle);
        self.allocator.release(id)
    }

    /// Apply a partial update; only changed property groups reach the engine.
    /// The body is woken afterwards either way.
    pub fn update(&mut self, id: BodyId, update: &BodyUpdate) -> WorkerResult<BodyChanges> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorkerError::UnknownIdentifier(id))?;
        let changes = entity.options.apply(update);
        let (h, o) = (entity.handle, &entity.options);

        if changes.collision_flags {
            self.engine.set_body_type(h, o.body_type, o.disable_collision);
        }
        if changes.activation_state {
            self.engine.set_activation_state(h, o.activation_state);
        }
        if changes.collision_filter {
            self.engine
                .set_collision_filter(h, o.collision_filter_group, o.collision_filter_mask);
        }
        if changes.damping {
            self.engine.set_damping(h, o.linear_damping, o.angular_damping);
        }
        if changes.gravity {
            let gravity = o.gravity.unwrap_or_else(|| self.engine.world_gravity());
            self.engine.set_gravity(h, gravity);
        }
        if changes.sleeping_thresholds {
            self.engine.set_sleeping_thresholds(
                h,
                o.linear_sleeping_threshold,
                o.angular_sleeping_threshold,
            );
        }
        if changes.angular_factor {
            self.engine.set_angular_factor(h, o.angular_factor);
        }
        if changes.mass {
            self.engine.set_mass(h, o.mass);
        }
        self.engine.activate(h);
        Ok(changes)
    }

    /// Attach a batch of shapes under `shapes`, replacing any batch with the same id.
    pub fn attach_shapes(
        &mut self,
        body: BodyId,
        shapes: ShapesId,
        options: &ShapeOptions,
        geometry: Option<&ShapeGeometry>,
    ) -> WorkerResult<()> {
        let entity = self
            .entities
            .get_mut(&body)
            .ok_or(WorkerError::UnknownIdentifier(body))?;
        if options.shape == ShapeKind::Mesh && entity.options.body_type != BodyType::Static {
            return Err(WorkerError::UnsupportedShape {
                kind: options.shape,
                body_type: entity.options.body_type,
            });
        }
        let desc = ShapeDesc::resolve(options, geometry)?;
        let handle = self
            .engine
            .add_shape(entity.handle, &desc.scaled(entity.scale))?;
        if let Some(old) = entity.shapes.insert(shapes, AttachedShapes { desc, handle }) {
            self.engine.remove_shape(entity.handle, old.handle);
        }
        Ok(())
    }

    /// Detach a batch of shapes. Returns whether anything was attached.
    pub fn detach_shapes(&mut self, body: BodyId, shapes: ShapesId) -> bool {
        let Some(entity) = self.entities.get_mut(&body) else {
            return false;
        };
        match entity.shapes.remove(&shapes) {
            Some(old) => {
                self.engine.remove_shape(entity.handle, old.handle);
                true
            }
            None => false,
        }
    }

    /// Join two live bodies, replacing any constraint with the same id.
    pub fn attach_constraint(
        &mut self,
        id: ConstraintId,
        body: BodyId,
        target: BodyId,
        options: &ConstraintOptions,
    ) -> WorkerResult<()> {
        let a = self.handle_of(body)?;
        let b = self.handle_of(target)?;
        let handle = self.engine.add_constraint(a, b, options)?;
        if let Some(old) = self.constraints.insert(
            id,
            ConstraintLink {
                handle,
                body,
                target,
            },
        ) {
            self.engine.remove_constraint(old.handle);
        }
        Ok(())
    }

    /// Remove a constraint. Returns whether it existed.
    pub fn detach_constraint(&mut self, id: ConstraintId) -> bool {
        match self.constraints.remove(&id) {
            Some(link) => {
                self.engine.remove_constraint(link.handle);
                true
            }
            None => false,
        }
    }

    /// Wake a body.
    pub fn activate(&mut self, id: BodyId) -> WorkerResult<()> {
        let handle = self.handle_of(id)?;
        self.engine.activate(handle);
        Ok(())
    }

    /// Re-seat a body from the pose in `store` and stop it.
    pub fn reset<S: RecordStore>(&mut self, id: BodyId, store: &S) -> WorkerResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorkerError::UnknownIdentifier(id))?;
        reseat(&mut self.engine, entity, store);
        entity.sync = InitialSync::Done;
        Ok(())
    }

    /// Exchange poses with `store` for every live body, then publish speeds
    /// and collisions.
    ///
    /// Dynamic bodies are read from the engine. Static and kinematic bodies
    /// are pushed into it when their buffer pose moved. A body created as
    /// dynamic is left alone for `initial_sync_ticks` ticks and then
    /// re-seated from the buffer, so the host can place it first.
    pub fn write_back<S: RecordStore>(
        &mut self,
        store: &mut S,
        collisions: &CollisionTracker,
        initial_sync_ticks: u32,
    ) -> WriteBack {
        let mut report = WriteBack::default();
        for entity in self.entities.values_mut() {
            let dynamic = entity.options.body_type == BodyType::Dynamic;

            if let InitialSync::Waiting { skipped } = entity.sync {
                if !dynamic {
                    entity.sync = InitialSync::Done;
                } else if skipped < initial_sync_ticks {
                    entity.sync = InitialSync::Waiting {
                        skipped: skipped + 1,
                    };
                    report.waiting += 1;
                    continue;
                } else {
                    reseat(&mut self.engine, entity, &*store);
                    entity.sync = InitialSync::Done;
                    report.reset += 1;
                }
            } else if dynamic {
                if let Some(pose) = self.engine.pose(entity.handle) {
                    store.write_matrix(entity.slot, &pose.to_matrix(entity.scale));
                }
                report.from_physics += 1;
            } else {
                push_pose(&mut self.engine, entity, &*store);
                report.to_physics += 1;
            }

            let velocity = self
                .engine
                .velocity(entity.handle)
                .unwrap_or(Velocity::ZERO);
            store.write_speeds(
                entity.slot,
                velocity.linear.length(),
                velocity.angular.length(),
            );
            store.write_collisions(entity.slot, collisions.collisions_for(entity.slot));
        }
        report
    }

    /// Release every handle and tear the engine down.
    pub fn teardown(&mut self) {
        for (_, link) in self.constraints.drain() {
            self.engine.remove_constraint(link.handle);
        }
        for (_, entity) in self.entities.drain() {
            self.engine.remove_body(entity.handle);
        }
        self.slots_by_handle.clear();
        self.allocator = SlotAllocator::new(self.allocator.capacity());
        self.engine.teardown();
        debug!("entities torn down");
    }

    fn handle_of(&self, id: BodyId) -> WorkerResult<BodyHandle> {
        self.entities
            .get(&id)
            .map(|e| e.handle)
            .ok_or(WorkerError::UnknownIdentifier(id))
    }
}

/// Split a host matrix, refusing ones that do not describe a rigid pose.
fn pose_from_matrix(matrix: &Mat4) -> Option<(Pose, Vec3)> {
    if !matrix.is_finite() {
        return None;
    }
    let (pose, scale) = Pose::from_matrix(matrix);
    (pose.translation.is_finite() && pose.rotation.is_finite() && scale.is_finite())
        .then_some((pose, scale))
}

fn reseat<E: PhysicsEngine, S: RecordStore>(engine: &mut E, entity: &mut Entity, store: &S) {
    let Some((pose, scale)) = pose_from_matrix(&store.read_matrix(entity.slot)) else {
        warn!(body = %entity.id, "ignoring malformed pose in buffer");
        return;
    };
    rescale(engine, entity, scale);
    engine.set_pose(entity.handle, pose);
    engine.set_velocity(entity.handle, Velocity::ZERO);
    engine.activate(entity.handle);
}

fn push_pose<E: PhysicsEngine, S: RecordStore>(engine: &mut E, entity: &mut Entity, store: &S) {
    let Some((pose, scale)) = pose_from_matrix(&store.read_matrix(entity.slot)) else {
        warn!(body = %entity.id, "ignoring malformed pose in buffer");
        return;
    };
    rescale(engine, entity, scale);
    let current = engine.pose(entity.handle).unwrap_or(Pose::IDENTITY);
    if !current.same_as(&pose) {
        if !engine.is_active(entity.handle) {
            engine.activate(entity.handle);
        }
        engine.set_pose(entity.handle, pose);
    }
}

fn rescale<E: PhysicsEngine>(engine: &mut E, entity: &mut Entity, scale: Vec3) {
    if vec3_approx_eq(scale, entity.scale, POSE_EPSILON) {
        return;
    }
    entity.scale = scale;
    for shapes in entity.shapes.values_mut() {
        engine.remove_shape(entity.handle, shapes.handle);
        match engine.add_shape(entity.handle, &shapes.desc.scaled(scale)) {
            Ok(handle) => shapes.handle = handle,
            Err(e) => warn!(body = %entity.id, error = %e, "could not rescale shape"),
        }
    }
}
