use std::time::{Duration, Instant};

use relay_buffer::{
    BodyRecord, BufferError, DebugBuffer, RecordStore, SharedBuffer, TransferBuffer,
};
use relay_core::DebugLine;
use relay_engine::PhysicsEngine;
use tracing::{debug, info, trace, warn};

use crate::clock::StepClock;
use crate::collision::CollisionTracker;
use crate::config::{WorkerConfig, tick_period};
use crate::entity::{EntityManager, WriteBack};
use crate::error::{WorkerError, WorkerResult};
use crate::message::{BufferHandle, HostMessage, WorkerMessage};
use crate::queue::{CommandQueue, DrainReport, Outcome, PendingCommand};

/// Where the body buffer lives between ticks.
#[derive(Debug)]
pub enum BufferLink {
    /// Shared memory; the header flag says whose turn it is.
    Shared(SharedBuffer),
    /// Owned block; `None` while the host holds it.
    Transfer(Option<TransferBuffer>),
}

/// Counters exposed for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverStats {
    /// Ticks that stepped the engine.
    pub steps: u64,
    /// Ticks skipped because the host had not consumed the last frame.
    pub skipped: u64,
    /// Wall time of the most recent engine step, in milliseconds.
    pub last_step_ms: f32,
}

/// What one completed tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Simulated time handed to the engine.
    pub dt: Duration,
    /// Wall time spent inside the engine, in milliseconds.
    pub step_ms: f32,
    /// Queue drain counts.
    pub drained: DrainReport,
    /// Write-back counts.
    pub synced: WriteBack,
}

/// Result of [`Driver::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The buffer was not available; nothing ran.
    Skipped,
    /// Drain, step, write-back, and publish all ran.
    Stepped(StepReport),
}

/// What the worker loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep going.
    Continue,
    /// Restart the timer with a new period.
    Retime(Duration),
    /// The world has been torn down; stop.
    Shutdown,
}

/// The worker's owned context: engine, entities, queue, and buffers.
///
/// Single-threaded. The worker loop feeds it host messages with
/// [`handle`](Self::handle) and timer ticks with [`tick`](Self::tick), then
/// forwards whatever [`take_messages`](Self::take_messages) returns.
#[derive(Debug)]
pub struct Driver<E> {
    config: WorkerConfig,
    entities: EntityManager<E>,
    queue: CommandQueue,
    collisions: CollisionTracker,
    clock: StepClock,
    link: BufferLink,
    debug: Option<DebugBuffer>,
    debug_enabled: bool,
    debug_lines: Vec<DebugLine>,
    stats: DriverStats,
    outbox: Vec<WorkerMessage>,
}

impl<E: PhysicsEngine> Driver<E> {
    /// Set up a world around `engine` and the host's buffer.
    pub fn new(config: WorkerConfig, engine: E, buffer: BufferHandle) -> WorkerResult<Self> {
        config.validate()?;
        let interval = config.tick_interval()?;
        let link = match buffer {
            BufferHandle::Shared(shared) => {
                let actual = shared.layout().capacity();
                if actual != config.capacity {
                    return Err(BufferError::CapacityMismatch {
                        expected: config.capacity,
                        actual,
                    }
                    .into());
                }
                BufferLink::Shared(shared)
            }
            BufferHandle::Transfer(block) => {
                block.expect_capacity(config.capacity)?;
                BufferLink::Transfer(Some(block))
            }
        };
        info!(
            capacity = config.capacity,
            rate_ms = config.simulation_rate * 1000.0,
            shared = matches!(link, BufferLink::Shared(_)),
            "world initialized"
        );
        Ok(Self {
            entities: EntityManager::new(engine, config.capacity),
            queue: CommandQueue::new(),
            collisions: CollisionTracker::new(config.world.epsilon),
            clock: StepClock::new(interval),
            link,
            debug: None,
            debug_enabled: config.world.debug_draw,
            debug_lines: Vec::new(),
            stats: DriverStats::default(),
            outbox: Vec::new(),
            config,
        })
    }

    /// Current config.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Period the worker's timer should fire at.
    pub fn tick_interval(&self) -> Duration {
        self.clock.nominal()
    }

    /// Live bodies and the engine.
    pub fn entities(&self) -> &EntityManager<E> {
        &self.entities
    }

    /// Commands waiting for the next tick.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Collision lists from the last tick.
    pub fn collisions(&self) -> &CollisionTracker {
        &self.collisions
    }

    /// Counters.
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Whether debug lines are being written.
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    /// Messages produced since the last call.
    pub fn take_messages(&mut self) -> Vec<WorkerMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Route one host message.
    ///
    /// Commands that touch buffer records are queued for the next tick.
    /// Shape and constraint attachments run at once when their bodies are
    /// live; detachments always run at once.
    pub fn handle(&mut self, message: HostMessage) -> Control {
        trace!(kind = message.kind(), "message");
        match message {
            HostMessage::Init { .. } => warn!("world already initialized; ignoring init"),
            HostMessage::AddBody {
                id,
                matrix,
                options,
            } => match options.validate() {
                Ok(()) => self.queue.push(PendingCommand::AddBody {
                    id,
                    matrix,
                    options,
                }),
                Err(e) => {
                    warn!(body = %id, error = %e, "add_body rejected");
                    if !self.entities.contains(id) && !self.queue.has_pending_add(id) {
                        self.queue.discard_for(id);
                    }
                }
            },
            HostMessage::UpdateBody { id, update } => match update.validate() {
                Ok(()) => self.queue.push(PendingCommand::UpdateBody { id, update }),
                Err(e) => warn!(body = %id, error = %e, "update_body rejected"),
            },
            HostMessage::RemoveBody { id } => {
                if self.entities.contains(id) || self.queue.has_pending_add(id) {
                    self.queue.push(PendingCommand::RemoveBody { id });
                } else {
                    debug!(body = %id, "remove_body for unknown body dropped");
                }
            }
            HostMessage::AddShapes {
                body,
                shapes,
                options,
                geometry,
            } => {
                if self.entities.contains(body) {
                    if let Err(e) =
                        self.entities
                            .attach_shapes(body, shapes, &options, geometry.as_ref())
                    {
                        warn!(body = %body, error = %e, "add_shapes dropped");
                    }
                } else {
                    self.queue.push(PendingCommand::AddShapes {
                        body,
                        shapes,
                        options,
                        geometry,
                    });
                }
            }
            HostMessage::RemoveShapes { body, shapes } => {
                if !self.entities.detach_shapes(body, shapes) {
                    debug!(body = %body, shapes = %shapes, "remove_shapes: nothing attached");
                }
            }
            HostMessage::AddConstraint {
                id,
                body,
                target,
                options,
            } => {
                if let Err(e) = options.validate() {
                    warn!(constraint = %id, error = %e, "add_constraint rejected");
                } else if self.entities.contains(body) && self.entities.contains(target) {
                    if let Err(e) = self.entities.attach_constraint(id, body, target, &options) {
                        warn!(constraint = %id, error = %e, "add_constraint dropped");
                    }
                } else {
                    self.queue.push(PendingCommand::AddConstraint {
                        id,
                        body,
                        target,
                        options,
                    });
                }
            }
            HostMessage::RemoveConstraint { id } => {
                if !self.entities.detach_constraint(id) {
                    debug!(constraint = %id, "remove_constraint: unknown constraint");
                }
            }
            HostMessage::ResetDynamicBody { id } => {
                self.queue.push(PendingCommand::ResetDynamicBody { id });
            }
            HostMessage::ActivateBody { id } => {
                self.queue.push(PendingCommand::ActivateBody { id });
            }
            HostMessage::EnableDebug { enable, buffer } => {
                if let Some(buffer) = buffer {
                    self.debug = Some(buffer);
                }
                if enable && self.debug.is_none() {
                    warn!("enable_debug without a debug buffer; ignoring");
                } else {
                    self.debug_enabled = enable;
                    debug!(enable, "debug drawing toggled");
                }
            }
            HostMessage::TransferData {
                buffer,
                simulation_rate,
            } => return self.receive_transfer(buffer, simulation_rate),
            HostMessage::Shutdown => {
                self.teardown();
                return Control::Shutdown;
            }
        }
        Control::Continue
    }

    /// Run one timer tick at `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let report = match &mut self.link {
            BufferLink::Shared(shared) => {
                let shared = shared.clone();
                let Some(mut frame) = shared.try_produce() else {
                    return self.skip();
                };
                let report = self.run_tick(&mut frame, now);
                frame.set_step_duration(report.step_ms);
                frame.publish();
                report
            }
            BufferLink::Transfer(held) => {
                let Some(mut buffer) = held.take() else {
                    return self.skip();
                };
                let report = self.run_tick(&mut buffer, now);
                self.outbox.push(WorkerMessage::TransferData {
                    buffer,
                    step_duration_ms: report.step_ms,
                });
                report
            }
        };
        TickOutcome::Stepped(report)
    }

    /// Release every engine resource. The driver is unusable afterwards.
    pub fn teardown(&mut self) {
        self.queue = CommandQueue::new();
        self.entities.teardown();
        info!(steps = self.stats.steps, "world shut down");
    }

    fn skip(&mut self) -> TickOutcome {
        self.stats.skipped += 1;
        trace!("buffer not consumed; tick skipped");
        TickOutcome::Skipped
    }

    fn receive_transfer(&mut self, buffer: TransferBuffer, rate: Option<f64>) -> Control {
        match &mut self.link {
            BufferLink::Transfer(held) => match buffer.expect_capacity(self.config.capacity) {
                Ok(()) => *held = Some(buffer),
                Err(e) => warn!(error = %e, "transfer_data rejected"),
            },
            BufferLink::Shared(_) => warn!("transfer_data while using a shared buffer; ignoring"),
        }
        let Some(seconds) = rate else {
            return Control::Continue;
        };
        match tick_period(seconds) {
            Ok(interval) => {
                self.config.simulation_rate = seconds;
                self.clock.set_nominal(interval);
                debug!(rate_ms = seconds * 1000.0, "simulation rate changed");
                Control::Retime(interval)
            }
            Err(e) => {
                warn!(error = %e, "ignoring invalid simulation rate");
                Control::Continue
            }
        }
    }

    fn run_tick<S: RecordStore>(&mut self, store: &mut S, now: Instant) -> StepReport {
        let drained = self.drain(store);

        let dt = self.clock.advance(now);
        let started = Instant::now();
        self.entities.engine_mut().step(dt.as_secs_f32());
        let step_ms = started.elapsed().as_secs_f32() * 1000.0;

        let entities = &self.entities;
        self.collisions
            .rebuild(entities.engine().manifolds(), |h| entities.slot_for_handle(h));
        let synced =
            self.entities
                .write_back(store, &self.collisions, self.config.initial_sync_ticks);
        self.draw_debug();

        self.stats.steps += 1;
        self.stats.last_step_ms = step_ms;
        trace!(
            step = self.stats.steps,
            dt_ms = dt.as_secs_f32() * 1000.0,
            step_ms,
            bodies = self.entities.len(),
            "tick"
        );
        StepReport {
            dt,
            step_ms,
            drained,
            synced,
        }
    }

    fn drain<S: RecordStore>(&mut self, store: &mut S) -> DrainReport {
        let Self {
            queue,
            entities,
            collisions,
            outbox,
            ..
        } = self;
        let mut failed_adds = Vec::new();
        let mut report = queue.drain(|command| {
            let outcome =
                apply_command(&mut *entities, &mut *collisions, &mut *store, &mut *outbox, command);
            if let (PendingCommand::AddBody { id, .. }, Outcome::Dropped) = (command, outcome) {
                failed_adds.push(*id);
            }
            outcome
        });
        // Commands waiting on a body whose add failed would never run.
        for id in failed_adds {
            if !entities.contains(id) && !queue.has_pending_add(id) {
                report.superseded += queue.discard_for(id);
            }
        }
        if report.deferred > 0 || report.superseded > 0 {
            debug!(
                deferred = report.deferred,
                superseded = report.superseded,
                "commands left waiting"
            );
        }
        report
    }

    fn draw_debug(&mut self) {
        if !self.debug_enabled {
            return;
        }
        let Some(buffer) = &self.debug else {
            return;
        };
        self.debug_lines.clear();
        self.entities.engine().debug_lines(&mut self.debug_lines);
        if !buffer.try_publish(&self.debug_lines) {
            trace!("debug frame still unread");
        }
    }
}

fn apply_command<E: PhysicsEngine, S: RecordStore>(
    entities: &mut EntityManager<E>,
    collisions: &mut CollisionTracker,
    store: &mut S,
    outbox: &mut Vec<WorkerMessage>,
    command: &PendingCommand,
) -> Outcome {
    let result = match command {
        PendingCommand::AddBody {
            id,
            matrix,
            options,
        } => entities.create(*id, matrix, options.clone()).map(|slot| {
            store.write_record(
                slot,
                &BodyRecord {
                    matrix: *matrix,
                    ..BodyRecord::default()
                },
            );
            outbox.push(WorkerMessage::BodyReady { id: *id, slot });
            debug!(body = %id, slot, "body ready");
        }),
        PendingCommand::UpdateBody { id, update } => entities.update(*id, update).map(drop),
        PendingCommand::RemoveBody { id } => entities.destroy(*id).map(|slot| {
            collisions.forget(slot);
            debug!(body = %id, slot, "body removed");
        }),
        PendingCommand::AddShapes {
            body,
            shapes,
            options,
            geometry,
        } => {
            if !entities.contains(*body) {
                return Outcome::Deferred;
            }
            entities.attach_shapes(*body, *shapes, options, geometry.as_ref())
        }
        PendingCommand::AddConstraint {
            id,
            body,
            target,
            options,
        } => {
            if !(entities.contains(*body) && entities.contains(*target)) {
                return Outcome::Deferred;
            }
            entities.attach_constraint(*id, *body, *target, options)
        }
        PendingCommand::ResetDynamicBody { id } => entities.reset(*id, &*store),
        PendingCommand::ActivateBody { id } => entities.activate(*id),
    };
    match result {
        Ok(()) => Outcome::Applied,
        Err(WorkerError::UnknownIdentifier(id)) => {
            debug!(kind = command.kind(), body = %id, "unknown body; command dropped");
            Outcome::Dropped
        }
        Err(e) => {
            warn!(kind = command.kind(), error = %e, "command dropped");
            Outcome::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use glam::{Mat4, Vec3};
    use relay_buffer::BufferState;
    use relay_core::{
        ActivationState, BodyId, BodyOptions, BodyType, ConstraintOptions, Pose, ShapeDesc,
        ShapeOptions, ShapesId,
    };
    use relay_engine::{
        BodyDesc, BodyHandle, ConstraintHandle, ContactManifold, ContactPoint, EngineResult,
        ReferenceEngine, ShapeHandle, Velocity, WorldConfig,
    };

    use super::*;

    const FRAME: Duration = Duration::from_millis(50);

    fn config(capacity: usize) -> WorkerConfig {
        WorkerConfig::default().with_capacity(capacity)
    }

    fn shared_driver(capacity: usize) -> (Driver<ReferenceEngine>, SharedBuffer) {
        let buffer = SharedBuffer::new(capacity).unwrap();
        let engine = ReferenceEngine::new(WorldConfig::default()).unwrap();
        let driver =
            Driver::new(config(capacity), engine, BufferHandle::Shared(buffer.clone())).unwrap();
        (driver, buffer)
    }

    fn consume(buffer: &SharedBuffer) {
        if let Some(frame) = buffer.try_consume() {
            frame.release();
        }
    }

    fn id(n: u128) -> BodyId {
        BodyId::from_u128(n)
    }

    fn add(n: u128, y: f32, body_type: BodyType) -> HostMessage {
        HostMessage::AddBody {
            id: id(n),
            matrix: Mat4::from_translation(Vec3::new(0.0, y, 0.0)),
            options: BodyOptions::of_type(body_type),
        }
    }

    #[test]
    fn unconsumed_buffer_caps_steps_at_one() {
        let (mut driver, buffer) = shared_driver(4);
        let start = Instant::now();
        for i in 0..5 {
            driver.tick(start + FRAME * i);
        }
        assert_eq!(driver.stats().steps, 1);
        assert_eq!(driver.stats().skipped, 4);
        assert_eq!(buffer.state(), BufferState::Ready);
    }

    #[test]
    fn shapes_sent_before_their_body_attach_once() {
        let (mut driver, buffer) = shared_driver(4);
        let batch = ShapesId::from_u128(1);
        driver.handle(HostMessage::AddShapes {
            body: id(1),
            shapes: batch,
            options: ShapeOptions::sphere(0.5),
            geometry: None,
        });
        driver.handle(add(1, 0.0, BodyType::Static));
        assert_eq!(driver.queue().len(), 2);

        let start = Instant::now();
        driver.tick(start);
        assert_eq!(driver.queue().len(), 1);
        consume(&buffer);
        driver.tick(start + FRAME);
        assert!(driver.queue().is_empty());

        let entity = driver.entities().get(id(1)).unwrap();
        assert_eq!(entity.shape_count(), 1);
        assert_eq!(driver.entities().engine().shape_count(entity.handle()), 1);
        let ready: Vec<_> = driver
            .take_messages()
            .into_iter()
            .filter(|m| matches!(m, WorkerMessage::BodyReady { .. }))
            .collect();
        assert_eq!(ready.len(), 1);
    }

    #[test]
    fn kinematic_poses_flow_from_the_buffer() {
        let (mut driver, buffer) = shared_driver(4);
        driver.handle(add(1, 0.0, BodyType::Kinematic));
        let start = Instant::now();
        driver.tick(start);

        let target = Mat4::from_translation(Vec3::new(3.0, 2.0, 1.0));
        {
            let mut frame = buffer.try_consume().unwrap();
            frame.write_matrix(0, &target);
            frame.release();
        }
        driver.tick(start + FRAME);

        let entity = driver.entities().get(id(1)).unwrap();
        let pose = driver.entities().engine().pose(entity.handle()).unwrap();
        assert!((pose.translation - Vec3::new(3.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn dynamic_poses_flow_into_the_buffer() {
        let (mut driver, buffer) = shared_driver(4);
        driver.handle(add(1, 10.0, BodyType::Dynamic));
        let start = Instant::now();
        for i in 0..3 {
            consume(&buffer);
            driver.tick(start + FRAME * i);
        }
        let frame = buffer.try_consume().unwrap();
        let y = frame.read_matrix(0).w_axis.y;
        assert!(y < 10.0, "body should have fallen, y = {y}");
        assert!(frame.read_record(0).linear_speed > 0.0);
    }

    #[test]
    fn remove_for_unknown_body_is_dropped_on_arrival() {
        let (mut driver, _buffer) = shared_driver(4);
        driver.handle(HostMessage::RemoveBody { id: id(1) });
        assert!(driver.queue().is_empty());

        driver.handle(add(1, 0.0, BodyType::Static));
        driver.handle(HostMessage::RemoveBody { id: id(1) });
        assert_eq!(driver.queue().len(), 2);
        driver.tick(Instant::now());
        assert!(driver.entities().is_empty());
        assert_eq!(driver.entities().slot_of(id(1)), None);
    }

    #[test]
    fn capacity_overflow_drops_the_add() {
        let (mut driver, _buffer) = shared_driver(1);
        driver.handle(add(1, 0.0, BodyType::Static));
        driver.handle(add(2, 0.0, BodyType::Static));
        let TickOutcome::Stepped(report) = driver.tick(Instant::now()) else {
            panic!("first tick should step");
        };
        assert_eq!(report.drained.applied, 1);
        assert_eq!(report.drained.dropped, 1);
        assert!(driver.queue().is_empty());
        assert_eq!(driver.take_messages().len(), 1);
    }

    #[test]
    fn invalid_options_are_rejected_on_arrival() {
        let (mut driver, _buffer) = shared_driver(1);
        driver.handle(HostMessage::AddBody {
            id: id(1),
            matrix: Mat4::IDENTITY,
            options: BodyOptions::default().with_mass(-1.0),
        });
        assert!(driver.queue().is_empty());
    }

    #[test]
    fn transfer_mode_hands_the_buffer_back_and_forth() {
        let engine = ReferenceEngine::new(WorldConfig::default()).unwrap();
        let block = TransferBuffer::new(2).unwrap();
        let mut driver =
            Driver::new(config(2), engine, BufferHandle::Transfer(block)).unwrap();
        driver.handle(add(1, 0.0, BodyType::Static));

        let start = Instant::now();
        assert!(matches!(driver.tick(start), TickOutcome::Stepped(_)));
        let mut messages = driver.take_messages();
        let Some(WorkerMessage::TransferData { buffer, .. }) = messages.pop() else {
            panic!("expected the buffer back");
        };
        assert_eq!(driver.tick(start + FRAME), TickOutcome::Skipped);

        let control = driver.handle(HostMessage::TransferData {
            buffer,
            simulation_rate: Some(0.5),
        });
        assert_eq!(control, Control::Retime(Duration::from_millis(500)));
        assert!(matches!(driver.tick(start + FRAME * 2), TickOutcome::Stepped(_)));
    }

    #[test]
    fn mismatched_buffer_capacity_fails_init() {
        let engine = ReferenceEngine::new(WorldConfig::default()).unwrap();
        let buffer = SharedBuffer::new(3).unwrap();
        let err = Driver::new(config(4), engine, BufferHandle::Shared(buffer)).unwrap_err();
        assert!(matches!(err, WorkerError::Buffer(_)));
    }

    #[test]
    fn debug_lines_reach_the_debug_buffer() {
        let (mut driver, buffer) = shared_driver(2);
        let debug = DebugBuffer::new(256).unwrap();
        driver.handle(HostMessage::EnableDebug {
            enable: true,
            buffer: Some(debug.clone()),
        });
        assert!(driver.debug_enabled());
        driver.handle(add(1, 0.0, BodyType::Static));
        driver.tick(Instant::now());
        driver.handle(HostMessage::AddShapes {
            body: id(1),
            shapes: ShapesId::from_u128(1),
            options: ShapeOptions::boxed(Vec3::ONE),
            geometry: None,
        });
        consume(&buffer);
        let _ = debug.try_take();
        driver.tick(Instant::now() + FRAME);

        let lines = debug.try_take().unwrap();
        assert!(lines.len() >= 12);
    }

    #[test]
    fn shutdown_tears_the_world_down() {
        let (mut driver, _buffer) = shared_driver(2);
        driver.handle(add(1, 0.0, BodyType::Static));
        driver.tick(Instant::now());
        assert_eq!(driver.handle(HostMessage::Shutdown), Control::Shutdown);
        assert!(driver.entities().is_empty());
        assert_eq!(driver.entities().engine().body_count(), 0);
    }

    #[test]
    fn out_of_range_rate_fails_init() {
        let engine = ReferenceEngine::new(WorldConfig::default()).unwrap();
        let buffer = SharedBuffer::new(2).unwrap();
        let config = config(2).with_simulation_rate(1e20);
        let err = Driver::new(config, engine, BufferHandle::Shared(buffer)).unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[test]
    fn out_of_range_rate_in_transfer_keeps_the_old_timer() {
        let engine = ReferenceEngine::new(WorldConfig::default()).unwrap();
        let block = TransferBuffer::new(2).unwrap();
        let mut driver =
            Driver::new(config(2), engine, BufferHandle::Transfer(block)).unwrap();
        let interval = driver.tick_interval();

        let start = Instant::now();
        driver.tick(start);
        let Some(WorkerMessage::TransferData { buffer, .. }) = driver.take_messages().pop() else {
            panic!("expected the buffer back");
        };
        for rate in [1e20, f64::NAN, 0.0] {
            let control = driver.handle(HostMessage::TransferData {
                buffer: buffer.clone(),
                simulation_rate: Some(rate),
            });
            assert_eq!(control, Control::Continue);
        }
        assert_eq!(driver.tick_interval(), interval);
        assert!((driver.config().simulation_rate - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(matches!(driver.tick(start + FRAME), TickOutcome::Stepped(_)));
    }

    #[test]
    fn failed_adds_take_their_waiting_commands_with_them() {
        let (mut driver, buffer) = shared_driver(1);
        for n in 1..=5 {
            driver.handle(HostMessage::AddShapes {
                body: id(n),
                shapes: ShapesId::from_u128(n),
                options: ShapeOptions::sphere(0.5),
                geometry: None,
            });
            driver.handle(add(n, 0.0, BodyType::Static));
        }

        let start = Instant::now();
        let TickOutcome::Stepped(report) = driver.tick(start) else {
            panic!("first tick should step");
        };
        assert_eq!(report.drained.applied, 1);
        assert_eq!(report.drained.dropped, 4);
        assert_eq!(report.drained.superseded, 4);
        assert_eq!(driver.queue().len(), 1);

        for i in 1..4 {
            consume(&buffer);
            driver.tick(start + FRAME * i);
        }
        assert!(driver.queue().is_empty());
        assert_eq!(driver.entities().len(), 1);
        assert_eq!(driver.entities().get(id(1)).unwrap().shape_count(), 1);
    }

    #[test]
    fn rejected_add_discards_shapes_sent_ahead_of_it() {
        let (mut driver, _buffer) = shared_driver(2);
        driver.handle(HostMessage::AddShapes {
            body: id(1),
            shapes: ShapesId::from_u128(1),
            options: ShapeOptions::sphere(0.5),
            geometry: None,
        });
        assert_eq!(driver.queue().len(), 1);
        driver.handle(HostMessage::AddBody {
            id: id(1),
            matrix: Mat4::IDENTITY,
            options: BodyOptions::default().with_mass(-1.0),
        });
        assert!(driver.queue().is_empty());
    }

    /// Engine whose contacts are whatever the test puts in `script`.
    #[derive(Debug, Default)]
    struct ScriptedEngine {
        next: u32,
        poses: HashMap<BodyHandle, Pose>,
        script: Rc<RefCell<Vec<ContactManifold>>>,
        manifolds: Vec<ContactManifold>,
    }

    impl PhysicsEngine for ScriptedEngine {
        fn add_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle> {
            self.next += 1;
            let handle = BodyHandle::from_raw(self.next);
            self.poses.insert(handle, desc.pose);
            Ok(handle)
        }

        fn remove_body(&mut self, body: BodyHandle) {
            self.poses.remove(&body);
        }

        fn add_shape(&mut self, _body: BodyHandle, _shape: &ShapeDesc) -> EngineResult<ShapeHandle> {
            self.next += 1;
            Ok(ShapeHandle::from_raw(self.next))
        }

        fn remove_shape(&mut self, _body: BodyHandle, _shape: ShapeHandle) {}

        fn add_constraint(
            &mut self,
            _body: BodyHandle,
            _target: BodyHandle,
            _options: &ConstraintOptions,
        ) -> EngineResult<ConstraintHandle> {
            self.next += 1;
            Ok(ConstraintHandle::from_raw(self.next))
        }

        fn remove_constraint(&mut self, _constraint: ConstraintHandle) {}

        fn step(&mut self, _dt: f32) {
            self.manifolds = self.script.borrow().clone();
        }

        fn manifolds(&self) -> &[ContactManifold] {
            &self.manifolds
        }

        fn pose(&self, body: BodyHandle) -> Option<Pose> {
            self.poses.get(&body).copied()
        }

        fn set_pose(&mut self, body: BodyHandle, pose: Pose) {
            if let Some(slot) = self.poses.get_mut(&body) {
                *slot = pose;
            }
        }

        fn velocity(&self, body: BodyHandle) -> Option<Velocity> {
            self.poses.contains_key(&body).then_some(Velocity::ZERO)
        }

        fn set_velocity(&mut self, _body: BodyHandle, _velocity: Velocity) {}

        fn activate(&mut self, _body: BodyHandle) {}

        fn is_active(&self, _body: BodyHandle) -> bool {
            true
        }

        fn set_activation_state(&mut self, _body: BodyHandle, _state: ActivationState) {}

        fn set_body_type(&mut self, _body: BodyHandle, _body_type: BodyType, _disable: bool) {}

        fn set_mass(&mut self, _body: BodyHandle, _mass: f32) {}

        fn set_damping(&mut self, _body: BodyHandle, _linear: f32, _angular: f32) {}

        fn set_gravity(&mut self, _body: BodyHandle, _gravity: Vec3) {}

        fn set_sleeping_thresholds(&mut self, _body: BodyHandle, _linear: f32, _angular: f32) {}

        fn set_angular_factor(&mut self, _body: BodyHandle, _factor: Vec3) {}

        fn set_collision_filter(&mut self, _body: BodyHandle, _group: u32, _mask: u32) {}

        fn world_gravity(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn teardown(&mut self) {
            self.poses.clear();
            self.manifolds.clear();
        }
    }

    #[test]
    fn engine_contacts_reach_the_owner_record_only() {
        let engine = ScriptedEngine::default();
        let script = Rc::clone(&engine.script);
        let buffer = SharedBuffer::new(4).unwrap();
        let mut driver =
            Driver::new(config(4), engine, BufferHandle::Shared(buffer.clone())).unwrap();
        driver.handle(add(1, 0.0, BodyType::Static));
        driver.handle(add(2, 0.0, BodyType::Static));
        let start = Instant::now();
        driver.tick(start);

        let a = driver.entities().get(id(1)).unwrap();
        let b = driver.entities().get(id(2)).unwrap();
        let (slot_a, slot_b) = (a.slot(), b.slot());
        script.borrow_mut().push(ContactManifold {
            body0: a.handle(),
            body1: b.handle(),
            points: vec![ContactPoint {
                distance: 0.0,
                position: Vec3::ZERO,
                normal: Vec3::Y,
            }],
        });

        consume(&buffer);
        driver.tick(start + FRAME);
        assert_eq!(driver.collisions().collisions_for(slot_a), &[slot_b]);
        assert!(driver.collisions().collisions_for(slot_b).is_empty());
        {
            let frame = buffer.try_consume().unwrap();
            let owner: Vec<_> = frame.read_record(slot_a).colliding_slots().collect();
            assert_eq!(owner, vec![slot_b]);
            assert_eq!(frame.read_record(slot_b).colliding_slots().count(), 0);
            frame.release();
        }

        script.borrow_mut().clear();
        driver.tick(start + FRAME * 2);
        assert!(driver.collisions().collisions_for(slot_a).is_empty());
        let frame = buffer.try_consume().unwrap();
        assert_eq!(frame.read_record(slot_a).colliding_slots().count(), 0);
    }
}
