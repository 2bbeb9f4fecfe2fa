use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, select, tick, unbounded};
use glam::Mat4;
use relay_buffer::{DebugBuffer, TransferBuffer};
use relay_core::{
    BodyId, BodyOptions, BodyUpdate, ConstraintId, ConstraintOptions, ShapeGeometry, ShapeOptions,
    ShapesId,
};
use relay_engine::{EngineResult, PhysicsEngine, ReferenceEngine, WorldConfig};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::driver::{Control, Driver};
use crate::error::{WorkerError, WorkerResult};
use crate::message::{BufferHandle, HostMessage, WorkerMessage};

/// Spawn a worker running the [`ReferenceEngine`].
pub fn spawn() -> WorkerResult<WorkerHandle> {
    spawn_with(|world: &WorldConfig| ReferenceEngine::new(world.clone()))
}

/// Spawn a worker whose engine is built by `factory` once INIT arrives.
///
/// The engine is created on the worker thread, so it need not be `Send`.
pub fn spawn_with<E, F>(factory: F) -> WorkerResult<WorkerHandle>
where
    E: PhysicsEngine + 'static,
    F: FnOnce(&WorldConfig) -> EngineResult<E> + Send + 'static,
{
    let (to_worker, control) = unbounded();
    let (events, from_worker) = unbounded();
    let thread = thread::Builder::new()
        .name("relay-worker".into())
        .spawn(move || run(factory, &control, &events))?;
    Ok(WorkerHandle {
        sender: to_worker,
        receiver: from_worker,
        thread: Some(thread),
    })
}

enum Event {
    Message(HostMessage),
    Tick(Instant),
    Disconnected,
}

fn run<E, F>(factory: F, control: &Receiver<HostMessage>, events: &Sender<WorkerMessage>)
where
    E: PhysicsEngine,
    F: FnOnce(&WorldConfig) -> EngineResult<E>,
{
    let Some(mut driver) = initialize(factory, control, events) else {
        return;
    };
    let mut ticker = tick(driver.tick_interval());

    loop {
        let event = select! {
            recv(control) -> message => message.map_or(Event::Disconnected, Event::Message),
            recv(ticker) -> now => now.map_or(Event::Disconnected, Event::Tick),
        };
        let control_flow = match event {
            Event::Message(message) => driver.handle(message),
            Event::Tick(now) => {
                driver.tick(now);
                Control::Continue
            }
            Event::Disconnected => {
                info!("host disconnected");
                driver.teardown();
                Control::Shutdown
            }
        };

        for message in driver.take_messages() {
            if events.send(message).is_err() {
                debug!("host stopped listening");
            }
        }
        match control_flow {
            Control::Continue => {}
            Control::Retime(interval) => ticker = tick(interval),
            Control::Shutdown => break,
        }
    }
    info!("worker stopped");
}

/// Wait for INIT, rejecting everything else, and build the driver.
fn initialize<E, F>(
    factory: F,
    control: &Receiver<HostMessage>,
    events: &Sender<WorkerMessage>,
) -> Option<Driver<E>>
where
    E: PhysicsEngine,
    F: FnOnce(&WorldConfig) -> EngineResult<E>,
{
    loop {
        match control.recv() {
            Ok(HostMessage::Init { config, buffer }) => {
                let result = config
                    .validate()
                    .and_then(|()| factory(&config.world).map_err(WorkerError::from))
                    .and_then(|engine| Driver::new(config, engine, buffer));
                return match result {
                    Ok(driver) => {
                        let _ = events.send(WorkerMessage::Ready);
                        Some(driver)
                    }
                    Err(e) => {
                        error!(error = %e, "init failed");
                        let _ = events.send(WorkerMessage::InitFailed(e.to_string()));
                        None
                    }
                };
            }
            Ok(HostMessage::Shutdown) | Err(_) => return None,
            Ok(other) => warn!(
                kind = other.kind(),
                error = %WorkerError::UninitializedWorld,
                "message rejected"
            ),
        }
    }
}

/// Host side of a running worker.
///
/// Dropping the handle shuts the worker down and joins its thread.
#[derive(Debug)]
pub struct WorkerHandle {
    sender: Sender<HostMessage>,
    receiver: Receiver<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Send any control message.
    pub fn send(&self, message: HostMessage) -> WorkerResult<()> {
        self.sender
            .send(message)
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Build the world.
    pub fn init(&self, config: WorkerConfig, buffer: BufferHandle) -> WorkerResult<()> {
        self.send(HostMessage::Init { config, buffer })
    }

    /// Block until INIT succeeds or fails.
    ///
    /// Body and transfer messages that arrive first are discarded.
    pub fn wait_ready(&self, timeout: Duration) -> WorkerResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(left) {
                Ok(WorkerMessage::Ready) => return Ok(()),
                Ok(WorkerMessage::InitFailed(reason)) => return Err(WorkerError::InitFailed(reason)),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => {
                    return Err(WorkerError::InitFailed("timed out waiting for ready".into()));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }

    /// Queue a body for creation.
    pub fn add_body(&self, id: BodyId, matrix: Mat4, options: BodyOptions) -> WorkerResult<()> {
        self.send(HostMessage::AddBody {
            id,
            matrix,
            options,
        })
    }

    /// Change some body options.
    pub fn update_body(&self, id: BodyId, update: BodyUpdate) -> WorkerResult<()> {
        self.send(HostMessage::UpdateBody { id, update })
    }

    /// Destroy a body.
    pub fn remove_body(&self, id: BodyId) -> WorkerResult<()> {
        self.send(HostMessage::RemoveBody { id })
    }

    /// Attach shapes to a body, now or once it exists.
    pub fn add_shapes(
        &self,
        body: BodyId,
        shapes: ShapesId,
        options: ShapeOptions,
        geometry: Option<ShapeGeometry>,
    ) -> WorkerResult<()> {
        self.send(HostMessage::AddShapes {
            body,
            shapes,
            options,
            geometry,
        })
    }

    /// Detach shapes.
    pub fn remove_shapes(&self, body: BodyId, shapes: ShapesId) -> WorkerResult<()> {
        self.send(HostMessage::RemoveShapes { body, shapes })
    }

    /// Join two bodies, now or once both exist.
    pub fn add_constraint(
        &self,
        id: ConstraintId,
        body: BodyId,
        target: BodyId,
        options: ConstraintOptions,
    ) -> WorkerResult<()> {
        self.send(HostMessage::AddConstraint {
            id,
            body,
            target,
            options,
        })
    }

    /// Remove a constraint.
    pub fn remove_constraint(&self, id: ConstraintId) -> WorkerResult<()> {
        self.send(HostMessage::RemoveConstraint { id })
    }

    /// Re-seat a body from its buffer pose and stop it.
    pub fn reset_dynamic_body(&self, id: BodyId) -> WorkerResult<()> {
        self.send(HostMessage::ResetDynamicBody { id })
    }

    /// Wake a body.
    pub fn activate_body(&self, id: BodyId) -> WorkerResult<()> {
        self.send(HostMessage::ActivateBody { id })
    }

    /// Toggle debug drawing.
    pub fn enable_debug(&self, enable: bool, buffer: Option<DebugBuffer>) -> WorkerResult<()> {
        self.send(HostMessage::EnableDebug { enable, buffer })
    }

    /// Hand the body buffer back in transfer mode.
    pub fn transfer_data(
        &self,
        buffer: TransferBuffer,
        simulation_rate: Option<f64>,
    ) -> WorkerResult<()> {
        self.send(HostMessage::TransferData {
            buffer,
            simulation_rate,
        })
    }

    /// Block for the next worker message.
    pub fn recv(&self) -> WorkerResult<WorkerMessage> {
        self.receiver.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Wait up to `timeout` for the next worker message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Next worker message, if one is waiting.
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stop the worker and wait for its thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.sender.send(HostMessage::Shutdown);
        if thread.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
