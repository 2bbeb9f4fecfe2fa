pub mod drop;
pub mod layout;
pub mod stress;

use std::collections::HashMap;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::Rng;
use rand::rngs::StdRng;
use relay_buffer::{RecordStore, SharedBuffer, TransferBuffer};
use relay_core::{BodyId, BodyOptions, BodyType, ShapeOptions, ShapesId};
use relay_worker::{BufferHandle, WorkerConfig, WorkerHandle, WorkerMessage};
use tracing::{debug, info};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Load a config file if given, then make sure it fits `bodies`.
fn load_config(path: Option<&Path>, bodies: usize) -> Result<WorkerConfig, String> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            WorkerConfig::from_json(&text).map_err(|e| e.to_string())?
        }
        None => WorkerConfig::default(),
    };
    let capacity = config.capacity.max(bodies);
    Ok(config.with_capacity(capacity))
}

/// Turn a seconds argument into a duration, rejecting nonsense.
fn run_time(seconds: f64) -> Result<Duration, String> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(format!("seconds must be positive and in range, got {seconds}")),
    }
}

/// A wide static slab with its top face at y = 0.
fn add_ground(worker: &WorkerHandle) -> Result<BodyId, String> {
    let id = BodyId::new();
    worker
        .add_body(
            id,
            Mat4::from_translation(Vec3::new(0.0, -0.5, 0.0)),
            BodyOptions::of_type(BodyType::Static),
        )
        .map_err(|e| e.to_string())?;
    worker
        .add_shapes(
            id,
            ShapesId::new(),
            ShapeOptions::boxed(Vec3::new(20.0, 0.5, 20.0)),
            None,
        )
        .map_err(|e| e.to_string())?;
    Ok(id)
}

/// A random box or sphere released at `height`. Returns its id and shape name.
fn add_falling(
    worker: &WorkerHandle,
    rng: &mut StdRng,
    spread: f32,
    height: f32,
) -> Result<(BodyId, &'static str), String> {
    let id = BodyId::new();
    let x = rng.random_range(-spread..=spread);
    let z = rng.random_range(-spread..=spread);
    let (shape, name) = if rng.random_bool(0.5) {
        (ShapeOptions::boxed(Vec3::splat(rng.random_range(0.2..0.6))), "box")
    } else {
        (ShapeOptions::sphere(rng.random_range(0.2..0.6)), "sphere")
    };
    // Shapes go first; the worker holds them until the body exists.
    worker
        .add_shapes(id, ShapesId::new(), shape, None)
        .map_err(|e| e.to_string())?;
    worker
        .add_body(
            id,
            Mat4::from_translation(Vec3::new(x, height, z)),
            BodyOptions::default(),
        )
        .map_err(|e| e.to_string())?;
    Ok((id, name))
}

enum HostLink {
    Shared(SharedBuffer),
    Transfer,
}

/// The host side of a running worker: its handle, its buffer, and the
/// slots it has confirmed so far.
struct Session {
    worker: WorkerHandle,
    link: HostLink,
    slots: HashMap<BodyId, usize>,
    frames: u64,
    step_ms_total: f64,
    step_ms_max: f32,
}

impl Session {
    fn start(config: WorkerConfig, transfer: bool) -> Result<Self, String> {
        let worker = relay_worker::spawn().map_err(|e| e.to_string())?;
        let capacity = config.capacity;
        let (link, handle) = if transfer {
            let block = TransferBuffer::new(capacity).map_err(|e| e.to_string())?;
            (HostLink::Transfer, BufferHandle::Transfer(block))
        } else {
            let shared = SharedBuffer::new(capacity).map_err(|e| e.to_string())?;
            (HostLink::Shared(shared.clone()), BufferHandle::Shared(shared))
        };
        worker.init(config, handle).map_err(|e| e.to_string())?;
        worker.wait_ready(READY_TIMEOUT).map_err(|e| e.to_string())?;
        info!(capacity, transfer, "worker ready");
        Ok(Self {
            worker,
            link,
            slots: HashMap::new(),
            frames: 0,
            step_ms_total: 0.0,
            step_ms_max: 0.0,
        })
    }

    fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    fn slot_of(&self, id: BodyId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    fn mean_step_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.step_ms_total / self.frames as f64
        }
    }

    fn note(&mut self, message: WorkerMessage) -> Option<(TransferBuffer, f32)> {
        match message {
            WorkerMessage::BodyReady { id, slot } => {
                self.slots.insert(id, slot);
                None
            }
            WorkerMessage::TransferData {
                buffer,
                step_duration_ms,
            } => Some((buffer, step_duration_ms)),
            WorkerMessage::Ready | WorkerMessage::InitFailed(_) => None,
        }
    }

    fn count_frame(&mut self, step_ms: f32) {
        self.frames += 1;
        self.step_ms_total += f64::from(step_ms);
        self.step_ms_max = self.step_ms_max.max(step_ms);
    }

    /// Wait for the next frame and let `read` look at it. Returns whether a
    /// frame arrived before `timeout`.
    fn next_frame(
        &mut self,
        timeout: Duration,
        mut read: impl FnMut(&mut dyn RecordStore, &HashMap<BodyId, usize>),
    ) -> Result<bool, String> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(false);
            }
            match &self.link {
                HostLink::Shared(shared) => {
                    let shared = shared.clone();
                    while let Some(message) = self.worker.try_recv() {
                        self.note(message);
                    }
                    match shared.try_consume() {
                        Some(mut frame) => {
                            let step_ms = frame.step_duration_ms();
                            read(&mut frame, &self.slots);
                            frame.release();
                            self.count_frame(step_ms);
                            return Ok(true);
                        }
                        None => thread::sleep(Duration::from_micros(500)),
                    }
                }
                HostLink::Transfer => {
                    let Some(message) = self.worker.recv_timeout(left) else {
                        return Ok(false);
                    };
                    if let Some((mut buffer, step_ms)) = self.note(message) {
                        read(&mut buffer, &self.slots);
                        self.worker
                            .transfer_data(buffer, None)
                            .map_err(|e| e.to_string())?;
                        self.count_frame(step_ms);
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Consume frames until `duration` has passed.
    fn run_for(&mut self, duration: Duration) -> Result<(), String> {
        let end = Instant::now() + duration;
        while Instant::now() < end {
            self.next_frame(READY_TIMEOUT, |_, _| {})?;
        }
        Ok(())
    }

    fn shutdown(self) {
        debug!(frames = self.frames, bodies = self.slots.len(), "stopping worker");
        self.worker.shutdown();
    }
}
