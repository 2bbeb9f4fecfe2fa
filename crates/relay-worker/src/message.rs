use glam::Mat4;
use relay_buffer::{DebugBuffer, SharedBuffer, TransferBuffer};
use relay_core::{
    BodyId, BodyOptions, BodyUpdate, ConstraintId, ConstraintOptions, ShapeGeometry, ShapeOptions,
    ShapesId,
};

use crate::config::WorkerConfig;

/// How the body buffer travels between host and worker.
#[derive(Debug, Clone)]
pub enum BufferHandle {
    /// Both sides hold the same memory and hand off through its flag.
    Shared(SharedBuffer),
    /// The worker owns the block until it sends it back.
    Transfer(TransferBuffer),
}

/// Host → worker control messages.
#[derive(Debug, Clone)]
pub enum HostMessage {
    /// Build the world and start ticking.
    Init {
        /// World and timer settings.
        config: WorkerConfig,
        /// The body buffer the worker writes into.
        buffer: BufferHandle,
    },
    /// Create a body at `matrix`.
    AddBody {
        /// Host-chosen id.
        id: BodyId,
        /// Initial world transform, scale included.
        matrix: Mat4,
        /// Body options.
        options: BodyOptions,
    },
    /// Change some body options.
    UpdateBody {
        /// Target body.
        id: BodyId,
        /// Fields to change.
        update: BodyUpdate,
    },
    /// Destroy a body.
    RemoveBody {
        /// Target body.
        id: BodyId,
    },
    /// Attach a batch of shapes to a body.
    AddShapes {
        /// Receiving body.
        body: BodyId,
        /// Id of this batch, used to detach it later.
        shapes: ShapesId,
        /// Shape options.
        options: ShapeOptions,
        /// Vertices to fit against.
        geometry: Option<ShapeGeometry>,
    },
    /// Detach a batch of shapes.
    RemoveShapes {
        /// Owning body.
        body: BodyId,
        /// Batch to detach.
        shapes: ShapesId,
    },
    /// Join two bodies.
    AddConstraint {
        /// Host-chosen id.
        id: ConstraintId,
        /// First body.
        body: BodyId,
        /// Second body.
        target: BodyId,
        /// Constraint options.
        options: ConstraintOptions,
    },
    /// Remove a constraint.
    RemoveConstraint {
        /// Constraint to remove.
        id: ConstraintId,
    },
    /// Re-seat a body from its buffer pose and stop it.
    ResetDynamicBody {
        /// Target body.
        id: BodyId,
    },
    /// Wake a body.
    ActivateBody {
        /// Target body.
        id: BodyId,
    },
    /// Toggle debug drawing. The first enable must carry a buffer.
    EnableDebug {
        /// New debug state.
        enable: bool,
        /// Replacement debug buffer.
        buffer: Option<DebugBuffer>,
    },
    /// Hand the body buffer back to the worker, optionally retiming it.
    TransferData {
        /// The returned body buffer.
        buffer: TransferBuffer,
        /// New timer period in seconds.
        simulation_rate: Option<f64>,
    },
    /// Tear down and stop.
    Shutdown,
}

impl HostMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::AddBody { .. } => "add_body",
            Self::UpdateBody { .. } => "update_body",
            Self::RemoveBody { .. } => "remove_body",
            Self::AddShapes { .. } => "add_shapes",
            Self::RemoveShapes { .. } => "remove_shapes",
            Self::AddConstraint { .. } => "add_constraint",
            Self::RemoveConstraint { .. } => "remove_constraint",
            Self::ResetDynamicBody { .. } => "reset_dynamic_body",
            Self::ActivateBody { .. } => "activate_body",
            Self::EnableDebug { .. } => "enable_debug",
            Self::TransferData { .. } => "transfer_data",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Worker → host messages.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// INIT finished; ticking has started.
    Ready,
    /// INIT failed; the worker has stopped.
    InitFailed(String),
    /// A body was created and bound to `slot`.
    BodyReady {
        /// The body's id.
        id: BodyId,
        /// Its record index in the buffer.
        slot: usize,
    },
    /// The body buffer after a tick, in transfer mode.
    TransferData {
        /// The filled body buffer.
        buffer: TransferBuffer,
        /// Wall time of the step, in milliseconds.
        step_duration_ms: f32,
    },
}
