//! Fixed-rate physics worker for Physrelay.
//!
//! A worker thread owns a [`PhysicsEngine`](relay_engine::PhysicsEngine) and
//! steps it on a timer. The host talks to it over a control channel
//! ([`HostMessage`], [`WorkerMessage`]) and exchanges body poses through a
//! flagged shared buffer, or by passing a [`relay_buffer::TransferBuffer`]
//! back and forth when memory cannot be shared.
//!
//! Lifecycle commands that arrive before their bodies exist are parked in a
//! [`CommandQueue`] and retried every tick. Each live body is bound to a
//! buffer slot by a [`SlotAllocator`].

/// Free-list allocator binding body ids to buffer slots.
pub mod allocator;
/// Wall-clock step timing.
pub mod clock;
/// Per-tick collision lists keyed by slot.
pub mod collision;
/// Worker configuration.
pub mod config;
/// The tick driver and message routing.
pub mod driver;
/// Body, shape, and constraint lifecycle over the engine.
pub mod entity;
/// Error types for the worker crate.
pub mod error;
/// Control-channel messages.
pub mod message;
/// Deferred command queue.
pub mod queue;
/// Worker thread and host handle.
pub mod worker;

/// Re-export of [`allocator::SlotAllocator`].
pub use allocator::SlotAllocator;
/// Re-export of [`clock::StepClock`].
pub use clock::StepClock;
/// Re-export of [`collision::CollisionTracker`].
pub use collision::CollisionTracker;
/// Re-export of [`config::WorkerConfig`].
pub use config::WorkerConfig;
/// Re-exports of the driver and its reports.
pub use driver::{BufferLink, Control, Driver, DriverStats, StepReport, TickOutcome};
/// Re-exports of the entity manager types.
pub use entity::{Entity, EntityManager, InitialSync, WriteBack};
/// Re-exports of [`error::WorkerError`] and [`error::WorkerResult`].
pub use error::{WorkerError, WorkerResult};
/// Re-exports of the control-channel messages.
pub use message::{BufferHandle, HostMessage, WorkerMessage};
/// Re-exports of the command queue types.
pub use queue::{CommandQueue, DrainReport, Outcome, PendingCommand};
/// Re-exports of the worker thread entry points.
pub use worker::{WorkerHandle, spawn, spawn_with};
