//! Physics engine seam for the Physrelay worker.
//!
//! The worker only ever talks to an engine through [`PhysicsEngine`]. Handles
//! are opaque, copyable, and never leave the worker thread. [`ReferenceEngine`]
//! is a small position-based rigid-body engine that implements the trait so
//! the worker can run headless and be tested end to end.

/// World configuration handed to the engine at INIT.
pub mod config;
/// The engine trait, handles, and contact manifolds.
pub mod engine;
/// Error types for engine construction and body edits.
pub mod error;
/// Narrow-phase helpers used by the reference engine.
mod narrowphase;
/// Built-in reference engine.
pub mod reference;

/// Re-export of [`config::WorldConfig`].
pub use config::WorldConfig;
/// Re-exports of the engine trait and its handle types.
pub use engine::{
    BodyDesc, BodyHandle, ConstraintHandle, ContactManifold, ContactPoint, PhysicsEngine,
    ShapeHandle, Velocity,
};
/// Re-exports of [`error::EngineError`] and [`error::EngineResult`].
pub use error::{EngineError, EngineResult};
/// Re-export of [`reference::ReferenceEngine`].
pub use reference::ReferenceEngine;
