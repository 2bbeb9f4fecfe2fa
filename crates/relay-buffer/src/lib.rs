//! Record buffer shared between the physics worker and its consumer.
//!
//! The buffer is a flat block of 32-bit words: a small header carrying the
//! sync flag and the last step duration, followed by one fixed-stride record
//! per body slot. Exactly one side touches the records at a time; the flag
//! decides who. When memory cannot be shared, [`TransferBuffer`] carries the
//! same records by moving ownership back and forth instead.

/// Debug-line buffer with its own sync flag.
pub mod debug;
/// Error types for buffer construction and handoff.
pub mod error;
/// Word offsets, strides, and the sync flag states.
pub mod layout;
/// Typed view of one body record.
pub mod record;
/// Atomic buffer shared between two threads.
pub mod shared;
/// Word-level access shared by both buffer flavours.
pub mod store;
/// Owned buffer moved across the channel when sharing is unavailable.
pub mod transfer;

/// Re-export of [`debug::DebugBuffer`].
pub use debug::DebugBuffer;
/// Re-exports of [`error::BufferError`] and [`error::BufferResult`].
pub use error::{BufferError, BufferResult};
/// Re-exports of the layout types.
pub use layout::{BufferLayout, BufferState};
/// Re-export of [`record::BodyRecord`].
pub use record::BodyRecord;
/// Re-exports of the shared buffer and its access frames.
pub use shared::{ConsumerFrame, ProducerFrame, SharedBuffer};
/// Re-export of [`store::RecordStore`].
pub use store::RecordStore;
/// Re-export of [`transfer::TransferBuffer`].
pub use transfer::TransferBuffer;
