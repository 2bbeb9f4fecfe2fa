use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::BufferResult;
use crate::layout::{BufferLayout, BufferState, HEADER_LENGTH, STATE_WORD, STEP_DURATION_WORD};
use crate::record::BodyRecord;
use crate::store::RecordStore;

/// Header and records in memory visible to both threads.
///
/// Cloning shares the same words. Which side may touch the records is
/// decided by the state word alone: the producer (the worker) writes while
/// the state is not [`BufferState::Ready`], the consumer (the host) reads
/// while it is. Frame types enforce the handoff on drop.
#[derive(Clone)]
pub struct SharedBuffer {
    words: Arc<[AtomicU32]>,
    layout: BufferLayout,
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("capacity", &self.layout.capacity())
            .field("state", &self.state())
            .finish()
    }
}

impl SharedBuffer {
    /// Allocate a buffer of `capacity` default records in the uninitialized state.
    pub fn new(capacity: usize) -> BufferResult<Self> {
        let layout = BufferLayout::new(capacity)?;
        let blank = BodyRecord::default().to_words();
        let words: Arc<[AtomicU32]> = (0..layout.shared_words())
            .map(|i| {
                let value = match i.checked_sub(HEADER_LENGTH) {
                    Some(r) => blank[r % blank.len()],
                    None => 0,
                };
                AtomicU32::new(value)
            })
            .collect();
        Ok(Self { words, layout })
    }

    /// Sizes of this buffer.
    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    /// Current sync flag.
    pub fn state(&self) -> BufferState {
        BufferState::from_word(self.words[STATE_WORD].load(Ordering::Acquire))
    }

    /// Duration of the last published step, in milliseconds.
    pub fn step_duration_ms(&self) -> f32 {
        f32::from_bits(self.words[STEP_DURATION_WORD].load(Ordering::Relaxed))
    }

    /// Whether two handles point at the same memory.
    pub fn same_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }

    /// Start writing a frame, unless the consumer still owes a read.
    pub fn try_produce(&self) -> Option<ProducerFrame<'_>> {
        (self.state() != BufferState::Ready).then_some(ProducerFrame { buffer: self })
    }

    /// Start reading a frame, if one is published.
    pub fn try_consume(&self) -> Option<ConsumerFrame<'_>> {
        (self.state() == BufferState::Ready).then_some(ConsumerFrame { buffer: self })
    }

    fn record_word(&self, index: usize) -> &AtomicU32 {
        &self.words[HEADER_LENGTH + index]
    }

    fn set_state(&self, state: BufferState) {
        self.words[STATE_WORD].store(state.as_word(), Ordering::Release);
    }
}

/// Write access for the worker. Publishes ([`BufferState::Ready`]) on drop.
pub struct ProducerFrame<'a> {
    buffer: &'a SharedBuffer,
}

impl ProducerFrame<'_> {
    /// Record the duration of the step this frame reports.
    pub fn set_step_duration(&mut self, millis: f32) {
        self.buffer.words[STEP_DURATION_WORD].store(millis.to_bits(), Ordering::Relaxed);
    }

    /// Hand the frame to the consumer.
    pub fn publish(self) {}
}

impl Drop for ProducerFrame<'_> {
    fn drop(&mut self) {
        self.buffer.set_state(BufferState::Ready);
    }
}

impl RecordStore for ProducerFrame<'_> {
    fn capacity(&self) -> usize {
        self.buffer.layout.capacity()
    }

    fn read_word(&self, index: usize) -> u32 {
        self.buffer.record_word(index).load(Ordering::Relaxed)
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.buffer.record_word(index).store(value, Ordering::Relaxed);
    }
}

/// Access for the host. Hands the buffer back ([`BufferState::Consumed`]) on drop.
///
/// The host reads dynamic poses and may write kinematic poses before release.
pub struct ConsumerFrame<'a> {
    buffer: &'a SharedBuffer,
}

impl ConsumerFrame<'_> {
    /// Duration of the step that produced this frame, in milliseconds.
    pub fn step_duration_ms(&self) -> f32 {
        self.buffer.step_duration_ms()
    }

    /// Hand the buffer back to the producer.
    pub fn release(self) {}
}

impl Drop for ConsumerFrame<'_> {
    fn drop(&mut self) {
        self.buffer.set_state(BufferState::Consumed);
    }
}

impl RecordStore for ConsumerFrame<'_> {
    fn capacity(&self) -> usize {
        self.buffer.layout.capacity()
    }

    fn read_word(&self, index: usize) -> u32 {
        self.buffer.record_word(index).load(Ordering::Relaxed)
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.buffer.record_word(index).store(value, Ordering::Relaxed);
    }
}
