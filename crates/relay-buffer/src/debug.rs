use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use relay_core::DebugLine;

use crate::error::{BufferError, BufferResult};
use crate::layout::BufferState;

const STATE_WORD: usize = 0;
const COUNT_WORD: usize = 1;
const HEADER: usize = 2;

/// Line vertices for debug drawing, behind its own sync flag.
///
/// Layout: word 0 flag, word 1 vertex count, then `max_vertices × 3`
/// position floats, then `max_vertices × 3` color floats. Each line uses two
/// vertices. The worker writes only when the host has consumed the previous
/// batch; otherwise the batch is dropped.
#[derive(Debug, Clone)]
pub struct DebugBuffer {
    words: Arc<[AtomicU32]>,
    max_vertices: usize,
}

impl DebugBuffer {
    /// A buffer holding at most `max_vertices` vertices.
    pub fn new(max_vertices: usize) -> BufferResult<Self> {
        if max_vertices < 2 {
            return Err(BufferError::ZeroCapacity);
        }
        let words = (0..HEADER + max_vertices * 6)
            .map(|_| AtomicU32::new(0))
            .collect();
        Ok(Self {
            words,
            max_vertices,
        })
    }

    /// Maximum vertex count.
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    /// Current sync flag.
    pub fn state(&self) -> BufferState {
        BufferState::from_word(self.words[STATE_WORD].load(Ordering::Acquire))
    }

    /// Write a batch of lines and publish it. Lines past capacity are dropped.
    ///
    /// Returns `false` without writing when the previous batch is unread.
    pub fn try_publish(&self, lines: &[DebugLine]) -> bool {
        if self.state() == BufferState::Ready {
            return false;
        }
        let colors = HEADER + self.max_vertices * 3;
        let mut count = 0;
        for line in lines.iter().take(self.max_vertices / 2) {
            for point in [line.from, line.to] {
                self.store_vec(HEADER + count * 3, point);
                self.store_vec(colors + count * 3, line.color);
                count += 1;
            }
        }
        self.words[COUNT_WORD].store(count as u32, Ordering::Relaxed);
        self.words[STATE_WORD].store(BufferState::Ready.as_word(), Ordering::Release);
        true
    }

    /// Read the published batch and hand the buffer back.
    pub fn try_take(&self) -> Option<Vec<DebugLine>> {
        if self.state() != BufferState::Ready {
            return None;
        }
        let count = self.words[COUNT_WORD].load(Ordering::Relaxed) as usize;
        let colors = HEADER + self.max_vertices * 3;
        let lines = (0..count / 2)
            .map(|i| DebugLine {
                from: self.load_vec(HEADER + i * 6),
                to: self.load_vec(HEADER + i * 6 + 3),
                color: self.load_vec(colors + i * 6),
            })
            .collect();
        self.words[STATE_WORD].store(BufferState::Consumed.as_word(), Ordering::Release);
        Some(lines)
    }

    fn store_vec(&self, at: usize, v: Vec3) {
        for (i, c) in v.to_array().into_iter().enumerate() {
            self.words[at + i].store(c.to_bits(), Ordering::Relaxed);
        }
    }

    fn load_vec(&self, at: usize) -> Vec3 {
        let c = |i: usize| f32::from_bits(self.words[at + i].load(Ordering::Relaxed));
        Vec3::new(c(0), c(1), c(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x: f32) -> DebugLine {
        DebugLine {
            from: Vec3::new(x, 0.0, 0.0),
            to: Vec3::new(x, 1.0, 0.0),
            color: Vec3::new(0.0, 1.0, 0.0),
        }
    }

    #[test]
    fn batches_wait_for_the_reader() {
        let buffer = DebugBuffer::new(8).unwrap();
        assert!(buffer.try_take().is_none());
        assert!(buffer.try_publish(&[line(1.0), line(2.0)]));
        assert!(!buffer.try_publish(&[line(3.0)]));

        let lines = buffer.try_take().unwrap();
        assert_eq!(lines, vec![line(1.0), line(2.0)]);
        assert_eq!(buffer.state(), BufferState::Consumed);
        assert!(buffer.try_publish(&[line(3.0)]));
    }

    #[test]
    fn excess_lines_are_dropped() {
        let buffer = DebugBuffer::new(4).unwrap();
        let lines: Vec<_> = (0..5).map(|i| line(i as f32)).collect();
        assert!(buffer.try_publish(&lines));
        assert_eq!(buffer.try_take().unwrap().len(), 2);
    }
}
