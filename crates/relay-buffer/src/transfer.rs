use crate::error::{BufferError, BufferResult};
use crate::layout::{BODY_DATA_SIZE, BufferLayout};
use crate::record::BodyRecord;
use crate::store::RecordStore;

/// Record region owned by whichever side currently holds it.
///
/// Used when the two threads cannot share memory: the worker fills it, sends
/// it to the host, and gets it back on the next `TRANSFER_DATA`. Holding the
/// value is the sync state; there is no header.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferBuffer {
    words: Vec<u32>,
}

impl TransferBuffer {
    /// A buffer of `capacity` default records.
    pub fn new(capacity: usize) -> BufferResult<Self> {
        let layout = BufferLayout::new(capacity)?;
        let blank = BodyRecord::default().to_words();
        let mut words = Vec::with_capacity(layout.record_words());
        for _ in 0..capacity {
            words.extend_from_slice(&blank);
        }
        Ok(Self { words })
    }

    /// Wrap raw record words received from elsewhere.
    pub fn from_words(words: Vec<u32>) -> BufferResult<Self> {
        if words.len() % BODY_DATA_SIZE != 0 {
            return Err(BufferError::RaggedRecords {
                words: words.len(),
                stride: BODY_DATA_SIZE,
            });
        }
        BufferLayout::new(words.len() / BODY_DATA_SIZE)?;
        Ok(Self { words })
    }

    /// Fail unless this buffer holds exactly `expected` records.
    pub fn expect_capacity(&self, expected: usize) -> BufferResult<()> {
        let actual = self.capacity();
        if actual == expected {
            Ok(())
        } else {
            Err(BufferError::CapacityMismatch { expected, actual })
        }
    }

    /// Give up the raw words.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}

impl RecordStore for TransferBuffer {
    fn capacity(&self) -> usize {
        self.words.len() / BODY_DATA_SIZE
    }

    fn read_word(&self, index: usize) -> u32 {
        self.words[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }
}
