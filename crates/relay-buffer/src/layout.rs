use crate::error::{BufferError, BufferResult};

/// Words reserved at the start of a shared buffer.
pub const HEADER_LENGTH: usize = 10;
/// Header word holding the [`BufferState`].
pub const STATE_WORD: usize = 0;
/// Header word holding the last step duration in milliseconds (`f32` bits).
pub const STEP_DURATION_WORD: usize = 1;

/// Words per body record.
pub const BODY_DATA_SIZE: usize = 26;
/// Record offset of the column-major 4×4 transform.
pub const TRANSFORM_OFFSET: usize = 0;
/// Record offset of the linear speed.
pub const LINEAR_SPEED_OFFSET: usize = 16;
/// Record offset of the angular speed.
pub const ANGULAR_SPEED_OFFSET: usize = 17;
/// Record offset of the first collision slot.
pub const COLLISIONS_OFFSET: usize = 18;
/// Collision slots per record.
pub const MAX_COLLISIONS: usize = BODY_DATA_SIZE - COLLISIONS_OFFSET;
/// Collision slot value meaning "no collision".
pub const NO_COLLISION: i32 = -1;

/// Sync flag stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BufferState {
    /// Nothing has been produced yet.
    Uninitialized = 0,
    /// The producer published a frame; the consumer may read it.
    Ready = 1,
    /// The consumer is done; the producer may write again.
    Consumed = 2,
}

impl BufferState {
    /// Decode a header word. Unknown values read as uninitialized.
    pub fn from_word(word: u32) -> Self {
        match word {
            1 => Self::Ready,
            2 => Self::Consumed,
            _ => Self::Uninitialized,
        }
    }

    /// Encode for the header word.
    pub fn as_word(self) -> u32 {
        self as u32
    }
}

/// Sizes derived from a record capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    capacity: usize,
}

impl BufferLayout {
    /// Layout for `capacity` records.
    pub fn new(capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if i32::try_from(capacity).is_err() {
            return Err(BufferError::CapacityTooLarge(capacity));
        }
        Ok(Self { capacity })
    }

    /// Number of records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Words in the record region.
    pub fn record_words(&self) -> usize {
        self.capacity * BODY_DATA_SIZE
    }

    /// Words in a shared buffer: header plus records.
    pub fn shared_words(&self) -> usize {
        HEADER_LENGTH + self.record_words()
    }

    /// Bytes in a shared buffer.
    pub fn shared_bytes(&self) -> usize {
        self.shared_words() * 4
    }

    /// First word of `slot` within the record region.
    pub fn record_offset(slot: usize) -> usize {
        slot * BODY_DATA_SIZE
    }

    /// Human-readable summary, one field per line.
    pub fn report(&self) -> String {
        [
            format!("capacity: {}", self.capacity),
            format!("header words: {HEADER_LENGTH}"),
            format!("record stride: {BODY_DATA_SIZE}"),
            format!("total words: {}", self.shared_words()),
            format!("total bytes: {}", self.shared_bytes()),
            format!(
                "transform: {TRANSFORM_OFFSET}..{}",
                TRANSFORM_OFFSET + 16
            ),
            format!("linear speed: {LINEAR_SPEED_OFFSET}"),
            format!("angular speed: {ANGULAR_SPEED_OFFSET}"),
            format!(
                "collisions: {COLLISIONS_OFFSET}..{BODY_DATA_SIZE} ({MAX_COLLISIONS} slots)"
            ),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_describes_layout() {
        let layout = BufferLayout::new(4).unwrap();
        insta::assert_snapshot!(layout.report(), @r"
        capacity: 4
        header words: 10
        record stride: 26
        total words: 114
        total bytes: 456
        transform: 0..16
        linear speed: 16
        angular speed: 17
        collisions: 18..26 (8 slots)
        ");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(BufferLayout::new(0), Err(BufferError::ZeroCapacity));
    }

    #[test]
    fn state_words_round_trip() {
        for state in [
            BufferState::Uninitialized,
            BufferState::Ready,
            BufferState::Consumed,
        ] {
            assert_eq!(BufferState::from_word(state.as_word()), state);
        }
        assert_eq!(BufferState::from_word(99), BufferState::Uninitialized);
    }

    #[test]
    fn collision_slots_fill_the_record() {
        assert_eq!(MAX_COLLISIONS, 8);
        assert_eq!(BufferLayout::record_offset(3), 78);
    }
}
