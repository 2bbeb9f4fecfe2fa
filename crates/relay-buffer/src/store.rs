use glam::Mat4;

use crate::layout::{
    ANGULAR_SPEED_OFFSET, BODY_DATA_SIZE, BufferLayout, COLLISIONS_OFFSET, LINEAR_SPEED_OFFSET,
    MAX_COLLISIONS, NO_COLLISION, TRANSFORM_OFFSET,
};
use crate::record::BodyRecord;

/// Word-level access to a record region.
///
/// Indices are relative to the first record, never to the header. Slots
/// must be below [`RecordStore::capacity`]; callers get them from the slot
/// allocator, so an out-of-range slot is a bug and panics.
pub trait RecordStore {
    /// Number of records.
    fn capacity(&self) -> usize;

    /// Read one word of the record region.
    fn read_word(&self, index: usize) -> u32;

    /// Write one word of the record region.
    fn write_word(&mut self, index: usize, value: u32);

    /// Decode the whole record at `slot`.
    fn read_record(&self, slot: usize) -> BodyRecord {
        let base = BufferLayout::record_offset(slot);
        let mut words = [0u32; BODY_DATA_SIZE];
        for (i, w) in words.iter_mut().enumerate() {
            *w = self.read_word(base + i);
        }
        BodyRecord::from_words(&words)
    }

    /// Overwrite the whole record at `slot`.
    fn write_record(&mut self, slot: usize, record: &BodyRecord) {
        let base = BufferLayout::record_offset(slot);
        for (i, w) in record.to_words().into_iter().enumerate() {
            self.write_word(base + i, w);
        }
    }

    /// Read the transform at `slot`.
    fn read_matrix(&self, slot: usize) -> Mat4 {
        let base = BufferLayout::record_offset(slot) + TRANSFORM_OFFSET;
        let mut cols = [0.0f32; 16];
        for (i, c) in cols.iter_mut().enumerate() {
            *c = f32::from_bits(self.read_word(base + i));
        }
        Mat4::from_cols_array(&cols)
    }

    /// Write the transform at `slot`.
    fn write_matrix(&mut self, slot: usize, matrix: &Mat4) {
        let base = BufferLayout::record_offset(slot) + TRANSFORM_OFFSET;
        for (i, v) in matrix.to_cols_array().into_iter().enumerate() {
            self.write_word(base + i, v.to_bits());
        }
    }

    /// Write linear and angular speed at `slot`.
    fn write_speeds(&mut self, slot: usize, linear: f32, angular: f32) {
        let base = BufferLayout::record_offset(slot);
        self.write_word(base + LINEAR_SPEED_OFFSET, linear.to_bits());
        self.write_word(base + ANGULAR_SPEED_OFFSET, angular.to_bits());
    }

    /// Write collision slots at `slot`, truncating past [`MAX_COLLISIONS`]
    /// and padding the rest with [`NO_COLLISION`].
    fn write_collisions(&mut self, slot: usize, colliding: &[usize]) {
        let base = BufferLayout::record_offset(slot) + COLLISIONS_OFFSET;
        for i in 0..MAX_COLLISIONS {
            let value = colliding.get(i).map_or(NO_COLLISION, |s| *s as i32);
            self.write_word(base + i, value as u32);
        }
    }

    /// Colliding slots at `slot`, stopping at the first sentinel.
    fn read_collisions(&self, slot: usize) -> Vec<usize> {
        self.read_record(slot).colliding_slots().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferBuffer;

    #[test]
    fn collisions_are_truncated_and_padded() {
        let mut store = TransferBuffer::new(2).unwrap();
        let many: Vec<usize> = (0..12).collect();
        store.write_collisions(1, &many);
        assert_eq!(store.read_collisions(1), (0..MAX_COLLISIONS).collect::<Vec<_>>());

        store.write_collisions(1, &[5]);
        assert_eq!(store.read_collisions(1), vec![5]);
        assert_eq!(store.read_record(1).collisions[1], NO_COLLISION);
    }

    #[test]
    fn matrix_writes_stay_inside_their_record() {
        let mut store = TransferBuffer::new(3).unwrap();
        let m = Mat4::from_scale(glam::Vec3::splat(2.0));
        store.write_matrix(1, &m);
        store.write_speeds(1, 1.5, 0.5);
        assert_eq!(store.read_matrix(1), m);
        assert_eq!(store.read_record(0), BodyRecord::default());
        assert_eq!(store.read_record(2), BodyRecord::default());
        assert_eq!(store.read_record(1).linear_speed, 1.5);
    }
}
