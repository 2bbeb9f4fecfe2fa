use glam::Mat4;

use crate::layout::{
    ANGULAR_SPEED_OFFSET, BODY_DATA_SIZE, COLLISIONS_OFFSET, LINEAR_SPEED_OFFSET, MAX_COLLISIONS,
    NO_COLLISION, TRANSFORM_OFFSET,
};

/// One body's slice of the buffer, decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyRecord {
    /// Column-major world transform, scale included.
    pub matrix: Mat4,
    /// Magnitude of the linear velocity.
    pub linear_speed: f32,
    /// Magnitude of the angular velocity.
    pub angular_speed: f32,
    /// Slots of colliding bodies, padded with [`NO_COLLISION`].
    pub collisions: [i32; MAX_COLLISIONS],
}

impl Default for BodyRecord {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            linear_speed: 0.0,
            angular_speed: 0.0,
            collisions: [NO_COLLISION; MAX_COLLISIONS],
        }
    }
}

impl BodyRecord {
    /// Encode into raw words.
    pub fn to_words(&self) -> [u32; BODY_DATA_SIZE] {
        let mut words = [0u32; BODY_DATA_SIZE];
        for (i, v) in self.matrix.to_cols_array().iter().enumerate() {
            words[TRANSFORM_OFFSET + i] = v.to_bits();
        }
        words[LINEAR_SPEED_OFFSET] = self.linear_speed.to_bits();
        words[ANGULAR_SPEED_OFFSET] = self.angular_speed.to_bits();
        for (i, slot) in self.collisions.iter().enumerate() {
            words[COLLISIONS_OFFSET + i] = *slot as u32;
        }
        words
    }

    /// Decode from raw words.
    pub fn from_words(words: &[u32; BODY_DATA_SIZE]) -> Self {
        let mut cols = [0.0f32; 16];
        for (i, c) in cols.iter_mut().enumerate() {
            *c = f32::from_bits(words[TRANSFORM_OFFSET + i]);
        }
        let mut collisions = [NO_COLLISION; MAX_COLLISIONS];
        for (i, c) in collisions.iter_mut().enumerate() {
            *c = words[COLLISIONS_OFFSET + i] as i32;
        }
        Self {
            matrix: Mat4::from_cols_array(&cols),
            linear_speed: f32::from_bits(words[LINEAR_SPEED_OFFSET]),
            angular_speed: f32::from_bits(words[ANGULAR_SPEED_OFFSET]),
            collisions,
        }
    }

    /// Colliding slots, stopping at the first sentinel.
    pub fn colliding_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.collisions
            .iter()
            .take_while(|s| **s != NO_COLLISION)
            .map(|s| *s as usize)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn default_record_has_no_collisions() {
        let record = BodyRecord::default();
        assert_eq!(record.colliding_slots().count(), 0);
        assert_eq!(record.to_words()[COLLISIONS_OFFSET] as i32, NO_COLLISION);
    }

    #[test]
    fn words_keep_transform_and_slots() {
        let mut record = BodyRecord {
            matrix: Mat4::from_translation(Vec3::new(1.0, -2.0, 3.5)),
            linear_speed: 4.0,
            angular_speed: 0.25,
            ..BodyRecord::default()
        };
        record.collisions[0] = 7;
        record.collisions[1] = 0;
        let back = BodyRecord::from_words(&record.to_words());
        assert_eq!(back, record);
        assert_eq!(back.colliding_slots().collect::<Vec<_>>(), vec![7, 0]);
    }
}
