use std::collections::HashMap;

use relay_engine::{BodyHandle, ContactManifold};

/// Per-slot list of colliding slots, rebuilt after every step.
///
/// Each manifold is recorded once, from its owner's side. Lists keep
/// insertion order and never hold the same slot twice.
#[derive(Debug, Clone, Default)]
pub struct CollisionTracker {
    epsilon: f32,
    contacts: HashMap<usize, Vec<usize>>,
}

impl CollisionTracker {
    /// A tracker counting contacts at or under `epsilon` as collisions.
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            contacts: HashMap::new(),
        }
    }

    /// Replace all lists with what `manifolds` report.
    ///
    /// Manifolds whose bodies do not map to a slot are ignored.
    pub fn rebuild<'a>(
        &mut self,
        manifolds: impl IntoIterator<Item = &'a ContactManifold>,
        slot_of: impl Fn(BodyHandle) -> Option<usize>,
    ) {
        self.contacts.clear();
        for manifold in manifolds {
            if manifold.touching(self.epsilon).is_none() {
                continue;
            }
            let (Some(owner), Some(other)) = (slot_of(manifold.body0), slot_of(manifold.body1))
            else {
                continue;
            };
            let list = self.contacts.entry(owner).or_default();
            if !list.contains(&other) {
                list.push(other);
            }
        }
    }

    /// Slots colliding with `slot`, in the order they were found.
    pub fn collisions_for(&self, slot: usize) -> &[usize] {
        self.contacts.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Drop everything known about `slot`, so a reused slot starts clean.
    pub fn forget(&mut self, slot: usize) {
        self.contacts.remove(&slot);
        for list in self.contacts.values_mut() {
            list.retain(|s| *s != slot);
        }
    }

    /// Number of slots with at least one collision.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// True when nothing collides.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use relay_engine::ContactPoint;

    use super::*;

    fn handles() -> (BodyHandle, BodyHandle) {
        (BodyHandle::from_raw(10), BodyHandle::from_raw(20))
    }

    fn manifold(body0: BodyHandle, body1: BodyHandle, distance: f32) -> ContactManifold {
        ContactManifold {
            body0,
            body1,
            points: vec![ContactPoint {
                distance,
                position: Vec3::ZERO,
                normal: Vec3::Y,
            }],
        }
    }

    fn slot_of(a: BodyHandle, b: BodyHandle) -> impl Fn(BodyHandle) -> Option<usize> {
        move |h| {
            if h == a {
                Some(0)
            } else if h == b {
                Some(1)
            } else {
                None
            }
        }
    }

    #[test]
    fn manifold_is_recorded_from_owner_side() {
        let (a, b) = handles();
        let mut tracker = CollisionTracker::new(1e-5);
        tracker.rebuild(&[manifold(a, b, -0.01)], slot_of(a, b));
        assert_eq!(tracker.collisions_for(0), &[1]);
        assert!(tracker.collisions_for(1).is_empty());
    }

    #[test]
    fn lists_are_rebuilt_each_time() {
        let (a, b) = handles();
        let mut tracker = CollisionTracker::new(1e-5);
        tracker.rebuild(&[manifold(a, b, 0.0)], slot_of(a, b));
        assert_eq!(tracker.len(), 1);
        tracker.rebuild(std::iter::empty(), slot_of(a, b));
        assert!(tracker.is_empty());
        assert!(tracker.collisions_for(0).is_empty());
    }

    #[test]
    fn distant_and_duplicate_contacts() {
        let (a, b) = handles();
        let mut tracker = CollisionTracker::new(1e-5);
        tracker.rebuild(
            &[manifold(a, b, 0.5), manifold(a, b, -0.1), manifold(a, b, -0.2)],
            slot_of(a, b),
        );
        assert_eq!(tracker.collisions_for(0), &[1]);
    }

    #[test]
    fn forget_clears_both_directions() {
        let (a, b) = handles();
        let mut tracker = CollisionTracker::new(1e-5);
        tracker.rebuild(&[manifold(a, b, 0.0), manifold(b, a, 0.0)], slot_of(a, b));
        tracker.forget(1);
        assert!(tracker.collisions_for(0).is_empty());
        assert!(tracker.collisions_for(1).is_empty());
    }
}
