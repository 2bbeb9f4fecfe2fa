use std::collections::HashMap;

use relay_core::BodyId;

use crate::error::{WorkerError, WorkerResult};

/// Fixed-capacity slot allocator backed by an intrusive free list.
///
/// `next_free[i]` links free slot `i` to the next free slot; `None` ends the
/// list. Allocation pops the head and release pushes onto it, so both are
/// O(1) and a released slot is the next one handed out.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    next_free: Vec<Option<usize>>,
    head: Option<usize>,
    slots: HashMap<BodyId, usize>,
    owners: Vec<Option<BodyId>>,
}

impl SlotAllocator {
    /// An allocator with every slot in `0..capacity` free.
    pub fn new(capacity: usize) -> Self {
        let next_free = (0..capacity)
            .map(|i| (i + 1 < capacity).then_some(i + 1))
            .collect();
        Self {
            next_free,
            head: (capacity > 0).then_some(0),
            slots: HashMap::with_capacity(capacity),
            owners: vec![None; capacity],
        }
    }

    /// Bind `id` to a free slot.
    pub fn allocate(&mut self, id: BodyId) -> WorkerResult<usize> {
        if self.slots.contains_key(&id) {
            return Err(WorkerError::DuplicateIdentifier(id));
        }
        let slot = self
            .head
            .ok_or(WorkerError::CapacityExceeded(self.capacity()))?;
        self.head = self.next_free[slot].take();
        self.slots.insert(id, slot);
        self.owners[slot] = Some(id);
        Ok(slot)
    }

    /// Unbind `id` and return its slot to the free list.
    pub fn release(&mut self, id: BodyId) -> WorkerResult<usize> {
        let slot = self
            .slots
            .remove(&id)
            .ok_or(WorkerError::UnknownIdentifier(id))?;
        self.owners[slot] = None;
        self.next_free[slot] = self.head;
        self.head = Some(slot);
        Ok(slot)
    }

    /// Slot bound to `id`.
    pub fn slot_of(&self, id: BodyId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Identifier bound to `slot`.
    pub fn identifier_at(&self, slot: usize) -> Option<BodyId> {
        self.owners.get(slot).copied().flatten()
    }

    /// Whether `id` is bound.
    pub fn contains(&self, id: BodyId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of bound slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    /// True when no slot is free.
    pub fn is_full(&self) -> bool {
        self.head.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn id(n: u128) -> BodyId {
        BodyId::from_u128(n)
    }

    #[test]
    fn slots_are_handed_out_in_order() {
        let mut alloc = SlotAllocator::new(3);
        assert_eq!(alloc.allocate(id(1)).unwrap(), 0);
        assert_eq!(alloc.allocate(id(2)).unwrap(), 1);
        assert_eq!(alloc.identifier_at(1), Some(id(2)));
        assert_eq!(alloc.slot_of(id(1)), Some(0));
    }

    #[test]
    fn released_slot_is_reused_first() {
        let mut alloc = SlotAllocator::new(4);
        for n in 0..3 {
            alloc.allocate(id(n)).unwrap();
        }
        assert_eq!(alloc.release(id(1)).unwrap(), 1);
        assert_eq!(alloc.identifier_at(1), None);
        assert_eq!(alloc.allocate(id(9)).unwrap(), 1);
        assert_eq!(alloc.allocate(id(10)).unwrap(), 3);
    }

    #[test]
    fn capacity_boundary_fails_exactly_once() {
        let capacity = 5;
        let mut alloc = SlotAllocator::new(capacity);
        let results: Vec<_> = (0..=capacity as u128).map(|n| alloc.allocate(id(n))).collect();
        let failures = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(failures, 1);
        assert!(matches!(
            results.last(),
            Some(Err(WorkerError::CapacityExceeded(5)))
        ));
        let slots: HashSet<usize> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(slots.len(), capacity);
        assert!(alloc.is_full());
    }

    #[test]
    fn duplicate_and_unknown_identifiers() {
        let mut alloc = SlotAllocator::new(2);
        alloc.allocate(id(1)).unwrap();
        assert!(matches!(
            alloc.allocate(id(1)),
            Err(WorkerError::DuplicateIdentifier(_))
        ));
        assert_eq!(alloc.len(), 1);
        assert!(matches!(
            alloc.release(id(7)),
            Err(WorkerError::UnknownIdentifier(_))
        ));
        assert_eq!(alloc.allocate(id(2)).unwrap(), 1);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let mut alloc = SlotAllocator::new(0);
        assert!(alloc.is_full());
        assert!(alloc.allocate(id(1)).is_err());
    }

    proptest! {
        #[test]
        fn bound_slots_stay_distinct(ops in prop::collection::vec((any::<bool>(), 0u128..24), 1..200)) {
            let capacity = 8;
            let mut alloc = SlotAllocator::new(capacity);
            let mut live: HashSet<BodyId> = HashSet::new();

            for (allocate, n) in ops {
                if allocate {
                    match alloc.allocate(id(n)) {
                        Ok(slot) => {
                            prop_assert!(slot < capacity);
                            prop_assert!(live.insert(id(n)));
                        }
                        Err(WorkerError::CapacityExceeded(_)) => prop_assert_eq!(live.len(), capacity),
                        Err(WorkerError::DuplicateIdentifier(_)) => prop_assert!(live.contains(&id(n))),
                        Err(other) => prop_assert!(false, "unexpected error {other}"),
                    }
                } else {
                    let released = alloc.release(id(n));
                    prop_assert_eq!(released.is_ok(), live.remove(&id(n)));
                }

                let slots: HashSet<usize> = live.iter().filter_map(|b| alloc.slot_of(*b)).collect();
                prop_assert_eq!(slots.len(), live.len());
                prop_assert_eq!(alloc.len(), live.len());
                for b in &live {
                    let slot = alloc.slot_of(*b).unwrap();
                    prop_assert_eq!(alloc.identifier_at(slot), Some(*b));
                }
            }
        }
    }
}
