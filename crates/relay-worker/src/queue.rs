use std::collections::VecDeque;

use glam::Mat4;
use relay_core::{
    BodyId, BodyOptions, BodyUpdate, ConstraintId, ConstraintOptions, ShapeGeometry,
    ShapeOptions, ShapesId,
};

/// A lifecycle command waiting for the next drain.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCommand {
    /// Create a body and bind it to a slot.
    AddBody {
        /// Id to bind.
        id: BodyId,
        /// Initial world transform.
        matrix: Mat4,
        /// Validated body options.
        options: BodyOptions,
    },
    /// Change body options.
    UpdateBody {
        /// Target body.
        id: BodyId,
        /// Validated changes.
        update: BodyUpdate,
    },
    /// Destroy a body and free its slot.
    RemoveBody {
        /// Target body.
        id: BodyId,
    },
    /// Attach shapes to a body that may not exist yet.
    AddShapes {
        /// Receiving body.
        body: BodyId,
        /// Batch id.
        shapes: ShapesId,
        /// Shape options.
        options: ShapeOptions,
        /// Vertices to fit against.
        geometry: Option<ShapeGeometry>,
    },
    /// Join two bodies that may not exist yet.
    AddConstraint {
        /// Constraint id.
        id: ConstraintId,
        /// First body.
        body: BodyId,
        /// Second body.
        target: BodyId,
        /// Validated options.
        options: ConstraintOptions,
    },
    /// Re-seat a body from its buffer pose and stop it.
    ResetDynamicBody {
        /// Target body.
        id: BodyId,
    },
    /// Wake a body.
    ActivateBody {
        /// Target body.
        id: BodyId,
    },
}

impl PendingCommand {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddBody { .. } => "add_body",
            Self::UpdateBody { .. } => "update_body",
            Self::RemoveBody { .. } => "remove_body",
            Self::AddShapes { .. } => "add_shapes",
            Self::AddConstraint { .. } => "add_constraint",
            Self::ResetDynamicBody { .. } => "reset_dynamic_body",
            Self::ActivateBody { .. } => "activate_body",
        }
    }

    /// Whether this command needs `id` to be live before it can run.
    pub fn depends_on(&self, id: BodyId) -> bool {
        match self {
            Self::AddBody { .. } => false,
            Self::UpdateBody { id: own, .. }
            | Self::RemoveBody { id: own }
            | Self::ResetDynamicBody { id: own }
            | Self::ActivateBody { id: own } => *own == id,
            Self::AddShapes { body, .. } => *body == id,
            Self::AddConstraint { body, target, .. } => *body == id || *target == id,
        }
    }
}

/// What happened to a command during a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// It ran.
    Applied,
    /// Its dependencies are missing; keep it for the next drain.
    Deferred,
    /// It can never run; forget it.
    Dropped,
}

/// Counts from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Commands that ran.
    pub applied: usize,
    /// Commands put back to wait.
    pub deferred: usize,
    /// Commands that failed and were forgotten.
    pub dropped: usize,
    /// Deferred commands discarded because a body they waited on was removed.
    pub superseded: usize,
}

/// FIFO of commands replayed once per tick.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<PendingCommand>,
}

impl CommandQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn push(&mut self, command: PendingCommand) {
        self.pending.push_back(command);
    }

    /// Number of waiting commands.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waiting commands in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommand> {
        self.pending.iter()
    }

    /// Whether an `AddBody` for `id` is waiting.
    pub fn has_pending_add(&self, id: BodyId) -> bool {
        self.pending
            .iter()
            .any(|c| matches!(c, PendingCommand::AddBody { id: own, .. } if *own == id))
    }

    /// Run every waiting command once, in arrival order.
    ///
    /// Deferred commands go back in the same relative order. When a
    /// `RemoveBody` is applied, commands deferred earlier in this drain that
    /// wait on the removed body are discarded.
    pub fn drain(&mut self, mut apply: impl FnMut(&PendingCommand) -> Outcome) -> DrainReport {
        let mut report = DrainReport::default();
        let batch = std::mem::take(&mut self.pending);
        for command in batch {
            match apply(&command) {
                Outcome::Applied => {
                    report.applied += 1;
                    if let PendingCommand::RemoveBody { id } = command {
                        report.superseded += self.discard_for(id);
                    }
                }
                Outcome::Deferred => {
                    report.deferred += 1;
                    self.pending.push_back(command);
                }
                Outcome::Dropped => report.dropped += 1,
            }
        }
        report
    }

    /// Discard every waiting command that depends on `id`. Returns how many.
    pub fn discard_for(&mut self, id: BodyId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|c| !c.depends_on(id));
        before - self.pending.len()
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

    fn add(n: u128) -> PendingCommand {
        PendingCommand::AddBody {
            id: id(n),
            matrix: Mat4::IDENTITY,
            options: BodyOptions::default(),
        }
    }

    fn shapes(n: u128) -> PendingCommand {
        PendingCommand::AddShapes {
            body: id(n),
            shapes: ShapesId::from_u128(n),
            options: ShapeOptions::default(),
            geometry: None,
        }
    }

    #[test]
    fn deferred_commands_keep_their_order() {
        let mut queue = CommandQueue::new();
        queue.push(shapes(1));
        queue.push(add(9));
        queue.push(shapes(2));

        let report = queue.drain(|c| match c {
            PendingCommand::AddBody { .. } => Outcome::Applied,
            _ => Outcome::Deferred,
        });
        assert_eq!(report.applied, 1);
        assert_eq!(report.deferred, 2);
        let left: Vec<_> = queue.iter().cloned().collect();
        assert_eq!(left, vec![shapes(1), shapes(2)]);
    }

    #[test]
    fn dropped_commands_disappear() {
        let mut queue = CommandQueue::new();
        queue.push(PendingCommand::RemoveBody { id: id(3) });
        let report = queue.drain(|_| Outcome::Dropped);
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn removal_supersedes_waiting_commands() {
        let mut queue = CommandQueue::new();
        queue.push(PendingCommand::AddConstraint {
            id: ConstraintId::from_u128(1),
            body: id(1),
            target: id(2),
            options: ConstraintOptions::default(),
        });
        queue.push(shapes(2));
        queue.push(shapes(3));
        queue.push(PendingCommand::RemoveBody { id: id(2) });

        let report = queue.drain(|c| match c {
            PendingCommand::RemoveBody { .. } => Outcome::Applied,
            _ => Outcome::Deferred,
        });
        assert_eq!(report.superseded, 2);
        assert_eq!(queue.iter().cloned().collect::<Vec<_>>(), vec![shapes(3)]);
    }

    #[test]
    fn pending_add_is_visible() {
        let mut queue = CommandQueue::new();
        queue.push(add(4));
        assert!(queue.has_pending_add(id(4)));
        assert!(!queue.has_pending_add(id(5)));
    }

    proptest! {
        #[test]
        fn drain_preserves_relative_order(defer in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut queue = CommandQueue::new();
            for n in 0..defer.len() {
                queue.push(shapes(n as u128));
            }
            let deferred: HashSet<u128> = defer
                .iter()
                .enumerate()
                .filter(|(_, d)| **d)
                .map(|(n, _)| n as u128)
                .collect();

            queue.drain(|c| match c {
                PendingCommand::AddShapes { shapes, .. } if deferred.contains(&shapes.0.as_u128()) => {
                    Outcome::Deferred
                }
                _ => Outcome::Applied,
            });

            let left: Vec<u128> = queue
                .iter()
                .map(|c| match c {
                    PendingCommand::AddShapes { shapes, .. } => shapes.0.as_u128(),
                    _ => u128::MAX,
                })
                .collect();
            let mut expected: Vec<u128> = deferred.into_iter().collect();
            expected.sort_unstable();
            prop_assert_eq!(left, expected);
        }
    }
}
