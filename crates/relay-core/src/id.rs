use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Build an identifier from a fixed value. Useful for scripted scenes.
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.0.simple().to_string()[..8])
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id! {
    /// Host-chosen identifier of a physics body.
    ///
    /// The worker never interprets it; it is only bound to a buffer slot.
    BodyId
}

opaque_id! {
    /// Identifier of one `ADD_SHAPES` batch, used to detach the same shapes later.
    ShapesId
}

opaque_id! {
    /// Identifier of a constraint between two bodies.
    ConstraintId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_short_prefix() {
        let id = BodyId::from_u128(0xdead_beef_0000_0000_0000_0000_0000_0001);
        assert_eq!(id.to_string(), "deadbeef");
    }

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(BodyId::new(), BodyId::new());
        assert_ne!(ShapesId::new(), ShapesId::new());
    }

    #[test]
    fn ids_round_trip_through_json() {
        let id = ConstraintId::from_u128(7);
        let json = serde_json::to_string(&id).unwrap();
        let back: ConstraintId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
