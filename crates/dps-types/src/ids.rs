//! Type-safe identifier and arena-index wrappers.
//!
//! Record identifiers ([`ParticleId`], [`VertexId`]) are the numbers written
//! to event files (barcodes). They are unique within one event but not across
//! events, which is why composite assembly has to remap them.
//!
//! Arena indices ([`ParticleIndex`], [`VertexIndex`]) address entries inside
//! the owning [`Event`](crate::Event) and are what vertex edges store.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a signed record identifier.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw identifier value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Absolute value of the identifier, used to size remapping offsets.
            pub const fn magnitude(self) -> u64 {
                self.0.unsigned_abs()
            }

            /// Move the identifier `offset` further away from zero.
            ///
            /// Negative identifiers become more negative, zero and positive
            /// identifiers become more positive. Saturates at the `i64` range.
            pub const fn shifted_away_from_zero(self, offset: i64) -> Self {
                if self.0 < 0 {
                    Self(self.0.saturating_sub(offset))
                } else {
                    Self(self.0.saturating_add(offset))
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Generates a newtype wrapper around an arena position.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Return the raw arena position.
            pub const fn get(self) -> usize {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

define_id! {
    /// Record identifier (barcode) of a particle, unique within its event.
    ParticleId
}

define_id! {
    /// Record identifier (barcode) of a vertex, conventionally negative.
    VertexId
}

impl VertexId {
    /// [`Self::shifted_away_from_zero`], except that zero moves to the
    /// negative side, where vertex identifiers conventionally live.
    pub const fn shifted_outward(self, offset: i64) -> Self {
        if self.0 == 0 {
            Self(offset.saturating_neg())
        } else {
            self.shifted_away_from_zero(offset)
        }
    }
}

define_index! {
    /// Position of a particle in its event's particle arena.
    ParticleIndex
}

define_index! {
    /// Position of a vertex in its event's vertex arena.
    VertexIndex
}
