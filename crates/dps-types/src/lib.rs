//! Shared event-record data model for DPS event production.
//!
//! Every crate in the workspace speaks these types. An [`Event`] is an arena
//! of [`Particle`]s and [`Vertex`]es with index edges; its [`Schema`] tag says
//! how to read the particles' status codes.
//!
//! # Modules
//!
//! - [`ids`] -- Record identifiers and arena indices
//! - [`kinematics`] -- [`FourVector`] momenta and positions
//! - [`status`] -- Schema-tagged status codes and the canonical [`ParticleStatus`]
//! - [`event`] -- Particles, vertices, and events
//! - [`partonic`] -- Parton-level initial states with colour bookkeeping
//! - [`tally`] -- Per-species counts over recorded events

pub mod event;
pub mod ids;
pub mod kinematics;
pub mod partonic;
pub mod status;
pub mod tally;

// Re-export all public types at crate root for convenience.
pub use event::{Event, EventError, Particle, Vertex};
pub use ids::{ParticleId, ParticleIndex, VertexId, VertexIndex};
pub use kinematics::FourVector;
pub use partonic::{ColourTag, PartonicState};
pub use status::{ParticleStatus, Schema};
pub use tally::SpeciesTally;

/// Well-known PDG identity codes used by selections and tallies.
pub mod pdg {
    /// d quark.
    pub const DOWN: i32 = 1;
    /// u quark.
    pub const UP: i32 = 2;
    /// s quark.
    pub const STRANGE: i32 = 3;
    /// c quark.
    pub const CHARM: i32 = 4;
    /// Gluon.
    pub const GLUON: i32 = 21;
    /// Muon.
    pub const MUON: i32 = 13;
    /// Neutral pion.
    pub const PI0: i32 = 111;
    /// Charged pion (positive).
    pub const PI_PLUS: i32 = 211;
    /// Eta meson.
    pub const ETA: i32 = 221;
    /// Charged kaon (positive).
    pub const K_PLUS: i32 = 321;
    /// Phi meson.
    pub const PHI: i32 = 333;
    /// J/psi meson.
    pub const JPSI: i32 = 443;
    /// Proton.
    pub const PROTON: i32 = 2212;

    /// Whether a PDG code is a quark or gluon.
    pub const fn is_parton(code: i32) -> bool {
        let abs = code.unsigned_abs();
        (abs >= 1 && abs <= 6) || abs == 21
    }
}
