//! The stochastic transformer seam.
//!
//! A [`Hadronizer`] turns a loaded parton-level state into a hadron-level
//! event, one random draw per [`Hadronizer::hadronize`] call. The engine
//! never looks inside it; it only needs to snapshot the working state before
//! the first draw and put it back before every retry.

use dps_types::{Event, PartonicState};

/// Errors raised by a hadronizer outside the per-attempt step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HadronizerError {
    /// The hadronizer cannot be constructed with these settings.
    #[error("invalid hadronizer configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },

    /// This particular state cannot be hadronized.
    #[error("partonic state {event} rejected: {reason}")]
    Rejected {
        /// Sequence number of the rejected state.
        event: u64,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result of one stochastic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The working event now holds a hadron-level record.
    Success,
    /// The step failed for this draw only; the working state is unusable
    /// until restored.
    TransientFailure,
}

/// A stateful stochastic transformer from partonic states to events.
pub trait Hadronizer {
    /// Complete copy of the working configuration, including any auxiliary
    /// bookkeeping next to the visible event. The random generator is not
    /// part of it, so draws after a restore are fresh.
    type Checkpoint;

    /// Replace the working state with a new partonic input.
    fn load(&mut self, state: PartonicState) -> Result<(), HadronizerError>;

    /// Snapshot the working configuration.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Put a snapshot back.
    fn restore(&mut self, checkpoint: &Self::Checkpoint);

    /// Apply one stochastic step to the working state.
    fn hadronize(&mut self) -> StepOutcome;

    /// The working event.
    fn event(&self) -> &Event;
}
