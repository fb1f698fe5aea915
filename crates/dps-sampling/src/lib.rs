//! Conditioned sampling of stochastic hadronization.
//!
//! Rare final states are enriched by retrying the stochastic step from a
//! restored checkpoint until a [`Selection`] accepts, within a bounded budget.
//!
//! # Modules
//!
//! - [`hadronizer`] -- The [`Hadronizer`] seam and its step outcome
//! - [`selection`] -- [`Selection`] predicates: [`AcceptAll`], [`ParticleSelection`]
//! - [`engine`] -- [`sample`], the checkpoint/restore retry loop
//! - [`stats`] -- [`SamplingStats`] accumulator
//! - [`run`] -- [`run_sampling`], the source-to-writer driver loop
//! - [`toy`] -- [`ToyHadronizer`], a seeded reference hadronizer

pub mod engine;
pub mod hadronizer;
pub mod run;
pub mod selection;
pub mod stats;
pub mod toy;

pub use engine::{SampleOutcome, sample};
pub use hadronizer::{Hadronizer, HadronizerError, StepOutcome};
pub use run::{EndReason, NoOpProgress, ProgressCallback, RunOptions, SamplingError, SamplingFailure, SamplingReport, log_sampling_end, run_sampling};
pub use selection::{AcceptAll, DaughterRequirement, KinematicCuts, Observability, ParticleSelection, Selection};
pub use stats::SamplingStats;
pub use toy::{ToyConfig, ToyHadronizer};
