//! Sampling statistics folded by the run loop.

use dps_types::SpeciesTally;
use serde::{Deserialize, Serialize};

use crate::engine::SampleOutcome;

/// Accumulated counts over a sampling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingStats {
    /// Partonic states that reached the engine.
    pub states_processed: u64,
    /// States whose conditioning succeeded (events written).
    pub accepted: u64,
    /// States dropped after the retry budget ran out.
    pub exhausted: u64,
    /// Hadronization attempts over all states.
    pub total_attempts: u64,
    /// Attempts lost to transient failures.
    pub transient_failures: u64,
    /// Source records or loads that failed and were skipped.
    pub aborts: u64,
    /// Tracked species among accepted events.
    pub species: SpeciesTally,
}

impl SamplingStats {
    /// Empty statistics tracking the given species.
    pub fn new(species: SpeciesTally) -> Self {
        Self {
            species,
            ..Self::default()
        }
    }

    /// Fold one engine outcome.
    pub fn record(&mut self, outcome: &SampleOutcome) {
        self.states_processed = self.states_processed.saturating_add(1);
        self.total_attempts = self.total_attempts.saturating_add(u64::from(outcome.attempts()));
        self.transient_failures = self
            .transient_failures
            .saturating_add(u64::from(outcome.transient_failures()));
        match outcome {
            SampleOutcome::Accepted { event, .. } => {
                self.accepted = self.accepted.saturating_add(1);
                self.species.record(event);
            }
            SampleOutcome::Exhausted { .. } => {
                self.exhausted = self.exhausted.saturating_add(1);
            }
        }
    }

    /// Count one skipped source record.
    pub const fn record_abort(&mut self) {
        self.aborts = self.aborts.saturating_add(1);
    }

    /// Fraction of processed states that were accepted.
    pub fn efficiency(&self) -> f64 {
        ratio(self.accepted, self.states_processed)
    }

    /// Mean attempts per processed state.
    pub fn mean_attempts(&self) -> f64 {
        ratio(self.total_attempts, self.states_processed)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
