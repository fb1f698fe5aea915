//! Per-species particle counts over written events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::pdg;

/// Counts of tracked species among the observable (final or decayed)
/// particles of every recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesTally {
    counts: BTreeMap<u32, u64>,
}

impl SpeciesTally {
    /// Species tracked unless configured otherwise: J/psi, phi, muon.
    pub const DEFAULT_SPECIES: [u32; 3] = [pdg::JPSI.unsigned_abs(), pdg::PHI.unsigned_abs(), pdg::MUON.unsigned_abs()];

    /// Track the given absolute PDG codes.
    pub fn new(species: impl IntoIterator<Item = u32>) -> Self {
        Self {
            counts: species.into_iter().map(|code| (code, 0)).collect(),
        }
    }

    /// Add the tracked particles of one event.
    pub fn record(&mut self, event: &Event) {
        for particle in event.particles() {
            let status = event.status_of(particle);
            if !(status.is_final() || status.is_decayed()) {
                continue;
            }
            if let Some(count) = self.counts.get_mut(&particle.abs_pdg()) {
                *count = count.saturating_add(1);
            }
        }
    }

    /// Count for one species, 0 if it is not tracked.
    pub fn count(&self, pdg_abs: u32) -> u64 {
        self.counts.get(&pdg_abs).copied().unwrap_or(0)
    }

    /// Tracked species and their counts, ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(&code, &count)| (code, count))
    }
}

impl Default for SpeciesTally {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPECIES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{FourVector, Particle, Schema};

    #[test]
    fn counts_observable_tracked_particles() {
        let mut event = Event::new(1, Schema::Rich);
        event.add_particle(Particle::new(1, 333, -83, FourVector::ZERO)).unwrap();
        event.add_particle(Particle::new(2, 13, 91, FourVector::ZERO)).unwrap();
        event.add_particle(Particle::new(3, -13, 91, FourVector::ZERO)).unwrap();
        // Intermediate, not counted.
        event.add_particle(Particle::new(4, 443, -62, FourVector::ZERO)).unwrap();
        // Untracked.
        event.add_particle(Particle::new(5, 211, 84, FourVector::ZERO)).unwrap();

        let mut tally = SpeciesTally::default();
        tally.record(&event);
        tally.record(&event);
        assert_eq!(tally.count(333), 2);
        assert_eq!(tally.count(13), 4);
        assert_eq!(tally.count(443), 0);
        assert_eq!(tally.count(211), 0);
        assert_eq!(tally.iter().count(), 3);
    }

    #[test]
    fn classification_uses_event_schema() {
        let mut event = Event::new(1, Schema::Minimal);
        event.add_particle(Particle::new(1, 333, 2, FourVector::ZERO)).unwrap();
        event.add_particle(Particle::new(2, 333, 62, FourVector::ZERO)).unwrap();
        let mut tally = SpeciesTally::new([333]);
        tally.record(&event);
        assert_eq!(tally.count(333), 1);
    }
}
