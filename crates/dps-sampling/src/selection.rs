//! Acceptance predicates over hadron-level events.
//!
//! Every status check goes through the event's own schema, so the same
//! selection gives the same answer for a generator-native record and for its
//! minimal-schema conversion.

use dps_types::{Event, FourVector, ParticleIndex, ParticleStatus};
use serde::{Deserialize, Serialize};

/// A pure predicate deciding whether an event is kept.
pub trait Selection {
    /// Whether `event` passes.
    fn accepts(&self, event: &Event) -> bool;
}

impl<F: Fn(&Event) -> bool> Selection for F {
    fn accepts(&self, event: &Event) -> bool {
        self(event)
    }
}

/// Accepts every event. Used for unconditioned production.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Selection for AcceptAll {
    fn accepts(&self, _event: &Event) -> bool {
        true
    }
}

/// Kinematic requirements on one particle. Bounds are strict, as in the
/// production selections (`pT > min_pt`), except that a zero minimum accepts
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicCuts {
    /// Minimum transverse momentum (GeV).
    #[serde(default)]
    pub min_pt: f64,
    /// Maximum absolute pseudorapidity; `None` for no limit.
    #[serde(default)]
    pub max_abs_eta: Option<f64>,
    /// Minimum total momentum (GeV).
    #[serde(default)]
    pub min_p: f64,
}

impl KinematicCuts {
    /// Cuts that only require `pT > min_pt`.
    pub const fn min_pt(min_pt: f64) -> Self {
        Self {
            min_pt,
            max_abs_eta: None,
            min_p: 0.0,
        }
    }

    /// Whether a momentum passes.
    pub fn passes(&self, momentum: &FourVector) -> bool {
        let above = |value: f64, min: f64| min <= 0.0 || value > min;
        above(momentum.pt(), self.min_pt)
            && above(momentum.p(), self.min_p)
            && self.max_abs_eta.is_none_or(|max| momentum.eta().abs() < max)
    }
}

/// Which canonical statuses count as observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observability {
    /// Only stable final-state particles.
    FinalOnly,
    /// Final-state particles and hadrons that decayed in the record, which is
    /// how short-lived resonances like the phi appear.
    #[default]
    FinalOrDecayed,
}

impl Observability {
    /// Whether a status is observed under this mode.
    pub const fn admits(self, status: ParticleStatus) -> bool {
        match self {
            Self::FinalOnly => status.is_final(),
            Self::FinalOrDecayed => status.is_final() || status.is_decayed(),
        }
    }
}

/// Requirement on the decay products of each selected candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DaughterRequirement {
    /// Absolute PDG code of the daughters.
    pub pdg_abs: u32,
    /// How many such daughters must pass the cuts.
    pub min_count: usize,
    /// Cuts each daughter must pass.
    #[serde(default)]
    pub cuts: KinematicCuts,
}

/// Requires at least `min_count` observed particles of one species passing
/// kinematic cuts, optionally with qualifying decay products.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleSelection {
    /// Absolute PDG code of the candidates.
    pub pdg_abs: u32,
    /// Which statuses count as observed.
    #[serde(default)]
    pub observability: Observability,
    /// Cuts each candidate must pass.
    #[serde(default)]
    pub cuts: KinematicCuts,
    /// Number of passing candidates required.
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    /// Optional decay-product requirement per candidate.
    #[serde(default)]
    pub daughters: Option<DaughterRequirement>,
}

const fn default_min_count() -> usize {
    1
}

impl ParticleSelection {
    /// One observed particle of `pdg_abs`, no cuts.
    pub const fn species(pdg_abs: u32) -> Self {
        Self {
            pdg_abs,
            observability: Observability::FinalOrDecayed,
            cuts: KinematicCuts {
                min_pt: 0.0,
                max_abs_eta: None,
                min_p: 0.0,
            },
            min_count: 1,
            daughters: None,
        }
    }

    /// Replace the candidate cuts.
    #[must_use]
    pub const fn with_cuts(mut self, cuts: KinematicCuts) -> Self {
        self.cuts = cuts;
        self
    }

    /// Require this many passing candidates.
    #[must_use]
    pub const fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Require decay products of each candidate.
    #[must_use]
    pub const fn with_daughters(mut self, daughters: DaughterRequirement) -> Self {
        self.daughters = Some(daughters);
        self
    }

    /// Number of candidates in `event` that pass every requirement.
    pub fn count_candidates(&self, event: &Event) -> usize {
        event
            .particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.abs_pdg() == self.pdg_abs)
            .filter(|(_, p)| self.observability.admits(event.status_of(p)))
            .filter(|(_, p)| self.cuts.passes(&p.momentum))
            .filter(|&(i, _)| self.daughters_pass(event, ParticleIndex(i)))
            .count()
    }

    fn daughters_pass(&self, event: &Event, candidate: ParticleIndex) -> bool {
        let Some(requirement) = self.daughters else {
            return true;
        };
        let passing = event
            .daughters(candidate)
            .filter(|(_, d)| d.abs_pdg() == requirement.pdg_abs && requirement.cuts.passes(&d.momentum))
            .count();
        passing >= requirement.min_count
    }
}

impl Selection for ParticleSelection {
    fn accepts(&self, event: &Event) -> bool {
        self.min_count == 0 || self.count_candidates(event) >= self.min_count
    }
}
