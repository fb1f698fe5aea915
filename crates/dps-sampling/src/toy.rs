//! A seeded stand-in hadronizer.
//!
//! [`ToyHadronizer`] is not a physics model. It exists so the drivers run
//! end to end without an external generator, and it keeps the property that
//! matters for conditioned sampling: its working state has auxiliary
//! bookkeeping next to the visible event. Here that is the list of
//! colour-connected parton systems, which each step consumes. A retry that
//! restored only the event would find nothing left to fragment.
//!
//! One step:
//!
//! 1. fails transiently with probability `failure_rate`;
//! 2. fragments every parton of every system into hadrons along its own
//!    direction (one vertex per system, partons re-marked `-71`, hadrons `83`);
//! 3. decays phi to K+K- and J/psi to mu+mu- (parents `-83` / `-91`,
//!    products `91`).

use dps_types::{Event, EventError, FourVector, Particle, ParticleIndex, PartonicState, Schema, Vertex, pdg};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hadronizer::{Hadronizer, HadronizerError, StepOutcome};

/// Status of a parton that went into fragmentation.
const STATUS_FRAGMENTED: i32 = -71;
/// Status of a primary hadron.
const STATUS_PRIMARY_HADRON: i32 = 83;
/// Status of a phi after its decay.
const STATUS_DECAYED_PRIMARY: i32 = -83;
/// Status of a decayed resonance such as the J/psi.
const STATUS_DECAYED: i32 = -91;
/// Status of a decay product.
const STATUS_DECAY_PRODUCT: i32 = 91;

/// Settings of the toy hadronizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyConfig {
    /// Random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Probability that a hadron carries strangeness.
    #[serde(default = "default_strangeness")]
    pub strangeness: f64,
    /// Probability that a strange hadron is a phi rather than a kaon.
    #[serde(default = "default_vector_fraction")]
    pub vector_fraction: f64,
    /// Probability that a hadron is an eta.
    #[serde(default = "default_eta_fraction")]
    pub eta_fraction: f64,
    /// Probability that a step fails transiently.
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Maximum hadrons per fragmenting parton.
    #[serde(default = "default_max_hadrons")]
    pub max_hadrons: u32,
    /// Half-width of the transverse momentum kick (GeV).
    #[serde(default = "default_kt_smear")]
    pub kt_smear: f64,
}

const fn default_seed() -> u64 {
    1
}

const fn default_strangeness() -> f64 {
    0.30
}

const fn default_vector_fraction() -> f64 {
    0.60
}

const fn default_eta_fraction() -> f64 {
    0.10
}

const fn default_failure_rate() -> f64 {
    0.01
}

const fn default_max_hadrons() -> u32 {
    5
}

const fn default_kt_smear() -> f64 {
    0.4
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            strangeness: default_strangeness(),
            vector_fraction: default_vector_fraction(),
            eta_fraction: default_eta_fraction(),
            failure_rate: default_failure_rate(),
            max_hadrons: default_max_hadrons(),
            kt_smear: default_kt_smear(),
        }
    }
}

impl ToyConfig {
    /// Check that probabilities are probabilities and ranges are non-empty.
    pub fn validate(&self) -> Result<(), HadronizerError> {
        let probabilities = [
            ("strangeness", self.strangeness),
            ("vector_fraction", self.vector_fraction),
            ("eta_fraction", self.eta_fraction),
            ("failure_rate", self.failure_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(HadronizerError::InvalidConfig {
                    reason: format!("{name} must be within [0, 1], got {value}"),
                });
            }
        }
        if self.strangeness + self.eta_fraction > 1.0 {
            return Err(HadronizerError::InvalidConfig {
                reason: String::from("strangeness + eta_fraction exceeds 1"),
            });
        }
        if self.max_hadrons == 0 {
            return Err(HadronizerError::InvalidConfig {
                reason: String::from("max_hadrons must be at least 1"),
            });
        }
        if !(self.kt_smear.is_finite() && self.kt_smear >= 0.0) {
            return Err(HadronizerError::InvalidConfig {
                reason: format!("kt_smear must be a non-negative number, got {}", self.kt_smear),
            });
        }
        Ok(())
    }
}

/// Working configuration: the event plus its parton systems.
#[derive(Debug, Clone, PartialEq)]
pub struct ToyState {
    event: Event,
    systems: Vec<Vec<ParticleIndex>>,
}

/// Seeded reference implementation of [`Hadronizer`].
pub struct ToyHadronizer {
    config: ToyConfig,
    rng: StdRng,
    working: ToyState,
}

impl ToyHadronizer {
    /// Build a hadronizer, rejecting invalid settings.
    pub fn new(config: ToyConfig) -> Result<Self, HadronizerError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            working: ToyState {
                event: Event::new(0, Schema::Rich),
                systems: Vec::new(),
            },
        })
    }

    /// Parton systems still waiting to be fragmented.
    pub fn systems(&self) -> &[Vec<ParticleIndex>] {
        &self.working.systems
    }

    fn step(&mut self) -> Result<(), EventError> {
        let systems = std::mem::take(&mut self.working.systems);
        for system in &systems {
            self.fragment(system)?;
        }
        self.decay_resonances()
    }

    fn fragment(&mut self, system: &[ParticleIndex]) -> Result<(), EventError> {
        let event = &mut self.working.event;
        let mut outgoing = Vec::new();
        for &parton in system {
            let Some(momentum) = event.particle(parton).map(|p| p.momentum) else {
                continue;
            };
            event.set_status(parton, STATUS_FRAGMENTED);

            let count = self.rng.random_range(1..=self.config.max_hadrons);
            let shares: Vec<f64> = (0..count).map(|_| self.rng.random::<f64>() + 0.1).collect();
            let total: f64 = shares.iter().sum();
            for share in shares {
                let code = pick_species(&mut self.rng, &self.config);
                let mass = mass_of(code);
                let fraction = share / total;
                let kick = self.config.kt_smear;
                let kx = self.rng.random_range(-kick..=kick);
                let ky = self.rng.random_range(-kick..=kick);
                let p = FourVector::from_mass(
                    momentum.x.mul_add(fraction, kx),
                    momentum.y.mul_add(fraction, ky),
                    momentum.z * fraction,
                    mass,
                );
                let id = event.next_particle_id();
                outgoing.push(event.add_particle(Particle::new(id, code, STATUS_PRIMARY_HADRON, p).with_mass(mass))?);
            }
        }
        let id = event.next_vertex_id();
        event.add_vertex(
            Vertex::new(id)
                .with_incoming(system.iter().copied())
                .with_outgoing(outgoing),
        )?;
        Ok(())
    }

    fn decay_resonances(&mut self) -> Result<(), EventError> {
        let candidates: Vec<(ParticleIndex, i32)> = self
            .working
            .event
            .particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| self.working.event.status_of(p).is_final())
            .filter_map(|(i, p)| match p.pdg.abs() {
                pdg::PHI => Some((ParticleIndex(i), pdg::K_PLUS)),
                pdg::JPSI => Some((ParticleIndex(i), pdg::MUON)),
                _ => None,
            })
            .collect();
        for (parent, daughter) in candidates {
            let status = if daughter == pdg::K_PLUS {
                STATUS_DECAYED_PRIMARY
            } else {
                STATUS_DECAYED
            };
            self.two_body_decay(parent, daughter, status)?;
        }
        Ok(())
    }

    fn two_body_decay(&mut self, parent: ParticleIndex, daughter: i32, parent_status: i32) -> Result<(), EventError> {
        let event = &mut self.working.event;
        let Some(p) = event.particle(parent).map(|p| p.momentum) else {
            return Ok(());
        };
        let mass = mass_of(daughter);
        let f = self.rng.random_range(0.35..=0.65);
        let qx = self.rng.random_range(-0.15..=0.15);
        let qy = self.rng.random_range(-0.15..=0.15);
        let first = FourVector::from_mass(p.x.mul_add(f, qx), p.y.mul_add(f, qy), p.z * f, mass);
        let second = FourVector::from_mass(
            p.x.mul_add(1.0 - f, -qx),
            p.y.mul_add(1.0 - f, -qy),
            p.z * (1.0 - f),
            mass,
        );

        let id = event.next_particle_id();
        let a = event.add_particle(Particle::new(id, daughter, STATUS_DECAY_PRODUCT, first).with_mass(mass))?;
        let id = event.next_particle_id();
        let b = event.add_particle(Particle::new(id, -daughter, STATUS_DECAY_PRODUCT, second).with_mass(mass))?;
        let id = event.next_vertex_id();
        event.add_vertex(Vertex::new(id).with_incoming([parent]).with_outgoing([a, b]))?;
        event.set_status(parent, parent_status);
        Ok(())
    }
}

impl Hadronizer for ToyHadronizer {
    type Checkpoint = ToyState;

    fn load(&mut self, state: PartonicState) -> Result<(), HadronizerError> {
        if state.event.schema != Schema::Rich {
            return Err(HadronizerError::Rejected {
                event: state.event.number,
                reason: format!("expected rich schema, got {}", state.event.schema),
            });
        }
        if state.event.is_empty() {
            return Err(HadronizerError::Rejected {
                event: state.event.number,
                reason: String::from("no particles"),
            });
        }
        let systems = parton_systems(&state);
        debug!(event = state.event.number, systems = systems.len(), "Partonic state loaded");
        self.working = ToyState {
            event: state.event,
            systems,
        };
        Ok(())
    }

    fn checkpoint(&self) -> ToyState {
        self.working.clone()
    }

    fn restore(&mut self, checkpoint: &ToyState) {
        self.working.clone_from(checkpoint);
    }

    fn hadronize(&mut self) -> StepOutcome {
        if self.rng.random_bool(self.config.failure_rate) {
            return StepOutcome::TransientFailure;
        }
        match self.step() {
            Ok(()) => StepOutcome::Success,
            Err(e) => {
                debug!(error = %e, "Fragmentation produced an inconsistent record");
                StepOutcome::TransientFailure
            }
        }
    }

    fn event(&self) -> &Event {
        &self.working.event
    }
}

/// Group final coloured partons into colour-connected systems.
fn parton_systems(state: &PartonicState) -> Vec<Vec<ParticleIndex>> {
    let event = &state.event;
    let partons: Vec<ParticleIndex> = event
        .particles()
        .iter()
        .enumerate()
        .map(|(i, p)| (ParticleIndex(i), p))
        .filter(|(i, p)| {
            pdg::is_parton(p.pdg) && event.status_of(p).is_final() && state.colour_of(*i).is_coloured()
        })
        .map(|(i, _)| i)
        .collect();

    let mut root: Vec<usize> = (0..partons.len()).collect();
    for (a, &pa) in partons.iter().enumerate() {
        for (b, &pb) in partons.iter().enumerate().skip(a.saturating_add(1)) {
            if state.colour_of(pa).connects(state.colour_of(pb)) {
                let (ra, rb) = (find(&root, a), find(&root, b));
                if let Some(slot) = root.get_mut(ra.max(rb)) {
                    *slot = ra.min(rb);
                }
            }
        }
    }

    let mut systems: Vec<(usize, Vec<ParticleIndex>)> = Vec::new();
    for (position, &parton) in partons.iter().enumerate() {
        let group = find(&root, position);
        match systems.iter_mut().find(|(g, _)| *g == group) {
            Some((_, members)) => members.push(parton),
            None => systems.push((group, vec![parton])),
        }
    }
    systems.into_iter().map(|(_, members)| members).collect()
}

fn find(root: &[usize], mut i: usize) -> usize {
    while let Some(&parent) = root.get(i) {
        if parent == i {
            break;
        }
        i = parent;
    }
    i
}

fn pick_species(rng: &mut StdRng, config: &ToyConfig) -> i32 {
    let roll: f64 = rng.random();
    let sign = if rng.random_bool(0.5) { 1 } else { -1 };
    if roll < config.strangeness {
        if rng.random_bool(config.vector_fraction) {
            pdg::PHI
        } else {
            pdg::K_PLUS * sign
        }
    } else if roll < config.strangeness + config.eta_fraction {
        pdg::ETA
    } else if rng.random_bool(1.0 / 3.0) {
        pdg::PI0
    } else {
        pdg::PI_PLUS * sign
    }
}

fn mass_of(code: i32) -> f64 {
    match code.abs() {
        pdg::PI0 => 0.134_977,
        pdg::PI_PLUS => 0.139_570,
        pdg::ETA => 0.547_862,
        pdg::K_PLUS => 0.493_677,
        pdg::PHI => 1.019_461,
        pdg::JPSI => 3.096_900,
        pdg::MUON => 0.105_658,
        _ => 0.0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use dps_types::{ColourTag, ParticleStatus};

    use super::*;
    use crate::engine::{SampleOutcome, sample};
    use crate::selection::{DaughterRequirement, KinematicCuts, ParticleSelection, Selection};

    /// gg -> q g qbar + J/psi, plus an unconnected colour-singlet qqbar pair.
    fn partonic_state() -> PartonicState {
        let mut event = Event::new(1, Schema::Rich).with_weight(1e-3);
        let mut colours = Vec::new();
        let mut add = |event: &mut Event, code: i32, status: i32, momentum: FourVector, tag: ColourTag| {
            let id = event.next_particle_id();
            colours.push(tag);
            event.add_particle(Particle::new(id, code, status, momentum)).unwrap()
        };
        let g1 = add(&mut event, 21, -21, FourVector::new(0.0, 0.0, 300.0, 300.0), ColourTag::new(501, 502));
        let g2 = add(&mut event, 21, -21, FourVector::new(0.0, 0.0, -300.0, 300.0), ColourTag::new(502, 503));
        let q = add(&mut event, 2, 23, FourVector::new(20.0, 5.0, 40.0, 45.0), ColourTag::new(501, 0));
        let g = add(&mut event, 21, 23, FourVector::new(-10.0, 8.0, -20.0, 23.7), ColourTag::new(504, 501));
        let qbar = add(&mut event, -2, 23, FourVector::new(-12.0, -10.0, 5.0, 16.4), ColourTag::new(0, 504));
        let s = add(&mut event, 3, 23, FourVector::new(8.0, -8.0, 30.0, 32.0), ColourTag::new(601, 0));
        let sbar = add(&mut event, -3, 23, FourVector::new(-6.0, 5.0, -30.0, 31.0), ColourTag::new(0, 601));
        let jpsi = add(&mut event, 443, 23, FourVector::from_mass(0.0, 6.0, 10.0, 3.0969), ColourTag::default());
        event
            .add_vertex(Vertex::new(-1).with_incoming([g1, g2]).with_outgoing([q, g, qbar, s, sbar, jpsi]))
            .unwrap();
        PartonicState::new(event, colours)
    }

    fn hadronizer(failure_rate: f64) -> ToyHadronizer {
        let config = ToyConfig {
            failure_rate,
            seed: 7,
            ..ToyConfig::default()
        };
        let mut toy = ToyHadronizer::new(config).unwrap();
        toy.load(partonic_state()).unwrap();
        toy
    }

    #[test]
    fn colour_lines_define_systems() {
        let toy = hadronizer(0.0);
        assert_eq!(
            toy.systems(),
            &[
                vec![ParticleIndex(2), ParticleIndex(3), ParticleIndex(4)],
                vec![ParticleIndex(5), ParticleIndex(6)],
            ]
        );
    }

    #[test]
    fn invalid_settings_rejected() {
        let config = ToyConfig {
            failure_rate: 1.5,
            ..ToyConfig::default()
        };
        assert!(matches!(
            ToyHadronizer::new(config),
            Err(HadronizerError::InvalidConfig { .. })
        ));
        let config = ToyConfig {
            strangeness: 0.95,
            eta_fraction: 0.1,
            ..ToyConfig::default()
        };
        assert!(ToyHadronizer::new(config).is_err());
    }

    #[test]
    fn minimal_schema_states_rejected() {
        let mut toy = ToyHadronizer::new(ToyConfig::default()).unwrap();
        let mut event = Event::new(4, Schema::Minimal);
        event.add_particle(Particle::new(1, 21, 1, FourVector::ZERO)).unwrap();
        let err = toy.load(PartonicState::new(event, Vec::new())).unwrap_err();
        assert!(matches!(err, HadronizerError::Rejected { event: 4, .. }));
    }

    #[test]
    fn step_fragments_and_decays() {
        let mut toy = hadronizer(0.0);
        assert_eq!(toy.hadronize(), StepOutcome::Success);
        let event = toy.event();
        assert!(event.validate().is_ok());
        assert!(toy.systems().is_empty());

        for parton in [2, 3, 4, 5, 6] {
            assert_eq!(event.particles()[parton].status, STATUS_FRAGMENTED);
        }
        let jpsi = event.particles().iter().position(|p| p.pdg == 443).unwrap();
        assert_eq!(event.status_of(&event.particles()[jpsi]), ParticleStatus::Decayed);
        let muons: Vec<i32> = event.daughters(ParticleIndex(jpsi)).map(|(_, p)| p.pdg).collect();
        assert_eq!(muons, vec![13, -13]);

        for (i, particle) in event.particles().iter().enumerate() {
            if particle.pdg == 333 {
                assert_eq!(particle.status, STATUS_DECAYED_PRIMARY);
                assert_eq!(event.daughters(ParticleIndex(i)).count(), 2);
            }
        }
        // Every final particle is a hadron or lepton.
        assert!(
            event
                .particles()
                .iter()
                .filter(|p| event.status_of(p).is_final())
                .all(|p| !pdg::is_parton(p.pdg))
        );
    }

    #[test]
    fn bookkeeping_is_consumed_without_restore() {
        let mut toy = hadronizer(0.0);
        let checkpoint = toy.checkpoint();
        toy.hadronize();
        let after_first = toy.event().particle_count();
        toy.hadronize();
        // No systems left, so nothing new is fragmented.
        let vertices = toy.event().vertex_count();
        toy.hadronize();
        assert_eq!(toy.event().vertex_count(), vertices);
        assert!(toy.event().particle_count() >= after_first);

        toy.restore(&checkpoint);
        assert_eq!(toy.systems().len(), 2);
        assert_eq!(toy.event(), &partonic_state().event);
    }

    #[test]
    fn retries_are_independent_draws() {
        let mut toy = hadronizer(0.0);
        let checkpoint = toy.checkpoint();
        let mut draws = Vec::new();
        for _ in 0..5 {
            toy.restore(&checkpoint);
            toy.hadronize();
            draws.push(toy.event().clone());
        }
        for (i, a) in draws.iter().enumerate() {
            for b in draws.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn certain_failure_exhausts_budget() {
        let mut toy = hadronizer(1.0);
        let outcome = sample(&mut toy, &crate::selection::AcceptAll, 4);
        assert_eq!(
            outcome,
            SampleOutcome::Exhausted {
                attempts: 4,
                transient_failures: 4
            }
        );
    }

    #[test]
    fn phi_enrichment_finds_kaon_pairs() {
        let mut toy = hadronizer(0.0);
        let selection = ParticleSelection::species(333).with_daughters(DaughterRequirement {
            pdg_abs: 321,
            min_count: 2,
            cuts: KinematicCuts::default(),
        });
        let outcome = sample(&mut toy, &selection, 100);
        let event = outcome.event().unwrap();
        assert!(selection.accepts(event));
        assert!((event.weight() - 1e-3).abs() < 1e-15);
    }
}
