//! Conditioned sampling: retry a stochastic step until a selection passes.

use dps_types::Event;
use tracing::debug;

use crate::hadronizer::{Hadronizer, StepOutcome};
use crate::selection::Selection;

/// Result of conditioning one loaded state.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// A draw passed the selection.
    Accepted {
        /// The accepted event, copied out of the hadronizer.
        event: Event,
        /// One-based number of the attempt that passed.
        attempts: u32,
        /// Attempts lost to transient failures before it.
        transient_failures: u32,
    },
    /// No draw passed within the budget.
    Exhausted {
        /// Attempts used, equal to the budget.
        attempts: u32,
        /// How many of them failed transiently.
        transient_failures: u32,
    },
}

impl SampleOutcome {
    /// Attempts consumed.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Transient failures seen.
    pub const fn transient_failures(&self) -> u32 {
        match self {
            Self::Accepted {
                transient_failures, ..
            }
            | Self::Exhausted {
                transient_failures, ..
            } => *transient_failures,
        }
    }

    /// The accepted event, if any.
    pub const fn event(&self) -> Option<&Event> {
        match self {
            Self::Accepted { event, .. } => Some(event),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Draw from `hadronizer` until `selection` accepts, at most `max_attempts`
/// times.
///
/// The working state is checkpointed once and restored before every attempt,
/// so each draw starts from the same parton-level configuration and differs
/// only by the random stream. A transient failure uses up its attempt. The
/// first passing draw wins. A zero budget returns `Exhausted` without
/// touching the hadronizer.
pub fn sample<H, S>(hadronizer: &mut H, selection: &S, max_attempts: u32) -> SampleOutcome
where
    H: Hadronizer + ?Sized,
    S: Selection + ?Sized,
{
    let mut transient_failures: u32 = 0;
    if max_attempts == 0 {
        return SampleOutcome::Exhausted {
            attempts: 0,
            transient_failures,
        };
    }

    let checkpoint = hadronizer.checkpoint();
    for attempt in 1..=max_attempts {
        hadronizer.restore(&checkpoint);
        if hadronizer.hadronize() == StepOutcome::TransientFailure {
            transient_failures = transient_failures.saturating_add(1);
            debug!(attempt, "hadronization failed, retrying");
            continue;
        }
        if selection.accepts(hadronizer.event()) {
            return SampleOutcome::Accepted {
                event: hadronizer.event().clone(),
                attempts: attempt,
                transient_failures,
            };
        }
    }
    SampleOutcome::Exhausted {
        attempts: max_attempts,
        transient_failures,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use dps_types::{FourVector, Particle, PartonicState, Schema};

    use super::*;
    use crate::hadronizer::HadronizerError;
    use crate::selection::{AcceptAll, ParticleSelection};

    /// One scripted draw.
    #[derive(Debug, Clone)]
    enum Draw {
        Fail,
        Produce(Vec<i32>),
    }

    /// Working state of the scripted hadronizer: the event plus a counter
    /// standing in for auxiliary bookkeeping.
    #[derive(Debug, Clone, PartialEq)]
    struct Working {
        event: Event,
        systems: u32,
    }

    struct Scripted {
        working: Working,
        script: VecDeque<Draw>,
        restores: u32,
        draws: u32,
        seen_at_draw: Vec<Working>,
    }

    impl Scripted {
        fn new(script: impl IntoIterator<Item = Draw>) -> Self {
            let mut event = Event::new(1, Schema::Rich);
            event
                .add_particle(Particle::new(1, 21, 23, FourVector::new(0.0, 0.0, 10.0, 10.0)))
                .unwrap();
            Self {
                working: Working { event, systems: 2 },
                script: script.into_iter().collect(),
                restores: 0,
                draws: 0,
                seen_at_draw: Vec::new(),
            }
        }
    }

    impl Hadronizer for Scripted {
        type Checkpoint = Working;

        fn load(&mut self, state: PartonicState) -> Result<(), HadronizerError> {
            self.working.event = state.event;
            Ok(())
        }

        fn checkpoint(&self) -> Working {
            self.working.clone()
        }

        fn restore(&mut self, checkpoint: &Working) {
            self.restores += 1;
            self.working = checkpoint.clone();
        }

        fn hadronize(&mut self) -> StepOutcome {
            self.draws += 1;
            self.seen_at_draw.push(self.working.clone());
            // Consume the bookkeeping like a real step would.
            self.working.systems = 0;
            match self.script.pop_front() {
                Some(Draw::Produce(pdgs)) => {
                    for pdg in pdgs {
                        let id = self.working.event.next_particle_id();
                        self.working
                            .event
                            .add_particle(Particle::new(id, pdg, 83, FourVector::new(1.0, 0.0, 0.0, 2.0)))
                            .unwrap();
                    }
                    StepOutcome::Success
                }
                Some(Draw::Fail) | None => StepOutcome::TransientFailure,
            }
        }

        fn event(&self) -> &Event {
            &self.working.event
        }
    }

    #[test]
    fn first_passing_attempt_wins() {
        let mut hadronizer = Scripted::new([
            Draw::Produce(vec![211]),
            Draw::Produce(vec![333]),
            Draw::Produce(vec![333, 333]),
        ]);
        let outcome = sample(&mut hadronizer, &ParticleSelection::species(333), 10);
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.transient_failures(), 0);
        assert_eq!(hadronizer.draws, 2);
        let event = outcome.event().unwrap();
        assert_eq!(event.particle_count(), 2);
    }

    #[test]
    fn every_attempt_starts_from_the_checkpoint() {
        let mut hadronizer = Scripted::new([
            Draw::Produce(vec![211, 211]),
            Draw::Fail,
            Draw::Produce(vec![111]),
            Draw::Produce(vec![333]),
        ]);
        let before = hadronizer.working.clone();
        let outcome = sample(&mut hadronizer, &ParticleSelection::species(333), 10);
        assert!(matches!(outcome, SampleOutcome::Accepted { attempts: 4, .. }));
        assert_eq!(hadronizer.restores, 4);
        // Visible event and auxiliary bookkeeping both come back.
        for seen in &hadronizer.seen_at_draw {
            assert_eq!(seen, &before);
        }
        // Only the accepted draw's particles survive.
        assert_eq!(outcome.event().unwrap().particle_count(), 2);
    }

    #[test]
    fn transient_failures_consume_attempts() {
        let mut hadronizer = Scripted::new([Draw::Fail, Draw::Fail, Draw::Produce(vec![333])]);
        let outcome = sample(&mut hadronizer, &AcceptAll, 3);
        assert!(matches!(
            outcome,
            SampleOutcome::Accepted {
                attempts: 3,
                transient_failures: 2,
                ..
            }
        ));
    }

    #[test]
    fn exhaustion_reports_budget() {
        let mut hadronizer = Scripted::new(std::iter::repeat_n(Draw::Produce(vec![211]), 8));
        let outcome = sample(&mut hadronizer, &ParticleSelection::species(333), 5);
        assert_eq!(
            outcome,
            SampleOutcome::Exhausted {
                attempts: 5,
                transient_failures: 0
            }
        );
        assert_eq!(hadronizer.draws, 5);
    }

    #[test]
    fn zero_budget_never_touches_the_hadronizer() {
        let mut hadronizer = Scripted::new([Draw::Produce(vec![333])]);
        let outcome = sample(&mut hadronizer, &AcceptAll, 0);
        assert_eq!(
            outcome,
            SampleOutcome::Exhausted {
                attempts: 0,
                transient_failures: 0
            }
        );
        assert_eq!(hadronizer.draws, 0);
        assert_eq!(hadronizer.restores, 0);
    }
}
