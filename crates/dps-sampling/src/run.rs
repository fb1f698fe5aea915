//! The sampling driver loop.
//!
//! [`run_sampling`] pulls partonic states from a [`PartonSource`], conditions
//! each through [`sample`], and writes accepted events, renumbered in output
//! order. It stops when:
//!
//! - **Source exhausted**: the normal end
//! - **Event limit**: `max_events` states have been processed
//! - **Abort limit**: `max_aborts` source records or loads have failed
//!
//! Exhausted states and unreadable source records are skipped and counted;
//! I/O failures on either stream end the run with a [`SamplingFailure`] that
//! still carries the statistics gathered so far. The writer is finished on
//! every path.

use dps_records::{EventWriter, PartonSource, RecordError};
use dps_types::SpeciesTally;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{SampleOutcome, sample};
use crate::hadronizer::Hadronizer;
use crate::selection::Selection;
use crate::stats::SamplingStats;

/// Errors that end a sampling run.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    /// The source or the output stream failed.
    #[error("record stream error: {source}")]
    Record {
        /// The underlying stream error.
        #[from]
        source: RecordError,
    },
}

/// A sampling run that ended in an error, with the work completed before it.
#[derive(Debug, thiserror::Error)]
#[error("sampling stopped after {} written events", .report.stats.accepted)]
pub struct SamplingFailure {
    /// Statistics up to the failure; `end_reason` is [`EndReason::Failed`].
    pub report: Box<SamplingReport>,
    /// What ended the run.
    #[source]
    pub error: SamplingError,
}

/// Why a sampling run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The source had no more states.
    SourceExhausted,
    /// The configured number of states was processed.
    EventLimit,
    /// Too many source records failed.
    AbortLimit,
    /// A stream failed.
    Failed,
}

/// Knobs of one sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Retry budget per state.
    pub max_attempts: u32,
    /// Stop after this many processed states.
    pub max_events: Option<u64>,
    /// Stop once this many source records or loads have failed.
    pub max_aborts: u64,
    /// Log progress every this many processed states; 0 disables it.
    pub progress_every: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            max_events: None,
            max_aborts: 10,
            progress_every: 100,
        }
    }
}

/// Outcome of a completed sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingReport {
    /// Why the run stopped.
    pub end_reason: EndReason,
    /// Everything counted along the way.
    pub stats: SamplingStats,
}

/// Called at every progress interval.
pub trait ProgressCallback {
    /// Inspect the statistics so far.
    fn on_progress(&mut self, stats: &SamplingStats);
}

/// A progress callback that does nothing.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&mut self, _stats: &SamplingStats) {}
}

/// Run the sampling loop to completion.
///
/// # Arguments
///
/// * `source` - Partonic states, one per iteration
/// * `hadronizer` - Stochastic transformer each state is loaded into
/// * `selection` - Acceptance predicate ([`AcceptAll`] for normal production)
/// * `writer` - Sink for accepted events; finished before returning
/// * `options` - Retry budget and stopping limits
/// * `species` - Species to tally in accepted events
/// * `progress` - Called every `options.progress_every` states
///
/// # Errors
///
/// Returns a [`SamplingFailure`] carrying the statistics so far if the
/// source or the writer fails.
///
/// [`AcceptAll`]: crate::selection::AcceptAll
pub fn run_sampling<P, H, S, W>(
    source: &mut P,
    hadronizer: &mut H,
    selection: &S,
    writer: &mut W,
    options: &RunOptions,
    species: SpeciesTally,
    progress: &mut dyn ProgressCallback,
) -> Result<SamplingReport, SamplingFailure>
where
    P: PartonSource + ?Sized,
    H: Hadronizer + ?Sized,
    S: Selection + ?Sized,
    W: EventWriter + ?Sized,
{
    let mut stats = SamplingStats::new(species);
    let sampled = sample_all(source, hadronizer, selection, writer, options, &mut stats, progress);
    let finished = writer.finish();
    let end_reason = match (sampled, finished) {
        (Ok(end_reason), Ok(())) => end_reason,
        (Err(error), finished) => {
            if let Err(e) = finished {
                warn!(error = %e, "Could not finish output after failed run");
            }
            return Err(failure(stats, error));
        }
        (Ok(_), Err(e)) => return Err(failure(stats, e.into())),
    };
    Ok(SamplingReport { end_reason, stats })
}

fn failure(stats: SamplingStats, error: SamplingError) -> SamplingFailure {
    SamplingFailure {
        report: Box::new(SamplingReport {
            end_reason: EndReason::Failed,
            stats,
        }),
        error,
    }
}

fn sample_all<P, H, S, W>(
    source: &mut P,
    hadronizer: &mut H,
    selection: &S,
    writer: &mut W,
    options: &RunOptions,
    stats: &mut SamplingStats,
    progress: &mut dyn ProgressCallback,
) -> Result<EndReason, SamplingError>
where
    P: PartonSource + ?Sized,
    H: Hadronizer + ?Sized,
    S: Selection + ?Sized,
    W: EventWriter + ?Sized,
{
    info!(
        max_attempts = options.max_attempts,
        max_events = options.max_events,
        max_aborts = options.max_aborts,
        "Sampling starting"
    );

    let end_reason = loop {
        if options.max_events.is_some_and(|limit| stats.states_processed >= limit) {
            info!(processed = stats.states_processed, "Event limit reached");
            break EndReason::EventLimit;
        }

        let state = match source.next_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(processed = stats.states_processed, "Reached end of partonic source");
                break EndReason::SourceExhausted;
            }
            Err(e) if e.is_recoverable() => {
                stats.record_abort();
                warn!(error = %e, aborts = stats.aborts, "Skipping unreadable partonic state");
                if stats.aborts >= options.max_aborts {
                    warn!(aborts = stats.aborts, "Abort limit reached, ending run early");
                    break EndReason::AbortLimit;
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = hadronizer.load(state) {
            stats.record_abort();
            warn!(error = %e, aborts = stats.aborts, "Skipping partonic state the hadronizer rejected");
            if stats.aborts >= options.max_aborts {
                warn!(aborts = stats.aborts, "Abort limit reached, ending run early");
                break EndReason::AbortLimit;
            }
            continue;
        }

        let outcome = sample(hadronizer, selection, options.max_attempts);
        stats.record(&outcome);
        match outcome {
            SampleOutcome::Accepted {
                mut event, attempts, ..
            } => {
                event.number = stats.accepted;
                debug!(event = event.number, attempts, "Event accepted");
                writer.write_next(&event)?;
            }
            SampleOutcome::Exhausted { attempts, .. } => {
                debug!(state = stats.states_processed, attempts, "Retry budget exhausted, state skipped");
            }
        }

        if stats.states_processed.checked_rem(options.progress_every) == Some(0) {
            info!(
                processed = stats.states_processed,
                accepted = stats.accepted,
                efficiency = stats.efficiency(),
                mean_attempts = stats.mean_attempts(),
                "Sampling progress"
            );
            progress.on_progress(stats);
        }
    };
    Ok(end_reason)
}

/// Log the end-of-run summary, also for the partial report of a failed run.
pub fn log_sampling_end(report: &SamplingReport) {
    let stats = &report.stats;
    info!(
        reason = ?report.end_reason,
        processed = stats.states_processed,
        written = stats.accepted,
        skipped = stats.exhausted,
        attempts = stats.total_attempts,
        transient_failures = stats.transient_failures,
        aborts = stats.aborts,
        efficiency = stats.efficiency(),
        mean_attempts = stats.mean_attempts(),
        "Sampling ended"
    );
    for (code, count) in stats.species.iter() {
        info!(pdg = code, count, "Species in written events");
    }
    if stats.accepted == 0 && report.end_reason != EndReason::Failed {
        warn!("Sampling ended with no events written");
    }
}
