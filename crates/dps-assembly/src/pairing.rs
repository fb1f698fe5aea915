//! Pairing drivers: which primary event goes with which secondary event.
//!
//! [`run_mixing`] pulls events from two streams, merges each pair with
//! [`merge`], and writes the composites numbered `1, 2, ...` in output
//! order. Two policies are available:
//!
//! - **Secondary-driven** (default): every usable secondary event takes the
//!   next usable primary event. Unusable secondary records are skipped
//!   without touching the primary stream. Running out of primary events
//!   before the secondary stream ends is a fatal [`MixError::PrimaryExhausted`].
//! - **Lockstep**: one record from each side per iteration; the run stops
//!   when either side ends, and an iteration where either record is unusable
//!   is skipped as a whole.
//!
//! After a normal stop the primary stream is drained to count the events
//! left unused. The writer is finished on every path, and a run that ends in
//! an error still hands back the counts gathered up to that point in a
//! [`MixFailure`].

use std::str::FromStr;

use dps_records::{EventReader, EventWriter, RecordError};
use dps_types::{Event, SpeciesTally};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::merge::{MergeError, merge};
use crate::scan::{Scan, skip_until_non_empty};

/// Errors that end a mixing run.
#[derive(Debug, thiserror::Error)]
pub enum MixError {
    /// The primary stream ended while secondary events remained.
    #[error(
        "primary stream exhausted after {primary_read} records with secondary events remaining \
         ({merged} composites written, {secondary_read} secondary records read)"
    )]
    PrimaryExhausted {
        /// Composites written before the failure.
        merged: u64,
        /// Primary records read, usable or not.
        primary_read: u64,
        /// Secondary records read, usable or not.
        secondary_read: u64,
    },

    /// A stream failed.
    #[error("record stream error: {source}")]
    Record {
        /// The underlying stream error.
        #[from]
        source: RecordError,
    },

    /// A pair could not be merged.
    #[error("merge failed: {source}")]
    Merge {
        /// The underlying merge error.
        #[from]
        source: MergeError,
    },
}

/// A mixing run that ended in an error, with the work completed before it.
#[derive(Debug, thiserror::Error)]
#[error("mixing stopped after {} composites", .report.merged)]
pub struct MixFailure {
    /// Counts up to the failure; `end` is [`MixEnd::Failed`].
    pub report: Box<MixReport>,
    /// What ended the run.
    #[source]
    pub error: MixError,
}

impl MixFailure {
    fn new(mut report: MixReport, error: MixError) -> Self {
        report.end = MixEnd::Failed;
        Self {
            report: Box::new(report),
            error,
        }
    }
}

/// How primary and secondary events are paired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPolicy {
    /// Each usable secondary event takes the next usable primary event.
    #[default]
    SecondaryDriven,
    /// One record from each side per iteration.
    Lockstep,
}

impl FromStr for PairingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secondary-driven" | "secondary_driven" => Ok(Self::SecondaryDriven),
            "lockstep" => Ok(Self::Lockstep),
            other => Err(format!("unknown pairing policy '{other}' (expected secondary-driven or lockstep)")),
        }
    }
}

impl core::fmt::Display for PairingPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::SecondaryDriven => "secondary-driven",
            Self::Lockstep => "lockstep",
        })
    }
}

/// Knobs of one mixing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixOptions {
    /// Pairing policy.
    pub policy: PairingPolicy,
    /// Stop after this many composites.
    pub max_events: Option<u64>,
    /// Log progress every this many composites; 0 disables it.
    pub progress_every: u64,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            policy: PairingPolicy::default(),
            max_events: None,
            progress_every: 100,
        }
    }
}

/// Why a mixing run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixEnd {
    /// The secondary stream ended (secondary-driven).
    SecondaryExhausted,
    /// One of the streams ended (lockstep).
    EitherExhausted,
    /// The configured number of composites was written.
    EventLimit,
    /// The run ended with an error.
    Failed,
}

/// Outcome of a completed mixing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixReport {
    /// Why the run stopped.
    pub end: MixEnd,
    /// Composites written.
    pub merged: u64,
    /// Secondary records read, usable or not.
    pub secondary_read: u64,
    /// Secondary records skipped as empty or malformed.
    pub secondary_skipped: u64,
    /// Primary records read during pairing, usable or not.
    pub primary_consumed: u64,
    /// Primary records skipped as empty or malformed.
    pub primary_skipped: u64,
    /// Primary records left over after the run.
    pub primary_unused: u64,
    /// Particles across all composites.
    pub total_particles: u64,
    /// Vertex edges dropped while merging.
    pub dropped_edges: u64,
    /// Tracked species across all composites.
    pub species: SpeciesTally,
}

impl MixReport {
    const fn new(species: SpeciesTally) -> Self {
        Self {
            end: MixEnd::SecondaryExhausted,
            merged: 0,
            secondary_read: 0,
            secondary_skipped: 0,
            primary_consumed: 0,
            primary_skipped: 0,
            primary_unused: 0,
            total_particles: 0,
            dropped_edges: 0,
            species,
        }
    }

    /// Average particles per composite, 0 if none were written.
    pub fn mean_multiplicity(&self) -> f64 {
        if self.merged == 0 {
            0.0
        } else {
            self.total_particles as f64 / self.merged as f64
        }
    }

    fn limit_reached(&self, options: &MixOptions) -> bool {
        options.max_events.is_some_and(|limit| self.merged >= limit)
    }
}

/// One lockstep read.
enum Slot {
    Usable(Event),
    Unusable,
    End,
}

fn read_slot<R: EventReader + ?Sized>(reader: &mut R, side: &'static str) -> Result<Slot, RecordError> {
    match reader.read_next() {
        Ok(Some(event)) if event.is_empty() => {
            debug!(side, event = event.number, "Empty event");
            Ok(Slot::Unusable)
        }
        Ok(Some(event)) => Ok(Slot::Usable(event)),
        Ok(None) => Ok(Slot::End),
        Err(e) if e.is_recoverable() => {
            warn!(side, error = %e, "Malformed event record");
            Ok(Slot::Unusable)
        }
        Err(e) => Err(e),
    }
}

/// Run a mixing job to completion.
///
/// # Arguments
///
/// * `primary` - Events each secondary event is paired with
/// * `secondary` - Events driving the run
/// * `writer` - Sink for composites; finished before returning, also when
///   the run fails
/// * `options` - Pairing policy and limits
/// * `species` - Species to tally in written composites
///
/// # Errors
///
/// Returns a [`MixFailure`] carrying the partial report if a stream fails,
/// a pair cannot be merged, or the primary stream runs out first under
/// secondary-driven pairing.
pub fn run_mixing<P, S, W>(
    primary: &mut P,
    secondary: &mut S,
    writer: &mut W,
    options: &MixOptions,
    species: SpeciesTally,
) -> Result<MixReport, MixFailure>
where
    P: EventReader + ?Sized,
    S: EventReader + ?Sized,
    W: EventWriter + ?Sized,
{
    let mut report = MixReport::new(species);
    info!(policy = %options.policy, max_events = options.max_events, "Mixing starting");

    let driven = match options.policy {
        PairingPolicy::SecondaryDriven => secondary_driven(primary, secondary, writer, options, &mut report),
        PairingPolicy::Lockstep => lockstep(primary, secondary, writer, options, &mut report),
    };
    let end = match driven {
        Ok(end) => end,
        Err(error) => {
            if let Err(e) = writer.finish() {
                warn!(error = %e, "Could not finish output after failed run");
            }
            return Err(MixFailure::new(report, error));
        }
    };
    report.end = end;
    if let Err(e) = writer.finish() {
        return Err(MixFailure::new(report, e.into()));
    }

    loop {
        match primary.read_next() {
            Ok(Some(_)) => report.primary_unused = report.primary_unused.saturating_add(1),
            Ok(None) => break,
            Err(e) if e.is_recoverable() => report.primary_unused = report.primary_unused.saturating_add(1),
            Err(e) => return Err(MixFailure::new(report, e.into())),
        }
    }
    Ok(report)
}

fn secondary_driven<P, S, W>(
    primary: &mut P,
    secondary: &mut S,
    writer: &mut W,
    options: &MixOptions,
    report: &mut MixReport,
) -> Result<MixEnd, MixError>
where
    P: EventReader + ?Sized,
    S: EventReader + ?Sized,
    W: EventWriter + ?Sized,
{
    loop {
        if report.limit_reached(options) {
            info!(merged = report.merged, "Event limit reached");
            return Ok(MixEnd::EventLimit);
        }

        let scan = skip_until_non_empty(secondary)?;
        report.secondary_skipped = report.secondary_skipped.saturating_add(scan.skipped());
        report.secondary_read = report.secondary_read.saturating_add(scan.skipped());
        let Scan::Found { event: second, .. } = scan else {
            info!(merged = report.merged, "Reached end of secondary stream");
            return Ok(MixEnd::SecondaryExhausted);
        };
        report.secondary_read = report.secondary_read.saturating_add(1);

        let scan = skip_until_non_empty(primary)?;
        report.primary_skipped = report.primary_skipped.saturating_add(scan.skipped());
        report.primary_consumed = report.primary_consumed.saturating_add(scan.skipped());
        let Scan::Found { event: first, .. } = scan else {
            error!(
                merged = report.merged,
                primary_read = report.primary_consumed,
                secondary_read = report.secondary_read,
                "Primary stream exhausted before secondary stream"
            );
            return Err(MixError::PrimaryExhausted {
                merged: report.merged,
                primary_read: report.primary_consumed,
                secondary_read: report.secondary_read,
            });
        };
        report.primary_consumed = report.primary_consumed.saturating_add(1);

        write_pair(&first, &second, writer, options, report)?;
    }
}

fn lockstep<P, S, W>(
    primary: &mut P,
    secondary: &mut S,
    writer: &mut W,
    options: &MixOptions,
    report: &mut MixReport,
) -> Result<MixEnd, MixError>
where
    P: EventReader + ?Sized,
    S: EventReader + ?Sized,
    W: EventWriter + ?Sized,
{
    loop {
        if report.limit_reached(options) {
            info!(merged = report.merged, "Event limit reached");
            return Ok(MixEnd::EventLimit);
        }

        let second = read_slot(secondary, "secondary")?;
        if matches!(second, Slot::End) {
            info!(merged = report.merged, "Reached end of secondary stream");
            return Ok(MixEnd::EitherExhausted);
        }
        report.secondary_read = report.secondary_read.saturating_add(1);

        let first = read_slot(primary, "primary")?;
        if matches!(first, Slot::End) {
            info!(merged = report.merged, "Reached end of primary stream");
            return Ok(MixEnd::EitherExhausted);
        }
        report.primary_consumed = report.primary_consumed.saturating_add(1);

        match (first, second) {
            (Slot::Usable(first), Slot::Usable(second)) => {
                write_pair(&first, &second, writer, options, report)?;
            }
            (first, second) => {
                if !matches!(first, Slot::Usable(_)) {
                    report.primary_skipped = report.primary_skipped.saturating_add(1);
                }
                if !matches!(second, Slot::Usable(_)) {
                    report.secondary_skipped = report.secondary_skipped.saturating_add(1);
                }
                debug!(merged = report.merged, "Skipping unusable pair");
            }
        }
    }
}

fn write_pair<W: EventWriter + ?Sized>(
    first: &Event,
    second: &Event,
    writer: &mut W,
    options: &MixOptions,
    report: &mut MixReport,
) -> Result<(), MixError> {
    let number = report.merged.saturating_add(1);
    let composite = merge(first, second, number)?;
    writer.write_next(&composite.event)?;

    report.merged = number;
    let particles = u64::try_from(composite.event.particle_count()).unwrap_or(u64::MAX);
    let dropped = u64::try_from(composite.dropped_edges).unwrap_or(u64::MAX);
    report.total_particles = report.total_particles.saturating_add(particles);
    report.dropped_edges = report.dropped_edges.saturating_add(dropped);
    report.species.record(&composite.event);
    debug!(
        event = number,
        primary = first.number,
        secondary = second.number,
        particles,
        "Composite written"
    );

    if report.merged.checked_rem(options.progress_every) == Some(0) {
        info!(
            merged = report.merged,
            secondary_skipped = report.secondary_skipped,
            primary_skipped = report.primary_skipped,
            mean_multiplicity = report.mean_multiplicity(),
            "Mixing progress"
        );
    }
    Ok(())
}

/// Log the end-of-run summary, also for the partial report of a failed run.
pub fn log_mixing_end(report: &MixReport) {
    info!(
        reason = ?report.end,
        merged = report.merged,
        secondary_read = report.secondary_read,
        secondary_skipped = report.secondary_skipped,
        primary_consumed = report.primary_consumed,
        primary_skipped = report.primary_skipped,
        primary_unused = report.primary_unused,
        dropped_edges = report.dropped_edges,
        mean_multiplicity = report.mean_multiplicity(),
        "Mixing ended"
    );
    for (code, count) in report.species.iter() {
        info!(pdg = code, count, "Species in written events");
    }
    if report.merged == 0 && report.end != MixEnd::Failed {
        warn!("Mixing ended with no events written");
    }
}
