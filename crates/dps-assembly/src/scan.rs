//! Skipping forward over unusable records.

use dps_records::{EventReader, RecordError};
use dps_types::Event;
use tracing::{debug, warn};

/// Result of scanning a stream for the next usable event.
#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    /// A non-empty event, after passing over `skipped` unusable records.
    Found {
        /// The event.
        event: Event,
        /// Empty or malformed records passed over first.
        skipped: u64,
    },
    /// The stream ended, after passing over `skipped` unusable records.
    Exhausted {
        /// Empty or malformed records passed over first.
        skipped: u64,
    },
}

impl Scan {
    /// Records passed over during the scan.
    pub const fn skipped(&self) -> u64 {
        match self {
            Self::Found { skipped, .. } | Self::Exhausted { skipped } => *skipped,
        }
    }
}

/// Read until a non-empty event or the end of the stream.
///
/// Empty events and recoverable malformed records are skipped and counted.
/// Any other stream error is returned.
pub fn skip_until_non_empty<R: EventReader + ?Sized>(reader: &mut R) -> Result<Scan, RecordError> {
    let mut skipped: u64 = 0;
    loop {
        match reader.read_next() {
            Ok(Some(event)) if event.is_empty() => {
                debug!(event = event.number, "Skipping empty event");
                skipped = skipped.saturating_add(1);
            }
            Ok(Some(event)) => return Ok(Scan::Found { event, skipped }),
            Ok(None) => return Ok(Scan::Exhausted { skipped }),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Skipping malformed event record");
                skipped = skipped.saturating_add(1);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dps_records::MemoryReader;
    use dps_types::{FourVector, Particle, Schema};

    use super::*;

    fn filled(number: u64) -> Event {
        let mut event = Event::new(number, Schema::Rich);
        event.add_particle(Particle::new(1, 22, 1, FourVector::ZERO)).unwrap();
        event
    }

    #[test]
    fn skips_empty_and_malformed() {
        let mut reader = MemoryReader::new([Event::new(1, Schema::Rich)]);
        reader.push_malformed("bad P line");
        reader.push(filled(3));
        reader.push(filled(4));

        match skip_until_non_empty(&mut reader).unwrap() {
            Scan::Found { event, skipped } => {
                assert_eq!(event.number, 3);
                assert_eq!(skipped, 2);
            }
            Scan::Exhausted { .. } => panic!("expected an event"),
        }
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn reports_skips_at_end_of_stream() {
        let mut reader = MemoryReader::new([Event::new(1, Schema::Rich), Event::new(2, Schema::Rich)]);
        let scan = skip_until_non_empty(&mut reader).unwrap();
        assert_eq!(scan, Scan::Exhausted { skipped: 2 });
        assert_eq!(scan.skipped(), 2);
        assert_eq!(skip_until_non_empty(&mut reader).unwrap(), Scan::Exhausted { skipped: 0 });
    }
}
