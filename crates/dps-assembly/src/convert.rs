//! Schema conversion of whole events.

use dps_records::{EventWriter, RecordError};
use dps_types::{Event, Schema};

/// Re-encode `event` into `target` as a new record numbered `number`.
///
/// Statuses go through the canonical status; momenta, masses, positions
/// and graph structure are copied verbatim. The weight list becomes the
/// single event weight.
pub fn convert(event: &Event, target: Schema, number: u64) -> Event {
    let mut converted = event.clone();
    converted.reencode(target);
    converted.number = number;
    converted.weights = vec![event.weight()];
    converted
}

/// [`convert`] into the minimal schema.
pub fn to_minimal(event: &Event, number: u64) -> Event {
    convert(event, Schema::Minimal, number)
}

/// [`convert`] into the rich schema.
pub fn to_rich(event: &Event, number: u64) -> Event {
    convert(event, Schema::Rich, number)
}

/// A writer adapter converting every event into one schema first.
pub struct Converting<W> {
    inner: W,
    target: Schema,
}

impl<W: EventWriter> Converting<W> {
    /// Convert into `target` before handing events to `inner`.
    pub const fn new(inner: W, target: Schema) -> Self {
        Self { inner, target }
    }

    /// Give back the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: EventWriter> EventWriter for Converting<W> {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        if event.schema == self.target {
            self.inner.write_next(event)
        } else {
            self.inner.write_next(&convert(event, self.target, event.number))
        }
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        self.inner.finish()
    }
}
