//! In-memory streams for drivers that do not touch the filesystem.

use std::collections::VecDeque;

use dps_types::{Event, PartonicState};

use crate::error::RecordError;
use crate::{EventReader, EventWriter, PartonSource};

/// One queued entry of an in-memory stream.
#[derive(Debug)]
enum Entry<T> {
    Item(T),
    Malformed(String),
    Broken(String),
}

impl<T> Entry<T> {
    fn into_result(entry: Option<Self>) -> Result<Option<T>, RecordError> {
        match entry {
            Some(Self::Item(item)) => Ok(Some(item)),
            Some(Self::Malformed(reason)) => Err(RecordError::malformed(0, reason)),
            Some(Self::Broken(reason)) => Err(std::io::Error::other(reason).into()),
            None => Ok(None),
        }
    }
}

/// An event reader over a queue of records, some of which may be malformed.
#[derive(Debug, Default)]
pub struct MemoryReader {
    records: VecDeque<Entry<Event>>,
}

impl MemoryReader {
    /// Reader yielding `events` in order.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            records: events.into_iter().map(Entry::Item).collect(),
        }
    }

    /// Append a well-formed event.
    pub fn push(&mut self, event: Event) {
        self.records.push_back(Entry::Item(event));
    }

    /// Append a record that fails to parse with `reason`.
    pub fn push_malformed(&mut self, reason: impl Into<String>) {
        self.records.push_back(Entry::Malformed(reason.into()));
    }

    /// Append an unrecoverable I/O failure with `reason`.
    pub fn push_io_error(&mut self, reason: impl Into<String>) {
        self.records.push_back(Entry::Broken(reason.into()));
    }

    /// Records not yet read.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl EventReader for MemoryReader {
    fn read_next(&mut self) -> Result<Option<Event>, RecordError> {
        Entry::into_result(self.records.pop_front())
    }
}

/// An event writer collecting into a vector.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    /// Events written so far.
    pub events: Vec<Event>,
    /// Whether [`EventWriter::finish`] has been called.
    pub finished: bool,
}

impl MemoryWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventWriter for MemoryWriter {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        self.finished = true;
        Ok(())
    }
}

/// A partonic-state source over a queue, some entries of which may be malformed.
#[derive(Debug, Default)]
pub struct MemorySource {
    states: VecDeque<Entry<PartonicState>>,
}

impl MemorySource {
    /// Source yielding `states` in order.
    pub fn new(states: impl IntoIterator<Item = PartonicState>) -> Self {
        Self {
            states: states.into_iter().map(Entry::Item).collect(),
        }
    }

    /// Append a well-formed state.
    pub fn push(&mut self, state: PartonicState) {
        self.states.push_back(Entry::Item(state));
    }

    /// Append an entry that fails to parse with `reason`.
    pub fn push_malformed(&mut self, reason: impl Into<String>) {
        self.states.push_back(Entry::Malformed(reason.into()));
    }

    /// Append an unrecoverable I/O failure with `reason`.
    pub fn push_io_error(&mut self, reason: impl Into<String>) {
        self.states.push_back(Entry::Broken(reason.into()));
    }
}

impl PartonSource for MemorySource {
    fn next_state(&mut self) -> Result<Option<PartonicState>, RecordError> {
        Entry::into_result(self.states.pop_front())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dps_types::Schema;

    use super::*;

    #[test]
    fn reader_interleaves_malformed_records() {
        let mut reader = MemoryReader::new([Event::new(1, Schema::Rich)]);
        reader.push_malformed("truncated");
        reader.push(Event::new(3, Schema::Rich));
        assert_eq!(reader.remaining(), 3);

        assert_eq!(reader.read_next().unwrap().unwrap().number, 1);
        assert!(reader.read_next().unwrap_err().is_recoverable());
        assert_eq!(reader.read_next().unwrap().unwrap().number, 3);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn writer_collects_and_finishes() {
        let mut writer = MemoryWriter::new();
        writer.write_next(&Event::new(9, Schema::Minimal)).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.events.len(), 1);
        assert!(writer.finished);
    }

    #[test]
    fn source_yields_states_then_end() {
        let mut source = MemorySource::new([PartonicState::new(Event::new(1, Schema::Rich), Vec::new())]);
        source.push_malformed("bad line");
        assert!(source.next_state().unwrap().is_some());
        assert!(source.next_state().is_err());
        assert!(source.next_state().unwrap().is_none());
    }

    #[test]
    fn io_failures_are_not_recoverable() {
        let mut reader = MemoryReader::default();
        reader.push_io_error("disk gone");
        let err = reader.read_next().unwrap_err();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("disk gone"));
    }
}
