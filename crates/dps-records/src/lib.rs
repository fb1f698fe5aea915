//! Sequential event-record streams for DPS event production.
//!
//! The engines never see a file format. They pull events through
//! [`EventReader`], push them through [`EventWriter`], and pull parton-level
//! input through [`PartonSource`]. This crate provides those traits plus the
//! concrete streams behind them.
//!
//! # Modules
//!
//! - [`error`] -- [`RecordError`], with recoverable malformed-record errors
//! - [`rich`] -- Rich-schema (v3 ASCII) reader and writer
//! - [`minimal`] -- Minimal-schema (v2 ASCII) reader and writer
//! - [`lhe`] -- Les Houches partonic-state reader
//! - [`memory`] -- In-memory streams for tests and embedding

pub mod error;
pub mod lhe;
pub mod memory;
pub mod minimal;
pub mod rich;

mod block;
mod fields;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use dps_types::{Event, PartonicState, Schema};

pub use error::RecordError;
pub use lhe::LheReader;
pub use memory::{MemoryReader, MemorySource, MemoryWriter};
pub use minimal::{MinimalReader, MinimalWriter};
pub use rich::{RichReader, RichWriter};

/// A forward-only source of events.
pub trait EventReader {
    /// The next event, `Ok(None)` at end of stream.
    ///
    /// A [`RecordError::Malformed`] means one record was unreadable; the
    /// stream is positioned after it and may be read again.
    fn read_next(&mut self) -> Result<Option<Event>, RecordError>;
}

/// A sink of events.
pub trait EventWriter {
    /// Append one event.
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError>;

    /// Write any stream footer and flush. Safe to call more than once.
    fn finish(&mut self) -> Result<(), RecordError>;
}

/// A forward-only source of parton-level initial states.
pub trait PartonSource {
    /// The next state, `Ok(None)` when the source is exhausted.
    fn next_state(&mut self) -> Result<Option<PartonicState>, RecordError>;
}

impl<T: EventReader + ?Sized> EventReader for &mut T {
    fn read_next(&mut self) -> Result<Option<Event>, RecordError> {
        (**self).read_next()
    }
}

impl<T: EventReader + ?Sized> EventReader for Box<T> {
    fn read_next(&mut self) -> Result<Option<Event>, RecordError> {
        (**self).read_next()
    }
}

impl<T: EventWriter + ?Sized> EventWriter for &mut T {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        (**self).write_next(event)
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        (**self).finish()
    }
}

impl<T: EventWriter + ?Sized> EventWriter for Box<T> {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        (**self).write_next(event)
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        (**self).finish()
    }
}

impl<T: PartonSource + ?Sized> PartonSource for &mut T {
    fn next_state(&mut self) -> Result<Option<PartonicState>, RecordError> {
        (**self).next_state()
    }
}

impl<T: PartonSource + ?Sized> PartonSource for Box<T> {
    fn next_state(&mut self) -> Result<Option<PartonicState>, RecordError> {
        (**self).next_state()
    }
}

fn open(path: &Path) -> Result<BufReader<File>, RecordError> {
    File::open(path).map(BufReader::new).map_err(|source| RecordError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Open an event file written in `schema`'s record format.
pub fn open_reader(path: &Path, schema: Schema) -> Result<Box<dyn EventReader>, RecordError> {
    let input = open(path)?;
    Ok(match schema {
        Schema::Rich => Box::new(RichReader::new(input)),
        Schema::Minimal => Box::new(MinimalReader::new(input)),
    })
}

/// Create an event file in `schema`'s record format, truncating any existing one.
pub fn create_writer(path: &Path, schema: Schema) -> Result<Box<dyn EventWriter>, RecordError> {
    let output = File::create(path)
        .map(BufWriter::new)
        .map_err(|source| RecordError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match schema {
        Schema::Rich => Box::new(RichWriter::new(output)?),
        Schema::Minimal => Box::new(MinimalWriter::new(output)?),
    })
}

/// Open a Les Houches event file.
pub fn open_lhe(path: &Path) -> Result<LheReader<BufReader<File>>, RecordError> {
    open(path).map(LheReader::new)
}
