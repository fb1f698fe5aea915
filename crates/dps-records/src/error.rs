//! Error types for the `dps-records` crate.
//!
//! A [`RecordError::Malformed`] is recoverable: the reader has already moved
//! past the bad record and the next `read_next` call continues with the
//! following one. I/O errors are not recoverable.

use std::path::PathBuf;

use dps_types::Schema;

/// Errors that can occur while reading or writing event streams.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The underlying stream failed.
    #[error("i/o error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A file could not be opened or created.
    #[error("cannot open {path}: {source}")]
    Open {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be parsed; the stream is positioned after it.
    #[error("malformed record at line {line}: {reason}")]
    Malformed {
        /// One-based line number where the record starts (0 if unknown).
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// An event cannot be expressed in the output format.
    #[error("cannot write event {event}: {reason}")]
    Unrepresentable {
        /// Sequence number of the offending event.
        event: u64,
        /// What could not be written.
        reason: String,
    },

    /// An event in one schema was handed to a writer of another.
    #[error("writer expects {expected} schema, event is {found}")]
    SchemaMismatch {
        /// The schema the writer produces.
        expected: Schema,
        /// The schema of the offending event.
        found: Schema,
    },
}

impl RecordError {
    /// Build a [`RecordError::Malformed`].
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }

    /// Whether the stream can continue after this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
