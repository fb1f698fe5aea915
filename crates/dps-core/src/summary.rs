//! Machine-readable run summaries.
//!
//! Each driver can write one JSON document per run: an identifier, wall-clock
//! timestamps, the final status, and whatever statistics the driver gathered.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when writing a summary.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    /// Failed to write the summary file.
    #[error("failed to write summary {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to encode the summary.
    #[error("failed to encode summary: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still running.
    Running,
    /// Finished normally.
    Completed,
    /// Ended with an error.
    Failed,
}

/// One run's summary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique, time-ordered run identifier.
    pub run_id: Uuid,
    /// Name of the driver that ran.
    pub tool: String,
    /// Input files.
    pub inputs: Vec<PathBuf>,
    /// Output file.
    pub output: PathBuf,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds.
    pub runtime_s: f64,
    /// How the run ended.
    pub status: RunStatus,
    /// The error that ended a failed run.
    pub error: Option<String>,
    /// Driver-specific statistics.
    pub stats: serde_json::Value,
}

impl RunSummary {
    /// Open a summary for a run starting now.
    pub fn start(tool: &str, inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            tool: tool.to_owned(),
            inputs,
            output,
            started_at: Utc::now(),
            finished_at: None,
            runtime_s: 0.0,
            status: RunStatus::Running,
            error: None,
            stats: serde_json::Value::Null,
        }
    }

    /// Close the summary as completed with `stats`.
    pub fn complete<S: Serialize>(&mut self, stats: &S) -> Result<(), SummaryError> {
        self.stats = serde_json::to_value(stats)?;
        self.close(RunStatus::Completed);
        Ok(())
    }

    /// Close the summary as failed with `error`.
    pub fn fail(&mut self, error: &dyn core::fmt::Display) {
        self.error = Some(error.to_string());
        self.close(RunStatus::Failed);
    }

    /// Close the summary as failed with `error` and the `stats` gathered
    /// before it.
    pub fn fail_with<S: Serialize>(&mut self, error: &dyn core::fmt::Display, stats: &S) -> Result<(), SummaryError> {
        self.stats = serde_json::to_value(stats)?;
        self.fail(error);
        Ok(())
    }

    fn close(&mut self, status: RunStatus) {
        let now = Utc::now();
        let elapsed = now.signed_duration_since(self.started_at);
        self.runtime_s = elapsed.num_milliseconds() as f64 / 1000.0;
        self.finished_at = Some(now);
        self.status = status;
    }

    /// Write the summary as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<(), SummaryError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SummaryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
