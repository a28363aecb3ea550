//! Metrics describing the outcome of a corpus encoding run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RemiError;

/// Reason a file was skipped during batch encoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read or parsed as MusicXML.
    Parse,
    /// The file parsed but contained no pitched notes.
    EmptyScore,
}

impl SkipReason {
    /// Classifies a per-file error into its skip reason.
    ///
    /// Returns `None` for errors that are not per-file and must abort the
    /// batch instead of being counted.
    #[must_use]
    pub fn classify(err: &RemiError) -> Option<Self> {
        match err {
            RemiError::Parse { .. } => Some(Self::Parse),
            RemiError::EmptyScore { .. } => Some(Self::EmptyScore),
            _ => None,
        }
    }
}

/// Aggregate counts reported at the end of a batch encoding run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// Total files visited.
    pub processed: usize,
    /// Files that produced a corpus record.
    pub succeeded: usize,
    /// Files skipped because they failed to parse.
    pub skipped_parse: usize,
    /// Files skipped because they held no musical content.
    pub skipped_empty: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successfully encoded file.
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Records one skipped file.
    pub fn record_skip(&mut self, reason: SkipReason) {
        self.processed += 1;
        match reason {
            SkipReason::Parse => self.skipped_parse += 1,
            SkipReason::EmptyScore => self.skipped_empty += 1,
        }
    }

    /// Total files skipped for any reason.
    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped_parse + self.skipped_empty
    }
}
