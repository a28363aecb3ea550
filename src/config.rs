//! Configuration builders controlling encoding and corpus ingestion.

use serde::{Deserialize, Serialize};

use crate::error::{RemiError, Result};

/// Policy selecting which parts of a multi-part score contribute tokens.
///
/// `Flatten` walks every part in document order and concatenates each part's
/// measure run, which is what the downstream clustering pipeline trains on.
/// `Select` restricts encoding to a single zero-based part index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "index", rename_all = "snake_case")]
pub enum PartPolicy {
    /// Encode all parts sequentially in document order.
    Flatten,
    /// Encode only the part at the given zero-based index.
    Select(usize),
}

/// One entry of the duration bucket table, keyed by quarter-note length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationBucket {
    /// Nominal duration in quarter-note units.
    pub quarter_length: f64,
    /// Token label emitted for durations mapped to this bucket.
    pub label: String,
}

impl DurationBucket {
    /// Creates a bucket from a quarter length and its token label.
    pub fn new(quarter_length: f64, label: impl Into<String>) -> Self {
        Self {
            quarter_length,
            label: label.into(),
        }
    }
}

/// Returns the default duration bucket table, spanning a triplet
/// thirty-second note up to a whole note, dotted and triplet values included.
#[must_use]
pub fn default_duration_buckets() -> Vec<DurationBucket> {
    vec![
        DurationBucket::new(1.0 / 12.0, "Duration_1/32t"),
        DurationBucket::new(0.125, "Duration_1/32"),
        DurationBucket::new(1.0 / 6.0, "Duration_1/16t"),
        DurationBucket::new(0.25, "Duration_1/16"),
        DurationBucket::new(1.0 / 3.0, "Duration_1/8t"),
        DurationBucket::new(0.375, "Duration_d1/16"),
        DurationBucket::new(0.5, "Duration_1/8"),
        DurationBucket::new(2.0 / 3.0, "Duration_1/4t"),
        DurationBucket::new(0.75, "Duration_d1/8"),
        DurationBucket::new(1.0, "Duration_1/4"),
        DurationBucket::new(1.5, "Duration_d1/4"),
        DurationBucket::new(2.0, "Duration_1/2"),
        DurationBucket::new(3.0, "Duration_d2"),
        DurationBucket::new(4.0, "Duration_1"),
    ]
}

/// Configuration for REMI encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Quantization steps per quarter note; 4 yields a 1/16-note grid.
    pub steps_per_quarter: u32,
    /// Discrete duration buckets; durations snap to the nearest entry, so
    /// values past the largest bucket clip to it.
    pub duration_buckets: Vec<DurationBucket>,
    /// Part handling policy for multi-part scores.
    pub part_policy: PartPolicy,
    /// Emit `Rest` tokens for rests instead of dropping them.
    pub include_rests: bool,
}

impl EncoderConfig {
    /// Returns a builder initialised with [`EncoderConfig::default`].
    #[must_use]
    pub fn builder() -> EncoderBuilder {
        EncoderBuilder::default()
    }

    /// Validates the invariants required for encoding.
    pub fn validate(&self) -> Result<()> {
        if self.steps_per_quarter == 0 {
            return Err(RemiError::InvalidConfig(
                "steps_per_quarter must be greater than zero".into(),
            ));
        }
        if self.duration_buckets.is_empty() {
            return Err(RemiError::InvalidConfig(
                "duration_buckets must not be empty".into(),
            ));
        }
        for bucket in &self.duration_buckets {
            if !bucket.quarter_length.is_finite() || bucket.quarter_length <= 0.0 {
                return Err(RemiError::InvalidConfig(format!(
                    "duration bucket {:?} must have a positive finite quarter_length",
                    bucket.label
                )));
            }
            if bucket.label.is_empty() {
                return Err(RemiError::InvalidConfig(
                    "duration bucket labels must not be empty".into(),
                ));
            }
        }
        let mut labels: Vec<&str> = self
            .duration_buckets
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        labels.sort_unstable();
        labels.dedup();
        if labels.len() != self.duration_buckets.len() {
            return Err(RemiError::InvalidConfig(
                "duration bucket labels must be unique".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            steps_per_quarter: 4,
            duration_buckets: default_duration_buckets(),
            part_policy: PartPolicy::Flatten,
            include_rests: false,
        }
    }
}

/// Builder for [`EncoderConfig`].
#[derive(Debug, Default, Clone)]
pub struct EncoderBuilder {
    cfg: EncoderConfig,
}

impl EncoderBuilder {
    /// Creates a builder with [`EncoderConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position quantization resolution in steps per quarter note.
    #[must_use]
    pub fn steps_per_quarter(mut self, value: u32) -> Self {
        self.cfg.steps_per_quarter = value;
        self
    }

    /// Overrides the duration bucket table.
    #[must_use]
    pub fn duration_buckets<I>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = DurationBucket>,
    {
        self.cfg.duration_buckets = buckets.into_iter().collect();
        self
    }

    /// Sets the part handling policy.
    #[must_use]
    pub fn part_policy(mut self, policy: PartPolicy) -> Self {
        self.cfg.part_policy = policy;
        self
    }

    /// Enables or disables `Rest` token emission.
    #[must_use]
    pub fn include_rests(mut self, enabled: bool) -> Self {
        self.cfg.include_rests = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`EncoderConfig`].
    ///
    /// The bucket table is sorted by quarter length so nearest-bucket ties
    /// resolve deterministically toward the shorter value.
    pub fn build(mut self) -> Result<EncoderConfig> {
        self.cfg
            .duration_buckets
            .sort_by(|a, b| a.quarter_length.total_cmp(&b.quarter_length));
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how input files are discovered on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
    /// Lower-case file extensions accepted as score inputs.
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
            extensions: vec!["xml".into(), "musicxml".into(), "mxl".into()],
        }
    }
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }

    /// Returns `true` when the path's extension is accepted.
    #[must_use]
    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Overrides the accepted file extensions (compared case-insensitively).
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.extensions = extensions
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn builder_sorts_duration_buckets() {
        let cfg = EncoderConfig::builder()
            .duration_buckets([
                DurationBucket::new(1.0, "Duration_1/4"),
                DurationBucket::new(0.5, "Duration_1/8"),
            ])
            .build()
            .expect("config should be valid");
        assert_eq!(cfg.duration_buckets[0].label, "Duration_1/8");
        assert_eq!(cfg.duration_buckets[1].label, "Duration_1/4");
    }

    #[test]
    fn validate_rejects_zero_resolution() {
        let cfg = EncoderConfig {
            steps_per_quarter: 0,
            ..EncoderConfig::default()
        };
        let err = cfg.validate().expect_err("validation should fail");
        assert!(matches!(
            err,
            RemiError::InvalidConfig(message) if message.contains("steps_per_quarter")
        ));
    }

    #[test]
    fn validate_rejects_duplicate_labels() {
        let cfg = EncoderConfig {
            duration_buckets: vec![
                DurationBucket::new(0.5, "Duration_1/8"),
                DurationBucket::new(1.0, "Duration_1/8"),
            ],
            ..EncoderConfig::default()
        };
        let err = cfg.validate().expect_err("validation should fail");
        assert!(matches!(
            err,
            RemiError::InvalidConfig(message) if message.contains("unique")
        ));
    }

    #[test]
    fn ingest_matches_extensions_case_insensitively() {
        let cfg = IngestConfig::default();
        assert!(cfg.matches(Path::new("score.MXL")));
        assert!(cfg.matches(Path::new("score.musicxml")));
        assert!(!cfg.matches(Path::new("score.midi")));
    }
}
