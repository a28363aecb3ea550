//! Projection of a parsed [`Score`] into a flat REMI token sequence.
//!
//! The projection is deterministic and lossy: pitch, grid-quantized position,
//! and bucketed duration survive; dynamics and articulation do not. Rerunning
//! the encoder over the same file with the same configuration produces
//! byte-identical tokens.

use std::path::Path;

use serde_json::{Map, Value};

use crate::config::{DurationBucket, EncoderConfig, PartPolicy};
use crate::error::{RemiError, Result};
use crate::musicxml;
use crate::score::{Part, Score};
use crate::tokens::{Token, TokenSequence};

/// Parses and encodes one file into a [`TokenSequence`].
///
/// `tags` are copied into the sequence metadata unmodified; the source file
/// name is recorded under the `filename` key.
pub fn encode<P: AsRef<Path>>(
    path: P,
    cfg: &EncoderConfig,
    tags: &Map<String, Value>,
) -> Result<TokenSequence> {
    let path = path.as_ref();
    let score = musicxml::parse_file(path)?;
    encode_score(&score, path, cfg, tags)
}

/// Encodes an already-parsed score.
///
/// `path` labels the sequence and any [`RemiError::EmptyScore`] raised for a
/// score whose selected parts contain no pitched notes.
pub fn encode_score(
    score: &Score,
    path: &Path,
    cfg: &EncoderConfig,
    tags: &Map<String, Value>,
) -> Result<TokenSequence> {
    cfg.validate()?;
    let parts = selected_parts(score, path, cfg.part_policy)?;

    let pitched: usize = parts
        .iter()
        .flat_map(|part| &part.measures)
        .flat_map(|measure| &measure.notes)
        .filter(|note| !note.is_rest())
        .count();
    if pitched == 0 {
        return Err(RemiError::EmptyScore {
            path: path.to_path_buf(),
        });
    }

    let mut tokens = Vec::new();
    for part in &parts {
        for measure in &part.measures {
            tokens.push(Token::Bar);
            for note in &measure.notes {
                if note.is_rest() && !cfg.include_rests {
                    continue;
                }
                tokens.push(Token::Position(quantize_position(
                    note.onset,
                    measure.divisions,
                    cfg.steps_per_quarter,
                )));
                match note.pitch {
                    Some(midi) => tokens.push(Token::Pitch(midi)),
                    None => tokens.push(Token::Rest),
                }
                tokens.push(Token::Duration(
                    quantize_duration(note.duration, measure.divisions, &cfg.duration_buckets)
                        .to_string(),
                ));
            }
        }
    }

    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut metadata = tags.clone();
    metadata.insert("filename".into(), Value::String(file.clone()));

    Ok(TokenSequence {
        file,
        tokens,
        metadata,
    })
}

fn selected_parts<'a>(
    score: &'a Score,
    path: &Path,
    policy: PartPolicy,
) -> Result<Vec<&'a Part>> {
    match policy {
        PartPolicy::Flatten => Ok(score.parts.iter().collect()),
        PartPolicy::Select(index) => score
            .parts
            .get(index)
            .map(|part| vec![part])
            .ok_or_else(|| {
                RemiError::parse(
                    path,
                    format!(
                        "part index {index} out of range ({} parts present)",
                        score.parts.len()
                    ),
                )
            }),
    }
}

/// Quantizes an onset in divisions to the nearest grid slot.
///
/// Computed as `round(onset * steps_per_quarter / divisions)` in integer
/// arithmetic, rounding half up.
pub(crate) fn quantize_position(onset: u32, divisions: u32, steps_per_quarter: u32) -> u32 {
    let numerator = 2 * u64::from(onset) * u64::from(steps_per_quarter) + u64::from(divisions);
    (numerator / (2 * u64::from(divisions))) as u32
}

/// Maps a duration in divisions to the nearest bucket label.
///
/// Ties resolve toward the shorter bucket; durations beyond the table clip to
/// its largest entry. The table is kept sorted by the config builder.
pub(crate) fn quantize_duration<'a>(
    duration: u32,
    divisions: u32,
    buckets: &'a [DurationBucket],
) -> &'a str {
    let quarter_length = f64::from(duration) / f64::from(divisions.max(1));
    let mut best = &buckets[0];
    let mut best_distance = (best.quarter_length - quarter_length).abs();
    for bucket in &buckets[1..] {
        let distance = (bucket.quarter_length - quarter_length).abs();
        if distance < best_distance {
            best = bucket;
            best_distance = distance;
        }
    }
    &best.label
}
