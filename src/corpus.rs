//! Facilities for discovering score files and driving the batch encode loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::config::{EncoderConfig, IngestConfig};
use crate::encoder;
use crate::error::{RemiError, Result};
use crate::metrics::{BatchSummary, SkipReason};
use crate::serialization::{CorpusRecord, CorpusWriter};
use crate::tokens::TokenSequence;

/// Discovers score files rooted at the provided input paths.
///
/// Directories are traversed recursively by default; set
/// [`IngestConfig::recursive`] to `false` to limit discovery to the first
/// level. Discovered paths are sorted so a corpus rebuilt from the same tree
/// lists its records in a stable order.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(RemiError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .symlink_metadata()
            .map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            if cfg.recursive {
                let walker = WalkDir::new(path).follow_links(cfg.follow_symlinks);
                for entry in walker {
                    let entry = entry
                        .map_err(|err| RemiError::io(err.into(), Some(path.to_path_buf())))?;
                    if entry.file_type().is_file() && cfg.matches(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                for entry in fs::read_dir(path)
                    .map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?
                {
                    let entry =
                        entry.map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() && cfg.matches(&entry_path) {
                        files.push(entry_path);
                    }
                }
            }
        } else if metadata.is_file() {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(RemiError::InvalidConfig(
            "no score files discovered in provided inputs".into(),
        ));
    }
    files.sort();
    Ok(files)
}

/// External metadata lookup mapping source paths to sidecar JSON files.
///
/// The map file is one JSON object whose keys are source paths (absolute,
/// relative, or bare file names) and whose values are paths to per-file
/// metadata JSON objects, the shape of the PDMX dataset index.
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: Map<String, Value>,
    base_dir: PathBuf,
}

impl MetadataMap {
    /// Loads a metadata map file; sidecar paths resolve relative to its
    /// parent directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?;
        let entries: Map<String, Value> = serde_json::from_str(&text)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        Ok(Self { entries, base_dir })
    }

    /// Returns the external tags for one source file, or an empty map when
    /// the file has no entry or its sidecar is unreadable.
    #[must_use]
    pub fn tags_for(&self, source: &Path) -> Map<String, Value> {
        let sidecar = self
            .entries
            .get(&source.display().to_string())
            .or_else(|| {
                source
                    .file_name()
                    .and_then(|name| self.entries.get(&name.to_string_lossy().to_string()))
            })
            .and_then(Value::as_str);
        let Some(sidecar) = sidecar else {
            return Map::new();
        };
        let sidecar_path = self.base_dir.join(sidecar.trim_start_matches("./"));
        match fs::read_to_string(&sidecar_path)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                serde_json::from_str::<Map<String, Value>>(&text).map_err(|err| err.to_string())
            }) {
            Ok(tags) => tags,
            Err(err) => {
                warn!(
                    "metadata sidecar {} unusable for {}: {err}",
                    sidecar_path.display(),
                    source.display()
                );
                Map::new()
            }
        }
    }
}

/// Lazy per-file encoder over a fixed list of input paths.
///
/// Each iteration parses, encodes, and releases one file; nothing is retained
/// between files, so a batch of any size runs in per-file memory.
#[derive(Debug)]
pub struct CorpusEncoder {
    paths: std::vec::IntoIter<PathBuf>,
    cfg: EncoderConfig,
    tags: Map<String, Value>,
    metadata_map: Option<MetadataMap>,
}

impl CorpusEncoder {
    /// Creates an encoder over the given paths.
    ///
    /// `tags` apply to every file; per-file tags from `metadata_map` are
    /// merged on top of them.
    #[must_use]
    pub fn new(
        paths: Vec<PathBuf>,
        cfg: EncoderConfig,
        tags: Map<String, Value>,
        metadata_map: Option<MetadataMap>,
    ) -> Self {
        Self {
            paths: paths.into_iter(),
            cfg,
            tags,
            metadata_map,
        }
    }

    /// Number of files not yet encoded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl Iterator for CorpusEncoder {
    type Item = (PathBuf, Result<TokenSequence>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        let mut tags = self.tags.clone();
        if let Some(map) = &self.metadata_map {
            tags.extend(map.tags_for(&path));
        }
        let result = encoder::encode(&path, &self.cfg, &tags);
        Some((path, result))
    }
}

/// Creates a lazy corpus encoder over the discovered inputs.
pub fn encode_corpus<P: AsRef<Path>>(
    inputs: &[P],
    encoder_cfg: &EncoderConfig,
    ingest_cfg: &IngestConfig,
    tags: Map<String, Value>,
    metadata_map: Option<MetadataMap>,
) -> Result<CorpusEncoder> {
    encoder_cfg.validate()?;
    let paths = collect_paths(inputs, ingest_cfg)?;
    Ok(CorpusEncoder::new(
        paths,
        encoder_cfg.clone(),
        tags,
        metadata_map,
    ))
}

/// Encodes every discovered input and appends one record per success to the
/// corpus file at `output`.
///
/// Per-file failures are logged and counted; they never abort the batch.
/// The output handle and the counters live in this function and are released
/// on every exit path.
pub fn encode_corpus_to_path<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    encoder_cfg: &EncoderConfig,
    ingest_cfg: &IngestConfig,
    tags: Map<String, Value>,
    metadata_map: Option<MetadataMap>,
    append: bool,
) -> Result<BatchSummary> {
    let encoder = encode_corpus(inputs, encoder_cfg, ingest_cfg, tags, metadata_map)?;
    let mut writer = CorpusWriter::create(output, append)?;
    let mut summary = BatchSummary::new();
    let start = Instant::now();

    for (path, result) in encoder {
        match result {
            Ok(sequence) => {
                writer.write_record(&CorpusRecord::from_sequence(&sequence))?;
                summary.record_success();
            }
            Err(err) => match SkipReason::classify(&err) {
                Some(reason) => {
                    warn!("skipping {}: {err}", path.display());
                    summary.record_skip(reason);
                }
                None => return Err(err),
            },
        }
    }

    writer.finish()?;
    summary.elapsed = start.elapsed();
    info!(
        "encoded {} of {} files ({} skipped) into {}",
        summary.succeeded,
        summary.processed,
        summary.skipped_total(),
        output.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::read_corpus;
    use std::fs;
    use tempfile::tempdir;

    const MINIMAL_SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list><score-part id="P1"><part-name>Music</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn collect_paths_filters_and_sorts() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("create nested directory");
        fs::write(dir.path().join("b.xml"), MINIMAL_SCORE).expect("write b");
        fs::write(nested.join("a.musicxml"), MINIMAL_SCORE).expect("write a");
        fs::write(dir.path().join("notes.txt"), "not a score").expect("write txt");

        let cfg = IngestConfig::default();
        let paths = collect_paths(&[dir.path()], &cfg).expect("collect paths");
        assert_eq!(paths.len(), 2);
        assert!(paths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn collect_paths_rejects_missing_inputs() {
        let err = collect_paths(&[Path::new("/nonexistent/corpus")], &IngestConfig::default())
            .expect_err("should fail");
        assert!(matches!(err, RemiError::InvalidConfig(_)));
    }

    #[test]
    fn corrupt_file_is_skipped_without_aborting_the_batch() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("good_a.xml"), MINIMAL_SCORE).expect("write a");
        fs::write(dir.path().join("bad.xml"), "<score-partwise").expect("write bad");
        fs::write(dir.path().join("good_b.xml"), MINIMAL_SCORE).expect("write b");
        let output = dir.path().join("all_remi.jsonl");

        let summary = encode_corpus_to_path(
            &[dir.path()],
            &output,
            &EncoderConfig::default(),
            &IngestConfig::default(),
            Map::new(),
            None,
            false,
        )
        .expect("batch succeeds");

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped_parse, 1);
        assert_eq!(read_corpus(&output).expect("read corpus").len(), 2);
    }

    #[test]
    fn empty_scores_contribute_no_corpus_lines() {
        let dir = tempdir().expect("tempdir");
        let rest_only = MINIMAL_SCORE.replace(
            "<note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>",
            "<note><rest/><duration>1</duration></note>",
        );
        fs::write(dir.path().join("rests.xml"), rest_only).expect("write rests");
        let output = dir.path().join("all_remi.jsonl");

        let summary = encode_corpus_to_path(
            &[dir.path()],
            &output,
            &EncoderConfig::default(),
            &IngestConfig::default(),
            Map::new(),
            None,
            false,
        )
        .expect("batch succeeds");

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped_empty, 1);
        assert!(read_corpus(&output).expect("read corpus").is_empty());
    }

    #[test]
    fn metadata_map_attaches_sidecar_tags() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("song.xml"), MINIMAL_SCORE).expect("write score");
        fs::write(
            dir.path().join("song.metadata.json"),
            r#"{"composer": "Tallis", "catalog": "T-42"}"#,
        )
        .expect("write sidecar");
        let map_path = dir.path().join("map.json");
        fs::write(&map_path, r#"{"song.xml": "./song.metadata.json"}"#).expect("write map");

        let map = MetadataMap::load(&map_path).expect("load map");
        let mut encoder = CorpusEncoder::new(
            vec![dir.path().join("song.xml")],
            EncoderConfig::default(),
            Map::new(),
            Some(map),
        );
        let (_, result) = encoder.next().expect("one file");
        let sequence = result.expect("encode");
        assert_eq!(sequence.metadata["composer"], "Tallis");
        assert_eq!(sequence.metadata["catalog"], "T-42");
        assert_eq!(sequence.metadata["filename"], "song.xml");
    }
}
