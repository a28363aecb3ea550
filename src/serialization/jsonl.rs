//! JSON-lines corpus records consumed by the downstream tokenizer trainer.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RemiError, Result};
use crate::tokens::TokenSequence;

/// One persisted corpus line pairing a token sequence with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusRecord {
    /// Source file name; the unique corpus key.
    pub file: String,
    /// Tokens in `category_value` string form.
    pub tokens: Vec<String>,
    /// Metadata tags, including the `filename` key.
    pub metadata: Map<String, Value>,
}

impl CorpusRecord {
    /// Projects a [`TokenSequence`] into its persisted form.
    #[must_use]
    pub fn from_sequence(sequence: &TokenSequence) -> Self {
        Self {
            file: sequence.file.clone(),
            tokens: sequence.as_strings(),
            metadata: sequence.metadata.clone(),
        }
    }
}

/// Append-only writer for the corpus file.
///
/// Owned exclusively by the batch loop; the handle is released when the
/// writer is dropped or [`CorpusWriter::finish`] flushes it.
#[derive(Debug)]
pub struct CorpusWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl CorpusWriter {
    /// Creates the output file, truncating unless `append` is set.
    pub fn create<P: AsRef<Path>>(path: P, append: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|err| RemiError::io(err, Some(path.clone())))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Serialises one record as a single JSON line.
    pub fn write_record(&mut self, record: &CorpusRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .map_err(|err| RemiError::io(err, Some(self.path.clone())))
    }

    /// Flushes buffered records to disk.
    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| RemiError::io(err, Some(self.path.clone())))
    }
}

/// Reads an entire corpus file back into memory.
///
/// Intended for inspection and tests; the encoding pipeline itself never
/// holds more than one record at a time.
pub fn read_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<CorpusRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| RemiError::io(err, Some(path.to_path_buf())))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Token;
    use tempfile::tempdir;

    fn sample_sequence() -> TokenSequence {
        let mut metadata = Map::new();
        metadata.insert("filename".into(), Value::String("a.xml".into()));
        TokenSequence {
            file: "a.xml".into(),
            tokens: vec![
                Token::Bar,
                Token::Position(0),
                Token::Pitch(60),
                Token::Duration("Duration_1/4".into()),
            ],
            metadata,
        }
    }

    #[test]
    fn records_round_trip_through_jsonl() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("all_remi.jsonl");

        let record = CorpusRecord::from_sequence(&sample_sequence());
        let mut writer = CorpusWriter::create(&path, false).expect("create writer");
        writer.write_record(&record).expect("write record");
        writer.finish().expect("flush");

        let records = read_corpus(&path).expect("read corpus");
        assert_eq!(records, vec![record]);
        assert_eq!(
            records[0].tokens,
            vec!["Bar", "Position_0", "Pitch_60", "Duration_1/4"]
        );
    }

    #[test]
    fn append_mode_preserves_existing_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("all_remi.jsonl");
        let record = CorpusRecord::from_sequence(&sample_sequence());

        for _ in 0..2 {
            let mut writer = CorpusWriter::create(&path, true).expect("create writer");
            writer.write_record(&record).expect("write record");
            writer.finish().expect("flush");
        }

        assert_eq!(read_corpus(&path).expect("read corpus").len(), 2);
    }
}
