//! MusicXML to REMI corpus encoding library and CLI.
//!
//! The crate exposes both a library API and a `remitok` command line
//! interface for projecting symbolic music files (MusicXML `.xml` /
//! `.musicxml`, or compressed `.mxl`) into REMI token sequences — `Bar`,
//! `Position`, `Pitch`, and `Duration` symbols — collected one JSON-lines
//! record per file into a corpus consumed by downstream tokenizer training.
//! Typical usage discovers a directory of scores, encodes each file, and
//! appends the results to `all_remi.jsonl`.
//!
//! ```no_run
//! use remitok::{encode_corpus_to_path, EncoderConfig, IngestConfig};
//! use std::path::Path;
//!
//! # fn main() -> remitok::Result<()> {
//! let encoder_cfg = EncoderConfig::builder()
//!     .steps_per_quarter(4)
//!     .build()?;
//! let ingest_cfg = IngestConfig::default();
//! let summary = encode_corpus_to_path(
//!     &["/path/to/scores"],
//!     Path::new("all_remi.jsonl"),
//!     &encoder_cfg,
//!     &ingest_cfg,
//!     serde_json::Map::new(),
//!     None,
//!     false,
//! )?;
//! println!("{} files encoded", summary.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! Encoding is deterministic: the same file under the same configuration
//! always yields byte-identical tokens. Per-file parse failures and empty
//! scores are skipped and counted, never aborting a batch.
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting
//! the library portion only can disable default features to avoid the CLI
//! dependencies: `remitok = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod corpus;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod musicxml;
pub mod score;
pub mod serialization;
pub mod tokens;

pub use config::{
    default_duration_buckets, DurationBucket, EncoderBuilder, EncoderConfig, IngestBuilder,
    IngestConfig, PartPolicy,
};
pub use corpus::{collect_paths, encode_corpus, encode_corpus_to_path, CorpusEncoder, MetadataMap};
pub use encoder::{encode, encode_score};
pub use error::{RemiError, Result};
pub use metrics::{BatchSummary, SkipReason};
pub use score::{Measure, Note, Part, Pitch, Score, TimeSignature};
pub use serialization::{read_corpus, CorpusRecord, CorpusWriter};
pub use tokens::{Token, TokenSequence};
