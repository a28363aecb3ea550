//! Helpers for (de)serialising the JSON-lines corpus format.

pub mod jsonl;

pub use jsonl::{read_corpus, CorpusRecord, CorpusWriter};
