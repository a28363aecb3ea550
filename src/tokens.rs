//! REMI token types and the per-file token sequence.

use std::fmt;

use serde_json::{Map, Value};

/// One REMI token: a category plus its category-specific value.
///
/// Rendered in `category_value` string form (`Bar`, `Position_4`,
/// `Pitch_60`, `Duration_1/4`) when serialized to the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Marks the start of a measure.
    Bar,
    /// Quantized grid slot of an event within its measure.
    Position(u32),
    /// MIDI pitch of a note.
    Pitch(u8),
    /// Bucketed duration label.
    Duration(String),
    /// A rest event; only emitted when rest encoding is enabled.
    Rest,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Bar => f.write_str("Bar"),
            Token::Position(slot) => write!(f, "Position_{slot}"),
            Token::Pitch(midi) => write!(f, "Pitch_{midi}"),
            Token::Duration(label) => f.write_str(label),
            Token::Rest => f.write_str("Rest"),
        }
    }
}

/// Ordered token sequence for one source file, plus its metadata record.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSequence {
    /// Source file name; the unique corpus key.
    pub file: String,
    /// Flattened REMI tokens in emission order.
    pub tokens: Vec<Token>,
    /// External tags passed through unmodified, plus the `filename` key.
    pub metadata: Map<String, Value>,
}

impl TokenSequence {
    /// Renders every token in `category_value` string form.
    #[must_use]
    pub fn as_strings(&self) -> Vec<String> {
        self.tokens.iter().map(ToString::to_string).collect()
    }

    /// Number of `Bar` tokens, i.e. the measure count of the encoded parts.
    #[must_use]
    pub fn bar_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|token| matches!(token, Token::Bar))
            .count()
    }

    /// Number of `Pitch` tokens.
    #[must_use]
    pub fn pitch_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|token| matches!(token, Token::Pitch(_)))
            .count()
    }
}
