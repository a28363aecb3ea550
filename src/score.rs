//! In-memory representation of a parsed symbolic score.
//!
//! A [`Score`] holds an ordered list of parts; each part an ordered list of
//! measures; each measure its notes sorted by onset. Onsets and durations are
//! kept in MusicXML divisions so positions quantize with exact integer
//! arithmetic. These objects live only for the duration of one file's
//! encoding pass.

use serde::{Deserialize, Serialize};

/// Spelled pitch as it appears in MusicXML, prior to MIDI folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    /// Note step (A through G).
    pub step: char,
    /// Chromatic alteration in semitones (-1 flat, +1 sharp).
    pub alter: i8,
    /// Scientific octave number; octave 4 contains middle C.
    pub octave: i8,
}

impl Pitch {
    /// Folds the spelled pitch into a MIDI note number, clamped to 0..=127.
    #[must_use]
    pub fn to_midi(self) -> u8 {
        let semitone = match self.step.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => 0,
        };
        let midi = (i32::from(self.octave) + 1) * 12 + semitone + i32::from(self.alter);
        midi.clamp(0, 127) as u8
    }
}

/// One sounding event within a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// Onset within the measure, in divisions.
    pub onset: u32,
    /// Duration in divisions; always greater than zero.
    pub duration: u32,
    /// MIDI pitch, or `None` for a rest.
    pub pitch: Option<u8>,
}

impl Note {
    /// Returns `true` when this event is a rest.
    #[must_use]
    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

/// One bar of music with the division resolution in effect for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measure {
    /// Divisions per quarter note governing this measure's onsets.
    pub divisions: u32,
    /// Notes and rests sorted by onset.
    pub notes: Vec<Note>,
}

/// One instrumental or vocal line of the score.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// MusicXML part id (`P1`, `P2`, ...).
    pub id: String,
    /// Measures in document order.
    pub measures: Vec<Measure>,
}

/// Time signature captured from the first `<time>` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per measure.
    pub beats_per_measure: u8,
    /// Note value receiving one beat.
    pub beat_value: u8,
}

/// Parsed representation of one input file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    /// Parts in document order.
    pub parts: Vec<Part>,
    /// Time signature of the opening measure.
    pub time_signature: TimeSignature,
}

impl Score {
    /// Total number of measures across all parts.
    #[must_use]
    pub fn measure_count(&self) -> usize {
        self.parts.iter().map(|part| part.measures.len()).sum()
    }

    /// Number of pitched (non-rest) notes across all parts.
    #[must_use]
    pub fn pitched_note_count(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|part| &part.measures)
            .flat_map(|measure| &measure.notes)
            .filter(|note| !note.is_rest())
            .count()
    }
}
