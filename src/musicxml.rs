//! MusicXML parsing into the [`Score`] model.
//!
//! Handles plain `.xml`/`.musicxml` documents and compressed `.mxl`
//! containers. Only partwise scores are supported; timewise documents are
//! rejected with a parse error naming the root element. Onset arithmetic
//! follows the MusicXML cursor model: `<note>` advances the cursor by its
//! duration unless flagged `<chord/>`, `<backup>` rewinds it, `<forward>`
//! advances it.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use roxmltree::{Document, Node};
use zip::ZipArchive;

use crate::error::{RemiError, Result};
use crate::score::{Measure, Note, Part, Pitch, Score, TimeSignature};

/// Parses a MusicXML or compressed `.mxl` file into a [`Score`].
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Score> {
    let path = path.as_ref();
    let xml = read_source(path)?;
    parse_str(&xml, path)
}

/// Parses MusicXML document text into a [`Score`].
///
/// `path` is only used to label errors.
pub fn parse_str(xml: &str, path: &Path) -> Result<Score> {
    let xml = strip_doctype(xml);
    let doc =
        Document::parse(&xml).map_err(|err| RemiError::parse(path, err.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(RemiError::parse(
            path,
            format!("unsupported root element <{}>", root.tag_name().name()),
        ));
    }

    let time_signature = extract_time_signature(&root);
    let mut parts = Vec::new();
    for part_node in root.children().filter(|n| n.has_tag_name("part")) {
        parts.push(parse_part(part_node));
    }
    debug!(
        "parsed {}: {} parts, {} measures",
        path.display(),
        parts.len(),
        parts.iter().map(|p: &Part| p.measures.len()).sum::<usize>()
    );

    Ok(Score {
        parts,
        time_signature,
    })
}

fn read_source(path: &Path) -> Result<String> {
    let compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mxl"));
    if compressed {
        read_mxl(path)
    } else {
        std::fs::read_to_string(path)
            .map_err(|err| RemiError::parse(path, format!("unable to read file: {err}")))
    }
}

/// Extracts the score document from an `.mxl` zip container.
///
/// The container's `META-INF/container.xml` names the root document; when it
/// is absent or unusable, the first `.xml`/`.musicxml` entry outside
/// `META-INF/` is taken instead.
fn read_mxl(path: &Path) -> Result<String> {
    let file = File::open(path)
        .map_err(|err| RemiError::parse(path, format!("unable to open archive: {err}")))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| RemiError::parse(path, format!("invalid mxl container: {err}")))?;

    let entry_name = rootfile_name(&mut archive, path)?.or_else(|| {
        archive
            .file_names()
            .filter(|name| !name.starts_with("META-INF/"))
            .find(|name| {
                let lower = name.to_ascii_lowercase();
                lower.ends_with(".xml") || lower.ends_with(".musicxml")
            })
            .map(str::to_owned)
    });
    let entry_name = entry_name
        .ok_or_else(|| RemiError::parse(path, "mxl container holds no score document"))?;

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|err| RemiError::parse(path, format!("unreadable entry {entry_name}: {err}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| RemiError::parse(path, format!("unreadable entry {entry_name}: {err}")))?;
    Ok(xml)
}

fn rootfile_name(archive: &mut ZipArchive<File>, path: &Path) -> Result<Option<String>> {
    let mut container = String::new();
    match archive.by_name("META-INF/container.xml") {
        Ok(mut entry) => {
            entry.read_to_string(&mut container).map_err(|err| {
                RemiError::parse(path, format!("unreadable container.xml: {err}"))
            })?;
        }
        Err(_) => return Ok(None),
    }
    let Ok(doc) = Document::parse(&container) else {
        return Ok(None);
    };
    Ok(doc
        .descendants()
        .find(|n| n.has_tag_name("rootfile"))
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_owned))
}

fn strip_doctype(xml: &str) -> String {
    static DTD_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DTD_REGEX.get_or_init(|| {
        Regex::new(r"(?s)<!DOCTYPE.*?>").expect("doctype pattern is valid")
    });
    regex.replace(xml, "").into_owned()
}

fn extract_time_signature(root: &Node<'_, '_>) -> TimeSignature {
    let beats_per_measure = root
        .descendants()
        .find(|n| n.has_tag_name("time"))
        .and_then(|n| {
            n.descendants()
                .find(|m| m.has_tag_name("beats"))
                .and_then(|b| b.text().map(|t| t.trim().parse::<u8>().unwrap_or(4)))
        })
        .unwrap_or(4);

    let beat_value = root
        .descendants()
        .find(|n| n.has_tag_name("time"))
        .and_then(|n| {
            n.descendants()
                .find(|m| m.has_tag_name("beat-type"))
                .and_then(|b| b.text().map(|t| t.trim().parse::<u8>().unwrap_or(4)))
        })
        .unwrap_or(4);

    TimeSignature {
        beats_per_measure,
        beat_value,
    }
}

fn parse_part(part_node: Node<'_, '_>) -> Part {
    let id = part_node.attribute("id").unwrap_or_default().to_string();
    let mut divisions = 1u32;
    let mut measures = Vec::new();
    for measure_node in part_node.children().filter(|n| n.has_tag_name("measure")) {
        measures.push(parse_measure(measure_node, &mut divisions));
    }
    Part { id, measures }
}

fn parse_measure(measure_node: Node<'_, '_>, divisions: &mut u32) -> Measure {
    let mut notes = Vec::new();
    // Cursor in divisions; i64 so a sloppy <backup> cannot underflow.
    let mut cursor = 0i64;
    let mut prev_onset = 0i64;

    for child in measure_node.children() {
        match child.tag_name().name() {
            "attributes" => {
                if let Some(value) = child
                    .children()
                    .find(|n| n.has_tag_name("divisions"))
                    .and_then(|n| n.text())
                    .and_then(|t| t.trim().parse::<u32>().ok())
                {
                    if value > 0 {
                        *divisions = value;
                    }
                }
            }
            "backup" => cursor -= element_duration(&child),
            "forward" => cursor += element_duration(&child),
            "note" => {
                if child.children().any(|n| n.has_tag_name("grace")) {
                    continue;
                }
                let duration = element_duration(&child);
                if duration <= 0 {
                    continue;
                }
                let is_chord = child.children().any(|n| n.has_tag_name("chord"));
                let onset = if is_chord { prev_onset } else { cursor };
                let is_rest = child.children().any(|n| n.has_tag_name("rest"));
                let pitch = if is_rest {
                    None
                } else {
                    extract_pitch(&child).map(Pitch::to_midi)
                };
                if pitch.is_some() || is_rest {
                    notes.push(Note {
                        onset: onset.max(0) as u32,
                        duration: duration as u32,
                        pitch,
                    });
                }
                prev_onset = onset;
                if !is_chord {
                    cursor = onset + duration;
                }
            }
            _ => {}
        }
    }

    notes.sort_by_key(|note| (note.onset, note.is_rest(), note.pitch.unwrap_or(0)));
    Measure {
        divisions: *divisions,
        notes,
    }
}

fn element_duration(node: &Node<'_, '_>) -> i64 {
    node.children()
        .find(|n| n.has_tag_name("duration"))
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn extract_pitch(note_node: &Node<'_, '_>) -> Option<Pitch> {
    let pitch_node = note_node.children().find(|n| n.has_tag_name("pitch"))?;
    let step = pitch_node
        .children()
        .find(|n| n.has_tag_name("step"))
        .and_then(|n| n.text().map(|t| t.trim().chars().next().unwrap_or('C')))
        .unwrap_or('C');
    let octave = pitch_node
        .children()
        .find(|n| n.has_tag_name("octave"))
        .and_then(|n| n.text().map(|t| t.trim().parse::<i8>().unwrap_or(4)))
        .unwrap_or(4);
    let alter = pitch_node
        .children()
        .find(|n| n.has_tag_name("alter"))
        .and_then(|n| n.text().map(|t| t.trim().parse::<i8>().ok()))
        .flatten()
        .unwrap_or(0);
    Some(Pitch {
        step,
        alter,
        octave,
    })
}
