use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn score_with_note(step: char, octave: u8, duration: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list><score-part id="P1"><part-name>Music</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>4</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>{step}</step><octave>{octave}</octave></pitch><duration>{duration}</duration></note>
    </measure>
  </part>
</score-partwise>"#
    )
}

#[test]
fn encode_batch_skips_corrupt_files_and_reports() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("a.xml"), score_with_note('C', 4, 4)).expect("write a");
    fs::write(workspace.path().join("b.xml"), score_with_note('E', 4, 2)).expect("write b");
    fs::write(workspace.path().join("broken.xml"), "<score-partwise").expect("write broken");
    let output = workspace.path().join("all_remi.jsonl");

    let mut encode = Command::cargo_bin("remitok").expect("binary exists");
    let summary_output = encode
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "encode",
            ".",
            "-o",
            "all_remi.jsonl",
            "--no-progress",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: Value =
        serde_json::from_slice(&summary_output).expect("summary output is valid JSON");
    assert_eq!(summary["processed"], 3);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["skipped_parse"], 1);
    assert_eq!(summary["skipped_empty"], 0);

    let corpus = fs::read_to_string(&output).expect("read corpus");
    let records: Vec<Value> = corpus
        .lines()
        .map(|line| serde_json::from_str(line).expect("record is valid JSON"))
        .collect();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record["tokens"].as_array().expect("tokens array").len() >= 4);
        assert!(record["metadata"]["filename"].is_string());
    }
}

#[test]
fn preview_emits_the_reference_single_note_sequence() {
    let workspace = temp_workspace();
    let score_path = workspace.path().join("c4.xml");
    fs::write(&score_path, score_with_note('C', 4, 4)).expect("write score");

    let mut preview = Command::cargo_bin("remitok").expect("binary exists");
    let output = preview
        .current_dir(workspace.path())
        .args(["--quiet", "preview", "c4.xml", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let record: Value = serde_json::from_slice(&output).expect("record is valid JSON");
    let tokens: Vec<&str> = record["tokens"]
        .as_array()
        .expect("tokens array")
        .iter()
        .map(|v| v.as_str().expect("string token"))
        .collect();
    assert_eq!(tokens, vec!["Bar", "Position_0", "Pitch_60", "Duration_1/4"]);
    assert_eq!(record["file"], "c4.xml");
}

#[test]
fn encode_attaches_tags_and_info_summarises_the_corpus() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("a.xml"), score_with_note('G', 3, 4)).expect("write a");

    let mut encode = Command::cargo_bin("remitok").expect("binary exists");
    encode
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "encode",
            "a.xml",
            "-o",
            "corpus.jsonl",
            "--no-progress",
            "--tag",
            "composer=Byrd",
        ])
        .assert()
        .success();

    let corpus = fs::read_to_string(workspace.path().join("corpus.jsonl")).expect("read corpus");
    let record: Value = serde_json::from_str(corpus.lines().next().expect("one line"))
        .expect("record is valid JSON");
    assert_eq!(record["metadata"]["composer"], "Byrd");

    let mut info = Command::cargo_bin("remitok").expect("binary exists");
    let info_output = info
        .current_dir(workspace.path())
        .args(["--quiet", "info", "corpus.jsonl", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: Value = serde_json::from_slice(&info_output).expect("summary is valid JSON");
    assert_eq!(summary["records"], 1);
    assert_eq!(summary["bar_tokens"], 1);
    assert_eq!(summary["pitch_tokens"], 1);
    assert_eq!(summary["total_tokens"], 4);
}

#[test]
fn reencoding_the_same_file_is_byte_identical() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("a.xml"), score_with_note('A', 4, 2)).expect("write a");

    let mut runs = Vec::new();
    for output in ["first.jsonl", "second.jsonl"] {
        let mut encode = Command::cargo_bin("remitok").expect("binary exists");
        encode
            .current_dir(workspace.path())
            .args(["--quiet", "encode", "a.xml", "-o", output, "--no-progress"])
            .assert()
            .success();
        runs.push(fs::read(workspace.path().join(output)).expect("read corpus"));
    }
    assert_eq!(runs[0], runs[1]);
}
