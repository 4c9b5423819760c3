use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use assert_cmd::Command;
use tempfile::tempdir;

const UPLOADED_IMAGE: &str = "![dot](data:image/png;base64,AAAAAAAA)";

#[test]
#[allow(deprecated)]
fn test_markdown_from_persisted_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");
    fs::write(
        &path,
        r#"{"root":{"type":"root","children":[
            {"type":"heading","level":2,"children":[{"type":"text","text":"Notes","format":0}]},
            {"type":"paragraph","children":[{"type":"text","text":"bold","format":1}]}
        ]}}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("markdown").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::eq("## Notes\n\n**bold**\n"));
}

#[test]
#[allow(deprecated)]
fn test_html_from_stdin() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("html").arg("-").write_stdin("# Hi\n\nsee #rust");
    cmd.assert().success().stdout(predicate::str::contains(
        "<h1>Hi</h1><p>see <span class=\"hashtag\">#rust</span></p>",
    ));
}

#[test]
#[allow(deprecated)]
fn test_import_emits_tree_json() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("import").arg("-").write_stdin("https://youtu.be/dQw4w9WgXcQ");
    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let blocks = json["root"]["children"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["type"], "video-embed");
    assert_eq!(blocks[0]["platform"], "youtube");
    assert_eq!(blocks[0]["videoId"], "dQw4w9WgXcQ");
}

#[test]
#[allow(deprecated)]
fn test_unknown_kind_is_reported() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("markdown")
        .arg("-")
        .write_stdin(r#"{"root":{"type":"root","children":[{"type":"poll","children":[]}]}}"#);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("poll")));
}

#[test]
#[allow(deprecated)]
fn test_media_within_budget() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("media").arg("-").write_stdin(UPLOADED_IMAGE);
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["totalBytes"], 6);
    assert_eq!(json["overCapacity"], false);
    assert_eq!(json["media"][0]["sizeBytes"], 6);
    assert_eq!(json["validation"]["valid"], true);
}

#[test]
#[allow(deprecated)]
fn test_media_over_budget_exits_nonzero() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.args(["media", "-", "--max-payload-bytes", "4"])
        .write_stdin(UPLOADED_IMAGE);
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["overCapacity"], true);
    assert_eq!(json["usagePercent"], 150.0);
    assert_eq!(json["validation"]["valid"], false);
}

#[test]
#[allow(deprecated)]
fn test_media_budget_from_config_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("editor.json");
    fs::write(&config, r#"{"max_payload_bytes": 5}"#).unwrap();

    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .args(["media", "-"])
        .write_stdin(UPLOADED_IMAGE);
    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"maxPayloadBytes\": 5"));
}

#[test]
#[allow(deprecated)]
fn test_classify_strategies() {
    for (input, expected) in [
        ("Hello world", "decline\n"),
        ("https://youtu.be/dQw4w9WgXcQ", "video-embed\n"),
        ("# Title\n\n- item", "markdown\n"),
    ] {
        let mut cmd = Command::cargo_bin("md-richtext").unwrap();
        cmd.args(["classify", "-"]).write_stdin(input);
        cmd.assert().success().stdout(predicate::eq(expected));
    }
}

#[test]
#[allow(deprecated)]
fn test_classify_json_lists_signals() {
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.args(["classify", "-", "--json"])
        .write_stdin("# Title\n\nsome **bold** text");
    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["strategy"], "markdown");
    assert!(json["video"].is_null());
    let signals: Vec<&str> = json["signals"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(serde_json::Value::as_str)
        .collect();
    assert_eq!(signals, vec!["Heading", "Emphasis"]);
}

#[test]
#[allow(deprecated)]
fn test_missing_input_file() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("md-richtext").unwrap();
    cmd.arg("markdown").arg(dir.path().join("absent.md"));
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("absent.md"));
}
