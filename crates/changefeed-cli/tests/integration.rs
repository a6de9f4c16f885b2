//! Integration tests for CLI commands.

use changefeed_format::ChunkWriter;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn make_test_event(id: &str, event_type: &str) -> serde_json::Value {
    json!({
        "id": id,
        "eventType": event_type,
        "subject": format!("/blobServices/default/containers/data/blobs/{}", id),
        "eventTime": "2021-01-01T01:15:00Z",
        "data": { "contentLength": 512 }
    })
}

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_chunk(root: &Path, relative: &str, blocks: &[&[(&str, &str)]]) {
    let mut writer = ChunkWriter::new();
    for block in blocks {
        let events: Vec<_> = block
            .iter()
            .map(|(id, event_type)| make_test_event(id, event_type))
            .collect();
        writer.append_block(&events).unwrap();
    }
    write(root, relative, &writer.into_bytes());
}

/// Container with one segment at 01:00 holding two shards.
fn create_test_container() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(
        root,
        "meta/segments.json",
        br#"{"version":0,"lastConsumable":"2021-01-01T02:00:00Z"}"#,
    );
    write(
        root,
        "idx/segments/2021/01/01/0100/meta.json",
        br#"{"version":0,"shardPaths":["changefeed/log/00/2021/01/01/0100/","changefeed/log/01/2021/01/01/0100/"]}"#,
    );
    write_chunk(
        root,
        "log/00/2021/01/01/0100/000000.cfb",
        &[&[("e1", "BlobCreated"), ("e2", "BlobDeleted")], &[("e3", "BlobCreated")]],
    );
    write_chunk(
        root,
        "log/01/2021/01/01/0100/000000.cfb",
        &[&[("e4", "BlobCreated"), ("e5", "BlobCreated")]],
    );

    temp_dir
}

fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_changefeed"))
        .args(args)
        .output()
        .expect("Failed to execute CLI");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    let success = output.status.success();

    (success, stdout, stderr)
}

fn root_arg(dir: &TempDir) -> String {
    dir.path().to_string_lossy().to_string()
}

#[test]
fn test_list_command() {
    let dir = create_test_container();

    let (success, stdout, stderr) = run_cli(&["list", &root_arg(&dir)]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("EVENT_TIME"));
    for id in ["e1", "e2", "e3", "e4", "e5"] {
        assert!(stdout.contains(id), "missing {}", id);
    }
    assert!(stderr.contains("cursor: "));
}

#[test]
fn test_list_json_with_type_filter() {
    let dir = create_test_container();

    let (success, stdout, _) = run_cli(&[
        "list",
        &root_arg(&dir),
        "--json",
        "--event-type",
        "BlobDeleted",
    ]);
    assert!(success);

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], "e2");
}

#[test]
fn test_list_resumes_from_printed_cursor() {
    let dir = create_test_container();

    let (success, first, stderr) =
        run_cli(&["list", &root_arg(&dir), "--json", "--max-events", "2"]);
    assert!(success);
    assert_eq!(first.lines().count(), 2);
    let token = stderr
        .lines()
        .find_map(|l| l.strip_prefix("cursor: "))
        .unwrap()
        .to_string();

    let (success, rest, _) = run_cli(&["list", &root_arg(&dir), "--json", "--cursor", &token]);
    assert!(success);
    assert_eq!(rest.lines().count(), 3);
    for line in first.lines() {
        assert!(!rest.contains(line));
    }
}

#[test]
fn test_list_stops_at_max_events_without_reading_further() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "meta/segments.json",
        br#"{"version":0,"lastConsumable":"2021-01-01T01:00:00Z"}"#,
    );
    write(
        root,
        "idx/segments/2021/01/01/0100/meta.json",
        br#"{"version":0,"shardPaths":["changefeed/log/00/2021/01/01/0100/"]}"#,
    );
    let chunk = "log/00/2021/01/01/0100/000000.cfb";
    write_chunk(root, chunk, &[&[("e1", "BlobCreated")], &[("e2", "BlobCreated")]]);
    // The second block is cut short, so reading it fails in strict mode.
    let bytes = fs::read(root.join(chunk)).unwrap();
    fs::write(root.join(chunk), &bytes[..bytes.len() - 3]).unwrap();

    let (success, stdout, stderr) =
        run_cli(&["list", &root_arg(&dir), "--json", "--max-events", "1"]);
    assert!(success, "stderr: {}", stderr);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("e1"));

    let (success, _, stderr) = run_cli(&["list", &root_arg(&dir), "--json"]);
    assert!(!success);
    assert!(stderr.contains("corrupt"), "stderr: {}", stderr);
}

#[test]
fn test_pages_command() {
    let dir = create_test_container();

    let (success, stdout, _) = run_cli(&["pages", &root_arg(&dir), "--page-size", "2"]);
    assert!(success);

    let pages: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let counts: Vec<u64> = pages.iter().map(|p| p["count"].as_u64().unwrap()).collect();
    assert_eq!(counts, vec![2, 2, 1]);
    assert!(pages[0]["continuation"].is_string());
    assert!(pages[2]["continuation"].is_null());
}

#[test]
fn test_pages_rejects_zero_page_size() {
    let dir = create_test_container();

    let (success, _, stderr) = run_cli(&["pages", &root_arg(&dir), "--page-size", "0"]);
    assert!(!success);
    assert!(stderr.contains("invalid page size"));
}

#[test]
fn test_last_consumable_command() {
    let dir = create_test_container();

    let (success, stdout, _) = run_cli(&["last-consumable", &root_arg(&dir)]);
    assert!(success);
    assert_eq!(stdout.trim(), "2021-01-01T02:00:00Z");

    fs::remove_file(dir.path().join("meta/segments.json")).unwrap();
    let (success, stdout, _) = run_cli(&["last-consumable", &root_arg(&dir)]);
    assert!(success);
    assert_eq!(stdout.trim(), "none");
}

#[test]
fn test_empty_container_is_not_enabled() {
    let dir = TempDir::new().unwrap();

    let (success, _, stderr) = run_cli(&["list", &root_arg(&dir)]);
    assert!(!success);
    assert!(stderr.contains("not enabled"));
}

#[test]
fn test_cursor_command() {
    let dir = create_test_container();
    let (_, _, stderr) = run_cli(&["list", &root_arg(&dir), "--json"]);
    let token = stderr
        .lines()
        .find_map(|l| l.strip_prefix("cursor: "))
        .unwrap()
        .to_string();

    let (success, stdout, _) = run_cli(&["cursor", &token]);
    assert!(success);
    let decoded: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(decoded["version"], 1);
    assert_eq!(decoded["segment"]["segmentTime"], "2021-01-01T01:00:00Z");

    let (success, _, stderr) = run_cli(&["cursor", "definitely-not-a-cursor"]);
    assert!(!success);
    assert!(stderr.contains("malformed cursor"));
}

#[test]
fn test_dump_chunk_command() {
    let dir = create_test_container();
    let chunk = dir.path().join("log/00/2021/01/01/0100/000000.cfb");

    let (success, stdout, _) = run_cli(&["dump-chunk", chunk.to_str().unwrap()]);
    assert!(success);
    assert_eq!(stdout.matches("block @").count(), 2);

    let (success, stdout, _) = run_cli(&["dump-chunk", chunk.to_str().unwrap(), "--json"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 3);
}

#[test]
fn test_dump_chunk_reports_truncated_tail() {
    let dir = create_test_container();
    let chunk = dir.path().join("log/00/2021/01/01/0100/000000.cfb");
    let bytes = fs::read(&chunk).unwrap();
    fs::write(&chunk, &bytes[..bytes.len() - 3]).unwrap();

    let (success, stdout, stderr) = run_cli(&["dump-chunk", chunk.to_str().unwrap(), "--json"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stderr.contains("trailing bytes"));
}
