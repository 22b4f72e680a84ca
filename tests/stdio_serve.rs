//! Drives the headless host through its line protocol.

use std::fs;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use codeassist_bridge::{stdio, Config};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio_util::sync::CancellationToken;

const APP_ORIGIN: &str = "https://chat.example";

async fn next_frame(lines: &mut Lines<BufReader<DuplexStream>>) -> Value {
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("frame within timeout")
        .unwrap()
        .expect("output still open");
    serde_json::from_str(&line).unwrap()
}

async fn next_frame_of(lines: &mut Lines<BufReader<DuplexStream>>, kind: &str) -> Value {
    loop {
        let frame = next_frame(lines).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

#[tokio::test]
async fn test_serve_session() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.md"), "# Notes").unwrap();
    let config = Config {
        app_url: format!("{APP_ORIGIN}/"),
        ..Config::default()
    };

    let (mut stdin, input) = tokio::io::duplex(64 * 1024);
    let (output, stdout) = tokio::io::duplex(256 * 1024);
    let server = tokio::spawn(stdio::run(
        config,
        Some(dir.path().to_path_buf()),
        BufReader::new(input),
        output,
        CancellationToken::new(),
    ));
    let mut frames = BufReader::new(stdout).lines();

    stdin.write_all(b"{\"type\":\"start\"}\n").await.unwrap();
    let created = next_frame(&mut frames).await;
    assert_eq!(created["type"], "surfaceCreated");
    assert_eq!(created["viewType"], "codeassistChat");
    let html = next_frame(&mut frames).await;
    assert_eq!(html["type"], "surfaceHtml");
    assert!(html["html"].as_str().unwrap().contains(APP_ORIGIN));

    stdin.write_all(b"this is not a frame\n").await.unwrap();
    let request = json!({
        "type": "content",
        "origin": APP_ORIGIN,
        "message": { "command": "getFileContent", "data": { "fileName": "notes.md", "requestId": "n1" } }
    });
    stdin
        .write_all(format!("{request}\n").as_bytes())
        .await
        .unwrap();

    let reply = next_frame_of(&mut frames, "content").await;
    assert_eq!(reply["targetOrigin"], APP_ORIGIN);
    assert_eq!(reply["surface"], created["surface"]);
    assert_eq!(reply["message"]["command"], "fileContent");
    assert_eq!(reply["message"]["requestId"], "n1");
    let content = reply["message"]["data"]["content"].as_str().unwrap();
    assert_eq!(BASE64.decode(content).unwrap(), b"# Notes");

    drop(stdin);
    let disposed = next_frame_of(&mut frames, "surfaceDisposed").await;
    assert_eq!(disposed["surface"], created["surface"]);

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_serve_stops_on_shutdown_signal() {
    let (_stdin, input) = tokio::io::duplex(1024);
    let (output, _stdout) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(stdio::run(
        Config::default(),
        None,
        BufReader::new(input),
        output,
        shutdown.clone(),
    ));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
