//! End-to-end checks of the bridge protocol against in-memory surfaces.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use codeassist_bridge::bridge::{CompletionContext, Position, SurfaceEvents};
use codeassist_bridge::host::local::LocalHost;
use codeassist_bridge::host::memory::{MemorySurface, MemorySurfaceFactory};
use codeassist_bridge::host::{EditorHost, FilePatterns, Surface, SurfaceFactory};
use codeassist_bridge::{Bridge, Config, Envelope};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const APP_ORIGIN: &str = "https://chat.example";

fn config(timeout_ms: u64) -> Config {
    Config {
        app_url: format!("{APP_ORIGIN}/app"),
        completion_timeout_ms: timeout_ms,
        ..Config::default()
    }
}

fn bridge(
    roots: Vec<PathBuf>,
    timeout_ms: u64,
) -> (Arc<Bridge>, SurfaceEvents, Arc<MemorySurfaceFactory>) {
    let host: Arc<dyn EditorHost> = Arc::new(LocalHost::new(roots));
    let factory = Arc::new(MemorySurfaceFactory::new());
    let (bridge, events) = Bridge::new(
        config(timeout_ms),
        host,
        Arc::clone(&factory) as Arc<dyn SurfaceFactory>,
    )
    .unwrap();
    (bridge, events, factory)
}

async fn pump(bridge: &Bridge, events: &mut SurfaceEvents) {
    while let Ok(event) = events.try_recv() {
        bridge.handle_event(event).await;
    }
}

fn context() -> CompletionContext {
    CompletionContext {
        language: "typescript".into(),
        line: "const total = ".into(),
        file_name: "src/index.ts".into(),
        position: Position {
            line: 10,
            character: 14,
        },
    }
}

fn completion_ids(surface: &MemorySurface) -> Vec<String> {
    surface
        .posted()
        .into_iter()
        .filter(|e| e.command == "inlineCompletion")
        .filter_map(|e| e.request_id)
        .collect()
}

async fn wait_for_completion_requests(surface: &MemorySurface, count: usize) -> Vec<String> {
    for _ in 0..200 {
        let ids = completion_ids(surface);
        if ids.len() >= count {
            return ids;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} inlineCompletion requests");
}

fn file_content_request(name: &str, id: &str) -> serde_json::Value {
    json!({ "command": "getFileContent", "data": { "fileName": name, "requestId": id } })
}

#[tokio::test]
async fn test_each_reply_echoes_its_request_id() {
    let dir = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("f{i}.txt")), format!("file {i}")).unwrap();
    }
    let (bridge, mut events, factory) = bridge(vec![dir.path().to_path_buf()], 100);
    bridge.start().unwrap();
    let surface = factory.last().unwrap();

    for i in 0..5 {
        surface.deliver(APP_ORIGIN, file_content_request(&format!("f{i}.txt"), &format!("id-{i}")));
    }
    pump(&bridge, &mut events).await;

    let posted = surface.posted();
    assert_eq!(posted.len(), 5);
    for (i, reply) in posted.iter().enumerate() {
        assert_eq!(reply.request_id.as_deref(), Some(format!("id-{i}").as_str()));
        let bytes = BASE64.decode(reply.data["content"].as_str().unwrap()).unwrap();
        assert_eq!(bytes, format!("file {i}").into_bytes());
    }
}

#[tokio::test]
async fn test_binary_content_survives_base64() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..=255u8).chain([0xff, 0x00, 0x89, 0x50]).collect();
    fs::create_dir(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets").join("logo.png"), &bytes).unwrap();
    let (bridge, mut events, factory) = bridge(vec![dir.path().to_path_buf()], 100);
    bridge.start().unwrap();
    let surface = factory.last().unwrap();

    surface.deliver(APP_ORIGIN, file_content_request("assets/logo.png", "bin"));
    pump(&bridge, &mut events).await;

    let reply = surface.posted().pop().unwrap();
    assert_eq!(
        BASE64.decode(reply.data["content"].as_str().unwrap()).unwrap(),
        bytes
    );
}

#[tokio::test]
async fn test_repeated_start_reuses_the_panel() {
    let (bridge, _events, factory) = bridge(Vec::new(), 100);
    for _ in 0..3 {
        bridge.start().unwrap();
    }
    assert_eq!(factory.created_count(), 1);
    assert_eq!(factory.last().unwrap().reveals().len(), 2);
    assert_eq!(bridge.panel_count(), 1);
}

#[tokio::test]
async fn test_reads_outside_workspace_answer_with_error() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("ws");
    fs::create_dir(&root).unwrap();
    fs::write(dir.path().join("secret.txt"), "hidden").unwrap();
    let (bridge, mut events, factory) = bridge(vec![root], 100);
    bridge.start().unwrap();
    let surface = factory.last().unwrap();

    surface.deliver(APP_ORIGIN, file_content_request("../secret.txt", "up"));
    surface.deliver(APP_ORIGIN, file_content_request("/etc/hostname", "abs"));
    surface.deliver(APP_ORIGIN, file_content_request("nope.txt", "missing"));
    pump(&bridge, &mut events).await;

    let posted = surface.posted();
    assert_eq!(posted.len(), 3);
    for reply in &posted {
        assert!(reply.data["content"].is_null());
        assert!(reply.data["error"].as_str().unwrap().starts_with("Could not read file"));
    }
}

#[tokio::test]
async fn test_no_workspace_reports_so() {
    let (bridge, mut events, factory) = bridge(Vec::new(), 100);
    bridge.start().unwrap();
    let surface = factory.last().unwrap();

    surface.deliver(APP_ORIGIN, file_content_request("a.txt", "r"));
    surface.deliver(APP_ORIGIN, json!({ "command": "getWorkspaceFiles", "requestId": "w" }));
    pump(&bridge, &mut events).await;

    let posted = surface.posted();
    assert_eq!(posted[0].data["error"], "No workspace is open.");
    assert_eq!(posted[1].command, "workspaceFiles");
    assert_eq!(posted[1].data["files"], json!([]));
}

#[tokio::test]
async fn test_unanswered_completion_times_out_and_late_result_is_ignored() {
    let (bridge, events, factory) = bridge(Vec::new(), 50);
    bridge.start().unwrap();
    tokio::spawn(Arc::clone(&bridge).run_events(events));
    let surface = factory.last().unwrap();

    let started = tokio::time::Instant::now();
    let out = bridge
        .provide_inline_completion(&context(), &CancellationToken::new())
        .await;
    assert!(out.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(bridge.pending_completions(), 0);

    let ids = completion_ids(&surface);
    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids[0], "data": { "suggestion": "late" } }),
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(bridge.pending_completions(), 0);
}

#[tokio::test]
async fn test_stale_result_cannot_settle_a_newer_request() {
    let (bridge, events, factory) = bridge(Vec::new(), 300);
    bridge.start().unwrap();
    tokio::spawn(Arc::clone(&bridge).run_events(events));
    let surface = factory.last().unwrap();

    // First request times out unanswered.
    let first = bridge
        .provide_inline_completion(&context(), &CancellationToken::new())
        .await;
    assert!(first.is_empty());

    let second = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .provide_inline_completion(&context(), &CancellationToken::new())
                .await
        })
    };
    let ids = wait_for_completion_requests(&surface, 2).await;
    assert_ne!(ids[0], ids[1]);

    // The first request's answer arrives late, then the second's.
    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids[0], "data": { "suggestion": "stale" } }),
    );
    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids[1], "data": { "suggestion": "fresh" } }),
    );

    let out = second.await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "fresh");
    assert_eq!(out[0].position, context().position);
}

#[tokio::test]
async fn test_concurrent_completions_settle_independently() {
    let (bridge, events, factory) = bridge(Vec::new(), 1000);
    bridge.start().unwrap();
    tokio::spawn(Arc::clone(&bridge).run_events(events));
    let surface = factory.last().unwrap();

    let spawn = |bridge: Arc<Bridge>| {
        tokio::spawn(async move {
            bridge
                .provide_inline_completion(&context(), &CancellationToken::new())
                .await
        })
    };
    let a = spawn(Arc::clone(&bridge));
    let ids = wait_for_completion_requests(&surface, 1).await;
    let b = spawn(Arc::clone(&bridge));
    let ids_both = wait_for_completion_requests(&surface, 2).await;
    assert_eq!(ids_both[0], ids[0]);

    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids_both[1], "data": { "suggestion": "for b" } }),
    );
    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids_both[0], "data": { "suggestion": "for a" } }),
    );

    assert_eq!(a.await.unwrap()[0].text, "for a");
    assert_eq!(b.await.unwrap()[0].text, "for b");
}

#[tokio::test]
async fn test_closed_panel_is_recreated_on_start() {
    let (bridge, mut events, factory) = bridge(Vec::new(), 100);
    let first = bridge.start().unwrap().surface().id();
    factory.last().unwrap().close();
    pump(&bridge, &mut events).await;
    assert!(bridge.panel().is_none());

    let second = bridge.start().unwrap();
    assert!(second.is_created());
    assert_ne!(second.surface().id(), first);

    assert!(!factory.surfaces()[0].post(&Envelope::new("ping", json!({}))));
}

#[tokio::test]
async fn test_only_the_exact_app_origin_is_trusted() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let (bridge, mut events, factory) = bridge(vec![dir.path().to_path_buf()], 100);
    bridge.start().unwrap();
    let surface = factory.last().unwrap();

    for origin in [
        "https://chat.example.evil",
        "https://evil.chat.example",
        "http://chat.example",
        "https://chat.example:444",
        "https://chat.example/",
        "null",
    ] {
        surface.deliver(origin, file_content_request("a.txt", origin));
    }
    pump(&bridge, &mut events).await;
    assert!(surface.posted().is_empty());

    surface.deliver(APP_ORIGIN, file_content_request("a.txt", "ok"));
    pump(&bridge, &mut events).await;
    assert_eq!(surface.posted().len(), 1);
}

#[tokio::test]
async fn test_shutdown_settles_outstanding_completions() {
    let (bridge, events, factory) = bridge(Vec::new(), 5000);
    bridge.start().unwrap();
    tokio::spawn(Arc::clone(&bridge).run_events(events));
    let surface = factory.last().unwrap();

    let pending = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .provide_inline_completion(&context(), &CancellationToken::new())
                .await
        })
    };
    wait_for_completion_requests(&surface, 1).await;
    bridge.shutdown();

    let out = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(out.is_empty());
    assert!(surface.is_disposed());
}

/// Host whose enumeration takes longer than a completion may wait.
struct SlowHost {
    delay: Duration,
}

#[async_trait::async_trait]
impl EditorHost for SlowHost {
    fn workspace_roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/slow")]
    }

    async fn find_files(&self, _patterns: &FilePatterns) -> anyhow::Result<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec!["a.txt".to_string()])
    }

    async fn read_file(&self, _path: &Path) -> anyhow::Result<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        Ok(b"a".to_vec())
    }

    fn has_focused_editor(&self) -> bool {
        false
    }

    async fn insert_text(&self, _text: &str) -> bool {
        false
    }

    fn active_file(&self) -> Option<PathBuf> {
        None
    }
}

#[tokio::test]
async fn test_slow_host_does_not_hold_up_completion_results() {
    let factory = Arc::new(MemorySurfaceFactory::new());
    let (bridge, events) = Bridge::new(
        config(300),
        Arc::new(SlowHost {
            delay: Duration::from_millis(600),
        }),
        Arc::clone(&factory) as Arc<dyn SurfaceFactory>,
    )
    .unwrap();
    bridge.start().unwrap();
    tokio::spawn(Arc::clone(&bridge).run_events(events));
    let surface = factory.last().unwrap();

    let completion = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .provide_inline_completion(&context(), &CancellationToken::new())
                .await
        })
    };
    let ids = wait_for_completion_requests(&surface, 1).await;

    surface.deliver(APP_ORIGIN, json!({ "command": "getWorkspaceFiles", "requestId": "w1" }));
    surface.deliver(APP_ORIGIN, file_content_request("a.txt", "f1"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    surface.deliver(
        APP_ORIGIN,
        json!({ "command": "inlineCompletionResult", "requestId": ids[0], "data": { "suggestion": "quick" } }),
    );

    let out = completion.await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "quick");

    // The slow replies still arrive, each with its own id.
    for _ in 0..200 {
        if surface.posted().len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut reply_ids: Vec<String> = surface
        .posted()
        .into_iter()
        .filter(|e| e.command != "inlineCompletion")
        .filter_map(|e| e.request_id)
        .collect();
    reply_ids.sort();
    assert_eq!(reply_ids, vec!["f1", "w1"]);
}
