//! Headless host over newline-delimited JSON.
//!
//! `codeassist-bridge serve` runs the bridge against the local file system
//! and speaks the [`framing`] protocol on stdin/stdout. Whatever drives the
//! process plays both the editor (host command frames) and the embedded app
//! (`content` frames).
//!
//! Stdout carries only frames; logs go to the log file.

pub mod framing;
pub mod surface;

pub use framing::{InputFrame, OutputFrame};
pub use surface::{StdioSurface, StdioSurfaceFactory};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, CompletionContext};
use crate::config::Config;
use crate::file_watcher::WorkspaceBroadcaster;
use crate::host::local::LocalHost;
use crate::host::{EditorHost, SurfaceFactory};

/// How long to wait for queued frames to reach the output after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Serve on stdin/stdout until EOF or Ctrl-C.
pub async fn serve(config: Config, workspace: Option<PathBuf>) -> Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
        });
    }

    run(
        config,
        workspace,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    )
    .await
}

/// Serve on arbitrary streams until `input` ends or `shutdown` fires.
pub async fn run<R, W>(
    config: Config,
    workspace: Option<PathBuf>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(output, out_rx));

    let roots: Vec<PathBuf> = workspace.into_iter().collect();
    let host = Arc::new(LocalHost::new(roots.clone()));
    let factory = Arc::new(StdioSurfaceFactory::new(&config.app_url, out_tx.clone())?);
    let (bridge, events) = Bridge::new(
        config,
        Arc::clone(&host) as Arc<dyn EditorHost>,
        Arc::clone(&factory) as Arc<dyn SurfaceFactory>,
    )?;
    let events_task = tokio::spawn(Arc::clone(&bridge).run_events(events));

    let watch = match roots.first() {
        Some(root) => match WorkspaceBroadcaster::spawn(Arc::clone(&bridge), root) {
            Ok(watch) => Some(watch),
            Err(e) => {
                log::warn!("Workspace changes will not be broadcast: {e:#}");
                None
            }
        },
        None => None,
    };

    log::info!("Serving bridge for {}", bridge.config().app_url);
    let session = Session::new(Arc::clone(&bridge), host, factory, out_tx);
    let mut lines = input.lines();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => session.handle_line(&line),
                Ok(None) => {
                    log::info!("Input closed");
                    break;
                }
                Err(e) => {
                    log::warn!("Failed to read input: {e}");
                    break;
                }
            },
        }
    }

    bridge.shutdown();
    session.cancel_completions();
    let _ = events_task.await;
    drop(session);
    drop(watch);
    drop(bridge);

    match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            log::debug!("Output still open after shutdown");
            Ok(())
        }
    }
}

async fn write_frames<W>(mut output: W, mut frames: mpsc::UnboundedReceiver<OutputFrame>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let line = framing::encode(&frame)?;
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

/// Applies input frames to a bridge.
struct Session {
    bridge: Arc<Bridge>,
    host: Arc<LocalHost>,
    factory: Arc<StdioSurfaceFactory>,
    out: mpsc::UnboundedSender<OutputFrame>,
    completions: Arc<Mutex<Completions>>,
}

/// Cancellation handles of running completions, keyed by caller id.
#[derive(Default)]
struct Completions {
    next_ticket: u64,
    running: HashMap<String, (u64, CancellationToken)>,
}

fn lock(completions: &Mutex<Completions>) -> MutexGuard<'_, Completions> {
    completions.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    fn new(
        bridge: Arc<Bridge>,
        host: Arc<LocalHost>,
        factory: Arc<StdioSurfaceFactory>,
        out: mpsc::UnboundedSender<OutputFrame>,
    ) -> Self {
        Self {
            bridge,
            host,
            factory,
            out,
            completions: Arc::new(Mutex::new(Completions::default())),
        }
    }

    fn handle_line(&self, line: &str) {
        match framing::decode_line(line) {
            Ok(Some(frame)) => self.handle_frame(frame),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping input line: {e:#}"),
        }
    }

    fn handle_frame(&self, frame: InputFrame) {
        let result = match frame {
            InputFrame::Start => self.bridge.start().map(drop),
            InputFrame::SummarizeFile { uri } => self
                .bridge
                .summarize_file(uri.map(|p| self.resolve(&p)).as_deref())
                .map(drop),
            InputFrame::RefactorFile { uri } => self
                .bridge
                .refactor_file(uri.map(|p| self.resolve(&p)).as_deref())
                .map(drop),
            InputFrame::InlineCompletion { id, context } => {
                self.spawn_completion(id, context);
                Ok(())
            }
            InputFrame::CancelInlineCompletion { id } => {
                if let Some((_, token)) = lock(&self.completions).running.remove(&id) {
                    token.cancel();
                }
                Ok(())
            }
            InputFrame::OpenEditor { path, cursor } => self.host.open_editor(&self.resolve(&path), cursor),
            InputFrame::CloseEditor => {
                self.host.close_editor();
                Ok(())
            }
            InputFrame::ClosePanel => {
                if !self.factory.close_current() {
                    log::debug!("closePanel with no panel open");
                }
                Ok(())
            }
            InputFrame::Content { origin, message } => {
                if !self.factory.deliver(&origin, message) {
                    log::debug!("Dropping content: no panel open");
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            log::warn!("Host command failed: {e:#}");
            let _ = self.out.send(OutputFrame::Error {
                message: format!("{e:#}"),
            });
        }
    }

    /// Relative paths are taken against the first workspace root.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.host.workspace_roots().first() {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }

    fn spawn_completion(&self, id: String, context: CompletionContext) {
        let token = CancellationToken::new();
        let ticket = {
            let mut completions = lock(&self.completions);
            completions.next_ticket += 1;
            let ticket = completions.next_ticket;
            if let Some((_, previous)) = completions
                .running
                .insert(id.clone(), (ticket, token.clone()))
            {
                previous.cancel();
            }
            ticket
        };

        let bridge = Arc::clone(&self.bridge);
        let completions = Arc::clone(&self.completions);
        let out = self.out.clone();
        tokio::spawn(async move {
            let items = bridge.provide_inline_completion(&context, &token).await;
            {
                let mut completions = lock(&completions);
                // A newer request may have reused the id.
                if completions.running.get(&id).is_some_and(|(t, _)| *t == ticket) {
                    completions.running.remove(&id);
                }
            }
            let _ = out.send(OutputFrame::Suggestions { id, items });
        });
    }

    fn cancel_completions(&self) {
        for (_, (_, token)) in lock(&self.completions).running.drain() {
            token.cancel();
        }
    }
}
