//! Workspace file system monitoring.
//!
//! [`FileWatcher`] wraps OS-native watching (inotify on Linux, kqueue/FSEvents
//! on macOS) via the `notify` crate behind a channel-based interface.
//! [`WorkspaceBroadcaster`] builds on it: files appearing in or disappearing
//! from the workspace trigger a `workspaceFiles` broadcast to the live panel.
//!
//! Bursts (a `git checkout`, an `npm install` outside the excluded folders)
//! are coalesced: after the first relevant event the broadcaster waits for
//! [`WATCHER_COALESCE_WINDOW`] and sends one listing for everything that
//! arrived meanwhile.

use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::Bridge;
use crate::constants::WATCHER_COALESCE_WINDOW;
use crate::host::local::{relative_slash_path, PathFilter};
use crate::host::FilePatterns;

/// Classification of a file system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// A new file or directory was created.
    Create,
    /// File content or metadata was modified (not a rename).
    Modify,
    /// A file or directory was renamed or moved.
    Rename,
    /// A file or directory was deleted.
    Delete,
    /// Access events, watcher-internal events, etc.
    Other,
}

impl FileEventKind {
    /// Whether the event can change the set of workspace files.
    pub fn changes_listing(self) -> bool {
        matches!(self, Self::Create | Self::Rename | Self::Delete)
    }
}

/// A single file system event with path and classification.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// Absolute path of the affected file or directory.
    pub path: PathBuf,
    /// What happened to the file.
    pub kind: FileEventKind,
}

/// Raw events as delivered by `notify`, ending when the watcher drops.
pub type RawEvents = std_mpsc::Receiver<Result<Event, notify::Error>>;

/// File system watcher. Events arrive on the receiver returned by
/// [`FileWatcher::new`].
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Create a watcher with no active watches, and the receiver its
    /// events are delivered to.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS file watcher cannot be initialized
    /// (e.g., system resource limits).
    pub fn new() -> Result<(Self, RawEvents)> {
        let (tx, rx) = std_mpsc::channel();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, rx))
    }

    /// Start watching `path` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or watch
    /// registration fails (e.g., too many watches on Linux).
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch: {}", path.display()))?;

        log::info!("Watching for file changes: {:?}", path);
        Ok(())
    }

    /// Split a raw `notify::Event` into one [`FileEvent`] per path.
    pub fn classify_event(event: &Event) -> Vec<FileEvent> {
        let kind = Self::classify(&event.kind);
        event
            .paths
            .iter()
            .map(|p| FileEvent {
                path: p.clone(),
                kind,
            })
            .collect()
    }

    fn classify(kind: &notify::EventKind) -> FileEventKind {
        match kind {
            notify::EventKind::Create(_) => FileEventKind::Create,
            notify::EventKind::Modify(notify::event::ModifyKind::Name(_)) => FileEventKind::Rename,
            notify::EventKind::Modify(_) => FileEventKind::Modify,
            notify::EventKind::Remove(_) => FileEventKind::Delete,
            _ => FileEventKind::Other,
        }
    }
}

/// Whether `event` should trigger a listing broadcast.
fn is_relevant(event: &FileEvent, root: &Path, filter: &PathFilter) -> bool {
    if !event.kind.changes_listing() {
        return false;
    }
    match relative_slash_path(root, &event.path) {
        Some(rel) if !rel.is_empty() => !filter.excludes(&rel),
        _ => false,
    }
}

/// Broadcasts `workspaceFiles` to the live panel when files come and go.
///
/// Dropping it stops watching.
pub struct WorkspaceBroadcaster {
    _watcher: FileWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WorkspaceBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceBroadcaster")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl WorkspaceBroadcaster {
    /// Watch `root` and broadcast through `bridge`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(bridge: Arc<Bridge>, root: &Path) -> Result<Self> {
        let config = bridge.config();
        let filter = PathFilter::new(&FilePatterns {
            include: config.include_glob.clone(),
            exclude: config.exclude_globs.clone(),
        })?;

        let (mut watcher, raw) = FileWatcher::new()?;
        watcher.watch(root)?;

        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<()>();
        let root = root.to_path_buf();
        // Blocking forwarder: ends when the watcher (and its sender) drops.
        tokio::task::spawn_blocking(move || {
            while let Ok(result) = raw.recv() {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("File watcher error: {e}");
                        continue;
                    }
                };
                let relevant = FileWatcher::classify_event(&event)
                    .iter()
                    .any(|e| is_relevant(e, &root, &filter));
                if relevant && tick_tx.send(()).is_err() {
                    break;
                }
            }
        });

        let task = tokio::spawn(async move {
            while tick_rx.recv().await.is_some() {
                tokio::time::sleep(WATCHER_COALESCE_WINDOW).await;
                while tick_rx.try_recv().is_ok() {}
                if bridge.is_shut_down() {
                    break;
                }
                bridge.broadcast_workspace_files().await;
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for WorkspaceBroadcaster {
    fn drop(&mut self) {
        self.task.abort();
    }
}
