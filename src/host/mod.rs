//! Editor host abstraction.
//!
//! The bridge never talks to an editor directly. Everything it needs from
//! the host is expressed by two seams:
//!
//! - [`EditorHost`] - workspace file system and the focused editor
//! - [`SurfaceFactory`] / [`Surface`] - the panel that embeds the chat app
//!
//! Surfaces report back through a [`SurfaceEvent`] channel handed to the
//! factory at creation time: inbound messages from the embedded content and
//! the disposal notification when the user closes the panel.
//!
//! # Implementations
//!
//! - [`local::LocalHost`] - file-system backed host used by the binary
//! - [`memory::MemorySurfaceFactory`] - in-process surfaces for tests and embedders
//! - [`crate::stdio::StdioSurfaceFactory`] - surfaces mirrored onto stdout

pub mod local;
pub mod memory;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::envelope::Envelope;

/// Patterns controlling workspace enumeration.
#[derive(Debug, Clone)]
pub struct FilePatterns {
    /// Glob a file must match to be listed.
    pub include: String,
    /// Globs that remove a file (or whole directory) from the listing.
    pub exclude: Vec<String>,
}

/// Capabilities the bridge needs from the editor.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Workspace roots in priority order. Empty when no workspace is open.
    fn workspace_roots(&self) -> Vec<PathBuf>;

    /// Enumerate workspace files as `/`-separated paths relative to their root.
    async fn find_files(&self, patterns: &FilePatterns) -> Result<Vec<String>>;

    /// Read raw bytes of an absolute path.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Whether an editing context currently has focus.
    fn has_focused_editor(&self) -> bool;

    /// Insert `text` at the cursor of the focused editor.
    ///
    /// Returns `false` (and does nothing) when no editor has focus.
    async fn insert_text(&self, text: &str) -> bool;

    /// File shown in the focused editor, if any.
    fn active_file(&self) -> Option<PathBuf>;
}

/// Identity of a surface, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SurfaceId(pub u64);

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

impl SurfaceId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        Self(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Where a surface is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    /// Next to the focused editor.
    Beside,
    /// In the primary editor position.
    Active,
}

impl Placement {
    /// Beside the focused editor when there is one, primary otherwise.
    pub fn for_host(host: &dyn EditorHost) -> Self {
        if host.has_focused_editor() {
            Self::Beside
        } else {
            Self::Active
        }
    }
}

/// Parameters for creating a surface.
#[derive(Debug, Clone)]
pub struct SurfaceOptions {
    /// Internal view type.
    pub view_type: String,
    /// Title shown to the user.
    pub title: String,
    /// Initial placement.
    pub placement: Placement,
}

/// Notifications from a surface back to the bridge.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// The embedded content posted a message.
    Message {
        /// Surface the message arrived on.
        surface: SurfaceId,
        /// Origin reported for the sender.
        origin: String,
        /// Raw message payload.
        message: serde_json::Value,
    },
    /// The surface was closed and must not be used again.
    Disposed(SurfaceId),
}

/// A live panel embedding the chat app.
pub trait Surface: Send + Sync {
    /// Stable identity of this surface.
    fn id(&self) -> SurfaceId;

    /// Bring the surface to the foreground.
    fn reveal(&self, placement: Placement);

    /// Replace the surface document.
    fn set_html(&self, html: &str);

    /// Deliver an envelope to the embedded content.
    ///
    /// Returns `false` if the surface can no longer receive messages.
    fn post(&self, envelope: &Envelope) -> bool;

    /// Close the surface. Implementations emit [`SurfaceEvent::Disposed`].
    fn dispose(&self);
}

impl std::fmt::Debug for dyn Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("id", &self.id()).finish()
    }
}

/// Creates surfaces on demand.
pub trait SurfaceFactory: Send + Sync {
    /// Create and show a new surface.
    ///
    /// `events` is the surface's subscription: inbound messages and the
    /// disposal notification are sent there.
    fn create(
        &self,
        options: SurfaceOptions,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<Arc<dyn Surface>>;
}
