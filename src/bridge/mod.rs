//! Bridge coordinator.
//!
//! [`Bridge`] owns all process-scoped bridge state: the panel registry, the
//! pending inline-completion table, and the surface event subscription. It is
//! constructed explicitly and torn down with [`Bridge::shutdown`], so tests
//! can run as many independent bridges as they like.
//!
//! # Event flow
//!
//! ```text
//! Surface ──SurfaceEvent──▶ run_events ──▶ handle_event
//!                                            ├─ Message  ─▶ relay (origin) ─▶ dispatch ─▶ handler ─▶ Surface::post
//!                                            └─ Disposed ─▶ PanelRegistry::handle_disposed
//! ```
//!
//! [`Bridge::run_events`] settles `inlineCompletionResult` messages inline
//! and hands every other accepted envelope to its own task, so a slow file
//! read or enumeration never holds up later messages. Replies to concurrent
//! requests may therefore go out in any order; `requestId` correlates them.
//! Inline completions are awaited by the caller of
//! [`Bridge::provide_inline_completion`], outside the event loop.
//!
//! State is guarded by `std::sync::Mutex` and no guard is held across an
//! `.await`.

mod commands;
mod inline;
mod router;

pub use inline::{CompletionContext, InlineSuggestion, Position};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants::PANEL_VIEW_TYPE;
use crate::envelope::{command, Envelope};
use crate::handlers;
use crate::host::{
    EditorHost, Placement, Surface, SurfaceEvent, SurfaceFactory, SurfaceId, SurfaceOptions,
};
use crate::panel::{PanelLookup, PanelRegistry};
use crate::pending::PendingRequests;
use crate::relay::ContentRelay;
use crate::webview;

/// Receiver half of the surface event subscription.
pub type SurfaceEvents = mpsc::UnboundedReceiver<SurfaceEvent>;

/// Relays messages between the host and the embedded chat app.
pub struct Bridge {
    config: Config,
    host: Arc<dyn EditorHost>,
    surfaces: Arc<dyn SurfaceFactory>,
    relay: ContentRelay,
    panels: Mutex<PanelRegistry>,
    completions: PendingRequests<String>,
    events_tx: mpsc::UnboundedSender<SurfaceEvent>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("session_key", &self.config.session_key)
            .field("panels", &self.panels().len())
            .field("pending_completions", &self.completions.len())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a bridge and the receiver its surfaces report to.
    ///
    /// Feed the receiver to [`run_events`](Self::run_events) (or to
    /// [`handle_event`](Self::handle_event) manually).
    pub fn new(
        config: Config,
        host: Arc<dyn EditorHost>,
        surfaces: Arc<dyn SurfaceFactory>,
    ) -> Result<(Arc<Self>, SurfaceEvents)> {
        let relay = ContentRelay::new(&config.app_url)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(Self {
            completions: PendingRequests::new(config.completion_timeout()),
            config,
            host,
            surfaces,
            relay,
            panels: Mutex::new(PanelRegistry::new()),
            events_tx,
            shutdown: CancellationToken::new(),
        });
        Ok((bridge, events_rx))
    }

    fn panels(&self) -> MutexGuard<'_, PanelRegistry> {
        self.panels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The editor host.
    pub fn host(&self) -> &Arc<dyn EditorHost> {
        &self.host
    }

    /// The content relay (origin filter) in use.
    pub fn relay(&self) -> &ContentRelay {
        &self.relay
    }

    /// Live chat panel, if one is open.
    pub fn panel(&self) -> Option<Arc<dyn Surface>> {
        self.panels().get(&self.config.session_key)
    }

    /// Number of live panels.
    pub fn panel_count(&self) -> usize {
        self.panels().len()
    }

    /// Reveal the chat panel or create it.
    ///
    /// New panels are placed beside the focused editor when there is one.
    pub fn show_panel(&self) -> Result<PanelLookup> {
        if self.shutdown.is_cancelled() {
            anyhow::bail!("Bridge is shut down");
        }
        let placement = Placement::for_host(self.host.as_ref());
        self.panels()
            .show_or_create(&self.config.session_key, placement, || {
                let html = webview::render_html(&self.config.app_url, &self.config.panel_title)?;
                let surface = self.surfaces.create(
                    SurfaceOptions {
                        view_type: PANEL_VIEW_TYPE.to_string(),
                        title: self.config.panel_title.clone(),
                        placement,
                    },
                    self.events_tx.clone(),
                )?;
                surface.set_html(&html);
                Ok(surface)
            })
    }

    fn live_surface(&self, id: SurfaceId) -> Option<Arc<dyn Surface>> {
        let panels = self.panels();
        let key = panels.key_of(id)?;
        panels.get(key)
    }

    /// Apply a disposal, or accept a message for dispatch.
    ///
    /// Returns the envelope and the surface to answer on when a message
    /// passed the origin filter and its surface is still live.
    fn accept(&self, event: SurfaceEvent) -> Option<(Arc<dyn Surface>, Envelope)> {
        match event {
            SurfaceEvent::Message {
                surface,
                origin,
                message,
            } => {
                let Some(out) = self.live_surface(surface) else {
                    log::debug!("Dropping message for closed surface {surface}");
                    return None;
                };
                let envelope = self.relay.inbound(&origin, message)?;
                Some((out, envelope))
            }
            SurfaceEvent::Disposed(id) => {
                self.panels().handle_disposed(id);
                None
            }
        }
    }

    /// Handle one surface event to completion.
    pub async fn handle_event(&self, event: SurfaceEvent) {
        if let Some((out, envelope)) = self.accept(event) {
            self.dispatch(out.as_ref(), envelope).await;
        }
    }

    /// Process surface events until the channel closes or the bridge shuts down.
    pub async fn run_events(self: Arc<Self>, mut events: SurfaceEvents) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.spawn_dispatch(event).await,
                    None => break,
                },
            }
        }
        log::debug!("Bridge event loop stopped");
    }

    async fn spawn_dispatch(self: &Arc<Self>, event: SurfaceEvent) {
        let Some((out, envelope)) = self.accept(event) else {
            return;
        };
        if envelope.command == command::INLINE_COMPLETION_RESULT {
            // Settling never waits on the host.
            self.dispatch(out.as_ref(), envelope).await;
            return;
        }
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            bridge.dispatch(out.as_ref(), envelope).await;
        });
    }

    /// Post the workspace listing to the live panel without a `requestId`.
    pub async fn broadcast_workspace_files(&self) {
        let Some(panel) = self.panel() else {
            return;
        };
        handlers::list_workspace_files(self.host.as_ref(), &self.config, panel.as_ref(), None)
            .await;
    }

    /// Dispose every panel and settle outstanding requests with nothing.
    ///
    /// Idempotent. Afterwards [`show_panel`](Self::show_panel) fails.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        let surfaces = self.panels().drain();
        for surface in surfaces {
            surface.dispose();
        }
        self.completions.clear();
        log::info!("Bridge shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
