//! Surfaces mirrored onto the output frame stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde_json::Value;
use tokio::sync::mpsc;

use super::framing::OutputFrame;
use crate::envelope::Envelope;
use crate::host::{Placement, Surface, SurfaceEvent, SurfaceFactory, SurfaceId, SurfaceOptions};
use crate::relay::ContentRelay;

/// A panel whose every action becomes an [`OutputFrame`].
#[derive(Debug)]
pub struct StdioSurface {
    id: SurfaceId,
    out: mpsc::UnboundedSender<OutputFrame>,
    relay: ContentRelay,
    events: mpsc::UnboundedSender<SurfaceEvent>,
    disposed: AtomicBool,
}

impl StdioSurface {
    fn emit(&self, frame: OutputFrame) -> bool {
        self.out.send(frame).is_ok()
    }

    /// Whether the surface has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Surface for StdioSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn reveal(&self, placement: Placement) {
        self.emit(OutputFrame::SurfaceRevealed {
            surface: self.id,
            placement,
        });
    }

    fn set_html(&self, html: &str) {
        self.emit(OutputFrame::SurfaceHtml {
            surface: self.id,
            html: html.to_string(),
        });
    }

    fn post(&self, envelope: &Envelope) -> bool {
        if self.is_disposed() {
            return false;
        }
        match self.relay.outbound(envelope) {
            Ok(relayed) => self.emit(OutputFrame::Content {
                surface: self.id,
                target_origin: relayed.target_origin,
                message: relayed.message,
            }),
            Err(e) => {
                log::warn!("Failed to post {} to {}: {e:#}", envelope.command, self.id);
                false
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emit(OutputFrame::SurfaceDisposed { surface: self.id });
        let _ = self.events.send(SurfaceEvent::Disposed(self.id));
    }
}

/// Creates [`StdioSurface`]s and routes inbound content to the newest one.
#[derive(Debug)]
pub struct StdioSurfaceFactory {
    out: mpsc::UnboundedSender<OutputFrame>,
    relay: ContentRelay,
    current: Mutex<Option<Arc<StdioSurface>>>,
}

impl StdioSurfaceFactory {
    /// Factory writing frames to `out` for the app served at `app_url`.
    pub fn new(app_url: &str, out: mpsc::UnboundedSender<OutputFrame>) -> Result<Self> {
        Ok(Self {
            out,
            relay: ContentRelay::new(app_url)?,
            current: Mutex::new(None),
        })
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<StdioSurface>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> Option<Arc<StdioSurface>> {
        self.current()
            .as_ref()
            .filter(|surface| !surface.is_disposed())
            .cloned()
    }

    /// Hand a message from the embedded app to the live surface.
    ///
    /// Returns `false` when no surface is live.
    pub fn deliver(&self, origin: &str, message: Value) -> bool {
        let Some(surface) = self.live() else {
            return false;
        };
        surface
            .events
            .send(SurfaceEvent::Message {
                surface: surface.id,
                origin: origin.to_string(),
                message,
            })
            .is_ok()
    }

    /// Close the live surface as the user would. Returns `false` if none.
    pub fn close_current(&self) -> bool {
        let Some(surface) = self.live() else {
            return false;
        };
        surface.dispose();
        true
    }
}

impl SurfaceFactory for StdioSurfaceFactory {
    fn create(
        &self,
        options: SurfaceOptions,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<Arc<dyn Surface>> {
        let surface = Arc::new(StdioSurface {
            id: SurfaceId::next(),
            out: self.out.clone(),
            relay: self.relay.clone(),
            events,
            disposed: AtomicBool::new(false),
        });
        surface.emit(OutputFrame::SurfaceCreated {
            surface: surface.id,
            view_type: options.view_type,
            title: options.title,
            placement: options.placement,
        });
        *self.current() = Some(Arc::clone(&surface));
        Ok(surface)
    }
}
