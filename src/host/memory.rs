//! In-process surfaces.
//!
//! [`MemorySurface`] keeps everything posted to it so callers can inspect
//! the bridge's output, and lets callers play the embedded content's part
//! via [`MemorySurface::deliver`] and the user's part via
//! [`MemorySurface::close`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::mpsc;

use super::{Placement, Surface, SurfaceEvent, SurfaceFactory, SurfaceId, SurfaceOptions};
use crate::envelope::Envelope;

#[derive(Debug, Default)]
struct Recorded {
    posted: Vec<Envelope>,
    reveals: Vec<Placement>,
    html: Option<String>,
}

/// A surface that records instead of rendering.
#[derive(Debug)]
pub struct MemorySurface {
    id: SurfaceId,
    options: SurfaceOptions,
    events: mpsc::UnboundedSender<SurfaceEvent>,
    disposed: AtomicBool,
    recorded: Mutex<Recorded>,
}

impl MemorySurface {
    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Options the surface was created with.
    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Every envelope posted so far, in order.
    pub fn posted(&self) -> Vec<Envelope> {
        self.recorded().posted.clone()
    }

    /// Placements passed to [`Surface::reveal`], in order.
    pub fn reveals(&self) -> Vec<Placement> {
        self.recorded().reveals.clone()
    }

    /// Current document, if one was set.
    pub fn html(&self) -> Option<String> {
        self.recorded().html.clone()
    }

    /// Whether the surface has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Deliver a message as if the embedded content posted it.
    pub fn deliver(&self, origin: &str, message: serde_json::Value) {
        let _ = self.events.send(SurfaceEvent::Message {
            surface: self.id,
            origin: origin.to_string(),
            message,
        });
    }

    /// Close the surface as the user would.
    pub fn close(&self) {
        self.dispose();
    }
}

impl Surface for MemorySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn reveal(&self, placement: Placement) {
        self.recorded().reveals.push(placement);
    }

    fn set_html(&self, html: &str) {
        self.recorded().html = Some(html.to_string());
    }

    fn post(&self, envelope: &Envelope) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.recorded().posted.push(envelope.clone());
        true
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(SurfaceEvent::Disposed(self.id));
        }
    }
}

/// Factory producing [`MemorySurface`]s and remembering each one.
#[derive(Debug, Default)]
pub struct MemorySurfaceFactory {
    created: Mutex<Vec<Arc<MemorySurface>>>,
}

impl MemorySurfaceFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    fn created(&self) -> MutexGuard<'_, Vec<Arc<MemorySurface>>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All surfaces created so far, oldest first.
    pub fn surfaces(&self) -> Vec<Arc<MemorySurface>> {
        self.created().clone()
    }

    /// The most recently created surface.
    pub fn last(&self) -> Option<Arc<MemorySurface>> {
        self.created().last().cloned()
    }

    /// Number of surfaces created so far.
    pub fn created_count(&self) -> usize {
        self.created().len()
    }
}

impl SurfaceFactory for MemorySurfaceFactory {
    fn create(
        &self,
        options: SurfaceOptions,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<Arc<dyn Surface>> {
        let surface = Arc::new(MemorySurface {
            id: SurfaceId::next(),
            options,
            events,
            disposed: AtomicBool::new(false),
            recorded: Mutex::new(Recorded::default()),
        });
        self.created().push(Arc::clone(&surface));
        Ok(surface)
    }
}
