//! Panel registry: at most one live surface per session key.
//!
//! [`PanelRegistry::show_or_create`] reveals the existing surface for a key or
//! creates one. Entries leave the registry only through
//! [`PanelRegistry::handle_disposed`] (the user closed the surface) or
//! [`PanelRegistry::drain`] (bridge shutdown); there is no eviction.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::host::{Placement, Surface, SurfaceId};

/// Result of [`PanelRegistry::show_or_create`].
#[derive(Debug, Clone)]
pub enum PanelLookup {
    /// A live surface already existed and was brought forward.
    Revealed(Arc<dyn Surface>),
    /// A new surface was created and registered.
    Created(Arc<dyn Surface>),
}

impl PanelLookup {
    /// The surface, however it was obtained.
    pub fn surface(&self) -> &Arc<dyn Surface> {
        match self {
            Self::Revealed(surface) | Self::Created(surface) => surface,
        }
    }

    /// Whether this lookup created the surface.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Live surfaces keyed by session key.
#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: HashMap<String, Arc<dyn Surface>>,
}

impl PanelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reveal the surface for `key`, or create and register one.
    ///
    /// `create` runs only when no surface is registered for `key`; it is
    /// responsible for wiring the surface's content and disposal
    /// subscription before returning.
    pub fn show_or_create<F>(&mut self, key: &str, placement: Placement, create: F) -> Result<PanelLookup>
    where
        F: FnOnce() -> Result<Arc<dyn Surface>>,
    {
        if let Some(surface) = self.panels.get(key) {
            surface.reveal(placement);
            log::debug!("Revealed existing panel {} for {key}", surface.id());
            return Ok(PanelLookup::Revealed(Arc::clone(surface)));
        }

        let surface = create()?;
        log::info!("Created panel {} for {key}", surface.id());
        self.panels.insert(key.to_string(), Arc::clone(&surface));
        Ok(PanelLookup::Created(surface))
    }

    /// Live surface for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Surface>> {
        self.panels.get(key).cloned()
    }

    /// Session key whose live surface has id `id`.
    pub fn key_of(&self, id: SurfaceId) -> Option<&str> {
        self.panels
            .iter()
            .find(|(_, surface)| surface.id() == id)
            .map(|(key, _)| key.as_str())
    }

    /// Forget the surface with id `id` after it was closed.
    ///
    /// Only the entry holding that exact surface is removed, so a late
    /// disposal of an old surface never drops its replacement. Returns the
    /// freed session key.
    pub fn handle_disposed(&mut self, id: SurfaceId) -> Option<String> {
        let key = self.key_of(id)?.to_string();
        self.panels.remove(&key);
        log::info!("Panel {id} for {key} disposed");
        Some(key)
    }

    /// Remove and return every live surface.
    pub fn drain(&mut self) -> Vec<Arc<dyn Surface>> {
        self.panels.drain().map(|(_, surface)| surface).collect()
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Whether no surface is live.
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}
