//! Origin-filtered relay between the embedded app and the host.
//!
//! The panel embeds the chat app from a remote origin. Messages claiming to
//! come from the app are accepted only when their origin is *exactly* the
//! app's origin; there is no prefix, suffix or substring matching, so
//! `https://app.example.evil` and `https://app.example:8443` are both
//! rejected for an app served from `https://app.example`.
//!
//! Outbound envelopes are addressed to the same origin, so nothing the host
//! posts can be read by a page the frame was navigated away to.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use url::Url;

use crate::envelope::Envelope;

/// Strict origin equality check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginFilter {
    origin: String,
}

impl OriginFilter {
    /// Filter accepting only the origin of `app_url`.
    pub fn for_app_url(app_url: &str) -> Result<Self> {
        let url = Url::parse(app_url).with_context(|| format!("Invalid app URL {app_url:?}"))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            bail!("App URL {app_url:?} has no usable origin");
        }
        Ok(Self {
            origin: origin.ascii_serialization(),
        })
    }

    /// The serialized origin, e.g. `https://app.example`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether `origin` is exactly the app origin.
    pub fn accepts(&self, origin: &str) -> bool {
        origin == self.origin
    }
}

/// A message on its way to the embedded app.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedMessage {
    /// Origin the message may be delivered to.
    pub target_origin: String,
    /// Serialized envelope.
    pub message: Value,
}

/// Both directions of the content-forwarding relay.
#[derive(Debug, Clone)]
pub struct ContentRelay {
    filter: OriginFilter,
}

impl ContentRelay {
    /// Relay for the app served at `app_url`.
    pub fn new(app_url: &str) -> Result<Self> {
        Ok(Self {
            filter: OriginFilter::for_app_url(app_url)?,
        })
    }

    /// The origin filter in use.
    pub fn filter(&self) -> &OriginFilter {
        &self.filter
    }

    /// Accept a message from the embedded content.
    ///
    /// Returns `None` for foreign origins and for anything that is not an
    /// envelope.
    pub fn inbound(&self, origin: &str, message: Value) -> Option<Envelope> {
        if !self.filter.accepts(origin) {
            log::warn!("Dropping message from untrusted origin {origin:?}");
            return None;
        }
        let envelope = Envelope::from_value(message);
        if envelope.is_none() {
            log::debug!("Dropping malformed message from {origin}");
        }
        envelope
    }

    /// Address an envelope to the embedded content.
    pub fn outbound(&self, envelope: &Envelope) -> Result<RelayedMessage> {
        Ok(RelayedMessage {
            target_origin: self.filter.origin().to_string(),
            message: serde_json::to_value(envelope).context("Failed to serialize envelope")?,
        })
    }
}
