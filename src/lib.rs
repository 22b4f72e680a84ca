//! CodeAssist Bridge - relays messages between an editor host and an
//! embedded chat app.
//!
//! The chat app runs from a remote origin inside a panel. It asks the host
//! for workspace files and file contents, inserts text into the focused
//! editor, and answers inline completion requests. The bridge keeps these
//! exchanges correlated and confined to the app's origin.
//!
//! # Architecture
//!
//! - **Bridge** - Coordinator, owns panel registry and pending requests
//! - **Host** - Editor seams (`EditorHost`, `SurfaceFactory`) and adapters
//! - **Relay** - Strict origin filter between the app and the host
//! - **Stdio** - Headless host speaking newline-delimited JSON
//!
//! # Modules
//!
//! - [`bridge`] - Coordinator, router, host commands, inline completions
//! - [`envelope`] - Message envelope and reply constructors
//! - [`pending`] - Correlated request table with timeouts
//! - [`config`] - Configuration loading/saving

pub mod bridge;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod file_watcher;
pub mod handlers;
pub mod host;
pub mod panel;
pub mod pending;
pub mod relay;
pub mod stdio;
pub mod webview;

// Re-export commonly used types
pub use bridge::Bridge;
pub use config::Config;
pub use envelope::Envelope;
