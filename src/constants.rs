//! Application-wide constants for the CodeAssist bridge.
//!
//! Centralizes wire-level names, defaults, and timeouts so the bridge,
//! the config layer, and the host adapters agree on them.
//!
//! # Categories
//!
//! - **Timeouts**: Inline completion round-trip and watcher coalescing
//! - **Panel**: Session key and surface identity
//! - **Workspace**: Default enumeration patterns and image classification

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// How long an inline completion request waits for `inlineCompletionResult`.
///
/// After this elapses the request settles with no suggestion. The editor
/// keeps typing latency low, so anything slower than this is useless anyway.
pub const INLINE_COMPLETION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Quiet period used to coalesce bursts of file system events into a
/// single `workspaceFiles` broadcast.
pub const WATCHER_COALESCE_WINDOW: Duration = Duration::from_millis(150);

// ============================================================================
// Panel
// ============================================================================

/// Session key of the chat panel. One live panel per key.
pub const DEFAULT_SESSION_KEY: &str = "codeassist-chat";

/// Internal view type of the chat surface.
pub const PANEL_VIEW_TYPE: &str = "codeassistChat";

/// Title shown on the chat surface.
pub const DEFAULT_PANEL_TITLE: &str = "CodeAssist Chat";

/// Deployed location of the embedded chat application.
pub const DEFAULT_APP_URL: &str = "https://codeassist-chat-app.vercel.app";

// ============================================================================
// Workspace
// ============================================================================

/// Files offered to the chat app: anything with an extension.
pub const DEFAULT_INCLUDE_GLOB: &str = "**/*.*";

/// Dependency and VCS directories never offered to the chat app.
pub const DEFAULT_EXCLUDE_GLOBS: [&str; 2] = ["**/node_modules/**", "**/.git/**"];

/// Extensions (lowercase, no dot) classified as `image`.
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "svg"];

// ============================================================================
// Prompts
// ============================================================================

/// Prompt posted with `startNewChat` by the summarize command.
pub const SUMMARIZE_PROMPT: &str = "Summarize this file.";

/// Prompt posted with `startNewChat` by the refactor command.
pub const REFACTOR_PROMPT: &str = "Refactor this file to improve readability and maintainability.";
