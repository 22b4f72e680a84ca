//! Line protocol for the headless host.
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```text
//! stdin   {"type":"start"}
//!         {"type":"summarizeFile","uri":"src/lib.rs"}
//!         {"type":"refactorFile"}
//!         {"type":"inlineCompletion","id":"c1","context":{"language":"rust","line":"let x","fileName":"main.rs"}}
//!         {"type":"cancelInlineCompletion","id":"c1"}
//!         {"type":"openEditor","path":"src/main.rs","cursor":0}
//!         {"type":"closeEditor"}
//!         {"type":"closePanel"}
//!         {"type":"content","origin":"https://app.example","message":{...}}
//!
//! stdout  {"type":"surfaceCreated","surface":1,"viewType":"codeassistChat","title":"CodeAssist Chat","placement":"active"}
//!         {"type":"surfaceRevealed","surface":1,"placement":"beside"}
//!         {"type":"surfaceHtml","surface":1,"html":"<!DOCTYPE html>..."}
//!         {"type":"surfaceDisposed","surface":1}
//!         {"type":"content","surface":1,"targetOrigin":"https://app.example","message":{...}}
//!         {"type":"suggestions","id":"c1","items":[{"text":"42;","position":{"line":3,"character":8}}]}
//!         {"type":"error","message":"..."}
//! ```
//!
//! `content` frames carry what the embedded app posts (stdin) and what the
//! bridge posts to it (stdout).

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::{CompletionContext, InlineSuggestion};
use crate::host::{Placement, SurfaceId};

/// A frame read from stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputFrame {
    /// Open or focus the chat panel.
    Start,
    /// Start a chat summarizing a file (default: the active file).
    SummarizeFile {
        /// File to summarize.
        #[serde(default)]
        uri: Option<PathBuf>,
    },
    /// Start a chat refactoring a file (default: the active file).
    RefactorFile {
        /// File to refactor.
        #[serde(default)]
        uri: Option<PathBuf>,
    },
    /// Request an inline completion; answered by a `suggestions` frame.
    InlineCompletion {
        /// Caller-chosen id echoed in the answer.
        id: String,
        /// Cursor context.
        context: CompletionContext,
    },
    /// Cancel an outstanding inline completion.
    CancelInlineCompletion {
        /// Id given to `inlineCompletion`.
        id: String,
    },
    /// Focus an editor on a file.
    OpenEditor {
        /// File path, relative paths resolve against the workspace.
        path: PathBuf,
        /// Cursor byte offset (default end of file).
        #[serde(default)]
        cursor: Option<usize>,
    },
    /// Drop editor focus.
    CloseEditor,
    /// Close the chat panel as the user would.
    ClosePanel,
    /// A message posted by the embedded app.
    Content {
        /// Origin the message came from.
        origin: String,
        /// Raw message.
        message: Value,
    },
}

/// A frame written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutputFrame {
    /// A panel was created.
    #[serde(rename_all = "camelCase")]
    SurfaceCreated {
        /// New surface.
        surface: SurfaceId,
        /// Internal view type.
        view_type: String,
        /// Panel title.
        title: String,
        /// Initial placement.
        placement: Placement,
    },
    /// An existing panel was brought forward.
    SurfaceRevealed {
        /// Revealed surface.
        surface: SurfaceId,
        /// Where it is shown.
        placement: Placement,
    },
    /// The panel document was replaced.
    SurfaceHtml {
        /// Target surface.
        surface: SurfaceId,
        /// Full document.
        html: String,
    },
    /// A panel was closed.
    SurfaceDisposed {
        /// Closed surface.
        surface: SurfaceId,
    },
    /// A message for the embedded app.
    #[serde(rename_all = "camelCase")]
    Content {
        /// Surface the message is posted to.
        surface: SurfaceId,
        /// Only this origin may receive it.
        target_origin: String,
        /// Serialized envelope.
        message: Value,
    },
    /// Answer to an `inlineCompletion` frame.
    Suggestions {
        /// Id from the request.
        id: String,
        /// Zero or one suggestion.
        items: Vec<InlineSuggestion>,
    },
    /// A host command failed.
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Decode one stdin line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<InputFrame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .with_context(|| format!("Malformed input frame: {line}"))
}

/// Encode a frame as one newline-terminated line.
pub fn encode(frame: &OutputFrame) -> Result<String> {
    let mut line = serde_json::to_string(frame).context("Failed to encode output frame")?;
    line.push('\n');
    Ok(line)
}
