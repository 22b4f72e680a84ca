//! Inline completion provider.
//!
//! The editor asks for a suggestion at the cursor; the bridge posts
//! `inlineCompletion` to the panel and waits for the matching
//! `inlineCompletionResult`, giving up after the configured timeout. The
//! request always settles. If the editor cancelled meanwhile (the user kept
//! typing) the settled value is thrown away.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Bridge;
use crate::envelope;

/// Zero-based cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number.
    pub line: u32,
    /// Column, in characters.
    pub character: u32,
}

/// What the editor knows at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    /// Language id of the document.
    pub language: String,
    /// Text of the current line.
    pub line: String,
    /// Document file name.
    pub file_name: String,
    /// Cursor position.
    #[serde(default)]
    pub position: Position,
}

/// Text to insert at a position (an empty range at the cursor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineSuggestion {
    /// Text to insert.
    pub text: String,
    /// Where to insert it.
    pub position: Position,
}

impl Bridge {
    /// Ask the embedded app for a suggestion at the cursor.
    ///
    /// Returns an empty list when no panel is open, the app does not answer
    /// in time, the answer is empty, or `cancel` fired before it settled.
    pub async fn provide_inline_completion(
        &self,
        context: &CompletionContext,
        cancel: &CancellationToken,
    ) -> Vec<InlineSuggestion> {
        let Some(panel) = self.panel() else {
            return Vec::new();
        };

        let request_id = Uuid::new_v4().to_string();
        let pending = self.completions.begin(request_id.clone());
        let request = envelope::inline_completion(
            &context.language,
            &context.line,
            &context.file_name,
            request_id,
        );
        if !panel.post(&request) {
            log::debug!("Panel rejected inlineCompletion request");
            return Vec::new();
        }

        let suggestion = pending.settle().await;
        if cancel.is_cancelled() {
            log::debug!("Inline completion cancelled; discarding result");
            return Vec::new();
        }

        match suggestion {
            Some(text) if !text.is_empty() => vec![InlineSuggestion {
                text,
                position: context.position,
            }],
            _ => Vec::new(),
        }
    }

    /// Settle the completion request a result belongs to.
    ///
    /// Results without a `requestId` only settle a request when exactly one
    /// is outstanding.
    pub(super) fn resolve_completion(&self, request_id: Option<&str>, suggestion: String) {
        let resolved = match request_id {
            Some(id) => self.completions.resolve(id, suggestion),
            None => self.completions.resolve_sole(suggestion),
        };
        if !resolved {
            log::debug!("Ignoring late or unmatched inlineCompletionResult");
        }
    }

    /// Number of inline completions awaiting a result.
    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }
}
