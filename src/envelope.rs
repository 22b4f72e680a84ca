//! Wire format for all bridge traffic.
//!
//! Every message crossing the bridge, in either direction, is an
//! [`Envelope`]:
//!
//! ```text
//! { "command": "getFileContent", "data": { "fileName": "src/a.rs" }, "requestId": "r-1" }
//! ```
//!
//! `requestId` correlates a request with exactly one response. Responses echo
//! it verbatim at the top level. Older builds of the embedded app nest it
//! inside `data`, so inbound lookup checks both places.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire command names.
pub mod command {
    /// Content → host: list workspace files.
    pub const GET_WORKSPACE_FILES: &str = "getWorkspaceFiles";
    /// Content → host: read one file as base64.
    pub const GET_FILE_CONTENT: &str = "getFileContent";
    /// Content → host: insert text at the cursor of the focused editor.
    pub const INSERT_TEXT: &str = "insertText";
    /// Content → host: reply to an `inlineCompletion` request.
    pub const INLINE_COMPLETION_RESULT: &str = "inlineCompletionResult";

    /// Host → content: workspace file listing (reply or broadcast).
    pub const WORKSPACE_FILES: &str = "workspaceFiles";
    /// Host → content: reply to `getFileContent`.
    pub const FILE_CONTENT: &str = "fileContent";
    /// Host → content: open a new chat about a file.
    pub const START_NEW_CHAT: &str = "startNewChat";
    /// Host → content: ask for an inline suggestion.
    pub const INLINE_COMPLETION: &str = "inlineCompletion";
}

/// The structured message unit exchanged across the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Selects the handler on the receiving side.
    pub command: String,
    /// Opaque, command-specific payload.
    #[serde(default)]
    pub data: Value,
    /// Correlation id, present on request/response pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    /// Build an envelope with no correlation id.
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
            request_id: None,
        }
    }

    /// Attach (or clear) the correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Parse an envelope from an arbitrary JSON value.
    ///
    /// Returns `None` for anything that is not an object with a string
    /// `command`.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Correlation id of an inbound message.
    ///
    /// Prefers the top-level `requestId` and falls back to `data.requestId`.
    pub fn correlation_id(&self) -> Option<&str> {
        self.request_id
            .as_deref()
            .or_else(|| self.data.get("requestId").and_then(Value::as_str))
    }

    /// String field of `data`, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Classification of a workspace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Raster or vector image the chat app can preview.
    Image,
    /// Anything else.
    File,
}

impl FileKind {
    /// Classify a path by extension, case-insensitively.
    pub fn classify(path: &str, image_extensions: &[String]) -> Self {
        let is_image = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| image_extensions.iter().any(|img| img.eq_ignore_ascii_case(ext)));
        if is_image {
            Self::Image
        } else {
            Self::File
        }
    }
}

/// A workspace file as seen by the chat app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Workspace-relative path with `/` separators.
    pub name: String,
    /// Image or plain file.
    #[serde(rename = "type")]
    pub kind: FileKind,
}

impl FileDescriptor {
    /// Describe a workspace-relative path.
    pub fn new(name: impl Into<String>, image_extensions: &[String]) -> Self {
        let name = name.into();
        let kind = FileKind::classify(&name, image_extensions);
        Self { name, kind }
    }
}

/// `workspaceFiles` listing. `request_id` is `None` for broadcasts.
pub fn workspace_files(files: &[FileDescriptor], request_id: Option<String>) -> Envelope {
    Envelope::new(command::WORKSPACE_FILES, json!({ "files": files })).with_request_id(request_id)
}

/// `workspaceFiles` reply for a listing that failed.
pub fn workspace_files_error(error: &str, request_id: Option<String>) -> Envelope {
    Envelope::new(
        command::WORKSPACE_FILES,
        json!({ "files": [], "error": error }),
    )
    .with_request_id(request_id)
}

/// Successful `getFileContent` reply carrying base64 content.
pub fn file_content(content: String, request_id: Option<String>) -> Envelope {
    Envelope::new(command::FILE_CONTENT, json!({ "content": content })).with_request_id(request_id)
}

/// Failed `getFileContent` reply.
pub fn file_content_error(error: &str, request_id: Option<String>) -> Envelope {
    Envelope::new(
        command::FILE_CONTENT,
        json!({ "content": Value::Null, "error": error }),
    )
    .with_request_id(request_id)
}

/// `startNewChat` about `file_name`.
pub fn start_new_chat(file_name: &str, prompt: &str) -> Envelope {
    Envelope::new(
        command::START_NEW_CHAT,
        json!({ "fileName": file_name, "prompt": prompt }),
    )
}

/// `inlineCompletion` request for the given editing context.
pub fn inline_completion(language: &str, line: &str, file_name: &str, request_id: String) -> Envelope {
    Envelope::new(
        command::INLINE_COMPLETION,
        json!({ "language": language, "line": line, "fileName": file_name }),
    )
    .with_request_id(Some(request_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> Vec<String> {
        crate::constants::DEFAULT_IMAGE_EXTENSIONS
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_parse_nested_request_id() {
        let env = Envelope::from_value(json!({
            "command": "getWorkspaceFiles",
            "data": { "requestId": "abc" }
        }))
        .unwrap();
        assert_eq!(env.correlation_id(), Some("abc"));
    }

    #[test]
    fn test_top_level_request_id_wins() {
        let env = Envelope::from_value(json!({
            "command": "getFileContent",
            "data": { "requestId": "nested", "fileName": "a.txt" },
            "requestId": "top"
        }))
        .unwrap();
        assert_eq!(env.correlation_id(), Some("top"));
        assert_eq!(env.data_str("fileName"), Some("a.txt"));
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let env = Envelope::from_value(json!({ "command": "insertText" })).unwrap();
        assert!(env.data.is_null());
        assert_eq!(env.correlation_id(), None);
    }

    #[test]
    fn test_non_envelope_rejected() {
        assert!(Envelope::from_value(json!("hello")).is_none());
        assert!(Envelope::from_value(json!({ "data": {} })).is_none());
        assert!(Envelope::from_value(json!({ "command": 7 })).is_none());
    }

    #[test]
    fn test_request_id_serialized_camel_case_and_omitted_when_absent() {
        let with = file_content("aGk=".into(), Some("r1".into()));
        let value = serde_json::to_value(&with).unwrap();
        assert_eq!(value["requestId"], "r1");
        assert_eq!(value["data"]["content"], "aGk=");

        let without = workspace_files(&[], None);
        let value = serde_json::to_value(&without).unwrap();
        assert!(value.get("requestId").is_none());
    }

    #[test]
    fn test_classify_images_case_insensitive() {
        let images = images();
        assert_eq!(FileKind::classify("assets/logo.PNG", &images), FileKind::Image);
        assert_eq!(FileKind::classify("a/b.svg", &images), FileKind::Image);
        assert_eq!(FileKind::classify("src/main.rs", &images), FileKind::File);
        assert_eq!(FileKind::classify("Makefile", &images), FileKind::File);
        assert_eq!(FileKind::classify("photo.jpeg.bak", &images), FileKind::File);
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let desc = FileDescriptor::new("img/cat.gif", &images());
        assert_eq!(
            serde_json::to_value(&desc).unwrap(),
            json!({ "name": "img/cat.gif", "type": "image" })
        );
    }

    #[test]
    fn test_file_content_error_shape() {
        let env = file_content_error("No workspace is open.", Some("r9".into()));
        assert_eq!(env.command, command::FILE_CONTENT);
        assert!(env.data["content"].is_null());
        assert_eq!(env.data["error"], "No workspace is open.");
    }
}
