//! Inbound command dispatch.

use serde_json::Value;

use super::Bridge;
use crate::envelope::{command, Envelope};
use crate::handlers;
use crate::host::Surface;

impl Bridge {
    /// Route one envelope from the embedded content to its handler.
    ///
    /// Replies go out on `out`, the surface the envelope arrived on. Unknown
    /// commands and envelopes missing required fields are ignored.
    pub async fn dispatch(&self, out: &dyn Surface, envelope: Envelope) {
        let request_id = envelope.correlation_id().map(ToString::to_string);

        match envelope.command.as_str() {
            command::GET_WORKSPACE_FILES => {
                handlers::list_workspace_files(self.host.as_ref(), &self.config, out, request_id)
                    .await;
            }
            command::GET_FILE_CONTENT => {
                let Some(file_name) = envelope.data_str("fileName") else {
                    log::debug!("Ignoring getFileContent without fileName");
                    return;
                };
                handlers::read_file_content(self.host.as_ref(), out, file_name, request_id).await;
            }
            command::INSERT_TEXT => {
                let Some(text) = envelope.data_str("text") else {
                    log::debug!("Ignoring insertText without text");
                    return;
                };
                handlers::insert_text(self.host.as_ref(), text).await;
            }
            command::INLINE_COMPLETION_RESULT => {
                // A missing or null suggestion means "nothing to offer".
                let suggestion = match envelope.data.get("suggestion") {
                    Some(Value::String(text)) => text.clone(),
                    _ => String::new(),
                };
                self.resolve_completion(request_id.as_deref(), suggestion);
            }
            other => log::debug!("Ignoring unknown command {other:?}"),
        }
    }
}
