//! Host command surface: `start`, `summarizeFile`, `refactorFile`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::Bridge;
use crate::constants::{REFACTOR_PROMPT, SUMMARIZE_PROMPT};
use crate::envelope;
use crate::panel::PanelLookup;

impl Bridge {
    /// Open or focus the chat panel.
    pub fn start(&self) -> Result<PanelLookup> {
        self.show_panel()
    }

    /// Open the panel and start a chat summarizing `uri` (or the active file).
    pub fn summarize_file(&self, uri: Option<&Path>) -> Result<PanelLookup> {
        self.start_chat_about(uri, SUMMARIZE_PROMPT)
    }

    /// Open the panel and start a chat refactoring `uri` (or the active file).
    pub fn refactor_file(&self, uri: Option<&Path>) -> Result<PanelLookup> {
        self.start_chat_about(uri, REFACTOR_PROMPT)
    }

    fn start_chat_about(&self, uri: Option<&Path>, prompt: &str) -> Result<PanelLookup> {
        let lookup = self.show_panel()?;
        let target = uri.map(Path::to_path_buf).or_else(|| self.host.active_file());
        let Some(target) = target else {
            log::warn!("No file to start a chat about; panel shown without a new chat");
            return Ok(lookup);
        };

        let file_name = self.display_name(&target);
        log::info!("Starting new chat about {file_name}");
        lookup
            .surface()
            .post(&envelope::start_new_chat(&file_name, prompt));
        Ok(lookup)
    }

    /// Workspace-relative `/` path when `path` lies in the first root.
    fn display_name(&self, path: &Path) -> String {
        let relative: Option<PathBuf> = if path.is_relative() {
            Some(path.to_path_buf())
        } else {
            self.host
                .workspace_roots()
                .first()
                .and_then(|root| path.strip_prefix(root).ok())
                .map(Path::to_path_buf)
        };
        match relative {
            Some(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            None => path.display().to_string(),
        }
    }
}
