//! Capability handlers invoked by the router.
//!
//! Each handler answers on the surface the request arrived on. Host failures
//! are converted into response fields here and never propagate past the
//! bridge.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::Config;
use crate::envelope::{self, FileDescriptor};
use crate::host::{EditorHost, FilePatterns, Surface};

/// Enumerate and classify the workspace files.
pub async fn describe_workspace_files(
    host: &dyn EditorHost,
    config: &Config,
) -> Result<Vec<FileDescriptor>> {
    let patterns = FilePatterns {
        include: config.include_glob.clone(),
        exclude: config.exclude_globs.clone(),
    };
    let files = host.find_files(&patterns).await?;
    Ok(files
        .into_iter()
        .map(|name| FileDescriptor::new(name, &config.image_extensions))
        .collect())
}

/// Answer `getWorkspaceFiles`, or broadcast a listing when `request_id` is `None`.
///
/// A failed enumeration is logged. Correlated requests additionally get a
/// `workspaceFiles` reply carrying the error so the caller is not left
/// waiting; broadcasts are dropped.
pub async fn list_workspace_files(
    host: &dyn EditorHost,
    config: &Config,
    out: &dyn Surface,
    request_id: Option<String>,
) {
    match describe_workspace_files(host, config).await {
        Ok(files) => {
            log::debug!("Posting {} workspace files", files.len());
            out.post(&envelope::workspace_files(&files, request_id));
        }
        Err(e) => {
            log::error!("Error getting workspace files: {e:#}");
            if request_id.is_some() {
                out.post(&envelope::workspace_files_error(
                    "Could not list workspace files",
                    request_id,
                ));
            }
        }
    }
}

/// Resolve a workspace-relative path against `root`.
///
/// Absolute paths and paths that climb out of `root` are refused.
pub fn resolve_in_workspace(root: &Path, file_name: &str) -> Result<PathBuf> {
    let relative = Path::new(file_name);
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("{file_name:?} is outside the workspace");
            }
        }
    }
    if resolved == root {
        bail!("{file_name:?} does not name a file");
    }
    Ok(resolved)
}

async fn read_workspace_file(host: &dyn EditorHost, file_name: &str) -> Result<Vec<u8>> {
    let Some(root) = host.workspace_roots().into_iter().next() else {
        bail!("No workspace is open.");
    };
    let path = resolve_in_workspace(&root, file_name)?;
    host.read_file(&path).await
}

/// Answer `getFileContent` with the file's bytes as base64.
///
/// Every call posts exactly one reply: `{ content }` on success,
/// `{ content: null, error }` otherwise.
pub async fn read_file_content(
    host: &dyn EditorHost,
    out: &dyn Surface,
    file_name: &str,
    request_id: Option<String>,
) {
    let reply = match read_workspace_file(host, file_name).await {
        Ok(bytes) => envelope::file_content(BASE64.encode(bytes), request_id),
        Err(e) => {
            log::warn!("Error reading file {file_name}: {e:#}");
            let message = if host.workspace_roots().is_empty() {
                "No workspace is open.".to_string()
            } else {
                format!("Could not read file: {file_name}")
            };
            envelope::file_content_error(&message, request_id)
        }
    };
    out.post(&reply);
}

/// Handle `insertText`. No reply; a no-op without a focused editor.
pub async fn insert_text(host: &dyn EditorHost, text: &str) {
    if !host.insert_text(text).await {
        log::debug!("insertText ignored: no focused editor");
    }
}
