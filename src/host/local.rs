//! File-system backed editor host.
//!
//! Workspace roots are plain directories. Enumeration walks them with
//! `walkdir`, pruning excluded directories early, and filters files with
//! `globset`. The "focused editor" is an in-memory buffer opened with
//! [`LocalHost::open_editor`]; inserted text is spliced in at the cursor and
//! written back to disk.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::{EditorHost, FilePatterns};

/// Open document with a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    /// Absolute path of the document.
    pub path: PathBuf,
    /// Current contents.
    pub text: String,
    /// Byte offset of the cursor, always on a char boundary.
    pub cursor: usize,
}

/// Editor host over the local file system.
#[derive(Debug)]
pub struct LocalHost {
    roots: Vec<PathBuf>,
    editor: Mutex<Option<EditorBuffer>>,
}

impl LocalHost {
    /// Host with the given workspace roots (first root is primary).
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            editor: Mutex::new(None),
        }
    }

    /// Host with no workspace open.
    pub fn without_workspace() -> Self {
        Self::new(Vec::new())
    }

    fn editor(&self) -> MutexGuard<'_, Option<EditorBuffer>> {
        self.editor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Focus an editor on `path`, placing the cursor at byte `cursor`
    /// (clamped to the document, default end of file).
    pub fn open_editor(&self, path: &Path, cursor: Option<usize>) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open {} in editor", path.display()))?;
        let mut cursor = cursor.unwrap_or(text.len()).min(text.len());
        while !text.is_char_boundary(cursor) {
            cursor -= 1;
        }
        *self.editor() = Some(EditorBuffer {
            path: path.to_path_buf(),
            text,
            cursor,
        });
        Ok(())
    }

    /// Drop focus from the current editor.
    pub fn close_editor(&self) {
        *self.editor() = None;
    }

    /// Snapshot of the focused editor.
    pub fn editor_buffer(&self) -> Option<EditorBuffer> {
        self.editor().clone()
    }
}

#[async_trait]
impl EditorHost for LocalHost {
    fn workspace_roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    async fn find_files(&self, patterns: &FilePatterns) -> Result<Vec<String>> {
        let roots = self.roots.clone();
        let patterns = patterns.clone();
        tokio::task::spawn_blocking(move || {
            let filter = PathFilter::new(&patterns)?;
            let mut files = Vec::new();
            for root in &roots {
                files.extend(enumerate(root, &filter)?);
            }
            files.sort();
            files.dedup();
            Ok(files)
        })
        .await
        .context("File enumeration task failed")?
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    fn has_focused_editor(&self) -> bool {
        self.editor().is_some()
    }

    async fn insert_text(&self, text: &str) -> bool {
        let (path, contents) = {
            let mut editor = self.editor();
            let Some(buffer) = editor.as_mut() else {
                return false;
            };
            buffer.text.insert_str(buffer.cursor, text);
            buffer.cursor += text.len();
            (buffer.path.clone(), buffer.text.clone())
        };
        if let Err(e) = tokio::fs::write(&path, contents).await {
            log::warn!("Failed to save {}: {e}", path.display());
        }
        true
    }

    fn active_file(&self) -> Option<PathBuf> {
        self.editor().as_ref().map(|buffer| buffer.path.clone())
    }
}

/// Compiled include/exclude globs.
///
/// `*` does not cross `/`, so `**/*.*` means "any file with an extension"
/// rather than "any path containing a dot".
#[derive(Debug)]
pub(crate) struct PathFilter {
    include: GlobMatcher,
    exclude: GlobSet,
}

impl PathFilter {
    pub(crate) fn new(patterns: &FilePatterns) -> Result<Self> {
        let include = GlobBuilder::new(&patterns.include)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid include glob {:?}", patterns.include))?
            .compile_matcher();

        let mut exclude = GlobSetBuilder::new();
        for pattern in &patterns.exclude {
            exclude.add(
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("Invalid exclude glob {pattern:?}"))?,
            );
        }
        let exclude = exclude.build().context("Failed to build exclude globs")?;

        Ok(Self { include, exclude })
    }

    pub(crate) fn accepts_file(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }

    /// Whether `rel` (file or directory) lies in an excluded area.
    pub(crate) fn excludes(&self, rel: &str) -> bool {
        self.exclude.is_match(rel) || self.prunes_dir(rel)
    }

    /// A directory is pruned when the exclusion matches what lies beneath it.
    fn prunes_dir(&self, rel: &str) -> bool {
        self.exclude.is_match(rel) || self.exclude.is_match(format!("{rel}/_"))
    }
}

pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn enumerate(root: &Path, filter: &PathFilter) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        relative_slash_path(root, entry.path()).map_or(true, |rel| !filter.prunes_dir(&rel))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to enumerate {}", root.display()));
            }
            Err(e) => {
                log::debug!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_slash_path(root, entry.path()) {
            if filter.accepts_file(&rel) {
                files.push(rel);
            }
        }
    }
    Ok(files)
}
