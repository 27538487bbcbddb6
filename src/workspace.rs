//! Live editor state: the non-persisted side of retrieval.
//!
//! The host editor is consumed through the read-only [`WorkspaceState`]
//! trait; absence of an editor, file, or selection is modeled as `None`
//! and never as an error. Failures while reading attached files yield an
//! empty contribution for that file only.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Attached files above this size are skipped.
pub const MAX_ATTACHED_FILE_BYTES: u64 = 200 * 1024;

/// The currently focused editor buffer. `caret_offset` is in characters
/// and may exceed the text length; windows are clamped to buffer bounds.
#[derive(Debug, Clone)]
pub struct OpenBuffer {
    pub path: PathBuf,
    pub text: String,
    pub caret_offset: usize,
}

/// Read-only view of the user's editing session.
pub trait WorkspaceState: Send + Sync {
    /// The focused buffer, or `None` when no editor/file is open.
    fn current_buffer(&self) -> Option<OpenBuffer>;

    /// Files the user explicitly attached as context. Small bounded set.
    fn attached_files(&self) -> Vec<PathBuf>;
}

/// Where a live-context entry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOrigin {
    AttachedFile(PathBuf),
    FocusedWindow,
}

/// A non-persisted context entry gathered from the editing session.
#[derive(Debug, Clone)]
pub struct LiveContextEntry {
    pub text: String,
    pub origin: LiveOrigin,
}

/// Gather live context: every readable attached file in full, plus a
/// caret-centered window of the focused buffer unless that buffer is
/// already among the attached files. `window_chars` is the total window
/// size in characters.
pub fn gather_live_context(
    workspace: &dyn WorkspaceState,
    window_chars: usize,
) -> Vec<LiveContextEntry> {
    let mut entries = Vec::new();

    let attached = workspace.attached_files();
    for path in &attached {
        if let Some(text) = read_attached_file(path) {
            entries.push(LiveContextEntry {
                text,
                origin: LiveOrigin::AttachedFile(path.clone()),
            });
        }
    }

    if let Some(buffer) = workspace.current_buffer() {
        if !attached.iter().any(|p| p == &buffer.path) {
            entries.push(LiveContextEntry {
                text: caret_window(&buffer.text, buffer.caret_offset, window_chars),
                origin: LiveOrigin::FocusedWindow,
            });
        }
    }

    entries
}

/// Read an attached file, or `None` when it is missing, oversized, or
/// binary (NUL byte or invalid UTF-8).
fn read_attached_file(path: &Path) -> Option<String> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            debug!(path = %path.display(), %err, "attached file unreadable, skipping");
            return None;
        }
    };
    if !meta.is_file() || meta.len() > MAX_ATTACHED_FILE_BYTES {
        debug!(path = %path.display(), len = meta.len(), "attached file skipped");
        return None;
    }

    let bytes = std::fs::read(path).ok()?;
    if bytes.contains(&0) {
        debug!(path = %path.display(), "attached file looks binary, skipping");
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Extract up to `window_chars` characters centered on the caret, clamped
/// to the buffer's bounds.
pub fn caret_window(text: &str, caret_offset: usize, window_chars: usize) -> String {
    let len = text.chars().count();
    let caret = caret_offset.min(len);
    let half = window_chars / 2;
    let start = caret.saturating_sub(half);
    let end = (caret + half).min(len);
    text.chars().skip(start).take(end - start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_window_is_centered() {
        let text: String = ('a'..='z').collect();
        // caret at 'm' (offset 12), window 10: 5 before, 5 after
        assert_eq!(caret_window(&text, 12, 10), "hijklmnopq");
    }

    #[test]
    fn caret_window_clamps_at_start_and_end() {
        let text = "0123456789";
        assert_eq!(caret_window(text, 0, 6), "012");
        assert_eq!(caret_window(text, 10, 6), "789");
        assert_eq!(caret_window(text, 500, 6), "789");
    }

    #[test]
    fn caret_window_covers_whole_short_buffer() {
        let text = "short";
        assert_eq!(caret_window(text, 2, 8000), "short");
    }

    #[test]
    fn caret_window_respects_multibyte_characters() {
        let text = "héllo wörld";
        // chars 3..7 of [h é l l o ␣ w ö r l d]
        let window = caret_window(text, 5, 4);
        assert_eq!(window, "lo w");
    }

    struct FakeWorkspace {
        buffer: Option<OpenBuffer>,
        attached: Vec<PathBuf>,
    }

    impl WorkspaceState for FakeWorkspace {
        fn current_buffer(&self) -> Option<OpenBuffer> {
            self.buffer.clone()
        }
        fn attached_files(&self) -> Vec<PathBuf> {
            self.attached.clone()
        }
    }

    #[test]
    fn no_editor_means_no_contribution() {
        let ws = FakeWorkspace {
            buffer: None,
            attached: vec![],
        };
        assert!(gather_live_context(&ws, 5000).is_empty());
    }

    #[test]
    fn focused_buffer_is_skipped_when_already_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.rs");
        std::fs::write(&path, "fn open() {}").unwrap();

        let ws = FakeWorkspace {
            buffer: Some(OpenBuffer {
                path: path.clone(),
                text: "fn open() {}".to_string(),
                caret_offset: 0,
            }),
            attached: vec![path],
        };
        let entries = gather_live_context(&ws, 5000);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].origin, LiveOrigin::AttachedFile(_)));
    }

    #[test]
    fn oversized_and_binary_attachments_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.txt");
        std::fs::write(&big, "x".repeat((MAX_ATTACHED_FILE_BYTES + 1) as usize)).unwrap();
        let binary = dir.path().join("tool.exe");
        std::fs::write(&binary, b"MZ\x00\x01\x02").unwrap();
        let missing = dir.path().join("gone.txt");

        let ws = FakeWorkspace {
            buffer: None,
            attached: vec![big, binary, missing],
        };
        assert!(gather_live_context(&ws, 5000).is_empty());
    }
}
