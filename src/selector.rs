//! Path eligibility predicate used during directory traversal.

use std::path::Path;

/// Directory fragments that are never worth indexing.
pub const DEFAULT_EXCLUDES: &[&str] = &["target", "build", ".github", ".git", ".idea", ".gradle"];

const PATTERN_SEPARATOR: char = ';';

/// Decides whether a filesystem path should be ingested.
///
/// Inclusion patterns are plain substrings (semicolon-separated in the
/// configuration); a path matches when it is a regular, non-empty file,
/// contains no exclusion substring, and either the inclusion set is empty
/// or at least one inclusion substring appears in the `/`-normalized path.
#[derive(Debug, Clone)]
pub struct FileSelector {
    included: Vec<String>,
    excluded: Vec<String>,
}

impl FileSelector {
    /// Parse a semicolon-separated inclusion list; blank segments dropped.
    pub fn new(include_patterns: &str) -> Self {
        let included = include_patterns
            .split(PATTERN_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self {
            included,
            excluded: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the default exclusion substrings.
    pub fn with_exclusions(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn matches(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");

        if self.excluded.iter().any(|e| normalized.contains(e)) {
            return false;
        }

        let included =
            self.included.is_empty() || self.included.iter().any(|i| normalized.contains(i));
        if !included {
            return false;
        }

        std::fs::metadata(path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }
}
