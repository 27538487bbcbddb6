//! Core data models for the knowledge store.
//!
//! A [`Document`] is the unit that is embedded, persisted, and retrieved:
//! a UTF-8 body plus an ordered metadata map. The embedding vector itself
//! is passed alongside the document on the write path and lives in the
//! store, not on the model.

use std::collections::BTreeMap;

use uuid::Uuid;

/// Metadata key for the owning project. Defaults to `"default"` when absent.
pub const KEY_PROJECT_ID: &str = "project_id";
/// Metadata key for the ISO-8601 write timestamp, stamped by the store.
pub const KEY_LAST_INDEXED_DATE: &str = "last_indexed_date";
/// Metadata key for the full normalized path of the source file.
pub const KEY_FILE_PATH: &str = "file_path";
/// Metadata key for the bare file name of the source file.
pub const KEY_FILE_NAME: &str = "file_name";
/// Metadata key for the absolute directory containing the source file.
pub const KEY_DIRECTORY: &str = "absolute_directory_path";

/// Fallback project id when a document carries no `project_id` metadata.
pub const DEFAULT_PROJECT_ID: &str = "default";

/// The persisted unit: text body plus ordered metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique within a store. Deterministic for path-backed documents so
    /// that re-ingesting the same file overwrites the previous entry.
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Build a document, deriving the id from path metadata when present.
    pub fn new(text: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        let id = derive_id(&metadata);
        Self {
            id,
            text: text.into(),
            metadata,
        }
    }

    /// Build a document under an explicit id (update-by-id semantics).
    pub fn with_id(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    pub fn project_id(&self) -> &str {
        self.metadata
            .get(KEY_PROJECT_ID)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROJECT_ID)
    }

    /// Blank documents are filtered out before they reach the store.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Derive a document id from its metadata.
///
/// Path-backed documents get `"{absolute_directory_path}/{file_name}"`,
/// which makes re-ingestion overwrite the existing entry and lets the
/// id-prefix deletion filter match whole directories. Anything else gets
/// a random UUID.
pub fn derive_id(metadata: &BTreeMap<String, String>) -> String {
    match (metadata.get(KEY_DIRECTORY), metadata.get(KEY_FILE_NAME)) {
        (Some(dir), Some(name)) if !dir.is_empty() && !name.is_empty() => {
            format!("{}/{}", dir.trim_end_matches('/'), name)
        }
        _ => Uuid::new_v4().to_string(),
    }
}

/// A ranked search hit: cosine similarity score, id, and the reconstructed
/// document (with `last_indexed_date` re-attached to its metadata).
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    pub score: f64,
    pub id: String,
    pub document: Document,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_metadata(dir: &str, name: &str) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(KEY_DIRECTORY.to_string(), dir.to_string());
        m.insert(KEY_FILE_NAME.to_string(), name.to_string());
        m
    }

    #[test]
    fn derive_id_is_deterministic_for_path_backed_documents() {
        let a = derive_id(&path_metadata("/home/x/proj/src", "main.rs"));
        let b = derive_id(&path_metadata("/home/x/proj/src", "main.rs"));
        assert_eq!(a, "/home/x/proj/src/main.rs");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_id_trims_trailing_directory_slash() {
        let id = derive_id(&path_metadata("/home/x/proj/src/", "lib.rs"));
        assert_eq!(id, "/home/x/proj/src/lib.rs");
    }

    #[test]
    fn derive_id_falls_back_to_uuid_without_path_metadata() {
        let a = derive_id(&BTreeMap::new());
        let b = derive_id(&BTreeMap::new());
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn project_id_defaults_when_absent() {
        let doc = Document::new("text", BTreeMap::new());
        assert_eq!(doc.project_id(), DEFAULT_PROJECT_ID);

        let mut meta = BTreeMap::new();
        meta.insert(KEY_PROJECT_ID.to_string(), "acme".to_string());
        let doc = Document::new("text", meta);
        assert_eq!(doc.project_id(), "acme");
    }

    #[test]
    fn blank_detection() {
        assert!(Document::new("   \n\t", BTreeMap::new()).is_blank());
        assert!(!Document::new("fn main() {}", BTreeMap::new()).is_blank());
    }
}
