//! Structured deletion filters.
//!
//! A closed sum type rather than an open trait hierarchy: the deletion path
//! in the store matches exhaustively and rejects kinds it cannot translate,
//! so adding a filter kind is a deliberate, visible change.

/// A filter describing which documents a deletion should match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Matches every document whose id starts with the given prefix.
    /// With path-derived ids this selects whole directories.
    IdPrefix(String),
    /// Matches a single document by exact id.
    IdEquals(String),
}

impl DocumentFilter {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentFilter::IdPrefix(_) => "id-prefix",
            DocumentFilter::IdEquals(_) => "id-equals",
        }
    }
}
