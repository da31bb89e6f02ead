use serde::{Deserialize, Serialize};

/// A single piece of object metadata, reconstructed on read the same shape
/// it was indexed with.
///
/// `mime_type` and `category` default to `"unknown"` when the caller leaves
/// them empty, matching `MetaDataV2` from the original Lens implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetaData {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MetaData {
    /// Fills `mime_type`/`category` with `"unknown"` wherever the caller
    /// left them empty. Called once, at `Engine::index` time.
    pub(crate) fn with_defaults_filled(mut self) -> Self {
        if self.mime_type.is_empty() {
            self.mime_type = "unknown".to_string();
        }
        if self.category.is_empty() {
            self.category = "unknown".to_string();
        }
        self
    }
}

/// A document submitted for indexing.
///
/// `hash` is the primary key: non-empty, and assumed globally unique and
/// immutable for the document's lifetime. `reindex` permits overwriting an
/// existing document with the same hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub hash: String,
    #[serde(default)]
    pub metadata: MetaData,
    pub content: String,
    #[serde(default)]
    pub reindex: bool,
}

impl Document {
    pub fn new(hash: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            metadata: MetaData::default(),
            content: content.into(),
            reindex: false,
        }
    }
}

/// A structured search request (spec.md §3).
///
/// Every field is optional; the query compiler (`crate::query`) rejects a
/// `Query` that yields no non-empty clause with `InvalidQuery`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub hashes: Vec<String>,
}

/// A single matched document, shaped from a raw index hit
/// (`crate::result::shape`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub hash: String,
    pub score: f32,
    pub metadata: MetaData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_empty_mime_and_category() {
        let md = MetaData::default().with_defaults_filled();
        assert_eq!(md.mime_type, "unknown");
        assert_eq!(md.category, "unknown");
    }

    #[test]
    fn defaults_leave_supplied_values_untouched() {
        let md = MetaData {
            mime_type: "text/plain".to_string(),
            category: "document".to_string(),
            ..Default::default()
        }
        .with_defaults_filled();
        assert_eq!(md.mime_type, "text/plain");
        assert_eq!(md.category, "document");
    }
}
