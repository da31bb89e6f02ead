use crate::document::{MetaData, SearchResult};
use crate::schema::Fields;
use crate::store::{Hit, SearchHits};

/// Shapes a single raw index hit into the public `SearchResult`.
///
/// Grounded on `original_source/engine/result.go::newResult`, reworked per
/// the Design Notes' panic-free stored-field coercion: the original reads
/// `d.Fields["display_name"].(string)` and similar type assertions that
/// panic on an unexpected stored shape. This reads through `StoredValue`
/// instead, so a missing or differently-typed field degrades to its zero
/// value rather than aborting the search.
pub fn shape(hit: Hit, fields: &Fields) -> SearchResult {
    let metadata = MetaData {
        display_name: hit.doc.get(fields.display_name).into_text(),
        mime_type: hit.doc.get(fields.mime_type).into_text(),
        category: hit.doc.get(fields.category).into_text(),
        tags: hit.doc.get(fields.tags).into_text_array(),
    };

    SearchResult {
        hash: hit.doc.hash.clone(),
        score: hit.score,
        metadata,
    }
}

/// Shapes every hit in `hits`, preserving score order.
pub fn shape_all(hits: SearchHits, fields: &Fields) -> Vec<SearchResult> {
    hits.hits.into_iter().map(|hit| shape(hit, fields)).collect()
}
