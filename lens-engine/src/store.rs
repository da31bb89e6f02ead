use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::{Query as TantivyQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Document as TantivyDocument, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::document::MetaData;
use crate::error::{LensError, Result};
use crate::schema::{Fields, IndexSchema};

/// The document payload handed to the store, built by the engine facade
/// from a caller-supplied `Document` (spec.md §4.C: `{ content, metadata,
/// properties: { indexed } }`).
#[derive(Debug, Clone)]
pub struct IndexableDocument {
    pub hash: String,
    pub content: String,
    pub metadata: MetaData,
    pub indexed: DateTime<Utc>,
}

/// A single stored field value, coerced without panicking.
///
/// Replaces the dynamic `map[string]interface{}` the original store read
/// stored fields from (Design Notes, "dynamic-typed stored field
/// coercion"): callers get a typed enum and fall back to a zero value on
/// mismatch instead of risking a type-assertion panic.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    TextArray(Vec<String>),
    Missing,
}

impl StoredValue {
    pub fn into_text(self) -> String {
        match self {
            StoredValue::Text(s) => s,
            StoredValue::TextArray(mut v) => v.pop().unwrap_or_default(),
            StoredValue::Missing => String::new(),
        }
    }

    pub fn into_text_array(self) -> Vec<String> {
        match self {
            StoredValue::TextArray(v) => v,
            StoredValue::Text(s) => vec![s],
            StoredValue::Missing => Vec::new(),
        }
    }
}

/// A document as retrieved from the store: its primary key plus every
/// stored field, read by field name.
#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub hash: String,
    fields: Fields,
    doc: TantivyDocument,
}

impl StoredDoc {
    fn new(hash: String, fields: Fields, doc: TantivyDocument) -> Self {
        Self { hash, fields, doc }
    }

    pub fn get(&self, field: tantivy::schema::Field) -> StoredValue {
        let values: Vec<String> = self
            .doc
            .get_all(field)
            .filter_map(|v| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect();

        match values.len() {
            0 => StoredValue::Missing,
            1 if field != self.fields.tags => StoredValue::Text(values.into_iter().next().unwrap()),
            _ => StoredValue::TextArray(values),
        }
    }
}

/// A single matched document plus its score, before `crate::result` shapes
/// it into a public `SearchResult`.
pub struct Hit {
    pub score: f32,
    pub doc: StoredDoc,
}

/// The result of a compiled search (spec.md §4.A: `search(request,
/// deadline) -> SearchResult | Err`).
pub struct SearchHits {
    pub hits: Vec<Hit>,
}

/// A single operation accumulated into a batch before commit.
enum BatchOp {
    /// Replace (or insert) the document for `hash`.
    Add(IndexableDocument),
    /// Remove the document for `hash`, if any.
    Delete(String),
}

/// A mutable accumulator of operations to be committed atomically
/// (spec.md §4.A: `new_batch`/`batch.add`/`batch.delete`/`commit`).
#[derive(Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn add(&mut self, doc: IndexableDocument) {
        self.ops.push(BatchOp::Add(doc));
    }

    pub fn delete(&mut self, hash: String) {
        self.ops.push(BatchOp::Delete(hash));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Thin façade over a persistent Tantivy index: atomic batch commits, a
/// point-lookup by primary key, and deadline-bound search (spec.md §4.A).
///
/// Grounded on `engine/src/index.rs`'s `IndexWriterHandler`/
/// `IndexReaderHandler` split, generalized to commit whole batches instead
/// of single write operations.
pub struct IndexStore {
    index: Index,
    schema: IndexSchema,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
}

impl IndexStore {
    /// Creates a new index at `path` with the Lens document mapping, or
    /// opens a compatible index already there. Fails with
    /// `StorageUnavailable` on I/O or schema-mismatch errors.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(LensError::storage)?;

        let schema = IndexSchema::build();
        let dir = tantivy::directory::MmapDirectory::open(path).map_err(LensError::storage)?;

        let already_exists = Index::exists(&dir).map_err(LensError::storage)?;
        let index = if already_exists {
            let index = Index::open_in_dir(path).map_err(LensError::storage)?;
            schema.validate(&index.schema()).map_err(LensError::storage)?;
            index
        } else {
            Index::create_in_dir(path, schema.schema.clone()).map_err(LensError::storage)?
        };

        // Tokenizer registration lives on the `Index` handle, not the
        // persisted schema, so it must run on every open, not just the
        // first one that creates the directory.
        IndexSchema::register_tokenizers(&index);

        let writer = index
            .writer(50_000_000)
            .map_err(LensError::storage)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommit)
            .try_into()
            .map_err(LensError::storage)?;

        Ok(Self {
            index,
            schema,
            writer: Mutex::new(writer),
            reader,
        })
    }

    pub fn fields(&self) -> Fields {
        self.schema.fields
    }

    pub fn schema(&self) -> &tantivy::schema::Schema {
        &self.schema.schema
    }

    pub fn tantivy_index(&self) -> &Index {
        &self.index
    }

    /// The registered `content`/`display_name` analyzer, fetched fresh
    /// from this index's tokenizer manager so the query compiler
    /// tokenizes query text exactly the way documents were indexed
    /// (spec.md §4.D).
    pub fn text_tokenizer(&self) -> tantivy::tokenizer::TextAnalyzer {
        self.index
            .tokenizers()
            .get(crate::schema::TEXT_TOKENIZER)
            .expect("lens text tokenizer is registered at every IndexStore::open")
    }

    pub fn new_batch(&self) -> Batch {
        Batch::default()
    }

    /// Returns the stored document for `hash`, reading through a
    /// read-consistent snapshot of the last successful commit. Never
    /// observes an in-flight, uncommitted batch.
    pub fn point_get(&self, hash: &str) -> Result<Option<StoredDoc>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.schema.fields.hash, hash);
        let query = TermQuery::new(term, IndexRecordOption::Basic);

        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(LensError::storage)?;

        match top.into_iter().next() {
            None => Ok(None),
            Some((_, address)) => {
                let doc = searcher.doc(address).map_err(LensError::storage)?;
                Ok(Some(StoredDoc::new(hash.to_string(), self.schema.fields, doc)))
            }
        }
    }

    /// Applies every operation in `batch` atomically: on error, the index
    /// state is unchanged (Tantivy's writer discards uncommitted changes on
    /// the next `rollback`, which this adapter performs on failure).
    pub fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock();
        for op in batch.ops {
            match op {
                BatchOp::Add(doc) => self.apply_add(&writer, doc),
                BatchOp::Delete(hash) => self.apply_delete(&writer, &hash),
            }
        }

        match writer.commit() {
            Ok(_) => Ok(()),
            Err(e) => {
                let _ = writer.rollback();
                Err(LensError::storage(e))
            }
        }
    }

    fn apply_add(&self, writer: &IndexWriter, doc: IndexableDocument) {
        // Always clear any existing document for this hash first so a
        // second `Add` for the same hash within a batch wins, and so a
        // reindex replaces atomically within one commit (spec.md §3).
        self.apply_delete(writer, &doc.hash);

        let f = self.schema.fields;
        let mut tantivy_doc = TantivyDocument::default();
        tantivy_doc.add_text(f.hash, &doc.hash);
        tantivy_doc.add_text(f.content, &doc.content);
        tantivy_doc.add_text(f.display_name, &doc.metadata.display_name);
        tantivy_doc.add_text(f.mime_type, &doc.metadata.mime_type);
        tantivy_doc.add_text(f.category, &doc.metadata.category);
        for tag in &doc.metadata.tags {
            tantivy_doc.add_text(f.tags, tag);
        }
        tantivy_doc.add_date(f.indexed, &doc.indexed);

        writer.add_document(tantivy_doc);
    }

    fn apply_delete(&self, writer: &IndexWriter, hash: &str) {
        let term = Term::from_field_text(self.schema.fields.hash, hash);
        writer.delete_term(term);
    }

    /// Executes a compiled query against a read-consistent snapshot,
    /// honoring `deadline`. Safe to call concurrently with `commit` and
    /// with other searches.
    pub fn search(
        &self,
        query: &dyn TantivyQuery,
        limit: usize,
        deadline: Duration,
    ) -> Result<SearchHits> {
        let started = Instant::now();
        let searcher = self.reader.searcher();

        let top = searcher
            .search(query, &TopDocs::with_limit(limit))
            .map_err(LensError::storage)?;

        if started.elapsed() > deadline {
            return Err(LensError::DeadlineExceeded);
        }

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc = searcher.doc(address).map_err(LensError::storage)?;
            let hash = doc
                .get_first(self.schema.fields.hash)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_string();
            hits.push(Hit {
                score,
                doc: StoredDoc::new(hash, self.schema.fields, doc),
            });
        }

        Ok(SearchHits { hits })
    }

    /// Flushes and releases resources. Idempotent in effect: calling this
    /// more than once is safe since the underlying writer lock just blocks
    /// on an already-committed writer.
    pub fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().map_err(LensError::storage)?;
        drop(writer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn open_temp() -> (tempfile::TempDir, IndexStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn sample(hash: &str, content: &str) -> IndexableDocument {
        IndexableDocument {
            hash: hash.to_string(),
            content: content.to_string(),
            metadata: MetaData {
                display_name: "doc".to_string(),
                mime_type: "text/plain".to_string(),
                category: "document".to_string(),
                tags: vec!["a".to_string(), "b".to_string()],
            },
            indexed: Utc::now(),
        }
    }

    #[test]
    fn point_get_missing_returns_none() {
        let (_dir, store) = open_temp();
        assert!(store.point_get("missing").unwrap().is_none());
    }

    #[test]
    fn commit_then_point_get_round_trips() {
        let (_dir, store) = open_temp();
        let mut batch = store.new_batch();
        batch.add(sample("abcde", "quick brown fox"));
        store.commit(batch).unwrap();

        let doc = store.point_get("abcde").unwrap().expect("doc present");
        assert_eq!(doc.hash, "abcde");
        assert_eq!(doc.get(store.fields().display_name).into_text(), "doc");
        assert_eq!(
            doc.get(store.fields().tags).into_text_array(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn delete_removes_the_document() {
        let (_dir, store) = open_temp();
        let mut batch = store.new_batch();
        batch.add(sample("y", "content"));
        store.commit(batch).unwrap();
        assert!(store.point_get("y").unwrap().is_some());

        let mut batch = store.new_batch();
        batch.delete("y".to_string());
        store.commit(batch).unwrap();
        assert!(store.point_get("y").unwrap().is_none());
    }

    #[test]
    fn reindex_within_one_batch_keeps_only_the_later_write() {
        let (_dir, store) = open_temp();
        let mut batch = store.new_batch();
        batch.add(sample("x", "first version"));
        batch.add(sample("x", "second version"));
        store.commit(batch).unwrap();

        let doc = store.point_get("x").unwrap().unwrap();
        assert_eq!(doc.get(store.fields().display_name).into_text(), "doc");
        // only one hit should exist for this hash
        let term = Term::from_field_text(store.fields().hash, "x");
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let hits = store.search(&query, 10, Duration::from_secs(1)).unwrap();
        assert_eq!(hits.hits.len(), 1);
    }

    #[test]
    fn empty_batch_commit_is_a_no_op() {
        let (_dir, store) = open_temp();
        store.commit(store.new_batch()).unwrap();
    }
}
