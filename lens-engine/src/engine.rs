use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::document::{Document, Query, SearchResult};
use crate::error::{LensError, Result};
use crate::query::compile;
use crate::queue::{Queue, QueueConfig, QueueItem};
use crate::result::shape_all;
use crate::store::{IndexStore, IndexableDocument};

/// Hard ceiling on a search deadline regardless of what the caller or
/// `EngineConfig` asks for (spec.md §5: "Search honors the caller's
/// deadline *and* a hard 30-second ceiling").
const SEARCH_DEADLINE_CEILING: Duration = Duration::from_secs(30);

/// How long `Index`/`Remove` will poll a stopped queue before giving up,
/// to ride out a racing `Close`/restart (spec.md §4.E).
const STOPPED_RETRY_DELAY: Duration = Duration::from_secs(3);
const STOPPED_RETRY_POLL: Duration = Duration::from_millis(50);

/// Engine-wide tuning: the batch queue's flush policy, plus the search
/// defaults the original Lens engine hardcoded
/// (`original_source/engine/engine.go::Search`: `RankOpts.MaxOutputs =
/// 1000`, `Timeout = 10000` milliseconds).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub search_deadline: Duration,
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            search_deadline: Duration::from_secs(10),
            max_results: 1000,
        }
    }
}

/// The façade coordinating the batch queue and the index store behind a
/// single persistent index directory (spec.md §4.E, §5).
///
/// Grounded on `original_source/engine/engine.go`'s `Engine` (the
/// `Index`/`Search`/`Remove`/`IsIndexed`/`Run`/`Close` surface) and on
/// `engine/src/index.rs`'s `IndexHandler`, which is where the Rust
/// ownership split between a writer-owning queue and a reader-owning store
/// comes from.
pub struct Engine {
    store: Arc<IndexStore>,
    queue: Arc<Queue>,
    config: EngineConfig,
}

impl Engine {
    /// Opens (or creates) the index at `path` and wires up its batch
    /// queue. Does not start the consumer: call `run` on a dedicated
    /// thread before indexing will actually commit anything.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self> {
        let store = Arc::new(IndexStore::open(path)?);
        let queue = Arc::new(Queue::new(store.clone(), config.queue));
        Ok(Self { store, queue, config })
    }

    /// Validates and enqueues `document` for indexing. Returns
    /// `AlreadyIndexed` if a document with the same hash already exists
    /// and `document.reindex` is false (spec.md §3).
    pub fn index(&self, mut document: Document) -> Result<()> {
        if document.hash.trim().is_empty() {
            return Err(LensError::InvalidDocument {
                reason: "hash must not be empty".to_string(),
            });
        }

        if !document.reindex && self.store.point_get(&document.hash)?.is_some() {
            return Err(LensError::AlreadyIndexed { hash: document.hash });
        }

        document.metadata = document.metadata.with_defaults_filled();

        let indexable = IndexableDocument {
            hash: document.hash,
            content: document.content,
            metadata: document.metadata,
            indexed: Utc::now(),
        };

        self.enqueue_with_stopped_retry(QueueItem::Add(indexable))
    }

    /// Enqueues removal of the document for `hash`. Fails with `NotFound`
    /// if no document is currently committed under that hash (spec.md
    /// §4.E); a racing in-flight `Index` that hasn't committed yet is not
    /// visible here either, matching `is_indexed`'s snapshot semantics.
    pub fn remove(&self, hash: &str) -> Result<()> {
        if hash.trim().is_empty() {
            return Err(LensError::InvalidDocument {
                reason: "hash must not be empty".to_string(),
            });
        }

        if !self.is_indexed(hash)? {
            return Err(LensError::NotFound {
                hash: hash.to_string(),
            });
        }

        self.enqueue_with_stopped_retry(QueueItem::Delete(hash.to_string()))
    }

    /// Enqueues `item`, polling for up to `STOPPED_RETRY_DELAY` while the
    /// queue appears stopped rather than failing immediately, to ride out
    /// a racing restart of the consumer (spec.md §4.E: "Wait up to a short
    /// bounded delay... if the queue is stopped to handle a racing
    /// restart; if still stopped, return QueueStopped").
    fn enqueue_with_stopped_retry(&self, item: QueueItem) -> Result<()> {
        let deadline = std::time::Instant::now() + STOPPED_RETRY_DELAY;

        while self.queue.is_stopped() {
            if std::time::Instant::now() >= deadline {
                return Err(LensError::QueueStopped);
            }
            std::thread::sleep(STOPPED_RETRY_POLL);
        }

        self.queue.enqueue(item)
    }

    /// Whether a document for `hash` is currently committed to the index.
    /// Reads the last successful commit; does not see a pending,
    /// not-yet-flushed write.
    pub fn is_indexed(&self, hash: &str) -> Result<bool> {
        Ok(self.store.point_get(hash)?.is_some())
    }

    /// Compiles and executes `query` against `self.config.search_deadline`,
    /// capped at the hard 30-second ceiling. Returns `NoResults` rather
    /// than an empty vector when nothing matches.
    pub fn search(&self, query: &Query) -> Result<Vec<SearchResult>> {
        self.search_with_deadline(query, self.config.search_deadline)
    }

    /// Compiles and executes `query` with a caller-supplied deadline,
    /// still capped at the hard 30-second ceiling (spec.md §4.E: "Execute
    /// against the store with a deadline of `min(ctx_deadline,
    /// now+30s)`"). Results are capped at `self.config.max_results`
    /// (hard upper bound of 1000 per spec.md §4.E).
    pub fn search_with_deadline(&self, query: &Query, caller_deadline: Duration) -> Result<Vec<SearchResult>> {
        let compiled = compile(&self.store.fields(), &self.store.text_tokenizer(), query)?;
        debug!("executing query, correlation id {}", compiled.hash);

        let deadline = caller_deadline.min(SEARCH_DEADLINE_CEILING);
        let limit = self.config.max_results.min(1000);

        let hits = self.store.search(compiled.query.as_ref(), limit, deadline)?;

        if hits.hits.is_empty() {
            return Err(LensError::NoResults);
        }

        Ok(shape_all(hits, &self.store.fields()))
    }

    /// Blocks the calling thread running the batch queue's consumer loop.
    /// Must be invoked exactly once, on a thread dedicated to it; `close`
    /// terminates it from another thread.
    pub fn run(&self) {
        self.queue.run();
    }

    /// Signals the consumer to stop, blocking until it has executed its
    /// final flush and released the index. Idempotent.
    pub fn close(&self) {
        self.queue.close();
    }
}
