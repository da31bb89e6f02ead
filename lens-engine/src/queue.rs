use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error};
use parking_lot::Mutex;

use crate::error::{LensError, Result};
use crate::store::IndexStore;

/// A pending write: either an insert/replace (`Add`) or a tombstone
/// (`Delete`) for the given hash (spec.md §4.B).
pub enum QueueItem {
    Add(crate::store::IndexableDocument),
    Delete(String),
}

/// Batch queue tuning. `rate` bounds how long items may wait before a
/// flush even if `batch_size` is never reached; `batch_size` triggers an
/// immediate flush once enough items have accumulated.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub rate: Duration,
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            rate: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

/// The single-consumer, many-producer buffer of pending index/delete
/// operations (spec.md §4.B).
///
/// Grounded on `engine/src/index.rs`'s `IndexWriterHandler` (bounded
/// `crossbeam::channel`, a dedicated consumer) and on
/// `examples/original_source/engine/queue/queue.go`'s `select`-driven
/// flush loop, which this formalizes into the `NotStarted -> Running ->
/// Draining -> Stopped` state machine spec.md §4.B describes.
pub struct Queue {
    store: Arc<IndexStore>,
    config: QueueConfig,

    item_tx: Sender<QueueItem>,
    item_rx: Receiver<QueueItem>,

    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,

    // Dropped by the consumer thread once it has fully drained and
    // stopped; every `close()` caller blocks on a clone of `done_rx` until
    // that drop disconnects the channel. `Mutex<Option<_>>` lets `run()`
    // take ownership exactly once without requiring `&mut self`.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,

    stopped: AtomicBool,
    last_flush_failed: AtomicBool,
}

impl Queue {
    pub fn new(store: Arc<IndexStore>, config: QueueConfig) -> Self {
        let channel_capacity = (3 * config.batch_size).max(1);
        let (item_tx, item_rx) = bounded(channel_capacity);
        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(0);

        Self {
            store,
            config,
            item_tx,
            item_rx,
            stop_tx,
            stop_rx,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            stopped: AtomicBool::new(false),
            last_flush_failed: AtomicBool::new(false),
        }
    }

    /// Hands `item` to the background consumer. Safe to call from any
    /// number of threads without external locking; returns `QueueStopped`
    /// without sending if the queue has already stopped.
    pub fn enqueue(&self, item: QueueItem) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(LensError::QueueStopped);
        }

        self.item_tx.send(item).map_err(|_| LensError::QueueStopped)
    }

    /// A lock-free read of whether the queue has stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Whether the most recent flush failed to commit. Commit failures are
    /// logged and discarded (the caller's `enqueue` already returned
    /// success); this flag lets a supervising layer notice without the
    /// core propagating the error back to a long-returned caller.
    pub fn had_commit_failure(&self) -> bool {
        self.last_flush_failed.load(Ordering::Acquire)
    }

    /// Blocks the calling thread running the consumer loop until `close`
    /// is signaled. Must be invoked exactly once, on a dedicated thread.
    pub fn run(&self) {
        let done_tx = self.done_tx.lock().take();

        let ticker = tick(self.config.rate);
        let mut pending: Vec<QueueItem> = Vec::new();

        loop {
            select! {
                recv(self.item_rx) -> msg => match msg {
                    Ok(item) => {
                        pending.push(item);
                        if pending.len() >= self.config.batch_size {
                            self.flush(&mut pending);
                        }
                    }
                    Err(_) => break,
                },
                recv(ticker) -> _ => {
                    if !pending.is_empty() {
                        self.flush(&mut pending);
                    }
                },
                recv(self.stop_rx) -> _ => {
                    debug!("queue received close signal, draining before shutdown");
                    break;
                },
            }
        }

        // Drain whatever arrived between the last select iteration and the
        // stop signal, non-blockingly, then perform the final flush.
        while let Ok(item) = self.item_rx.try_recv() {
            pending.push(item);
        }
        self.flush(&mut pending);

        if let Err(e) = self.store.close() {
            error!("failed to close index store during queue shutdown: {:?}", e);
        }

        self.stopped.store(true, Ordering::Release);
        drop(done_tx);
    }

    /// Signals termination and blocks until the consumer has executed its
    /// final flush and released the index handle. Idempotent: calling this
    /// more than once has no additional effect.
    pub fn close(&self) {
        let _ = self.stop_tx.try_send(());
        let _ = self.done_rx.clone().recv();
    }

    fn flush(&self, pending: &mut Vec<QueueItem>) {
        if pending.is_empty() {
            return;
        }

        let started = std::time::Instant::now();
        let count = pending.len();

        let mut batch = self.store.new_batch();
        for item in pending.drain(..) {
            match item {
                QueueItem::Add(doc) => batch.add(doc),
                QueueItem::Delete(hash) => batch.delete(hash),
            }
        }

        match self.store.commit(batch) {
            Ok(()) => {
                self.last_flush_failed.store(false, Ordering::Release);
                debug!("flush of {} items committed in {:?}", count, started.elapsed());
            }
            Err(e) => {
                self.last_flush_failed.store(true, Ordering::Release);
                error!(
                    "flush of {} items failed to commit, buffer discarded: {:?}",
                    count, e
                );
            }
        }
    }
}
