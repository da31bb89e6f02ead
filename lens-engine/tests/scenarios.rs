//! End-to-end scenarios from spec.md §8, driven through the public
//! `Engine` facade against a real tempdir-backed index rather than
//! through the internal `IndexStore`/`Queue` pieces the unit tests in
//! `src/` exercise directly.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lens_engine::{Document, Engine, EngineConfig, LensError, MetaData, Query, QueueConfig};

fn start(config: EngineConfig) -> (tempfile::TempDir, Arc<Engine>, thread::JoinHandle<()>) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(Engine::open(dir.path(), config).unwrap());
    let runner = {
        let engine = engine.clone();
        thread::spawn(move || engine.run())
    };
    (dir, engine, runner)
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        queue: QueueConfig {
            rate: Duration::from_millis(20),
            batch_size: 16,
        },
        ..Default::default()
    }
}

fn settle() {
    thread::sleep(Duration::from_millis(150));
}

fn stop(engine: Arc<Engine>, runner: thread::JoinHandle<()>) {
    engine.close();
    runner.join().unwrap();
}

/// Scenario 1 — simple index + find.
#[test]
fn scenario_1_simple_index_and_find() {
    let (_dir, engine, runner) = start(fast_config());

    engine.index(Document::new("abcde", "quick brown fox")).unwrap();
    settle();

    assert!(engine.is_indexed("abcde").unwrap());

    let results = engine
        .search(&Query {
            text: "brown fox".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].hash, "abcde");

    stop(engine, runner);
}

/// Scenario 2 — required-terms boost with splitting. "API" must appear
/// in the indexed content since the single-char fragments split out of
/// "   API  " ("a", "p", "i" if split further) are too short, but "api"
/// itself (length 3) survives as one whitespace-delimited token.
#[test]
fn scenario_2_required_terms_with_splitting() {
    let (_dir, engine, runner) = start(fast_config());

    let doc = Document::new(
        "ipfs-doc",
        "The Interplanetary File System (IPFS) exposes an API with outstanding features.",
    );
    engine.index(doc).unwrap();
    settle();

    let results = engine
        .search(&Query {
            required: vec![
                "   API  ".to_string(),
                "Interplanetary    File   System".to_string(),
                "outstanding features".to_string(),
            ],
            ..Default::default()
        })
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].hash, "ipfs-doc");

    stop(engine, runner);
}

/// Scenario 3 — a hash filter correctly restricts candidates to the
/// supplied set, even when the text clause alone would match.
#[test]
fn scenario_3_hash_filter_restricts_candidates() {
    let (_dir, engine, runner) = start(fast_config());

    engine
        .index(Document::new("abcde", "Interplanetary File System"))
        .unwrap();
    settle();

    let err = engine
        .search(&Query {
            text: "Interplanetary File System".to_string(),
            hashes: vec!["not_my_hash".to_string()],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, LensError::NoResults));

    stop(engine, runner);
}

/// Scenario 4 — reindex replaces the document atomically; the old
/// facet values are gone and the new ones are the only match.
#[test]
fn scenario_4_reindex_replaces_facets() {
    let (_dir, engine, runner) = start(fast_config());

    engine
        .index(Document {
            hash: "X".to_string(),
            metadata: MetaData {
                tags: vec!["old".to_string()],
                ..Default::default()
            },
            content: "placeholder content".to_string(),
            reindex: false,
        })
        .unwrap();
    settle();

    engine
        .index(Document {
            hash: "X".to_string(),
            metadata: MetaData {
                tags: vec!["new".to_string()],
                ..Default::default()
            },
            content: "placeholder content".to_string(),
            reindex: true,
        })
        .unwrap();
    settle();

    let old_gone = engine.search(&Query {
        tags: vec!["old".to_string()],
        ..Default::default()
    });
    assert!(matches!(old_gone, Err(LensError::NoResults)));

    let results = engine
        .search(&Query {
            tags: vec!["new".to_string()],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].hash, "X");

    stop(engine, runner);
}

/// Scenario 5 — remove: a second `Remove` of the same hash is
/// `NotFound`.
#[test]
fn scenario_5_remove_then_not_found() {
    let (_dir, engine, runner) = start(fast_config());

    engine.index(Document::new("Y", "some content")).unwrap();
    settle();

    engine.remove("Y").unwrap();
    settle();

    assert!(!engine.is_indexed("Y").unwrap());

    let err = engine.remove("Y").unwrap_err();
    assert!(matches!(err, LensError::NotFound { .. }));

    stop(engine, runner);
}

/// Scenario 6 — backpressure and ordering: a single producer enqueuing
/// many items with an aggressive `batch_size`/`rate` sees every item
/// committed, independent of how many batches it took.
#[test]
fn scenario_6_backpressure_and_ordering() {
    let (_dir, engine, runner) = start(EngineConfig {
        queue: QueueConfig {
            rate: Duration::from_millis(500),
            batch_size: 1,
        },
        ..Default::default()
    });

    let hashes: Vec<String> = (0..100).map(|i| format!("bp-{}", i)).collect();
    for hash in &hashes {
        engine.index(Document::new(hash.clone(), "backpressure content")).unwrap();
    }

    thread::sleep(Duration::from_millis(600));

    for hash in &hashes {
        assert!(engine.is_indexed(hash).unwrap(), "{} should be indexed", hash);
    }

    let results = engine
        .search(&Query {
            hashes: hashes.clone(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(results.len(), 100);

    stop(engine, runner);
}

/// A query with no non-empty clause is rejected before ever touching
/// the store (spec.md §8 invariant 3).
#[test]
fn empty_query_rejected_without_touching_store() {
    let (_dir, engine, runner) = start(fast_config());
    let err = engine.search(&Query::default()).unwrap_err();
    assert!(matches!(err, LensError::InvalidQuery));
    stop(engine, runner);
}
