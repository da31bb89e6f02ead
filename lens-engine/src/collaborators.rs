use crate::document::MetaData;
use crate::error::{LensError, Result};

/// Fetches object content by hash from the content-addressed store backing
/// this Lens instance.
///
/// Fetching objects is out of scope for `lens-engine` (spec.md §6
/// Non-goals): the engine only depends on this trait boundary, and a
/// caller supplies a concrete implementation that talks to whatever store
/// holds the actual bytes.
///
/// Grounded on `original_source/lens_v2.go::MagnifyV2`, which fetches the
/// raw object ahead of indexing it; here that step is pulled out as an
/// injected collaborator rather than reimplemented.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, hash: &str) -> Result<Vec<u8>>;
}

/// Derives indexable metadata (display name, MIME type, category, tags)
/// from fetched content.
///
/// Also out of scope for `lens-engine` proper; see `ContentFetcher`.
pub trait ContentAnalyzer: Send + Sync {
    fn analyze(&self, hash: &str, content: &[u8]) -> Result<MetaData>;
}

/// In-memory stand-ins for `ContentFetcher`/`ContentAnalyzer`, used by this
/// crate's own tests and available to downstream integration tests that
/// want to exercise the engine without wiring a real content store.
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A fetcher backed by a plain in-memory map, seeded with `put`.
    #[derive(Default)]
    pub struct InMemoryFetcher {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn put(&self, hash: impl Into<String>, content: impl Into<Vec<u8>>) {
            self.objects.lock().insert(hash.into(), content.into());
        }
    }

    impl ContentFetcher for InMemoryFetcher {
        fn fetch(&self, hash: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .get(hash)
                .cloned()
                .ok_or_else(|| LensError::NotFound {
                    hash: hash.to_string(),
                })
        }
    }

    /// An analyzer that always returns the same, caller-supplied metadata,
    /// ignoring content.
    #[derive(Default, Clone)]
    pub struct StaticAnalyzer {
        pub metadata: MetaData,
    }

    impl StaticAnalyzer {
        pub fn new(metadata: MetaData) -> Self {
            Self { metadata }
        }
    }

    impl ContentAnalyzer for StaticAnalyzer {
        fn analyze(&self, _hash: &str, _content: &[u8]) -> Result<MetaData> {
            Ok(self.metadata.clone())
        }
    }
}
