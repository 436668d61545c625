//! Bounded cache for rendered page HTML.
//!
//! Keys are content fingerprints, so a hit is valid by construction and no
//! invalidation pass is ever needed: any input that could change the output
//! (template, metadata, body hash, pagination shape) changes the key. Stale
//! entries simply stop being asked for and age out through eviction.
//!
//! Capacity is fixed; when an insert would exceed it, the least recently
//! used fifth of the cache is dropped in one batch so eviction cost stays
//! amortized instead of firing on every subsequent insert.

use crate::content::Page;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Fraction of entries dropped per eviction, as a divisor.
const EVICT_DIVISOR: usize = 5;

/// Fingerprint key for one (template, page) rendering.
///
/// Covers everything the rendered output depends on: template identity,
/// slug, source path, page kind, the content hash (which for synthesized
/// pages is a hash of their listing props), the full metadata map, and the
/// child count. Metadata that fails to serialize falls back to a coarser
/// key that still includes the content hash, so correctness degrades to
/// extra misses, never to stale hits.
pub fn render_key(template_id: &str, page: &dyn Page) -> String {
    let core = page.core();
    let mut hasher = blake3::Hasher::new();
    hasher.update(template_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(core.slug.as_bytes());
    hasher.update(b"\0");
    hasher.update(core.source.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(page.kind().name().as_bytes());
    hasher.update(b"\0");
    hasher.update(core.content_hash.as_bytes());
    hasher.update(b"\0");
    if let Ok(meta) = toml::to_string(&core.props) {
        hasher.update(meta.as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(&page.child_count().to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

struct Inner {
    map: HashMap<String, String>,
    /// Last-access tick per key, for LRU ordering.
    stamps: HashMap<String, u64>,
    tick: u64,
    max: usize,
}

/// Bounded LRU cache of rendered HTML, keyed by [`render_key`] fingerprints.
pub struct RenderCache {
    inner: Mutex<Inner>,
}

impl RenderCache {
    pub fn new(max: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                stamps: HashMap::new(),
                tick: 0,
                max: max.max(1),
            }),
        }
    }

    /// Cached HTML for a fingerprint, bumping its recency.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let hit = inner.map.get(key).cloned();
        if hit.is_some() {
            inner.tick += 1;
            let tick = inner.tick;
            inner.stamps.insert(key.to_owned(), tick);
        }
        hit
    }

    /// Store rendered HTML, evicting the oldest fifth at capacity.
    pub fn insert(&self, key: String, html: String) {
        let mut inner = self.inner.lock();
        if !inner.map.contains_key(&key) && inner.map.len() >= inner.max {
            evict(&mut inner);
        }
        inner.tick += 1;
        let tick = inner.tick;
        inner.stamps.insert(key.clone(), tick);
        inner.map.insert(key, html);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.stamps.clear();
    }
}

fn evict(inner: &mut Inner) {
    let count = (inner.max / EVICT_DIVISOR).max(1);

    let mut by_age: Vec<(u64, String)> = inner
        .map
        .keys()
        .map(|key| (inner.stamps.get(key).copied().unwrap_or(0), key.clone()))
        .collect();
    by_age.sort_unstable();

    for (_, key) in by_age.into_iter().take(count) {
        inner.map.remove(&key);
        inner.stamps.remove(&key);
    }
}

// ============================================================================
// Tests
// ============================================================================
