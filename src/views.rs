//! Lazily computed views over the current page list.
//!
//! Each view (filtered slice or lookup map) is computed on first access and
//! memoized until invalidated. Views are always derived from one consistent
//! snapshot of the page list: the orchestrator collects the full list as a
//! barrier before handing it over, and replaces it wholesale via
//! [`DerivedViewCache::set_pages`].
//!
//! # Staleness
//!
//! The path map carries the page count observed when it was last built and
//! recomputes itself when the current count differs. This is a deliberate
//! fast path: additions and removals always change the count, while a
//! same-count swap (one page added, one removed, between invalidations) is
//! not detected. The orchestrator compensates by calling [`invalidate`]
//! after any in-place edit that keeps cardinality.
//!
//! [`invalidate`]: DerivedViewCache::invalidate

use crate::content::PageRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Slice = Arc<Vec<PageRef>>;
type PathMap = Arc<HashMap<String, PageRef>>;

struct PathMapState {
    /// Page count at build time, the cheap staleness heuristic.
    built_at: usize,
    map: PathMap,
}

/// Memoized filtered slices and lookup maps over the current page list.
pub struct DerivedViewCache {
    pages: RwLock<Slice>,
    regular: RwLock<Option<Slice>>,
    generated: RwLock<Option<Slice>>,
    listable: RwLock<Option<Slice>>,
    path_map: RwLock<Option<PathMapState>>,
}

impl DerivedViewCache {
    pub fn new(pages: Vec<PageRef>) -> Self {
        Self {
            pages: RwLock::new(Arc::new(pages)),
            regular: RwLock::new(None),
            generated: RwLock::new(None),
            listable: RwLock::new(None),
            path_map: RwLock::new(None),
        }
    }

    /// Replace the underlying page list and drop every memoized view.
    pub fn set_pages(&self, pages: Vec<PageRef>) {
        *self.pages.write() = Arc::new(pages);
        self.invalidate();
    }

    /// Snapshot of the full page list.
    pub fn pages(&self) -> Slice {
        Arc::clone(&self.pages.read())
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Non-generated pages, i.e. pages backed by real source files.
    pub fn regular(&self) -> Slice {
        self.memoized(&self.regular, |page| !page.is_generated())
    }

    /// Synthesized pages (tag index, tag listing pages).
    pub fn generated(&self) -> Slice {
        self.memoized(&self.generated, |page| page.is_generated())
    }

    /// Pages eligible for listings and tag buckets.
    pub fn listable(&self) -> Slice {
        self.memoized(&self.listable, |page| page.is_listable())
    }

    /// Source-path-keyed lookup map over regular pages.
    ///
    /// Rebuilt automatically whenever the page count differs from the count
    /// at last build; see the module docs for what that does and does not
    /// detect.
    pub fn path_map(&self) -> PathMap {
        let current_len = self.len();

        {
            let state = self.path_map.read();
            if let Some(state) = state.as_ref()
                && state.built_at == current_len
            {
                return Arc::clone(&state.map);
            }
        }

        let mut state = self.path_map.write();
        // Double-check after acquiring write lock
        if let Some(state) = state.as_ref()
            && state.built_at == current_len
        {
            return Arc::clone(&state.map);
        }

        let pages = self.pages();
        let map: HashMap<String, PageRef> = pages
            .iter()
            .filter(|page| !page.is_generated())
            .map(|page| (page.source().as_str().to_owned(), Arc::clone(page)))
            .collect();
        let map = Arc::new(map);
        *state = Some(PathMapState {
            built_at: current_len,
            map: Arc::clone(&map),
        });
        map
    }

    /// Look up a regular page by its relative source path.
    pub fn by_path(&self, path: &str) -> Option<PageRef> {
        self.path_map().get(path).cloned()
    }

    /// Drop every memoized slice and map.
    pub fn invalidate(&self) {
        *self.regular.write() = None;
        *self.generated.write() = None;
        *self.listable.write() = None;
        *self.path_map.write() = None;
    }

    /// Drop only the regular slice, the cheapest to recompute after a
    /// metadata-only edit.
    pub fn invalidate_regular(&self) {
        *self.regular.write() = None;
    }

    fn memoized(
        &self,
        cell: &RwLock<Option<Slice>>,
        filter: impl Fn(&PageRef) -> bool,
    ) -> Slice {
        // Fast path: already computed (read lock only)
        {
            let cached = cell.read();
            if let Some(slice) = cached.as_ref() {
                return Arc::clone(slice);
            }
        }

        // Slow path: single pass over the full list (write lock)
        let mut cached = cell.write();
        if let Some(slice) = cached.as_ref() {
            return Arc::clone(slice);
        }

        let pages = self.pages();
        let slice: Slice = Arc::new(pages.iter().filter(|p| filter(*p)).cloned().collect());
        *cached = Some(Arc::clone(&slice));
        slice
    }
}

// ============================================================================
// Tests
// ============================================================================
