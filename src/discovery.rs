//! Incremental content discovery.
//!
//! Walks the content tree and decides, per file, whether the persisted
//! cache can stand in for a full parse:
//!
//! ```text
//! file ──► in force set? ──yes──► miss (always re-parse)
//!            │no
//!            ▼
//!          cache hit (hash matches)? ──yes──► Proxy over cached Core
//!            │no
//!            ▼
//!          full parse (parallel above threshold)
//! ```
//!
//! This module is the single authority on hit/miss; callers never re-check
//! the cache themselves, which also guarantees no path is parsed twice in
//! one pass. Per-file parse failures are reported and excluded without
//! aborting the walk; only an unreadable content root is fatal.

use crate::cache::{self, BuildCache};
use crate::config::SiteConfig;
use crate::content::{PageRef, Proxy, RelPath};
use crate::parser::{self, ContentParser};
use anyhow::{bail, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

/// Below this many misses, parsing stays in the caller's thread.
pub const PARALLEL_PARSE_THRESHOLD: usize = 3;

/// Source file extension this pipeline consumes.
const CONTENT_EXT: &str = "md";

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Per-file verdict of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Cached metadata is valid; serve a lazy proxy.
    Hit,
    /// Full re-parse required.
    Miss,
}

/// Result of one discovery pass.
pub struct DiscoveryOutcome {
    /// All discovered pages: proxies for hits, entities for misses.
    pub pages: Vec<PageRef>,
    pub hits: usize,
    pub misses: usize,
    /// Paths parsed fresh this pass, i.e. not served from cache.
    pub fresh: HashSet<RelPath>,
    /// Per-file parse failures, excluded from `pages`.
    pub failures: Vec<(RelPath, String)>,
}

/// Decide hit/miss for a single path.
///
/// The force set wins unconditionally: a freshly edited file must never be
/// served from cache, no matter what the hash comparison says.
pub fn decide(
    path: &RelPath,
    current_hash: &str,
    cache: &BuildCache,
    force: &HashSet<RelPath>,
) -> Decision {
    if force.contains(path) {
        return Decision::Miss;
    }
    match cache.lookup(path, current_hash) {
        Some(_) => Decision::Hit,
        None => Decision::Miss,
    }
}

/// Walk the content tree and produce the page list for this build.
pub fn discover(
    config: &SiteConfig,
    cache: &BuildCache,
    force: &HashSet<RelPath>,
    parser: Arc<dyn ContentParser>,
    on_progress: impl Fn() + Sync,
) -> Result<DiscoveryOutcome> {
    let content_dir = config.content_dir();
    if !content_dir.is_dir() {
        bail!("content directory not found: {}", content_dir.display());
    }

    // BTreeMap keyed by RelPath: dedupes and gives a stable walk order.
    let mut sources: BTreeMap<RelPath, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(&content_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_str().unwrap_or_default();
        if IGNORED_FILES.contains(&name) {
            continue;
        }
        if entry.path().extension().is_none_or(|ext| ext != CONTENT_EXT) {
            continue;
        }
        if let Some(rel) = RelPath::from_root(&content_dir, entry.path()) {
            sources.insert(rel, entry.into_path());
        }
    }

    let mut pages: Vec<PageRef> = Vec::with_capacity(sources.len());
    let mut failures: Vec<(RelPath, String)> = Vec::new();
    let mut misses: Vec<(RelPath, PathBuf, String)> = Vec::new();

    for (rel, abs) in sources {
        let hash = match cache::hash_file(&abs) {
            Ok(hash) => hash,
            Err(err) => {
                failures.push((rel, format!("{err:#}")));
                on_progress();
                continue;
            }
        };

        match decide(&rel, &hash, cache, force) {
            Decision::Hit => {
                let core = cache
                    .lookup(&rel, &hash)
                    .expect("decide() returned Hit for a missing cache entry")
                    .clone();
                pages.push(Arc::new(Proxy::new(
                    core,
                    make_loader(config, Arc::clone(&parser)),
                )));
                on_progress();
            }
            Decision::Miss => misses.push((rel, abs, hash)),
        }
    }

    let hits = pages.len();
    let miss_count = misses.len();

    let parse_one = |(rel, abs, hash): (RelPath, PathBuf, String)| {
        let result = parser
            .parse(&abs)
            .map(|(body, meta)| parser::build_entity(rel.clone(), body, meta, hash));
        on_progress();
        (rel, result)
    };

    // Parallel full parses only once the batch is big enough to beat the
    // pool overhead; the hit/miss contract is identical either way.
    let parsed: Vec<(RelPath, Result<crate::content::Entity>)> =
        if miss_count > PARALLEL_PARSE_THRESHOLD {
            misses.into_par_iter().map(parse_one).collect()
        } else {
            misses.into_iter().map(parse_one).collect()
        };

    let mut fresh = HashSet::with_capacity(parsed.len());
    for (rel, result) in parsed {
        match result {
            Ok(entity) => {
                fresh.insert(rel);
                pages.push(Arc::new(entity));
            }
            Err(err) => failures.push((rel, format!("{err:#}"))),
        }
    }

    Ok(DiscoveryOutcome {
        pages,
        hits,
        misses: miss_count,
        fresh,
        failures,
    })
}

/// On-demand full-parse loader for proxies produced by cache hits.
fn make_loader(
    config: &SiteConfig,
    parser: Arc<dyn ContentParser>,
) -> crate::content::proxy::Loader {
    let content_dir = config.content_dir();
    Box::new(move |rel: &RelPath| {
        let abs = content_dir.join(rel.as_str());
        if !abs.exists() {
            // Deleted since the cache was written: degrade, don't fail.
            return Ok(None);
        }
        let (body, meta) = parser.parse(&abs)?;
        let hash = cache::hash_file(&abs)?;
        Ok(Some(parser::build_entity(rel.clone(), body, meta, hash)))
    })
}

// ============================================================================
// Tests
// ============================================================================
