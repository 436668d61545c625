//! Persisted build cache: the only state that survives across builds.
//!
//! One JSON file holds two maps, both keyed by normalized relative source
//! path and both plain data — never live object references, so a new build
//! can never observe stale entities from a previous run:
//!
//! - `pages`: path → [`Core`] (identity + cheap metadata + content hash)
//! - `tags`:  path → tag set, the taxonomy diff baseline
//!
//! The file is read once at the start of discovery and written once after a
//! successful build; nothing mutates it mid-phase.

use crate::content::{Core, RelPath};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Blake3 hash (hex) of a file's raw bytes, used for freshness detection.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(hash_bytes(&bytes))
}

/// Blake3 hash (hex) of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Cross-build metadata cache, serialized as one JSON file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BuildCache {
    /// Cached cheap metadata per source path.
    #[serde(default)]
    pub pages: HashMap<RelPath, Core>,

    /// Tag set per source path from the previous successful build.
    #[serde(default)]
    pub tags: HashMap<RelPath, BTreeSet<String>>,
}

impl BuildCache {
    /// Load the cache file, or an empty cache when the file does not exist.
    ///
    /// A present-but-unparseable cache is a hard error: silently starting
    /// from scratch would mask corruption, and the caller can always delete
    /// the file (or pass `--clean`) deliberately.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read build cache {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse build cache {}", path.display()))
    }

    /// Write the cache file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self).context("failed to serialize build cache")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write build cache {}", path.display()))?;
        Ok(())
    }

    /// Cached `Core` for a path, only when its content hash still matches.
    ///
    /// The hash comparison is the freshness check: a stale entry is treated
    /// exactly like a missing one.
    pub fn lookup(&self, path: &RelPath, current_hash: &str) -> Option<&Core> {
        self.pages
            .get(path)
            .filter(|core| core.content_hash == current_hash)
    }

    /// Replace a path's cached metadata after a successful parse.
    pub fn update_page(&mut self, core: Core) {
        self.pages.insert(core.source.clone(), core);
    }

    /// Drop cached entries for paths that no longer exist on disk.
    pub fn retain_paths(&mut self, live: &std::collections::HashSet<RelPath>) {
        self.pages.retain(|path, _| live.contains(path));
        self.tags.retain(|path, _| live.contains(path));
    }
}

// ============================================================================
// Tests
// ============================================================================
