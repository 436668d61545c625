//! File system watcher for incremental rebuilds.
//!
//! Monitors the content directory, templates directory, and config file,
//! debounces rapid event bursts, and routes each batch to the cheapest
//! rebuild that is still correct:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│    handle_changes()    │  │
//! │  │ events   │    │ (300ms)  │    │                        │  │
//! │  └──────────┘    └──────────┘    │  content  → forced     │  │
//! │                                  │             reparse    │  │
//! │                                  │  templates → cleared   │  │
//! │                                  │             RenderCache│  │
//! │                                  │  config    → reload +  │  │
//! │                                  │             clear      │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::SiteConfig,
    content::RelPath,
    log,
    logger::WatchStatus,
    pipeline,
    render::RenderCache,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// What a changed path means for the rebuild strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCategory {
    Content,
    Template,
    Config,
    Unknown,
}

fn categorize(path: &Path, config: &SiteConfig) -> WatchCategory {
    if path == config.config_path {
        WatchCategory::Config
    } else if path.starts_with(config.content_dir()) {
        WatchCategory::Content
    } else if path.starts_with(config.templates_dir()) {
        WatchCategory::Template
    } else {
        WatchCategory::Unknown
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: HashSet::new(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Process one debounced batch. Returns true when a full rebuild ran.
fn handle_changes(
    paths: &[PathBuf],
    config: &mut SiteConfig,
    render_cache: &RenderCache,
    status: &mut WatchStatus,
) -> bool {
    if paths.is_empty() {
        return false;
    }

    let content_dir = config.content_dir();
    let mut config_changed = false;
    let mut template_changed = false;
    let mut changed_content: HashSet<RelPath> = HashSet::new();

    for path in paths {
        match categorize(path, config) {
            WatchCategory::Config => config_changed = true,
            WatchCategory::Template => template_changed = true,
            WatchCategory::Content => {
                if let Some(rel) = RelPath::from_root(&content_dir, path) {
                    changed_content.insert(rel);
                }
            }
            WatchCategory::Unknown => {}
        }
    }

    if config_changed {
        match SiteConfig::from_path(&config.config_path.clone()) {
            Ok(mut reloaded) => {
                reloaded.set_root(config.get_root());
                *config = reloaded;
                log!("watch"; "config reloaded");
            }
            Err(err) => {
                status.error("config reload failed", &format!("{err:#}"));
                return false;
            }
        }
    }

    let full = config_changed || template_changed;
    if full {
        // Render-cache keys cover the template id, not its body: after a
        // template edit every cached rendering is suspect. Every build
        // writes the whole output tree, so clearing the cache is all a full
        // re-render takes.
        render_cache.clear();
    } else if changed_content.is_empty() {
        return false;
    }

    let label = if full {
        "full re-render".to_owned()
    } else {
        let mut names: Vec<&str> = changed_content.iter().map(RelPath::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    };

    match pipeline::build_site_with(config, &changed_content, render_cache) {
        Ok(report) if report.is_success() => {
            status.success(&format!("rebuilt: {label}"));
        }
        Ok(report) => {
            let detail: Vec<String> = report
                .failures
                .iter()
                .map(|(path, msg)| format!("{}: {msg}", path.as_str()))
                .collect();
            status.error(&format!("rebuilt with errors: {label}"), &detail.join("\n"));
        }
        Err(err) => {
            status.error(&format!("failed: {label}"), &format!("{err:#}"));
        }
    }

    full
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let watched = [
        (config.content_dir(), RecursiveMode::Recursive),
        (config.templates_dir(), RecursiveMode::Recursive),
        (config.config_path.clone(), RecursiveMode::NonRecursive),
    ];

    let mut names = Vec::new();
    for (path, mode) in watched {
        if path.exists() {
            watcher
                .watch(&path, mode)
                .with_context(|| format!("failed to watch {}", path.display()))?;
            names.push(path.display().to_string());
        }
    }

    log!("watch"; "watching: {}", names.join(", "));
    eprintln!(); // Blank line to separate init logs from change events
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher with debouncing and incremental rebuilds.
pub fn watch_for_changes_blocking(mut config: SiteConfig) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("failed to create file watcher")?;
    setup_watchers(&mut watcher, &config)?;

    let mut debouncer = Debouncer::new();
    let mut status = WatchStatus::new();
    let render_cache = RenderCache::new(config.build.render_cache_size);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                if handle_changes(&debouncer.take(), &mut config, &render_cache, &mut status) {
                    debouncer.mark_rebuild();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            // Other cases: irrelevant events, timeout without ready, etc.
            _ => {}
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("a.swp")));
        assert!(is_temp_file(Path::new("a.md~")));
        assert!(is_temp_file(Path::new(".hidden.md")));
        assert!(!is_temp_file(Path::new("post.md")));
    }

    #[test]
    fn test_categorize() {
        let mut config = SiteConfig::default();
        config.set_root(Path::new("/site"));
        config.config_path = PathBuf::from("/site/vela.toml");

        assert_eq!(
            categorize(Path::new("/site/content/a.md"), &config),
            WatchCategory::Content
        );
        assert_eq!(
            categorize(Path::new("/site/templates/page.html"), &config),
            WatchCategory::Template
        );
        assert_eq!(
            categorize(Path::new("/site/vela.toml"), &config),
            WatchCategory::Config
        );
        assert_eq!(
            categorize(Path::new("/elsewhere/x"), &config),
            WatchCategory::Unknown
        );
    }

    #[test]
    fn test_debouncer_batches_and_drains() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.ready());

        debouncer.add(Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![PathBuf::from("a.md"), PathBuf::from("a.swp")],
            attrs: Default::default(),
        });

        // Temp files are dropped at the door.
        assert_eq!(debouncer.pending.len(), 1);
        assert_eq!(debouncer.timeout(), Duration::from_millis(DEBOUNCE_MS));

        let taken = debouncer.take();
        assert_eq!(taken, vec![PathBuf::from("a.md")]);
        assert!(debouncer.pending.is_empty());
        assert_eq!(debouncer.timeout(), Duration::from_secs(60));
    }
}
