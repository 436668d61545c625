//! Lazy page façade over a cached [`Core`].
//!
//! On a warm rebuild most pages come out of the persisted cache as proxies:
//! cheap fields are served straight from the cached `Core`, and the full
//! [`Entity`] is only parsed when something actually asks for the body,
//! the HTML or the table of contents.
//!
//! State machine: `Unloaded → Loaded`, one-way and idempotent. The loader
//! runs exactly once even when several render workers race on the first
//! expensive access; every caller then observes the same outcome, including
//! a cached failure.

use super::core::{Core, RelPath};
use super::entity::{Entity, TocEntry};
use super::Page;
use anyhow::{anyhow, Result};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Loads the full entity for a source path. `Ok(None)` means the source is
/// gone; expensive fields then degrade to empty values instead of erroring.
pub type Loader = Box<dyn Fn(&RelPath) -> Result<Option<Entity>> + Send + Sync>;

enum LoadOutcome {
    Loaded(Box<Entity>),
    Empty,
    Failed(String),
}

/// Lazy façade satisfying [`Page`] without parsing until needed.
pub struct Proxy {
    core: Core,
    loader: Loader,
    cell: OnceLock<LoadOutcome>,
}

impl Proxy {
    /// Constant time, no I/O.
    pub fn new(core: Core, loader: Loader) -> Self {
        Self {
            core,
            loader,
            cell: OnceLock::new(),
        }
    }

    /// Whether the full entity has been materialized yet.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Run the loader at most once and cache its outcome.
    ///
    /// A parse failure is cached too: retrying on every access would turn
    /// one broken file into repeated parse storms during rendering.
    fn materialize(&self) -> &LoadOutcome {
        self.cell.get_or_init(|| match (self.loader)(&self.core.source) {
            Ok(Some(entity)) => LoadOutcome::Loaded(Box::new(entity)),
            Ok(None) => LoadOutcome::Empty,
            Err(err) => LoadOutcome::Failed(format!("{err:#}")),
        })
    }

    fn load_error(&self, msg: &str) -> anyhow::Error {
        anyhow!("failed to materialize `{}`: {msg}", self.core.source)
    }
}

impl Page for Proxy {
    fn core(&self) -> &Core {
        &self.core
    }

    fn raw_body(&self) -> Result<&str> {
        match self.materialize() {
            LoadOutcome::Loaded(entity) => Ok(&entity.raw_body),
            LoadOutcome::Empty => Ok(""),
            LoadOutcome::Failed(msg) => Err(self.load_error(msg)),
        }
    }

    fn html(&self) -> Result<&str> {
        match self.materialize() {
            LoadOutcome::Loaded(entity) => Ok(&entity.html),
            LoadOutcome::Empty => Ok(""),
            LoadOutcome::Failed(msg) => Err(self.load_error(msg)),
        }
    }

    fn toc(&self) -> Result<&[TocEntry]> {
        match self.materialize() {
            LoadOutcome::Loaded(entity) => Ok(&entity.toc),
            LoadOutcome::Empty => Ok(&[]),
            LoadOutcome::Failed(msg) => Err(self.load_error(msg)),
        }
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("source", &self.core.source)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

// Same identity rule as `Entity`: source path only.
impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.core.source == other.core.source
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.source.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MetaMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn core(path: &str) -> Core {
        let mut meta = MetaMap::new();
        meta.insert("title".into(), toml::Value::String("Cached Title".into()));
        Core::from_metadata(RelPath::new(path), meta, "hash".into())
    }

    fn loaded_entity(path: &str) -> Entity {
        let mut entity = Entity::from_core(core(path));
        entity.raw_body = "raw body".into();
        entity.html = "<p>raw body</p>".into();
        entity.toc = vec![TocEntry {
            level: 1,
            title: "Heading".into(),
            id: "heading".into(),
        }];
        entity
    }

    #[test]
    fn test_cheap_fields_never_load() {
        let proxy = Proxy::new(
            core("posts/a.md"),
            Box::new(|_| panic!("cheap access must not trigger the loader")),
        );
        let page: &dyn Page = &proxy;
        assert_eq!(page.title(), "Cached Title");
        assert_eq!(page.slug(), "cached-title");
        assert_eq!(page.source().as_str(), "posts/a.md");
        assert!(!proxy.is_loaded());
    }

    #[test]
    fn test_proxy_matches_entity_surface() {
        let entity = loaded_entity("posts/a.md");
        let expected_html = entity.html.clone();
        let proxy = Proxy::new(core("posts/a.md"), Box::new(move |_| Ok(Some(entity.clone()))));

        let page: &dyn Page = &proxy;
        assert_eq!(page.title(), "Cached Title");
        assert_eq!(proxy.html().unwrap(), expected_html);
        assert_eq!(proxy.raw_body().unwrap(), "raw body");
        assert_eq!(proxy.toc().unwrap().len(), 1);
    }

    #[test]
    fn test_loader_runs_once_across_fields() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let proxy = Proxy::new(
            core("posts/a.md"),
            Box::new(move |path| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(loaded_entity(path.as_str())))
            }),
        );

        proxy.raw_body().unwrap();
        proxy.html().unwrap();
        proxy.toc().unwrap();
        proxy.html().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loader_runs_once_under_concurrency() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let proxy = Proxy::new(
            core("posts/a.md"),
            Box::new(move |path| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(loaded_entity(path.as_str())))
            }),
        );

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert_eq!(proxy.html().unwrap(), "<p>raw body</p>");
                    assert_eq!(proxy.raw_body().unwrap(), "raw body");
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_loader_degrades_to_empty_values() {
        let proxy = Proxy::new(core("gone.md"), Box::new(|_| Ok(None)));
        assert_eq!(proxy.raw_body().unwrap(), "");
        assert_eq!(proxy.html().unwrap(), "");
        assert!(proxy.toc().unwrap().is_empty());
    }

    #[test]
    fn test_failure_surfaces_only_on_expensive_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let proxy = Proxy::new(
            core("broken.md"),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("unterminated front matter"))
            }),
        );

        // Cheap fields stay usable for diagnostics.
        let page: &dyn Page = &proxy;
        assert_eq!(page.title(), "Cached Title");

        let err = proxy.html().unwrap_err().to_string();
        assert!(err.contains("broken.md"));
        assert!(err.contains("unterminated front matter"));

        // The failure is cached, not retried.
        assert!(proxy.raw_body().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // And cheap fields are still intact afterwards.
        assert_eq!(page.title(), "Cached Title");
    }

    #[test]
    fn test_equality_with_unloaded_proxy() {
        let a = Proxy::new(core("posts/a.md"), Box::new(|_| Ok(None)));
        let b = Proxy::new(core("posts/a.md"), Box::new(|_| Ok(None)));
        let c = Proxy::new(core("posts/c.md"), Box::new(|_| Ok(None)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
