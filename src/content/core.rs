//! Cache-persistable page identity and cheap metadata.
//!
//! [`Core`] is the record that survives across builds inside the persisted
//! build cache. It carries everything a rebuild needs to *describe* a page
//! without re-parsing it: identity (relative source path), front-matter
//! fields, and the blake3 content hash used for freshness detection.
//!
//! Heavy data (body, rendered HTML, table of contents) never lives here;
//! that is [`Entity`](super::entity::Entity) territory.

use crate::urls::slugify;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

/// Free-form front-matter mapping, as parsed from TOML.
pub type MetaMap = BTreeMap<String, toml::Value>;

// ============================================================================
// Relative Paths
// ============================================================================

/// A normalized, content-root-relative source path.
///
/// Always uses forward slashes and never contains `..`, a drive prefix, or a
/// leading `/`. This is the only path form allowed inside the persisted
/// cache: absolute paths would make the cache machine-specific.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Normalize a path that is already relative to the content root.
    ///
    /// Root-dir, parent-dir and current-dir components are dropped, which
    /// also strips any absolute prefix a careless caller passed in.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let normalized: Vec<&str> = path
            .as_ref()
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        Self(normalized.join("/"))
    }

    /// Build a `RelPath` by stripping `root` from an absolute path.
    ///
    /// Returns `None` when `path` is not under `root`.
    pub fn from_root(root: &Path, path: &Path) -> Option<Self> {
        path.strip_prefix(root).ok().map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First path component, used as the page's section name.
    pub fn section(&self) -> Option<&str> {
        match self.0.split_once('/') {
            Some((first, _)) => Some(first),
            None => None,
        }
    }

    /// File stem of the last component.
    pub fn stem(&self) -> &str {
        let last = self.0.rsplit('/').next().unwrap_or(&self.0);
        last.rsplit_once('.').map_or(last, |(stem, _)| stem)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Core Record
// ============================================================================

/// Immutable identity + cheap metadata for one content page.
///
/// Two `Core`s with the same `source` describe the same logical page, no
/// matter what the other fields say. Updates never mutate in place: a
/// re-parse produces a fresh `Core` which replaces the cached one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Core {
    /// Content-root-relative source path (the page's identity).
    pub source: RelPath,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub slug: String,
    /// Manual sort weight, defaults to 0.
    pub weight: i64,
    pub lang: String,
    /// Complete front-matter bag, including fields mirrored above.
    pub props: MetaMap,
    /// Blake3 hash (hex) of the raw source file.
    pub content_hash: String,
}

impl Core {
    /// Build a `Core` from parsed front matter.
    ///
    /// Pure and deterministic for identical input. Missing optional fields
    /// fall back to defaults instead of erroring: the title defaults to the
    /// file stem, the slug to the slugified title, the language to `en`.
    pub fn from_metadata(source: RelPath, meta: MetaMap, content_hash: String) -> Self {
        let title = meta
            .get("title")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| source.stem().to_owned());

        let date = meta
            .get("date")
            .and_then(toml::Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        let tags = meta
            .get("tags")
            .and_then(toml::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(toml::Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let slug = meta
            .get("slug")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| slugify(&title));

        let weight = meta
            .get("weight")
            .and_then(toml::Value::as_integer)
            .unwrap_or(0);

        let lang = meta
            .get("lang")
            .and_then(toml::Value::as_str)
            .unwrap_or("en")
            .to_owned();

        Self {
            source,
            title,
            date,
            tags,
            slug,
            weight,
            lang,
            props: meta,
            content_hash,
        }
    }

    /// Whether front matter marks this page as a draft.
    pub fn is_draft(&self) -> bool {
        self.props
            .get("draft")
            .and_then(toml::Value::as_bool)
            .unwrap_or(false)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, toml::Value)]) -> MetaMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_rel_path_drops_curdir() {
        let rel = RelPath::new("./posts/hello.md");
        assert_eq!(rel.as_str(), "posts/hello.md");
    }

    #[test]
    fn test_rel_path_strips_absolute_prefix() {
        let rel = RelPath::new("/var/site/posts/hello.md");
        assert_eq!(rel.as_str(), "var/site/posts/hello.md");
    }

    #[test]
    fn test_rel_path_drops_parent_components() {
        let rel = RelPath::new("posts/../secret.md");
        assert_eq!(rel.as_str(), "posts/secret.md");
    }

    #[test]
    fn test_rel_path_from_root() {
        let rel = RelPath::from_root(Path::new("/site/content"), Path::new("/site/content/a.md"));
        assert_eq!(rel.unwrap().as_str(), "a.md");

        let outside = RelPath::from_root(Path::new("/site/content"), Path::new("/elsewhere/a.md"));
        assert!(outside.is_none());
    }

    #[test]
    fn test_rel_path_section_and_stem() {
        let rel = RelPath::new("posts/2024/hello.md");
        assert_eq!(rel.section(), Some("posts"));
        assert_eq!(rel.stem(), "hello");

        let top = RelPath::new("about.md");
        assert_eq!(top.section(), None);
        assert_eq!(top.stem(), "about");
    }

    #[test]
    fn test_from_metadata_full() {
        let m = meta(&[
            ("title", toml::Value::String("Hello World".into())),
            ("date", toml::Value::String("2024-03-01".into())),
            (
                "tags",
                toml::Value::Array(vec![
                    toml::Value::String("rust".into()),
                    toml::Value::String("web".into()),
                ]),
            ),
            ("weight", toml::Value::Integer(5)),
            ("lang", toml::Value::String("de".into())),
        ]);

        let core = Core::from_metadata(RelPath::new("posts/hello.md"), m, "abc".into());
        assert_eq!(core.title, "Hello World");
        assert_eq!(core.date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(core.tags, vec!["rust", "web"]);
        assert_eq!(core.slug, "hello-world");
        assert_eq!(core.weight, 5);
        assert_eq!(core.lang, "de");
        assert_eq!(core.content_hash, "abc");
    }

    #[test]
    fn test_from_metadata_defaults() {
        let core = Core::from_metadata(RelPath::new("posts/untitled.md"), MetaMap::new(), "h".into());
        assert_eq!(core.title, "untitled");
        assert_eq!(core.date, None);
        assert!(core.tags.is_empty());
        assert_eq!(core.slug, "untitled");
        assert_eq!(core.weight, 0);
        assert_eq!(core.lang, "en");
        assert!(!core.is_draft());
    }

    #[test]
    fn test_from_metadata_bad_date_ignored() {
        let m = meta(&[("date", toml::Value::String("yesterday".into()))]);
        let core = Core::from_metadata(RelPath::new("a.md"), m, "h".into());
        assert_eq!(core.date, None);
    }

    #[test]
    fn test_from_metadata_deterministic() {
        let m = meta(&[("title", toml::Value::String("Same".into()))]);
        let a = Core::from_metadata(RelPath::new("a.md"), m.clone(), "h".into());
        let b = Core::from_metadata(RelPath::new("a.md"), m, "h".into());
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_draft() {
        let m = meta(&[("draft", toml::Value::Boolean(true))]);
        let core = Core::from_metadata(RelPath::new("a.md"), m, "h".into());
        assert!(core.is_draft());
    }

    #[test]
    fn test_core_round_trips_through_json() {
        let m = meta(&[("title", toml::Value::String("T".into()))]);
        let core = Core::from_metadata(RelPath::new("posts/t.md"), m, "hash".into());
        let json = serde_json::to_string(&core).unwrap();
        let back: Core = serde_json::from_str(&json).unwrap();
        assert_eq!(core, back);
    }
}
