//! Tag taxonomy: grouping, incremental recompute, page synthesis.
//!
//! The in-memory [`TaxonomyIndex`] is rebuilt from the *current* page list
//! on every run. What makes rebuilds incremental is not the index itself
//! (rebuilding it is cheap map/list work) but the diffing step that limits
//! page *synthesis* to the tags whose membership actually changed:
//!
//! ```text
//! changed pages ──► diff vs persisted path↔tags store ──► affected tags
//!                                                              │
//! current page list ──► full bucket rebuild ──► TaxonomyIndex  │
//!                                                              ▼
//!                                    synthesize pages for affected tags only
//!                                    (+ the always-cheap top-level tag index)
//! ```
//!
//! Cached entity objects from a previous build never enter the index; the
//! persisted store holds plain paths and tag strings only.

use crate::config::SiteConfig;
use crate::content::{Core, Entity, MetaMap, PageKind, PageRef, RelPath};
use crate::urls::slugify;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Below this many affected tags, page synthesis stays sequential.
pub const PARALLEL_TAG_THRESHOLD: usize = 20;

/// Persisted path → normalized-tag-set mapping (plain data only).
pub type TagStore = HashMap<RelPath, BTreeSet<String>>;

/// One tag bucket: display name, slug, and member pages sorted by date
/// descending (undated pages sort as the oldest possible value).
#[derive(Clone)]
pub struct TagGroup {
    pub name: String,
    pub slug: String,
    pub pages: Vec<PageRef>,
}

/// Normalized tag key → bucket, for the current build.
#[derive(Default)]
pub struct TaxonomyIndex {
    groups: BTreeMap<String, TagGroup>,
}

/// Normalized bucket key for a tag.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

impl TaxonomyIndex {
    /// Full recompute: bucket every listable page from the current list.
    pub fn full(pages: &[PageRef]) -> Self {
        let mut groups: BTreeMap<String, TagGroup> = BTreeMap::new();

        for page in pages.iter().filter(|p| p.is_listable()) {
            for tag in page.tags() {
                let key = normalize_tag(tag);
                if key.is_empty() {
                    continue;
                }
                groups
                    .entry(key)
                    .or_insert_with(|| TagGroup {
                        name: tag.trim().to_owned(),
                        slug: slugify(tag),
                        pages: Vec::new(),
                    })
                    .pages
                    .push(Arc::clone(page));
            }
        }

        for group in groups.values_mut() {
            group.pages.sort_by(|a, b| {
                let a_date = a.date().unwrap_or(NaiveDate::MIN);
                let b_date = b.date().unwrap_or(NaiveDate::MIN);
                b_date
                    .cmp(&a_date)
                    .then_with(|| a.source().cmp(b.source()))
            });
        }

        Self { groups }
    }

    /// Incremental recompute.
    ///
    /// Diffs each changed page's tag set against the persisted store to
    /// find the affected tag keys (O(changed pages)), updates the store,
    /// then rebuilds the whole in-memory index from the current page list.
    /// That last step is deliberately not incremental — it is cheap, and it
    /// is what guarantees no stale page object survives into this build.
    ///
    /// A changed path absent from the current list (deleted page) counts as
    /// having lost all its tags.
    pub fn incremental(
        pages: &[PageRef],
        changed: &HashSet<RelPath>,
        store: &mut TagStore,
    ) -> (Self, BTreeSet<String>) {
        let current: HashMap<&RelPath, BTreeSet<String>> = pages
            .iter()
            .filter(|p| p.is_listable())
            .map(|p| {
                let tags = p.tags().iter().map(|t| normalize_tag(t)).collect();
                (p.source(), tags)
            })
            .collect();

        let mut affected = BTreeSet::new();
        for path in changed {
            let old = store.get(path).cloned().unwrap_or_default();
            let new = current.get(path).cloned();

            match &new {
                Some(tags) => {
                    affected.extend(old.symmetric_difference(tags).cloned());
                    store.insert(path.clone(), tags.clone());
                }
                None => {
                    // Deleted (or no longer listable): lost all tags.
                    affected.extend(old);
                    store.remove(path);
                }
            }
        }

        (Self::full(pages), affected)
    }

    /// Seed a fresh store from the current page list (full-build path).
    pub fn tag_sets(pages: &[PageRef]) -> TagStore {
        pages
            .iter()
            .filter(|p| p.is_listable())
            .map(|p| {
                let tags = p.tags().iter().map(|t| normalize_tag(t)).collect();
                (p.source().clone(), tags)
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&TagGroup> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagGroup)> {
        self.groups.iter()
    }

    /// Plain-data view for comparisons: (key, name, slug, member sources).
    pub fn snapshot(&self) -> Vec<(String, String, String, Vec<String>)> {
        self.groups
            .iter()
            .map(|(key, group)| {
                (
                    key.clone(),
                    group.name.clone(),
                    group.slug.clone(),
                    group
                        .pages
                        .iter()
                        .map(|p| p.source().as_str().to_owned())
                        .collect(),
                )
            })
            .collect()
    }
}

// ============================================================================
// Page Synthesis
// ============================================================================

/// Synthesize taxonomy pages for rendering.
///
/// `affected = None` means a full build: every tag gets its pages. On an
/// incremental build only the affected tags are synthesized, plus the
/// top-level tag index, which lists all tags and is always regenerated.
pub fn synthesize_pages(
    index: &TaxonomyIndex,
    affected: Option<&BTreeSet<String>>,
    config: &SiteConfig,
) -> Vec<PageRef> {
    let keys: Vec<&String> = match affected {
        // Tags whose bucket became empty are already gone from the index.
        Some(affected) => index
            .groups
            .keys()
            .filter(|key| affected.contains(*key))
            .collect(),
        None => index.groups.keys().collect(),
    };

    let mut pages: Vec<PageRef> = vec![tag_index_page(index, config)];

    let synth = |key: &&String| -> Vec<PageRef> {
        tag_group_pages(&index.groups[*key], config)
    };

    let tag_pages: Vec<Vec<PageRef>> = if keys.len() > PARALLEL_TAG_THRESHOLD {
        keys.par_iter().map(synth).collect()
    } else {
        keys.iter().map(synth).collect()
    };

    pages.extend(tag_pages.into_iter().flatten());
    pages
}

/// Number of listing pages for a bucket of `entries` at `page_size`.
pub const fn page_count(entries: usize, page_size: usize) -> usize {
    entries.div_ceil(page_size)
}

/// The top-level tag index page, listing every tag with its entry count.
fn tag_index_page(index: &TaxonomyIndex, config: &SiteConfig) -> PageRef {
    let tags: Vec<toml::Value> = index
        .groups
        .values()
        .map(|group| {
            let mut table = toml::value::Table::new();
            table.insert("name".into(), toml::Value::String(group.name.clone()));
            table.insert("slug".into(), toml::Value::String(group.slug.clone()));
            table.insert(
                "count".into(),
                toml::Value::Integer(group.pages.len() as i64),
            );
            toml::Value::Table(table)
        })
        .collect();

    let mut props = MetaMap::new();
    props.insert("tags".into(), toml::Value::Array(tags));

    let child_count = index.len();
    Arc::new(generated_entity(
        RelPath::new("tags"),
        "Tags".to_owned(),
        PageKind::TagIndex,
        child_count,
        props,
        config,
    ))
}

/// Paginated listing pages for one tag bucket.
fn tag_group_pages(group: &TagGroup, config: &SiteConfig) -> Vec<PageRef> {
    let page_size = config.build.page_size;
    let total = page_count(group.pages.len(), page_size);

    (0..total)
        .map(|n| {
            let chunk = &group.pages[n * page_size..((n + 1) * page_size).min(group.pages.len())];
            let entries: Vec<toml::Value> = chunk
                .iter()
                .map(|page| {
                    let mut table = toml::value::Table::new();
                    table.insert("title".into(), toml::Value::String(page.title().to_owned()));
                    table.insert(
                        "url".into(),
                        toml::Value::String(crate::urls::compute_url(page.as_ref(), config)),
                    );
                    if let Some(date) = page.date() {
                        table.insert("date".into(), toml::Value::String(date.to_string()));
                    }
                    toml::Value::Table(table)
                })
                .collect();

            let mut props = MetaMap::new();
            props.insert("tag".into(), toml::Value::String(group.name.clone()));
            props.insert("entries".into(), toml::Value::Array(entries));
            props.insert("page".into(), toml::Value::Integer((n + 1) as i64));
            props.insert("total_pages".into(), toml::Value::Integer(total as i64));

            let source = RelPath::new(format!("tags/{}/{}", group.slug, n + 1));
            let page: PageRef = Arc::new(generated_entity(
                source,
                group.name.clone(),
                PageKind::TagPage,
                chunk.len(),
                props,
                config,
            ));
            page
        })
        .collect()
}

/// Build a synthesized entity with plain-data props as its only payload.
fn generated_entity(
    source: RelPath,
    title: String,
    kind: PageKind,
    child_count: usize,
    props: MetaMap,
    config: &SiteConfig,
) -> Entity {
    // Hash the props so the render-cache fingerprint tracks listing changes.
    let serialized = toml::to_string(&props).unwrap_or_default();
    let slug = slugify(&title);
    let core = Core {
        source,
        title,
        date: None,
        tags: Vec::new(),
        slug,
        weight: 0,
        lang: config.base.language.clone(),
        props,
        content_hash: crate::cache::hash_bytes(serialized.as_bytes()),
    };

    let mut entity = Entity::from_core(core);
    entity.kind = kind;
    entity.child_count = child_count;
    entity
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MetaMap;

    fn page(path: &str, date: Option<&str>, tags: &[&str]) -> PageRef {
        let mut meta = MetaMap::new();
        if let Some(date) = date {
            meta.insert("date".into(), toml::Value::String(date.into()));
        }
        meta.insert(
            "tags".into(),
            toml::Value::Array(
                tags.iter()
                    .map(|t| toml::Value::String((*t).to_owned()))
                    .collect(),
            ),
        );
        let core = Core::from_metadata(RelPath::new(path), meta, "h".into());
        Arc::new(Entity::from_core(core))
    }

    fn sources(group: &TagGroup) -> Vec<&str> {
        group.pages.iter().map(|p| p.source().as_str()).collect()
    }

    #[test]
    fn test_full_recompute_buckets() {
        let pages = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-02-01"), &["x", "y"]),
            page("c.md", Some("2024-03-01"), &["y"]),
        ];
        let index = TaxonomyIndex::full(&pages);

        assert_eq!(index.len(), 2);
        assert_eq!(sources(index.get("x").unwrap()), vec!["b.md", "a.md"]);
        assert_eq!(sources(index.get("y").unwrap()), vec!["c.md", "b.md"]);
    }

    #[test]
    fn test_date_descending_undated_last() {
        let pages = vec![
            page("undated.md", None, &["x"]),
            page("new.md", Some("2024-06-01"), &["x"]),
            page("old.md", Some("2020-01-01"), &["x"]),
        ];
        let index = TaxonomyIndex::full(&pages);
        assert_eq!(
            sources(index.get("x").unwrap()),
            vec!["new.md", "old.md", "undated.md"]
        );
    }

    #[test]
    fn test_tags_normalized_into_one_bucket() {
        let pages = vec![
            page("a.md", Some("2024-01-01"), &["Rust"]),
            page("b.md", Some("2024-01-02"), &[" rust "]),
        ];
        let index = TaxonomyIndex::full(&pages);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("rust").unwrap().pages.len(), 2);
        // Display name comes from the first occurrence.
        assert_eq!(index.get("rust").unwrap().name, "Rust");
    }

    #[test]
    fn test_drafts_excluded() {
        let mut meta = MetaMap::new();
        meta.insert("draft".into(), toml::Value::Boolean(true));
        meta.insert(
            "tags".into(),
            toml::Value::Array(vec![toml::Value::String("x".into())]),
        );
        let draft: PageRef = Arc::new(Entity::from_core(Core::from_metadata(
            RelPath::new("d.md"),
            meta,
            "h".into(),
        )));

        let index = TaxonomyIndex::full(&[draft]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_retag_updates_affected_buckets() {
        // A(x), B(x,y), C(y); then B retagged to z.
        let before = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["x", "y"]),
            page("c.md", Some("2024-01-03"), &["y"]),
        ];
        let full = TaxonomyIndex::full(&before);
        assert_eq!(sources(full.get("x").unwrap()), vec!["b.md", "a.md"]);
        assert_eq!(sources(full.get("y").unwrap()), vec!["c.md", "b.md"]);

        let mut store = TaxonomyIndex::tag_sets(&before);

        let after = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["z"]),
            page("c.md", Some("2024-01-03"), &["y"]),
        ];
        let changed = HashSet::from([RelPath::new("b.md")]);
        let (index, affected) = TaxonomyIndex::incremental(&after, &changed, &mut store);

        assert_eq!(
            affected,
            BTreeSet::from(["x".to_owned(), "y".to_owned(), "z".to_owned()])
        );
        assert_eq!(sources(index.get("x").unwrap()), vec!["a.md"]);
        assert_eq!(sources(index.get("y").unwrap()), vec!["c.md"]);
        assert_eq!(sources(index.get("z").unwrap()), vec!["b.md"]);
        assert_eq!(store[&RelPath::new("b.md")], BTreeSet::from(["z".to_owned()]));
    }

    #[test]
    fn test_incremental_matches_full() {
        let before = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["x", "y"]),
        ];
        let mut store = TaxonomyIndex::tag_sets(&before);

        let after = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["y", "w"]),
        ];
        let changed = HashSet::from([RelPath::new("b.md")]);
        let (incremental, _) = TaxonomyIndex::incremental(&after, &changed, &mut store);
        let full = TaxonomyIndex::full(&after);

        assert_eq!(incremental.snapshot(), full.snapshot());
    }

    #[test]
    fn test_deleted_path_loses_all_tags() {
        let before = vec![page("b.md", Some("2024-01-01"), &["x", "y"])];
        let mut store = TaxonomyIndex::tag_sets(&before);

        let after: Vec<PageRef> = Vec::new();
        let changed = HashSet::from([RelPath::new("b.md")]);
        let (index, affected) = TaxonomyIndex::incremental(&after, &changed, &mut store);

        assert_eq!(affected, BTreeSet::from(["x".to_owned(), "y".to_owned()]));
        // Empty buckets are dropped from the index entirely.
        assert!(index.is_empty());
        assert!(!store.contains_key(&RelPath::new("b.md")));
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }

    #[test]
    fn test_synthesize_full() {
        let mut config = SiteConfig::default();
        config.build.page_size = 2;
        let pages = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["x"]),
            page("c.md", Some("2024-01-03"), &["x"]),
        ];
        let index = TaxonomyIndex::full(&pages);
        let synthesized = synthesize_pages(&index, None, &config);

        // 1 tag index + ceil(3/2) = 2 tag pages.
        assert_eq!(synthesized.len(), 3);
        assert!(synthesized.iter().all(|p| p.is_generated()));
        assert_eq!(synthesized[0].kind(), PageKind::TagIndex);
        assert_eq!(synthesized[0].child_count(), 1);

        let first = &synthesized[1];
        assert_eq!(first.source().as_str(), "tags/x/1");
        assert_eq!(first.child_count(), 2);
    }

    #[test]
    fn test_synthesize_affected_only() {
        let config = SiteConfig::default();
        let pages = vec![
            page("a.md", Some("2024-01-01"), &["x"]),
            page("b.md", Some("2024-01-02"), &["y"]),
        ];
        let index = TaxonomyIndex::full(&pages);

        let affected = BTreeSet::from(["y".to_owned()]);
        let synthesized = synthesize_pages(&index, Some(&affected), &config);

        // Tag index always regenerates; only y's listing page is rebuilt.
        assert_eq!(synthesized.len(), 2);
        assert_eq!(synthesized[0].kind(), PageKind::TagIndex);
        assert_eq!(synthesized[1].source().as_str(), "tags/y/1");
    }
}
