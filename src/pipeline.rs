//! Build orchestration.
//!
//! Runs the phases of one site build in order and owns every piece of
//! mutable cross-phase state:
//!
//! ```text
//! build_site()
//!     │
//!     ├── BuildCache::load() ──► persisted path→metadata / path→tags maps
//!     │
//!     ├── discovery::discover() ──► proxies for hits, entities for misses
//!     │
//!     ├── TaxonomyIndex ──► full on a cold cache, incremental otherwise
//!     │       └── synthesize tag index + affected tag pages
//!     │
//!     ├── render ──► every page, RenderCache consulted first
//!     │       └── keys are content fingerprints; hits skip template work
//!     │
//!     └── BuildCache::save() ──► plain data only, for the next run
//! ```
//!
//! Per-page failures (parse or render) are aggregated and reported at the
//! end; one bad page never aborts the rest of the build.

use crate::{
    cache::BuildCache,
    config::SiteConfig,
    content::{Entity, PageKind, PageRef, RelPath},
    discovery,
    log,
    logger::ProgressBars,
    parser::FrontMatterParser,
    render::{self, RenderCache},
    taxonomy::{self, TaxonomyIndex},
    template::{SubstitutionEngine, TemplateContext, TemplateEngine},
    urls::slugify,
    views::DerivedViewCache,
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fs,
    path::Path,
    sync::Arc,
};

/// Below this many pages to render, rendering stays in the caller's thread.
pub const PARALLEL_RENDER_THRESHOLD: usize = 3;

/// Per-category cap on logged warnings; the rest are counted silently.
const MAX_WARNINGS_PER_CATEGORY: usize = 5;

/// Outcome of one build, for logging and exit-code decisions.
pub struct BuildReport {
    pub total_pages: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub rendered: usize,
    /// Per-page parse and render failures, in discovery order.
    pub failures: Vec<(RelPath, String)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run one full build with a throwaway render cache.
///
/// `force` lists source paths that must be re-parsed regardless of cache
/// state (watch mode passes the edited files here).
pub fn build_site(config: &SiteConfig, force: &HashSet<RelPath>) -> Result<BuildReport> {
    let render_cache = RenderCache::new(config.build.render_cache_size);
    build_site_with(config, force, &render_cache)
}

/// Run one full build against a caller-owned render cache.
///
/// Watch mode keeps one cache across rebuilds so unchanged (template, page)
/// pairs skip template evaluation entirely.
pub fn build_site_with(
    config: &SiteConfig,
    force: &HashSet<RelPath>,
    render_cache: &RenderCache,
) -> Result<BuildReport> {
    if config.build.clean {
        clean_outputs(config)?;
    }

    // A present-but-corrupt cache file is fatal, not silently ignored.
    let mut cache = BuildCache::load(&config.cache_path())?;
    let cold_cache = cache.pages.is_empty() && cache.tags.is_empty();

    // ========================================================================
    // Discovery
    // ========================================================================

    let outcome = discovery::discover(config, &cache, force, Arc::new(FrontMatterParser), || {})?;
    log!(
        "discover";
        "{} pages ({} cached, {} parsed)",
        outcome.pages.len(),
        outcome.hits,
        outcome.misses
    );

    let live: HashSet<RelPath> = outcome
        .pages
        .iter()
        .map(|p| p.source().clone())
        .collect();

    // Changed set for the taxonomy diff: freshly parsed paths, failed paths
    // (absent from listings this run), and paths deleted since last build.
    let mut changed: HashSet<RelPath> = outcome.fresh.clone();
    changed.extend(outcome.failures.iter().map(|(path, _)| path.clone()));
    changed.extend(
        cache
            .pages
            .keys()
            .filter(|path| !live.contains(*path))
            .cloned(),
    );

    let views = DerivedViewCache::new(outcome.pages);

    // ========================================================================
    // Taxonomy
    // ========================================================================

    let listable = views.listable();
    let (index, affected) = if cold_cache {
        let index = TaxonomyIndex::full(&listable);
        cache.tags = TaxonomyIndex::tag_sets(&listable);
        (index, None)
    } else {
        let (index, affected) = TaxonomyIndex::incremental(&listable, &changed, &mut cache.tags);
        (index, Some(affected))
    };
    log!(
        "taxonomy";
        "{} tags{}",
        index.len(),
        match &affected {
            Some(affected) => format!(", {} affected", affected.len()),
            None => String::new(),
        }
    );

    let synthesized = taxonomy::synthesize_pages(&index, affected.as_ref(), config);

    // Full page list for derived views: real pages plus synthesized ones.
    let mut all_pages: Vec<PageRef> = views.pages().as_ref().clone();
    all_pages.extend(synthesized.iter().cloned());
    views.set_pages(all_pages);

    // ========================================================================
    // Render
    // ========================================================================

    // Every page goes to the renderer; the render cache decides which ones
    // actually pay for template evaluation. Rewriting hits keeps the output
    // tree identical to a full rebuild, template edits and manually deleted
    // output files included.
    let mut targets: Vec<PageRef> = views.regular().as_ref().clone();
    targets.extend(synthesized);

    let engine = SubstitutionEngine::from_dir(&config.templates_dir())?;

    let mut failures = outcome.failures;
    let rendered = render_pages(&targets, config, &engine, render_cache, &mut failures);

    // ========================================================================
    // Persist
    // ========================================================================

    for page in views.regular().iter() {
        if outcome.fresh.contains(page.source()) {
            cache.update_page(page.core().clone());
        }
    }
    prune_stale_outputs(&cache, &live, &index, affected.as_ref(), config);
    cache.retain_paths(&live);
    cache.save(&config.cache_path())?;

    for (path, message) in &failures {
        log!("error"; "{}: {}", path.as_str(), message);
    }

    Ok(BuildReport {
        total_pages: views.regular().len(),
        cache_hits: outcome.hits,
        cache_misses: outcome.misses,
        rendered,
        failures,
    })
}

/// Render a batch of pages to their output files.
///
/// Returns the number of pages written. Failures land in `failures` and do
/// not stop the batch; warnings are capped per category so one systematic
/// problem cannot flood the terminal.
fn render_pages(
    targets: &[PageRef],
    config: &SiteConfig,
    engine: &dyn TemplateEngine,
    render_cache: &RenderCache,
    failures: &mut Vec<(RelPath, String)>,
) -> usize {
    let progress = ProgressBars::new_filtered(&[("render", targets.len())]);
    let warnings = WarningCounter::new(MAX_WARNINGS_PER_CATEGORY);
    let batch_failures: Mutex<Vec<(RelPath, String)>> = Mutex::new(Vec::new());

    let render_one = |page: &PageRef| {
        if let Err(err) = render_page(page, config, engine, render_cache) {
            warnings.warn("render", &format!("{}: {err:#}", page.source().as_str()));
            batch_failures
                .lock()
                .push((page.source().clone(), format!("{err:#}")));
        }
        if let Some(progress) = &progress {
            progress.inc_by_name("render");
        }
    };

    if targets.len() > PARALLEL_RENDER_THRESHOLD {
        targets.par_iter().for_each(render_one);
    } else {
        targets.iter().for_each(render_one);
    }

    if let Some(progress) = progress {
        progress.finish();
    }

    let batch_failures = batch_failures.into_inner();
    let rendered = targets.len() - batch_failures.len();
    failures.extend(batch_failures);
    rendered
}

/// Render one page through the cache and write its output file.
fn render_page(
    page: &PageRef,
    config: &SiteConfig,
    engine: &dyn TemplateEngine,
    render_cache: &RenderCache,
) -> Result<()> {
    let template_id = template_for(page.kind());
    let key = render::render_key(template_id, page.as_ref());

    let html = match render_cache.get(&key) {
        Some(html) => html,
        None => {
            let context = page_context(page, config)?;
            let html = engine.render(template_id, &context)?;
            render_cache.insert(key, html.clone());
            html
        }
    };

    let output = crate::urls::compute_output_path(page.as_ref(), config);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, html).with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

const fn template_for(kind: PageKind) -> &'static str {
    match kind {
        PageKind::Content => "page",
        PageKind::TagIndex => "tag_index",
        PageKind::TagPage => "tag_page",
    }
}

/// Flat template context for one page.
///
/// Content pages materialize here: `html()` is the first expensive-field
/// access, so a proxy that reaches this point loads exactly once.
fn page_context(page: &PageRef, config: &SiteConfig) -> Result<TemplateContext> {
    let mut context = TemplateContext::new();
    context.insert("title".into(), page.title().to_owned());
    context.insert("url".into(), crate::urls::compute_url(page.as_ref(), config));
    context.insert("lang".into(), page.core().lang.clone());
    context.insert("site_title".into(), config.base.title.clone());
    context.insert("site_description".into(), config.base.description.clone());

    if let Some(date) = page.date() {
        context.insert("date".into(), date.to_string());
    }
    if !page.tags().is_empty() {
        context.insert("tags".into(), page.tags().join(", "));
    }

    let content = match page.kind() {
        PageKind::Content => page.html()?.to_owned(),
        PageKind::TagIndex => tag_index_html(page, config),
        PageKind::TagPage => tag_page_html(page),
    };
    context.insert("content".into(), content);

    if page.kind() == PageKind::TagPage {
        let props = &page.core().props;
        for key in ["page", "total_pages"] {
            if let Some(value) = props.get(key).and_then(toml::Value::as_integer) {
                context.insert(key.into(), value.to_string());
            }
        }
    }

    Ok(context)
}

/// Listing body for the synthesized tag index.
fn tag_index_html(page: &PageRef, config: &SiteConfig) -> String {
    let base = config
        .base
        .url
        .as_deref()
        .map_or(String::new(), |url| url.trim_end_matches('/').to_owned());

    let mut out = String::from("<ul class=\"tags\">\n");
    if let Some(tags) = page.core().props.get("tags").and_then(toml::Value::as_array) {
        for tag in tags {
            let name = tag.get("name").and_then(toml::Value::as_str).unwrap_or("");
            let slug = tag.get("slug").and_then(toml::Value::as_str).unwrap_or("");
            let count = tag.get("count").and_then(toml::Value::as_integer).unwrap_or(0);
            out.push_str(&format!(
                "<li><a href=\"{base}/tags/{slug}/\">{name}</a> ({count})</li>\n"
            ));
        }
    }
    out.push_str("</ul>\n");
    out
}

/// Listing body for one synthesized tag page.
fn tag_page_html(page: &PageRef) -> String {
    let mut out = String::from("<ul class=\"entries\">\n");
    if let Some(entries) = page
        .core()
        .props
        .get("entries")
        .and_then(toml::Value::as_array)
    {
        for entry in entries {
            let title = entry.get("title").and_then(toml::Value::as_str).unwrap_or("");
            let url = entry.get("url").and_then(toml::Value::as_str).unwrap_or("");
            out.push_str(&format!("<li><a href=\"{url}\">{title}</a>"));
            if let Some(date) = entry.get("date").and_then(toml::Value::as_str) {
                out.push_str(&format!(" <time>{date}</time>"));
            }
            out.push_str("</li>\n");
        }
    }
    out.push_str("</ul>\n");
    out
}

/// Remove the persisted cache and the output directory before a rebuild.
fn clean_outputs(config: &SiteConfig) -> Result<()> {
    let cache_path = config.cache_path();
    if cache_path.exists() {
        fs::remove_file(&cache_path)
            .with_context(|| format!("failed to remove {}", cache_path.display()))?;
    }
    let output = config.output_dir();
    if output.exists() {
        fs::remove_dir_all(&output)
            .with_context(|| format!("failed to clear {}", output.display()))?;
    }
    Ok(())
}

/// Remove output files a full rebuild would not produce: pages deleted since
/// the last run, listing pages past a shrunken page count, and directories
/// of tags whose bucket emptied out.
///
/// Must run while the cache still holds the deleted entries, i.e. before
/// `retain_paths`. Best-effort: a file that cannot be removed is left for
/// the next `--clean`.
fn prune_stale_outputs(
    cache: &BuildCache,
    live: &HashSet<RelPath>,
    index: &TaxonomyIndex,
    affected: Option<&BTreeSet<String>>,
    config: &SiteConfig,
) {
    for (path, core) in &cache.pages {
        if live.contains(path) {
            continue;
        }
        let page = Entity::from_core(core.clone());
        remove_output_file(&crate::urls::compute_output_path(&page, config), config);
    }

    let Some(affected) = affected else { return };
    let tags_dir = config.output_dir().join("tags");
    for key in affected {
        match index.get(key) {
            Some(group) => {
                // Listing pages past the current count, left over from a
                // bucket that shrank across a pagination boundary.
                let total = taxonomy::page_count(group.pages.len(), config.build.page_size);
                let mut n = total + 1;
                loop {
                    let dir = tags_dir.join(&group.slug).join(n.to_string());
                    if !dir.exists() {
                        break;
                    }
                    let _ = fs::remove_dir_all(&dir);
                    n += 1;
                }
            }
            None => {
                let dir = tags_dir.join(slugify(key));
                if dir.exists() {
                    let _ = fs::remove_dir_all(&dir);
                }
            }
        }
    }
}

fn remove_output_file(output: &Path, config: &SiteConfig) {
    if output.exists() {
        let _ = fs::remove_file(output);
    }
    if let Some(parent) = output.parent()
        && parent != config.output_dir()
    {
        // Drops the page's now-empty slug directory; non-empty ones stay.
        let _ = fs::remove_dir(parent);
    }
}

// ============================================================================
// Warning Counter
// ============================================================================

/// Per-category warning throttle owned by the build, not a global.
struct WarningCounter {
    counts: Mutex<HashMap<String, usize>>,
    cap: usize,
}

impl WarningCounter {
    fn new(cap: usize) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            cap,
        }
    }

    fn warn(&self, category: &str, message: &str) {
        let mut counts = self.counts.lock();
        let count = counts.entry(category.to_owned()).or_insert(0);
        *count += 1;
        match (*count).cmp(&self.cap) {
            std::cmp::Ordering::Less => log!("error"; "{message}"),
            std::cmp::Ordering::Equal => {
                log!("error"; "{message}");
                log!("error"; "further {category} warnings suppressed");
            }
            std::cmp::Ordering::Greater => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(dir: &TempDir) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.set_root(dir.path());
        fs::create_dir_all(config.content_dir()).unwrap();
        config
    }

    fn write_post(config: &SiteConfig, rel: &str, title: &str, tags: &[&str]) {
        let abs = config.content_dir().join(rel);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let tag_list = tags
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            &abs,
            format!(
                "+++\ntitle = \"{title}\"\ndate = \"2024-05-01\"\ntags = [{tag_list}]\n+++\nbody of {title}\n"
            ),
        )
        .unwrap();
    }

    fn read_output(config: &SiteConfig, rel: &str) -> String {
        fs::read_to_string(config.output_dir().join(rel)).unwrap()
    }

    #[test]
    fn test_cold_build_renders_everything() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "posts/hello.md", "Hello", &["rust"]);
        write_post(&config, "about.md", "About", &[]);

        let report = build_site(&config, &HashSet::new()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.total_pages, 2);
        assert_eq!(report.cache_misses, 2);
        // 2 content pages + tag index + 1 tag page.
        assert_eq!(report.rendered, 4);

        assert!(read_output(&config, "posts/hello/index.html").contains("body of Hello"));
        assert!(read_output(&config, "tags/index.html").contains("rust"));
        assert!(read_output(&config, "tags/rust/index.html").contains("Hello"));
        assert!(config.cache_path().exists());
    }

    #[test]
    fn test_warm_build_hits_cache() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "posts/hello.md", "Hello", &["rust"]);

        build_site(&config, &HashSet::new()).unwrap();
        let report = build_site(&config, &HashSet::new()).unwrap();

        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.cache_misses, 0);
        // Nothing changed: no tag is affected. The content page and the tag
        // index are still written out; the per-tag page is not synthesized.
        assert_eq!(report.rendered, 2);
    }

    #[test]
    fn test_edit_rebuilds_only_affected() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &["x"]);
        write_post(&config, "b.md", "B", &["x", "y"]);
        write_post(&config, "c.md", "C", &["y"]);
        build_site(&config, &HashSet::new()).unwrap();

        // Retag B from [x, y] to [z].
        write_post(&config, "b.md", "B", &["z"]);
        let report = build_site(&config, &HashSet::new()).unwrap();

        assert_eq!(report.cache_hits, 2);
        assert_eq!(report.cache_misses, 1);
        // 3 content pages + tag index + pages for affected x, y, z.
        assert_eq!(report.rendered, 7);

        assert!(!read_output(&config, "tags/x/index.html").contains("B"));
        assert!(read_output(&config, "tags/z/index.html").contains("B"));
        assert!(read_output(&config, "tags/index.html").contains("z"));
    }

    #[test]
    fn test_deleted_page_drops_out() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &["x"]);
        write_post(&config, "b.md", "B", &["x"]);
        build_site(&config, &HashSet::new()).unwrap();
        assert!(config.output_dir().join("b/index.html").exists());

        fs::remove_file(config.content_dir().join("b.md")).unwrap();
        let report = build_site(&config, &HashSet::new()).unwrap();

        assert_eq!(report.total_pages, 1);
        assert!(!read_output(&config, "tags/x/index.html").contains("B"));
        // The stale output file goes away with the page.
        assert!(!config.output_dir().join("b/index.html").exists());
        assert!(!config.output_dir().join("b").exists());

        // The persisted cache forgets the deleted path entirely.
        let cache = BuildCache::load(&config.cache_path()).unwrap();
        assert!(!cache.pages.contains_key(&RelPath::new("b.md")));
        assert!(!cache.tags.contains_key(&RelPath::new("b.md")));
    }

    #[test]
    fn test_template_edit_applies_to_unchanged_pages() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &[]);
        build_site(&config, &HashSet::new()).unwrap();

        fs::create_dir_all(config.templates_dir()).unwrap();
        fs::write(
            config.templates_dir().join("page.html"),
            "<main class=\"v2\">{{ content }}</main>",
        )
        .unwrap();

        // The page is a cache hit, yet its output must pick up the template.
        build_site(&config, &HashSet::new()).unwrap();
        assert!(read_output(&config, "a/index.html").starts_with("<main class=\"v2\">"));
    }

    #[test]
    fn test_deleted_output_file_is_restored() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &[]);
        build_site(&config, &HashSet::new()).unwrap();

        fs::remove_file(config.output_dir().join("a/index.html")).unwrap();
        build_site(&config, &HashSet::new()).unwrap();
        assert!(read_output(&config, "a/index.html").contains("body of A"));
    }

    #[test]
    fn test_shrunk_pagination_prunes_extra_pages() {
        let dir = TempDir::new().unwrap();
        let mut config = site(&dir);
        config.build.page_size = 1;
        write_post(&config, "a.md", "A", &["x"]);
        write_post(&config, "b.md", "B", &["x"]);
        build_site(&config, &HashSet::new()).unwrap();
        assert!(config.output_dir().join("tags/x/2/index.html").exists());

        fs::remove_file(config.content_dir().join("b.md")).unwrap();
        build_site(&config, &HashSet::new()).unwrap();

        assert!(!config.output_dir().join("tags/x/2").exists());
        assert!(!read_output(&config, "tags/x/index.html").contains("B"));
    }

    #[test]
    fn test_emptied_tag_directory_removed() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &["solo"]);
        build_site(&config, &HashSet::new()).unwrap();
        assert!(config.output_dir().join("tags/solo/index.html").exists());

        write_post(&config, "a.md", "A", &[]);
        build_site(&config, &HashSet::new()).unwrap();

        assert!(!config.output_dir().join("tags/solo").exists());
        assert!(!read_output(&config, "tags/index.html").contains("solo"));
    }

    #[test]
    fn test_force_reparses_unchanged_file() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &[]);
        build_site(&config, &HashSet::new()).unwrap();

        let force = HashSet::from([RelPath::new("a.md")]);
        let report = build_site(&config, &force).unwrap();
        assert_eq!(report.cache_misses, 1);
        assert_eq!(report.cache_hits, 0);
    }

    #[test]
    fn test_parse_failure_is_aggregated_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "good.md", "Good", &[]);
        fs::write(config.content_dir().join("bad.md"), "+++\nnever closed\n").unwrap();

        let report = build_site(&config, &HashSet::new()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0.as_str(), "bad.md");
        // The good page still built.
        assert!(read_output(&config, "good/index.html").contains("Good"));
    }

    #[test]
    fn test_clean_discards_cache() {
        let dir = TempDir::new().unwrap();
        let mut config = site(&dir);
        write_post(&config, "a.md", "A", &[]);
        build_site(&config, &HashSet::new()).unwrap();

        config.build.clean = true;
        let report = build_site(&config, &HashSet::new()).unwrap();
        assert_eq!(report.cache_hits, 0);
        assert_eq!(report.cache_misses, 1);
    }

    #[test]
    fn test_custom_template_used() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        fs::create_dir_all(config.templates_dir()).unwrap();
        fs::write(
            config.templates_dir().join("page.html"),
            "<article data-title=\"{{ title }}\">{{ content }}</article>",
        )
        .unwrap();
        write_post(&config, "a.md", "A", &[]);

        build_site(&config, &HashSet::new()).unwrap();
        let html = read_output(&config, "a/index.html");
        assert!(html.starts_with("<article data-title=\"A\">"));
    }

    #[test]
    fn test_shared_render_cache_survives_rebuilds() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &["x"]);

        let render_cache = RenderCache::new(config.build.render_cache_size);
        build_site_with(&config, &HashSet::new(), &render_cache).unwrap();
        let after_first = render_cache.len();
        assert!(after_first > 0);

        // Forcing an unchanged file reproduces the same fingerprints, so the
        // second build adds nothing new to the cache.
        let force = HashSet::from([RelPath::new("a.md")]);
        build_site_with(&config, &force, &render_cache).unwrap();
        assert_eq!(render_cache.len(), after_first);
    }

    #[test]
    fn test_warning_counter_caps() {
        let counter = WarningCounter::new(2);
        for _ in 0..5 {
            counter.warn("render", "boom");
        }
        assert_eq!(counter.counts.lock()["render"], 5);
    }

    #[test]
    fn test_tag_listing_html() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "First Post", &["rust"]);
        build_site(&config, &HashSet::new()).unwrap();

        let listing = read_output(&config, "tags/rust/index.html");
        assert!(listing.contains("<a href=\"/first-post/\">First Post</a>"));
        assert!(listing.contains("<time>2024-05-01</time>"));
    }

    #[test]
    fn test_corrupt_cache_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        write_post(&config, "a.md", "A", &[]);
        fs::write(config.cache_path(), "{broken").unwrap();

        assert!(build_site(&config, &HashSet::new()).is_err());
    }
}
