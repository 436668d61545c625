//! URL and output-path computation.
//!
//! Centralizes the mapping from a page to its destination file and public
//! URL so every build phase agrees on where a page lives:
//!
//! | Page                  | Output file                         | URL                 |
//! |-----------------------|-------------------------------------|---------------------|
//! | `posts/hello.md`      | `<out>/posts/hello/index.html`      | `/posts/hello/`     |
//! | `index.md`            | `<out>/index.html`                  | `/`                 |
//! | tag index             | `<out>/tags/index.html`             | `/tags/`            |
//! | tag `rust`, page 2    | `<out>/tags/rust/2/index.html`      | `/tags/rust/2/`     |

use crate::config::SiteConfig;
use crate::content::{Page, PageKind};
use deunicode::deunicode;
use std::path::PathBuf;

/// Slugify a single path segment or title.
///
/// Transliterates to ASCII, lowercases, and collapses runs of
/// non-alphanumerics into single dashes.
pub fn slugify(input: &str) -> String {
    let ascii = deunicode(input);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// URL path for a page, relative to the site root, with trailing slash.
pub fn compute_url(page: &dyn Page, config: &SiteConfig) -> String {
    let segments = url_segments(page);
    let mut url = String::from("/");
    for segment in &segments {
        url.push_str(segment);
        url.push('/');
    }
    match config.base.url.as_deref() {
        Some(base) => format!("{}{url}", base.trim_end_matches('/')),
        None => url,
    }
}

/// Destination `index.html` path for a page under the output directory.
pub fn compute_output_path(page: &dyn Page, config: &SiteConfig) -> PathBuf {
    let mut path = config.output_dir();
    for segment in url_segments(page) {
        path.push(segment);
    }
    path.join("index.html")
}

/// Slugified URL segments for a page, empty for the site root.
fn url_segments(page: &dyn Page) -> Vec<String> {
    match page.kind() {
        PageKind::TagIndex => vec!["tags".to_owned()],
        PageKind::TagPage => {
            // Virtual source: `tags/<slug>/<n>`; page 1 drops the number.
            let mut segments: Vec<String> =
                page.source().as_str().split('/').map(str::to_owned).collect();
            if segments.last().is_some_and(|last| last == "1") {
                segments.pop();
            }
            segments
        }
        PageKind::Content => {
            let source = page.source();
            if source.as_str() == "index.md" {
                return Vec::new();
            }
            let mut segments: Vec<String> = source
                .as_str()
                .split('/')
                .map(slugify)
                .collect();
            // Replace the file segment with the page's slug.
            segments.pop();
            if page.slug() != "index" {
                segments.push(page.slug().to_owned());
            }
            segments
        }
    }
}
