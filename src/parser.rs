//! Content parsing: front matter extraction and body rendering.
//!
//! The pipeline only depends on the [`ContentParser`] trait; the built-in
//! [`FrontMatterParser`] reads `+++`-delimited TOML front matter followed by
//! a markdown body. Markdown becomes HTML (and a heading table of contents)
//! only at materialization time, so cache hits never pay for it.
//!
//! ```text
//! +++
//! title = "Hello"
//! tags = ["rust"]
//! +++
//! # Heading
//! Body text.
//! ```

use crate::content::{Core, Entity, MetaMap, RelPath, TocEntry};
use crate::urls::slugify;
use anyhow::Result;
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Front-matter delimiter line.
const FRONT_MATTER_FENCE: &str = "+++";

/// Content parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error when reading `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),

    #[error("unterminated front matter in `{0}`")]
    UnterminatedFrontMatter(std::path::PathBuf),

    #[error("invalid front matter in `{0}`")]
    FrontMatter(std::path::PathBuf, #[source] toml::de::Error),
}

/// Turns a source file into raw body + front-matter mapping.
pub trait ContentParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<(String, MetaMap)>;
}

/// `+++`-delimited TOML front matter over a markdown body.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrontMatterParser;

impl ContentParser for FrontMatterParser {
    fn parse(&self, path: &Path) -> Result<(String, MetaMap)> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ParseError::Io(path.to_path_buf(), err))?;
        let (meta, body) = split_front_matter(&raw, path)?;
        Ok((body.to_owned(), meta))
    }
}

/// Split a source file into front matter and body.
///
/// Files without a leading fence are all body with empty metadata.
fn split_front_matter<'a>(raw: &'a str, path: &Path) -> Result<(MetaMap, &'a str), ParseError> {
    let Some(rest) = raw.strip_prefix(FRONT_MATTER_FENCE) else {
        return Ok((MetaMap::new(), raw));
    };
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let fence = format!("\n{FRONT_MATTER_FENCE}");
    let Some(end) = rest.find(&fence) else {
        return Err(ParseError::UnterminatedFrontMatter(path.to_path_buf()));
    };

    let front = &rest[..end];
    let body = rest[end + fence.len()..].trim_start_matches('\n');
    let meta: MetaMap = toml::from_str(front)
        .map_err(|err| ParseError::FrontMatter(path.to_path_buf(), err))?;
    Ok((meta, body))
}

// ============================================================================
// Materialization
// ============================================================================

/// Build a fully materialized [`Entity`] from parsed pieces.
///
/// This is the single place where a page's heavy fields come into being:
/// markdown rendering and table-of-contents extraction.
pub fn build_entity(
    source: RelPath,
    raw_body: String,
    meta: MetaMap,
    content_hash: String,
) -> Entity {
    let core = Core::from_metadata(source, meta, content_hash);
    let (html, toc) = render_markdown(&raw_body);

    let mut entity = Entity::from_core(core);
    entity.html = html;
    entity.toc = toc;
    entity.raw_body = raw_body;
    entity
}

/// Render markdown to HTML and collect the heading table of contents.
pub fn render_markdown(markdown: &str) -> (String, Vec<TocEntry>) {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options).collect();

    let mut toc = Vec::new();
    let mut current: Option<(u8, String)> = None;
    for event in &events {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((heading_depth(*level), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, title)) = current.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = current.take() {
                    let id = slugify(&title);
                    toc.push(TocEntry { level, title, id });
                }
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, events.into_iter());
    (out, toc)
}

const fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// ============================================================================
// Tests
// ============================================================================
