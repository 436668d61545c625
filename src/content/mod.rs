//! Content entity model: cached cores, materialized entities, lazy proxies.
//!
//! The pipeline never cares which concrete form a page takes:
//!
//! ```text
//! discovery hit  ──► Proxy (Core + on-demand loader)  ─┐
//! discovery miss ──► Entity (full parse)              ─┼──► dyn Page
//! taxonomy pages ──► Entity (synthesized, generated)  ─┘
//! ```
//!
//! [`Page`] is the capability surface shared by [`Entity`] and [`Proxy`].
//! Cheap accessors never touch the file system; expensive accessors may
//! trigger a one-time materialization on a `Proxy`.

pub mod core;
pub mod entity;
pub mod proxy;

pub use self::core::{Core, MetaMap, RelPath};
pub use self::entity::{Entity, TocEntry};
pub use self::proxy::Proxy;

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;

/// Shared handle to any page in the current build.
pub type PageRef = Arc<dyn Page>;

/// Coarse page classification, part of the render-cache fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Regular content page from a source file.
    Content,
    /// Synthesized top-level tag index.
    TagIndex,
    /// Synthesized per-tag listing page.
    TagPage,
}

impl PageKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::TagIndex => "tag-index",
            Self::TagPage => "tag-page",
        }
    }
}

/// Capability surface shared by [`Entity`] and [`Proxy`].
///
/// Code that only reads cheap fields or final rendered content must not be
/// able to tell the two apart. Cheap accessors are always non-blocking;
/// the expensive ones (`raw_body`, `html`, `toc`) may run the loader once
/// on a proxy and report its failure.
pub trait Page: Send + Sync {
    /// The underlying cheap-metadata record.
    fn core(&self) -> &Core;

    fn kind(&self) -> PageKind {
        PageKind::Content
    }

    /// Number of child items a listing page carries. Zero for content pages.
    fn child_count(&self) -> usize {
        0
    }

    /// Synthesized pages are excluded from taxonomy and path-map views.
    fn is_generated(&self) -> bool {
        matches!(self.kind(), PageKind::TagIndex | PageKind::TagPage)
    }

    /// Eligible for listings and tag buckets: a real, non-draft page.
    fn is_listable(&self) -> bool {
        !self.is_generated() && !self.core().is_draft()
    }

    // ------------------------------------------------------------------
    // Expensive fields
    // ------------------------------------------------------------------

    /// Raw source body. May materialize a proxy.
    fn raw_body(&self) -> Result<&str>;

    /// Rendered HTML body. May materialize a proxy.
    fn html(&self) -> Result<&str>;

    /// Table of contents extracted from headings. May materialize a proxy.
    fn toc(&self) -> Result<&[TocEntry]>;
}

/// Cheap-field helpers forwarded from [`Core`], available on any `dyn Page`.
impl dyn Page + '_ {
    pub fn source(&self) -> &RelPath {
        &self.core().source
    }

    pub fn title(&self) -> &str {
        &self.core().title
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.core().date
    }

    pub fn tags(&self) -> &[String] {
        &self.core().tags
    }

    pub fn slug(&self) -> &str {
        &self.core().slug
    }
}
