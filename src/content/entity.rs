//! Fully materialized content pages.

use super::core::Core;
use super::{Page, PageKind};
use anyhow::Result;
use std::hash::{Hash, Hasher};

/// One entry in a page's table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level, 1-6.
    pub level: u8,
    pub title: String,
    /// Slugified anchor id.
    pub id: String,
}

/// A fully materialized page: [`Core`] metadata plus the heavy fields.
///
/// Equality and hashing go by source path only. Body and HTML are filled in
/// at different pipeline stages, and pages must stay valid set/map keys
/// throughout, so none of those fields may participate.
#[derive(Debug, Clone)]
pub struct Entity {
    pub core: Core,
    pub raw_body: String,
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Kind override for synthesized taxonomy pages.
    pub kind: PageKind,
    /// Number of listed children, non-zero only for listing pages.
    pub child_count: usize,
}

impl Entity {
    /// A materialized page with no heavy fields populated yet.
    pub fn from_core(core: Core) -> Self {
        Self {
            core,
            raw_body: String::new(),
            html: String::new(),
            toc: Vec::new(),
            kind: PageKind::Content,
            child_count: 0,
        }
    }

    /// Section name, i.e. the first component of the source path.
    pub fn section(&self) -> Option<&str> {
        self.core.source.section()
    }
}

impl Page for Entity {
    fn core(&self) -> &Core {
        &self.core
    }

    fn kind(&self) -> PageKind {
        self.kind
    }

    fn child_count(&self) -> usize {
        self.child_count
    }

    fn raw_body(&self) -> Result<&str> {
        Ok(&self.raw_body)
    }

    fn html(&self) -> Result<&str> {
        Ok(&self.html)
    }

    fn toc(&self) -> Result<&[TocEntry]> {
        Ok(&self.toc)
    }
}

// Identity is the normalized source path, nothing else. This must hold even
// mid-mutation so entities stay usable as set/map keys while the pipeline is
// still filling in heavy fields.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.core.source == other.core.source
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.source.hash(state);
    }
}
