//! Template rendering seam.
//!
//! The pipeline talks to templates only through [`TemplateEngine`], keyed by
//! template id (`page`, `tag_index`, `tag_page`) and fed a flat string
//! context. The built-in [`SubstitutionEngine`] loads `<id>.html` files from
//! the templates directory and replaces `{{ key }}` placeholders; unknown
//! placeholders render as empty rather than failing the page.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Flat key/value rendering context for one page.
pub type TemplateContext = BTreeMap<String, String>;

pub trait TemplateEngine: Send + Sync {
    /// Render one page with the named template.
    fn render(&self, template_id: &str, context: &TemplateContext) -> Result<String>;
}

/// Minimal `{{ key }}` substitution over templates loaded at startup.
pub struct SubstitutionEngine {
    templates: HashMap<String, String>,
}

impl SubstitutionEngine {
    /// Load every `*.html` file in `dir` as a template named by its stem.
    ///
    /// A missing directory yields an engine with built-in fallbacks only,
    /// so a bare site still renders.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        if dir.is_dir() {
            for entry in fs::read_dir(dir)
                .with_context(|| format!("failed to read templates dir {}", dir.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "html") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let body = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read template {}", path.display()))?;
                templates.insert(stem.to_owned(), body);
            }
        }
        Ok(Self { templates })
    }

    fn template(&self, id: &str) -> &str {
        self.templates
            .get(id)
            .map_or(FALLBACK_TEMPLATE, String::as_str)
    }
}

impl TemplateEngine for SubstitutionEngine {
    fn render(&self, template_id: &str, context: &TemplateContext) -> Result<String> {
        Ok(substitute(self.template(template_id), context))
    }
}

const FALLBACK_TEMPLATE: &str = "<!doctype html>\n<html lang=\"{{ lang }}\">\n<head><meta charset=\"utf-8\"><title>{{ title }} | {{ site_title }}</title></head>\n<body>\n<main>{{ content }}</main>\n</body>\n</html>\n";

/// Replace every `{{ key }}` placeholder; unknown keys become empty.
fn substitute(template: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = context.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unclosed placeholder: emit literally.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Tests
// ============================================================================
