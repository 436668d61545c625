//! Site configuration management for `vela.toml`.
//!
//! # Sections
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `[base]`  | Site metadata (title, url, language)           |
//! | `[build]` | Paths, pagination, cache sizes                 |
//! | `[extra]` | User-defined custom fields                     |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! url = "https://example.com"
//!
//! [build]
//! content = "content"
//! output = "public"
//! page_size = 10
//! ```

mod error;

pub use error::ConfigError;

use crate::cli::Cli;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing vela.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (set after loading)
    #[serde(skip)]
    root: Option<PathBuf>,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: HashMap<String, toml::Value>,
}

/// Basic site information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Absolute base URL, prepended to computed URLs when set
    pub url: Option<String>,
    #[serde(default = "defaults::language")]
    pub language: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            url: None,
            language: defaults::language(),
        }
    }
}

/// Build pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Content directory, relative to root
    #[serde(default = "defaults::content")]
    pub content: PathBuf,
    /// Output directory, relative to root
    #[serde(default = "defaults::output")]
    pub output: PathBuf,
    /// Templates directory, relative to root
    #[serde(default = "defaults::templates")]
    pub templates: PathBuf,
    /// Persisted build cache file, relative to root
    #[serde(default = "defaults::cache_file")]
    pub cache_file: PathBuf,
    /// Entries per synthesized tag page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
    /// Render cache capacity (entries)
    #[serde(default = "defaults::render_cache_size")]
    pub render_cache_size: usize,
    /// Ignore the persisted cache and rebuild everything
    #[serde(default)]
    pub clean: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content: defaults::content(),
            output: defaults::output(),
            templates: defaults::templates(),
            cache_file: defaults::cache_file(),
            page_size: defaults::page_size(),
            render_cache_size: defaults::render_cache_size(),
            clean: false,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn language() -> String {
        "en".to_owned()
    }

    pub fn content() -> PathBuf {
        PathBuf::from("content")
    }

    pub fn output() -> PathBuf {
        PathBuf::from("public")
    }

    pub fn templates() -> PathBuf {
        PathBuf::from("templates")
    }

    pub fn cache_file() -> PathBuf {
        PathBuf::from(".vela-cache.json")
    }

    pub fn page_size() -> usize {
        10
    }

    pub fn render_cache_size() -> usize {
        512
    }
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_toml(&content)?;
        config.config_path = path.to_path_buf();
        config.root = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.build.page_size == 0 {
            return Err(ConfigError::Validation(
                "build.page_size must be non-zero".to_owned(),
            ));
        }
        if self.build.render_cache_size == 0 {
            return Err(ConfigError::Validation(
                "build.render_cache_size must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Apply CLI overrides on top of the file-based configuration
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(content) = &cli.content {
            self.build.content = content.clone();
        }
        if let Some(output) = &cli.output {
            self.build.output = output.clone();
        }
        if cli.clean() {
            self.build.clean = true;
        }
        if let Some(base_url) = cli.base_url() {
            self.base.url = Some(base_url.to_owned());
        }
    }

    /// Get the project root directory
    ///
    /// Defaults to the empty path (current directory) so that joined
    /// paths stay clean relative paths.
    pub fn get_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new(""))
    }

    /// Set the project root directory
    pub fn set_root(&mut self, path: &Path) {
        self.root = Some(path.to_path_buf());
    }

    /// Content directory resolved against the root
    pub fn content_dir(&self) -> PathBuf {
        self.get_root().join(&self.build.content)
    }

    /// Output directory resolved against the root
    pub fn output_dir(&self) -> PathBuf {
        self.get_root().join(&self.build.output)
    }

    /// Templates directory resolved against the root
    pub fn templates_dir(&self) -> PathBuf {
        self.get_root().join(&self.build.templates)
    }

    /// Persisted cache file resolved against the root
    pub fn cache_path(&self) -> PathBuf {
        self.get_root().join(&self.build.cache_file)
    }
}

// ============================================================================
// Tests
// ============================================================================
