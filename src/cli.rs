//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vela static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (defaults to the current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Config file name (default: vela.toml)
    #[arg(short = 'C', long, default_value = "vela.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Ignore the persisted cache and rebuild everything
    #[arg(long)]
    pub clean: bool,

    /// Force re-parse of specific source paths (relative to content dir)
    #[arg(short, long = "force")]
    pub force: Vec<PathBuf>,

    /// Override base URL for the site.
    ///
    /// Useful for CI/CD deployments where the production URL differs from
    /// local development, without editing vela.toml.
    ///
    /// Example:
    ///   vela build --base-url "https://user.github.io/blog"
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site once
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Rebuild incrementally whenever content changes
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

impl Cli {
    const fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args } | Commands::Watch { build_args } => build_args,
        }
    }

    pub const fn clean(&self) -> bool {
        self.build_args().clean
    }

    pub fn base_url(&self) -> Option<&str> {
        self.build_args().base_url.as_deref()
    }

    pub fn force_paths(&self) -> &[PathBuf] {
        &self.build_args().force
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let cli = Cli::parse_from([
            "vela",
            "build",
            "--clean",
            "--force",
            "posts/a.md",
            "--base-url",
            "https://example.com",
        ]);
        assert!(matches!(cli.command, Commands::Build { .. }));
        assert!(cli.clean());
        assert_eq!(cli.base_url(), Some("https://example.com"));
        assert_eq!(cli.force_paths(), [PathBuf::from("posts/a.md")]);
    }

    #[test]
    fn test_watch_defaults() {
        let cli = Cli::parse_from(["vela", "watch"]);
        assert!(matches!(cli.command, Commands::Watch { .. }));
        assert!(!cli.clean());
        assert!(cli.base_url().is_none());
        assert!(cli.force_paths().is_empty());
    }

    #[test]
    fn test_config_default() {
        let cli = Cli::parse_from(["vela", "build"]);
        assert_eq!(cli.config, PathBuf::from("vela.toml"));
    }
}
