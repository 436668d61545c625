//! Vela - an incremental static site generator for markdown blogs.

mod cache;
mod cli;
mod config;
mod content;
mod discovery;
mod logger;
mod parser;
mod pipeline;
mod render;
mod taxonomy;
mod template;
mod urls;
mod views;
mod watch;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use content::RelPath;
use pipeline::build_site;
use std::{collections::HashSet, path::Path};
use watch::watch_for_changes_blocking;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let force = force_set(&cli);

    match &cli.command {
        Commands::Build { .. } => {
            let report = build_site(&config, &force)?;
            log!(
                "build";
                "{} pages ({} rendered), {} tags hit cache",
                report.total_pages,
                report.rendered,
                report.cache_hits
            );
            if !report.is_success() {
                bail!("build finished with {} page failure(s)", report.failures.len());
            }
            Ok(())
        }
        Commands::Watch { .. } => {
            // Initial build; per-page failures are reported but watch still
            // starts, so fixing the file triggers the rebuild.
            match build_site(&config, &force) {
                Ok(report) if report.is_success() => log!("build"; "done"),
                Ok(report) => {
                    log!("build"; "{} page failure(s), watching for fixes", report.failures.len());
                }
                Err(err) => log!("error"; "initial build failed: {err:#}"),
            }
            watch_for_changes_blocking(config)
        }
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new(""));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("config file not found: {}", config_path.display());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.set_root(root);
    config.update_with_cli(cli);
    Ok(config)
}

/// Normalized force-reparse set from `--force` arguments.
fn force_set(cli: &Cli) -> HashSet<RelPath> {
    cli.force_paths().iter().map(RelPath::new).collect()
}
