// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use custom_catalog::{
    path::{expand, DEFAULT_APPS_FOLDER, DEFAULT_CATALOG_LIST_PATH},
    CatalogBuilder, CatalogListFile, LastUpdate,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::process::exit;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "custom-catalog [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub list: CatalogListOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Build(opts) => run_build(opts),
            Command::Reset => run_reset(self.list),
            Command::Add => run_add(self.list),
            Command::Override => run_override(self.list),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Build catalog.json from apps folder.
    #[command(override_usage = "custom-catalog build [options] [<apps_folder>]")]
    Build(BuildOptions),

    /// Reset catalog list to the default catalog only.
    Reset,

    /// Add custom catalog to catalog list.
    Add,

    /// Replace catalog list with the custom catalog only.
    Override,
}

#[derive(Args, Clone, Debug)]
struct CatalogListOptions {
    /// Path to catalog list of the platform.
    #[arg(
        long,
        global = true,
        env = "CATALOG_LIST_PATH",
        value_name = "path",
        default_value = DEFAULT_CATALOG_LIST_PATH
    )]
    pub catalog_list: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BuildOptions {
    /// Folder holding apps.json and app checkouts.
    #[arg(value_name = "apps_folder", default_value = DEFAULT_APPS_FOLDER)]
    pub folder: String,

    /// Timestamp to record as last update, in seconds since the Unix epoch.
    #[arg(short, long, value_name = "seconds")]
    pub last_update: Option<f64>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_build(opts: BuildOptions) -> Result<()> {
    let last_update = match opts.last_update {
        Some(secs) => LastUpdate::from_secs(secs),
        None => LastUpdate::now(),
    };

    let report = CatalogBuilder::new(expand(opts.folder)?, last_update).build()?;
    report.ensure_success()?;

    Ok(())
}

fn run_reset(opts: CatalogListOptions) -> Result<()> {
    CatalogListFile::open(expand(opts.catalog_list)?)?.reset()?;
    Ok(())
}

fn run_add(opts: CatalogListOptions) -> Result<()> {
    CatalogListFile::open(expand(opts.catalog_list)?)?.add_custom()?;
    Ok(())
}

fn run_override(opts: CatalogListOptions) -> Result<()> {
    CatalogListFile::open(expand(opts.catalog_list)?)?.override_with_custom()?;
    Ok(())
}
