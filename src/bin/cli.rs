//! sitevault command-line interface

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sitevault_core::config::{default_data_dir, VaultConfig};
use sitevault_core::infrastructure::database::catalog;
use sitevault_core::domain::LocationKind;
use sitevault_core::operations::import::{ChannelSink, ImportContext, ImportStatus};
use sitevault_core::Vault;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitevault", about = "Archival media ingestion for site documentation")]
struct Cli {
    /// Data directory (config + catalog); defaults to the platform one
    #[arg(long, env = "SITEVAULT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the config, catalog, and archive root
    Init {
        /// Root of the managed archive tree
        #[arg(long)]
        archive_root: Option<PathBuf>,
    },

    /// Manage catalog locations
    Location {
        #[command(subcommand)]
        command: LocationCommand,
    },

    /// Import source files into a location
    Import {
        /// Files or directories to ingest
        sources: Vec<PathBuf>,

        /// Destination location code
        #[arg(long)]
        location: String,

        /// Optional sub-location code within the location
        #[arg(long)]
        sub_location: Option<String>,

        /// Actor recorded on the catalog rows
        #[arg(long, env = "USER", default_value = "unknown")]
        actor: String,

        /// Commit each file as soon as it validates
        #[arg(long)]
        progressive: bool,
    },
}

#[derive(Subcommand)]
enum LocationCommand {
    /// Create a location
    Add {
        code: String,
        name: String,
        #[arg(long)]
        region: String,
        #[arg(long, default_value = "other")]
        kind: String,
    },
    /// Create a sub-location under an existing location
    AddSub {
        /// Parent location code
        location: String,
        code: String,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };

    match cli.command {
        Command::Init { archive_root } => {
            let config = VaultConfig::load_or_create(&data_dir, archive_root)?;
            Vault::open(config.clone()).await?;
            println!("initialized archive at {}", config.archive_root.display());
            println!("catalog: {}", config.database_path.display());
        }

        Command::Location { command } => {
            let config = VaultConfig::load_or_create(&data_dir, None)?;
            let vault = Vault::open(config).await?;
            match command {
                LocationCommand::Add {
                    code,
                    name,
                    region,
                    kind,
                } => {
                    let kind = LocationKind::from_str(&kind)
                        .map_err(|_| anyhow!("unknown location kind: {kind}"))?;
                    let loc = catalog::create_location(
                        vault.database().conn(),
                        &code,
                        &name,
                        &region,
                        kind,
                    )
                    .await?;
                    println!("created location {} ({})", loc.code, loc.id);
                }
                LocationCommand::AddSub {
                    location,
                    code,
                    name,
                } => {
                    let parent = catalog::find_location_by_code(vault.database().conn(), &location)
                        .await?
                        .ok_or_else(|| anyhow!("no location with code {location}"))?;
                    let sub = catalog::create_sub_location(
                        vault.database().conn(),
                        parent.id,
                        &code,
                        &name,
                    )
                    .await?;
                    println!("created sub-location {} ({})", sub.code, sub.id);
                }
            }
        }

        Command::Import {
            sources,
            location,
            sub_location,
            actor,
            progressive,
        } => {
            if sources.is_empty() {
                return Err(anyhow!("no source paths given"));
            }

            let config = VaultConfig::load_or_create(&data_dir, None)?;
            let vault = Vault::open(config).await?;
            let conn = vault.database().conn();

            let loc = catalog::find_location_by_code(conn, &location)
                .await?
                .ok_or_else(|| anyhow!("no location with code {location}"))?;
            let sub_id = match sub_location {
                Some(code) => Some(
                    catalog::find_sub_location_by_code(conn, loc.id, &code)
                        .await?
                        .ok_or_else(|| anyhow!("no sub-location with code {code}"))?
                        .id,
                ),
                None => None,
            };

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let ctx = ImportContext::with_sink(Arc::new(ChannelSink(tx)));

            // Ctrl-C requests cooperative cancellation; in-flight file
            // operations finish before the session reports back
            let cancel = ctx.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\ncancelling after in-flight operations finish...");
                    cancel.cancel();
                }
            });

            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {percent:>3}% {msg}",
                )
                .context("progress bar template")?,
            );
            let bar_task = {
                let bar = bar.clone();
                tokio::spawn(async move {
                    while let Some(update) = rx.recv().await {
                        bar.set_position(update.percent as u64);
                        if let Some(file) = update.current_file {
                            bar.set_message(file);
                        }
                    }
                })
            };

            let report = vault
                .import(sources, loc.id, sub_id, actor, progressive, &ctx)
                .await?;
            bar_task.abort();
            bar.finish_and_clear();

            match report.status {
                ImportStatus::Completed => println!("import completed"),
                ImportStatus::CompletedWithErrors => println!("import completed with errors"),
                ImportStatus::Cancelled => println!("import cancelled"),
                ImportStatus::Aborted => println!(
                    "import aborted: {}",
                    report.failure.as_deref().unwrap_or("network failure")
                ),
            }
            println!(
                "  imported {}  duplicates {}  errors {}  jobs {}  in {} ms",
                report.total_imported,
                report.total_duplicates,
                report.total_errors,
                report.jobs_queued,
                report.duration_ms
            );
        }
    }

    Ok(())
}
