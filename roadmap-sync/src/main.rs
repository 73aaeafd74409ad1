//! roadmap-sync - command-line entry point
//!
//! Each subcommand runs one pass and prints its report. Record-level failures are part of
//! the report; only fatal errors (store, workbook, configuration) exit non-zero.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roadmap_common::config::{database_path, RootFolderResolver, TomlConfig};
use roadmap_common::FrameworkId;
use roadmap_sync::db::SqliteInitiativeStore;
use roadmap_sync::transport::{GridTransport, JsonWorkbookTransport};
use roadmap_sync::{RunReport, SyncEngine};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for roadmap-sync
#[derive(Parser, Debug)]
#[command(name = "roadmap-sync")]
#[command(about = "Multi-framework initiative scoring with sheet sync")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, global = true, env = "ROADMAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long, global = true, env = "ROADMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Workbook file, overriding the configured one
    #[arg(short, long, global = true)]
    workbook: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull inputs from the sheet into the database
    SyncInputs {
        /// Input tab, overriding the configured one
        #[arg(long)]
        tab: Option<String>,

        /// Rows per commit checkpoint
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Recompute every framework's scores for every initiative
    ScoreAll {
        /// Initiatives per commit checkpoint
        #[arg(long)]
        batch_size: Option<usize>,

        /// Leave the active score columns untouched
        #[arg(long)]
        no_mirror_active: bool,
    },

    /// Recompute one initiative's scores
    Score {
        #[arg(long)]
        key: String,
    },

    /// Push stored scores to the sheet
    WriteScores {
        /// Output tab, overriding the configured one
        #[arg(long)]
        tab: Option<String>,

        /// Show planned cell writes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Change an initiative's active framework
    SetActive {
        #[arg(long)]
        key: String,

        /// RICE or WSJF
        #[arg(long)]
        framework: FrameworkId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "roadmap-sync {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    apply_overrides(&mut config, &args.command);

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &config).resolve();
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let store = SqliteInitiativeStore::open(&db_path)
        .await
        .context("Failed to open database")?;

    let transport = args
        .workbook
        .clone()
        .or_else(|| config.sheet.workbook.clone())
        .map(|path| {
            info!("Workbook: {}", path.display());
            Box::new(JsonWorkbookTransport::new(path)) as Box<dyn GridTransport>
        });

    let engine = SyncEngine::new(Box::new(store), transport, &config)
        .context("Invalid scoring configuration")?;

    match args.command {
        Command::SyncInputs { .. } => {
            let report = engine.sync_inputs().await?;
            print_report(&report, args.json)?;
        }
        Command::ScoreAll { batch_size, .. } => {
            let report = engine.score_all(batch_size).await?;
            print_report(&report, args.json)?;
        }
        Command::Score { key } => {
            let outcome = engine.score_one(&key).await?;
            let scored: Vec<&str> = outcome.scored.iter().map(|f| f.as_str()).collect();
            println!("{}: scored [{}]", key, scored.join(", "));
            for failure in &outcome.failures {
                println!("  {}", failure);
            }
        }
        Command::WriteScores { dry_run: true, .. } => {
            let plan = engine.plan_score_writes().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&plan.writes)?);
            } else {
                for write in &plan.writes {
                    println!("{} = {}", write.a1(), write.value);
                }
            }
            print_report(&plan.report, args.json)?;
        }
        Command::WriteScores { .. } => {
            let report = engine.write_scores_to_sheet().await?;
            print_report(&report, args.json)?;
        }
        Command::SetActive { key, framework } => {
            engine.set_active(&key, framework).await?;
            println!("{}: active framework is now {}", key, framework);
        }
    }

    Ok(())
}

/// Per-command flags that take precedence over the config file
fn apply_overrides(config: &mut TomlConfig, command: &Command) {
    match command {
        Command::SyncInputs { tab, batch_size } => {
            if let Some(tab) = tab {
                config.sheet.input_tab = tab.clone();
            }
            if batch_size.is_some() {
                config.scoring.batch_size = *batch_size;
            }
        }
        Command::WriteScores { tab: Some(tab), .. } => config.sheet.output_tab = tab.clone(),
        Command::ScoreAll {
            no_mirror_active: true,
            ..
        } => config.scoring.mirror_active = false,
        _ => {}
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", report.summary());
    for column in &report.unresolved_columns {
        println!("  ignored column: {}", column);
    }
    for failure in &report.failures {
        println!("  {}", failure);
    }
    for touched in &report.touched {
        println!("  {} {}", touched.initiative_key, touched.token);
    }
    Ok(())
}
