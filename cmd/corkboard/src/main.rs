//! # Corkboard CLI
//!
//! Wires the storage drivers, backup store and engine together from layered
//! settings and exposes maintenance commands over them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use configs::{init_logging, Settings};
use tracing::info;

mod app;

use app::App;

#[derive(Parser)]
#[command(name = "corkboard")]
#[command(version)]
#[command(about = "Inspect and maintain Corkboard board storage", long_about = None)]
struct Cli {
    /// Path to a settings file (overrides CORKBOARD_CONFIG)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report the health of every configured storage driver
    Doctor,

    /// List boards with their note counts
    Boards,

    /// Import boards from a legacy export file
    Import { file: PathBuf },

    /// Manage backups
    #[command(subcommand)]
    Backup(BackupCommand),
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Snapshot every board now
    Create,
    /// List stored backups, newest first
    List,
    /// Replace all boards with a backup's contents
    Restore { id: String },
    /// Print a backup record as JSON
    Export { id: String },
    /// Store a previously exported backup record
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    init_logging(&settings.logging)?;

    let app = App::start(&settings).await?;
    run(&app, cli.command).await?;

    // Let deferred plugin hooks finish before exiting.
    app.engine.settle().await;
    Ok(())
}

async fn run(app: &App, command: Command) -> Result<()> {
    let engine = &app.engine;
    match command {
        Command::Doctor => {
            let active = app.drivers.active_driver_name().unwrap_or_else(|| "none".to_string());
            println!("active driver: {active}");
            let reason = app.drivers.fallback_reason();
            if !reason.is_empty() {
                println!("fallback: {reason}");
            }
            println!("{}", serde_json::to_string_pretty(&app.drivers.driver_statuses())?);
        }
        Command::Boards => {
            for board in engine.all_boards() {
                println!("{}  {}  ({} notes)", board.id, board.name, board.notes.len());
            }
        }
        Command::Import { file } => {
            let json = read(&file)?;
            let boards = engine.import_legacy_data(&json).await?;
            info!(boards = boards.len(), file = %file.display(), "legacy import finished");
            for board in boards {
                println!("imported {}  {}  ({} notes)", board.id, board.name, board.notes.len());
            }
        }
        Command::Backup(command) => run_backup(app, command).await?,
    }
    Ok(())
}

async fn run_backup(app: &App, command: BackupCommand) -> Result<()> {
    let engine = &app.engine;
    match command {
        BackupCommand::Create => {
            let metadata = engine.create_backup().await?;
            println!("created {} ({} boards)", metadata.id, metadata.board_count);
        }
        BackupCommand::List => {
            for metadata in engine.list_backups().await? {
                println!("{}  {} boards  v{}", metadata.id, metadata.board_count, metadata.version);
            }
        }
        BackupCommand::Restore { id } => {
            let boards = engine.restore_backup(&id).await?;
            println!("restored {id} ({} boards)", boards.len());
        }
        BackupCommand::Export { id } => {
            println!("{}", engine.export_backup(&id).await?);
        }
        BackupCommand::Import { file } => {
            let metadata = engine.import_backup(&read(&file)?).await?;
            println!("imported backup {}", metadata.id);
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
