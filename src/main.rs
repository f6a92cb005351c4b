//! Document Database Backup/Restore Tool
//!
//! Provides CLI interface for whole-database backup and restore operations

// docbackup/src/main.rs
mod backup;
mod config;
mod connection;
mod errors;
mod formats;
mod pipeline;
mod progress;
mod report;
mod restore;
mod store;

use anyhow::{Context, Result};
use config::{AppConfig, OperationConfig, load_backup_config_from_json, load_restore_config_from_json};
use formats::FormatRegistry;
use progress::ConsoleProgress;
use report::StatusReport;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    match run_app().await {
        Ok(report) if report.success => {
            println!("✅ {}", report);
            ExitCode::SUCCESS
        }
        Ok(report) => {
            eprintln!("❌ {}", report);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_app() -> Result<StatusReport> {
    // config.json next to where the tool is run, unless DOCBACKUP_CONFIG says otherwise.
    let config_path = env::var("DOCBACKUP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let mut app_config = AppConfig::load_from_json(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };
    let path_override = args.get(2).map(PathBuf::from);

    let registry = FormatRegistry::new(app_config.json_mode);
    let progress = ConsoleProgress::default();

    match choice.as_str() {
        "1" | "backup" => {
            info!("🚀 Starting Backup Process...");
            let backup_config = load_backup_config_from_json(&app_config.raw_json_config, path_override)
                .context("Failed to load backup configuration from JSON")?;
            info!(
                "Backup of {} to {} as {}",
                backup_config.connection.database,
                backup_config.backup_root.display(),
                backup_config.format
            );
            app_config.operation = Some(OperationConfig::Backup(backup_config));
            Ok(backup::run_backup_flow(&app_config, &registry, &progress).await)
        }
        "2" | "restore" => {
            info!("🔄 Starting Restore Process...");
            let restore_config = load_restore_config_from_json(&app_config.raw_json_config, path_override)
                .context("Failed to load restore configuration from JSON")?;
            info!(
                "Restore target: {}, Source: {}",
                restore_config.connection.database,
                restore_config.source_dir.display()
            );
            app_config.operation = Some(OperationConfig::Restore(restore_config));
            Ok(restore::run_restore_flow(&app_config, &registry, &progress).await)
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup) or '2' (restore).");
            anyhow::bail!("Invalid operation choice");
        }
    }
}

/// Prompts user to select backup or restore operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{stdin, stdout, Write};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
