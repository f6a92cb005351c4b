mod logic;

use tracing::error;

use crate::config::{AppConfig, OperationConfig};
use crate::connection;
use crate::formats::FormatRegistry;
use crate::progress::ProgressReporter;
use crate::report::{Operation, StatusReport};

pub use logic::{backup_database, INCOMPLETE_MARKER};

/// Public entry point for the backup process: connect, back up every
/// collection, and describe the outcome in one sentence.
pub async fn run_backup_flow(
    app_config: &AppConfig,
    registry: &FormatRegistry,
    progress: &dyn ProgressReporter,
) -> StatusReport {
    let backup_config = match &app_config.operation {
        Some(OperationConfig::Backup(cfg)) => cfg,
        _ => {
            return StatusReport::failed(
                Operation::Backup,
                "Backup operation selected but no backup configuration found",
            );
        }
    };

    let store = match connection::open(&backup_config.connection).await {
        Ok(store) => store,
        Err(e) => return StatusReport::failed(Operation::Backup, e),
    };

    match backup_database(
        &store,
        &backup_config.backup_root,
        backup_config.format,
        registry,
        progress,
    )
    .await
    {
        Ok(summary) => StatusReport::backup_ready(&summary.directory),
        Err(e) => {
            error!("❌ Backup failed: {}", e);
            StatusReport::failed(Operation::Backup, e)
        }
    }
}
