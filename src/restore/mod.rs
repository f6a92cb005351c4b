mod logic;

use tracing::error;

use crate::config::{AppConfig, OperationConfig};
use crate::connection;
use crate::formats::FormatRegistry;
use crate::progress::ProgressReporter;
use crate::report::{Operation, StatusReport};

pub use logic::restore_database;

/// Public entry point for the restore process. Per-file problems are logged
/// and summarised; only connection or directory level failures are reported
/// as an error.
pub async fn run_restore_flow(
    app_config: &AppConfig,
    registry: &FormatRegistry,
    progress: &dyn ProgressReporter,
) -> StatusReport {
    let restore_config = match &app_config.operation {
        Some(OperationConfig::Restore(cfg)) => cfg,
        _ => {
            return StatusReport::failed(
                Operation::Restore,
                "Restore operation selected but no restore configuration found",
            );
        }
    };

    let store = match connection::open(&restore_config.connection).await {
        Ok(store) => store,
        Err(e) => return StatusReport::failed(Operation::Restore, e),
    };

    match restore_database(
        &store,
        &restore_config.source_dir,
        restore_config.drop_scope,
        registry,
        progress,
    )
    .await
    {
        Ok(summary) => StatusReport::restored(Some(summary.describe())),
        Err(e) => {
            error!("❌ Restore failed: {}", e);
            StatusReport::failed(Operation::Restore, e)
        }
    }
}
