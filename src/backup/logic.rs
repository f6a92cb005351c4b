// docbackup/src/backup/logic.rs
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::errors::{AppError, Result};
use crate::formats::{Format, FormatRegistry};
use crate::pipeline::{self, TransferResult};
use crate::progress::ProgressReporter;
use crate::store::{eligible_collections, DocumentStore};

/// Written into a backup directory whose run was aborted.
pub const INCOMPLETE_MARKER: &str = "INCOMPLETE";

#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub directory: PathBuf,
    pub collections: Vec<TransferResult>,
}

impl BackupSummary {
    pub fn total_documents(&self) -> usize {
        self.collections.iter().map(|c| c.items).sum()
    }
}

/// `{root}{epoch_ms}_{database}`
fn backup_dir_path(backup_root: &Path, epoch_ms: i64, database: &str) -> PathBuf {
    backup_root.join(format!("{}_{}", epoch_ms, database))
}

/// Creates the per-run directory. It must not exist yet.
fn create_backup_dir(backup_root: &Path, database: &str) -> Result<PathBuf> {
    fs::create_dir_all(backup_root).map_err(|e| AppError::io(backup_root, e))?;

    let backup_path = backup_dir_path(backup_root, Utc::now().timestamp_millis(), database);
    fs::create_dir(&backup_path).map_err(|e| AppError::io(&backup_path, e))?;

    info!("📂 Backup directory created at: {}", backup_path.display());
    Ok(backup_path)
}

fn mark_incomplete(backup_dir: &Path, cause: &AppError) {
    let marker = backup_dir.join(INCOMPLETE_MARKER);
    if let Err(e) = fs::write(&marker, format!("Backup aborted: {}\n", cause)) {
        warn!("⚠️ Could not write {}: {}", marker.display(), e);
    }
}

/// Backs up every non-system collection of `store` into a fresh directory
/// under `backup_root`. The first failing collection aborts the run.
pub async fn backup_database(
    store: &dyn DocumentStore,
    backup_root: &Path,
    format: Format,
    registry: &FormatRegistry,
    progress: &dyn ProgressReporter,
) -> Result<BackupSummary> {
    let database = store.database_name().to_string();
    info!("🔍 Listing collections of database: {}", database);

    let collections = eligible_collections(store.list_collection_names().await?);
    if collections.is_empty() {
        return Err(AppError::EmptyDatabase(database));
    }
    info!("Collections to be backed up: {:?}", collections);

    let directory = create_backup_dir(backup_root, &database)?;
    let mut results = Vec::with_capacity(collections.len());

    for collection in &collections {
        let destination = directory.join(format!("{}.{}", collection, format.extension()));
        let transfer = pipeline::backup_collection(
            store,
            collection,
            &destination,
            registry.encoder(format),
            progress,
        )
        .await;

        match transfer {
            Ok(result) => {
                info!("✓ {}: {} documents", collection, result.items);
                results.push(result);
            }
            Err(e) => {
                error!("❌ Failed to back up collection {}: {}", collection, e);
                mark_incomplete(&directory, &e);
                return Err(e);
            }
        }
    }

    let summary = BackupSummary {
        directory,
        collections: results,
    };
    info!(
        "🎉 Backed up {} collections ({} documents) to {}",
        summary.collections.len(),
        summary.total_documents(),
        summary.directory.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::JsonMode;
    use crate::progress::testing::RecordingProgress;
    use crate::store::memory::MemoryStore;
    use mongodb::bson::{doc, Document};

    fn docs(n: i32) -> Vec<Document> {
        (1..=n).map(|i| doc! { "_id": i, "n": i }).collect()
    }

    fn file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    #[test]
    fn test_backup_dir_path_layout() {
        assert_eq!(
            backup_dir_path(Path::new("/backups/"), 1_700_000_000_000, "shop"),
            PathBuf::from("/backups/1700000000000_shop")
        );
    }

    #[tokio::test]
    async fn test_one_file_per_eligible_collection() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = MemoryStore::new("shop")
            .with_collection("users", docs(3))
            .with_collection("orders", docs(2))
            .with_collection("system.indexes", docs(1));
        let registry = FormatRegistry::new(JsonMode::Canonical);

        let summary = backup_database(
            &store,
            root.path(),
            Format::Json,
            &registry,
            &RecordingProgress::default(),
        )
        .await?;

        let dir_name = summary
            .directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert!(dir_name.ends_with("_shop"), "{dir_name}");
        assert!(dir_name.trim_end_matches("_shop").parse::<i64>().is_ok());

        assert_eq!(file_names(&summary.directory)?, vec!["orders.json", "users.json"]);
        assert_eq!(summary.total_documents(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_backup_uses_csv_extension() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = MemoryStore::new("shop").with_collection("users", docs(2));
        let registry = FormatRegistry::new(JsonMode::Relaxed);

        let summary = backup_database(
            &store,
            root.path(),
            Format::Csv,
            &registry,
            &RecordingProgress::default(),
        )
        .await?;

        assert_eq!(file_names(&summary.directory)?, vec!["users.csv"]);
        let text = fs::read_to_string(summary.directory.join("users.csv"))?;
        assert_eq!(text, "_id,n\n1,1\n2,2\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_database_creates_no_directory() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = MemoryStore::new("shop");
        let registry = FormatRegistry::new(JsonMode::Canonical);

        let result = backup_database(
            &store,
            root.path(),
            Format::Json,
            &registry,
            &RecordingProgress::default(),
        )
        .await;

        match result {
            Err(e @ AppError::EmptyDatabase(_)) => assert!(e.to_string().contains("empty")),
            other => panic!("expected empty database error, got {other:?}"),
        }
        assert!(file_names(root.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_only_system_collections_counts_as_empty() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = MemoryStore::new("shop").with_collection("system.views", docs(1));
        let registry = FormatRegistry::new(JsonMode::Canonical);

        let result = backup_database(
            &store,
            root.path(),
            Format::Json,
            &registry,
            &RecordingProgress::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::EmptyDatabase(_))));
        assert!(file_names(root.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_collection_aborts_and_marks_directory() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = MemoryStore::new("shop")
            .with_collection("a_first", docs(2))
            .with_collection("b_broken", docs(2))
            .with_collection("c_never", docs(2))
            .failing_reads("b_broken");
        let registry = FormatRegistry::new(JsonMode::Canonical);
        let progress = RecordingProgress::default();

        let result =
            backup_database(&store, root.path(), Format::Json, &registry, &progress).await;

        assert!(matches!(result, Err(AppError::Stream { ref collection, .. }) if collection == "b_broken"));

        let runs = file_names(root.path())?;
        assert_eq!(runs.len(), 1);
        let run_dir = root.path().join(&runs[0]);
        let files = file_names(&run_dir)?;
        assert!(files.contains(&INCOMPLETE_MARKER.to_string()));
        assert!(!files.contains(&"c_never.json".to_string()));
        assert!(progress
            .calls()
            .contains(&"stop:Backing up b_broken:failed".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unusable_backup_root_is_an_io_error() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let blocker = root.path().join("not_a_dir");
        fs::write(&blocker, "x")?;
        let store = MemoryStore::new("shop").with_collection("users", docs(1));
        let registry = FormatRegistry::new(JsonMode::Canonical);

        let result = backup_database(
            &store,
            &blocker,
            Format::Json,
            &registry,
            &RecordingProgress::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Io { .. })));
        Ok(())
    }
}
