// docbackup/src/restore/logic.rs
use futures::future::join_all;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::backup::INCOMPLETE_MARKER;
use crate::config::DropScope;
use crate::errors::{AppError, Result};
use crate::formats::{Format, FormatRegistry};
use crate::pipeline::{self, TransferResult};
use crate::progress::ProgressReporter;
use crate::store::{eligible_collections, is_system_collection, DocumentStore};

/// One backup file and the collection it will be loaded into.
#[derive(Debug, Clone, PartialEq)]
struct RestoreUnit {
    source: PathBuf,
    collection: String,
    format: Format,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    pub restored: Vec<TransferResult>,
    /// Entries that were not restored: unknown extension, reserved or
    /// duplicate collection name, or not a regular file.
    pub skipped: Vec<PathBuf>,
    /// Collections whose file could not be restored, with the reason.
    pub failed: Vec<(String, String)>,
    pub dropped: usize,
}

impl RestoreSummary {
    pub fn inserted(&self) -> usize {
        self.restored.iter().map(|r| r.items).sum()
    }

    pub fn write_failures(&self) -> usize {
        self.restored.iter().map(|r| r.errors).sum()
    }

    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("{} collections", self.restored.len()),
            format!("{} documents inserted", self.inserted()),
        ];
        if self.write_failures() > 0 {
            parts.push(format!("{} failed writes", self.write_failures()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} files failed", self.failed.len()));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} files skipped", self.skipped.len()));
        }
        parts.join(", ")
    }
}

/// Entries directly inside `source_dir`, sorted by name, split into regular
/// files (symlinks resolved) and everything else. Taken once; files appearing
/// later are not picked up.
fn list_backup_files(source_dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let metadata = fs::metadata(source_dir).map_err(|e| AppError::io(source_dir, e))?;
    if !metadata.is_dir() {
        return Err(AppError::io(
            source_dir,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut files = Vec::new();
    let mut others = Vec::new();
    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| AppError::io(source_dir, e.into()))?;
        // `Path::is_file` follows links; a dangling one lands in `others`.
        if entry.path().is_file() {
            files.push(entry.into_path());
        } else {
            info!("ℹ️ Skipping {}: not a regular file", entry.path().display());
            others.push(entry.into_path());
        }
    }
    Ok((files, others))
}

fn plan_units(files: Vec<PathBuf>, registry: &FormatRegistry) -> (Vec<RestoreUnit>, Vec<PathBuf>) {
    let mut units: Vec<RestoreUnit> = Vec::new();
    let mut skipped = Vec::new();
    let mut claimed: HashMap<String, usize> = HashMap::new();

    for source in files {
        let Some(format) = registry.detect(&source) else {
            info!(
                "ℹ️ Skipping {}: extension is not one of {:?}",
                source.display(),
                registry.extensions()
            );
            skipped.push(source);
            continue;
        };
        let collection = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if collection.is_empty() || is_system_collection(&collection) {
            info!("ℹ️ Skipping {}: not a user collection", source.display());
            skipped.push(source);
            continue;
        }
        if let Some(&kept) = claimed.get(&collection) {
            warn!(
                "⚠️ Skipping {}: collection {} is already restored from {}",
                source.display(),
                collection,
                units[kept].source.display()
            );
            skipped.push(source);
            continue;
        }
        claimed.insert(collection.clone(), units.len());
        units.push(RestoreUnit {
            source,
            collection,
            format,
        });
    }
    (units, skipped)
}

/// Best-effort clean slate. Drops run concurrently and all of them settle
/// before this returns, so no create races a drop.
async fn drop_existing_collections(
    store: &dyn DocumentStore,
    units: &[RestoreUnit],
    scope: DropScope,
) -> usize {
    let existing = match store.list_collection_names().await {
        Ok(names) => eligible_collections(names),
        Err(e) => {
            warn!("⚠️ Could not list existing collections, nothing dropped: {}", e);
            return 0;
        }
    };

    let doomed: Vec<String> = existing
        .into_iter()
        .filter(|name| match scope {
            DropScope::All => true,
            DropScope::Matching => units.iter().any(|unit| &unit.collection == name),
        })
        .collect();
    if doomed.is_empty() {
        return 0;
    }
    info!("🧹 Dropping existing collections: {:?}", doomed);

    let drops = doomed.iter().map(|name| async move {
        let result = store.drop_collection(name).await;
        (name, result)
    });

    let mut dropped = 0;
    for (name, result) in join_all(drops).await {
        match result {
            Ok(()) => {
                debug!("Dropped collection {}", name);
                dropped += 1;
            }
            Err(e) => warn!("⚠️ Failed to drop collection {}: {}", name, e),
        }
    }
    dropped
}

/// Restores every recognised file of `source_dir` into `store`. Only an
/// unusable directory or an empty one fails the whole restore; each file
/// otherwise succeeds or fails on its own.
pub async fn restore_database(
    store: &dyn DocumentStore,
    source_dir: &Path,
    drop_scope: DropScope,
    registry: &FormatRegistry,
    progress: &dyn ProgressReporter,
) -> Result<RestoreSummary> {
    info!("🔍 Reading backup files from {}", source_dir.display());
    let (files, others) = list_backup_files(source_dir)?;
    if files.is_empty() {
        return Err(AppError::EmptyBackup(source_dir.to_path_buf()));
    }
    if files.iter().any(|f| f.file_name().is_some_and(|n| n == INCOMPLETE_MARKER)) {
        warn!(
            "⚠️ {} is marked as an incomplete backup; restoring the files it has",
            source_dir.display()
        );
    }

    let (units, mut skipped) = plan_units(files, registry);
    skipped.extend(others);
    skipped.sort();
    let mut summary = RestoreSummary {
        skipped,
        ..RestoreSummary::default()
    };
    summary.dropped = drop_existing_collections(store, &units, drop_scope).await;

    for unit in &units {
        info!(
            "🔄 Restoring collection {} from {}",
            unit.collection,
            unit.source.display()
        );
        if let Err(e) = store.create_collection(&unit.collection).await {
            error!("❌ Could not create collection {}: {}", unit.collection, e);
            summary.failed.push((unit.collection.clone(), e.to_string()));
            continue;
        }

        match pipeline::restore_collection(
            store,
            &unit.collection,
            &unit.source,
            unit.format,
            registry,
            progress,
        )
        .await
        {
            Ok(result) => {
                info!(
                    "✓ {}: inserted={}, errors={}",
                    result.collection, result.items, result.errors
                );
                if let Some(detail) = &result.detail {
                    warn!("⚠️ Write failures in {}: {}", result.collection, detail);
                }
                summary.restored.push(result);
            }
            Err(e) => {
                error!("❌ Failed to restore {}: {}", unit.collection, e);
                summary.failed.push((unit.collection.clone(), e.to_string()));
            }
        }
    }

    info!("🎉 Restore finished: {}", summary.describe());
    Ok(summary)
}
