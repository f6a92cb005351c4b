// docbackup/src/pipeline/mod.rs
//! Moves one collection between the store and one file.
use futures::TryStreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{AppError, Result};
use crate::formats::{DocumentEncoder, Format, FormatRegistry};
use crate::progress::{ProgressGuard, ProgressReporter};
use crate::store::DocumentStore;

/// Encoded documents in flight between the cursor and the file writer.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub collection: String,
    pub success: bool,
    pub items: usize,
    pub errors: usize,
    pub detail: Option<String>,
}

/// Streams every document of `collection` through `encoder` into `destination`.
pub async fn backup_collection(
    store: &dyn DocumentStore,
    collection: &str,
    destination: &Path,
    encoder: Box<dyn DocumentEncoder>,
    progress: &dyn ProgressReporter,
) -> Result<TransferResult> {
    let guard = ProgressGuard::start(progress, format!("Backing up {}", collection));
    let written = stream_to_file(store, collection, destination, encoder).await;
    guard.finish(written.is_ok());
    let items = written?;

    Ok(TransferResult {
        collection: collection.to_string(),
        success: true,
        items,
        errors: 0,
        detail: None,
    })
}

async fn stream_to_file(
    store: &dyn DocumentStore,
    collection: &str,
    destination: &Path,
    mut encoder: Box<dyn DocumentEncoder>,
) -> Result<usize> {
    let mut cursor = store
        .find_all(collection)
        .await
        .map_err(|e| read_error(collection, e))?;
    let file = File::create(destination)
        .await
        .map_err(|e| AppError::io(destination, e))?;

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);

    let producer = async move {
        let mut count = 0usize;
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| read_error(collection, e))?
        {
            let bytes = encoder.encode(&document)?;
            if tx.send(bytes).await.is_err() {
                // Writer is gone; its error is reported below.
                break;
            }
            count += 1;
        }
        Ok::<usize, AppError>(count)
    };

    let consumer = async move {
        let mut writer = BufWriter::new(file);
        while let Some(chunk) = rx.recv().await {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::io(destination, e))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::io(destination, e))?;
        Ok::<(), AppError>(())
    };

    let (produced, written) = tokio::join!(producer, consumer);
    written?;
    let count = produced?;
    debug!("Wrote {} documents to {}", count, destination.display());
    Ok(count)
}

fn read_error(collection: &str, err: AppError) -> AppError {
    match err {
        AppError::Stream { .. } => err,
        other => AppError::Stream {
            collection: collection.to_string(),
            message: other.to_string(),
        },
    }
}

/// Decodes `source` and inserts its documents into `collection` as one
/// ordered batch. Write failures are counted in the result, not raised.
pub async fn restore_collection(
    store: &dyn DocumentStore,
    collection: &str,
    source: &Path,
    format: Format,
    registry: &FormatRegistry,
    progress: &dyn ProgressReporter,
) -> Result<TransferResult> {
    let guard = ProgressGuard::start(progress, format!("Restoring {}", collection));
    let loaded = load_file(store, collection, source, format, registry).await;
    guard.finish(loaded.as_ref().is_ok_and(|outcome| outcome.failed() == 0));
    let outcome = loaded?;

    let failures: Vec<String> = outcome
        .write_errors
        .iter()
        .chain(outcome.write_concern_errors.iter())
        .cloned()
        .collect();

    Ok(TransferResult {
        collection: collection.to_string(),
        success: failures.is_empty(),
        items: outcome.inserted,
        errors: failures.len(),
        detail: (!failures.is_empty()).then(|| failures.join("; ")),
    })
}

async fn load_file(
    store: &dyn DocumentStore,
    collection: &str,
    source: &Path,
    format: Format,
    registry: &FormatRegistry,
) -> Result<crate::store::InsertOutcome> {
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| AppError::io(source, e))?;
    let documents = registry.decode(format, source, &bytes)?;
    debug!("Decoded {} documents from {}", documents.len(), source.display());
    store.insert_ordered(collection, documents).await
}
