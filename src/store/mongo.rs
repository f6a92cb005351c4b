// docbackup/src/store/mongo.rs
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::Document;
use mongodb::error::{BulkWriteFailure, ErrorKind};
use mongodb::options::InsertManyOptions;
use mongodb::{Client, Database};

use super::{DocumentStore, DocumentStream, InsertOutcome};
use crate::errors::{AppError, Result};

/// `DocumentStore` backed by a live MongoDB database.
pub struct MongoStore {
    // Keeps the connection pool alive for as long as the handle exists.
    _client: Client,
    database: Database,
}

impl MongoStore {
    pub fn new(client: Client, database_name: &str) -> Self {
        let database = client.database(database_name);
        Self {
            _client: client,
            database,
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        Ok(self.database.list_collection_names(None).await?)
    }

    async fn find_all(&self, collection: &str) -> Result<DocumentStream> {
        let cursor = self
            .database
            .collection::<Document>(collection)
            .find(None, None)
            .await?;
        Ok(cursor.map_err(AppError::from).boxed())
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        self.database.create_collection(collection, None).await?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.database
            .collection::<Document>(collection)
            .drop(None)
            .await?;
        Ok(())
    }

    async fn insert_ordered(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertOutcome> {
        if documents.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let total = documents.len();
        let options = InsertManyOptions::builder().ordered(true).build();
        match self
            .database
            .collection::<Document>(collection)
            .insert_many(documents, options)
            .await
        {
            Ok(result) => Ok(InsertOutcome {
                inserted: result.inserted_ids.len(),
                ..InsertOutcome::default()
            }),
            Err(err) => {
                if let ErrorKind::BulkWrite(failure) = err.kind.as_ref() {
                    return Ok(outcome_from_failure(failure, total));
                }
                Err(err.into())
            }
        }
    }
}

/// An ordered insert stops at the first failed write, so everything before
/// the lowest failing index made it in.
fn outcome_from_failure(failure: &BulkWriteFailure, total: usize) -> InsertOutcome {
    let write_errors = failure.write_errors.as_deref().unwrap_or_default();
    let inserted = write_errors
        .iter()
        .map(|e| e.index)
        .min()
        .unwrap_or(total);

    InsertOutcome {
        inserted,
        write_errors: write_errors
            .iter()
            .map(|e| format!("document #{}: {} (code {})", e.index, e.message, e.code))
            .collect(),
        write_concern_errors: failure
            .write_concern_error
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect(),
    }
}
