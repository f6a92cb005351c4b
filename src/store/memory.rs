// docbackup/src/store/memory.rs
//! In-memory `DocumentStore` for tests.
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{Bson, Document};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{DocumentStore, DocumentStream, InsertOutcome};
use crate::errors::{AppError, Result};

#[derive(Default)]
pub struct MemoryStore {
    name: String,
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    failing_reads: HashSet<String>,
    failing_drops: HashSet<String>,
    events: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_collection(self, collection: &str, documents: Vec<Document>) -> Self {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), documents);
        self
    }

    /// Reads of `collection` yield one document and then fail.
    pub fn failing_reads(mut self, collection: &str) -> Self {
        self.failing_reads.insert(collection.to_string());
        self
    }

    pub fn failing_drops(mut self, collection: &str) -> Self {
        self.failing_drops.insert(collection.to_string());
        self
    }

    pub fn count(&self, collection: &str) -> Option<usize> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(Vec::len)
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.lock().unwrap().keys().cloned().collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

fn store_error(collection: &str, message: &str) -> AppError {
    AppError::Stream {
        collection: collection.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        Ok(self.names())
    }

    async fn find_all(&self, collection: &str) -> Result<DocumentStream> {
        let documents = self.documents(collection);
        if self.failing_reads.contains(collection) {
            let mut items: Vec<Result<Document>> =
                documents.into_iter().take(1).map(Ok).collect();
            items.push(Err(store_error(collection, "cursor killed")));
            return Ok(futures::stream::iter(items).boxed());
        }
        Ok(futures::stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        self.record(format!("create:{collection}"));
        let mut collections = self.collections.lock().unwrap();
        if collections.contains_key(collection) {
            return Err(store_error(collection, "namespace already exists"));
        }
        collections.insert(collection.to_string(), Vec::new());
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.record(format!("drop:{collection}"));
        if self.failing_drops.contains(collection) {
            return Err(store_error(collection, "drop refused"));
        }
        self.collections.lock().unwrap().remove(collection);
        Ok(())
    }

    async fn insert_ordered(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertOutcome> {
        let mut collections = self.collections.lock().unwrap();
        let target = collections.entry(collection.to_string()).or_default();
        let mut outcome = InsertOutcome::default();

        for (index, document) in documents.into_iter().enumerate() {
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            let duplicate =
                id != Bson::Null && target.iter().any(|existing| existing.get("_id") == Some(&id));
            if duplicate {
                outcome
                    .write_errors
                    .push(format!("document #{index}: E11000 duplicate key {id}"));
                break;
            }
            target.push(document);
            outcome.inserted += 1;
        }
        Ok(outcome)
    }
}
