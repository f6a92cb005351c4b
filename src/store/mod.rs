// docbackup/src/store/mod.rs
pub(crate) mod mongo;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::Document;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::errors::Result;

/// Collections managed by the server itself (`system.views`, `system.profile`, ...).
static SYSTEM_COLLECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^system\.").expect("system collection pattern is valid"));

/// Cursor over every document of one collection.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Result of an ordered batch insert. Write failures are data, not errors:
/// the caller counts and reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub write_errors: Vec<String>,
    pub write_concern_errors: Vec<String>,
}

impl InsertOutcome {
    pub fn failed(&self) -> usize {
        self.write_errors.len() + self.write_concern_errors.len()
    }
}

/// Handle on the connected database. Collections are addressed by name; the
/// handle is shared read-only by every transfer of one operation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn database_name(&self) -> &str;

    async fn list_collection_names(&self) -> Result<Vec<String>>;

    async fn find_all(&self, collection: &str) -> Result<DocumentStream>;

    async fn create_collection(&self, collection: &str) -> Result<()>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Inserts `documents` in order, stopping at the first failed write.
    async fn insert_ordered(&self, collection: &str, documents: Vec<Document>)
        -> Result<InsertOutcome>;
}

pub fn is_system_collection(name: &str) -> bool {
    SYSTEM_COLLECTION.is_match(name)
}

/// Drops system-reserved names, keeping the store's enumeration order.
pub fn eligible_collections(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| {
            let system = is_system_collection(name);
            if system {
                debug!("Skipping system collection: {}", name);
            }
            !system
        })
        .collect()
}
