// docbackup/src/connection/mod.rs
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ConnectionConfig;
use crate::errors::{AppError, Result};
use crate::store::mongo::MongoStore;

const APP_NAME: &str = "docbackup";

async fn build_client(uri: &str, timeout: Option<Duration>) -> Result<Client> {
    let mut options = ClientOptions::parse(uri)
        .await
        .map_err(|e| AppError::Connection(e.to_string()))?;
    options.app_name = Some(APP_NAME.to_string());
    if let Some(timeout) = timeout {
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);
    }
    Client::with_options(options).map_err(|e| AppError::Connection(e.to_string()))
}

async fn ping(client: &Client) -> Result<()> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(|e| AppError::Connection(e.to_string()))?;
    Ok(())
}

/// Round trip on a throwaway client so a bad URI or unreachable server is
/// reported before any backup or restore work starts.
pub async fn validate(uri: &str, timeout: Option<Duration>) -> Result<()> {
    let client = build_client(uri, timeout).await?;
    match ping(&client).await {
        Ok(()) => {
            info!("✅ Successfully reached database server");
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to reach database server: {}", e);
            Err(e)
        }
    }
}

/// Opens the handle used for the transfers of one operation.
pub async fn connect(uri: &str, database: &str, timeout: Option<Duration>) -> Result<MongoStore> {
    let client = build_client(uri, timeout).await?;
    ping(&client).await?;
    info!("🔌 Connected to database {}", database);
    Ok(MongoStore::new(client, database))
}

/// Validate, then connect. No retries: the first failure ends the operation.
pub async fn open(config: &ConnectionConfig) -> Result<MongoStore> {
    validate(&config.uri, config.connect_timeout).await?;
    connect(&config.uri, &config.database, config.connect_timeout).await
}
