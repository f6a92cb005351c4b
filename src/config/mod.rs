// docbackup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::formats::{Format, JsonMode};

const DEFAULT_BACKUP_ROOT: &str = "./backups/";

/// Which existing collections a restore clears before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropScope {
    /// Every non-system collection in the target database.
    #[default]
    All,
    /// Only collections that the backup is about to recreate.
    Matching,
}

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRestoreOptions {
    #[serde(default)]
    pub drop_scope: DropScope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub backup_root: Option<PathBuf>,
    pub restore_source: Option<PathBuf>,
    pub format: Option<Format>,
    pub json_mode: Option<JsonMode>,
    pub connect_timeout_secs: Option<u64>,
    pub restore_options: Option<JsonRestoreOptions>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub uri: String,
    pub database: String,
    pub connect_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub connection: ConnectionConfig,
    pub backup_root: PathBuf,
    pub format: Format,
}

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub connection: ConnectionConfig,
    pub source_dir: PathBuf,
    pub drop_scope: DropScope,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub json_mode: JsonMode,
    pub raw_json_config: RawJsonConfig,
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Backup(BackupConfig),
    Restore(RestoreConfig),
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let mut raw_json_config = parse_raw_config(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        apply_env_overrides(&mut raw_json_config);

        Ok(AppConfig {
            operation: None, // Filled by main once the operation is chosen
            json_mode: raw_json_config.json_mode.unwrap_or_default(),
            raw_json_config,
        })
    }
}

fn parse_raw_config(content: &str) -> Result<RawJsonConfig> {
    Ok(serde_json::from_str(content)?)
}

/// `DATABASE_URL` and `DATABASE_NAME` from the environment (or `.env`) win
/// over config.json.
fn apply_env_overrides(raw_config: &mut RawJsonConfig) {
    if let Ok(url) = env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            info!("Using DATABASE_URL from environment");
            raw_config.database_url = Some(url);
        }
    }
    if let Ok(name) = env::var("DATABASE_NAME") {
        if !name.trim().is_empty() {
            raw_config.database_name = Some(name);
        }
    }
}

pub fn load_backup_config_from_json(
    raw_config: &RawJsonConfig,
    backup_root_override: Option<PathBuf>,
) -> Result<BackupConfig> {
    let connection = load_connection_config(raw_config)?;
    let backup_root = backup_root_override
        .or_else(|| raw_config.backup_root.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_ROOT));

    if backup_root.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("backup_root cannot be empty in config.json."));
    }

    Ok(BackupConfig {
        connection,
        backup_root,
        format: raw_config.format.unwrap_or(Format::Json),
    })
}

pub fn load_restore_config_from_json(
    raw_config: &RawJsonConfig,
    source_override: Option<PathBuf>,
) -> Result<RestoreConfig> {
    let connection = load_connection_config(raw_config)?;
    let source_dir = source_override
        .or_else(|| raw_config.restore_source.clone())
        .context("restore_source must be set in config.json (or passed as an argument) for restore")?;

    if source_dir.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("restore_source cannot be empty in config.json."));
    }

    Ok(RestoreConfig {
        connection,
        source_dir,
        drop_scope: raw_config
            .restore_options
            .as_ref()
            .map(|opts| opts.drop_scope)
            .unwrap_or_default(),
    })
}

fn load_connection_config(raw_config: &RawJsonConfig) -> Result<ConnectionConfig> {
    let uri = raw_config
        .database_url
        .as_ref()
        .filter(|url| !url.trim().is_empty())
        .context("database_url must be set in config.json or DATABASE_URL")?
        .clone();

    let database = match raw_config.database_name.as_ref().filter(|n| !n.trim().is_empty()) {
        Some(name) => name.clone(),
        None => get_db_name_from_url(&uri)
            .context("database_name is not set and the database_url names no database")?,
    };

    Ok(ConnectionConfig {
        uri,
        database,
        connect_timeout: raw_config.connect_timeout_secs.map(Duration::from_secs),
    })
}

/// Extracts the database name from a `mongodb://host/dbname?opts` URI.
pub fn get_db_name_from_url(db_url: &str) -> Result<String> {
    let parsed_url = Url::parse(db_url)
        .with_context(|| format!("Invalid database URL format: {}", db_url))?;
    let path = parsed_url.path().trim_start_matches('/');
    if path.is_empty() {
        Err(anyhow::anyhow!("Database name not found in URL path: {}", db_url))
    } else {
        Ok(path.to_string())
    }
}
