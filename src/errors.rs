use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot connect to database: {0}")]
    Connection(String),

    #[error("Database {0} is empty")]
    EmptyDatabase(String),

    #[error("No backup files found in {}", .0.display())]
    EmptyBackup(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error while reading collection {collection}: {message}")]
    Stream { collection: String, message: String },

    #[error("Failed to encode document for {format}: {message}")]
    Encode { format: String, message: String },

    #[error("Failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
