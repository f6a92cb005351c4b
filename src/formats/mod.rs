//! On-disk serialization formats.
//!
//! The set of formats is closed: each `Format` variant knows its file
//! extension, how to build a streaming encoder and how to decode a whole
//! file back into documents. `FormatRegistry` is built once at startup and
//! handed to the backup and restore flows.

mod csv;
mod json;

use mongodb::bson::{Bson, Document};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One extended-JSON document per line.
    Json,
    /// Header row from the first document, one row per document.
    Csv,
}

/// Extended JSON flavour used when writing. Canonical keeps every BSON type;
/// relaxed is easier to read but collapses numeric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonMode {
    #[default]
    Canonical,
    Relaxed,
}

/// Stateful per-collection transform from documents to file bytes.
pub trait DocumentEncoder: Send {
    fn encode(&mut self, document: &Document) -> Result<Vec<u8>>;
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Json, Format::Csv];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }

    fn encoder(self, mode: JsonMode) -> Box<dyn DocumentEncoder> {
        match self {
            Format::Json => Box::new(json::JsonLinesEncoder::new(mode)),
            Format::Csv => Box::new(csv::CsvEncoder::new(mode)),
        }
    }

    fn decode(self, source: &Path, bytes: &[u8]) -> Result<Vec<Document>> {
        match self {
            Format::Json => json::decode(source, bytes),
            Format::Csv => csv::decode(source, bytes),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<Format>,
    json_mode: JsonMode,
}

impl FormatRegistry {
    pub fn new(json_mode: JsonMode) -> Self {
        Self {
            formats: Format::ALL.to_vec(),
            json_mode,
        }
    }

    /// Format of a backup file, judged by its extension alone.
    pub fn detect(&self, path: &Path) -> Option<Format> {
        let extension = path.extension()?.to_str()?;
        Format::from_extension(extension).filter(|format| self.formats.contains(format))
    }

    pub fn encoder(&self, format: Format) -> Box<dyn DocumentEncoder> {
        format.encoder(self.json_mode)
    }

    pub fn decode(&self, format: Format, source: &Path, bytes: &[u8]) -> Result<Vec<Document>> {
        format.decode(source, bytes)
    }

    pub fn extensions(&self) -> Vec<&'static str> {
        self.formats.iter().map(|format| format.extension()).collect()
    }
}

fn to_extjson(value: Bson, mode: JsonMode) -> serde_json::Value {
    match mode {
        JsonMode::Canonical => value.into_canonical_extjson(),
        JsonMode::Relaxed => value.into_relaxed_extjson(),
    }
}
