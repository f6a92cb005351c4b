// docbackup/src/formats/csv.rs
use mongodb::bson::{Bson, Document};
use std::path::Path;
use tracing::warn;

use super::{to_extjson, DocumentEncoder, JsonMode};
use crate::errors::{AppError, Result};

/// Columns are fixed by the first document seen. Strings are written as-is
/// unless they would read back as something else, every other value as
/// extended JSON text.
pub struct CsvEncoder {
    mode: JsonMode,
    header: Option<Vec<String>>,
    warned_extra_fields: bool,
}

impl CsvEncoder {
    pub fn new(mode: JsonMode) -> Self {
        Self {
            mode,
            header: None,
            warned_extra_fields: false,
        }
    }

    fn cell(&self, value: Option<&Bson>) -> Result<String> {
        Ok(match value {
            None => String::new(),
            Some(Bson::String(s)) if !needs_quoting(s) => s.clone(),
            Some(Bson::String(s)) => serde_json::to_string(s)?,
            Some(other) => serde_json::to_string(&to_extjson(other.clone(), self.mode))?,
        })
    }
}

impl DocumentEncoder for CsvEncoder {
    fn encode(&mut self, document: &Document) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        if self.header.is_none() {
            let columns: Vec<String> = document.keys().cloned().collect();
            writer.write_record(&columns)?;
            self.header = Some(columns);
        }
        let header = self.header.as_deref().unwrap_or_default();

        if !self.warned_extra_fields && document.keys().any(|key| !header.contains(key)) {
            warn!(
                "⚠️ Document has fields outside the CSV header {:?}; they will not be written",
                header
            );
            self.warned_extra_fields = true;
        }

        let record = header
            .iter()
            .map(|column| self.cell(document.get(column)))
            .collect::<Result<Vec<String>>>()?;
        writer.write_record(&record)?;

        writer.into_inner().map_err(|e| AppError::Encode {
            format: "csv".to_string(),
            message: e.to_string(),
        })
    }
}

/// Empty strings and strings that parse as JSON are written as JSON strings,
/// so a cell never reads back as a missing field or a typed value.
fn needs_quoting(s: &str) -> bool {
    s.is_empty() || serde_json::from_str::<serde_json::Value>(s).is_ok()
}

pub fn decode(source: &Path, bytes: &[u8]) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader.headers().map_err(|e| decode_error(source, e))?.clone();

    let mut documents = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| decode_error(source, e))?;
        let mut document = Document::new();
        for (field, cell) in headers.iter().zip(record.iter()) {
            // Empty cells stand for fields the document did not have.
            if cell.is_empty() {
                continue;
            }
            document.insert(field, parse_cell(cell));
        }
        documents.push(document);
    }
    Ok(documents)
}

fn parse_cell(cell: &str) -> Bson {
    match serde_json::from_str::<serde_json::Value>(cell) {
        Ok(serde_json::Value::String(s)) => Bson::String(s),
        Ok(value) => Bson::try_from(value).unwrap_or_else(|_| Bson::String(cell.to_string())),
        Err(_) => Bson::String(cell.to_string()),
    }
}

fn decode_error(source: &Path, err: csv::Error) -> AppError {
    AppError::Decode {
        path: source.to_path_buf(),
        message: err.to_string(),
    }
}
