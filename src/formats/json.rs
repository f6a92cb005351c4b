// docbackup/src/formats/json.rs
use mongodb::bson::{Bson, Document};
use std::path::Path;

use super::{to_extjson, DocumentEncoder, JsonMode};
use crate::errors::{AppError, Result};

pub struct JsonLinesEncoder {
    mode: JsonMode,
}

impl JsonLinesEncoder {
    pub fn new(mode: JsonMode) -> Self {
        Self { mode }
    }
}

impl DocumentEncoder for JsonLinesEncoder {
    fn encode(&mut self, document: &Document) -> Result<Vec<u8>> {
        let value = to_extjson(Bson::Document(document.clone()), self.mode);
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Accepts JSON lines, or a single top-level array of documents as written
/// by older exports.
pub fn decode(source: &Path, bytes: &[u8]) -> Result<Vec<Document>> {
    let text = std::str::from_utf8(bytes).map_err(|e| decode_error(source, e))?;
    let trimmed = text.trim_start();

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(trimmed).map_err(|e| decode_error(source, e))?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                value_to_document(value)
                    .map_err(|e| decode_error(source, format!("element {}: {}", i, e)))
            })
            .collect();
    }

    let mut documents = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| decode_error(source, format!("line {}: {}", number + 1, e)))?;
        let document = value_to_document(value)
            .map_err(|e| decode_error(source, format!("line {}: {}", number + 1, e)))?;
        documents.push(document);
    }
    Ok(documents)
}

fn value_to_document(value: serde_json::Value) -> std::result::Result<Document, String> {
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(format!("expected a document, found {:?}", other.element_type())),
        Err(e) => Err(e.to_string()),
    }
}

fn decode_error(source: &Path, message: impl ToString) -> AppError {
    AppError::Decode {
        path: source.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn test_encodes_one_line_per_document() -> anyhow::Result<()> {
        let mut encoder = JsonLinesEncoder::new(JsonMode::Relaxed);
        let line = encoder.encode(&doc! { "name": "Ada", "age": 36 })?;
        assert_eq!(String::from_utf8(line)?, "{\"name\":\"Ada\",\"age\":36}\n");
        Ok(())
    }

    #[test]
    fn test_canonical_mode_keeps_bson_types() -> anyhow::Result<()> {
        let original = doc! {
            "_id": ObjectId::new(),
            "small": 7_i32,
            "big": 7_i64,
            "ratio": 0.5,
            "at": DateTime::from_millis(1_700_000_000_000),
            "tags": ["a", "b"],
            "nested": { "ok": true, "none": Bson::Null },
        };
        let mut encoder = JsonLinesEncoder::new(JsonMode::Canonical);
        let bytes = encoder.encode(&original)?;
        let decoded = decode(Path::new("t.json"), &bytes)?;
        assert_eq!(decoded, vec![original]);
        assert_eq!(decoded[0].get_i64("big")?, 7);
        assert_eq!(decoded[0].get_i32("small")?, 7);
        Ok(())
    }

    #[test]
    fn test_decodes_legacy_array_layout() -> anyhow::Result<()> {
        let bytes = br#"[{"name":"a"},{"name":"b"}]"#;
        let decoded = decode(Path::new("t.json"), bytes)?;
        assert_eq!(decoded, vec![doc! { "name": "a" }, doc! { "name": "b" }]);
        Ok(())
    }

    #[test]
    fn test_blank_lines_are_ignored() -> anyhow::Result<()> {
        let bytes = b"{\"n\":1}\n\n   \n{\"n\":2}\n";
        assert_eq!(decode(Path::new("t.json"), bytes)?.len(), 2);
        assert!(decode(Path::new("t.json"), b"")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let bytes = b"{\"n\":1}\n{\"n\":\n";
        match decode(Path::new("broken.json"), bytes) {
            Err(AppError::Decode { path, message }) => {
                assert_eq!(path, Path::new("broken.json"));
                assert!(message.starts_with("line 2"), "{message}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_document_line_is_rejected() {
        assert!(decode(Path::new("t.json"), b"42\n").is_err());
    }
}
