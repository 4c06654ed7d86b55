//! Document loaders. Every input format ends up as one `serde_json::Value`.
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Json,
    Ndjson,
    Csv,
    Xml,
}

impl InputFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            "csv" => Some(Self::Csv),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

/// Reads and parses one document. Without a forced format the extension decides,
/// falling back to JSON.
pub fn load_document(path: &Path, format: Option<InputFormat>) -> Result<Value> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .unwrap_or(InputFormat::Json);
    let source = std::fs::read_to_string(path).map_err(|error| Error::io(path, error))?;
    tracing::debug!(path = %path.display(), ?format, bytes = source.len(), "loading document");
    parse_document(&source, format)
}

pub fn parse_document(source: &str, format: InputFormat) -> Result<Value> {
    match format {
        InputFormat::Json => serde_json::from_str(source).map_err(|e| Error::input("json", e)),
        InputFormat::Ndjson => parse_ndjson(source),
        InputFormat::Csv => super::csv::csv_to_json(source),
        InputFormat::Xml => super::xml::xml_to_json(source),
    }
}

/// Newline-delimited JSON becomes an array of its documents. Blank lines are skipped.
pub fn parse_ndjson(source: &str) -> Result<Value> {
    let mut documents = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let document = serde_json::from_str::<Value>(line)
            .map_err(|e| Error::input("ndjson", format!("line {}: {e}", index + 1)))?;
        documents.push(document);
    }
    Ok(Value::Array(documents))
}
