//! Output formats and the text/binary renderers behind them.
//!
//! Protobuf is the only format that needs a schema; it is produced by the
//! pipeline. Everything else is a direct re-serialization of the document.
pub mod csv;
pub mod input;
pub mod msgpack;
pub mod xml;
pub mod yaml;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Xml,
    Yaml,
    Csv,
    Protobuf,
    Msgpack,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Xml,
        OutputFormat::Yaml,
        OutputFormat::Csv,
        OutputFormat::Protobuf,
        OutputFormat::Msgpack,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
            Self::Protobuf => "protobuf",
            Self::Msgpack => "msgpack",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Xml => "data.xml",
            Self::Yaml => "data.yaml",
            Self::Csv => "data.csv",
            Self::Protobuf => "data.pb",
            Self::Msgpack => "data.msgpack",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Yaml => "application/yaml",
            Self::Csv => "text/csv",
            Self::Protobuf => "application/x-protobuf",
            Self::Msgpack => "application/msgpack",
        }
    }
}

/// One named output file, kept in memory until it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(format: OutputFormat, bytes: Vec<u8>) -> Self {
        Self { file_name: format.file_name(), mime_type: format.mime_type(), bytes }
    }
}

/// Renders every format that does not need a schema. Returns `None` for
/// [`OutputFormat::Protobuf`].
pub fn render_schemaless(value: &Value, format: OutputFormat) -> Option<Result<Vec<u8>>> {
    let rendered = match format {
        OutputFormat::Xml => Ok(xml::json_to_xml(value).into_bytes()),
        OutputFormat::Yaml => yaml::json_to_yaml(value).map(String::into_bytes),
        OutputFormat::Csv => csv::json_to_csv(value).map(String::into_bytes),
        OutputFormat::Msgpack => msgpack::json_to_msgpack(value),
        OutputFormat::Protobuf => return None,
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_names_are_distinct() {
        let mut names: Vec<&str> = OutputFormat::ALL.iter().map(|f| f.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), OutputFormat::ALL.len());
    }

    #[test]
    fn protobuf_needs_a_schema() {
        let value = json!({"a": 1});
        assert!(render_schemaless(&value, OutputFormat::Protobuf).is_none());
        for format in OutputFormat::ALL.into_iter().filter(|f| *f != OutputFormat::Protobuf) {
            let bytes = render_schemaless(&value, format).unwrap().unwrap();
            assert!(!bytes.is_empty(), "{}", format.label());
        }
    }
}
