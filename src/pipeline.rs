//! One document in, named artifacts out.
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::compile::{compile, CompiledSchema, SCHEMA_FILE_NAME};
use crate::config::{Config, InferOptions};
use crate::encode::encode;
use crate::error::{Error, Result};
use crate::formats::{render_schemaless, Artifact};
use crate::lower::infer_schema;

/// Result of the protobuf path: the schema it was encoded against and the buffer.
#[derive(Debug, Clone)]
pub struct ProtoArtifact {
    pub schema_source: String,
    pub bytes: Vec<u8>,
    pub compiled: CompiledSchema,
}

/// Infers a schema from `value`, compiles it and encodes `value` against it.
pub fn json_to_protobuf(value: &Value, options: &InferOptions) -> Result<ProtoArtifact> {
    options.validate()?;
    let schema = infer_schema(value, options);
    let compiled = compile(&schema)?;
    let bytes = encode(value, &compiled)?;
    Ok(ProtoArtifact { schema_source: compiled.source().to_string(), bytes, compiled })
}

/// Renders every configured format for one document, in config order. The
/// schema file comes last when requested.
pub fn convert_document(value: &Value, config: &Config) -> Result<Vec<Artifact>> {
    config.infer.validate()?;
    let mut artifacts = Vec::with_capacity(config.formats.len() + 1);
    let mut proto: Option<ProtoArtifact> = None;
    for &format in &config.formats {
        let bytes = match render_schemaless(value, format) {
            Some(rendered) => rendered?,
            None => match &proto {
                Some(proto) => proto.bytes.clone(),
                None => {
                    let encoded = json_to_protobuf(value, &config.infer)?;
                    let bytes = encoded.bytes.clone();
                    proto = Some(encoded);
                    bytes
                }
            },
        };
        artifacts.push(Artifact::new(format, bytes));
    }
    if config.emit_schema {
        let source = match proto {
            Some(proto) => proto.schema_source,
            None => compile(&infer_schema(value, &config.infer))?.source().to_string(),
        };
        artifacts.push(Artifact {
            file_name: SCHEMA_FILE_NAME,
            mime_type: "text/plain",
            bytes: source.into_bytes(),
        });
    }
    tracing::debug!(artifacts = artifacts.len(), "converted document");
    Ok(artifacts)
}

/// Writes artifacts into `dir`, creating it if needed. Returns the written paths.
pub fn write_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|error| Error::io(dir, error))?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(artifact.file_name);
        std::fs::write(&path, &artifact.bytes).map_err(|error| Error::io(&path, error))?;
        written.push(path);
    }
    Ok(written)
}
