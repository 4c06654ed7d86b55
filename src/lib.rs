//! Infer a protobuf schema from arbitrary JSON, encode the document against it, and
//! re-serialize the same document as XML, YAML, CSV and MessagePack.
//!
//! The protobuf path runs in stages: [`inference`] collects evidence about the
//! document's shape, [`lower`] turns it into a [`ir::Schema`], [`compile`] renders
//! and resolves the `.proto` text, and [`encode`] coerces and serializes the value.
pub mod coerce;
pub mod compile;
pub mod config;
pub mod encode;
pub mod error;
pub mod formats;
pub mod inference;
pub mod ir;
pub mod lower;
pub mod path_de;
pub mod pipeline;

pub use compile::{compile, CompiledSchema};
pub use config::{ArrayStrategy, Config, InferOptions, UnknownTypePolicy};
pub use encode::{decode, encode};
pub use error::{Error, Result};
pub use formats::{Artifact, OutputFormat};
pub use lower::infer_schema;
pub use pipeline::{convert_document, json_to_protobuf, write_artifacts, ProtoArtifact};
