//! Crate-wide error type.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The generated `.proto` text was rejected by the parser or the descriptor pool.
    #[error("generated schema failed to parse: {reason}")]
    SchemaParse { reason: String, source_text: String },

    /// The root message could not be found after compiling the schema.
    #[error("root message type `{0}` is missing from the compiled schema")]
    MissingRootType(String),

    /// A non-root message or field disagrees with the descriptor it was rendered from.
    #[error("type `{name}` did not resolve: {reason}")]
    UnresolvedType { name: String, reason: String },

    #[error("value at `{path}` does not fit the schema: {reason}")]
    Encoding { path: String, reason: String },

    #[error("failed to decode protobuf buffer: {0}")]
    Decoding(String),

    #[error("invalid {format} input: {reason}")]
    Input { format: &'static str, reason: String },

    #[error("failed to render {format}: {reason}")]
    Render { format: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn encoding(path: &str, reason: impl Into<String>) -> Self {
        let path = if path.is_empty() { "$".to_string() } else { path.to_string() };
        Error::Encoding { path, reason: reason.into() }
    }

    pub(crate) fn input(format: &'static str, reason: impl ToString) -> Self {
        Error::Input { format, reason: reason.to_string() }
    }

    pub(crate) fn render(format: &'static str, reason: impl ToString) -> Self {
        Error::Render { format, reason: reason.to_string() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}
