//! JSON decoding that remembers where it failed.
use std::fmt;

use serde::de::DeserializeOwned;

/// A decode failure together with the JSON path of the offending node (`.` when
/// the document itself is malformed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at JSON path {} → {}", self.path, self.message)
    }
}

impl std::error::Error for PathError {}

pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    from_slice_with_path(src.as_bytes())
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| PathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}
