use serde_json::Value;

use crate::error::{Error, Result};

pub fn json_to_msgpack(value: &Value) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| Error::render("msgpack", e))
}
