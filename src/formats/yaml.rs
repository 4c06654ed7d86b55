use serde_json::Value;

use crate::error::{Error, Result};

pub fn json_to_yaml(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::render("yaml", e))
}
