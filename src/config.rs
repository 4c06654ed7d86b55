//! Inference policy and run configuration.
//!
//! Every field has a default so an empty `{}` config file is valid. Config files
//! are JSON and decoded through [`crate::path_de`] so a bad field is reported with
//! its JSON path.
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::formats::OutputFormat;

// ————————————————————————————————————————————————————————————————————————————
// INFERENCE POLICY
// ————————————————————————————————————————————————————————————————————————————

/// How the element type of a JSON array is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ArrayStrategy {
    /// Join the evidence of every element; mixed scalars widen or fall back to `string`.
    #[default]
    Unify,
    /// Look only at the first element. Later elements of another shape surface as
    /// encoding errors.
    FirstElement,
}

/// What to emit for a value whose type cannot be observed (`null`, `[]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Declare the field as `string`.
    #[default]
    #[serde(alias = "as_string")]
    String,
    /// Leave the field out of the message; the coercer drops its values.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferOptions {
    /// Name of the root message.
    pub root_name: String,
    /// Field that boxes a root value which is not a JSON object.
    pub root_field: String,
    /// Optional `package` line for the generated schema.
    pub package: Option<String>,
    pub array_strategy: ArrayStrategy,
    pub unknown_type: UnknownTypePolicy,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            root_name: "Data".to_string(),
            root_field: "data".to_string(),
            package: None,
            array_strategy: ArrayStrategy::default(),
            unknown_type: UnknownTypePolicy::default(),
        }
    }
}

static PACKAGE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"));

impl InferOptions {
    /// Rejects options that would only fail later as an unparsable schema.
    /// Root names are sanitized during lowering, so only the package is checked.
    pub fn validate(&self) -> Result<()> {
        let Some(package) = self.package.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(());
        };
        if let Some(segment) = package.split('.').find(|s| !PACKAGE_SEGMENT.is_match(s)) {
            return Err(Error::Config(format!(
                "package `{package}` has an invalid segment `{segment}`; expected dot-separated identifiers"
            )));
        }
        Ok(())
    }
}

pub(crate) fn qualify(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{package}.{name}"),
        _ => name.to_string(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RUN CONFIGURATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub infer: InferOptions,
    /// Output formats produced by `convert`, in write order.
    pub formats: Vec<OutputFormat>,
    /// Also write the generated `schema.proto`.
    pub emit_schema: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            infer: InferOptions::default(),
            formats: OutputFormat::ALL.to_vec(),
            emit_schema: false,
        }
    }
}

impl Config {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config = crate::path_de::from_str_with_path::<Config>(source)
            .map_err(|error| Error::Config(error.to_string()))?;
        config.infer.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|error| Error::io(path, error))?;
        let config = crate::path_de::from_slice_with_path::<Config>(&bytes)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))?;
        config.infer.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn policies_parse_from_snake_case() {
        let config = Config::from_json_str(
            r#"{"infer": {"array_strategy": "first_element", "unknown_type": "skip", "package": "acme.v1"}}"#,
        )
        .unwrap();
        assert_eq!(config.infer.array_strategy, ArrayStrategy::FirstElement);
        assert_eq!(config.infer.unknown_type, UnknownTypePolicy::Skip);
        assert_eq!(config.infer.package.as_deref(), Some("acme.v1"));
    }

    #[test]
    fn bad_field_reports_json_path() {
        let err = Config::from_json_str(r#"{"infer": {"array_strategy": "sometimes"}}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("infer.array_strategy"), "msg: {msg}");
    }

    #[test]
    fn formats_list_round_trips() {
        let config = Config::from_json_str(r#"{"formats": ["yaml", "protobuf"]}"#).unwrap();
        assert_eq!(config.formats, vec![OutputFormat::Yaml, OutputFormat::Protobuf]);
    }

    #[test]
    fn package_must_be_dotted_identifiers() {
        for good in ["acme", "acme.v1", "_x.y_2"] {
            let options = InferOptions { package: Some(good.into()), ..Default::default() };
            assert!(options.validate().is_ok(), "{good}");
        }
        let blank = InferOptions { package: Some(String::new()), ..Default::default() };
        assert!(blank.validate().is_ok());

        for bad in ["acme-corp", "acme..v1", "1acme", "acme.", "acme v1"] {
            let options = InferOptions { package: Some(bad.into()), ..Default::default() };
            assert!(matches!(options.validate(), Err(Error::Config(_))), "{bad}");
        }

        let err = Config::from_json_str(r#"{"infer": {"package": "acme-corp"}}"#).unwrap_err();
        assert!(err.to_string().contains("invalid segment `acme-corp`"), "{err}");
    }
}
