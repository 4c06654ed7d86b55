//! CLI: load → infer → (convert | schema | decode)
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use json_transcode::config::{ArrayStrategy, Config, UnknownTypePolicy};
use json_transcode::formats::input::{load_document, InputFormat};
use json_transcode::formats::OutputFormat;
use json_transcode::inference::Inference;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer a protobuf schema from JSON and transcode documents to xml, yaml, csv, protobuf and msgpack
#[derive(Parser, Debug)]
#[command(name = "json-transcode", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// convert each input into every configured output format
    Convert(ConvertOut),
    /// infer and print the generated .proto schema
    Schema(SchemaOut),
    /// decode a protobuf buffer against the schema inferred from its source document
    Decode(DecodeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// force the input format instead of detecting it from the file extension
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct ConfigSettings {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// package line for the generated schema (e.g. acme.v1)
    #[arg(long)]
    package: Option<String>,

    /// name of the root message
    #[arg(long)]
    root_name: Option<String>,

    /// field that boxes a root value which is not an object
    #[arg(long)]
    root_field: Option<String>,

    /// how the element type of an array is decided
    #[arg(long, value_enum)]
    array_strategy: Option<ArrayStrategy>,

    /// what to declare for values with no observable type (null, [])
    #[arg(long, value_enum)]
    unknown_type: Option<UnknownTypePolicy>,
}

#[derive(clap::Parser, Debug)]
struct ConvertOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    config_settings: ConfigSettings,

    /// output directory; several inputs each get a subdirectory named after the file
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// output formats to write (defaults to all, or the config file's list)
    #[arg(long = "format", value_enum)]
    formats: Vec<OutputFormat>,

    /// also write the generated schema.proto
    #[arg(long)]
    emit_schema: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    config_settings: ConfigSettings,

    /// output .proto file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    config_settings: ConfigSettings,

    /// protobuf buffer written by `convert`
    #[arg(long)]
    buffer: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn source_paths(&self) -> Result<Vec<PathBuf>> {
        expand_inputs(&self.input)
    }

    fn input_format(&self) -> Option<InputFormat> {
        if self.ndjson { Some(InputFormat::Ndjson) } else { self.input_format }
    }

    /// Loads one file and applies the pointer and jq selections. A jq filter that
    /// yields several outputs produces an array of them.
    fn load(&self, source_path: &Path) -> Result<Value> {
        let source_path_str = source_path.to_string_lossy();
        let mut value = load_document(source_path, self.input_format())
            .with_context(|| format!("failed to load {source_path_str}"))?;
        if let Some(pointer) = self.json_pointer.as_ref() {
            value = value
                .pointer(pointer)
                .cloned()
                .with_context(|| format!("JSON pointer {pointer} selects nothing in {source_path_str}"))?;
        }
        if let Some(jq_expr) = self.jq_expr.as_ref() {
            let mut outputs = crate::jq_exec::run_jaq(jq_expr, &value).with_context(|| {
                format!("failed to apply jq expression to source file ({source_path_str})")
            })?;
            value = match outputs.len() {
                1 => outputs.remove(0),
                _ => Value::Array(outputs),
            };
        }
        Ok(value)
    }
}

impl ConfigSettings {
    fn resolve(&self) -> Result<Config> {
        let mut config = match self.config.as_ref() {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(package) = self.package.as_ref() {
            config.infer.package = Some(package.clone());
        }
        if let Some(root_name) = self.root_name.as_ref() {
            config.infer.root_name = root_name.clone();
        }
        if let Some(root_field) = self.root_field.as_ref() {
            config.infer.root_field = root_field.clone();
        }
        if let Some(strategy) = self.array_strategy {
            config.infer.array_strategy = strategy;
        }
        if let Some(policy) = self.unknown_type {
            config.infer.unknown_type = policy;
        }
        config.infer.validate()?;
        Ok(config)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Convert(target) => target.run(),
            Command::Schema(target) => target.run(),
            Command::Decode(target) => target.run(),
        }
    }
}

impl ConvertOut {
    fn run(&self) -> Result<()> {
        let mut config = self.config_settings.resolve()?;
        if !self.formats.is_empty() {
            config.formats = self.formats.clone();
        }
        config.emit_schema |= self.emit_schema;

        let source_paths = self.input_settings.source_paths()?;
        let nested = source_paths.len() > 1;
        let mut failures = 0usize;
        for source_path in &source_paths {
            let out_dir = if nested { self.out.join(file_stem(source_path)) } else { self.out.clone() };
            match self.convert_one(source_path, &out_dir, &config) {
                Ok(written) => {
                    for path in written {
                        println!("{} {}", "wrote".green(), path.display());
                    }
                }
                Err(error) => {
                    failures += 1;
                    eprintln!("{} {}: {error:#}", "failed".red(), source_path.display());
                }
            }
        }
        if failures > 0 {
            bail!("{failures} of {} documents failed", source_paths.len());
        }
        Ok(())
    }

    fn convert_one(&self, source_path: &Path, out_dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
        let value = self.input_settings.load(source_path)?;
        let artifacts = json_transcode::convert_document(&value, config)?;
        Ok(json_transcode::write_artifacts(out_dir, &artifacts)?)
    }
}

impl SchemaOut {
    fn run(&self) -> Result<()> {
        let config = self.config_settings.resolve()?;

        // every input contributes to one schema
        let mut inference = Inference::new(config.infer.array_strategy);
        for source_path in self.input_settings.source_paths()? {
            let value = self.input_settings.load(&source_path)?;
            inference.observe_value(&value);
        }
        let schema = json_transcode::lower::lower_to_schema(&inference.solve(), &config.infer);
        let compiled = json_transcode::compile(&schema)?;

        match self.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                std::fs::write(out, compiled.source())
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("{} {}", "wrote".green(), out.display());
            }
            None => print!("{}", compiled.source()),
        }
        Ok(())
    }
}

impl DecodeOut {
    fn run(&self) -> Result<()> {
        let config = self.config_settings.resolve()?;
        let source_paths = self.input_settings.source_paths()?;
        let [source_path] = source_paths.as_slice() else {
            bail!("decode takes exactly one source document, got {}", source_paths.len());
        };
        let value = self.input_settings.load(source_path)?;
        let compiled = json_transcode::compile(&json_transcode::infer_schema(&value, &config.infer))?;
        let bytes = std::fs::read(&self.buffer)
            .with_context(|| format!("failed to read {}", self.buffer.display()))?;
        let decoded = json_transcode::decode(&bytes, &compiled)?;
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Expands `--input` values into source files, in order and without repeats.
///
/// A value naming an existing path is used as is, glob characters or not. Other
/// values containing `*`, `?` or `[` are patterns and must match at least one
/// file; directories they match are skipped. Remaining values pass through so a
/// missing file is reported when it is loaded.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for input in inputs {
        let literal = Path::new(input);
        let matches = if literal.exists() || !input.contains(['*', '?', '[']) {
            vec![literal.to_path_buf()]
        } else {
            let mut files = Vec::new();
            for entry in glob::glob(input).with_context(|| format!("invalid input pattern {input}"))? {
                let path = entry.with_context(|| format!("failed to read a match of {input}"))?;
                if path.is_file() {
                    files.push(path);
                }
            }
            if files.is_empty() {
                bail!("input pattern {input} matched no files");
            }
            files
        };
        sources.extend(matches.into_iter().filter(|path| seen.insert(path.clone())));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_expand_in_order_without_repeats() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();
        let bracketed = dir.path().join("[raw].json");
        std::fs::write(&bracketed, "{}").unwrap();

        let pattern = format!("{}/*.json", dir.path().display());
        let inputs = vec![
            dir.path().join("b.json").display().to_string(),
            pattern,
            "missing.json".to_string(),
            bracketed.display().to_string(),
        ];
        let paths = expand_inputs(&inputs).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("b.json"),
                dir.path().join("[raw].json"),
                dir.path().join("a.json"),
                PathBuf::from("missing.json"),
            ]
        );

        let empty = format!("{}/*.csv", dir.path().display());
        let err = expand_inputs(&[empty]).unwrap_err();
        assert!(err.to_string().contains("matched no files"), "{err}");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"infer": {"package": "from.file", "root_name": "Doc"}}"#).unwrap();
        let settings = ConfigSettings {
            config: Some(path),
            package: Some("from.flag".into()),
            root_name: None,
            root_field: Some("rows".into()),
            array_strategy: Some(ArrayStrategy::FirstElement),
            unknown_type: None,
        };
        let config = settings.resolve().unwrap();
        assert_eq!(config.infer.package.as_deref(), Some("from.flag"));
        assert_eq!(config.infer.root_name, "Doc");
        assert_eq!(config.infer.root_field, "rows");
        assert_eq!(config.infer.array_strategy, ArrayStrategy::FirstElement);
    }

    #[test]
    fn bad_package_flag_is_a_config_error() {
        let cli = CommandLineInterface::try_parse_from([
            "json-transcode", "schema", "-i", "a.json", "--package", "acme-corp.v1",
        ])
        .unwrap();
        let Command::Schema(target) = cli.cmd else { panic!("expected schema command") };
        let err = target.config_settings.resolve().unwrap_err();
        let error = err.downcast_ref::<json_transcode::Error>().expect("crate error");
        assert!(matches!(error, json_transcode::Error::Config(_)), "{err}");
    }

    #[test]
    fn cli_parses_convert() {
        let cli = CommandLineInterface::try_parse_from([
            "json-transcode", "convert", "-i", "a.json", "--format", "yaml", "--format", "protobuf", "--emit-schema",
        ])
        .unwrap();
        match cli.cmd {
            Command::Convert(target) => {
                assert_eq!(target.formats, vec![OutputFormat::Yaml, OutputFormat::Protobuf]);
                assert!(target.emit_schema);
                assert_eq!(target.out, PathBuf::from("."));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
