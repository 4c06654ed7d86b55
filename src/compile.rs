//! Schema compiler: IR → `.proto` text → resolved descriptors.
//!
//! The rendered text goes through a real `.proto` parser and a descriptor pool
//! instead of being turned into descriptors directly, so whatever we hand to the
//! encoder is exactly what any other protobuf toolchain would read back from the
//! schema file we emit.
use prost_reflect::{DescriptorPool, FieldDescriptor as ReflectField, Kind, MessageDescriptor as ReflectMessage};

use crate::config::qualify;
use crate::error::{Error, Result};
use crate::ir::{FieldDescriptor, MessageDescriptor, Schema, WireType};

/// Virtual file name the generated schema is parsed under.
pub const SCHEMA_FILE_NAME: &str = "schema.proto";

// ————————————————————————————————————————————————————————————————————————————
// RENDER
// ————————————————————————————————————————————————————————————————————————————

/// Renders the schema as a proto3 document: header, optional package, then one
/// `message` block per descriptor in schema order.
pub fn render_proto(schema: &Schema) -> String {
    let package = schema.package.as_deref();
    let mut out = String::from("syntax = \"proto3\";\n");
    if let Some(package) = package {
        out.push_str(&format!("\npackage {package};\n"));
    }
    for message in &schema.messages {
        out.push_str(&format!("\nmessage {} {{\n", message.name));
        for field in &message.fields {
            let label = if field.repeated { "repeated " } else { "" };
            // Message types are written fully qualified so field names can never
            // shadow them during resolution.
            let ty = match &field.wire_type {
                WireType::Message(name) => format!(".{}", qualify(package, name)),
                scalar => scalar.proto_name().to_string(),
            };
            out.push_str(&format!("  {label}{ty} {} = {};\n", field.name, field.position));
        }
        out.push_str("}\n");
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILE
// ————————————————————————————————————————————————————————————————————————————

pub fn compile(schema: &Schema) -> Result<CompiledSchema> {
    let source = render_proto(schema);
    let parse_error = |reason: String| Error::SchemaParse { reason, source_text: source.clone() };

    let file = protox_parse::parse(SCHEMA_FILE_NAME, &source)
        .map_err(|error| parse_error(error.to_string()))?;
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file)
        .map_err(|error| parse_error(error.to_string()))?;

    let package = schema.package.as_deref();
    let root_name = qualify(package, &schema.root);
    if pool.get_message_by_name(&root_name).is_none() {
        return Err(Error::MissingRootType(root_name));
    }

    let mut messages = Vec::with_capacity(schema.messages.len());
    let mut root_index = None;
    for message in &schema.messages {
        let full_name = qualify(package, &message.name);
        let reflect = pool.get_message_by_name(&full_name).ok_or_else(|| Error::UnresolvedType {
            name: full_name.clone(),
            reason: "message is missing from the descriptor pool".to_string(),
        })?;
        if message.name == schema.root {
            root_index = Some(messages.len());
        }
        messages.push(ResolvedMessage::resolve(message, reflect)?);
    }
    let root_index = root_index.ok_or(Error::MissingRootType(root_name))?;

    tracing::debug!(messages = messages.len(), bytes = source.len(), "compiled schema");
    Ok(CompiledSchema { schema: schema.clone(), source, messages, root_index })
}

/// Maps a resolved field kind back onto the wire types lowering can produce.
pub fn wire_type_of_kind(kind: &Kind) -> Option<WireType> {
    match kind {
        Kind::String => Some(WireType::String),
        Kind::Int32 => Some(WireType::Int32),
        Kind::Int64 => Some(WireType::Int64),
        Kind::Double => Some(WireType::Double),
        Kind::Bool => Some(WireType::Bool),
        Kind::Message(message) => Some(WireType::Message(message.name().to_string())),
        _ => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLVED TYPES
// ————————————————————————————————————————————————————————————————————————————

/// The schema after parsing and resolution. Coercion and encoding only ever see
/// messages handed out from here.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: Schema,
    source: String,
    messages: Vec<ResolvedMessage>,
    root_index: usize,
}

impl CompiledSchema {
    /// The generated `.proto` text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn root(&self) -> &ResolvedMessage {
        &self.messages[self.root_index]
    }

    pub fn messages(&self) -> &[ResolvedMessage] {
        &self.messages
    }

    /// Looks a message up by its unqualified name.
    pub fn message(&self, name: &str) -> Option<&ResolvedMessage> {
        self.messages.iter().find(|m| m.name() == name)
    }

    /// The message a message-typed field points at.
    pub fn nested(&self, field: &ResolvedField) -> Option<&ResolvedMessage> {
        match &field.ir.wire_type {
            WireType::Message(name) => self.message(name),
            _ => None,
        }
    }

    /// Introspection of a message's fields as the descriptor pool sees them.
    pub fn field_shapes(&self, message: &str) -> Option<Vec<FieldShape>> {
        let message = self.message(message)?;
        Some(message.fields.iter().map(ResolvedField::shape).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldShape {
    pub name: String,
    pub position: u32,
    pub repeated: bool,
    pub wire_type: WireType,
    /// Fully qualified name of the nested message, for message-typed fields.
    pub nested_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedMessage {
    ir: MessageDescriptor,
    reflect: ReflectMessage,
    fields: Vec<ResolvedField>,
}

impl ResolvedMessage {
    fn resolve(ir: &MessageDescriptor, reflect: ReflectMessage) -> Result<Self> {
        let unresolved = |reason: String| Error::UnresolvedType {
            name: reflect.full_name().to_string(),
            reason,
        };
        if reflect.fields().len() != ir.fields.len() {
            return Err(unresolved(format!(
                "expected {} fields, descriptor has {}",
                ir.fields.len(),
                reflect.fields().len()
            )));
        }
        let mut fields = Vec::with_capacity(ir.fields.len());
        for field in &ir.fields {
            let resolved = reflect
                .get_field_by_name(&field.name)
                .ok_or_else(|| unresolved(format!("field `{}` is missing", field.name)))?;
            if resolved.number() != field.position || resolved.is_list() != field.repeated {
                return Err(unresolved(format!("field `{}` changed number or label", field.name)));
            }
            if wire_type_of_kind(&resolved.kind()).as_ref() != Some(&field.wire_type) {
                return Err(unresolved(format!(
                    "field `{}` resolved to {:?}, expected {}",
                    field.name,
                    resolved.kind(),
                    field.wire_type
                )));
            }
            fields.push(ResolvedField { ir: field.clone(), reflect: resolved });
        }
        Ok(Self { ir: ir.clone(), reflect, fields })
    }

    pub fn name(&self) -> &str {
        &self.ir.name
    }

    pub fn full_name(&self) -> &str {
        self.reflect.full_name()
    }

    pub fn is_wrapper(&self) -> bool {
        self.ir.wrapper
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn reflect(&self) -> &ReflectMessage {
        &self.reflect
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedField {
    ir: FieldDescriptor,
    reflect: ReflectField,
}

impl ResolvedField {
    pub fn name(&self) -> &str {
        &self.ir.name
    }

    pub fn json_key(&self) -> &str {
        &self.ir.json_key
    }

    pub fn is_list(&self) -> bool {
        self.reflect.is_list()
    }

    pub fn kind(&self) -> Kind {
        self.reflect.kind()
    }

    pub fn wire_type(&self) -> &WireType {
        &self.ir.wire_type
    }

    pub fn reflect(&self) -> &ReflectField {
        &self.reflect
    }

    fn shape(&self) -> FieldShape {
        let kind = self.reflect.kind();
        let nested_type = kind.as_message().map(|m| m.full_name().to_string());
        FieldShape {
            name: self.reflect.name().to_string(),
            position: self.reflect.number(),
            repeated: self.reflect.is_list(),
            wire_type: wire_type_of_kind(&kind).unwrap_or_else(|| self.ir.wire_type.clone()),
            nested_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferOptions;
    use crate::lower::infer_schema;
    use serde_json::json;

    fn compiled(v: serde_json::Value) -> CompiledSchema {
        compile(&infer_schema(&v, &InferOptions::default())).expect("schema compiles")
    }

    #[test]
    fn renders_flat_message() {
        let schema = infer_schema(&json!({"a": 1, "b": "x"}), &InferOptions::default());
        let text = render_proto(&schema);
        assert_eq!(
            text,
            "syntax = \"proto3\";\n\nmessage Data {\n  int32 a = 1;\n  string b = 2;\n}\n"
        );
    }

    #[test]
    fn renders_nested_and_repeated_with_package() {
        let options = InferOptions { package: Some("acme.v1".into()), ..Default::default() };
        let schema = infer_schema(&json!({"tags": ["x"], "owner": {"id": 7}}), &options);
        let text = render_proto(&schema);
        assert!(text.contains("\npackage acme.v1;\n"), "{text}");
        assert!(text.contains("  repeated string tags = 1;\n"), "{text}");
        assert!(text.contains("  .acme.v1.Data_owner owner = 2;\n"), "{text}");
        assert!(text.contains("message Data_owner {\n  int32 id = 1;\n}\n"), "{text}");

        let compiled = compile(&schema).unwrap();
        assert_eq!(compiled.root().full_name(), "acme.v1.Data");
    }

    #[test]
    fn empty_message_compiles() {
        let compiled = compiled(json!({}));
        assert!(compiled.root().fields().is_empty());
        assert_eq!(compiled.root().reflect().fields().len(), 0);
    }

    #[test]
    fn field_shapes_come_from_the_pool() {
        let compiled = compiled(json!([{"id": 1, "geo": {"lat": 1.5}, "tags": ["a"]}]));
        let root = compiled.field_shapes("Data").unwrap();
        assert_eq!(root.len(), 1);
        assert!(root[0].repeated);
        assert_eq!(root[0].nested_type.as_deref(), Some("Data_item"));

        let item = compiled.field_shapes("Data_item").unwrap();
        let summary: Vec<(&str, u32, bool, String)> = item
            .iter()
            .map(|f| (f.name.as_str(), f.position, f.repeated, f.wire_type.to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", 1, false, "int32".to_string()),
                ("geo", 2, false, "Data_item_geo".to_string()),
                ("tags", 3, true, "string".to_string()),
            ]
        );
        assert!(compiled.field_shapes("Nope").is_none());
    }

    #[test]
    fn every_message_resolves() {
        let value = json!({"a": [[1], [2, 3]], "b": {"c": {"d": [true]}}, "e": null});
        let compiled = compiled(value);
        assert_eq!(compiled.messages().len(), compiled.schema().messages.len());
        for field in compiled.root().fields() {
            if field.wire_type().is_message() {
                assert!(compiled.nested(field).is_some(), "{}", field.name());
            }
        }
    }

    #[test]
    fn missing_root_is_reported() {
        let mut schema = infer_schema(&json!({"a": 1}), &InferOptions::default());
        schema.root = "Ghost".into();
        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::MissingRootType(ref name) if name == "Ghost"), "{err}");
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let mut schema = infer_schema(&json!({"a": 1}), &InferOptions::default());
        schema.messages[0].fields[0].name = "not an ident".into();
        let err = compile(&schema).unwrap_err();
        match err {
            Error::SchemaParse { source_text, .. } => assert!(source_text.contains("not an ident")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_positions_are_rejected() {
        let mut schema = infer_schema(&json!({"a": 1, "b": 2}), &InferOptions::default());
        schema.messages[0].fields[1].position = 1;
        assert!(matches!(compile(&schema), Err(Error::SchemaParse { .. })));
    }
}
