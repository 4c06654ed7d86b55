//! Encoding JSON into protobuf bytes through the compiled schema, and back.
use prost::Message as _;
use prost_reflect::{DynamicMessage, Kind, Value as ProtoValue};
use serde_json::{Map, Number, Value};

use crate::coerce::{coerce, coerce_message};
use crate::compile::{CompiledSchema, ResolvedField, ResolvedMessage};
use crate::error::{Error, Result};

// ————————————————————————————————————————————————————————————————————————————
// ENCODE
// ————————————————————————————————————————————————————————————————————————————

/// Coerces `value` onto the root message and serializes it.
pub fn encode(value: &Value, schema: &CompiledSchema) -> Result<Vec<u8>> {
    let coerced = coerce(value, schema);
    let message = build_message(&coerced, schema.root(), schema, "")?;
    let bytes = message.encode_to_vec();
    tracing::debug!(message = schema.root().name(), bytes = bytes.len(), "encoded protobuf");
    Ok(bytes)
}

/// Encodes `value` as a standalone instance of any message in the schema.
pub fn encode_message(value: &Value, message: &ResolvedMessage, schema: &CompiledSchema) -> Result<Vec<u8>> {
    let coerced = coerce_message(value, message, schema);
    Ok(build_message(&coerced, message, schema, "")?.encode_to_vec())
}

fn build_message(
    value: &Value,
    message: &ResolvedMessage,
    schema: &CompiledSchema,
    path: &str,
) -> Result<DynamicMessage> {
    let Value::Object(map) = value else {
        return Err(Error::encoding(
            path,
            format!("expected an object for message `{}`, found {}", message.name(), kind_name(value)),
        ));
    };
    let mut dynamic = DynamicMessage::new(message.reflect().clone());
    for field in message.fields() {
        let Some(raw) = map.get(field.json_key()) else { continue };
        if raw.is_null() {
            continue;
        }
        let field_path = child_path(path, field.json_key());
        let converted = if field.is_list() {
            let Value::Array(items) = raw else {
                return Err(Error::encoding(&field_path, format!("expected an array, found {}", kind_name(raw))));
            };
            let mut list = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                list.push(to_proto_value(item, field, schema, &format!("{field_path}[{index}]"))?);
            }
            ProtoValue::List(list)
        } else {
            to_proto_value(raw, field, schema, &field_path)?
        };
        dynamic
            .try_set_field(field.reflect(), converted)
            .map_err(|error| Error::encoding(&field_path, error.to_string()))?;
    }
    Ok(dynamic)
}

fn to_proto_value(value: &Value, field: &ResolvedField, schema: &CompiledSchema, path: &str) -> Result<ProtoValue> {
    let mismatch = |expected: &str| {
        Error::encoding(path, format!("expected {expected}, found {}", kind_name(value)))
    };
    match field.kind() {
        Kind::Message(_) => {
            let nested = schema.nested(field).ok_or_else(|| Error::UnresolvedType {
                name: field.wire_type().to_string(),
                reason: format!("field `{}` points at an unknown message", field.name()),
            })?;
            Ok(ProtoValue::Message(build_message(value, nested, schema, path)?))
        }
        Kind::String => value
            .as_str()
            .map(|s| ProtoValue::String(s.to_string()))
            .ok_or_else(|| mismatch("a string")),
        Kind::Bool => value.as_bool().map(ProtoValue::Bool).ok_or_else(|| mismatch("a bool")),
        Kind::Int32 => integral(value)
            .ok_or_else(|| mismatch("an integer"))
            .and_then(|n| {
                i32::try_from(n)
                    .map(ProtoValue::I32)
                    .map_err(|_| Error::encoding(path, format!("{n} is out of range for int32")))
            }),
        Kind::Int64 => integral(value).map(ProtoValue::I64).ok_or_else(|| mismatch("a 64-bit integer")),
        Kind::Double => value.as_f64().map(ProtoValue::F64).ok_or_else(|| mismatch("a number")),
        other => Err(Error::UnresolvedType {
            name: field.name().to_string(),
            reason: format!("unsupported field kind {other:?}"),
        }),
    }
}

/// Integral numbers, including floats with no fractional part such as `1.0`.
fn integral(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else { return None };
    if let Some(int) = n.as_i64() {
        return Some(int);
    }
    let float = n.as_f64()?;
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    (float.fract() == 0.0 && in_range).then_some(float as i64)
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() { key.to_string() } else { format!("{parent}.{key}") }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECODE
// ————————————————————————————————————————————————————————————————————————————

/// Decodes a buffer of the root message back into JSON with the original keys.
/// Wrapper messages are unboxed; singular scalars come back with their proto3
/// defaults when absent.
pub fn decode(bytes: &[u8], schema: &CompiledSchema) -> Result<Value> {
    let root = schema.root();
    let message = DynamicMessage::decode(root.reflect().clone(), bytes)
        .map_err(|error| Error::Decoding(error.to_string()))?;
    message_to_json(&message, root, schema)
}

fn message_to_json(message: &DynamicMessage, resolved: &ResolvedMessage, schema: &CompiledSchema) -> Result<Value> {
    let mut map = Map::new();
    for field in resolved.fields() {
        if field.kind().as_message().is_some() && !field.is_list() && !message.has_field(field.reflect()) {
            continue;
        }
        let value = message.get_field(field.reflect());
        map.insert(field.json_key().to_string(), proto_to_json(&value, field, schema)?);
    }
    if resolved.is_wrapper() {
        let inner = resolved.fields().first().and_then(|f| map.remove(f.json_key()));
        return Ok(inner.unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}

fn proto_to_json(value: &ProtoValue, field: &ResolvedField, schema: &CompiledSchema) -> Result<Value> {
    Ok(match value {
        ProtoValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| proto_to_json(item, field, schema))
                .collect::<Result<Vec<_>>>()?,
        ),
        ProtoValue::Message(message) => {
            let nested = schema.nested(field).ok_or_else(|| {
                Error::Decoding(format!("field `{}` points at an unknown message", field.name()))
            })?;
            message_to_json(message, nested, schema)?
        }
        ProtoValue::String(s) => Value::String(s.clone()),
        ProtoValue::Bool(b) => Value::Bool(*b),
        ProtoValue::I32(n) => Value::from(*n),
        ProtoValue::I64(n) => Value::from(*n),
        ProtoValue::F64(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        other => return Err(Error::Decoding(format!("unexpected value {other:?} in `{}`", field.name()))),
    })
}
