//! Projection of a JSON value onto a compiled schema.
//!
//! Coercion works in JSON-key space and returns JSON, so running it twice is the
//! same as running it once. Renaming keys to proto field names only happens in
//! [`crate::encode`].
use prost_reflect::Kind;
use serde_json::{Map, Value};

use crate::compile::{CompiledSchema, ResolvedField, ResolvedMessage};

pub fn coerce(value: &Value, schema: &CompiledSchema) -> Value {
    coerce_message(value, schema.root(), schema)
}

/// Coerces a value aimed at `message`.
///
/// A wrapper message boxes every value that is not already boxed, objects
/// included: an object next to nested arrays is a one-element list. Other
/// messages copy non-object values unchanged for the encoder to reject.
pub fn coerce_message(value: &Value, message: &ResolvedMessage, schema: &CompiledSchema) -> Value {
    if value.is_null() {
        return Value::Object(Map::new());
    }
    if let Some(field) = message.fields().first().filter(|_| message.is_wrapper()) {
        if !is_boxed(value, field.json_key()) {
            let mut boxed = Map::new();
            boxed.insert(field.json_key().to_string(), value.clone());
            return Value::Object(coerce_fields(&boxed, message, schema));
        }
    }
    match value {
        Value::Object(map) => Value::Object(coerce_fields(map, message, schema)),
        other => other.clone(),
    }
}

/// An object holding exactly the wrapper's key.
fn is_boxed(value: &Value, key: &str) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.contains_key(key))
}

fn coerce_fields(map: &Map<String, Value>, message: &ResolvedMessage, schema: &CompiledSchema) -> Map<String, Value> {
    let mut out = Map::new();
    for field in message.fields() {
        let Some(raw) = map.get(field.json_key()) else { continue };
        if let Some(value) = coerce_field(raw, field, schema) {
            out.insert(field.json_key().to_string(), value);
        }
    }
    if out.len() < map.len() {
        let unknown: Vec<&str> = map
            .keys()
            .filter(|key| message.fields().iter().all(|f| f.json_key() != key.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(message = message.name(), ?unknown, "dropping keys missing from the schema");
        }
    }
    out
}

fn coerce_field(raw: &Value, field: &ResolvedField, schema: &CompiledSchema) -> Option<Value> {
    if raw.is_null() {
        return None;
    }
    if !field.is_list() {
        return coerce_element(raw, field, schema);
    }
    let items = match raw {
        Value::Array(items) => items.iter().filter_map(|item| coerce_element(item, field, schema)).collect(),
        scalar => coerce_element(scalar, field, schema).into_iter().collect(),
    };
    Some(Value::Array(items))
}

/// Coerces one singular value (or one list element) for `field`. `None` means
/// the value is dropped.
fn coerce_element(value: &Value, field: &ResolvedField, schema: &CompiledSchema) -> Option<Value> {
    match (field.kind(), value) {
        (_, Value::Null) => None,
        (Kind::Message(_), value) => match schema.nested(field) {
            Some(nested) => Some(coerce_message(value, nested, schema)),
            None => Some(value.clone()),
        },
        (Kind::String, Value::String(_)) => Some(value.clone()),
        (Kind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (Kind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (Kind::String, composite) => Some(Value::String(composite.to_string())),
        (_, value) => Some(value.clone()),
    }
}
