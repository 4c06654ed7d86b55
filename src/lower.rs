//! Lowering: evidence lattice → message descriptors.
//!
//! One depth-first, left-to-right walk over the solved evidence. Every JSON object
//! shape becomes its own message; arrays become `repeated` fields; an array of
//! arrays is boxed in a wrapper message because protobuf has no nested repetition.
//! Name bookkeeping lives in the builders threaded through the walk, never in
//! module state, so lowering is reentrant.
use std::collections::HashSet;
use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::{InferOptions, UnknownTypePolicy};
use crate::inference::{self, ObjC, U};
use crate::ir::{FieldDescriptor, MessageDescriptor, Schema, WireType};

/// Suffix for the message describing one element of a list.
const ITEM_SUFFIX: &str = "item";
/// Single field of the wrapper message that boxes an inner list.
const WRAPPED_ITEMS_FIELD: &str = "items";
/// Field numbers protobuf keeps for its own implementation.
const RESERVED_POSITIONS: RangeInclusive<u32> = 19_000..=19_999;

static NON_IDENT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static pattern"));
static PROTO_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static pattern"));

// ————————————————————————————————————————————————————————————————————————————
// PUBLIC API
// ————————————————————————————————————————————————————————————————————————————

/// Infers a complete schema for one document. Total: every value yields a schema.
pub fn infer_schema(value: &Value, options: &InferOptions) -> Schema {
    let u = inference::infer_from_values([value], options.array_strategy);
    lower_to_schema(&u, options)
}

pub fn lower_to_schema(u: &U, options: &InferOptions) -> Schema {
    let mut lowering = Lowering::new(options);
    let root = lowering.lower_root(u);
    let messages = lowering.into_messages();
    tracing::debug!(
        root = %root,
        messages = messages.len(),
        fields = messages.iter().map(|m| m.fields.len()).sum::<usize>(),
        "lowered schema"
    );
    Schema {
        package: options.package.clone().filter(|p| !p.is_empty()),
        root,
        messages,
    }
}

/// Wire type of a scalar JSON value, from the same rule table lowering uses.
///
/// `None` for arrays and objects, and for `null` under [`UnknownTypePolicy::Skip`].
pub fn wire_type_of(v: &Value, policy: UnknownTypePolicy) -> Option<WireType> {
    match v {
        Value::Array(_) | Value::Object(_) => None,
        _ => scalar_wire_type(&inference::observe_value(v, Default::default()), policy),
    }
}

/// Turns an arbitrary JSON key into a proto identifier (`[A-Za-z][A-Za-z0-9_]*`).
pub fn field_ident(key: &str) -> String {
    let cleaned = NON_IDENT_CHARS.replace_all(key, "_");
    if cleaned.is_empty() {
        return "field".to_string();
    }
    if cleaned.starts_with(|c: char| c.is_ascii_alphabetic()) {
        cleaned.into_owned()
    } else {
        format!("f{cleaned}")
    }
}

pub fn is_proto_ident(name: &str) -> bool {
    PROTO_IDENT.is_match(name)
}

/// The lowerCamel name protobuf derives for JSON mapping (`foo_bar` → `fooBar`).
pub fn json_name(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut upper_next = false;
    for ch in ident.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

/// Field type decided for one slot.
#[derive(Debug, Clone)]
struct Slot {
    wire: WireType,
    repeated: bool,
}

impl Slot {
    fn single(wire: WireType) -> Self {
        Self { wire, repeated: false }
    }
}

/// One message under construction. Owns the per-message name sets and the
/// position counter.
struct MessageBuilder {
    name: String,
    wrapper: bool,
    fields: Vec<FieldDescriptor>,
    seen_names: HashSet<String>,
    seen_json_names: HashSet<String>,
    seen_keys: HashSet<String>,
    next_position: u32,
}

impl MessageBuilder {
    fn new(name: String, wrapper: bool) -> Self {
        Self {
            name,
            wrapper,
            fields: Vec::new(),
            seen_names: HashSet::new(),
            seen_json_names: HashSet::new(),
            seen_keys: HashSet::new(),
            next_position: 1,
        }
    }

    fn has_key(&self, json_key: &str) -> bool {
        self.seen_keys.contains(json_key)
    }

    fn is_taken(&self, ident: &str) -> bool {
        self.seen_names.contains(ident)
            || self.seen_json_names.contains(&json_name(ident).to_ascii_lowercase())
    }

    /// First free identifier for `json_key`; does not claim it.
    fn free_name(&self, json_key: &str) -> String {
        let base = field_ident(json_key);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.is_taken(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    }

    fn push(&mut self, name: String, json_key: &str, slot: Slot) {
        let position = self.next_position;
        self.next_position += 1;
        if RESERVED_POSITIONS.contains(&self.next_position) {
            self.next_position = RESERVED_POSITIONS.end() + 1;
        }
        self.seen_names.insert(name.clone());
        self.seen_json_names.insert(json_name(&name).to_ascii_lowercase());
        self.seen_keys.insert(json_key.to_string());
        self.fields.push(FieldDescriptor {
            name,
            json_key: json_key.to_string(),
            wire_type: slot.wire,
            repeated: slot.repeated,
            position,
        });
    }

    fn finish(self) -> MessageDescriptor {
        MessageDescriptor { name: self.name, fields: self.fields, wrapper: self.wrapper }
    }
}

/// Whole-schema state for one lowering pass.
struct Lowering<'o> {
    options: &'o InferOptions,
    /// Pre-order slots; a message is reserved before its children are lowered.
    messages: Vec<Option<MessageDescriptor>>,
    message_names: HashSet<String>,
}

impl<'o> Lowering<'o> {
    fn new(options: &'o InferOptions) -> Self {
        Self { options, messages: Vec::new(), message_names: HashSet::new() }
    }

    fn into_messages(self) -> Vec<MessageDescriptor> {
        self.messages.into_iter().flatten().collect()
    }

    fn reserve_message(&mut self, hint: &str) -> (usize, String) {
        let base = field_ident(hint);
        let mut name = base.clone();
        let mut n = 2;
        while self.message_names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.message_names.insert(name.clone());
        self.messages.push(None);
        (self.messages.len() - 1, name)
    }

    fn lower_root(&mut self, u: &U) -> String {
        let root_hint = self.options.root_name.clone();
        match &u.obj {
            Some(obj) if u.arm_count() == 1 => self.object_message(obj, &root_hint),
            _ => {
                let (slot_idx, name) = self.reserve_message(&root_hint);
                let mut builder = MessageBuilder::new(name.clone(), true);
                let key = self.options.root_field.clone();
                if let Some(slot) = self.slot(u, &name) {
                    let field_name = builder.free_name(&key);
                    builder.push(field_name, &key, slot);
                }
                self.messages[slot_idx] = Some(builder.finish());
                name
            }
        }
    }

    fn object_message(&mut self, obj: &ObjC, hint: &str) -> String {
        let (slot_idx, name) = self.reserve_message(hint);
        let mut builder = MessageBuilder::new(name.clone(), false);
        for (key, u) in &obj.fields {
            if builder.has_key(key) {
                continue;
            }
            let field_name = builder.free_name(key);
            let path = format!("{name}_{field_name}");
            if let Some(slot) = self.slot(u, &path) {
                builder.push(field_name, key, slot);
            }
        }
        self.messages[slot_idx] = Some(builder.finish());
        name
    }

    /// Boxes an inner list: `message <hint> { repeated <elem> items = 1; }`.
    fn wrapper_message(&mut self, hint: &str, elem: Slot) -> String {
        let (slot_idx, name) = self.reserve_message(hint);
        let mut builder = MessageBuilder::new(name.clone(), true);
        let field_name = builder.free_name(WRAPPED_ITEMS_FIELD);
        builder.push(field_name, WRAPPED_ITEMS_FIELD, elem);
        self.messages[slot_idx] = Some(builder.finish());
        name
    }

    fn slot(&mut self, u: &U, path: &str) -> Option<Slot> {
        if let Some(arr) = &u.arr {
            // Scalars seen next to arrays are treated as one-element lists.
            let item = inference::join(&arr.item, &u.without_arr());
            return self.list_slot(&item, path);
        }
        if u.arm_count() > 1 {
            return Some(Slot::single(WireType::String));
        }
        if let Some(obj) = &u.obj {
            let name = self.object_message(obj, path);
            return Some(Slot::single(WireType::Message(name)));
        }
        scalar_wire_type(u, self.options.unknown_type).map(Slot::single)
    }

    fn list_slot(&mut self, item: &U, path: &str) -> Option<Slot> {
        let item_path = format!("{path}_{ITEM_SUFFIX}");
        if item.arr.is_some() {
            let inner = self.slot(item, &format!("{item_path}_{ITEM_SUFFIX}"))?;
            let wrapper = self.wrapper_message(&item_path, inner);
            return Some(Slot { wire: WireType::Message(wrapper), repeated: true });
        }
        let elem = self.slot(item, &item_path)?;
        Some(Slot { wire: elem.wire, repeated: true })
    }
}

fn scalar_wire_type(u: &U, policy: UnknownTypePolicy) -> Option<WireType> {
    if u.arm_count() > 1 {
        return Some(WireType::String);
    }
    if u.has_bool {
        return Some(WireType::Bool);
    }
    if u.has_str {
        return Some(WireType::String);
    }
    if let Some(num) = &u.num {
        return Some(if num.is_i32() {
            WireType::Int32
        } else if num.is_i64() {
            WireType::Int64
        } else {
            WireType::Double
        });
    }
    match policy {
        UnknownTypePolicy::String => Some(WireType::String),
        UnknownTypePolicy::Skip => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArrayStrategy;
    use serde_json::json;

    fn infer(v: Value) -> Schema {
        infer_schema(&v, &InferOptions::default())
    }

    fn summary(m: &MessageDescriptor) -> Vec<(String, String, bool, u32)> {
        m.fields
            .iter()
            .map(|f| (f.name.clone(), f.wire_type.to_string(), f.repeated, f.position))
            .collect()
    }

    #[test]
    fn flat_object_scenario() {
        let schema = infer(json!({"a": 1, "b": "x"}));
        assert_eq!(schema.messages.len(), 1);
        let root = schema.root_message().unwrap();
        assert_eq!(
            summary(root),
            vec![
                ("a".to_string(), "int32".to_string(), false, 1),
                ("b".to_string(), "string".to_string(), false, 2),
            ]
        );
        assert!(!root.wrapper);
    }

    #[test]
    fn root_array_is_wrapped_in_data_field() {
        let schema = infer(json!([{"id": 1}, {"id": 2}]));
        let root = schema.root_message().unwrap();
        assert!(root.wrapper);
        assert_eq!(root.fields.len(), 1);
        let data = &root.fields[0];
        assert_eq!(data.name, "data");
        assert!(data.repeated);
        assert_eq!(data.wire_type, WireType::Message("Data_item".into()));
        let item = schema.message("Data_item").unwrap();
        assert_eq!(summary(item), vec![("id".to_string(), "int32".to_string(), false, 1)]);
    }

    #[test]
    fn empty_object_has_no_fields() {
        let schema = infer(json!({}));
        assert_eq!(schema.messages.len(), 1);
        assert!(schema.root_message().unwrap().fields.is_empty());
    }

    #[test]
    fn scalar_root_is_boxed() {
        let schema = infer(json!(42.5));
        let root = schema.root_message().unwrap();
        assert!(root.wrapper);
        assert_eq!(root.fields[0].wire_type, WireType::Double);
        assert!(!root.fields[0].repeated);
    }

    #[test]
    fn nested_objects_become_messages() {
        let schema = infer(json!({"user": {"name": "ada", "geo": {"lat": 1.5}}, "ok": true}));
        let names: Vec<&str> = schema.messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Data", "Data_user", "Data_user_geo"]);
        let root = schema.root_message().unwrap();
        assert_eq!(root.fields[0].wire_type, WireType::Message("Data_user".into()));
        assert_eq!(root.fields[1].position, 2);
        assert_eq!(schema.message("Data_user_geo").unwrap().fields[0].wire_type, WireType::Double);
    }

    #[test]
    fn nested_arrays_use_wrapper_messages() {
        let schema = infer(json!({"matrix": [[1, 2], [3]]}));
        let root = schema.root_message().unwrap();
        assert_eq!(root.fields[0].wire_type, WireType::Message("Data_matrix_item".into()));
        assert!(root.fields[0].repeated);
        let wrapper = schema.message("Data_matrix_item").unwrap();
        assert!(wrapper.wrapper);
        assert_eq!(summary(wrapper), vec![("items".to_string(), "int32".to_string(), true, 1)]);
    }

    #[test]
    fn scalar_next_to_array_becomes_repeated() {
        let schema = infer(json!([{"tags": "x"}, {"tags": ["y", "z"]}]));
        let item = schema.message("Data_item").unwrap();
        assert_eq!(summary(item), vec![("tags".to_string(), "string".to_string(), true, 1)]);
    }

    #[test]
    fn unify_widens_numbers_and_falls_back_to_string() {
        let schema = infer(json!({"n": [1, 2.5], "mixed": [1, "a"], "big": [1, 5_000_000_000i64]}));
        let root = schema.root_message().unwrap();
        assert_eq!(root.field("n").unwrap().wire_type, WireType::Double);
        assert_eq!(root.field("mixed").unwrap().wire_type, WireType::String);
        assert_eq!(root.field("big").unwrap().wire_type, WireType::Int64);
    }

    #[test]
    fn first_element_strategy_trusts_the_head() {
        let options = InferOptions { array_strategy: ArrayStrategy::FirstElement, ..Default::default() };
        let schema = infer_schema(&json!({"mixed": [1, "a"]}), &options);
        assert_eq!(schema.root_message().unwrap().fields[0].wire_type, WireType::Int32);
    }

    #[test]
    fn unknown_type_policy_is_explicit() {
        let doc = json!({"gone": null, "empty": [], "kept": 1});
        let as_string = infer(doc.clone());
        let root = as_string.root_message().unwrap();
        assert_eq!(root.field("gone").unwrap().wire_type, WireType::String);
        assert!(root.field("empty").unwrap().repeated);

        let options = InferOptions { unknown_type: UnknownTypePolicy::Skip, ..Default::default() };
        let skipped = infer_schema(&doc, &options);
        assert_eq!(summary(skipped.root_message().unwrap()), vec![("kept".to_string(), "int32".to_string(), false, 1)]);
    }

    #[test]
    fn sanitized_names_stay_unique() {
        let schema = infer(json!({"a-b": 1, "a_b": 2, "aB": 3, "1st": 4, "": 5, "_id": 6}));
        let root = schema.root_message().unwrap();
        let names: Vec<&str> = root.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a_b", "a_b_2", "aB_3", "f1st", "field", "f_id"]);
        let keys: Vec<&str> = root.fields.iter().map(|f| f.json_key.as_str()).collect();
        assert_eq!(keys, vec!["a-b", "a_b", "aB", "1st", "", "_id"]);
        assert!(root.fields.iter().all(|f| is_proto_ident(&f.name)));
    }

    #[test]
    fn message_names_are_globally_unique() {
        let schema = infer(json!({"a": {"b_c": {"x": 1}}, "a_b": {"c": {"y": 2}}}));
        let mut names: Vec<&str> = schema.messages.iter().map(|m| m.name.as_str()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn positions_skip_the_reserved_range() {
        let mut builder = MessageBuilder::new("Wide".to_string(), false);
        builder.next_position = 18_998;
        for key in ["a", "b", "c"] {
            builder.push(key.to_string(), key, Slot::single(WireType::Bool));
        }
        let message = builder.finish();
        let positions: Vec<u32> = message.fields.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![18_998, 18_999, 20_000]);
        assert!(positions.iter().all(|p| !RESERVED_POSITIONS.contains(p)));
    }

    #[test]
    fn json_name_matches_protobuf_rule() {
        assert_eq!(json_name("foo_bar"), "fooBar");
        assert_eq!(json_name("foo"), "foo");
        assert_eq!(json_name("a_b_2"), "aB2");
    }

    #[test]
    fn wire_type_table() {
        let policy = UnknownTypePolicy::String;
        assert_eq!(wire_type_of(&json!("s"), policy), Some(WireType::String));
        assert_eq!(wire_type_of(&json!(42), policy), Some(WireType::Int32));
        assert_eq!(wire_type_of(&json!(42.5), policy), Some(WireType::Double));
        assert_eq!(wire_type_of(&json!(1.0), policy), Some(WireType::Int32));
        assert_eq!(wire_type_of(&json!(1e2), policy), Some(WireType::Int32));
        assert_eq!(wire_type_of(&json!(5.0e9), policy), Some(WireType::Int64));
        assert_eq!(wire_type_of(&json!(false), policy), Some(WireType::Bool));
        assert_eq!(wire_type_of(&json!(null), policy), Some(WireType::String));
        assert_eq!(wire_type_of(&json!(null), UnknownTypePolicy::Skip), None);
        assert_eq!(wire_type_of(&json!([1]), policy), None);
    }
}
