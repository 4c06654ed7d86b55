// JSON ↔ XML with a `<root>` wrapper. Attributes travel as `@name` keys and mixed
// text as `#text`, so an element with both survives the trip through JSON.
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

const FORMAT: &str = "xml";
pub const ROOT_TAG: &str = "root";
pub const ITEM_TAG: &str = "item";
const TEXT_KEY: &str = "#text";

// ————————————————————————————————————————————————————————————————————————————
// WRITE
// ————————————————————————————————————————————————————————————————————————————

pub fn json_to_xml(value: &Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    match value {
        // A bare array would otherwise repeat `<root>` and produce several roots.
        Value::Array(items) => {
            out.push_str(&format!("<{ROOT_TAG}>\n"));
            for item in items {
                build_xml(&mut out, ITEM_TAG, item, 1);
            }
            out.push_str(&format!("</{ROOT_TAG}>\n"));
        }
        other => build_xml(&mut out, ROOT_TAG, other, 0),
    }
    out
}

fn build_xml(buf: &mut String, name: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let tag = tag_name(name);
    match value {
        Value::Object(map) => {
            let mut attrs = String::new();
            let mut text = None;
            let mut children = Vec::new();
            for (key, child) in map {
                match key.strip_prefix('@') {
                    Some(attr) if is_scalar(child) => {
                        attrs.push_str(&format!(" {}=\"{}\"", tag_name(attr), escape(&scalar_text(child))));
                    }
                    _ if key == TEXT_KEY && is_scalar(child) => text = Some(scalar_text(child)),
                    _ => children.push((key, child)),
                }
            }
            match (children.is_empty(), text) {
                (true, None) => buf.push_str(&format!("{indent}<{tag}{attrs}/>\n")),
                (true, Some(text)) => {
                    buf.push_str(&format!("{indent}<{tag}{attrs}>{}</{tag}>\n", escape(&text)));
                }
                (false, text) => {
                    buf.push_str(&format!("{indent}<{tag}{attrs}>\n"));
                    if let Some(text) = text {
                        buf.push_str(&format!("{indent}  {}\n", escape(&text)));
                    }
                    for (key, child) in children {
                        build_xml(buf, key, child, depth + 1);
                    }
                    buf.push_str(&format!("{indent}</{tag}>\n"));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    // Nested arrays get their own element so the grouping survives.
                    Value::Array(_) => {
                        buf.push_str(&format!("{indent}<{tag}>\n"));
                        build_xml(buf, ITEM_TAG, item, depth + 1);
                        buf.push_str(&format!("{indent}</{tag}>\n"));
                    }
                    _ => build_xml(buf, name, item, depth),
                }
            }
        }
        Value::Null => buf.push_str(&format!("{indent}<{tag}/>\n")),
        scalar => {
            buf.push_str(&format!("{indent}<{tag}>{}</{tag}>\n", escape(&scalar_text(scalar))));
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Makes a JSON key usable as an XML name.
pub fn tag_name(key: &str) -> String {
    static INVALID: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid tag regex"));
    let cleaned = INVALID.replace_all(key, "_");
    match cleaned.chars().next() {
        None => ITEM_TAG.to_string(),
        Some(c) if c.is_ascii_alphabetic() || c == '_' => cleaned.into_owned(),
        Some(_) => format!("_{cleaned}"),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// READ
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn open(tag: &BytesStart<'_>) -> Result<Self> {
        let mut element = XmlElement {
            name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in tag.attributes() {
            let attr = attr.map_err(|e| Error::input(FORMAT, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| Error::input(FORMAT, e))?;
            element.attributes.push((key, value.into_owned()));
        }
        Ok(element)
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.children.is_empty() && self.attributes.is_empty() {
            return if text.is_empty() { Value::Null } else { Value::String(text.to_string()) };
        }
        let mut obj = Map::new();
        for (key, value) in self.attributes {
            obj.insert(format!("@{key}"), Value::String(value));
        }
        if !text.is_empty() {
            obj.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
        }
        for child in self.children {
            let name = child.name.clone();
            let value = child.into_value();
            match obj.get_mut(&name) {
                None => {
                    obj.insert(name, value);
                }
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
        Value::Object(obj)
    }
}

/// Reads an XML document; the root element's content becomes the JSON value.
pub fn xml_to_json(source: &str) -> Result<Value> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => stack.push(XmlElement::open(&tag)?),
            Ok(Event::Empty(tag)) => {
                let element = XmlElement::open(&tag)?;
                attach(element, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::input(FORMAT, "closing tag without an open element"))?;
                attach(element, &mut stack, &mut root);
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| Error::input(FORMAT, e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::input(FORMAT, e)),
        }
        buf.clear();
    }
    if !stack.is_empty() {
        return Err(Error::input(FORMAT, "document ended inside an open element"));
    }
    let root = root.ok_or_else(|| Error::input(FORMAT, "document has no root element"))?;
    Ok(root.into_value())
}

fn attach(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}
