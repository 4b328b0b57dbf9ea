//! XML bodies mapped onto a JSON-like value.
//!
//! The root element itself is dropped and its children become the keys of
//! the result, so `<response><status>OK</status></response>` decodes to
//! `{"status": "OK"}`. Repeated child names collect into an array, leaf
//! elements become their trimmed text, attributes live under `@attributes`
//! and text that sits next to attributes under `#text`.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::error::DecodeError;

const ATTRIBUTES_KEY: &str = "@attributes";
const TEXT_KEY: &str = "#text";

pub(super) fn decode(body: &str) -> Result<Value, DecodeError> {
    let document = Document::parse(body.trim())?;
    Ok(element_to_value(document.root_element()))
}

fn element_to_value(node: Node<'_, '_>) -> Value {
    let mut map = Map::new();

    let attributes: Map<String, Value> = node
        .attributes()
        .map(|attr| (attr.name().to_string(), Value::String(attr.value().to_string())))
        .collect();
    let has_attributes = !attributes.is_empty();
    if has_attributes {
        map.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attributes));
    }

    let mut has_children = false;
    for child in node.children().filter(Node::is_element) {
        has_children = true;
        let key = child.tag_name().name().to_string();
        let value = element_to_value(child);
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }

    if has_children {
        return Value::Object(map);
    }

    let text = text_content(node);
    if !has_attributes {
        return Value::String(text);
    }
    if !text.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(text));
    }
    Value::Object(map)
}

fn text_content(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}
