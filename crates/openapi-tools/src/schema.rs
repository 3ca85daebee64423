//! `OpenAPI` schema → JSON Schema conversion for tool input schemas.

use crate::resolver::{MAX_SCHEMA_DEPTH, RefResolver, ref_of};
use serde_json::{Map, Value, json};

/// Keywords copied verbatim from an `OpenAPI` schema object.
const PASSTHROUGH_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "enum",
    "default",
    "const",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "required",
    "title",
];

/// Convert an `OpenAPI` schema (possibly a `$ref`) to a JSON Schema value.
///
/// Local refs are inlined up to [`MAX_SCHEMA_DEPTH`]; beyond that (or when unresolvable) the
/// `{"$ref": ...}` object is kept so clients still see something meaningful.
#[must_use]
pub fn schema_to_json(resolver: &RefResolver<'_>, schema: &Value) -> Value {
    convert(resolver, schema, 0)
}

fn convert(resolver: &RefResolver<'_>, schema: &Value, depth: usize) -> Value {
    if let Some(reference) = ref_of(schema) {
        if depth >= MAX_SCHEMA_DEPTH {
            return json!({ "$ref": reference });
        }
        return match resolver.resolve(schema) {
            Ok(target) => convert(resolver, target, depth + 1),
            Err(_) => json!({ "$ref": reference }),
        };
    }

    let Some(obj) = schema.as_object() else {
        return json!({});
    };

    let mut out = Map::new();
    for key in PASSTHROUGH_KEYS {
        if let Some(v) = obj.get(*key) {
            out.insert((*key).to_string(), v.clone());
        }
    }

    if let Some(items) = obj.get("items") {
        out.insert("items".to_string(), convert(resolver, items, depth + 1));
    }

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        let converted: Map<String, Value> = props
            .iter()
            .map(|(name, prop)| (name.clone(), convert(resolver, prop, depth + 1)))
            .collect();
        out.insert("properties".to_string(), Value::Object(converted));
        out.entry("type")
            .or_insert_with(|| Value::String("object".to_string()));
    }

    for combinator in ["allOf", "anyOf", "oneOf"] {
        if let Some(variants) = obj.get(combinator).and_then(Value::as_array) {
            let converted: Vec<Value> = variants
                .iter()
                .map(|v| convert(resolver, v, depth + 1))
                .collect();
            out.insert(combinator.to_string(), Value::Array(converted));
        }
    }

    if let Some(additional) = obj.get("additionalProperties") {
        let converted = match additional {
            Value::Bool(_) => additional.clone(),
            other => convert(resolver, other, depth + 1),
        };
        out.insert("additionalProperties".to_string(), converted);
    }

    Value::Object(out)
}

/// JSON Schema for a path/query parameter: its `schema`, falling back to `string`, with the
/// parameter-level `description` filled in when the schema has none.
#[must_use]
pub fn parameter_schema(resolver: &RefResolver<'_>, parameter: &Value) -> Value {
    let mut schema = match parameter.get("schema") {
        Some(s) => schema_to_json(resolver, s),
        // `content`-style parameters are serialized as plain strings.
        None => json!({ "type": "string" }),
    };

    if let Some(obj) = schema.as_object_mut() {
        if !obj.contains_key("type") && !obj.contains_key("$ref") && !has_combinator(obj) {
            obj.insert("type".to_string(), Value::String("string".to_string()));
        }
        if !obj.contains_key("description")
            && let Some(desc) = parameter.get("description").and_then(Value::as_str)
        {
            obj.insert("description".to_string(), Value::String(desc.to_string()));
        }
    }

    schema
}

fn has_combinator(obj: &Map<String, Value>) -> bool {
    ["allOf", "anyOf", "oneOf"]
        .iter()
        .any(|k| obj.contains_key(*k))
}

/// The declared JSON Schema `type` of a converted schema, if it names exactly one.
#[must_use]
pub fn declared_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(s) => Some(s.as_str()),
        // OpenAPI 3.1 `type: [string, "null"]`.
        Value::Array(types) => {
            let mut non_null = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null");
            let first = non_null.next()?;
            non_null.next().is_none().then_some(first)
        }
        _ => None,
    }
}
