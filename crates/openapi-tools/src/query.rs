//! `OpenAPI` query parameter serialization.

use serde_json::{Map, Value};
use std::fmt::Write as _;

/// `style` of a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStyle {
    #[default]
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl QueryStyle {
    /// Parse the `style` keyword of a parameter object; unknown styles fall back to `form`.
    #[must_use]
    pub fn from_openapi(style: Option<&str>) -> Self {
        match style {
            Some("spaceDelimited") => Self::SpaceDelimited,
            Some("pipeDelimited") => Self::PipeDelimited,
            Some("deepObject") => Self::DeepObject,
            _ => Self::Form,
        }
    }

    #[must_use]
    pub fn default_explode(self) -> bool {
        matches!(self, Self::Form | Self::DeepObject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySerialization {
    pub style: QueryStyle,
    pub explode: bool,
    pub allow_reserved: bool,
    pub allow_empty_value: bool,
}

impl Default for QuerySerialization {
    fn default() -> Self {
        Self {
            style: QueryStyle::Form,
            explode: true,
            allow_reserved: false,
            allow_empty_value: false,
        }
    }
}

impl QuerySerialization {
    /// Read `style`/`explode`/`allowReserved`/`allowEmptyValue` from a parameter object.
    #[must_use]
    pub fn from_parameter(parameter: &Value) -> Self {
        let style = QueryStyle::from_openapi(parameter.get("style").and_then(Value::as_str));
        let flag = |key: &str| parameter.get(key).and_then(Value::as_bool);
        Self {
            style,
            explode: flag("explode").unwrap_or_else(|| style.default_explode()),
            allow_reserved: flag("allowReserved").unwrap_or(false),
            allow_empty_value: flag("allowEmptyValue").unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub key: String,
    pub value: String,
    pub allow_reserved: bool,
}

impl QueryPair {
    fn new(key: impl Into<String>, value: impl Into<String>, allow_reserved: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            allow_reserved,
        }
    }
}

/// Serialize one query argument into key/value pairs.
#[must_use]
pub fn serialize_query_param(
    name: &str,
    value: &Value,
    required: bool,
    ser: &QuerySerialization,
) -> Vec<QueryPair> {
    let allow_reserved = ser.allow_reserved;

    if query_value_is_empty(value) {
        if ser.allow_empty_value || required {
            return vec![QueryPair::new(name, "", allow_reserved)];
        }
        return Vec::new();
    }

    match value {
        Value::Array(arr) => serialize_query_array(name, arr, ser),
        Value::Object(map) => serialize_query_object(name, map, ser),
        _ => vec![QueryPair::new(name, value_to_string(value), allow_reserved)],
    }
}

fn query_value_is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn serialize_query_array(name: &str, arr: &[Value], ser: &QuerySerialization) -> Vec<QueryPair> {
    let items: Vec<String> = arr.iter().map(value_to_string).collect();
    let joined = |sep: &str| vec![QueryPair::new(name, items.join(sep), ser.allow_reserved)];
    match ser.style {
        QueryStyle::Form if ser.explode => items
            .iter()
            .map(|v| QueryPair::new(name, v.as_str(), ser.allow_reserved))
            .collect(),
        QueryStyle::Form | QueryStyle::DeepObject => joined(","),
        QueryStyle::SpaceDelimited => joined(" "),
        QueryStyle::PipeDelimited => joined("|"),
    }
}

fn serialize_query_object(
    name: &str,
    map: &Map<String, Value>,
    ser: &QuerySerialization,
) -> Vec<QueryPair> {
    match ser.style {
        QueryStyle::DeepObject => map
            .iter()
            .map(|(k, v)| QueryPair::new(format!("{name}[{k}]"), value_to_string(v), ser.allow_reserved))
            .collect(),
        QueryStyle::Form if ser.explode => map
            .iter()
            .map(|(k, v)| QueryPair::new(k.as_str(), value_to_string(v), ser.allow_reserved))
            .collect(),
        QueryStyle::Form => {
            let parts: Vec<String> = map
                .iter()
                .flat_map(|(k, v)| [k.clone(), value_to_string(v)])
                .collect();
            vec![QueryPair::new(name, parts.join(","), ser.allow_reserved)]
        }
        QueryStyle::SpaceDelimited | QueryStyle::PipeDelimited => vec![QueryPair::new(
            name,
            Value::Object(map.clone()).to_string(),
            ser.allow_reserved,
        )],
    }
}

/// Join pairs into an encoded query string (without the leading `?`).
#[must_use]
pub fn encode_query(pairs: &[QueryPair]) -> String {
    let mut query = String::new();
    for (i, p) in pairs.iter().enumerate() {
        if i > 0 {
            query.push('&');
        }
        query.push_str(&percent_encode(&p.key, false));
        query.push('=');
        query.push_str(&percent_encode(&p.value, p.allow_reserved));
    }
    query
}

/// Convert a JSON value to its string form for URL parameters.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Percent-encode a substituted path parameter value so it stays a single segment.
#[must_use]
pub fn encode_path_segment(s: &str) -> String {
    percent_encode(s, false)
}

/// Reserved characters left raw under `allowReserved`; `&`, `=` and `#` are always encoded.
const RESERVED_KEPT: &[u8] = b":/?[]@!$'()*+,;";

fn percent_encode(s: &str, allow_reserved: bool) -> String {
    s.bytes().fold(String::with_capacity(s.len()), |mut out, b| {
        let raw = b.is_ascii_alphanumeric()
            || b"-._~".contains(&b)
            || (allow_reserved && RESERVED_KEPT.contains(&b));
        if raw {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(explode: bool) -> QuerySerialization {
        QuerySerialization {
            style: QueryStyle::Form,
            explode,
            allow_reserved: false,
            allow_empty_value: false,
        }
    }

    #[test]
    fn test_query_serialization_respects_explode() {
        let pairs = serialize_query_param("tags", &json!(["a", "b"]), false, &form(true));
        assert_eq!(
            pairs,
            vec![
                QueryPair::new("tags", "a", false),
                QueryPair::new("tags", "b", false)
            ]
        );

        let pairs = serialize_query_param("tags", &json!(["a", "b"]), false, &form(false));
        assert_eq!(pairs, vec![QueryPair::new("tags", "a,b", false)]);
    }

    #[test]
    fn delimited_and_deep_object_styles() {
        let pipe = QuerySerialization {
            style: QueryStyle::PipeDelimited,
            explode: false,
            ..QuerySerialization::default()
        };
        assert_eq!(
            serialize_query_param("ids", &json!([1, 2, 3]), false, &pipe),
            vec![QueryPair::new("ids", "1|2|3", false)]
        );

        let deep = QuerySerialization {
            style: QueryStyle::DeepObject,
            ..QuerySerialization::default()
        };
        assert_eq!(
            serialize_query_param("filter", &json!({"status": "open"}), false, &deep),
            vec![QueryPair::new("filter[status]", "open", false)]
        );
    }

    #[test]
    fn empty_values_are_dropped_unless_required_or_allowed() {
        assert!(serialize_query_param("q", &json!(""), false, &form(true)).is_empty());
        assert_eq!(
            serialize_query_param("q", &json!(""), true, &form(true)),
            vec![QueryPair::new("q", "", false)]
        );
    }

    #[test]
    fn reads_serialization_from_parameter_object() {
        let ser = QuerySerialization::from_parameter(&json!({
            "name": "ids", "in": "query", "style": "spaceDelimited", "allowReserved": true
        }));
        assert_eq!(ser.style, QueryStyle::SpaceDelimited);
        assert!(!ser.explode);
        assert!(ser.allow_reserved);
    }

    #[test]
    fn encodes_components() {
        let pairs = vec![
            QueryPair::new("opt_fields", "id,name", false),
            QueryPair::new("path", "a/b c", true),
            QueryPair::new("q", "x&y=z", true),
        ];
        assert_eq!(
            encode_query(&pairs),
            "opt_fields=id%2Cname&path=a/b%20c&q=x%26y%3Dz"
        );
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), "hello");
        assert_eq!(value_to_string(&json!(123)), "123");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
    }
}
