//! MCP tool hints derived from HTTP method semantics (RFC 9110).

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// `(read_only, destructive, idempotent)` for a method; `None` where the method gives no guarantee.
fn method_hints(method: &Method) -> (Option<bool>, Option<bool>, Option<bool>) {
    match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" | "TRACE" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    }
}

/// Annotations for a tool backed by one HTTP operation.
///
/// Every proxied operation talks to an external system, so `openWorldHint` is always set.
#[must_use]
pub fn annotations_for_method(method: &Method, title: Option<&str>) -> ToolAnnotations {
    let (read_only_hint, destructive_hint, idempotent_hint) = method_hints(method);
    ToolAnnotations {
        title: title.map(str::to_string),
        read_only_hint,
        destructive_hint,
        idempotent_hint,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::annotations_for_method;
    use reqwest::Method;

    #[test]
    fn every_method_is_open_world() {
        let custom: Method = "PROPFIND".parse().expect("valid method token");
        for m in [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
            custom,
        ] {
            assert_eq!(annotations_for_method(&m, None).open_world_hint, Some(true));
        }
    }

    #[test]
    fn safe_methods_are_read_only() {
        let a = annotations_for_method(&Method::GET, Some("List custom fields"));
        assert_eq!(a.read_only_hint, Some(true));
        assert_eq!(a.destructive_hint, Some(false));
        assert_eq!(a.idempotent_hint, Some(true));
        assert_eq!(a.title.as_deref(), Some("List custom fields"));
    }

    #[test]
    fn writes_differ_in_idempotence() {
        let post = annotations_for_method(&Method::POST, None);
        assert_eq!(post.read_only_hint, Some(false));
        assert_eq!(post.idempotent_hint, Some(false));

        let delete = annotations_for_method(&Method::DELETE, None);
        assert_eq!(delete.destructive_hint, Some(true));
        assert_eq!(delete.idempotent_hint, Some(true));

        let patch = annotations_for_method(&Method::PATCH, None);
        assert_eq!(patch.idempotent_hint, None);
    }

    #[test]
    fn unknown_methods_only_set_open_world() {
        let custom: Method = "PROPFIND".parse().expect("valid method token");
        let a = annotations_for_method(&custom, None);
        assert_eq!(a.read_only_hint, None);
        assert_eq!(a.destructive_hint, None);
        assert_eq!(a.idempotent_hint, None);
    }
}
