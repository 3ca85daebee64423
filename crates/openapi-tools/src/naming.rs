//! Tool name derivation.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static PATH_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^}]+)\}").expect("static regex is valid")
});
static NON_IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9]+").expect("static regex is valid")
});
static INVALID_TOOL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9_-]+").expect("static regex is valid")
});

/// Generate a canonical tool name from method and path (`GET /pet/{petId}` → `get_pet_petId`).
#[must_use]
pub fn generate_canonical_name(method: &str, path: &str) -> String {
    let name = format!("{}_{}", method.to_lowercase(), path);

    // Replace path params {param} with _param
    let name = PATH_PARAM.replace_all(&name, "_$1");

    // Replace non-alphanumeric runs with a single underscore
    let name = NON_IDENT.replace_all(&name, "_");

    name.trim_matches('_').to_string()
}

/// Restrict an `operationId` to the characters MCP clients accept in tool names.
#[must_use]
pub fn sanitize_tool_name(raw: &str) -> String {
    let name = INVALID_TOOL_CHARS.replace_all(raw.trim(), "_");
    name.trim_matches('_').to_string()
}

/// Naming rules applied to every tool of a registration pass.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    pub prefix: Option<String>,
    pub max_length: usize,
}

impl NamingPolicy {
    /// Derive the (not yet unique) tool name for an operation.
    ///
    /// A non-empty `operationId` wins; otherwise the name is synthesized from method and path.
    #[must_use]
    pub fn base_name(&self, operation_id: Option<&str>, method: &str, path: &str) -> String {
        let derived = operation_id
            .map(sanitize_tool_name)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| generate_canonical_name(method, path));

        let mut name = match self.prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}{derived}", INVALID_TOOL_CHARS.replace_all(prefix, "_"))
            }
            _ => derived,
        };
        if name.is_empty() {
            name = "tool".to_string();
        }
        truncate(&mut name, self.max_length);
        name
    }
}

/// Claim `base` (or the first free `base_N`) in `taken`, keeping the result within `max_length`.
pub fn reserve_unique_tool_name(taken: &mut HashSet<String>, base: &str, max_length: usize) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }

    let mut counter = 1usize;
    loop {
        let suffix = format!("_{counter}");
        let mut stem = base.to_string();
        truncate(&mut stem, max_length.saturating_sub(suffix.len()));
        let candidate = format!("{stem}{suffix}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn truncate(name: &mut String, max: usize) {
    // Names are ASCII after sanitizing, but keep the cut on a char boundary regardless.
    if name.len() > max {
        let mut cut = max;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NamingPolicy {
        NamingPolicy {
            prefix: None,
            max_length: 64,
        }
    }

    #[test]
    fn test_generate_canonical_name() {
        assert_eq!(
            generate_canonical_name("get", "/pet/{petId}"),
            "get_pet_petId"
        );
        assert_eq!(
            generate_canonical_name("POST", "/store/order"),
            "post_store_order"
        );
        assert_eq!(
            generate_canonical_name("get", "/user/{username}/repos"),
            "get_user_username_repos"
        );
        assert_eq!(
            generate_canonical_name("get", "/api/v1.0/items.json"),
            "get_api_v1_0_items_json"
        );
        assert_eq!(generate_canonical_name("get", "/"), "get");
    }

    #[test]
    fn operation_id_is_preferred_and_sanitized() {
        let p = policy();
        assert_eq!(
            p.base_name(Some("get_workspaces_custom_fields"), "get", "/x"),
            "get_workspaces_custom_fields"
        );
        assert_eq!(p.base_name(Some("repos/get"), "get", "/x"), "repos_get");
        assert_eq!(p.base_name(Some("  "), "get", "/pets"), "get_pets");
        assert_eq!(p.base_name(None, "delete", "/pets/{id}"), "delete_pets_id");
    }

    #[test]
    fn prefix_and_max_length_apply() {
        let p = NamingPolicy {
            prefix: Some("asana_".to_string()),
            max_length: 12,
        };
        assert_eq!(p.base_name(Some("listProjects"), "get", "/p"), "asana_listPr");
    }

    #[test]
    fn unique_names_get_stable_suffixes_within_max_length() {
        let mut taken = HashSet::new();
        assert_eq!(reserve_unique_tool_name(&mut taken, "list", 64), "list");
        assert_eq!(reserve_unique_tool_name(&mut taken, "list", 64), "list_1");
        assert_eq!(reserve_unique_tool_name(&mut taken, "list", 64), "list_2");

        let mut taken = HashSet::new();
        assert_eq!(reserve_unique_tool_name(&mut taken, "abcdef", 6), "abcdef");
        assert_eq!(reserve_unique_tool_name(&mut taken, "abcdef", 6), "abcd_1");
    }
}
