//! Tool allow-list.
//!
//! Entries are either path patterns (leading `/`) or tool name patterns:
//! - path patterns match on whole segments, as a prefix: `/users` allows `/users` and
//!   `/users/{id}` but not `/userspace`; `/use` does not allow `/users`
//! - a `{name}` or `*` segment in a path pattern matches any single segment
//! - name patterns use `*` globbing and otherwise must match exactly

/// Parsed allow-list. An empty list allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolWhitelist {
    entries: Vec<String>,
}

impl ToolWhitelist {
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(Into::into)
                .map(|e: String| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list (`TOOL_WHITELIST=/users,/projects/{id}`).
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        Self::new(raw.unwrap_or_default().split(','))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Decide whether a path (or derived tool name) is permitted.
    #[must_use]
    pub fn is_tool_whitelisted(&self, candidate: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        self.entries.iter().any(|entry| entry_matches(entry, candidate))
    }
}

fn entry_matches(entry: &str, candidate: &str) -> bool {
    match (entry.starts_with('/'), candidate.starts_with('/')) {
        (true, true) => path_prefix_matches(entry, candidate),
        (false, false) => glob_match(entry, candidate),
        _ => false,
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn is_wildcard_segment(segment: &str) -> bool {
    segment == "*" || (segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2)
}

fn path_prefix_matches(pattern: &str, path: &str) -> bool {
    let mut path_segments = segments(path);
    for expected in segments(pattern) {
        let Some(actual) = path_segments.next() else {
            return false;
        };
        if !(is_wildcard_segment(expected) || expected == actual) {
            return false;
        }
    }
    true
}

/// `*` matches any run of characters; everything else is literal.
fn glob_match(pattern: &str, name: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == name;
    };
    let Some(mut remaining) = name.strip_prefix(head) else {
        return false;
    };

    let mut pieces: Vec<&str> = rest.split('*').collect();
    let tail = pieces.pop().unwrap_or_default();
    for piece in pieces {
        let Some(at) = remaining.find(piece) else {
            return false;
        };
        remaining = &remaining[at + piece.len()..];
    }
    remaining.ends_with(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_whitelist_allows_everything() {
        let wl = ToolWhitelist::parse(None);
        assert!(wl.is_tool_whitelisted("/anything/at/all"));
        assert!(wl.is_tool_whitelisted("get_anything"));

        let wl = ToolWhitelist::parse(Some(" , "));
        assert!(wl.is_empty());
        assert!(wl.is_tool_whitelisted("/x"));
    }

    #[test]
    fn path_prefix_matches_whole_segments_only() {
        let wl = ToolWhitelist::parse(Some("/use"));
        assert!(!wl.is_tool_whitelisted("/users"));

        let wl = ToolWhitelist::parse(Some("/users"));
        assert!(wl.is_tool_whitelisted("/users"));
        assert!(wl.is_tool_whitelisted("/users/{id}"));
        assert!(wl.is_tool_whitelisted("/users/"));
        assert!(!wl.is_tool_whitelisted("/userspace"));
        assert!(!wl.is_tool_whitelisted("/projects"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let wl = ToolWhitelist::parse(Some("/Users"));
        assert!(!wl.is_tool_whitelisted("/users"));
    }

    #[test]
    fn placeholder_segments_match_any_segment() {
        let wl = ToolWhitelist::parse(Some("/workspaces/{workspace_gid}/custom_fields"));
        assert!(wl.is_tool_whitelisted("/workspaces/{workspace_gid}/custom_fields"));
        assert!(wl.is_tool_whitelisted("/workspaces/{gid}/custom_fields"));
        assert!(!wl.is_tool_whitelisted("/workspaces/{gid}/projects"));
        assert!(!wl.is_tool_whitelisted("/workspaces"));

        let wl = ToolWhitelist::parse(Some("/repos/*/issues"));
        assert!(wl.is_tool_whitelisted("/repos/{owner}/issues/{number}"));
    }

    #[test]
    fn name_entries_glob_against_tool_names() {
        let wl = ToolWhitelist::parse(Some("get_*,createUser"));
        assert!(wl.is_tool_whitelisted("get_workspaces_custom_fields"));
        assert!(wl.is_tool_whitelisted("createUser"));
        assert!(!wl.is_tool_whitelisted("createUsers"));
        assert!(!wl.is_tool_whitelisted("/get_things"));
    }

    #[test]
    fn inner_wildcards_match_in_order() {
        assert!(glob_match("*_custom_*", "get_workspaces_custom_fields"));
        assert!(glob_match("get*fields", "get_workspaces_custom_fields"));
        assert!(glob_match("a*b*c", "abbc"));
        assert!(!glob_match("a*b*c", "acb"));
        assert!(!glob_match("get*fields", "get_fieldsets"));
        assert!(glob_match("*", ""));
    }
}
