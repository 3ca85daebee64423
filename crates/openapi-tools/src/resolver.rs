//! `OpenAPI` `$ref` resolver.
//!
//! The document is held as a plain JSON value, so resolution is a JSON-pointer lookup against the
//! root document. Only local refs (`#/...`) are supported; external file/URL refs are reported
//! as errors and the affected operation is skipped by the caller.

use crate::error::{OpenApiToolsError, Result};
use serde_json::Value;
use std::collections::HashSet;

/// Maximum number of nested `$ref`s followed while inlining schemas.
pub const MAX_SCHEMA_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    root: &'a Value,
}

impl<'a> RefResolver<'a> {
    #[must_use]
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Follow `$ref` chains until a non-reference value is reached.
    ///
    /// # Errors
    ///
    /// Returns an error for external refs, unsupported fragments, missing pointers, or cycles.
    pub fn resolve<'v>(&self, value: &'v Value) -> Result<&'v Value>
    where
        'a: 'v,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cur = value;

        while let Some(reference) = ref_of(cur) {
            if !seen.insert(reference) {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "Cyclic $ref detected while resolving: {reference}",
                )));
            }
            cur = self.lookup(reference)?;
        }

        Ok(cur)
    }

    fn lookup(&self, reference: &str) -> Result<&'a Value> {
        let Some(fragment) = reference.strip_prefix('#') else {
            return Err(OpenApiToolsError::OpenApi(format!(
                "External $ref is not supported: {reference}",
            )));
        };
        if fragment.is_empty() {
            return Ok(self.root);
        }
        if !fragment.starts_with('/') {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
            )));
        }
        self.root.pointer(fragment).ok_or_else(|| {
            OpenApiToolsError::OpenApi(format!(
                "Unresolved $ref '{reference}' (missing pointer '{fragment}')"
            ))
        })
    }
}

/// The `$ref` target of a reference object, if `value` is one.
#[must_use]
pub fn ref_of(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(Value::as_str)
}
