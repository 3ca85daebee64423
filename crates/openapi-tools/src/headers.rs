//! Static header injection (`EXTRA_HEADERS`-style configuration).

use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;

/// Parse a multi-line `Name: Value` block into a header map.
///
/// Lines without a colon, or whose name or value is not a legal HTTP header, are skipped. Only the first colon splits, so
/// values may contain colons (`Authorization: Basic a:b`). Later duplicates overwrite earlier ones.
#[must_use]
pub fn get_additional_headers(raw: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    let Some(raw) = raw else {
        return headers;
    };

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            tracing::debug!(line = %line, "ignoring extra header line without ':'");
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            tracing::warn!(header = %name, "ignoring extra header with an invalid name");
            continue;
        }
        if HeaderValue::from_str(value).is_err() {
            tracing::warn!(header = %name, "ignoring extra header with an invalid value");
            continue;
        }
        headers.insert(name.to_string(), value.to_string());
    }

    headers
}

/// Overlay `configured` headers on top of `implied` ones.
///
/// Header names compare case-insensitively; on conflict the configured header wins.
#[must_use]
pub fn merge_headers(
    implied: Vec<(String, String)>,
    configured: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = implied
        .into_iter()
        .filter(|(name, _)| !configured.keys().any(|c| c.eq_ignore_ascii_case(name)))
        .collect();

    let mut extra: Vec<(String, String)> = configured
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    extra.sort();
    out.extend(extra);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn unset_yields_empty_map() {
        assert!(get_additional_headers(None).is_empty());
        assert!(get_additional_headers(Some("")).is_empty());
    }

    #[test]
    fn single_header() {
        assert_eq!(
            get_additional_headers(Some("Notion-Version: 2022-06-28")),
            map(&[("Notion-Version", "2022-06-28")])
        );
    }

    #[test]
    fn multiple_headers() {
        assert_eq!(
            get_additional_headers(Some("Header1: Value1\nHeader2: Value2\nHeader3: Value3")),
            map(&[
                ("Header1", "Value1"),
                ("Header2", "Value2"),
                ("Header3", "Value3")
            ])
        );
    }

    #[test]
    fn line_without_colon_is_skipped() {
        assert_eq!(
            get_additional_headers(Some("InvalidHeader\nHeader: Valid")),
            map(&[("Header", "Valid")])
        );
    }

    #[test]
    fn illegal_header_names_and_values_are_skipped() {
        assert_eq!(
            get_additional_headers(Some("Bad Name: x\nX-Good: ok\n: empty\nX-Ctl: a\u{7}b")),
            map(&[("X-Good", "ok")])
        );
    }

    #[test]
    fn splits_on_first_colon_and_last_line_wins() {
        let headers = get_additional_headers(Some(
            "Authorization: Basic dXNlcjpwYXNz\r\n\n  X-Url :  https://a.example/b  \nX-Url: second",
        ));
        assert_eq!(headers["Authorization"], "Basic dXNlcjpwYXNz");
        assert_eq!(headers["X-Url"], "second");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn configured_headers_win_over_implied() {
        let merged = merge_headers(
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            &map(&[("accept", "text/csv")]),
        );
        assert_eq!(
            merged,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("accept".to_string(), "text/csv".to_string()),
            ]
        );
    }
}
