//! Ticket identifier extraction from QR code contents.
//!
//! Printed and on-screen tickets encode their identifier in one of three
//! shapes: a bare identifier, a link whose last path segment is the
//! identifier, or a small JSON object. [`extract`] accepts all three and
//! degrades to the trimmed input on anything it cannot read.

use serde_json::Value;
use url::Url;

/// Extracts a ticket identifier from raw scanned text. Never fails.
///
/// # Examples
///
/// ```
/// use gatecheck_core::qr::extract;
///
/// assert_eq!(extract("https://tickety.app/t/abc123"), "abc123");
/// assert_eq!(extract(r#"{"ticket_number":"T1"}"#), "T1");
/// assert_eq!(extract("  RAW123\n"), "RAW123");
/// ```
#[must_use]
pub fn extract(raw: &str) -> String {
    let trimmed = raw.trim();

    let extracted = if trimmed.starts_with("http") {
        from_url(trimmed)
    } else if trimmed.starts_with('{') {
        from_json(trimmed)
    } else {
        None
    };

    extracted.unwrap_or_else(|| trimmed.to_string())
}

fn from_url(text: &str) -> Option<String> {
    let url = Url::parse(text).ok()?;
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;

    // Keep the encoded form if it is not valid UTF-8 once decoded
    match urlencoding::decode(last) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(last.to_string()),
    }
}

fn from_json(text: &str) -> Option<String> {
    let Value::Object(object) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };

    ["id", "ticket_number"]
        .iter()
        .find_map(|key| object.get(*key).and_then(identifier_value))
}

fn identifier_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_yields_last_path_segment() {
        assert_eq!(extract("https://h/a/b/c"), "c");
        assert_eq!(extract("http://tickety.app/tickets/TKT-42"), "TKT-42");
    }

    #[test]
    fn url_trailing_slash_uses_last_non_empty_segment() {
        assert_eq!(extract("https://h/a/b/"), "b");
    }

    #[test]
    fn url_segment_is_percent_decoded() {
        assert_eq!(extract("https://h/t/VIP%2001"), "VIP 01");
    }

    #[test]
    fn url_without_path_returns_input() {
        assert_eq!(extract("https://tickety.app"), "https://tickety.app");
        assert_eq!(extract("https://tickety.app/"), "https://tickety.app/");
    }

    #[test]
    fn unparseable_url_returns_input() {
        assert_eq!(extract("http//broken"), "http//broken");
        assert_eq!(extract("https://"), "https://");
    }

    #[test]
    fn json_prefers_id() {
        assert_eq!(extract(r#"{"id":"X"}"#), "X");
        assert_eq!(extract(r#"{"ticket_number":"T1","id":"X"}"#), "X");
    }

    #[test]
    fn json_falls_back_to_ticket_number() {
        assert_eq!(extract(r#"{"ticket_number":"T1"}"#), "T1");
        assert_eq!(extract(r#"{"id":null,"ticket_number":"T1"}"#), "T1");
    }

    #[test]
    fn json_numeric_identifier_is_rendered() {
        assert_eq!(extract(r#"{"id":1042}"#), "1042");
    }

    #[test]
    fn json_without_known_keys_returns_input() {
        let raw = r#"{"name":"Alice"}"#;
        assert_eq!(extract(raw), raw);
    }

    #[test]
    fn malformed_json_returns_input() {
        assert_eq!(extract("{not json"), "{not json");
    }

    #[test]
    fn bare_identifier_is_trimmed() {
        assert_eq!(extract("RAW123"), "RAW123");
        assert_eq!(extract("\t RAW123 \r\n"), "RAW123");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(extract("   "), "");
    }
}
