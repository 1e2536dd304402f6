//! Grep-style lookup of headers that may legally repeat.
//!
//! The eager extraction done by [`Envelope::parse`](super::Envelope::parse)
//! keeps one value per name. `Cookie` and `Set-Cookie` can appear many times,
//! so they are recovered here by scanning the raw block on demand.

use std::collections::{BTreeMap, HashSet};

use super::cursor::{ByteCursor, CR, LF};

/// Collect the value of every header line named exactly `name`.
///
/// `raw` is a raw block as published by the envelope: the first line is
/// skipped. A line matches when its leading bytes equal `name` and are
/// followed by a colon or whitespace. Each value runs to the end of its own
/// line and is trimmed. Lines starting with whitespace are folded
/// continuations: they are never counted as a new occurrence and are not
/// appended to the previous value either.
///
/// Returns `None` when nothing matched.
#[must_use]
pub fn scan_all(raw: &[u8], name: &str) -> Option<Vec<String>> {
    let name = name.as_bytes();
    let mut cursor = ByteCursor::new(raw);
    cursor.skip_past(LF);

    let mut found = Vec::new();
    while cursor.has_remaining() {
        let line = cursor.take_until(LF);
        let line = line.strip_suffix(&[CR]).unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if line[0].is_ascii_whitespace() {
            continue;
        }

        let token_len = line
            .iter()
            .position(|&b| b == b':' || b.is_ascii_whitespace())
            .unwrap_or(line.len());
        if &line[..token_len] != name {
            continue;
        }
        let Some(colon) = line[token_len..].iter().position(|&b| b == b':') else {
            continue;
        };
        let value = &line[token_len + colon + 1..];
        found.push(String::from_utf8_lossy(value).trim().to_string());
    }

    if found.is_empty() { None } else { Some(found) }
}

/// Split cookie header values into key/value pairs.
///
/// All values are joined with `;` and split again, so several `Cookie`
/// headers behave like one. Each segment is split on its first `=` and both
/// sides are trimmed; segments without `=` are ignored. When `keys` is
/// non-empty only those names are kept and scanning stops as soon as all of
/// them were seen.
///
/// Returns `None` when no pair was collected.
#[must_use]
pub fn parse_cookies(values: &[String], keys: &[&str]) -> Option<BTreeMap<String, String>> {
    let wanted: Option<HashSet<&str>> = if keys.is_empty() {
        None
    } else {
        Some(keys.iter().copied().collect())
    };

    let joined = values.join(";");
    let mut cookies = BTreeMap::new();
    for segment in joined.split(';') {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if wanted.as_ref().is_some_and(|w| !w.contains(key)) {
            continue;
        }
        cookies.insert(key.to_string(), value.trim().to_string());
        if wanted.as_ref().is_some_and(|w| cookies.len() == w.len()) {
            break;
        }
    }

    if cookies.is_empty() { None } else { Some(cookies) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
        Set-Cookie: session=abc; Path=/\r\n\
        Content-Type: text/plain\r\n\
        Set-Cookie: theme=dark\r\n\
        \x20 Set-Cookie: folded=yes\r\n\
        \r\n";

    #[test]
    fn test_scan_all_repeated() {
        let values = scan_all(RESPONSE, "Set-Cookie").unwrap();
        assert_eq!(values, vec!["session=abc; Path=/", "theme=dark"]);
    }

    #[test]
    fn test_scan_all_single() {
        let values = scan_all(RESPONSE, "Content-Type").unwrap();
        assert_eq!(values, vec!["text/plain"]);
    }

    #[test]
    fn test_scan_all_absent() {
        assert!(scan_all(RESPONSE, "Cookie").is_none());
        assert!(scan_all(RESPONSE, "Set-Cookie2").is_none());
        assert!(scan_all(RESPONSE, "Set").is_none());
    }

    #[test]
    fn test_scan_all_is_case_sensitive() {
        assert!(scan_all(RESPONSE, "set-cookie").is_none());
    }

    #[test]
    fn test_scan_all_skips_first_line() {
        let raw = b"Host: fake first line\r\nHost: real\r\n\r\n";
        assert_eq!(scan_all(raw, "Host").unwrap(), vec!["real"]);
    }

    #[test]
    fn test_scan_all_whitespace_before_colon() {
        let raw = b"GET / HTTP/1.1\r\nCookie : a=1\r\n\r\n";
        assert_eq!(scan_all(raw, "Cookie").unwrap(), vec!["a=1"]);
    }

    #[test]
    fn test_scan_all_stops_at_blank_line() {
        let raw = b"GET / HTTP/1.1\r\nX: 1\r\n\r\nX: body\r\n";
        assert_eq!(scan_all(raw, "X").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_parse_cookies_all() {
        let values = vec!["a=1; b=2".to_string(), "c = 3 ;flag".to_string()];
        let cookies = parse_cookies(&values, &[]).unwrap();
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies["c"], "3");
        assert!(!cookies.contains_key("flag"));
    }

    #[test]
    fn test_parse_cookies_filtered() {
        let values = vec!["a=1; b=2; c=3".to_string()];
        let cookies = parse_cookies(&values, &["c", "a"]).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["c"], "3");
    }

    #[test]
    fn test_parse_cookies_value_keeps_equals() {
        let values = vec!["token=a=b=".to_string()];
        let cookies = parse_cookies(&values, &[]).unwrap();
        assert_eq!(cookies["token"], "a=b=");
    }

    #[test]
    fn test_parse_cookies_none() {
        assert!(parse_cookies(&[], &[]).is_none());
        let values = vec!["a=1".to_string()];
        assert!(parse_cookies(&values, &["z"]).is_none());
    }
}
