//! One-pass header location index.
//!
//! Maps each header name, compared case-sensitively and byte for byte, to the
//! byte range of its raw value. Values are not decoded here; the envelope
//! decodes only the names it is interested in.

use std::collections::HashMap;
use std::ops::Range;

use super::cursor::{ByteCursor, CR, LF};

/// Header name to value byte range, relative to the indexed block.
pub type HeaderIndex<'a> = HashMap<&'a [u8], Range<usize>>;

/// Index every `Name: value` line of `block`.
///
/// `block` starts at the first header line; indexing stops at the first empty
/// line. Lines beginning with whitespace (folded continuations) and lines
/// without a colon are skipped. When a name repeats, the first occurrence is
/// kept.
#[must_use]
pub fn index_headers(block: &[u8]) -> HeaderIndex<'_> {
    let mut index = HeaderIndex::new();
    let mut cursor = ByteCursor::new(block);

    while cursor.has_remaining() {
        let line_start = cursor.position();
        let line = cursor.take_until(LF);
        let line = line.strip_suffix(&[CR]).unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if line[0].is_ascii_whitespace() {
            continue;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = line[..colon].trim_ascii_end();
        let value_start = line_start + colon + 1;
        let value_end = line_start + line.len();
        index.entry(name).or_insert(value_start..value_end);
    }

    index
}
