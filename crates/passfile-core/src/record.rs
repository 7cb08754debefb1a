//! Line-oriented record lookup.

use std::ops::Range;

/// Find the first newline-delimited line starting with `key`.
///
/// The returned range excludes the line's own terminating newline;
/// `end == buf.len()` means the match is the last line and unterminated.
/// Matching is byte-exact and case-sensitive, and lines shorter than the
/// key never match.
pub fn find_record(buf: &[u8], key: &[u8]) -> Option<Range<usize>> {
    let mut start = 0;
    while start < buf.len() {
        let end = buf[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(buf.len(), |i| start + i);
        if buf[start..end].starts_with(key) {
            return Some(start..end);
        }
        start = end + 1;
    }
    None
}
