//! Byte-pattern scanning
//!
//! [`find_all`] reports every offset where a needle occurs in a haystack,
//! scanning left to right. After a match the scan resumes past the end of
//! that match, so occurrences that start inside a previous match are not
//! reported. Callers that patch the haystack as they walk it rely on
//! exactly this advance.

/// Find the first occurrence of `needle` at or after `start`.
///
/// Returns `None` for an empty needle or when no occurrence exists.
pub fn find_from(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start > haystack.len() {
        return None;
    }

    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| start + pos)
}

/// Lazy iterator over the occurrences of `needle` in `haystack`.
///
/// A fresh call restarts the scan from the beginning.
pub fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> FindAll<'a> {
    FindAll {
        haystack,
        needle,
        pos: 0,
    }
}

/// Iterator state for [`find_all`].
pub struct FindAll<'a> {
    haystack: &'a [u8],
    needle: &'a [u8],
    pos: usize,
}

impl Iterator for FindAll<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let offset = find_from(self.haystack, self.needle, self.pos)?;
        self.pos = offset + self.needle.len();
        Some(offset)
    }
}
