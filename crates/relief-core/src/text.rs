//! Character-bounded string clamping.
//!
//! Answer text is capped at a fixed character budget after composition.
//! Clamping counts `char`s, not bytes, so multi-byte text never panics
//! or splits a code point.

/// Truncate `s` to at most `max_chars` characters.
///
/// Returns a borrowed prefix; no allocation when the string already fits.
pub fn clamp_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
