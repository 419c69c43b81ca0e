//! Sanitisation of untrusted letter fields before template substitution.
//!
//! Every field goes through [`sanitize_field`]: characters that carry meaning
//! in LaTeX are replaced with a space, ASCII quotes become typographic quotes,
//! and the result is clipped to a per-field code point ceiling. The function is
//! total and idempotent, so sanitising an already-sanitised value is a no-op.

/// Marker appended to values that had to be clipped.
pub const TRUNCATION_MARKER: &str = "...";

/// Characters that are replaced with a single space.
///
/// `^` is included because TeX reads `^^5c`, `^^7b` and `^^7d` as `\`, `{`
/// and `}` before category codes apply.
pub const FORBIDDEN_CHARS: [char; 9] = ['%', '&', '{', '}', '\\', '<', '>', '_', '^'];

/// Length ceiling applied to a field, measured in Unicode code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLimit {
    /// Names, addresses, salutations, subject and date.
    Line,
    /// The free-text letter body.
    Body,
}

impl FieldLimit {
    pub const fn max_chars(self) -> usize {
        match self {
            FieldLimit::Line => 200,
            FieldLimit::Body => 10_000,
        }
    }
}

/// Replace template-significant characters and clip to the field ceiling.
pub fn sanitize_field(value: &str, limit: FieldLimit) -> String {
    let replaced = replace_forbidden(value);
    truncate(&replaced, limit.max_chars())
}

fn replace_forbidden(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            ch if FORBIDDEN_CHARS.contains(&ch) => ' ',
            '"' => '“',
            '\'' => '‘',
            other => other,
        })
        .collect()
}

/// Clip `value` to at most `max_chars` code points.
///
/// Values within the ceiling are returned unchanged. Longer values keep their
/// first `max_chars - 3` code points followed by [`TRUNCATION_MARKER`], so the
/// clipped result is exactly `max_chars` long and clipping it again is a no-op.
pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }

    let mut clipped: String = value.chars().take(max_chars - marker_len).collect();
    clipped.push_str(TRUNCATION_MARKER);
    clipped
}
