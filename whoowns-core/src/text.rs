//! Line splitting shared by manifest parsing and query evaluation.

/// Split `text` on line feeds without trimming anything.
///
/// A single terminating `\n` does not produce a trailing empty line, and an
/// empty string has no lines at all. Blank lines in the middle are kept as
/// empty strings. Carriage returns are left in place.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let empty = text.is_empty();
    body.split('\n').filter(move |_| !empty)
}
