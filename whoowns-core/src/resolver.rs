//! Package resolution for stack-frame style identifiers.
//!
//! A frame such as `com.example.Foo.bar(Foo.java:10)` is assumed to have the
//! shape `package.Class.method(location)`. The resolver drops the location
//! and the last two dot segments to recover the package.
//!
//! This is a fixed heuristic. Nested classes (`Outer.Inner.method(...)`),
//! synthetic lambda names and any other extra segments shift the computed
//! boundary. Callers get exactly the rule below, nothing smarter.

/// Number of trailing segments (method, class) stripped from a frame
const FRAME_SEGMENTS: usize = 2;

/// Resolve the package name of a raw identifier.
///
/// - Without a `(`, the identifier is returned unchanged.
/// - Otherwise the text before the first `(` loses up to two trailing
///   `.`-delimited segments. With fewer than two dots the walk stops early
///   and whatever remains is returned.
pub fn resolve_package(identifier: &str) -> &str {
    let Some(paren) = identifier.find('(') else {
        return identifier;
    };

    let mut package = &identifier[..paren];
    for _ in 0..FRAME_SEGMENTS {
        match package.rfind('.') {
            Some(dot) => package = &package[..dot],
            None => break,
        }
    }
    package
}
