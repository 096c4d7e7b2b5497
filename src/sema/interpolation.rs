//! Placeholder scanning - `{{name}}` references
//!
//! Single syntax: `{{name}}` with optional inner whitespace. Names are
//! matched exactly against declared variables; a dotted or empty name
//! never matches one.

use std::sync::LazyLock;

use regex::Regex;
use smallvec::SmallVec;

/// Pre-compiled regex for `{{ name }}`
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap());

/// Names referenced by `text`, in order of appearance
///
/// Returns an empty list without touching the regex when there is no `{{`.
pub fn references(text: &str) -> SmallVec<[&str; 4]> {
    if !text.contains("{{") {
        return SmallVec::new();
    }
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
