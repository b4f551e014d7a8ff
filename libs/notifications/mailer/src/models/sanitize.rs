//! Text cleanup shared by the value types.

use regex::Regex;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("tag pattern"));

/// Remove anything that looks like an HTML/XML tag.
pub(crate) fn strip_tags(input: &str) -> String {
    TAG.replace_all(input, "").into_owned()
}

/// Single-line header value: tags and control characters removed, trimmed.
pub(crate) fn header_value(input: &str) -> String {
    strip_tags(input)
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Filename safe for headers and JSON payloads: HTML special characters
/// escaped, control characters dropped.
pub(crate) fn escape_special(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim().to_string()
}
