//! Tag scanning and escaping primitives.
//!
//! Tag matching is case-insensitive and byte-indexed: ASCII lowercasing
//! preserves string length, so indices found in the lowered copy address the
//! original text directly.

/// Escape text for embedding inside a tagged envelope.
pub(crate) fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reverse [`escape_text`]. Ampersand last so `&amp;lt;` stays `&lt;`.
pub(crate) fn unescape_text(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Find every `<tag ...>inner</tag>` occurrence and return the inner slices.
///
/// Unterminated blocks are treated as absent. An opening tag only matches
/// when followed by `>` or whitespace, so scanning for `file` will not match
/// `<files_read>`.
pub(crate) fn blocks<'a>(input: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = input.to_ascii_lowercase();
    let tag = tag.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut found = Vec::new();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(&open) {
        let open_at = from + rel;
        let after_name = open_at + open.len();

        let next = lower[after_name..].chars().next();
        let content_start = match next {
            Some('>') => after_name + 1,
            Some(c) if c.is_ascii_whitespace() => match lower[after_name..].find('>') {
                Some(gt) => after_name + gt + 1,
                None => break,
            },
            _ => {
                from = after_name;
                continue;
            }
        };

        match lower[content_start..].find(&close) {
            Some(rel_close) => {
                let close_at = content_start + rel_close;
                found.push(&input[content_start..close_at]);
                from = close_at + close.len();
            }
            None => break,
        }
    }
    found
}

/// First `<tag>` block, if any.
pub(crate) fn first_block<'a>(input: &'a str, tag: &str) -> Option<&'a str> {
    blocks(input, tag).into_iter().next()
}

/// Scalar child field: first occurrence, trimmed and unescaped. Missing
/// fields default to the empty string.
pub(crate) fn field(block: &str, tag: &str) -> String {
    first_block(block, tag)
        .map(|inner| unescape_text(inner.trim()))
        .unwrap_or_default()
}

/// List child field: every `<item_tag>` inside the `<container>` block,
/// trimmed, unescaped, empties dropped. A missing container is an empty
/// list.
pub(crate) fn items(block: &str, container: &str, item_tag: &str) -> Vec<String> {
    let Some(scope) = first_block(block, container) else {
        return Vec::new();
    };
    blocks(scope, item_tag)
        .into_iter()
        .map(|inner| unescape_text(inner.trim()))
        .filter(|entry| !entry.is_empty())
        .collect()
}
