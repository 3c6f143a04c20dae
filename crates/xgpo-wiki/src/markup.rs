/// Remove search-highlight wrappers (`<span class="searchmatch">…</span>`)
/// and decode the handful of entities MediaWiki escapes in snippets.
pub(crate) fn clean_snippet(snippet: &str) -> String {
    decode_entities(&strip_span_tags(snippet))
}

fn strip_span_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let is_span = tail
            .get(1..)
            .map(|t| t.strip_prefix('/').unwrap_or(t))
            .is_some_and(|t| {
                t.get(..4).is_some_and(|name| name.eq_ignore_ascii_case("span"))
                    && t[4..].starts_with(['>', ' ', '\t', '\n', '/'])
            });

        match tail.find('>') {
            Some(end) if is_span => rest = &tail[end + 1..],
            _ => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
