use scraper::Html;

/// Reduce an HTML fragment to plain text. Feed entries routinely carry
/// markup in their summary/content fields; everything downstream of
/// ingestion expects plain text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    // Collapse whitespace left behind by block elements.
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, counting chars rather than
/// bytes so multibyte input never splits a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
