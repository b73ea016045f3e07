//! Line cleaning shared by every extractor.

use html_escape::decode_html_entities;
use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid tag pattern"));

/// Headings that label an ingredient block rather than being part of it.
const SECTION_HEADINGS: &[&str] = &["ingredients", "ingredient", "ingredients list"];

/// Normalise one raw ingredient line.
///
/// Whitespace runs collapse to a single space, entities are decoded, residual
/// tags are stripped and the result is trimmed. Returns `None` when nothing is
/// left or the line is only a section heading.
pub fn clean_line(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    let decoded = decode_html_symbols(&collapsed);
    let stripped = TAG_RE.replace_all(&decoded, "");
    let line = collapse_whitespace(&stripped);

    if line.is_empty() || is_section_heading(&line) {
        return None;
    }
    Some(line)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn decode_html_symbols(text: &str) -> String {
    // some CMS templates double-escape ("&amp;amp;"), decoding twice recovers them
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

fn is_section_heading(line: &str) -> bool {
    let bare = line.trim_end_matches(':').trim();
    SECTION_HEADINGS.iter().any(|h| bare.eq_ignore_ascii_case(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line_round_trip() {
        assert_eq!(
            clean_line("  Salt &amp; Pepper\n\tto taste  ").as_deref(),
            Some("Salt & Pepper to taste")
        );
    }

    #[test]
    fn test_clean_line_strips_inline_tags() {
        assert_eq!(
            clean_line("1 cup <strong>brown</strong> sugar").as_deref(),
            Some("1 cup brown sugar")
        );
        assert_eq!(
            clean_line("2 &lt;b&gt;eggs&lt;/b&gt;").as_deref(),
            Some("2 eggs")
        );
    }

    #[test]
    fn test_clean_line_double_escaped_entities() {
        assert_eq!(clean_line("mac &amp;amp; cheese").as_deref(), Some("mac & cheese"));
        assert_eq!(clean_line("1&#189; cups milk").as_deref(), Some("1½ cups milk"));
    }

    #[test]
    fn test_clean_line_discards_empty_and_headings() {
        assert_eq!(clean_line(""), None);
        assert_eq!(clean_line(" \n\t "), None);
        assert_eq!(clean_line("<br/>"), None);
        assert_eq!(clean_line("Ingredients"), None);
        assert_eq!(clean_line("INGREDIENTS:"), None);
        assert_eq!(
            clean_line("Ingredients for the sauce").as_deref(),
            Some("Ingredients for the sauce")
        );
    }

    #[test]
    fn test_clean_line_keeps_comparisons() {
        // a lone "<" is not a tag
        assert_eq!(clean_line("< 1 tsp salt").as_deref(), Some("< 1 tsp salt"));
    }
}
