//! Recovery for structured-data blocks that CMS templates have mangled.

use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("valid trailing comma pattern"));

// a value ending one line and another starting the next with no comma between
static MISSING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(["}\]])\s*\n\s*(["{\[])"#).expect("valid missing comma pattern"));

/// Parse `text` as a markup fragment and keep only its text, one space
/// between surviving text nodes.
pub fn strip_markup(text: &str) -> String {
    Html::parse_fragment(text)
        .root_element()
        .text()
        .filter_map(|text| {
            let part = text.replace(['\n', '\r'], " ");
            let part = part.trim();
            (!part.is_empty()).then(|| part.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Patch common hand-edit mistakes: leading junk, HTML comments, trailing
/// commas and commas missing between line-separated values.
pub fn sanitize_json(json_str: &str) -> String {
    let mut cleaned = json_str.trim().to_string();

    if !cleaned.starts_with('{') && !cleaned.starts_with('[') {
        if let Some(start) = cleaned.find('{').or_else(|| cleaned.find('[')) {
            cleaned = cleaned[start..].to_string();
        }
    }

    cleaned = cleaned.replace("<!--", "").replace("-->", "");
    cleaned = TRAILING_COMMA_RE.replace_all(&cleaned, "$1").into_owned();
    MISSING_COMMA_RE.replace_all(&cleaned, "$1,\n$2").into_owned()
}
