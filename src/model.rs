use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::extractors::text::clean_line;

/// Scraper name reported when no extractor recognised the page.
pub const NO_SCRAPER_FOUND: &str = "No Scraper Found";

/// The canonical result of fetching and extracting one URL.
///
/// Every outcome, success or failure, is expressed as one of these so callers
/// can drain a single channel and correlate by `source_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRecord {
    #[serde(rename = "url")]
    pub source_url: String,
    pub status_code: u16,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "scraper")]
    pub scraper_name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "recipeIngredient", default)]
    pub ingredients: Vec<String>,
}

impl RecipeRecord {
    /// A blank record for `source_url`, optimistically marked 200.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            status_code: StatusCode::OK.as_u16(),
            error_message: None,
            scraper_name: String::new(),
            attributes: Vec::new(),
            name: None,
            recipe_category: None,
            recipe_cuisine: None,
            image: None,
            ingredients: Vec::new(),
        }
    }

    /// A failure record. The scraper name carries the status so batch reports
    /// can group failures alongside extractor names.
    pub fn failure(source_url: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        let mut record = Self::new(source_url);
        record.status_code = status_code;
        record.error_message = Some(message.into());
        record.scraper_name = status_label(status_code);
        record
    }

    /// True when an extractor produced at least one ingredient line.
    pub fn found(&self) -> bool {
        self.status_code == StatusCode::OK.as_u16() && !self.ingredients.is_empty()
    }

    /// Clean `raw` and append it as an ingredient line. Lines that clean to
    /// nothing, or to a bare section heading, are dropped.
    pub fn append_line(&mut self, raw: &str) {
        if let Some(line) = clean_line(raw) {
            self.ingredients.push(line);
        }
    }

    pub fn append_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.append_line(line.as_ref());
        }
    }

    pub fn add_attribute(&mut self, attribute: &str) {
        if !self.attributes.iter().any(|a| a == attribute) {
            self.attributes.push(attribute.to_string());
        }
    }

    /// Drop ingredient lines and secondary fields left over from a failed attempt.
    pub(crate) fn reset_extraction(&mut self) {
        self.ingredients.clear();
        self.name = None;
        self.recipe_category = None;
        self.recipe_cuisine = None;
        self.image = None;
    }
}

/// "HTTP 404 Not Found" style label for a status code.
pub fn status_label(status_code: u16) -> String {
    match StatusCode::from_u16(status_code)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status_code, reason),
        None => format!("HTTP {}", status_code),
    }
}
