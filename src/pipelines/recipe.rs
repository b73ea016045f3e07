use log::{debug, info, warn};
use reqwest::StatusCode;

use crate::extractors::{default_cascade, Extractor};
use crate::markup::MarkupTree;
use crate::model::{RecipeRecord, NO_SCRAPER_FOUND};

/// Scraper name on records whose body could not be turned into a markup tree.
pub const MARKUP_PARSE_ERROR: &str = "Markup Parse Error";

/// Runs the extraction cascade over fetched pages.
///
/// Holds no per-page state, so one instance is shared by every fetch task.
pub struct RecipeScraper {
    cascade: Vec<Box<dyn Extractor>>,
}

impl Default for RecipeScraper {
    fn default() -> Self {
        Self::new(default_cascade())
    }
}

impl RecipeScraper {
    pub fn new(cascade: Vec<Box<dyn Extractor>>) -> Self {
        Self { cascade }
    }

    /// Extract a recipe from a decoded (decompressed) response body.
    ///
    /// This pipeline:
    /// 1. Builds the markup tree, transcoding to UTF-8 per `content_type`
    /// 2. Tries the structured-data extractor, then each markup matcher
    /// 3. Stops at the first extractor that yields ingredient lines
    ///
    /// # Arguments
    /// * `url` - Source URL, copied into the record
    /// * `body` - Uncompressed response body
    /// * `content_type` - Content-Type header, if any
    ///
    /// # Returns
    /// Always a record: 200 with ingredients on a match, 422 with
    /// "No Scraper Found" when nothing matched, or 422 "Markup Parse Error"
    /// when the body is not markup at all.
    pub fn scrape_recipe(&self, url: &str, body: &[u8], content_type: Option<&str>) -> RecipeRecord {
        match MarkupTree::from_bytes(body, content_type) {
            Ok(tree) => self.scrape_tree(url, &tree),
            Err(e) => {
                warn!("{}: could not build markup tree: {}", url, e);
                let mut record =
                    RecipeRecord::failure(url, StatusCode::UNPROCESSABLE_ENTITY.as_u16(), e.to_string());
                record.scraper_name = MARKUP_PARSE_ERROR.to_string();
                record
            }
        }
    }

    /// Run the cascade over an already built tree.
    pub fn scrape_tree(&self, url: &str, tree: &MarkupTree) -> RecipeRecord {
        let mut record = RecipeRecord::new(url);

        for extractor in &self.cascade {
            debug!("{}: trying {}", url, extractor.name());
            if extractor.try_match(tree, &mut record) && record.found() {
                info!(
                    "{}: {} found {} ingredients",
                    url,
                    record.scraper_name,
                    record.ingredients.len()
                );
                return record;
            }
            record.reset_extraction();
        }

        debug!("{}: no extractor matched", url);
        record.status_code = StatusCode::UNPROCESSABLE_ENTITY.as_u16();
        record.error_message = Some(NO_SCRAPER_FOUND.to_string());
        record.scraper_name = NO_SCRAPER_FOUND.to_string();
        record
    }
}
