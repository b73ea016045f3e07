pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod markup;
pub mod model;
pub mod pipelines;
pub mod scheduler;

use log::debug;
use std::sync::Arc;

pub use crate::config::ScanConfig;
pub use crate::error::ScanError;
pub use crate::fetch::{FetchResponse, ReqwestTransport, Transport};
pub use crate::model::{RecipeRecord, NO_SCRAPER_FOUND};
pub use crate::pipelines::RecipeScraper;
pub use crate::scheduler::SiteScheduler;

/// Fetch one URL through a fresh scheduler and wait for its record.
///
/// Failures to fetch or extract come back as a record with a non-200 status;
/// only setup problems and unusable URLs are errors.
pub async fn fetch_recipe(url: &str, config: &ScanConfig) -> Result<RecipeRecord, ScanError> {
    let transport = Arc::new(ReqwestTransport::new(&config.http)?);
    let (scheduler, mut results) = SiteScheduler::new(config, transport);
    scheduler.site_get_recipe(url).await?;

    let record = results
        .recv()
        .await
        .ok_or_else(|| ScanError::QueueClosed(url.to_string()))?;
    debug!("{:#?}", record);
    Ok(record)
}

/// Extract a recipe from a page that has already been fetched.
pub fn scrape_recipe(url: &str, html: &str) -> RecipeRecord {
    RecipeScraper::default().scrape_recipe(url, html.as_bytes(), None)
}
