pub mod batch;
pub mod recipe;

pub use self::batch::{run_batch, write_augmented, BatchInput, BatchResult, BatchSummary};
pub use self::recipe::{RecipeScraper, MARKUP_PARSE_ERROR};
