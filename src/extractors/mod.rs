use crate::markup::MarkupTree;
use crate::model::RecipeRecord;

mod json_ld;
mod nested_element;
mod repair;
pub mod rules;
mod schema;
mod single_element;
pub mod text;

pub use self::json_ld::{
    JsonLdExtractor, ATTR_LD_JSON, ATTR_NO_PARSER, ATTR_RECIPE_TYPE, ATTR_REPAIRED, FLAT_SCRAPER,
    GRAPH_SCRAPER, ITEM_LIST_SCRAPER, LIST_SCRAPER,
};
pub use self::nested_element::{
    NestedElementMatcher, H_RECIPE_SCRAPER, MICRODATA_SCRAPER, NESTED_ELEMENT_SCRAPER,
};
pub use self::schema::SchemaValue;
pub use self::single_element::{SingleElementMatcher, SINGLE_ELEMENT_SCRAPER};

/// One step of the extraction cascade.
///
/// `try_match` fills `record` and sets its scraper name when it recognises the
/// page. A miss is the normal outcome and must leave no ingredient lines behind.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_match(&self, tree: &MarkupTree, record: &mut RecipeRecord) -> bool;
}

/// Structured data first, then the markup matchers from most to least specific.
pub fn default_cascade() -> Vec<Box<dyn Extractor>> {
    let mut cascade: Vec<Box<dyn Extractor>> = vec![Box::new(JsonLdExtractor)];
    cascade.extend(structural_cascade());
    cascade
}

pub fn structural_cascade() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(NestedElementMatcher::microdata()),
        Box::new(NestedElementMatcher::h_recipe()),
        Box::new(SingleElementMatcher::default()),
        Box::new(NestedElementMatcher::default()),
    ]
}
