use log::{debug, error};
use serde_json::Value;

use super::repair::{sanitize_json, strip_markup};
use super::schema::{recipe_node, GraphDocument, GraphEntries, ItemListDocument, RecipeNode};
use super::Extractor;
use crate::markup::{MarkupTree, NodeId};
use crate::model::RecipeRecord;

pub const FLAT_SCRAPER: &str = "JSON Single schemaOrg Recipe";
pub const GRAPH_SCRAPER: &str = "JSON @graph schemaOrg Recipe";
pub const LIST_SCRAPER: &str = "JSON List schemaOrg Recipe";
pub const ITEM_LIST_SCRAPER: &str = "JSON schemaOrg ItemList Recipe";

pub const ATTR_RECIPE_TYPE: &str = "@type:Recipe";
pub const ATTR_LD_JSON: &str = "ld+json";
pub const ATTR_REPAIRED: &str = "JSON repaired";
pub const ATTR_NO_PARSER: &str = "No JSON Parser";

const SCHEMA_MARKER: &str = "schema.org";
const INGREDIENT_MARKER: &str = "recipeIngredient";

/// A decoder for one known JSON shape. Returns true when it filled `record`.
type Variant = fn(&Value, &mut RecipeRecord) -> bool;

const VARIANTS: &[(&str, Variant)] = &[
    (FLAT_SCRAPER, flat_recipe),
    (GRAPH_SCRAPER, graph_recipe),
    (LIST_SCRAPER, list_recipe),
    (ITEM_LIST_SCRAPER, item_list_recipe),
];

/// Reads schema.org Recipe data from JSON-LD script blocks.
///
/// Each script is a candidate when it declares `ld+json` or mentions
/// schema.org. The first candidate that decodes into at least one ingredient
/// line wins; malformed candidates are skipped, never reported as errors.
#[derive(Debug, Default)]
pub struct JsonLdExtractor;

impl Extractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "JSON-LD"
    }

    fn try_match(&self, tree: &MarkupTree, record: &mut RecipeRecord) -> bool {
        let source = tree.source();
        if source.contains(r#""@type":"Recipe""#) || source.contains(r#""@type": "Recipe""#) {
            record.add_attribute(ATTR_RECIPE_TYPE);
        }

        for script in candidate_scripts(tree) {
            let declares_ld = tree
                .node(script)
                .attr("type")
                .is_some_and(|t| t.to_ascii_lowercase().contains("ld+json"));
            if declares_ld {
                record.add_attribute(ATTR_LD_JSON);
            }

            let text = tree.text_content(script);
            if !declares_ld && !text.contains(SCHEMA_MARKER) {
                continue;
            }

            if let Some(name) = decode_candidate(&text, record) {
                debug!("{}: matched {}", record.source_url, name);
                record.scraper_name = name.to_string();
                return true;
            }

            if text.contains(INGREDIENT_MARKER) {
                if let Some(name) = repair_candidate(&text, record) {
                    debug!("{}: matched {} after repair", record.source_url, name);
                    record.add_attribute(ATTR_REPAIRED);
                    record.scraper_name = name.to_string();
                    return true;
                }
                error!(
                    "{}: contains schema.org recipeIngredient JSON but it did not parse",
                    record.source_url
                );
                record.add_attribute(ATTR_NO_PARSER);
            }
        }
        false
    }
}

fn candidate_scripts(tree: &MarkupTree) -> impl Iterator<Item = NodeId> + '_ {
    (0..tree.len()).filter(|&id| tree.node(id).is_element("script"))
}

/// Try each shape against `text`, returning the name of the one that matched.
fn decode_candidate(text: &str, record: &mut RecipeRecord) -> Option<&'static str> {
    let value: Value = match serde_json::from_str(text.trim()) {
        Ok(value) => value,
        Err(e) => {
            debug!("{}: candidate is not valid JSON: {}", record.source_url, e);
            return None;
        }
    };

    VARIANTS.iter().find_map(|(name, variant)| {
        debug!("{}: trying {}", record.source_url, name);
        variant(&value, record).then_some(*name)
    })
}

/// Sanitise the candidate, then strip stray markup from it, retrying the
/// shapes after each step. Sanitising goes first so a block wrapped in an
/// HTML comment is not dropped by the markup parser.
fn repair_candidate(text: &str, record: &mut RecipeRecord) -> Option<&'static str> {
    let sanitized = sanitize_json(text);
    if let Some(name) = decode_candidate(&sanitized, record) {
        return Some(name);
    }
    let stripped = strip_markup(&sanitized);
    decode_candidate(&stripped, record).or_else(|| decode_candidate(&sanitize_json(&stripped), record))
}

fn apply_first<'a, I>(nodes: I, record: &mut RecipeRecord) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    nodes
        .into_iter()
        .filter_map(recipe_node)
        .filter(RecipeNode::has_ingredients)
        .any(|node| node.apply(record))
}

/// `{"recipeIngredient": [...]}`
fn flat_recipe(value: &Value, record: &mut RecipeRecord) -> bool {
    value.get(INGREDIENT_MARKER).is_some() && apply_first([value], record)
}

/// `{"@graph": [...]}`, or a list of such documents.
fn graph_recipe(value: &Value, record: &mut RecipeRecord) -> bool {
    let graphs: Vec<&Value> = match value {
        Value::Array(items) => items.iter().filter(|v| v.get("@graph").is_some()).collect(),
        Value::Object(_) if value.get("@graph").is_some() => vec![value],
        _ => return false,
    };

    graphs.into_iter().any(|doc| {
        let Ok(doc) = serde_json::from_value::<GraphDocument>(doc.clone()) else {
            return false;
        };
        match doc.graph {
            GraphEntries::Many(entries) => apply_first(&entries, record),
            GraphEntries::One(node) => node.has_ingredients() && node.apply(record),
        }
    })
}

/// `[{"recipeIngredient": [...]}, ...]`
fn list_recipe(value: &Value, record: &mut RecipeRecord) -> bool {
    match value {
        Value::Array(items) => apply_first(items, record),
        _ => false,
    }
}

/// `{"itemListElement": [{"recipeIngredient": [...]}, ...]}`; list items
/// that wrap the recipe in `item` are unwrapped.
fn item_list_recipe(value: &Value, record: &mut RecipeRecord) -> bool {
    if value.get("itemListElement").is_none() {
        return false;
    }
    let Ok(doc) = serde_json::from_value::<ItemListDocument>(value.clone()) else {
        return false;
    };
    let items: Vec<&Value> = doc
        .item_list_element
        .iter()
        .map(|entry| entry.get("item").filter(|item| item.is_object()).unwrap_or(entry))
        .collect();
    apply_first(items, record)
}
