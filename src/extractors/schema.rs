//! schema.org Recipe shapes as they appear in the wild.
//!
//! Producers disagree on field typing, so loosely typed fields go through
//! [`SchemaValue`] and are coerced to a single string at the point of use.

use serde::Deserialize;
use serde_json::Value;

use crate::model::RecipeRecord;

/// A field that may be a string, a list, or an object with an id/url.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SchemaValue {
    Text(String),
    List(Vec<SchemaValue>),
    Object(SchemaObject),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaObject {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
}

impl SchemaValue {
    /// Collapse to one string: the text itself, the first usable list entry,
    /// or an object's `url`, `@id` or `name`, in that order.
    pub fn coerce(&self) -> Option<String> {
        match self {
            SchemaValue::Text(text) => non_blank(text),
            SchemaValue::List(items) => items.iter().find_map(SchemaValue::coerce),
            SchemaValue::Object(object) => object
                .url
                .as_deref()
                .and_then(non_blank)
                .or_else(|| object.id.as_deref().and_then(non_blank))
                .or_else(|| object.name.as_deref().and_then(non_blank)),
            SchemaValue::Other(_) => None,
        }
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `recipeIngredient` as either one string or a list of (mostly) strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IngredientField {
    One(String),
    Many(Vec<Value>),
    Other(Value),
}

impl IngredientField {
    pub fn lines(&self) -> Vec<&str> {
        match self {
            IngredientField::One(line) => vec![line.as_str()],
            IngredientField::Many(values) => values.iter().filter_map(Value::as_str).collect(),
            IngredientField::Other(_) => Vec::new(),
        }
    }
}

/// The fields read from a schema.org Recipe object. Everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecipeNode {
    #[serde(default)]
    pub name: Option<SchemaValue>,
    #[serde(rename = "recipeIngredient", default)]
    pub recipe_ingredient: Option<IngredientField>,
    #[serde(rename = "recipeCategory", default)]
    pub recipe_category: Option<SchemaValue>,
    #[serde(rename = "recipeCuisine", default)]
    pub recipe_cuisine: Option<SchemaValue>,
    #[serde(default)]
    pub image: Option<SchemaValue>,
}

impl RecipeNode {
    pub fn has_ingredients(&self) -> bool {
        self.recipe_ingredient
            .as_ref()
            .is_some_and(|field| field.lines().iter().any(|line| !line.trim().is_empty()))
    }

    /// Copy ingredient lines and secondary fields into `record`.
    /// Returns false when no line survives cleaning.
    pub fn apply(&self, record: &mut RecipeRecord) -> bool {
        let Some(field) = &self.recipe_ingredient else {
            return false;
        };
        record.append_lines(field.lines());
        if record.ingredients.is_empty() {
            return false;
        }

        record.name = self.name.as_ref().and_then(SchemaValue::coerce);
        record.recipe_category = self.recipe_category.as_ref().and_then(SchemaValue::coerce);
        record.recipe_cuisine = self.recipe_cuisine.as_ref().and_then(SchemaValue::coerce);
        record.image = self.image.as_ref().and_then(SchemaValue::coerce);
        true
    }
}

/// `{"@graph": [...]}`, where the graph may also be a single node.
#[derive(Debug, Deserialize)]
pub struct GraphDocument {
    #[serde(rename = "@graph")]
    pub graph: GraphEntries,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GraphEntries {
    Many(Vec<Value>),
    One(Box<RecipeNode>),
}

/// `{"@type": "ItemList", "itemListElement": [...]}`
#[derive(Debug, Deserialize)]
pub struct ItemListDocument {
    #[serde(rename = "itemListElement")]
    pub item_list_element: Vec<Value>,
}

/// Interpret `value` as a recipe node, skipping entries that are not objects
/// or whose fields have shapes no producer is known to emit.
pub fn recipe_node(value: &Value) -> Option<RecipeNode> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: Value) -> SchemaValue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_coerce_string_list_and_objects() {
        assert_eq!(value(json!("Dessert")).coerce().as_deref(), Some("Dessert"));
        assert_eq!(value(json!(["", "Main", "Side"])).coerce().as_deref(), Some("Main"));
        assert_eq!(
            value(json!({"@type": "ImageObject", "url": "https://x/img.jpg", "@id": "#img"}))
                .coerce()
                .as_deref(),
            Some("https://x/img.jpg")
        );
        assert_eq!(
            value(json!({"@id": "https://x/#primaryimage"})).coerce().as_deref(),
            Some("https://x/#primaryimage")
        );
        assert_eq!(
            value(json!([{"@type": "ImageObject", "url": "https://x/a.jpg"}]))
                .coerce()
                .as_deref(),
            Some("https://x/a.jpg")
        );
        assert_eq!(value(json!(42)).coerce(), None);
        assert_eq!(value(json!({"height": 10})).coerce(), None);
    }

    #[test]
    fn test_ingredient_field_tolerates_mixed_lists() {
        let node: RecipeNode = serde_json::from_value(json!({
            "recipeIngredient": ["1 egg", null, 3, "2 cups milk"]
        }))
        .unwrap();
        let field = node.recipe_ingredient.unwrap();
        assert_eq!(field.lines(), vec!["1 egg", "2 cups milk"]);

        let node: RecipeNode = serde_json::from_value(json!({"recipeIngredient": "1 egg"})).unwrap();
        assert!(node.has_ingredients());
    }

    #[test]
    fn test_apply_fills_secondary_fields() {
        let node: RecipeNode = serde_json::from_value(json!({
            "@type": "Recipe",
            "name": "Pancakes",
            "recipeCategory": ["Breakfast"],
            "recipeCuisine": "American",
            "image": {"@type": "ImageObject", "url": "https://x/p.jpg"},
            "recipeIngredient": ["1 cup flour", " "]
        }))
        .unwrap();
        let mut record = RecipeRecord::new("http://x/p");
        assert!(node.apply(&mut record));
        assert_eq!(record.ingredients, vec!["1 cup flour"]);
        assert_eq!(record.name.as_deref(), Some("Pancakes"));
        assert_eq!(record.recipe_category.as_deref(), Some("Breakfast"));
        assert_eq!(record.recipe_cuisine.as_deref(), Some("American"));
        assert_eq!(record.image.as_deref(), Some("https://x/p.jpg"));
    }

    #[test]
    fn test_apply_without_usable_lines() {
        let node: RecipeNode = serde_json::from_value(json!({"recipeIngredient": ["", "  "]})).unwrap();
        let mut record = RecipeRecord::new("http://x/p");
        assert!(!node.has_ingredients());
        assert!(!node.apply(&mut record));
    }
}
