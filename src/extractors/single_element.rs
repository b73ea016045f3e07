use log::debug;

use super::rules::{SingleRule, TextPolicy, SINGLE_ELEMENT_RULES};
use super::Extractor;
use crate::markup::{MarkupTree, NodeId, NodeKind, NodeVisitor};
use crate::model::RecipeRecord;

pub const SINGLE_ELEMENT_SCRAPER: &str = "HTML Single Elem Scraper";

/// Pages where one element per line carries the ingredient text, possibly
/// split across sibling parts (amount, unit, name).
pub struct SingleElementMatcher {
    rules: &'static [SingleRule],
}

impl SingleElementMatcher {
    pub fn new(rules: &'static [SingleRule]) -> Self {
        Self { rules }
    }
}

impl Default for SingleElementMatcher {
    fn default() -> Self {
        Self::new(SINGLE_ELEMENT_RULES)
    }
}

impl Extractor for SingleElementMatcher {
    fn name(&self) -> &'static str {
        SINGLE_ELEMENT_SCRAPER
    }

    fn try_match(&self, tree: &MarkupTree, record: &mut RecipeRecord) -> bool {
        let mut collector = LineCollector::new(self.rules);
        tree.walk(&mut collector);
        debug!("{}: {} raw lines", self.name(), collector.lines.len());

        record.append_lines(&collector.lines);
        if record.ingredients.is_empty() {
            return false;
        }
        record.scraper_name = self.name().to_string();
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    node: NodeId,
    policy: TextPolicy,
    // false once a line part's element has closed; the buffer is kept
    active: bool,
}

struct LineCollector {
    rules: &'static [SingleRule],
    capture: Option<Capture>,
    buffer: String,
    lines: Vec<String>,
}

impl LineCollector {
    fn new(rules: &'static [SingleRule]) -> Self {
        Self {
            rules,
            capture: None,
            buffer: String::new(),
            lines: Vec::new(),
        }
    }

    fn flush(&mut self) {
        self.lines.push(std::mem::take(&mut self.buffer));
        self.capture = None;
    }
}

impl NodeVisitor for LineCollector {
    fn enter(&mut self, tree: &MarkupTree, id: NodeId) {
        let node = tree.node(id);
        match &node.kind {
            NodeKind::Element { .. } => {
                let Some(rule) = self.rules.iter().find(|r| r.element.matches(node)) else {
                    return;
                };
                if let Some(capture) = self.capture {
                    if capture.active
                        && capture.policy.ends_line
                        && tree.is_descendant(id, capture.node)
                    {
                        // a wrapper that has text of its own keeps the line
                        if !self.buffer.trim().is_empty() {
                            return;
                        }
                        self.buffer.clear();
                    }
                }
                self.capture = Some(Capture {
                    node: id,
                    policy: rule.policy,
                    active: true,
                });
            }
            NodeKind::Text(text) => {
                let Some(capture) = self.capture.filter(|c| c.active) else {
                    return;
                };
                if capture.policy.single_shot && text.trim().is_empty() {
                    return;
                }
                self.buffer.push_str(text);
                if capture.policy.add_space {
                    self.buffer.push(' ');
                }
                if capture.policy.single_shot {
                    self.flush();
                }
            }
            NodeKind::Document => {}
        }
    }

    fn exit(&mut self, _tree: &MarkupTree, id: NodeId) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        if capture.node != id {
            return;
        }
        if capture.policy.ends_line {
            self.flush();
        } else {
            capture.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape(html: &str) -> RecipeRecord {
        let tree = MarkupTree::parse(html).unwrap();
        let mut record = RecipeRecord::new("http://example.com/r");
        SingleElementMatcher::default().try_match(&tree, &mut record);
        record
    }

    #[test]
    fn test_split_parts_join_into_one_line() {
        let record = scrape(
            r#"<div class="wprm-recipe-ingredients">
                <p><span class="wprm-recipe-ingredient-amount">2</span>
                <span class="wprm-recipe-ingredient-unit">tbsp</span>
                <span class="wprm-recipe-ingredient-name">butter</span></p>
                <p><span class="wprm-recipe-ingredient-amount">1</span>
                <span class="wprm-recipe-ingredient-name">egg</span></p>
            </div>"#,
        );
        assert_eq!(record.ingredients, vec!["2 tbsp butter", "1 egg"]);
        assert_eq!(record.scraper_name, SINGLE_ELEMENT_SCRAPER);
    }

    #[test]
    fn test_parts_inside_line_wrapper_take_over() {
        let record = scrape(concat!(
            r#"<ul class="wprm-recipe-ingredients">"#,
            r#"<li class="wprm-recipe-ingredient"><span class="wprm-recipe-ingredient-amount">2</span>"#,
            r#"<span class="wprm-recipe-ingredient-unit">tbsp</span>"#,
            r#"<span class="wprm-recipe-ingredient-name">butter</span>"#,
            r#"<span class="wprm-recipe-ingredient-notes">softened</span></li>"#,
            r#"<li class="wprm-recipe-ingredient"><span class="wprm-recipe-ingredient-name">salt</span>"#,
            r#"<span class="wprm-recipe-ingredient-notes">to taste</span></li>"#,
            r#"</ul>"#,
        ));
        assert_eq!(record.ingredients, vec!["2 tbsp butter", "salt"]);
    }

    #[test]
    fn test_pretty_printed_wprm_markup() {
        let record = scrape(
            r#"<ul class="wprm-recipe-ingredients">
                <li class="wprm-recipe-ingredient">
                    <span class="wprm-recipe-ingredient-amount">1</span>
                    <span class="wprm-recipe-ingredient-unit">cup</span>
                    <span class="wprm-recipe-ingredient-name">milk</span>
                    <span class="wprm-recipe-ingredient-notes">warm</span>
                </li>
            </ul>"#,
        );
        assert_eq!(record.ingredients, vec!["1 cup milk"]);
    }

    #[test]
    fn test_whole_line_elements_keep_inline_markup_text() {
        let record = scrape(
            r#"<ul>
                <li class="ingredient">1 cup <b>sugar</b></li>
                <li class="ingredient">2&nbsp;eggs</li>
                <li class="ingredient">   </li>
            </ul>"#,
        );
        assert_eq!(record.ingredients, vec!["1 cup sugar", "2 eggs"]);
    }

    #[test]
    fn test_nested_match_inside_line_is_not_restarted() {
        let record = scrape(
            r#"<li itemprop="recipeIngredient">3 <span itemprop="recipeIngredient">apples</span>, sliced</li>"#,
        );
        assert_eq!(record.ingredients, vec!["3 apples, sliced"]);
    }

    #[test]
    fn test_first_text_policy() {
        let record = scrape(
            r#"<ul><li class="ingredient-item">
                 1 onion
                 <span class="note">diced</span>
               </li></ul>"#,
        );
        assert_eq!(record.ingredients, vec!["1 onion"]);
    }

    #[test]
    fn test_label_and_paragraph_rules() {
        let record = scrape(
            r#"<label itemprop="recipeIngredient">4 carrots</label>
               <p class="ingredient">1 tsp cumin</p>"#,
        );
        assert_eq!(record.ingredients, vec!["4 carrots", "1 tsp cumin"]);
    }

    #[test]
    fn test_no_match_leaves_record_untouched() {
        let record = scrape("<ul><li>1 cup flour</li></ul>");
        assert!(record.ingredients.is_empty());
        assert!(record.scraper_name.is_empty());
    }
}
