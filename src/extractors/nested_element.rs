use log::debug;

use super::rules::{NestedRule, H_RECIPE_RULES, MICRODATA_RULES, NESTED_ELEMENT_RULES};
use super::text::clean_line;
use super::Extractor;
use crate::markup::{MarkupTree, NodeId, NodeKind, NodeVisitor};
use crate::model::RecipeRecord;

pub const NESTED_ELEMENT_SCRAPER: &str = "HTML Nested Elem Scraper";
pub const MICRODATA_SCRAPER: &str = "HTML schemaOrg Microdata";
pub const H_RECIPE_SCRAPER: &str = "HTML h-recipe";

/// Pages where a recognisable container wraps one element per ingredient.
///
/// Rules are tried in order; the first rule whose containers yield any line
/// supplies every line, collected from all of its containers in document order.
pub struct NestedElementMatcher {
    name: &'static str,
    rules: &'static [NestedRule],
}

impl NestedElementMatcher {
    pub fn new(name: &'static str, rules: &'static [NestedRule]) -> Self {
        Self { name, rules }
    }

    pub fn microdata() -> Self {
        Self::new(MICRODATA_SCRAPER, MICRODATA_RULES)
    }

    pub fn h_recipe() -> Self {
        Self::new(H_RECIPE_SCRAPER, H_RECIPE_RULES)
    }
}

impl Default for NestedElementMatcher {
    fn default() -> Self {
        Self::new(NESTED_ELEMENT_SCRAPER, NESTED_ELEMENT_RULES)
    }
}

impl Extractor for NestedElementMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn try_match(&self, tree: &MarkupTree, record: &mut RecipeRecord) -> bool {
        for (index, rule) in self.rules.iter().enumerate() {
            let lines: Vec<String> = collect_rule(tree, rule)
                .iter()
                .filter_map(|line| clean_line(line))
                .collect();
            if lines.is_empty() {
                continue;
            }
            debug!("{}: rule {} matched {} lines", self.name, index, lines.len());
            record.ingredients.extend(lines);
            record.scraper_name = self.name.to_string();
            return true;
        }
        false
    }
}

/// Raw lines from every outermost container matching `rule`.
fn collect_rule(tree: &MarkupTree, rule: &NestedRule) -> Vec<String> {
    let mut lines = Vec::new();
    let mut id = tree.root();
    while id < tree.len() {
        if !rule.outer.matches(tree.node(id)) {
            id += 1;
            continue;
        }
        let mut collector = InnerCollector::new(rule, id);
        tree.walk_from(id, &mut collector);
        lines.append(&mut collector.lines);
        id = *tree.subtree(id).end() + 1;
    }
    lines
}

struct InnerCollector<'r> {
    rule: &'r NestedRule,
    capture: Option<NodeId>,
    buffer: String,
    lines: Vec<String>,
}

impl<'r> InnerCollector<'r> {
    fn new(rule: &'r NestedRule, outer: NodeId) -> Self {
        Self {
            rule,
            // without an inner element the container itself is the capture
            capture: rule.inner.is_none().then_some(outer),
            buffer: String::new(),
            lines: Vec::new(),
        }
    }

    fn flush(&mut self) {
        self.lines.push(std::mem::take(&mut self.buffer));
    }
}

impl NodeVisitor for InnerCollector<'_> {
    fn enter(&mut self, tree: &MarkupTree, id: NodeId) {
        let node = tree.node(id);
        match &node.kind {
            NodeKind::Element { tag, .. } => {
                if self.capture.is_some() {
                    if tag == "br" && self.rule.break_on_br {
                        self.flush();
                    }
                    return;
                }
                if self.rule.inner.is_some_and(|inner| inner.matches(node)) {
                    self.buffer.clear();
                    self.capture = Some(id);
                }
            }
            NodeKind::Text(text) => {
                if self.capture.is_none() {
                    return;
                }
                let policy = self.rule.policy;
                if policy.single_shot && text.trim().is_empty() {
                    return;
                }
                self.buffer.push_str(text);
                if policy.add_space {
                    self.buffer.push(' ');
                }
                if policy.single_shot {
                    self.flush();
                    self.capture = None;
                }
            }
            NodeKind::Document => {}
        }
    }

    fn exit(&mut self, _tree: &MarkupTree, id: NodeId) {
        if self.capture == Some(id) {
            self.flush();
            self.capture = None;
        }
    }
}
