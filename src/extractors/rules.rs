//! Declarative tables describing how ingredient lists are marked up.
//!
//! Tables are ordered by priority. New site conventions are added here, not
//! in the matchers that consume them.

use crate::markup::MarkupNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Lowercased attribute value equals the rule value.
    Exact,
    /// Lowercased attribute value contains the rule value.
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrMatch {
    pub key: &'static str,
    /// Always lowercase.
    pub value: &'static str,
    pub mode: MatchMode,
}

/// A tag plus an optional attribute condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementMatch {
    pub tag: &'static str,
    pub attr: Option<AttrMatch>,
}

impl ElementMatch {
    pub const fn tag(tag: &'static str) -> Self {
        Self { tag, attr: None }
    }

    pub const fn attr_equals(tag: &'static str, key: &'static str, value: &'static str) -> Self {
        Self {
            tag,
            attr: Some(AttrMatch {
                key,
                value,
                mode: MatchMode::Exact,
            }),
        }
    }

    pub const fn attr_contains(tag: &'static str, key: &'static str, value: &'static str) -> Self {
        Self {
            tag,
            attr: Some(AttrMatch {
                key,
                value,
                mode: MatchMode::Contains,
            }),
        }
    }

    pub fn matches(&self, node: &MarkupNode) -> bool {
        if node.tag() != Some(self.tag) {
            return false;
        }
        let Some(attr) = &self.attr else {
            return true;
        };
        node.attrs().iter().any(|(key, value)| {
            if !key.eq_ignore_ascii_case(attr.key) {
                return false;
            }
            let value = value.trim().to_lowercase();
            match attr.mode {
                MatchMode::Exact => value == attr.value,
                MatchMode::Contains => value.contains(attr.value),
            }
        })
    }
}

/// How text under a matched element is assembled into lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextPolicy {
    /// Append a space after each text part.
    pub add_space: bool,
    /// Closing the matched element completes the line.
    pub ends_line: bool,
    /// The first non-blank text part completes the line.
    pub single_shot: bool,
}

impl TextPolicy {
    /// One part of a line split across sibling elements (amount, unit).
    pub const PART: Self = Self {
        add_space: true,
        ends_line: false,
        single_shot: false,
    };
    /// The element holds a whole line, or its final part.
    pub const LINE: Self = Self {
        add_space: false,
        ends_line: true,
        single_shot: false,
    };
    /// Like `LINE`, but text parts are joined with spaces.
    pub const SPACED_LINE: Self = Self {
        add_space: true,
        ends_line: true,
        single_shot: false,
    };
    /// The element's first text node is the whole line.
    pub const FIRST_TEXT: Self = Self {
        add_space: false,
        ends_line: true,
        single_shot: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleRule {
    pub element: ElementMatch,
    pub policy: TextPolicy,
}

/// An outer container whose descendants hold the lines.
///
/// With `inner` set, each inner element yields one line. Without it the
/// container's own text is the line source. `break_on_br` makes a `<br>`
/// inside the capture end the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedRule {
    pub outer: ElementMatch,
    pub inner: Option<ElementMatch>,
    pub policy: TextPolicy,
    pub break_on_br: bool,
}

const fn single(element: ElementMatch, policy: TextPolicy) -> SingleRule {
    SingleRule { element, policy }
}

const fn nested(outer: ElementMatch, inner: &'static str) -> NestedRule {
    NestedRule {
        outer,
        inner: Some(ElementMatch::tag(inner)),
        policy: TextPolicy::LINE,
        break_on_br: false,
    }
}

const fn nested_paragraphs(outer: ElementMatch) -> NestedRule {
    NestedRule {
        outer,
        inner: Some(ElementMatch::tag("p")),
        policy: TextPolicy::LINE,
        break_on_br: true,
    }
}

const fn div_class(value: &'static str) -> ElementMatch {
    ElementMatch::attr_equals("div", "class", value)
}

pub static SINGLE_ELEMENT_RULES: &[SingleRule] = &[
    // <span>
    single(ElementMatch::attr_contains("span", "class", "wprm-recipe-ingredient-amount"), TextPolicy::PART),
    single(ElementMatch::attr_contains("span", "class", "wprm-recipe-ingredient-unit"), TextPolicy::PART),
    single(ElementMatch::attr_contains("span", "class", "wprm-recipe-ingredient-name"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("span", "class", "wpurp-recipe-ingredient-quantity"), TextPolicy::PART),
    single(ElementMatch::attr_contains("span", "class", "wpurp-recipe-ingredient-unit"), TextPolicy::PART),
    single(ElementMatch::attr_contains("span", "class", "wpurp-recipe-ingredient-name"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("span", "itemprop", "ingredients"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("span", "itemprop", "recipeingredient"), TextPolicy::LINE),
    // <li>
    single(ElementMatch::attr_contains("li", "itemprop", "ingredients"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("li", "class", "ingredient-item"), TextPolicy::FIRST_TEXT),
    single(ElementMatch::attr_contains("li", "class", "ingredient"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("li", "itemprop", "recipeingredient"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("li", "class", "blog-yumprint-ingredient-item"), TextPolicy::LINE),
    // <div>
    single(ElementMatch::attr_contains("div", "itemprop", "recipeingredient"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("div", "class", "p-ingredient"), TextPolicy::LINE),
    single(ElementMatch::attr_contains("div", "itemprop", "ingredient"), TextPolicy::LINE),
    // <label>
    single(ElementMatch::attr_contains("label", "itemprop", "recipeingredient"), TextPolicy::LINE),
    // <p>
    single(ElementMatch::attr_contains("p", "class", "ingredient"), TextPolicy::LINE),
];

pub static NESTED_ELEMENT_RULES: &[NestedRule] = &[
    nested(div_class("mv-create-ingredients"), "li"),
    nested(div_class("recipe__list recipe__list--ingredients"), "li"),
    nested(div_class("wprm-fallback-recipe-ingredients"), "li"),
    nested(div_class("tasty-recipes-ingredients"), "li"),
    nested_paragraphs(div_class("tasty-recipes-ingredients")),
    nested(div_class("tasty-recipe-ingredients"), "li"),
    nested(div_class("ccm-section-ingredients ingredients"), "li"),
    nested(div_class("ingredients"), "li"),
    nested(div_class("ersingredients"), "li"),
    nested(ElementMatch::attr_equals("div", "id", "recbody"), "li"),
    nested(div_class("container container-sm"), "li"),
    nested_paragraphs(div_class("penci-recipe-ingredients penci-recipe-ingre-visual")),
    nested(div_class("recipe__ingredients"), "li"),
    nested_paragraphs(div_class("ingredients ingredient")),
    nested(div_class("ingredient-list__steps"), "li"),
    // one block, lines separated by <br>
    NestedRule {
        outer: div_class("recipe-ingredients"),
        inner: None,
        policy: TextPolicy::LINE,
        break_on_br: true,
    },
];

/// schema.org microdata: a Recipe-typed container with itemprop-tagged items.
pub static MICRODATA_RULES: &[NestedRule] = &[
    NestedRule {
        outer: ElementMatch::attr_contains("div", "itemtype", "schema.org/recipe"),
        inner: Some(ElementMatch::attr_contains("li", "itemprop", "recipeingredient")),
        policy: TextPolicy::SPACED_LINE,
        break_on_br: false,
    },
    NestedRule {
        outer: ElementMatch::attr_contains("div", "itemtype", "schema.org/recipe"),
        inner: Some(ElementMatch::attr_contains("span", "itemprop", "recipeingredient")),
        policy: TextPolicy::SPACED_LINE,
        break_on_br: false,
    },
];

/// microformats2 h-recipe: `p-ingredient` items inside an `h-recipe` block.
pub static H_RECIPE_RULES: &[NestedRule] = &[
    NestedRule {
        outer: ElementMatch::attr_contains("article", "class", "h-recipe"),
        inner: Some(ElementMatch::attr_contains("li", "class", "p-ingredient")),
        policy: TextPolicy::SPACED_LINE,
        break_on_br: false,
    },
    NestedRule {
        outer: ElementMatch::attr_contains("div", "class", "h-recipe"),
        inner: Some(ElementMatch::attr_contains("li", "class", "p-ingredient")),
        policy: TextPolicy::SPACED_LINE,
        break_on_br: false,
    },
];
