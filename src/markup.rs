//! Owned, arena-backed markup tree.
//!
//! Documents are parsed with `scraper` and flattened into a pre-order node list
//! with parent/child indices, so every subtree is a contiguous index range and
//! walks need no reference-counted pointers.

use std::ops::RangeInclusive;

use scraper::{ElementRef, Html, Node};

use crate::error::MarkupError;
use crate::fetch::decode::{decode_text, is_utf16};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct MarkupNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    last_descendant: NodeId,
}

impl MarkupNode {
    /// Lowercase tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self) -> &[(String, String)] {
        match &self.kind {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Callbacks for a depth-first walk. `exit` fires after all descendants.
pub trait NodeVisitor {
    fn enter(&mut self, tree: &MarkupTree, id: NodeId);

    fn exit(&mut self, _tree: &MarkupTree, _id: NodeId) {}
}

#[derive(Debug, Clone)]
pub struct MarkupTree {
    nodes: Vec<MarkupNode>,
    source: String,
}

enum Pending<'a> {
    Element(ElementRef<'a>, NodeId),
    Text(&'a str, NodeId),
}

impl MarkupTree {
    /// Decode `body` (charset from `content_type` or a meta tag) and parse it.
    pub fn from_bytes(body: &[u8], content_type: Option<&str>) -> Result<Self, MarkupError> {
        if !is_utf16(body, content_type) && looks_binary(body) {
            return Err(MarkupError::Binary);
        }
        Self::parse(&decode_text(body, content_type))
    }

    pub fn parse(html: &str) -> Result<Self, MarkupError> {
        if html.trim().is_empty() {
            return Err(MarkupError::Empty);
        }

        let document = Html::parse_document(html);
        let mut nodes = vec![MarkupNode {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
            last_descendant: 0,
        }];

        let mut stack = vec![Pending::Element(document.root_element(), 0)];
        while let Some(pending) = stack.pop() {
            let id = nodes.len();
            match pending {
                Pending::Text(text, parent) => {
                    nodes.push(MarkupNode {
                        kind: NodeKind::Text(text.to_string()),
                        parent: Some(parent),
                        children: Vec::new(),
                        last_descendant: id,
                    });
                    nodes[parent].children.push(id);
                }
                Pending::Element(element, parent) => {
                    let value = element.value();
                    nodes.push(MarkupNode {
                        kind: NodeKind::Element {
                            tag: value.name().to_ascii_lowercase(),
                            attrs: value
                                .attrs()
                                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                                .collect(),
                        },
                        parent: Some(parent),
                        children: Vec::new(),
                        last_descendant: id,
                    });
                    nodes[parent].children.push(id);

                    let mut children = Vec::new();
                    for child in element.children() {
                        match child.value() {
                            Node::Text(text) => children.push(Pending::Text(&**text, id)),
                            Node::Element(_) => {
                                if let Some(child_element) = ElementRef::wrap(child) {
                                    children.push(Pending::Element(child_element, id));
                                }
                            }
                            _ => {}
                        }
                    }
                    // reversed so the first child is popped first, keeping pre-order
                    stack.extend(children.into_iter().rev());
                }
            }
        }

        // children always carry larger ids than their parent in pre-order
        for id in (0..nodes.len()).rev() {
            if let Some(&last_child) = nodes[id].children.last() {
                nodes[id].last_descendant = nodes[last_child].last_descendant;
            }
        }

        Ok(Self {
            nodes,
            source: html.to_string(),
        })
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &MarkupNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The decoded document text the tree was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Ids of `id` and all its descendants, in document order.
    pub fn subtree(&self, id: NodeId) -> RangeInclusive<NodeId> {
        id..=self.nodes[id].last_descendant
    }

    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        id != ancestor && self.subtree(ancestor).contains(&id)
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .filter_map(|i| self.nodes[i].text())
            .collect()
    }

    pub fn walk<V: NodeVisitor>(&self, visitor: &mut V) {
        self.walk_from(self.root(), visitor);
    }

    /// Depth-first walk of the subtree rooted at `start`.
    pub fn walk_from<V: NodeVisitor>(&self, start: NodeId, visitor: &mut V) {
        let mut stack = vec![(start, false)];
        while let Some((id, entered)) = stack.pop() {
            if entered {
                visitor.exit(self, id);
                continue;
            }
            visitor.enter(self, id);
            stack.push((id, true));
            for &child in self.nodes[id].children.iter().rev() {
                stack.push((child, false));
            }
        }
    }
}

fn looks_binary(body: &[u8]) -> bool {
    body.iter().take(512).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<String>);

    impl NodeVisitor for Recorder {
        fn enter(&mut self, tree: &MarkupTree, id: NodeId) {
            match &tree.node(id).kind {
                NodeKind::Element { tag, .. } => self.0.push(format!("<{}>", tag)),
                NodeKind::Text(text) if !text.trim().is_empty() => self.0.push(text.trim().to_string()),
                _ => {}
            }
        }

        fn exit(&mut self, tree: &MarkupTree, id: NodeId) {
            if let Some(tag) = tree.node(id).tag() {
                self.0.push(format!("</{}>", tag));
            }
        }
    }

    #[test]
    fn test_walk_emits_enter_and_exit_in_order() {
        let tree = MarkupTree::parse("<ul><li>a</li><li>b <b>c</b></li></ul>").unwrap();
        let mut recorder = Recorder(Vec::new());
        tree.walk(&mut recorder);
        let events = recorder.0.join("");
        assert!(events.contains("<ul><li>a</li><li>b<b>c</b></li></ul>"));
        assert!(events.starts_with("<html><head></head><body>"));
        assert!(events.ends_with("</body></html>"));
    }

    #[test]
    fn test_attributes_and_subtree() {
        let tree = MarkupTree::parse(
            r#"<div CLASS="Ingredients"><p>1 egg</p><p>2 cups <i>milk</i></p></div><p>after</p>"#,
        )
        .unwrap();
        let div = (0..tree.len())
            .find(|&i| tree.node(i).is_element("div"))
            .unwrap();
        assert_eq!(tree.node(div).attr("class"), Some("Ingredients"));
        assert_eq!(tree.text_content(div), "1 egg2 cups milk");

        let after = (0..tree.len())
            .find(|&i| tree.node(i).text() == Some("after"))
            .unwrap();
        assert!(!tree.is_descendant(after, div));
        let milk = (0..tree.len())
            .find(|&i| tree.node(i).text() == Some("milk"))
            .unwrap();
        assert!(tree.is_descendant(milk, div));
    }

    #[test]
    fn test_script_text_is_kept_raw() {
        let tree = MarkupTree::parse(
            r#"<script type="application/ld+json">{"a": "<b>x</b>"}</script>"#,
        )
        .unwrap();
        let script = (0..tree.len())
            .find(|&i| tree.node(i).is_element("script"))
            .unwrap();
        assert_eq!(tree.text_content(script), r#"{"a": "<b>x</b>"}"#);
    }

    #[test]
    fn test_empty_and_binary_documents_fail() {
        assert_eq!(MarkupTree::parse("  \n").unwrap_err(), MarkupError::Empty);
        assert_eq!(
            MarkupTree::from_bytes(&[0x1f, 0x8b, 0x00, 0x00], None).unwrap_err(),
            MarkupError::Binary
        );
    }

    #[test]
    fn test_utf16_body_is_not_binary() {
        let bytes: Vec<u8> = r#"<ul><li class="ingredient">1 egg</li></ul>"#
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();

        let tree = MarkupTree::from_bytes(&bytes, Some("text/html; charset=utf-16le")).unwrap();
        assert!(tree.source().contains("1 egg"));

        assert_eq!(MarkupTree::from_bytes(&bytes, None).unwrap_err(), MarkupError::Binary);
    }

    #[test]
    fn test_malformed_markup_still_builds() {
        let tree = MarkupTree::parse("<div><li>unclosed<span>deep").unwrap();
        assert!(tree.len() > 4);
        assert!(tree.source().contains("unclosed"));
    }
}
