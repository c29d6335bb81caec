//! In-memory model of the host page's element tree
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Removing a node
//! detaches it from its parent; it stays in the arena but is no longer
//! reachable from the body. Like a mutation observer scoped to the body,
//! the document records node insertions and text changes under the body
//! until they are drained with [`Document::take_mutations`].

use std::collections::BTreeMap;

/// Handle of a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// A structural or text change observed under the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    /// A node was inserted under a connected parent
    NodeAdded(NodeId),
    /// The text of a connected text node changed
    TextChanged(NodeId),
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, Default)]
struct ElementData {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    mutations: Vec<Mutation>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub(crate) fn new() -> Self {
        let body = Node {
            kind: NodeKind::Element(ElementData {
                tag: "BODY".to_string(),
                ..ElementData::default()
            }),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            mutations: Vec::new(),
        }
    }

    pub(crate) fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element. Tag names are stored upper-case.
    pub(crate) fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_uppercase(),
            ..ElementData::default()
        }))
    }

    /// Create a detached text node
    pub(crate) fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        self.record_insertion(child);
    }

    /// Insert `child` before `reference` under `parent`.
    ///
    /// Appends when `reference` is not a child of `parent`.
    pub(crate) fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let position = siblings
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
        self.record_insertion(child);
    }

    /// Detach `node` from its parent
    pub(crate) fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn record_insertion(&mut self, node: NodeId) {
        if self.is_connected(node) {
            self.mutations.push(Mutation::NodeAdded(node));
        }
    }

    /// Drain the mutations recorded since the last call
    pub(crate) fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub(crate) fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub(crate) fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Child elements of `node`, skipping text nodes
    pub(crate) fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    pub(crate) fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element(_))
    }

    /// True if `node` is the body or a descendant of it
    pub(crate) fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.body {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match self.nodes[node.0].kind {
            NodeKind::Element(ref data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match self.nodes[node.0].kind {
            NodeKind::Element(ref mut data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    /// Upper-case tag name, `None` for text nodes
    pub(crate) fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub(crate) fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            if !element.classes.iter().any(|c| c == class) {
                element.classes.push(class.to_string());
            }
        }
    }

    pub(crate) fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|e| e.classes.iter().any(|c| c == class))
    }

    pub(crate) fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element
                .attributes
                .insert(name.to_string(), value.to_string());
        }
    }

    #[cfg(test)]
    pub(crate) fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    pub(crate) fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.remove(name);
        }
    }

    /// Replace the text of a text node. Returns false for elements.
    pub(crate) fn set_text(&mut self, node: NodeId, text: &str) -> bool {
        let changed = match self.nodes[node.0].kind {
            NodeKind::Text(ref mut current) => {
                let changed = current.as_str() != text;
                if changed {
                    *current = text.to_string();
                }
                changed
            }
            NodeKind::Element(_) => return false,
        };
        if changed && self.is_connected(node) {
            self.mutations.push(Mutation::TextChanged(node));
        }
        true
    }

    /// Concatenated text of `node` and all its descendants
    pub(crate) fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, None, &mut out);
        out
    }

    /// Like [`Document::text_content`], skipping subtrees rooted at
    /// elements that carry `skip_class`
    pub(crate) fn text_content_excluding(&self, node: NodeId, skip_class: &str) -> String {
        let mut out = String::new();
        self.collect_text(node, Some(skip_class), &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, skip_class: Option<&str>, out: &mut String) {
        match self.nodes[node.0].kind {
            NodeKind::Text(ref text) => out.push_str(text),
            NodeKind::Element(_) => {
                for &child in self.children(node) {
                    if skip_class.is_some_and(|class| self.has_class(child, class)) {
                        continue;
                    }
                    self.collect_text(child, skip_class, out);
                }
            }
        }
    }

    /// Descendant elements of `node` carrying `class`, in document order
    pub(crate) fn descendants_with_class(&self, node: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if self.has_class(current, class) {
                found.push(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertions_under_body_are_recorded() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let text = doc.create_text("Hello");
        doc.append_child(div, text);
        // Building a detached subtree is not observed
        assert!(doc.take_mutations().is_empty());

        doc.append_child(doc.body(), div);
        assert_eq!(doc.take_mutations(), vec![Mutation::NodeAdded(div)]);

        doc.set_text(text, "Hello there");
        assert_eq!(doc.take_mutations(), vec![Mutation::TextChanged(text)]);

        // Same text again is not a change
        doc.set_text(text, "Hello there");
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_text_content_excluding_skips_marked_subtrees() {
        let mut doc = Document::new();
        let caption = doc.create_element("div");
        let original = doc.create_text("Hello");
        let overlay = doc.create_element("div");
        doc.add_class(overlay, "mt-translation");
        let translated = doc.create_text("こんにちは");
        doc.append_child(overlay, translated);
        doc.append_child(caption, original);
        doc.append_child(caption, overlay);

        assert_eq!(doc.text_content(caption), "Helloこんにちは");
        assert_eq!(
            doc.text_content_excluding(caption, "mt-translation"),
            "Hello"
        );
    }

    #[test]
    fn test_remove_disconnects_subtree() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);
        assert!(doc.is_connected(inner));

        doc.remove(outer);
        assert!(!doc.is_connected(inner));
        assert!(doc.children(doc.body()).is_empty());
    }

    #[test]
    fn test_insert_before_orders_children() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(doc.body(), a);
        doc.insert_before(doc.body(), b, a);
        assert_eq!(doc.children(doc.body()), &[b, a]);
    }

    #[test]
    fn test_descendants_with_class_in_document_order() {
        let mut doc = Document::new();
        let first = doc.create_element("div");
        let nested = doc.create_element("span");
        let second = doc.create_element("div");
        for node in [first, nested, second] {
            doc.add_class(node, "x");
        }
        doc.append_child(doc.body(), first);
        doc.append_child(first, nested);
        doc.append_child(doc.body(), second);
        assert_eq!(
            doc.descendants_with_class(doc.body(), "x"),
            vec![first, nested, second]
        );
    }
}
