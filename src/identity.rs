//! Structural node identities
//!
//! Caption containers are re-created by the host page all the time, so a
//! stored node handle goes stale. Instead, a node is identified by its path
//! from the body: each step is the element tag plus the element's 0-based
//! index among siblings with the same tag, e.g. `/DIV[0]/SPAN[1]`.
//!
//! Known limitation: if the page changes shape between [`identify`] and
//! [`resolve`], a different node may now sit at the same path and is
//! returned instead. This is accepted.

use crate::dom::{Document, NodeId};
use std::fmt;

/// Path-like identity of a node relative to the body
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeIdentity(String);

impl NodeIdentity {
    #[cfg(test)]
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty identities never resolve
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parsed `(tag, same-tag index)` steps from the body down
    fn steps(&self) -> Option<Vec<(&str, usize)>> {
        let path = self.0.strip_prefix('/')?;
        path.split('/')
            .map(|step| {
                let (tag, rest) = step.split_once('[')?;
                let index = rest.strip_suffix(']')?.parse().ok()?;
                (!tag.is_empty()).then_some((tag, index))
            })
            .collect()
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeIdentity {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

/// Compute the identity of `node`.
///
/// The body itself, text nodes and detached nodes get the empty identity.
pub(crate) fn identify(doc: &Document, node: NodeId) -> NodeIdentity {
    if !doc.is_connected(node) {
        return NodeIdentity::default();
    }

    let mut steps = Vec::new();
    let mut current = node;
    while current != doc.body() {
        let (Some(tag), Some(parent)) = (doc.tag_name(current), doc.parent(current)) else {
            return NodeIdentity::default();
        };
        let index = doc
            .element_children(parent)
            .take_while(|&sibling| sibling != current)
            .filter(|&sibling| doc.tag_name(sibling) == Some(tag))
            .count();
        steps.push(format!("/{}[{}]", tag, index));
        current = parent;
    }

    steps.reverse();
    NodeIdentity(steps.concat())
}

/// Find the node currently at `identity`, walking down from the body.
///
/// Returns `None` if any step no longer matches or the identity is malformed.
pub(crate) fn resolve(doc: &Document, identity: &NodeIdentity) -> Option<NodeId> {
    let steps = identity.steps()?;
    let mut current = doc.body();
    for (tag, index) in steps {
        current = doc
            .element_children(current)
            .filter(|&child| doc.tag_name(child) == Some(tag))
            .nth(index)?;
    }
    Some(current)
}
