//! Caption change detection
//!
//! Caption UIs re-render word by word, producing many mutations per
//! sentence. The detector reduces a mutation batch to the captions whose
//! text actually differs from the last text seen for the same identity.

use crate::config::PageConfig;
use crate::dom::{Document, Mutation, NodeId};
use crate::identity::{identify, NodeIdentity};
use std::collections::HashMap;
use tracing::{debug, trace};

/// New caption text for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CaptionChange {
    pub identity: NodeIdentity,
    pub text: String,
}

pub(crate) struct ChangeDetector {
    caption_class: String,
    overlay_class: String,
    enabled: bool,
    /// Last text emitted per identity. Only the detector writes it.
    last_seen: HashMap<NodeIdentity, String>,
}

impl ChangeDetector {
    pub(crate) fn new(page: &PageConfig) -> Self {
        Self {
            caption_class: page.caption_class.clone(),
            overlay_class: page.overlay_class.clone(),
            enabled: true,
            last_seen: HashMap::new(),
        }
    }

    /// Switch detection on or off. The last-seen map is kept either way.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            debug!(enabled, "Caption detection toggled");
        }
        self.enabled = enabled;
    }

    /// Reduce a mutation batch to genuine caption changes, in batch order.
    pub(crate) fn observe(&mut self, doc: &Document, batch: &[Mutation]) -> Vec<CaptionChange> {
        if !self.enabled {
            return Vec::new();
        }
        let mut changes = Vec::new();
        for &mutation in batch {
            let Some(node) = self.caption_for(doc, mutation) else {
                continue;
            };
            if let Some(change) = self.consider(doc, node) {
                changes.push(change);
            }
        }
        changes
    }

    /// The caption element a mutation belongs to, if any
    fn caption_for(&self, doc: &Document, mutation: Mutation) -> Option<NodeId> {
        let node = match mutation {
            Mutation::NodeAdded(node) if doc.is_element(node) => node,
            // Text inserted into or edited inside a caption counts for its parent
            Mutation::NodeAdded(node) | Mutation::TextChanged(node) => doc.parent(node)?,
        };
        doc.has_class(node, &self.caption_class).then_some(node)
    }

    fn consider(&mut self, doc: &Document, node: NodeId) -> Option<CaptionChange> {
        // Our own overlay lives inside the caption and must not count as caption text
        let text = doc.text_content_excluding(node, &self.overlay_class);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let identity = identify(doc, node);
        if identity.is_empty() {
            return None;
        }
        if self.last_seen.get(&identity).map(String::as_str) == Some(text) {
            trace!(%identity, "Suppressing unchanged caption");
            return None;
        }

        self.last_seen.insert(identity.clone(), text.to_string());
        debug!(%identity, text_len = text.len(), "Caption changed");
        Some(CaptionChange {
            identity,
            text: text.to_string(),
        })
    }
}
