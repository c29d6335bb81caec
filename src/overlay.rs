//! Translation overlays on caption containers
//!
//! The overlay is a child element appended to the caption container. The
//! original caption content is never modified; rendering replaces any
//! overlay previously inserted under the same node.

use crate::config::PageConfig;
use crate::dom::{Document, NodeId};
use crate::identity::{resolve, NodeIdentity};
use tracing::debug;

/// Translation state recorded on a caption container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TranslationState {
    None,
    Pending,
    Done,
}

impl TranslationState {
    fn attribute_value(self) -> Option<&'static str> {
        match self {
            TranslationState::None => None,
            TranslationState::Pending => Some("pending"),
            TranslationState::Done => Some("done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderOutcome {
    Rendered(NodeId),
    /// The identity no longer resolves; nothing was rendered
    NodeGone,
}

pub(crate) struct OverlayRenderer {
    overlay_class: String,
    state_attribute: String,
}

impl OverlayRenderer {
    pub(crate) fn new(page: &PageConfig) -> Self {
        Self {
            overlay_class: page.overlay_class.clone(),
            state_attribute: page.state_attribute.clone(),
        }
    }

    /// Show `text` under the node at `identity`, replacing any earlier overlay.
    pub(crate) fn render(
        &self,
        doc: &mut Document,
        identity: &NodeIdentity,
        text: &str,
        color: &str,
    ) -> RenderOutcome {
        let Some(node) = resolve(doc, identity) else {
            debug!(%identity, "Caption gone before translation arrived");
            return RenderOutcome::NodeGone;
        };

        self.remove_overlays(doc, node);

        let overlay = doc.create_element("div");
        doc.add_class(overlay, &self.overlay_class);
        if !color.trim().is_empty() {
            doc.set_attribute(overlay, "style", &format!("color: {}", color.trim()));
        }
        let content = doc.create_text(text);
        doc.append_child(overlay, content);
        doc.append_child(node, overlay);

        self.set_state(doc, node, TranslationState::Done);
        RenderOutcome::Rendered(node)
    }

    /// Record that a translation for `identity` is on its way
    pub(crate) fn mark_pending(&self, doc: &mut Document, identity: &NodeIdentity) {
        if let Some(node) = resolve(doc, identity) {
            self.set_state(doc, node, TranslationState::Pending);
        }
    }

    /// Remove every overlay on the page and reset the containers' state
    pub(crate) fn clear_all(&self, doc: &mut Document) {
        for (node, _) in self.all_overlays(doc) {
            self.remove_overlays(doc, node);
            self.set_state(doc, node, TranslationState::None);
        }
    }

    fn remove_overlays(&self, doc: &mut Document, node: NodeId) {
        for overlay in doc.descendants_with_class(node, &self.overlay_class) {
            doc.remove(overlay);
        }
    }

    fn set_state(&self, doc: &mut Document, node: NodeId, state: TranslationState) {
        match state.attribute_value() {
            Some(value) => doc.set_attribute(node, &self.state_attribute, value),
            None => doc.remove_attribute(node, &self.state_attribute),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, doc: &Document, node: NodeId) -> TranslationState {
        match doc.attribute(node, &self.state_attribute) {
            Some("pending") => TranslationState::Pending,
            Some("done") => TranslationState::Done,
            _ => TranslationState::None,
        }
    }

    /// Texts of the overlays currently shown under `node`
    #[cfg(test)]
    pub(crate) fn overlay_texts(&self, doc: &Document, node: NodeId) -> Vec<String> {
        doc.descendants_with_class(node, &self.overlay_class)
            .into_iter()
            .map(|overlay| doc.text_content(overlay))
            .collect()
    }

    /// Every overlay on the page with the caption it belongs to, in document order
    pub(crate) fn all_overlays(&self, doc: &Document) -> Vec<(NodeId, String)> {
        doc.descendants_with_class(doc.body(), &self.overlay_class)
            .into_iter()
            .filter_map(|overlay| Some((doc.parent(overlay)?, doc.text_content(overlay))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::identity::identify;

    fn renderer() -> OverlayRenderer {
        OverlayRenderer::new(&load_config().expect("config").page)
    }

    fn caption(doc: &mut Document, text: &str) -> NodeId {
        let div = doc.create_element("div");
        doc.add_class(div, "bh44bd");
        let content = doc.create_text(text);
        doc.append_child(div, content);
        doc.append_child(doc.body(), div);
        div
    }

    #[test]
    fn test_render_appends_overlay_and_keeps_caption() {
        let mut doc = Document::new();
        let node = caption(&mut doc, "Hello");
        let renderer = renderer();
        let identity = identify(&doc, node);

        let outcome = renderer.render(&mut doc, &identity, "こんにちは", "#ffeb3b");
        assert_eq!(outcome, RenderOutcome::Rendered(node));
        assert_eq!(renderer.overlay_texts(&doc, node), vec!["こんにちは"]);
        assert_eq!(doc.text_content_excluding(node, "mt-translation"), "Hello");
        assert_eq!(renderer.state(&doc, node), TranslationState::Done);

        let overlay = doc.descendants_with_class(node, "mt-translation")[0];
        assert_eq!(doc.attribute(overlay, "style"), Some("color: #ffeb3b"));
    }

    #[test]
    fn test_second_render_replaces_first() {
        let mut doc = Document::new();
        let node = caption(&mut doc, "Hello");
        let renderer = renderer();
        let identity = identify(&doc, node);

        renderer.render(&mut doc, &identity, "A", "red");
        renderer.render(&mut doc, &identity, "B", "red");
        assert_eq!(renderer.overlay_texts(&doc, node), vec!["B"]);

        // Duplicate delivery of the same result is harmless
        renderer.render(&mut doc, &identity, "B", "red");
        assert_eq!(renderer.overlay_texts(&doc, node), vec!["B"]);
    }

    #[test]
    fn test_gone_node_is_dropped_silently() {
        let mut doc = Document::new();
        let node = caption(&mut doc, "Hello");
        let renderer = renderer();
        let identity = identify(&doc, node);
        doc.remove(node);

        assert_eq!(
            renderer.render(&mut doc, &identity, "こんにちは", "red"),
            RenderOutcome::NodeGone
        );
        assert!(renderer.all_overlays(&doc).is_empty());
    }

    #[test]
    fn test_render_follows_recreated_container() {
        let mut doc = Document::new();
        let old = caption(&mut doc, "Hello");
        let renderer = renderer();
        let identity = identify(&doc, old);

        // Host replaces the container with a fresh element at the same place
        doc.remove(old);
        let fresh = caption(&mut doc, "Hello");
        assert_eq!(
            renderer.render(&mut doc, &identity, "こんにちは", "red"),
            RenderOutcome::Rendered(fresh)
        );
        assert_eq!(renderer.all_overlays(&doc), vec![(fresh, "こんにちは".to_string())]);
    }

    #[test]
    fn test_pending_then_clear_all() {
        let mut doc = Document::new();
        let node = caption(&mut doc, "Hello");
        let renderer = renderer();
        let identity = identify(&doc, node);

        assert_eq!(renderer.state(&doc, node), TranslationState::None);
        renderer.mark_pending(&mut doc, &identity);
        assert_eq!(renderer.state(&doc, node), TranslationState::Pending);

        renderer.render(&mut doc, &identity, "x", "");
        renderer.clear_all(&mut doc);
        assert_eq!(renderer.state(&doc, node), TranslationState::None);
        assert!(renderer.overlay_texts(&doc, node).is_empty());
        assert_eq!(doc.text_content(node), "Hello");
    }
}
