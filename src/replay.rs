//! Caption script replay
//!
//! Drives a session from a JSON-lines script instead of a live page. Each
//! line is one step: host page edits (captions appearing, growing,
//! disappearing), settings changes, and minutes requests. Blank lines and
//! lines starting with `#` are skipped.
//!
//! ```text
//! {"op": "add_caption", "text": "Hello"}
//! {"op": "set_text", "caption": 0, "text": "Hello there"}
//! {"op": "settings", "minutes_enabled": true}
//! {"op": "generate_minutes"}
//! ```

use crate::dom::{Document, NodeId};
use crate::identity::identify;
use crate::overlay::OverlayRenderer;
use crate::runtime::SessionHandle;
use crate::settings::{Credential, SettingsStore};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::Write;
use tracing::debug;

/// Class of the region element captions are appended to
const REGION_CLASS: &str = "caption-region";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ReplayStep {
    /// Append a new caption container holding `text`
    AddCaption { text: String },
    /// Insert a new caption container before the caption added at index `before`
    InsertCaption { before: usize, text: String },
    /// Replace the text of the caption added at index `caption`
    SetText { caption: usize, text: String },
    /// Remove the caption added at index `caption`
    RemoveCaption { caption: usize },
    /// Change stored settings; omitted fields are left alone
    Settings(SettingsPatch),
    /// Wait for outstanding requests
    Settle,
    GenerateMinutes,
    Status,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SettingsPatch {
    pub api_key: Option<String>,
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub minutes_enabled: Option<bool>,
    pub minutes_recipient: Option<String>,
    pub overlay_color: Option<String>,
    pub translate_enabled: Option<bool>,
}

impl SettingsPatch {
    /// Apply the fields that are present to `store`
    pub(crate) fn apply(self, store: &SettingsStore) -> Result<()> {
        store.update(|s| {
            if let Some(key) = self.api_key {
                s.credential = Credential::new(key);
            }
            if let Some(lang) = self.target_lang {
                s.target_lang = lang;
            }
            if let Some(model) = self.model {
                s.model = model;
            }
            if let Some(enabled) = self.minutes_enabled {
                s.minutes_enabled = enabled;
            }
            if let Some(recipient) = self.minutes_recipient {
                s.minutes_recipient = recipient;
            }
            if let Some(color) = self.overlay_color {
                s.overlay_color = color;
            }
            if let Some(enabled) = self.translate_enabled {
                s.translate_enabled = enabled;
            }
        })?;
        Ok(())
    }
}

/// Parse a script, reporting the line of the first bad step
pub(crate) fn parse_script(source: &str) -> Result<Vec<ReplayStep>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid step on line {}", index + 1))
        })
        .collect()
}

/// Caption containers created by the script, in creation order
#[derive(Default)]
struct Captions {
    region: Option<NodeId>,
    nodes: Vec<(NodeId, NodeId)>,
}

impl Captions {
    fn get(&self, index: usize) -> Result<(NodeId, NodeId)> {
        self.nodes
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("No caption with index {}", index))
    }
}

/// Run `steps` against a session, writing results to `out`.
///
/// The script always ends with a settle and a final report of the
/// overlays on the page and the session status.
pub(crate) async fn run_script(
    handle: &SessionHandle,
    store: &SettingsStore,
    renderer: OverlayRenderer,
    caption_class: &str,
    steps: Vec<ReplayStep>,
    out: &mut impl Write,
) -> Result<()> {
    let mut captions = Captions::default();
    let closed = || anyhow!("Caption session stopped unexpectedly");

    for step in steps {
        debug!(?step, "Replaying step");
        match step {
            ReplayStep::AddCaption { text } => {
                let region = captions.region;
                let class = caption_class.to_string();
                let (region, caption) = handle
                    .edit_page(move |doc| add_caption(doc, region, None, &class, &text))
                    .await
                    .ok_or_else(closed)?;
                captions.region = Some(region);
                captions.nodes.push(caption);
            }
            ReplayStep::InsertCaption { before, text } => {
                let (reference, _) = captions.get(before)?;
                let region = captions.region;
                let class = caption_class.to_string();
                let (region, caption) = handle
                    .edit_page(move |doc| add_caption(doc, region, Some(reference), &class, &text))
                    .await
                    .ok_or_else(closed)?;
                captions.region = Some(region);
                captions.nodes.push(caption);
            }
            ReplayStep::SetText { caption, text } => {
                let (_, content) = captions.get(caption)?;
                handle
                    .edit_page(move |doc| doc.set_text(content, &text))
                    .await
                    .ok_or_else(closed)?;
            }
            ReplayStep::RemoveCaption { caption } => {
                let (container, _) = captions.get(caption)?;
                handle
                    .edit_page(move |doc| doc.remove(container))
                    .await
                    .ok_or_else(closed)?;
            }
            ReplayStep::Settings(patch) => patch.apply(store)?,
            ReplayStep::Settle => {
                if !handle.settle().await {
                    return Err(closed());
                }
            }
            ReplayStep::GenerateMinutes => {
                if !handle.settle().await {
                    return Err(closed());
                }
                match handle.generate_minutes().await {
                    Ok(report) => {
                        writeln!(
                            out,
                            "minutes generated at {}{}",
                            report.generated_at.format("%Y-%m-%d %H:%M:%S"),
                            if report.draft_opened {
                                " (email draft opened)"
                            } else {
                                ""
                            }
                        )?;
                        writeln!(out, "{}", report.summary)?;
                    }
                    Err(e) => writeln!(out, "minutes not generated: {}", e)?,
                }
            }
            ReplayStep::Status => {
                let status = handle.status().await.ok_or_else(closed)?;
                writeln!(out, "{}", serde_json::to_string(&status)?)?;
            }
        }
    }

    if !handle.settle().await {
        return Err(closed());
    }
    let overlays = handle
        .edit_page(move |doc| {
            renderer
                .all_overlays(doc)
                .into_iter()
                .map(|(node, text)| (identify(doc, node), text))
                .collect::<Vec<_>>()
        })
        .await
        .ok_or_else(closed)?;
    for (identity, text) in overlays {
        writeln!(out, "{}\t{}", identity, text)?;
    }
    let status = handle.status().await.ok_or_else(closed)?;
    writeln!(out, "{}", serde_json::to_string(&status)?)?;
    Ok(())
}

/// Add a caption container to the caption region, creating the region on
/// first use. Returns the region and (container, text node).
fn add_caption(
    doc: &mut Document,
    region: Option<NodeId>,
    before: Option<NodeId>,
    caption_class: &str,
    text: &str,
) -> (NodeId, (NodeId, NodeId)) {
    let region = match region {
        Some(region) if doc.is_connected(region) => region,
        _ => {
            let region = doc.create_element("div");
            doc.add_class(region, REGION_CLASS);
            let body = doc.body();
            doc.append_child(body, region);
            region
        }
    };
    let container = doc.create_element("div");
    doc.add_class(container, caption_class);
    let content = doc.create_text(text);
    doc.append_child(container, content);
    match before {
        Some(reference) => doc.insert_before(region, container, reference),
        None => doc.append_child(region, container),
    }
    (region, (container, content))
}
