//! Caption session
//!
//! Ties the pipeline together: mutation batches go through the detector and
//! dispatcher, accepted results are rendered and accumulated, and minutes
//! requests run the generate/deliver cycle. Every method runs on the single
//! session loop in [`crate::runtime`]; network work is spawned and reports
//! back through the channels in [`SessionInbox`].

use crate::capabilities::{DraftComposer, Summarizer, Translator};
use crate::config::Config;
use crate::detector::ChangeDetector;
use crate::dispatcher::{Completion, Dispatched, Dispatcher, TranslationResult};
use crate::dom::{Document, Mutation};
use crate::error::{ApiError, MinutesError};
use crate::minutes::{GenerationTicket, MinutesMachine, MinutesState};
use crate::overlay::{OverlayRenderer, RenderOutcome};
use crate::settings::Settings;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Finished minutes, returned to whoever asked for them
#[derive(Debug, Clone)]
pub(crate) struct MinutesReport {
    pub summary: String,
    /// Whether the mail client was handed a draft
    pub draft_opened: bool,
    pub generated_at: DateTime<Local>,
}

pub(crate) type MinutesReply = oneshot::Sender<Result<MinutesReport, MinutesError>>;

/// Summarization outcome reported back to the session loop
#[derive(Debug)]
pub(crate) struct SummaryCompletion {
    pub generation: u64,
    pub outcome: Result<String, ApiError>,
}

/// Receiving ends of the channels spawned work reports on
pub(crate) struct SessionInbox {
    pub translations: mpsc::UnboundedReceiver<Completion>,
    pub summaries: mpsc::UnboundedReceiver<SummaryCompletion>,
}

/// Snapshot of the session for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SessionStatus {
    pub credential_configured: bool,
    pub translate_enabled: bool,
    pub target_lang: String,
    pub latest_translation: Option<String>,
    pub minutes_state: MinutesState,
    pub transcript_chars: usize,
    pub translations_in_flight: usize,
}

struct PendingMinutes {
    ticket: GenerationTicket,
    reply: MinutesReply,
}

pub(crate) struct Session {
    config: Config,
    settings: Settings,
    detector: ChangeDetector,
    dispatcher: Dispatcher,
    renderer: OverlayRenderer,
    minutes: MinutesMachine,
    summarizer: Arc<dyn Summarizer>,
    composer: Arc<dyn DraftComposer>,
    summaries: mpsc::UnboundedSender<SummaryCompletion>,
    pending_minutes: Option<PendingMinutes>,
    latest_translation: Option<String>,
}

impl Session {
    pub(crate) fn new(
        config: Config,
        settings: Settings,
        translator: Arc<dyn Translator>,
        summarizer: Arc<dyn Summarizer>,
        composer: Arc<dyn DraftComposer>,
    ) -> (Self, SessionInbox) {
        let (translations_tx, translations) = mpsc::unbounded_channel();
        let (summaries_tx, summaries) = mpsc::unbounded_channel();

        let mut detector = ChangeDetector::new(&config.page);
        detector.set_enabled(settings.translate_enabled);

        let session = Self {
            dispatcher: Dispatcher::new(translator, config.translation.clone(), translations_tx),
            renderer: OverlayRenderer::new(&config.page),
            minutes: MinutesMachine::new(settings.minutes_enabled, config.minutes.max_input_chars),
            detector,
            config,
            settings,
            summarizer,
            composer,
            summaries: summaries_tx,
            pending_minutes: None,
            latest_translation: None,
        };
        (
            session,
            SessionInbox {
                translations,
                summaries,
            },
        )
    }

    /// Handle one batch of page mutations
    pub(crate) fn on_mutations(&mut self, doc: &mut Document, batch: &[Mutation]) {
        for change in self.detector.observe(doc, batch) {
            let identity = change.identity.clone();
            match self.dispatcher.dispatch(change, &self.settings) {
                Dispatched::Sent(_) => self.renderer.mark_pending(doc, &identity),
                Dispatched::Immediate(result) => self.apply_result(doc, result),
            }
        }
    }

    /// Handle a finished translation request
    pub(crate) fn on_translation(&mut self, doc: &mut Document, completion: Completion) {
        if let Some(result) = self.dispatcher.accept(completion) {
            self.apply_result(doc, result);
        }
    }

    fn apply_result(&mut self, doc: &mut Document, result: TranslationResult) {
        if self.settings.translate_enabled {
            let outcome = self.renderer.render(
                doc,
                &result.identity,
                &result.translated_text,
                &self.settings.overlay_color,
            );
            if outcome == RenderOutcome::NodeGone {
                debug!(identity = %result.identity, "Caption removed, keeping translation for minutes only");
            }
            if !result.is_error {
                self.latest_translation = Some(result.translated_text.clone());
            }
        } else {
            debug!(identity = %result.identity, "Translation off, not rendering result");
        }

        // The request was made while translation was on; minutes still get it
        self.minutes.accumulate(&result);
    }

    /// Replace the settings snapshot after a change notification
    pub(crate) fn on_settings_changed(&mut self, doc: &mut Document, settings: Settings) {
        let was_translating = self.settings.translate_enabled;
        self.settings = settings;

        self.detector.set_enabled(self.settings.translate_enabled);
        if was_translating && !self.settings.translate_enabled {
            info!("Translation turned off, removing overlays");
            self.renderer.clear_all(doc);
        }

        if self.minutes.apply_settings(&self.settings) {
            if let Some(pending) = self.pending_minutes.take() {
                info!("Minutes disabled while generating, discarding result");
                let _ = pending.reply.send(Err(MinutesError::Cancelled));
            }
        }
    }

    /// Start generating minutes; `reply` receives the outcome.
    pub(crate) fn request_minutes(&mut self, reply: MinutesReply) {
        let ticket = match self.minutes.begin_generation(&self.settings) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Minutes request refused: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        info!(
            generation = ticket.generation,
            transcript_chars = ticket.transcript.chars().count(),
            "Generating meeting minutes"
        );

        let summarizer = Arc::clone(&self.summarizer);
        let summaries = self.summaries.clone();
        let timeout = self.config.minutes.timeout();
        let generation = ticket.generation;
        let transcript = ticket.transcript.clone();
        let model = ticket.model.clone();
        let credential = ticket.credential.clone();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                timeout,
                summarizer.summarize(&transcript, &model, &credential),
            )
            .await
            .unwrap_or(Err(ApiError::Timeout(timeout.as_secs())));
            let _ = summaries.send(SummaryCompletion {
                generation,
                outcome,
            });
        });

        self.pending_minutes = Some(PendingMinutes { ticket, reply });
    }

    /// Handle a finished summarization: deliver it or report the failure
    pub(crate) fn on_summary(&mut self, completion: SummaryCompletion) {
        let current = self.pending_minutes.as_ref().map(|p| p.ticket.generation);
        if current != Some(completion.generation) {
            debug!(generation = completion.generation, "Discarding stale summary");
            return;
        }
        let Some(PendingMinutes { ticket, reply }) = self.pending_minutes.take() else {
            return;
        };

        let summary = match completion.outcome {
            Ok(summary) => summary,
            Err(e) => {
                error!("Failed to generate minutes: {}", e);
                self.minutes.summary_failed(&ticket);
                let _ = reply.send(Err(MinutesError::SummarizeFailed(e.to_string())));
                return;
            }
        };

        if !self.minutes.summary_ready(&ticket) {
            let _ = reply.send(Err(MinutesError::Cancelled));
            return;
        }

        let draft_opened = match self.composer.open_draft(
            &self.settings.minutes_recipient,
            &self.config.minutes.subject,
            &summary,
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!("Email draft not opened: {}", e);
                false
            }
        };
        self.minutes.delivery_finished(&ticket);
        info!(draft_opened, "Meeting minutes generated");

        let _ = reply.send(Ok(MinutesReport {
            summary,
            draft_opened,
            generated_at: Local::now(),
        }));
    }

    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus {
            credential_configured: self.settings.credential().is_some(),
            translate_enabled: self.settings.translate_enabled,
            target_lang: self.settings.target_lang().to_string(),
            latest_translation: self.latest_translation.clone(),
            minutes_state: self.minutes.state(),
            transcript_chars: self.minutes.transcript().chars().count(),
            translations_in_flight: self.dispatcher.in_flight(),
        }
    }

    /// No translation or minutes request outstanding
    pub(crate) fn is_idle(&self) -> bool {
        self.dispatcher.in_flight() == 0 && self.pending_minutes.is_none()
    }

    #[cfg(test)]
    pub(crate) fn transcript(&self) -> &str {
        self.minutes.transcript()
    }
}
