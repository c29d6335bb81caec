//! Meeting minutes aggregation
//!
//! Successful translations accumulate in a transcript while minutes are
//! enabled. Generating minutes moves through `Generating` and `Delivering`
//! and clears the handed-off transcript only once delivery has been
//! attempted. A failed summarization leaves the transcript untouched.
//!
//! The machine itself never suspends; the session drives it around the
//! network calls and re-checks it on every resume via the generation
//! number carried by [`GenerationTicket`].

use crate::dispatcher::TranslationResult;
use crate::error::MinutesError;
use crate::markers::ErrorMarker;
use crate::settings::{Credential, Settings};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MinutesState {
    Disabled,
    Accumulating,
    Generating,
    Delivering,
}

/// Everything needed to run one summarization
#[derive(Debug)]
pub(crate) struct GenerationTicket {
    pub generation: u64,
    /// Transcript sent for summarization, possibly truncated to its tail
    pub transcript: String,
    pub model: String,
    pub credential: Credential,
    /// Length of the transcript prefix this generation covers
    handed_off: usize,
}

pub(crate) struct MinutesMachine {
    state: MinutesState,
    transcript: String,
    generation: u64,
    max_input_chars: usize,
}

impl MinutesMachine {
    pub(crate) fn new(enabled: bool, max_input_chars: usize) -> Self {
        Self {
            state: if enabled {
                MinutesState::Accumulating
            } else {
                MinutesState::Disabled
            },
            transcript: String::new(),
            generation: 0,
            max_input_chars,
        }
    }

    pub(crate) fn state(&self) -> MinutesState {
        self.state
    }

    pub(crate) fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Follow the minutes-enabled setting.
    ///
    /// Turning minutes off always clears the transcript and invalidates any
    /// generation in progress. Returns true if a running generation was
    /// invalidated.
    pub(crate) fn apply_settings(&mut self, settings: &Settings) -> bool {
        if settings.minutes_enabled {
            if self.state == MinutesState::Disabled {
                info!("Meeting minutes enabled");
                self.state = MinutesState::Accumulating;
            }
            return false;
        }

        let was_running = matches!(
            self.state,
            MinutesState::Generating | MinutesState::Delivering
        );
        if self.state != MinutesState::Disabled || !self.transcript.is_empty() {
            info!(
                cleared_chars = self.transcript.chars().count(),
                "Meeting minutes disabled, captions cleared"
            );
        }
        self.transcript.clear();
        self.state = MinutesState::Disabled;
        self.generation += 1;
        was_running
    }

    /// Append a successful translation. Errors, markers and empty text are
    /// never accumulated. Returns true if the text was appended.
    pub(crate) fn accumulate(&mut self, result: &TranslationResult) -> bool {
        if self.state == MinutesState::Disabled || result.is_error {
            return false;
        }
        let text = result.translated_text.trim();
        if text.is_empty() || ErrorMarker::is_marker(text) {
            return false;
        }

        self.transcript.push_str(&result.translated_text);
        self.transcript.push('\n');
        debug!(
            total_chars = self.transcript.chars().count(),
            "Caption accumulated"
        );
        true
    }

    /// Check the guards and enter `Generating`.
    ///
    /// On refusal the state and transcript are unchanged.
    pub(crate) fn begin_generation(
        &mut self,
        settings: &Settings,
    ) -> Result<GenerationTicket, MinutesError> {
        if self.state == MinutesState::Disabled || !settings.minutes_enabled {
            return Err(MinutesError::Disabled);
        }
        if self.state != MinutesState::Accumulating {
            return Err(MinutesError::AlreadyRunning);
        }
        let credential = settings
            .credential()
            .ok_or(MinutesError::CredentialMissing)?;
        if self.transcript.trim().is_empty() {
            return Err(MinutesError::NothingToSummarize);
        }
        let model = settings.model().ok_or(MinutesError::ModelMissing)?;

        let transcript = keep_tail(&self.transcript, self.max_input_chars);
        if transcript.len() < self.transcript.len() {
            warn!(
                total_chars = self.transcript.chars().count(),
                kept_chars = self.max_input_chars,
                "Transcript too long for summary, keeping the most recent part"
            );
        }

        self.generation += 1;
        self.state = MinutesState::Generating;
        Ok(GenerationTicket {
            generation: self.generation,
            transcript: transcript.to_string(),
            model: model.to_string(),
            credential: credential.clone(),
            handed_off: self.transcript.len(),
        })
    }

    fn is_current(&self, generation: u64, state: MinutesState) -> bool {
        self.generation == generation && self.state == state
    }

    /// Summarization failed: back to `Accumulating`, transcript kept.
    pub(crate) fn summary_failed(&mut self, ticket: &GenerationTicket) {
        if self.is_current(ticket.generation, MinutesState::Generating) {
            self.state = MinutesState::Accumulating;
        }
    }

    /// Summarization succeeded: enter `Delivering`.
    ///
    /// Returns false if the generation was invalidated meanwhile, in which
    /// case the summary must be discarded.
    pub(crate) fn summary_ready(&mut self, ticket: &GenerationTicket) -> bool {
        if !self.is_current(ticket.generation, MinutesState::Generating) {
            return false;
        }
        self.state = MinutesState::Delivering;
        true
    }

    /// Delivery attempted: drop the handed-off transcript and resume accumulating.
    ///
    /// Captions that arrived while generating stay in the transcript.
    pub(crate) fn delivery_finished(&mut self, ticket: &GenerationTicket) {
        if !self.is_current(ticket.generation, MinutesState::Delivering) {
            return;
        }
        let handed_off = ticket.handed_off.min(self.transcript.len());
        self.transcript.drain(..handed_off);
        self.state = MinutesState::Accumulating;
    }
}

/// The last `max_chars` characters of `text`
fn keep_tail(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    text.char_indices()
        .nth(total - max_chars)
        .map(|(index, _)| &text[index..])
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeIdentity;

    fn enabled_settings() -> Settings {
        Settings {
            credential: Credential::new("sk-test"),
            minutes_enabled: true,
            ..Settings::default()
        }
    }

    fn ok(text: &str) -> TranslationResult {
        TranslationResult {
            identity: NodeIdentity::from("/DIV[0]"),
            original_text: "source".to_string(),
            translated_text: text.to_string(),
            is_error: false,
        }
    }

    fn accumulating(lines: &[&str]) -> MinutesMachine {
        let mut machine = MinutesMachine::new(true, 20000);
        for line in lines {
            machine.accumulate(&ok(line));
        }
        machine
    }

    #[test]
    fn test_initial_state_follows_setting() {
        assert_eq!(MinutesMachine::new(false, 10).state(), MinutesState::Disabled);
        assert_eq!(
            MinutesMachine::new(true, 10).state(),
            MinutesState::Accumulating
        );
    }

    #[test]
    fn test_accumulate_appends_lines() {
        let machine = accumulating(&["こんにちは", "元気ですか"]);
        assert_eq!(machine.transcript(), "こんにちは\n元気ですか\n");
    }

    #[test]
    fn test_errors_and_markers_are_not_accumulated() {
        let mut machine = accumulating(&[]);
        let mut failed = ok("[API error]");
        failed.is_error = true;
        assert!(!machine.accumulate(&failed));
        assert!(!machine.accumulate(&ok("[翻訳失敗]")));
        assert!(!machine.accumulate(&ok("   ")));
        assert!(machine.transcript().is_empty());
    }

    #[test]
    fn test_disabled_machine_ignores_results() {
        let mut machine = MinutesMachine::new(false, 10);
        assert!(!machine.accumulate(&ok("こんにちは")));
        assert!(machine.transcript().is_empty());
    }

    #[test]
    fn test_disabling_clears_immediately() {
        let mut machine = accumulating(&["こんにちは"]);
        machine.apply_settings(&Settings::default());
        assert_eq!(machine.state(), MinutesState::Disabled);
        assert!(machine.transcript().is_empty());

        machine.apply_settings(&enabled_settings());
        assert_eq!(machine.state(), MinutesState::Accumulating);
        assert!(machine.transcript().is_empty());
    }

    #[test]
    fn test_guards_refuse_without_transition() {
        let mut disabled = MinutesMachine::new(false, 10);
        assert_eq!(
            disabled.begin_generation(&enabled_settings()).unwrap_err(),
            MinutesError::Disabled
        );

        let mut empty = accumulating(&[]);
        assert_eq!(
            empty.begin_generation(&enabled_settings()).unwrap_err(),
            MinutesError::NothingToSummarize
        );

        let mut no_key = accumulating(&["こんにちは"]);
        let settings = Settings {
            minutes_enabled: true,
            ..Settings::default()
        };
        assert_eq!(
            no_key.begin_generation(&settings).unwrap_err(),
            MinutesError::CredentialMissing
        );
        assert_eq!(no_key.state(), MinutesState::Accumulating);
        assert_eq!(no_key.transcript(), "こんにちは\n");

        let mut no_model = accumulating(&["こんにちは"]);
        let settings = Settings {
            model: String::new(),
            ..enabled_settings()
        };
        assert_eq!(
            no_model.begin_generation(&settings).unwrap_err(),
            MinutesError::ModelMissing
        );
    }

    #[test]
    fn test_reentrant_trigger_is_refused() {
        let mut machine = accumulating(&["こんにちは"]);
        let _ticket = machine.begin_generation(&enabled_settings()).unwrap();
        assert_eq!(machine.state(), MinutesState::Generating);
        assert_eq!(
            machine.begin_generation(&enabled_settings()).unwrap_err(),
            MinutesError::AlreadyRunning
        );
    }

    #[test]
    fn test_failed_summary_keeps_transcript() {
        let mut machine = accumulating(&["こんにちは", "さようなら"]);
        let before = machine.transcript().to_string();
        let ticket = machine.begin_generation(&enabled_settings()).unwrap();
        assert_eq!(ticket.transcript, before);

        machine.summary_failed(&ticket);
        assert_eq!(machine.state(), MinutesState::Accumulating);
        assert_eq!(machine.transcript(), before);
    }

    #[test]
    fn test_successful_delivery_clears_transcript() {
        let mut machine = accumulating(&["こんにちは"]);
        let ticket = machine.begin_generation(&enabled_settings()).unwrap();
        assert!(machine.summary_ready(&ticket));
        assert_eq!(machine.state(), MinutesState::Delivering);
        machine.delivery_finished(&ticket);
        assert_eq!(machine.state(), MinutesState::Accumulating);
        assert!(machine.transcript().is_empty());
    }

    #[test]
    fn test_captions_during_generation_survive_clear() {
        let mut machine = accumulating(&["first"]);
        let ticket = machine.begin_generation(&enabled_settings()).unwrap();
        machine.accumulate(&ok("second"));
        assert!(machine.summary_ready(&ticket));
        machine.delivery_finished(&ticket);
        assert_eq!(machine.transcript(), "second\n");
    }

    #[test]
    fn test_disable_during_generation_invalidates_ticket() {
        let mut machine = accumulating(&["こんにちは"]);
        let ticket = machine.begin_generation(&enabled_settings()).unwrap();
        assert!(machine.apply_settings(&Settings::default()));
        machine.apply_settings(&enabled_settings());
        machine.accumulate(&ok("new session"));

        assert!(!machine.summary_ready(&ticket));
        machine.delivery_finished(&ticket);
        assert_eq!(machine.state(), MinutesState::Accumulating);
        assert_eq!(machine.transcript(), "new session\n");
    }

    #[test]
    fn test_long_transcript_keeps_tail() {
        let mut machine = MinutesMachine::new(true, 6);
        machine.accumulate(&ok("古い行"));
        machine.accumulate(&ok("新しい"));
        let ticket = machine.begin_generation(&enabled_settings()).unwrap();
        assert_eq!(ticket.transcript, "行\n新しい\n");
        // The whole transcript is still cleared after delivery
        assert!(machine.summary_ready(&ticket));
        machine.delivery_finished(&ticket);
        assert!(machine.transcript().is_empty());
    }

    #[test]
    fn test_keep_tail_respects_char_boundaries() {
        assert_eq!(keep_tail("abc", 5), "abc");
        assert_eq!(keep_tail("こんにちは", 2), "ちは");
        assert_eq!(keep_tail("", 0), "");
    }
}
