//! Translation request dispatch
//!
//! Each caption change becomes exactly one translation request, run as its
//! own task. Requests for different identities run concurrently. For a
//! single identity the newest request wins: issuing a request makes it the
//! identity's current token, and a completion is only accepted while its
//! token is still current. Superseded requests are not cancelled; their
//! results are dropped when they arrive.

use crate::capabilities::Translator;
use crate::config::TranslationConfig;
use crate::detector::CaptionChange;
use crate::error::ApiError;
use crate::identity::NodeIdentity;
use crate::markers::{ErrorMarker, MarkerLanguage};
use crate::settings::{Credential, Settings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Outbound translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TranslationRequest {
    pub identity: NodeIdentity,
    pub source_text: String,
    pub target_lang: String,
}

/// Outcome of one translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TranslationResult {
    pub identity: NodeIdentity,
    pub original_text: String,
    /// Translation, or an error marker when `is_error` is set
    pub translated_text: String,
    pub is_error: bool,
}

/// Correlates a completion with the request that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestToken(u64);

/// A finished request, reported back to the session loop
#[derive(Debug)]
pub(crate) struct Completion {
    pub token: RequestToken,
    pub result: TranslationResult,
}

/// What `dispatch` did with a change
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dispatched {
    /// Resolved without a network call (configuration error)
    Immediate(TranslationResult),
    /// Request sent; the result arrives later as a [`Completion`]
    Sent(RequestToken),
}

pub(crate) struct Dispatcher {
    translator: Arc<dyn Translator>,
    policy: TranslationConfig,
    completions: mpsc::UnboundedSender<Completion>,
    next_token: u64,
    current: HashMap<NodeIdentity, RequestToken>,
}

impl Dispatcher {
    pub(crate) fn new(
        translator: Arc<dyn Translator>,
        policy: TranslationConfig,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            translator,
            policy,
            completions,
            next_token: 0,
            current: HashMap::new(),
        }
    }

    /// Send one translation request for `change` using `settings`.
    ///
    /// Without a credential no request is made and the credential marker
    /// is returned immediately. Must be called inside a tokio runtime.
    pub(crate) fn dispatch(&mut self, change: CaptionChange, settings: &Settings) -> Dispatched {
        let request = TranslationRequest {
            identity: change.identity,
            source_text: change.text,
            target_lang: settings.target_lang().to_string(),
        };

        let Some(credential) = settings.credential() else {
            warn!(identity = %request.identity, "API key not set, skipping translation");
            // Anything still in flight for this identity is now older than this result
            self.current.remove(&request.identity);
            return Dispatched::Immediate(error_result(
                request,
                ErrorMarker::CredentialNotSet,
                self.policy.marker_language,
            ));
        };

        let token = RequestToken(self.next_token);
        self.next_token += 1;
        if let Some(previous) = self.current.insert(request.identity.clone(), token) {
            debug!(identity = %request.identity, ?previous, "Superseding in-flight translation");
        }

        let job = TranslationJob {
            translator: Arc::clone(&self.translator),
            max_tokens: self.policy.max_tokens_for(request.source_text.chars().count()),
            model: settings.model_or_default().to_string(),
            credential: credential.clone(),
            timeout: self.policy.timeout(),
            markers: self.policy.marker_language,
            request,
        };
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = job.run().await;
            // The session loop may already be gone; nothing left to update then
            let _ = completions.send(Completion { token, result });
        });

        Dispatched::Sent(token)
    }

    /// Admit a completion if it is still the newest request for its identity.
    pub(crate) fn accept(&mut self, completion: Completion) -> Option<TranslationResult> {
        let identity = &completion.result.identity;
        if self.current.get(identity) != Some(&completion.token) {
            debug!(%identity, token = ?completion.token, "Dropping superseded translation");
            return None;
        }
        self.current.remove(identity);
        Some(completion.result)
    }

    /// Number of identities with a current request outstanding
    pub(crate) fn in_flight(&self) -> usize {
        self.current.len()
    }
}

/// Everything a spawned request needs, detached from the dispatcher
struct TranslationJob {
    translator: Arc<dyn Translator>,
    request: TranslationRequest,
    model: String,
    credential: Credential,
    max_tokens: u32,
    timeout: Duration,
    markers: MarkerLanguage,
}

impl TranslationJob {
    async fn run(self) -> TranslationResult {
        let outcome = tokio::time::timeout(
            self.timeout,
            self.translator.translate(
                &self.request.source_text,
                &self.request.target_lang,
                &self.model,
                &self.credential,
                self.max_tokens,
            ),
        )
        .await
        .unwrap_or(Err(ApiError::Timeout(self.timeout.as_secs())));

        match outcome {
            Ok(translated) => TranslationResult {
                identity: self.request.identity,
                original_text: self.request.source_text,
                translated_text: translated,
                is_error: false,
            },
            Err(e) => {
                error!(identity = %self.request.identity, "Translation failed: {}", e);
                let marker = match e {
                    ApiError::InvalidResponse(_) | ApiError::ServerError { .. } => {
                        ErrorMarker::TranslationFailed
                    }
                    ApiError::Network(_) | ApiError::Timeout(_) => ErrorMarker::ApiError,
                };
                error_result(self.request, marker, self.markers)
            }
        }
    }
}

fn error_result(
    request: TranslationRequest,
    marker: ErrorMarker,
    language: MarkerLanguage,
) -> TranslationResult {
    TranslationResult {
        identity: request.identity,
        original_text: request.source_text,
        translated_text: marker.text(language).to_string(),
        is_error: true,
    }
}
