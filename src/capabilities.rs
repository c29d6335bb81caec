//! External capabilities the caption session depends on
//!
//! Production implementations live in [`crate::openai`] and
//! [`crate::delivery`]; tests substitute recording fakes.

use crate::error::{ApiError, DeliveryError};
use crate::settings::Credential;
use async_trait::async_trait;

#[async_trait]
pub(crate) trait Translator: Send + Sync {
    /// Translate `text` into `target_lang`, allowing up to `max_tokens`
    /// tokens of output. One attempt, no retry.
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        model: &str,
        credential: &Credential,
        max_tokens: u32,
    ) -> Result<String, ApiError>;
}

#[async_trait]
pub(crate) trait Summarizer: Send + Sync {
    /// Turn an accumulated transcript into meeting minutes
    async fn summarize(
        &self,
        transcript: &str,
        model: &str,
        credential: &Credential,
    ) -> Result<String, ApiError>;
}

/// Hands a finished text to the user's mail client as a draft.
///
/// Fire-and-forget: success means the draft was handed off, not sent.
pub(crate) trait DraftComposer: Send + Sync {
    fn open_draft(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}
