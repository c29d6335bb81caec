//! OpenAI Chat Completions client for caption translation and meeting minutes.
//!
//! Users provide their own API key; it is passed per call so that a settings
//! change takes effect on the next request.

use crate::capabilities::{Summarizer, Translator};
use crate::config::{ApiConfig, MinutesConfig};
use crate::error::ApiError;
use crate::settings::Credential;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for OpenAI Chat Completions API calls.
pub(crate) struct OpenAIClient {
    endpoint: String,
    summary_max_tokens: u32,
    client: reqwest::Client,
}

/// Request body for OpenAI Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Message in the OpenAI request.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from OpenAI Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// System prompt template for caption translation.
/// Use `{language}` placeholder for the target language.
const TRANSLATION_PROMPT_TEMPLATE: &str = "You are a translation engine. Translate the following text to {language}. Output ONLY the translated sentence.";

/// System prompt for meeting minutes generation.
const MINUTES_PROMPT: &str = r#"You are an AI assistant specializing in summarizing meeting transcripts. Your task is to generate concise and well-structured meeting minutes from the provided text.

The input text is a transcript of a meeting's translated captions.

From this transcript, please identify and clearly present:
1.  **Key Discussion Points:** The main topics and important subjects that were discussed.
2.  **Decisions Made:** Any resolutions, agreements, or conclusions reached during the meeting.
3.  **Action Items:** Specific tasks assigned to individuals or groups, including deadlines if mentioned.

Please format the minutes for clarity and readability. Using headings for each section (Discussion Points, Decisions, Action Items) and bullet points within them is recommended. The summary should be objective and focus on the informational content of the meeting."#;

/// Convert a language code to its full name for use in prompts
pub(crate) fn language_code_to_name(code: &str) -> &str {
    match code {
        "ja" => "Japanese",
        "en" => "English",
        "zh" => "Chinese",
        "ko" => "Korean",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        _ => code, // Return code itself for unknown languages
    }
}

fn translation_prompt(target_lang: &str) -> String {
    TRANSLATION_PROMPT_TEMPLATE.replace("{language}", language_code_to_name(target_lang))
}

fn chat_request(
    model: &str,
    system: String,
    user: &str,
    max_tokens: Option<u32>,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system,
            },
            ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
        max_tokens,
    }
}

impl OpenAIClient {
    pub(crate) fn new(api: &ApiConfig, minutes: &MinutesConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client for OpenAIClient")?;

        Ok(Self {
            endpoint: api.endpoint.clone(),
            summary_max_tokens: minutes.max_output_tokens,
            client,
        })
    }

    /// Send one chat-completion request and return the first choice's text.
    async fn complete(
        &self,
        credential: &Credential,
        request: &ChatCompletionRequest,
    ) -> Result<String, ApiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::ServerError { status, message });
        }

        let chat_response: ChatCompletionResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse OpenAI response: {}", e))
        })?;
        Self::extract_text(&chat_response)
    }

    /// Extract text from the OpenAI response structure.
    ///
    /// A missing, null or empty content field is a failure.
    fn extract_text(response: &ChatCompletionResponse) -> Result<String, ApiError> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("No text content in OpenAI response".into()))
    }
}

#[async_trait]
impl Translator for OpenAIClient {
    #[instrument(skip(self, text, credential), fields(text_len = text.len()))]
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        model: &str,
        credential: &Credential,
        max_tokens: u32,
    ) -> Result<String, ApiError> {
        let request = chat_request(model, translation_prompt(target_lang), text, Some(max_tokens));
        let translated = self.complete(credential, &request).await?;
        debug!(translated_len = translated.len(), "Caption translated");
        Ok(translated)
    }
}

#[async_trait]
impl Summarizer for OpenAIClient {
    #[instrument(skip(self, transcript, credential), fields(transcript_len = transcript.len()))]
    async fn summarize(
        &self,
        transcript: &str,
        model: &str,
        credential: &Credential,
    ) -> Result<String, ApiError> {
        let request = chat_request(
            model,
            MINUTES_PROMPT.to_string(),
            transcript,
            Some(self.summary_max_tokens),
        );
        self.complete(credential, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_request_serialization() {
        let request = chat_request("gpt-4.1-nano", translation_prompt("ja"), "Hello", Some(400));
        let json = serde_json::to_value(&request).expect("Failed to serialize");
        assert_eq!(json["model"], "gpt-4.1-nano");
        assert_eq!(json["max_tokens"], 400);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_max_tokens_omitted_when_unset() {
        let request = chat_request("m", "s".to_string(), "u", None);
        let json = serde_json::to_string(&request).expect("Failed to serialize");
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "こんにちは" },
                "finish_reason": "stop"
            }]
        }"#;

        let response: ChatCompletionResponse =
            serde_json::from_str(json).expect("Failed to deserialize");
        let text = OpenAIClient::extract_text(&response).expect("Failed to extract text");
        assert_eq!(text, "こんにちは");
    }

    #[test]
    fn test_absent_content_is_a_failure() {
        for json in [
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
            r#"{"choices": [{"message": {"role": "assistant"}}]}"#,
            r#"{"choices": []}"#,
            r#"{"error": {"message": "invalid api key"}}"#,
        ] {
            let response: ChatCompletionResponse =
                serde_json::from_str(json).expect("Failed to deserialize");
            assert!(matches!(
                OpenAIClient::extract_text(&response),
                Err(ApiError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_translation_prompt_injects_language() {
        let prompt = translation_prompt("ja");
        assert!(prompt.contains("Translate the following text to Japanese."));
        assert!(!prompt.contains("{language}"));
        assert!(translation_prompt("pt-BR").contains("to pt-BR."));
    }

    #[test]
    fn test_minutes_prompt_requests_sections() {
        assert!(MINUTES_PROMPT.contains("Key Discussion Points"));
        assert!(MINUTES_PROMPT.contains("Decisions Made"));
        assert!(MINUTES_PROMPT.contains("Action Items"));
    }
}
