use thiserror::Error;

/// Configuration errors raised while loading the embedded config.toml
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("Failed to parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid API endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Chat-completion API errors (translation and summarization)
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// Reasons a minutes generation request is refused or fails.
///
/// The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MinutesError {
    #[error("Meeting minutes feature is not enabled.")]
    Disabled,

    #[error("API key is not set.")]
    CredentialMissing,

    #[error("Model is not set.")]
    ModelMissing,

    #[error("No captions have been recorded to generate minutes.")]
    NothingToSummarize,

    #[error("Meeting minutes are already being generated.")]
    AlreadyRunning,

    #[error("Failed to generate minutes from the transcript: {0}")]
    SummarizeFailed(String),

    #[error("Meeting minutes were disabled while generating.")]
    Cancelled,

    #[error("Caption session is not running.")]
    SessionClosed,
}

/// Compose-draft errors. Never fatal to minutes generation.
#[derive(Debug, Error)]
pub(crate) enum DeliveryError {
    #[error("Recipient email not configured")]
    NoRecipient,

    #[error("Failed to open email draft: {0}")]
    Open(#[from] std::io::Error),
}
