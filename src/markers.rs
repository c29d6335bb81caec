//! User-visible markers shown in place of a translation when it could not be produced.

use serde::Deserialize;

/// Language of the marker strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MarkerLanguage {
    #[default]
    En,
    Ja,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorMarker {
    /// No API credential configured; no request was sent
    CredentialNotSet,
    /// The API answered but without usable content
    TranslationFailed,
    /// Transport failure or timeout
    ApiError,
}

const ALL: [ErrorMarker; 3] = [
    ErrorMarker::CredentialNotSet,
    ErrorMarker::TranslationFailed,
    ErrorMarker::ApiError,
];

impl ErrorMarker {
    pub(crate) fn text(self, language: MarkerLanguage) -> &'static str {
        match (self, language) {
            (ErrorMarker::CredentialNotSet, MarkerLanguage::En) => "[credential not set]",
            (ErrorMarker::TranslationFailed, MarkerLanguage::En) => "[translation failed]",
            (ErrorMarker::ApiError, MarkerLanguage::En) => "[API error]",
            (ErrorMarker::CredentialNotSet, MarkerLanguage::Ja) => "[APIキー未設定]",
            (ErrorMarker::TranslationFailed, MarkerLanguage::Ja) => "[翻訳失敗]",
            (ErrorMarker::ApiError, MarkerLanguage::Ja) => "[APIエラー]",
        }
    }

    /// True if `text` is one of the markers, in any language.
    pub(crate) fn is_marker(text: &str) -> bool {
        let text = text.trim();
        ALL.iter().any(|marker| {
            marker.text(MarkerLanguage::En) == text || marker.text(MarkerLanguage::Ja) == text
        })
    }
}
